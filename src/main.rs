use anyhow::{Context, Result};
use clap::Parser;
use crossbeam::channel::unbounded;
use livefx::audio::engine::AudioEngine;
use livefx::audio::host::AudioHost;
use livefx::audio::jack::JackHost;
use livefx::control::{CommandInterpreter, ControlEvent};
use livefx::params::ParameterStore;
use livefx::settings::Settings;
use log::info;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "livefx")]
#[command(version)]
#[command(about = "Real-time JACK effects loop with live console tuning.")]
struct Args {
    #[arg(long, help = "Settings file (defaults to the XDG config location)")]
    config: Option<PathBuf>,

    #[arg(long, help = "Input device index")]
    input: Option<usize>,

    #[arg(long, help = "Output device index")]
    output: Option<usize>,

    #[arg(long, help = "Requested sample rate in Hz")]
    sample_rate: Option<usize>,

    #[arg(long, help = "Requested buffer size in frames")]
    buffer_frames: Option<usize>,

    #[arg(long, env = "LIVEFX_GAIN", help = "Initial gain")]
    gain: Option<f32>,

    #[arg(long, help = "Print the available devices and exit")]
    list_devices: bool,
}

impl Args {
    fn merge_into(&self, settings: &mut Settings) {
        if let Some(input) = self.input {
            settings.audio.input_device = input;
        }
        if let Some(output) = self.output {
            settings.audio.output_device = output;
        }
        if let Some(sample_rate) = self.sample_rate {
            settings.audio.sample_rate = sample_rate;
        }
        if let Some(buffer_frames) = self.buffer_frames {
            settings.audio.buffer_frames = buffer_frames;
        }
        if let Some(gain) = self.gain {
            settings.parameters.gain = gain;
        }
    }
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    env_logger::init();

    let args = Args::parse();
    info!("livefx v{}", env!("CARGO_PKG_VERSION"));
    info!("Args: {args:?}");

    let mut settings = match &args.config {
        Some(path) => Settings::load_from(path)?,
        None => Settings::load()?,
    };
    args.merge_into(&mut settings);
    info!("{settings}");

    settings.apply_to_environment();

    let host = JackHost::new(&settings.audio.client_name).context("failed to connect to JACK")?;

    if args.list_devices {
        for device in host.devices()? {
            println!("{device}");
        }
        return Ok(());
    }

    let params = Arc::new(
        ParameterStore::new(settings.parameters).context("invalid initial parameters")?,
    );
    let mut engine = AudioEngine::new(host, Arc::clone(&params));

    let config = engine
        .open(
            settings.audio.input_device,
            settings.audio.output_device,
            settings.audio.stream_request(),
        )
        .context("failed to open audio devices")?;
    engine.start().context("failed to start stream")?;

    let (events, shutdown) = unbounded();

    let interrupt = events.clone();
    ctrlc::set_handler(move || {
        let _ = interrupt.send(ControlEvent::Interrupted);
    })
    .context("error setting Ctrl+C handler")?;

    CommandInterpreter::new(params, events)
        .with_sample_rate(config.sample_rate)
        .spawn_console()
        .context("failed to spawn console thread")?;

    println!("livefx running, type 'help' for commands");

    engine.run_until(&shutdown)?;
    info!("Goodbye");

    Ok(())
}
