mod common;

use anyhow::Result;
use common::{LoopbackHost, device};
use crossbeam::channel::unbounded;
use livefx::Error;
use livefx::audio::device::StreamRequest;
use livefx::audio::engine::{AudioEngine, EngineState};
use livefx::control::{CommandInterpreter, ControlEvent};
use livefx::params::ParameterStore;
use std::io::Cursor;
use std::sync::Arc;
use std::thread;

const BUFFER_FRAMES: usize = 1024;

fn engine(host: LoopbackHost) -> (AudioEngine<LoopbackHost>, Arc<ParameterStore>) {
    let params = Arc::new(ParameterStore::default());
    (AudioEngine::new(host, Arc::clone(&params)), params)
}

fn tone(len: usize) -> Vec<f32> {
    (0..len).map(|i| (i as f32 * 0.013).sin() * 0.7).collect()
}

#[test]
fn full_lifecycle_passes_audio_through() -> Result<()> {
    let host = LoopbackHost::stereo();
    let (mut engine, _) = engine(host.clone());

    let config = engine.open(0, 0, StreamRequest::default())?;
    assert_eq!(config.channel_count, 2);
    assert_eq!(config.sample_rate, 48_000);
    assert_eq!(config.buffer_frames, BUFFER_FRAMES);
    assert_eq!(engine.state(), EngineState::Opened);

    engine.start()?;
    assert_eq!(engine.state(), EngineState::Streaming);

    let input = tone(BUFFER_FRAMES * 2);
    let mut output = vec![0.0; input.len()];
    for _ in 0..4 {
        host.cycle(&input, &mut output).expect("stream is running")?;
    }
    assert_eq!(output, input, "default parameters must pass audio through");

    engine.stop()?;
    assert!(!host.is_running());
    engine.close()?;
    assert_eq!(engine.state(), EngineState::Closed);
    assert_eq!(host.calls(), ["configure", "start", "stop", "close"]);

    Ok(())
}

#[test]
fn channel_count_is_the_smaller_capability() -> Result<()> {
    let mut host = LoopbackHost::stereo();
    host.devices.push(device(3, "octo", 8, 8));
    let (mut engine, _) = engine(host);

    let config = engine.open(3, 2, StreamRequest::default())?;
    assert_eq!(config.channel_count, 2);

    Ok(())
}

#[test]
fn open_fails_without_usable_devices() {
    let (mut engine, _) = engine(LoopbackHost::stereo());

    // Speakers have no inputs.
    assert!(matches!(
        engine.open(2, 0, StreamRequest::default()),
        Err(Error::DeviceUnavailable { .. })
    ));
    // Mic has no outputs.
    assert!(matches!(
        engine.open(0, 1, StreamRequest::default()),
        Err(Error::DeviceUnavailable { .. })
    ));
    assert!(matches!(
        engine.open(7, 0, StreamRequest::default()),
        Err(Error::DeviceUnavailable { .. })
    ));
    assert_eq!(engine.state(), EngineState::Uninitialized);
}

#[test]
fn operations_outside_their_state_are_rejected() -> Result<()> {
    let (mut engine, _) = engine(LoopbackHost::stereo());

    assert_eq!(
        engine.start(),
        Err(Error::InvalidState {
            operation: "start",
            state: EngineState::Uninitialized
        })
    );
    assert!(matches!(engine.close(), Err(Error::InvalidState { .. })));
    assert!(matches!(engine.stop(), Err(Error::InvalidState { .. })));

    let mut buffer = vec![0.0; BUFFER_FRAMES];
    assert!(matches!(
        engine.process(&buffer.clone(), &mut buffer),
        Err(Error::InvalidState { .. })
    ));

    engine.open(0, 0, StreamRequest::default())?;
    assert!(matches!(
        engine.open(0, 0, StreamRequest::default()),
        Err(Error::InvalidState { .. })
    ));
    assert!(matches!(engine.close(), Err(Error::InvalidState { .. })));

    engine.start()?;
    let mut output = vec![0.0; BUFFER_FRAMES * 2];
    assert_eq!(
        engine.process(&vec![0.0; BUFFER_FRAMES * 2], &mut output),
        Err(Error::InvalidState {
            operation: "process",
            state: EngineState::Streaming
        })
    );

    Ok(())
}

#[test]
fn stop_is_idempotent() -> Result<()> {
    let host = LoopbackHost::stereo();
    let (mut engine, _) = engine(host.clone());
    engine.open(0, 0, StreamRequest::default())?;
    engine.start()?;

    engine.stop()?;
    engine.stop()?;

    assert_eq!(engine.state(), EngineState::Stopped);
    assert_eq!(host.calls(), ["configure", "start", "stop"]);

    Ok(())
}

#[test]
fn processing_works_offline_before_start_and_after_stop() -> Result<()> {
    let (mut engine, params) = engine(LoopbackHost::stereo());
    engine.open(0, 0, StreamRequest::default())?;

    let input = vec![0.25; BUFFER_FRAMES * 2];
    let mut output = vec![0.0; input.len()];
    engine.process(&input, &mut output)?;
    assert_eq!(output, input);

    engine.start()?;
    engine.stop()?;

    params.set(livefx::params::Parameter::Gain, 2.0)?;
    engine.process(&input, &mut output)?;
    assert!(output.iter().all(|&x| x == 0.5));

    Ok(())
}

#[test]
fn failed_start_can_be_retried() -> Result<()> {
    let mut host = LoopbackHost::stereo();
    host.fail_start = true;
    let (mut engine, _) = engine(host);
    engine.open(0, 0, StreamRequest::default())?;

    assert!(matches!(engine.start(), Err(Error::Host(_))));
    assert_eq!(engine.state(), EngineState::Opened);

    let input = vec![0.1; BUFFER_FRAMES * 2];
    let mut output = vec![0.0; input.len()];
    engine.process(&input, &mut output)?;

    Ok(())
}

#[test]
fn failed_stop_still_allows_close() -> Result<()> {
    let mut host = LoopbackHost::stereo();
    host.fail_stop = true;
    let (mut engine, _) = engine(host);
    engine.open(0, 0, StreamRequest::default())?;
    engine.start()?;

    assert!(engine.stop().is_err());
    assert_eq!(engine.state(), EngineState::Stopped);
    engine.close()?;
    assert_eq!(engine.state(), EngineState::Closed);

    Ok(())
}

#[test]
fn quit_command_stops_then_closes_and_start_is_refused() -> Result<()> {
    let host = LoopbackHost::stereo();
    let (mut engine, params) = engine(host.clone());
    engine.open(0, 0, StreamRequest::default())?;
    engine.start()?;

    let (events, shutdown) = unbounded();
    let console = CommandInterpreter::new(Arc::clone(&params), events);
    let typing = thread::spawn(move || {
        console.run(Cursor::new("g 0.5\npost 5000 100\nq\n"), std::io::sink())
    });

    assert_eq!(engine.run_until(&shutdown)?, ControlEvent::Quit);
    typing.join().expect("console thread panicked")?;

    assert_eq!(engine.state(), EngineState::Closed);
    assert!(!host.is_running());
    assert_eq!(host.calls(), ["configure", "start", "stop", "close"]);
    assert_eq!(params.get().gain, 0.5);
    assert_eq!(params.get().post_eq_low_hz, 100.0);

    assert_eq!(
        engine.start(),
        Err(Error::InvalidState {
            operation: "start",
            state: EngineState::Closed
        })
    );

    Ok(())
}

#[test]
fn interrupt_stops_then_closes() -> Result<()> {
    let host = LoopbackHost::stereo();
    let (mut engine, _) = engine(host.clone());
    engine.open(0, 0, StreamRequest::default())?;
    engine.start()?;

    let (events, shutdown) = unbounded();
    let signal = thread::spawn(move || events.send(ControlEvent::Interrupted));

    assert_eq!(engine.run_until(&shutdown)?, ControlEvent::Interrupted);
    signal.join().expect("signal thread panicked")?;

    assert_eq!(engine.state(), EngineState::Closed);
    assert_eq!(host.calls(), ["configure", "start", "stop", "close"]);

    Ok(())
}

#[test]
fn closed_control_channel_shuts_down_as_quit() -> Result<()> {
    let host = LoopbackHost::stereo();
    let (mut engine, _) = engine(host.clone());
    engine.open(0, 0, StreamRequest::default())?;
    engine.start()?;

    let (events, shutdown) = unbounded::<ControlEvent>();
    drop(events);

    assert_eq!(engine.run_until(&shutdown)?, ControlEvent::Quit);
    assert_eq!(engine.state(), EngineState::Closed);
    assert_eq!(host.calls(), ["configure", "start", "stop", "close"]);

    Ok(())
}

#[test]
fn parameter_changes_reach_the_running_stream() -> Result<()> {
    let host = LoopbackHost::stereo();
    let (mut engine, params) = engine(host.clone());
    engine.open(0, 0, StreamRequest::default())?;
    engine.start()?;

    let input = vec![0.9; BUFFER_FRAMES * 2];
    let mut output = vec![0.0; input.len()];
    host.cycle(&input, &mut output).expect("stream is running")?;
    assert!(output.iter().all(|&x| x == 0.9));

    params.set(livefx::params::Parameter::Gain, 4.0)?;
    host.cycle(&input, &mut output).expect("stream is running")?;
    assert!(output.iter().all(|&x| x == 1.0), "clipped to the limit");

    params.set(livefx::params::Parameter::NoiseGateThreshold, 0.95)?;
    host.cycle(&input, &mut output).expect("stream is running")?;
    assert!(output.iter().all(|&x| x == 0.0));

    Ok(())
}

#[test]
fn dropping_a_streaming_engine_releases_the_host() -> Result<()> {
    let host = LoopbackHost::stereo();
    {
        let (mut engine, _) = engine(host.clone());
        engine.open(0, 0, StreamRequest::default())?;
        engine.start()?;
    }

    assert!(!host.is_running());
    assert_eq!(host.calls(), ["configure", "start", "stop", "close"]);

    Ok(())
}
