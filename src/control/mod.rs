use crossbeam::channel::Sender;
use log::{debug, error, info, warn};
use std::fmt;
use std::io::{self, BufRead, Write};
use std::str::FromStr;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::error::{Error, Result};
use crate::fx::design::{FilterDesigner, FilterKind};
use crate::fx::stages::filter::{POST_EQ_ORDER, PRE_EQ_ORDER};
use crate::params::{OptionalStage, Parameter, ParameterStore, ParameterUpdate, Parameters};

const HELP: &str = "\
Commands:
  g <gain>            set gain
  d <amount>          set distortion amount (0 bypasses)
  n <threshold>       set noise gate threshold
  pre <hz> | off      set and enable the pre EQ low-pass, or disable it
  post <lo> <hi> | off
                      set and enable the post EQ band-pass, or disable it
  cab on | off        switch the cabinet low-pass
  show                print the current parameters
  help                print this text
  q                   stop the stream and quit";

/// One line of console input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    Update(ParameterUpdate),
    Show,
    Help,
    Quit,
}

impl FromStr for Command {
    type Err = Error;

    fn from_str(line: &str) -> Result<Self> {
        let line = line.trim().to_lowercase();
        let mut words = line.split_whitespace();
        let Some(keyword) = words.next() else {
            return Err(Error::UnknownCommand(String::new()));
        };
        let args: Vec<&str> = words.collect();

        let command = match (keyword, args.as_slice()) {
            ("g", [value]) => set(Parameter::Gain, value)?,
            ("d", [value]) => set(Parameter::DistortionAmount, value)?,
            ("n", [value]) => set(Parameter::NoiseGateThreshold, value)?,
            ("pre", ["off"]) => toggle(OptionalStage::PreEqualizer, false),
            ("pre", [value]) => set(Parameter::PreEqFreq, value)?,
            ("post", ["off"]) => toggle(OptionalStage::PostEqualizer, false),
            ("post", [low, high]) => Self::Update(ParameterUpdate::PostEqBand {
                low: number(Parameter::PostEqLow, low)?,
                high: number(Parameter::PostEqHigh, high)?,
            }),
            ("cab", ["on"]) => toggle(OptionalStage::Cabinet, true),
            ("cab", ["off"]) => toggle(OptionalStage::Cabinet, false),
            ("show", []) => Self::Show,
            ("help" | "?", []) => Self::Help,
            ("q" | "quit", []) => Self::Quit,
            ("g" | "d" | "n" | "pre" | "post" | "cab", _) => {
                return Err(Error::invalid_value(
                    keyword,
                    format!("wrong arguments, see 'help' for usage of '{keyword}'"),
                ));
            }
            _ => return Err(Error::UnknownCommand(line.clone())),
        };

        Ok(command)
    }
}

fn number(field: Parameter, word: &str) -> Result<f32> {
    word.parse::<f32>()
        .map_err(|_| Error::invalid_value(field, format!("'{word}' is not a number")))
}

fn set(field: Parameter, word: &str) -> Result<Command> {
    Ok(Command::Update(ParameterUpdate::Set {
        field,
        value: number(field, word)?,
    }))
}

const fn toggle(stage: OptionalStage, enabled: bool) -> Command {
    Command::Update(ParameterUpdate::Toggle { stage, enabled })
}

/// Setting a filter frequency from the console also switches that filter on.
const fn enabled_by(update: &ParameterUpdate) -> Option<OptionalStage> {
    match update {
        ParameterUpdate::Set {
            field: Parameter::PreEqFreq,
            ..
        } => Some(OptionalStage::PreEqualizer),
        ParameterUpdate::PostEqBand { .. } => Some(OptionalStage::PostEqualizer),
        _ => None,
    }
}

/// What the console prints after a command.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// `warning` is set when the update leaves its filter bypassed at the stream's rate.
    Applied {
        update: ParameterUpdate,
        warning: Option<String>,
    },
    Parameters(Parameters),
    Help,
    Quit,
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Applied {
                update,
                warning: None,
            } => write!(f, "{update}"),
            Self::Applied {
                update,
                warning: Some(warning),
            } => write!(f, "{update}\nwarning: {warning}"),
            Self::Parameters(params) => write!(f, "{params}"),
            Self::Help => f.write_str(HELP),
            Self::Quit => f.write_str("Shutting down..."),
        }
    }
}

/// Reasons the main thread should shut the engine down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlEvent {
    /// `q` or end of console input.
    Quit,
    /// Ctrl+C or SIGTERM.
    Interrupted,
}

impl fmt::Display for ControlEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Quit => write!(f, "quit requested"),
            Self::Interrupted => write!(f, "interrupted"),
        }
    }
}

/// Turns console lines into [`ParameterStore`] updates and quit requests.
///
/// Never touches the stream itself: a quit is only forwarded as a [`ControlEvent`] and the
/// owner of the engine decides what to do with it.
pub struct CommandInterpreter {
    params: Arc<ParameterStore>,
    events: Sender<ControlEvent>,
    sample_rate: Option<usize>,
}

impl CommandInterpreter {
    pub const fn new(params: Arc<ParameterStore>, events: Sender<ControlEvent>) -> Self {
        Self {
            params,
            events,
            sample_rate: None,
        }
    }

    /// Lets replies warn about filter frequencies the running stream cannot use.
    pub fn with_sample_rate(mut self, sample_rate: usize) -> Self {
        self.sample_rate = Some(sample_rate);
        self
    }

    /// Parses and applies one line. Errors leave the store unchanged.
    pub fn execute(&self, line: &str) -> Result<Reply> {
        let command = line.parse::<Command>()?;
        debug!("Command: {command:?}");

        match command {
            Command::Update(update) => {
                self.params.apply(&update)?;
                if let Some(stage) = enabled_by(&update) {
                    self.params.set_enabled(stage, true);
                }
                info!("{update}");

                let warning = self.bypass_warning(&update);
                if let Some(warning) = &warning {
                    warn!("{warning}");
                }
                Ok(Reply::Applied { update, warning })
            }
            Command::Show => Ok(Reply::Parameters(self.params.get())),
            Command::Help => Ok(Reply::Help),
            Command::Quit => {
                self.send(ControlEvent::Quit);
                Ok(Reply::Quit)
            }
        }
    }

    /// Reads commands until `q` or end of input, which also counts as `q`.
    pub fn run<R: BufRead, W: Write>(&self, input: R, mut output: W) -> io::Result<()> {
        write!(output, "> ")?;
        output.flush()?;

        for line in input.lines() {
            let line = line?;
            if line.trim().is_empty() {
                write!(output, "> ")?;
                output.flush()?;
                continue;
            }

            match self.execute(&line) {
                Ok(Reply::Quit) => {
                    writeln!(output, "{}", Reply::Quit)?;
                    return Ok(());
                }
                Ok(reply) => writeln!(output, "{reply}")?,
                Err(e) => {
                    warn!("Rejected command '{}': {e}", line.trim());
                    writeln!(output, "error: {e}")?;
                }
            }

            write!(output, "> ")?;
            output.flush()?;
        }

        debug!("Console input closed");
        self.send(ControlEvent::Quit);
        Ok(())
    }

    /// Runs the interpreter on stdin/stdout in its own thread.
    pub fn spawn_console(self) -> io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name("console".to_string())
            .spawn(move || {
                if let Err(e) = self.run(io::stdin().lock(), io::stdout()) {
                    error!("Console failed: {e}");
                    self.send(ControlEvent::Quit);
                }
            })
    }

    /// Runs the same design the filter stage will, so the console can report a bypass.
    fn bypass_warning(&self, update: &ParameterUpdate) -> Option<String> {
        let sample_rate = self.sample_rate? as f64;
        let p = self.params.get();

        let (stage, designed) = match update {
            ParameterUpdate::Set {
                field: Parameter::PreEqFreq,
                ..
            } => (
                OptionalStage::PreEqualizer,
                FilterDesigner::design(
                    FilterKind::LowPass,
                    PRE_EQ_ORDER,
                    &[f64::from(p.pre_eq_freq_hz)],
                    sample_rate,
                ),
            ),
            ParameterUpdate::Set {
                field: Parameter::PostEqLow | Parameter::PostEqHigh,
                ..
            }
            | ParameterUpdate::PostEqBand { .. } => (
                OptionalStage::PostEqualizer,
                FilterDesigner::design(
                    FilterKind::BandPass,
                    POST_EQ_ORDER,
                    &[f64::from(p.post_eq_low_hz), f64::from(p.post_eq_high_hz)],
                    sample_rate,
                ),
            ),
            _ => return None,
        };

        designed
            .err()
            .map(|e| format!("{stage} stays bypassed: {e}"))
    }

    fn send(&self, event: ControlEvent) {
        if let Err(e) = self.events.send(event) {
            error!("Failed to send {event} event: {e}");
        }
    }
}
