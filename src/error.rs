use thiserror::Error;

use crate::audio::engine::EngineState;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Unknown device index, or the devices share no channels.
    #[error("device unavailable: {reason}")]
    DeviceUnavailable { reason: String },

    #[error("cannot {operation} while the engine is {state}")]
    InvalidState {
        operation: &'static str,
        state: EngineState,
    },

    #[error("invalid value for {parameter}: {reason}")]
    InvalidParameterValue { parameter: String, reason: String },

    #[error("invalid filter cutoff {cutoffs_hz:?} Hz (Nyquist {nyquist_hz} Hz)")]
    InvalidCutoff { cutoffs_hz: Vec<f64>, nyquist_hz: f64 },

    #[error("unsupported filter order {order}")]
    InvalidFilterOrder { order: usize },

    #[error("unrecognized command '{0}'")]
    UnknownCommand(String),

    #[error("buffer holds {actual} samples, expected {expected}")]
    BufferSize { expected: usize, actual: usize },

    #[error("effect chain produced non-finite samples")]
    NonFiniteOutput,

    #[error("audio host error: {0}")]
    Host(String),
}

impl Error {
    pub(crate) fn invalid_value(parameter: impl ToString, reason: impl ToString) -> Self {
        Self::InvalidParameterValue {
            parameter: parameter.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl From<jack::Error> for Error {
    fn from(e: jack::Error) -> Self {
        Self::Host(e.to_string())
    }
}
