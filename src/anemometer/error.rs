use std::io;

use thiserror::Error;

use super::Direction;

pub type Result<T> = std::result::Result<T, AnemometerError>;

#[derive(Error, Debug)]
pub enum AnemometerError {
    /// The threshold lies above the conditioned echo, so the echo was never seen.
    #[error(
        "threshold {threshold} does not intersect the {direction:?} echo; select a lower threshold (in [0,1])"
    )]
    ThresholdNotCrossed { direction: Direction, threshold: f64 },

    #[error("calibration data not found ({0}); run the calibration first")]
    MissingCalibration(String),

    #[error("calibration data is unusable: {0}")]
    InvalidCalibration(String),

    /// No zero crossing precedes the threshold crossing.
    #[error("corrupt {direction:?} echo, check the transducer connections")]
    CorruptSignal { direction: Direction },

    #[error("acquisition returned no valid echoes after {attempts} attempts")]
    EmptyAcquisition { attempts: u32 },

    #[error("no echo frames supplied")]
    EmptyInput,

    #[error("{direction:?} echo has {len} samples, at least {min} are required")]
    EchoTooShort {
        direction: Direction,
        len: usize,
        min: usize,
    },

    #[error("{direction:?} echo length mismatch: expected {expected}, got {actual}")]
    LengthMismatch {
        direction: Direction,
        expected: usize,
        actual: usize,
    },

    #[error("{direction:?} echo has no positive maximum, cannot normalize")]
    FlatEcho { direction: Direction },

    #[error("no zero crossing before the {direction:?} echo peak")]
    NoPeakCrossing { direction: Direction },

    #[error("invalid ambient conditions: {0}")]
    InvalidAmbient(String),

    #[error("invalid {direction:?} transducer distance {distance} m")]
    InvalidDistance { direction: Direction, distance: f64 },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("sensor error: {0}")]
    Sensor(String),

    #[error("{0} lock poisoned by a panicked thread")]
    LockPoisoned(&'static str),

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl AnemometerError {
    /// Whether the measurement loop may carry on after this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AnemometerError::CorruptSignal { .. }
                | AnemometerError::NoPeakCrossing { .. }
                | AnemometerError::EmptyAcquisition { .. }
                | AnemometerError::Sensor(_)
        )
    }

    /// Echo unusable for onset selection; resolvers answer with the zero fallback.
    pub fn is_corrupt_signal(&self) -> bool {
        matches!(
            self,
            AnemometerError::CorruptSignal { .. } | AnemometerError::NoPeakCrossing { .. }
        )
    }
}
