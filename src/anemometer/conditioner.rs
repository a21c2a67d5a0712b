//! Waveform conditioning of raw echo sets.
//!
//! Every operation returns a new `EchoSet`; inputs are never modified.

use tracing::debug;

use super::error::{AnemometerError, Result};
use super::{Direction, EchoSet, PerDirection};

/// Shortest echo the pipeline accepts: the derivative must keep two samples.
pub const MIN_ECHO_LEN: usize = 3;

/// Element-wise mean over repeated frames.
///
/// A single frame is returned as is. The divisor is the number of frames
/// actually supplied, which may be lower than the nominal frame count when
/// acquisition discarded some of them.
pub fn average(frames: &[EchoSet]) -> Result<EchoSet> {
    let (first, rest) = frames.split_first().ok_or(AnemometerError::EmptyInput)?;
    if rest.is_empty() {
        return Ok(first.clone());
    }

    let count = frames.len() as f64;
    first.try_map(|direction, samples| {
        let mut sum = samples.clone();
        for frame in rest {
            let other = &frame[direction];
            check_len(direction, samples.len(), other.len())?;
            for (acc, value) in sum.iter_mut().zip(other) {
                *acc += value;
            }
        }
        Ok(sum.into_iter().map(|value| value / count).collect())
    })
}

/// First-order difference; an echo of `n` samples yields `n - 1` values.
pub fn differentiate(echoes: &EchoSet) -> EchoSet {
    echoes.map(|_, samples| samples.windows(2).map(|w| w[1] - w[0]).collect())
}

/// Scales each direction by its own maximum (signed, not absolute) so that one
/// threshold fits all directions.
pub fn normalize(echoes: &EchoSet) -> Result<EchoSet> {
    echoes.try_map(|direction, samples| {
        let max = samples.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if !(max.is_finite() && max > 0.0) {
            return Err(AnemometerError::FlatEcho { direction });
        }
        Ok(samples.iter().map(|value| value / max).collect())
    })
}

/// Subtracts a previously captured crosstalk reference from the live echoes.
pub fn remove_crosstalk(echoes: &EchoSet, noise: &EchoSet) -> Result<EchoSet> {
    echoes.try_map(|direction, samples| {
        let reference = &noise[direction];
        check_len(direction, samples.len(), reference.len())?;
        Ok(samples.iter().zip(reference).map(|(s, n)| s - n).collect())
    })
}

/// Index of the largest sample per direction; the first one wins on ties.
pub fn argmax(echoes: &EchoSet) -> PerDirection<usize> {
    echoes.map(|_, samples| {
        samples
            .iter()
            .enumerate()
            .fold((0, f64::NEG_INFINITY), |(best, max), (i, &value)| {
                if value > max {
                    (i, value)
                } else {
                    (best, max)
                }
            })
            .0
    })
}

/// Average, differentiate and normalize: the conditioning chain used before
/// any time-of-flight detection.
pub fn condition(frames: &[EchoSet]) -> Result<EchoSet> {
    let averaged = average(frames)?;
    for (direction, samples) in averaged.iter() {
        if samples.len() < MIN_ECHO_LEN {
            return Err(AnemometerError::EchoTooShort {
                direction,
                len: samples.len(),
                min: MIN_ECHO_LEN,
            });
        }
    }
    debug!(frames = frames.len(), "conditioning echoes");
    normalize(&differentiate(&averaged))
}

fn check_len(direction: Direction, expected: usize, actual: usize) -> Result<()> {
    if expected != actual {
        return Err(AnemometerError::LengthMismatch {
            direction,
            expected,
            actual,
        });
    }
    Ok(())
}
