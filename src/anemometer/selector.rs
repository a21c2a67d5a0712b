//! Picks the zero crossing that defines the time of flight.
//!
//! The threshold crossing only tells roughly where the echo starts and jitters
//! with the threshold level. Two strategies refine it to an exact zero crossing:
//!
//! * threshold-anchored: the last zero crossing before the threshold crossing;
//! * peak-anchored: walk back from the peak of the echo while the crossing
//!   spacing matches the excitation carrier, landing on the first clean
//!   half-cycle of the arriving echo.

use tracing::debug;

use super::conditioner::argmax;
use super::config::{AnemometerConfig, OnsetStrategy};
use super::error::{AnemometerError, Result};
use super::threshold::samples_of_flight_threshold;
use super::zero_crossing::zero_crossings;
use super::{EchoSet, PerDirection, ZeroCrossingSet};

/// Selected crossing: its index in the direction's crossing list and its position.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Onset {
    pub index: usize,
    pub position: f64,
}

/// Outcome of the peak-anchored backward scan.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PeakScan {
    /// Position of the crossing the scan stopped on.
    pub time_of_flight: f64,
    /// Crossing index the scan started from (last crossing before the peak).
    pub start: usize,
    /// Crossing index the scan stopped on.
    pub end: usize,
}

/// Index of the last crossing strictly before `position`.
pub fn last_crossing_before(crossings: &[f64], position: f64) -> Option<usize> {
    crossings.iter().rposition(|&z| z < position)
}

/// Threshold-anchored selection for every direction.
///
/// Fails with `CorruptSignal` when a direction has no zero crossing before its
/// threshold crossing.
pub fn threshold_anchored(
    crossings: &ZeroCrossingSet,
    threshold_crossings: &PerDirection<f64>,
) -> Result<PerDirection<Onset>> {
    crossings.try_map(|direction, zeros| {
        let index = last_crossing_before(zeros, threshold_crossings[direction])
            .ok_or(AnemometerError::CorruptSignal { direction })?;
        Ok(Onset {
            index,
            position: zeros[index],
        })
    })
}

/// Backward scan from the crossing right before the echo peak.
///
/// Steps back while consecutive crossings are `quarter_period` apart (within
/// `tolerance`) or coincide, and stops at the first spacing outside that window.
pub fn peak_anchored_scan(
    crossings: &[f64],
    peak: usize,
    quarter_period: f64,
    tolerance: f64,
) -> Option<PeakScan> {
    let start = last_crossing_before(crossings, peak as f64)?;
    let mut end = start;
    while end > 0 {
        let spacing = crossings[end] - crossings[end - 1];
        if spacing == 0.0 || (spacing - quarter_period).abs() <= tolerance {
            end -= 1;
        } else {
            break;
        }
    }
    Some(PeakScan {
        time_of_flight: crossings[end],
        start,
        end,
    })
}

/// Peak-anchored selection for every direction of a conditioned echo set.
pub fn peak_anchored(
    echoes: &EchoSet,
    crossings: &ZeroCrossingSet,
    config: &AnemometerConfig,
) -> Result<PerDirection<PeakScan>> {
    let peaks = argmax(echoes);
    let quarter = config.excitation_period() / 4.0;
    crossings.try_map(|direction, zeros| {
        let scan = peak_anchored_scan(zeros, peaks[direction], quarter, config.scan_tolerance)
            .ok_or(AnemometerError::NoPeakCrossing { direction })?;
        debug!(?direction, start = scan.start, end = scan.end, "peak scan");
        Ok(scan)
    })
}

/// Runs the configured strategy on a conditioned echo set.
///
/// Returns the zero crossings alongside the selection so callers can align
/// against neighbouring crossings.
pub fn select_onsets(
    echoes: &EchoSet,
    config: &AnemometerConfig,
) -> Result<(ZeroCrossingSet, PerDirection<Onset>)> {
    let crossings = zero_crossings(echoes);
    let onsets = match config.onset {
        OnsetStrategy::ThresholdAnchored => {
            let threshold_crossings = samples_of_flight_threshold(echoes, &config.threshold)?;
            threshold_anchored(&crossings, &threshold_crossings)?
        }
        OnsetStrategy::PeakAnchored => peak_anchored(echoes, &crossings, config)?.map(|_, scan| {
            Onset {
                index: scan.end,
                position: scan.time_of_flight,
            }
        }),
    };
    Ok((crossings, onsets))
}
