//! Sub-sample localization of sign changes.
//!
//! The timing resolution of the whole pipeline comes from here: each sign
//! change between samples `i` and `i + 1` is placed on the line through both
//! samples, giving a fractional sample index.

use super::{EchoSet, ZeroCrossingSet};

/// Sign bucket of a sample: -1, 0 or 1. Exact zero is its own bucket.
fn sign(value: f64) -> i8 {
    if value > 0.0 {
        1
    } else if value < 0.0 {
        -1
    } else {
        0
    }
}

/// Interpolated positions of every sign change in `samples`, in increasing order.
///
/// Pairs holding a non-finite sample are skipped, as is any pair whose slope is
/// zero (a sign change implies distinct values, so this only guards against
/// degenerate input). An exact zero at index `i` between samples of opposite
/// sign is reported twice, once by each neighbouring pair, both at `i`.
pub fn interpolate(samples: &[f64]) -> Vec<f64> {
    samples
        .windows(2)
        .enumerate()
        .filter_map(|(i, pair)| {
            let (a, b) = (pair[0], pair[1]);
            if !(a.is_finite() && b.is_finite()) || sign(a) == sign(b) {
                return None;
            }
            // unit sample spacing
            let slope = b - a;
            if slope == 0.0 {
                return None;
            }
            Some(i as f64 - a / slope)
        })
        .collect()
}

pub fn zero_crossings(echoes: &EchoSet) -> ZeroCrossingSet {
    echoes.map(|_, samples| interpolate(samples))
}
