use super::error::{AnemometerError, Result};
use super::zero_crossing::interpolate;
use super::{EchoSet, PerDirection};

/// First crossing of the per-direction threshold level, as a fractional sample index.
///
/// The threshold is subtracted from the echo and the zero-crossing
/// interpolation is reused on the shifted signal. The first crossing is the
/// leading edge of the echo. An echo that never reaches its threshold is a
/// configuration error: the threshold must be lowered.
pub fn samples_of_flight_threshold(
    echoes: &EchoSet,
    threshold: &PerDirection<f64>,
) -> Result<PerDirection<f64>> {
    echoes.try_map(|direction, samples| {
        let level = threshold[direction];
        let shifted: Vec<f64> = samples.iter().map(|value| value - level).collect();
        interpolate(&shifted)
            .first()
            .copied()
            .ok_or(AnemometerError::ThresholdNotCrossed {
                direction,
                threshold: level,
            })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anemometer::Direction;
    use approx::assert_relative_eq;

    /// 100 samples of silence followed by V0 t^3 e^-t cos(10 t), t in [0, 20].
    fn synthetic_echo() -> Vec<f64> {
        let (v0, m, h, w) = (10.0, 3, 1.0, 10.0);
        let n = 1000;
        let step = 20.0 / (n - 1) as f64;
        let mut echo = vec![0.0; 100];
        echo.extend((0..n).map(|i| {
            let t = if i == n - 1 { 20.0 } else { i as f64 * step };
            v0 * t.powi(m) * (-t / h).exp() * (w * t).cos()
        }));
        echo
    }

    #[test]
    fn synthetic_echo_crossing_is_fixed() {
        let echoes = PerDirection::splat(synthetic_echo());
        let crossings =
            samples_of_flight_threshold(&echoes, &PerDirection::splat(0.3)).unwrap();
        for direction in Direction::ALL {
            assert_relative_eq!(crossings[direction], 125.45564873732962, epsilon = 1e-9);
        }
    }

    #[test]
    fn threshold_is_per_direction() {
        let ramp: Vec<f64> = (0..11).map(|i| i as f64 / 10.0).collect();
        let mut threshold = PerDirection::splat(0.25);
        threshold.east = 0.55;
        let crossings =
            samples_of_flight_threshold(&PerDirection::splat(ramp), &threshold).unwrap();
        assert_relative_eq!(crossings.north, 2.5, epsilon = 1e-12);
        assert_relative_eq!(crossings.east, 5.5, epsilon = 1e-12);
    }

    #[test]
    fn threshold_above_peak_is_a_configuration_error() {
        let mut echoes = PerDirection::splat(vec![0.0, 0.5, 1.0, 0.5, 0.0]);
        echoes.south = vec![0.0, 0.1, 0.2, 0.1, 0.0];
        let err = samples_of_flight_threshold(&echoes, &PerDirection::splat(0.3)).unwrap_err();
        assert!(matches!(
            err,
            AnemometerError::ThresholdNotCrossed {
                direction: Direction::South,
                ..
            }
        ));
    }
}
