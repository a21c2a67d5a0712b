use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::error::{AnemometerError, Result};
use super::{Axis, PerDirection};

/// Threshold on the normalized echo scale used when nothing else is configured.
pub const DEFAULT_THRESHOLD: f64 = 0.3;

/// Which zero crossing defines the time of flight.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnsetStrategy {
    /// Last zero crossing before the first threshold crossing.
    #[default]
    ThresholdAnchored,
    /// Backward scan from the echo peak over quarter-period crossing spacings.
    PeakAnchored,
}

/// Gas constants of the speed-of-sound model, in J kg^-1 K^-1.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GasConstants {
    pub dry_air: f64,
    pub water_vapor: f64,
    /// Adiabatic index of air.
    pub gamma: f64,
}

impl Default for GasConstants {
    fn default() -> Self {
        GasConstants {
            dry_air: 287.04,
            water_vapor: 461.50,
            gamma: 1.4,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnemometerConfig {
    /// ADC sampling rate in Hz.
    pub sampling_rate: f64,
    /// Carrier frequency of the excitation pulse in Hz.
    pub excitation_frequency: f64,
    /// Duration of the excitation burst, in samples.
    pub excitation_length: f64,
    pub sampling_correction: f64,
    pub threshold: PerDirection<f64>,
    pub axes: Vec<Axis>,
    pub onset: OnsetStrategy,
    /// Half-width, in samples, of the spacing window of the peak-anchored scan.
    pub scan_tolerance: f64,
    /// Crossing differences averaged by the phase-difference resolver.
    pub phase_crossings: usize,
    pub gas: GasConstants,
    pub frames_per_measure: usize,
    pub max_acquisition_attempts: u32,
}

impl Default for AnemometerConfig {
    fn default() -> Self {
        AnemometerConfig {
            sampling_rate: 400_000.0,
            excitation_frequency: 40_000.0,
            excitation_length: 40.0,
            sampling_correction: 1.0,
            threshold: PerDirection::splat(DEFAULT_THRESHOLD),
            axes: vec![Axis::NORTH_SOUTH, Axis::EAST_WEST],
            onset: OnsetStrategy::default(),
            scan_tolerance: 2.0,
            phase_crossings: 10,
            gas: GasConstants::default(),
            frames_per_measure: 50,
            max_acquisition_attempts: 10,
        }
    }
}

impl AnemometerConfig {
    pub fn load(path: &Path) -> Result<AnemometerConfig> {
        let text = fs::read_to_string(path)?;
        let config: AnemometerConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Period of the excitation carrier, in samples.
    pub fn excitation_period(&self) -> f64 {
        self.sampling_rate / self.excitation_frequency
    }

    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("sampling_rate", self.sampling_rate),
            ("excitation_frequency", self.excitation_frequency),
            ("sampling_correction", self.sampling_correction),
            ("scan_tolerance", self.scan_tolerance),
            ("gas.dry_air", self.gas.dry_air),
            ("gas.water_vapor", self.gas.water_vapor),
            ("gas.gamma", self.gas.gamma),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(AnemometerError::Config(format!(
                    "{name} must be positive, got {value}"
                )));
            }
        }
        if !(self.excitation_length.is_finite() && self.excitation_length >= 0.0) {
            return Err(AnemometerError::Config(format!(
                "excitation_length must not be negative, got {}",
                self.excitation_length
            )));
        }
        for (direction, &threshold) in self.threshold.iter() {
            if !(threshold > 0.0 && threshold <= 1.0) {
                return Err(AnemometerError::Config(format!(
                    "{direction:?} threshold must be in (0, 1], got {threshold}"
                )));
            }
        }
        if self.axes.is_empty() {
            return Err(AnemometerError::Config("no axes configured".into()));
        }
        if let Some(axis) = self.axes.iter().find(|axis| axis.0 == axis.1) {
            return Err(AnemometerError::Config(format!(
                "axis endpoints must differ, got {axis:?}"
            )));
        }
        if self.phase_crossings == 0 || self.frames_per_measure == 0 {
            return Err(AnemometerError::Config(
                "phase_crossings and frames_per_measure must be at least 1".into(),
            ));
        }
        if self.max_acquisition_attempts == 0 {
            return Err(AnemometerError::Config(
                "max_acquisition_attempts must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
