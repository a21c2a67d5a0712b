//! Speed of sound in moist air.
//!
//! Saturation vapour pressure follows Hyland and Wexler (1983), valid between
//! 173 K and 473 K. Moisture enters through the virtual temperature.

use serde::{Deserialize, Serialize};

use super::config::GasConstants;
use super::error::{AnemometerError, Result};

const ZERO_CELSIUS: f64 = 273.15;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct AmbientConditions {
    /// Degrees Celsius.
    pub temperature: f64,
    /// Hectopascal.
    pub pressure: f64,
    /// Fraction in [0, 1].
    pub relative_humidity: f64,
}

impl AmbientConditions {
    pub fn new(temperature: f64, pressure: f64, relative_humidity: f64) -> AmbientConditions {
        AmbientConditions {
            temperature,
            pressure,
            relative_humidity,
        }
    }

    pub fn kelvin(&self) -> f64 {
        self.temperature + ZERO_CELSIUS
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.kelvin().is_finite() && self.kelvin() > 0.0) {
            return Err(AnemometerError::InvalidAmbient(format!(
                "temperature {} °C is below absolute zero",
                self.temperature
            )));
        }
        if !(self.pressure.is_finite() && self.pressure > 0.0) {
            return Err(AnemometerError::InvalidAmbient(format!(
                "pressure must be positive, got {} hPa",
                self.pressure
            )));
        }
        if !(0.0..=1.0).contains(&self.relative_humidity) {
            return Err(AnemometerError::InvalidAmbient(format!(
                "relative humidity must be a fraction in [0, 1], got {}",
                self.relative_humidity
            )));
        }
        Ok(())
    }
}

/// Saturation vapour pressure over water in hPa, temperature in kelvin.
pub fn saturation_vapor_pressure(kelvin: f64) -> f64 {
    (-0.58002206e4 / kelvin + 0.13914993e1 - 0.48640239e-1 * kelvin
        + 0.41764768e-4 * kelvin.powi(2)
        - 0.14452093e-7 * kelvin.powi(3)
        + 0.65459673e1 * kelvin.ln())
    .exp()
        / 100.0
}

/// Virtual temperature in kelvin for a water-vapour mixing ratio `r` (kg/kg).
pub fn virtual_temperature(kelvin: f64, mixing_ratio: f64, gas: &GasConstants) -> f64 {
    let epsilon = gas.dry_air / gas.water_vapor;
    kelvin * (1.0 + mixing_ratio / epsilon) / (1.0 + mixing_ratio)
}

/// Speed of sound in m/s.
pub fn speed_of_sound(ambient: &AmbientConditions, gas: &GasConstants) -> Result<f64> {
    ambient.validate()?;
    let kelvin = ambient.kelvin();
    let epsilon = gas.dry_air / gas.water_vapor;

    let e_sat = saturation_vapor_pressure(kelvin);
    if e_sat >= ambient.pressure {
        return Err(AnemometerError::InvalidAmbient(format!(
            "saturation vapour pressure {e_sat:.1} hPa exceeds the air pressure {} hPa",
            ambient.pressure
        )));
    }
    let r_sat = epsilon * e_sat / (ambient.pressure - e_sat);
    let r = r_sat * ambient.relative_humidity;

    Ok((gas.gamma * gas.dry_air * virtual_temperature(kelvin, r, gas)).sqrt())
}
