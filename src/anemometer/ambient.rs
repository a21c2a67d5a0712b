use std::fs;
use std::path::{Path, PathBuf};

use bmp280::{Bmp280, Bmp280Builder};
use tracing::debug;

use super::error::{AnemometerError, Result};
use super::psychrometry::AmbientConditions;

/// DHT22 relative humidity exposed by the Linux IIO driver, in milli-percent.
pub const DHT22_HUMIDITY: &str = "/sys/bus/iio/devices/iio:device0/in_humidityrelative_input";

/// Ambient conditions for calibration: temperature and pressure from a BMP280,
/// relative humidity from a DHT22.
pub struct AmbientSensors {
    bmp280_controller: Bmp280,
    dht22_fs_humidity: PathBuf,
}

impl AmbientSensors {
    /// Opens the BMP280 on the given I2C bus at address 0x76.
    pub fn new(i2c_path: &str, dht22_fs_humidity: &Path) -> Result<AmbientSensors> {
        let bmp280_controller = Bmp280Builder::new()
            .path(i2c_path)
            .address(0x76)
            .build()
            .map_err(|e| AnemometerError::Sensor(format!("BMP280 on {i2c_path}: {e}")))?;

        Ok(AmbientSensors {
            bmp280_controller,
            dht22_fs_humidity: dht22_fs_humidity.to_path_buf(),
        })
    }

    pub fn read(&mut self) -> Result<AmbientConditions> {
        let temperature = self
            .bmp280_controller
            .temperature_celsius()
            .map_err(|e| AnemometerError::Sensor(format!("BMP280 temperature: {e}")))?;
        let pressure_kpa = self
            .bmp280_controller
            .pressure_kpa()
            .map_err(|e| AnemometerError::Sensor(format!("BMP280 pressure: {e}")))?;

        let text = fs::read_to_string(&self.dht22_fs_humidity)?;
        let humidity_percent = parse_milli(&text)?;

        let ambient = AmbientConditions::new(
            f64::from(temperature),
            f64::from(pressure_kpa) * 10.0,
            humidity_percent / 100.0,
        );
        debug!(?ambient, "ambient conditions");
        ambient.validate()?;
        Ok(ambient)
    }
}

/// Parses a sysfs reading scaled by 1000 (e.g. `"56300\n"` -> 56.3).
pub fn parse_milli(text: &str) -> Result<f64> {
    text.trim_end()
        .parse::<f64>()
        .map(|value| value / 1000.0)
        .map_err(|e| AnemometerError::Sensor(format!("unreadable sysfs value {text:?}: {e}")))
}
