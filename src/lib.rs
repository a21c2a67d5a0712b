//! Ultrasonic time-of-flight anemometer.
//!
//! Turns per-direction echo waveforms into sub-sample time-of-flight values,
//! calibrates systematic latency against a psychrometric speed-of-sound model
//! and resolves the wind components along each transducer axis.

pub mod anemometer;

pub use anemometer::config::AnemometerConfig;
pub use anemometer::error::{AnemometerError, Result};
pub use anemometer::{Axis, Direction, EchoSet, PerDirection, WindReading, WindSpeed};
