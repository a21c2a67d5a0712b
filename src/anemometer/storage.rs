//! JSON files for echo frames, calibration records and phase references.

use std::fs;
use std::io::{self, ErrorKind};
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::anemometer::EchoSource;
use super::calibration::CalibrationRecord;
use super::error::{AnemometerError, Result};
use super::resolver::PhaseReference;
use super::EchoSet;

/// An echo file holds either one frame or a list of frames.
#[derive(Deserialize)]
#[serde(untagged)]
enum EchoFile {
    Frames(Vec<EchoSet>),
    Single(EchoSet),
}

pub fn load_echo_frames(path: &Path) -> Result<Vec<EchoSet>> {
    let text = fs::read_to_string(path)?;
    let file: EchoFile = serde_json::from_str(&text)?;
    let frames = match file {
        EchoFile::Frames(frames) => frames,
        EchoFile::Single(frame) => vec![frame],
    };
    debug!(path = %path.display(), frames = frames.len(), "loaded echoes");
    Ok(frames)
}

pub fn save_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value)?;
    fs::write(path, text)?;
    Ok(())
}

fn read_calibration_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = fs::read_to_string(path).map_err(|err| missing_or_io(path, err))?;
    serde_json::from_str(&text).map_err(|err| {
        AnemometerError::InvalidCalibration(format!("{}: {err}", path.display()))
    })
}

fn missing_or_io(path: &Path, err: io::Error) -> AnemometerError {
    match err.kind() {
        ErrorKind::NotFound => AnemometerError::MissingCalibration(path.display().to_string()),
        _ => AnemometerError::Io(err),
    }
}

/// Fails with `MissingCalibration` when the file does not exist and with
/// `InvalidCalibration` when it lacks a direction or holds unusable values.
pub fn load_calibration(path: &Path) -> Result<CalibrationRecord> {
    let record: CalibrationRecord = read_calibration_file(path)?;
    record.validate()?;
    Ok(record)
}

pub fn load_phase_reference(path: &Path) -> Result<PhaseReference> {
    read_calibration_file(path)
}

/// Replays the frames of an echo file, `frames` at a time. Once exhausted it
/// yields nothing, like an acquisition that keeps discarding frames.
pub struct FileEchoSource {
    frames: Vec<EchoSet>,
    position: usize,
}

impl FileEchoSource {
    pub fn open(path: &Path) -> Result<FileEchoSource> {
        Ok(FileEchoSource::new(load_echo_frames(path)?))
    }

    pub fn new(frames: Vec<EchoSet>) -> FileEchoSource {
        FileEchoSource {
            frames,
            position: 0,
        }
    }
}

impl EchoSource for FileEchoSource {
    fn acquire(&mut self, frames: usize) -> Result<Vec<EchoSet>> {
        let end = (self.position + frames).min(self.frames.len());
        let chunk = self.frames[self.position..end].to_vec();
        self.position = end;
        Ok(chunk)
    }
}
