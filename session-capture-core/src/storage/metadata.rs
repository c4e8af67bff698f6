use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::models::error::RecorderError;

/// Metadata stored alongside a recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingMetadata {
    pub id: String,
    pub created_at: String,
    pub duration_secs: f64,
    pub file_path: String,
    pub checksum: String,
    pub sample_rate: u32,
    pub channels: u16,
    pub blocks_written: u64,
    pub mic_endpoint: String,
    pub system_endpoint: Option<String>,
    pub mic_only: bool,
}

impl RecordingMetadata {
    /// Creates metadata for a finished session.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        duration_secs: f64,
        file_path: &str,
        checksum: &str,
        sample_rate: u32,
        channels: u16,
        blocks_written: u64,
        mic_endpoint: &str,
        system_endpoint: Option<&str>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
            duration_secs,
            file_path: file_path.to_string(),
            checksum: checksum.to_string(),
            sample_rate,
            channels,
            blocks_written,
            mic_endpoint: mic_endpoint.to_string(),
            system_endpoint: system_endpoint.map(str::to_string),
            mic_only: system_endpoint.is_none(),
        }
    }
}

/// Write recording metadata as a JSON sidecar file.
///
/// Creates `{recording_path}.metadata.json` alongside the recording.
pub fn write_sidecar(metadata: &RecordingMetadata, recording_path: &Path) -> Result<(), RecorderError> {
    let sidecar_path = recording_path.with_extension("metadata.json");
    let json = serde_json::to_string_pretty(metadata)
        .map_err(|e| RecorderError::FileWrite(format!("failed to serialize metadata: {}", e)))?;
    fs::write(&sidecar_path, json)
        .map_err(|e| RecorderError::FileWrite(format!("failed to write metadata: {}", e)))?;
    Ok(())
}

/// Read recording metadata from a JSON sidecar file.
pub fn read_sidecar(recording_path: &Path) -> Result<RecordingMetadata, RecorderError> {
    let sidecar_path = recording_path.with_extension("metadata.json");
    let json = fs::read_to_string(&sidecar_path)
        .map_err(|e| RecorderError::FileWrite(format!("failed to read metadata: {}", e)))?;
    serde_json::from_str(&json)
        .map_err(|e| RecorderError::FileWrite(format!("failed to parse metadata: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sidecar_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let recording = dir.path().join("session_20260101_120000.wav");
        fs::write(&recording, b"").unwrap();

        let metadata = RecordingMetadata::new(
            12.5,
            recording.to_str().unwrap(),
            "abc123",
            44_100,
            2,
            538,
            "Desk Microphone",
            Some("Speakers (System Audio)"),
        );

        write_sidecar(&metadata, &recording).unwrap();
        let loaded = read_sidecar(&recording).unwrap();

        assert_eq!(loaded, metadata);
        assert!(!loaded.mic_only);
    }

    #[test]
    fn mic_only_flag_follows_system_endpoint() {
        let metadata = RecordingMetadata::new(1.0, "a.wav", "x", 44_100, 1, 43, "Mic", None);
        assert!(metadata.mic_only);
        assert_eq!(metadata.system_endpoint, None);
    }
}
