use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::models::error::RecorderError;
use crate::models::frame::MixedBlock;
use crate::processing::wav_format;

/// A recording committed to disk.
#[derive(Debug, Clone, PartialEq)]
pub struct CommittedFile {
    pub path: PathBuf,
    /// PCM payload size in bytes, excluding the 44-byte header.
    pub data_bytes: u64,
    /// SHA-256 hex digest of the complete file.
    pub checksum: String,
}

/// Write accumulated mixed blocks as a 16-bit PCM WAV file.
///
/// The parent directory is created on demand. The total data size is known
/// up front, so the header is written once with final sizes and the file
/// needs no seek-back patching. The checksum is computed while writing.
pub fn commit_wav(
    path: &Path,
    sample_rate: u32,
    channels: u16,
    blocks: &[MixedBlock],
) -> Result<CommittedFile, RecorderError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .map_err(|e| RecorderError::FileWrite(format!("failed to create directory: {}", e)))?;
        }
    }

    let total_samples: usize = blocks.iter().map(|b| b.samples.len()).sum();
    let data_size = (total_samples * 2) as u32;

    let file = File::create(path)
        .map_err(|e| RecorderError::FileWrite(format!("failed to create file: {}", e)))?;
    let mut writer = BufWriter::new(file);
    let mut hasher = Sha256::new();

    let header = wav_format::wav_header(sample_rate, 16, channels, data_size);
    writer
        .write_all(&header)
        .map_err(|e| RecorderError::FileWrite(e.to_string()))?;
    hasher.update(header);

    for block in blocks {
        let pcm = wav_format::encode_i16_le(&block.samples);
        writer
            .write_all(&pcm)
            .map_err(|e| RecorderError::FileWrite(e.to_string()))?;
        hasher.update(&pcm);
    }

    writer
        .flush()
        .map_err(|e| RecorderError::FileWrite(e.to_string()))?;

    Ok(CommittedFile {
        path: path.to_path_buf(),
        data_bytes: data_size as u64,
        checksum: hex_encode(&hasher.finalize()),
    })
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
