//! # session-capture-cpal
//!
//! Host-audio backend for the session capture kit, built on `cpal`.
//!
//! Provides:
//! - `CpalHost` — device catalog plus stream factory over the default
//!   `cpal` host
//! - `CpalStreamReader` — blocking block-oriented reader fed by a dedicated
//!   capture thread
//!
//! System-audio capture uses WASAPI loopback: on Windows an input stream is
//! opened directly on a render endpoint. Hosts without loopback support
//! report an empty output catalog.
//!
//! ## Usage
//! ```ignore
//! use session_capture_core::{RecorderConfig, SessionRecorder};
//! use session_capture_cpal::CpalHost;
//!
//! let host = CpalHost::new();
//! let mut recorder = SessionRecorder::new(host, RecorderConfig::default())?;
//! ```

mod assembler;
pub mod catalog;
pub mod reader;

pub use catalog::CpalHost;
pub use reader::CpalStreamReader;
