//! # session-capture-core
//!
//! Platform-agnostic core of the session capture kit.
//!
//! Records a voice session by pulling two independently clocked audio
//! streams (microphone + system loopback), mixing them block by block, and
//! committing the result to a 16-bit PCM WAV file. Host-audio backends
//! implement the `DeviceCatalog` and `StreamBackend` traits and plug into
//! the generic `SessionRecorder`.
//!
//! ## Architecture
//!
//! ```text
//! session-capture-core (this crate)
//! ├── traits/       ← DeviceCatalog, StreamBackend, StreamReader, RecorderDelegate, RecordingService
//! ├── models/       ← RecorderError, RecorderState, RecorderConfig, AudioEndpoint, Frame, ...
//! ├── processing/   ← BlockMixer, WAV header + PCM encoding
//! ├── session/      ← SessionRecorder (generic orchestrator)
//! └── storage/      ← WAV file commit, metadata sidecar
//! ```

pub mod models;
pub mod processing;
pub mod session;
pub mod storage;
pub mod traits;

// Re-export key types at crate root for convenience.
pub use models::config::{MixPreset, RecorderConfig};
pub use models::endpoint::{AudioEndpoint, EndpointId, EndpointKind};
pub use models::error::RecorderError;
pub use models::frame::{Frame, MixedBlock};
pub use models::levels::{AudioLevels, SessionDiagnostics};
pub use models::outcome::RecordingOutcome;
pub use models::state::RecorderState;
pub use processing::mixer::BlockMixer;
pub use session::recorder::SessionRecorder;
pub use storage::metadata::RecordingMetadata;
pub use traits::catalog::DeviceCatalog;
pub use traits::delegate::RecorderDelegate;
pub use traits::service::RecordingService;
pub use traits::stream::{StreamBackend, StreamReader, StreamSpec};
