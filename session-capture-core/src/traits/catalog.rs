use crate::models::endpoint::AudioEndpoint;
use crate::models::error::RecorderError;

/// Enumeration of the host's audio endpoints.
///
/// Both queries re-enumerate on every call; devices can be hot-plugged,
/// so results are never cached.
pub trait DeviceCatalog {
    /// Input-capable endpoints (microphones).
    fn list_inputs(&self) -> Result<Vec<AudioEndpoint>, RecorderError>;

    /// Endpoints capturable as system loopback.
    ///
    /// Returns an empty list (not an error) when the host has no loopback
    /// support.
    fn list_outputs(&self) -> Result<Vec<AudioEndpoint>, RecorderError>;
}
