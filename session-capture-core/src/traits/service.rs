use crate::models::endpoint::{AudioEndpoint, EndpointId};
use crate::models::error::RecorderError;
use crate::models::outcome::RecordingOutcome;
use crate::models::state::RecorderState;

/// The surface consumed by the recording window.
///
/// The GUI depends on this trait rather than the concrete recorder so it
/// can be driven by a stub in tests.
pub trait RecordingService: Send {
    fn list_inputs(&self) -> Result<Vec<AudioEndpoint>, RecorderError>;

    fn list_outputs(&self) -> Result<Vec<AudioEndpoint>, RecorderError>;

    /// Begin a session. `system` may be `None` for microphone-only capture.
    fn start(&mut self, mic: EndpointId, system: Option<EndpointId>) -> Result<(), RecorderError>;

    /// End the session and commit the recording, returning its outcome.
    fn stop(&mut self) -> Result<RecordingOutcome, RecorderError>;

    fn status(&self) -> RecorderState;
}
