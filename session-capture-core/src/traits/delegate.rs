use crate::models::error::RecorderError;
use crate::models::levels::AudioLevels;
use crate::models::outcome::RecordingOutcome;
use crate::models::state::RecorderState;

/// Event sink for recorder notifications.
///
/// All methods are called from capture or mix threads, never the control
/// thread. Implementations should marshal to the UI thread if needed and
/// keep the callbacks light.
pub trait RecorderDelegate: Send + Sync {
    /// Called when the session state changes.
    fn on_state_changed(&self, state: &RecorderState);

    /// Called once per mix cycle with updated levels.
    fn on_levels_updated(&self, levels: &AudioLevels);

    /// Called when a stream fails mid-session.
    fn on_error(&self, error: &RecorderError);

    /// Called when a recording is committed to disk.
    fn on_recording_finished(&self, outcome: &RecordingOutcome);
}
