use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;

use crate::models::config::RecorderConfig;
use crate::models::endpoint::EndpointId;
use crate::models::error::RecorderError;
use crate::models::frame::{Frame, MixedBlock};
use crate::models::levels::{AudioLevels, SessionDiagnostics};
use crate::models::outcome::RecordingOutcome;
use crate::models::state::RecorderState;
use crate::processing::mixer::{peak_level, rms_level, BlockMixer};
use crate::storage::metadata::{self, RecordingMetadata};
use crate::storage::wav_file;
use crate::traits::catalog::DeviceCatalog;
use crate::traits::delegate::RecorderDelegate;
use crate::traits::service::RecordingService;
use crate::traits::stream::{StreamBackend, StreamReader, StreamSpec};

/// How often a blocked mix-loop receive wakes up to check the abort flag.
const MIX_POLL: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamRole {
    Mic,
    System,
}

impl StreamRole {
    fn name(self) -> &'static str {
        match self {
            Self::Mic => "mic",
            Self::System => "system",
        }
    }
}

/// State shared between the control thread and the capture/mix threads.
struct Shared {
    state: Mutex<RecorderState>,
    levels: Mutex<AudioLevels>,
    diagnostics: Mutex<SessionDiagnostics>,
    failure: Mutex<Option<RecorderError>>,
    delegate: Mutex<Option<Arc<dyn RecorderDelegate>>>,
}

impl Shared {
    fn new() -> Self {
        Self {
            state: Mutex::new(RecorderState::Idle),
            levels: Mutex::new(AudioLevels::default()),
            diagnostics: Mutex::new(SessionDiagnostics::default()),
            failure: Mutex::new(None),
            delegate: Mutex::new(None),
        }
    }

    fn set_state(&self, new_state: RecorderState) {
        *self.state.lock() = new_state.clone();
        if let Some(delegate) = self.delegate.lock().clone() {
            delegate.on_state_changed(&new_state);
        }
    }

    /// Record the first mid-session failure. The session only transitions
    /// to `Failed` while recording; a failure that races a user-initiated
    /// stop is kept and surfaced from `stop()` without disturbing
    /// finalization.
    fn record_failure(&self, error: RecorderError) {
        {
            let mut failure = self.failure.lock();
            if failure.is_some() {
                return;
            }
            *failure = Some(error.clone());
        }
        if self.state.lock().is_recording() {
            self.set_state(RecorderState::Failed(error.clone()));
        }
        if let Some(delegate) = self.delegate.lock().clone() {
            delegate.on_error(&error);
        }
    }
}

/// Handles and buffers belonging to the session currently in flight.
struct ActiveSession {
    cancel: Arc<AtomicBool>,
    mix_abort: Arc<AtomicBool>,
    reader_handles: Vec<JoinHandle<()>>,
    done_rx: Receiver<StreamRole>,
    mix_handle: JoinHandle<()>,
    blocks: Arc<Mutex<Vec<MixedBlock>>>,
    output_channels: u16,
    mic_name: String,
    system_name: Option<String>,
}

/// Recording session orchestrator, generic over the host audio backend.
///
/// Data flow:
/// ```text
/// [mic StreamReader] ── reader thread ──┐ bounded queue
///                                        ├→ [mix loop] → pending blocks → WAV commit
/// [loopback StreamReader] ─ reader thread┘ bounded queue
/// ```
///
/// Each reader thread pulls blocks from its endpoint and pushes them into a
/// bounded hand-off queue; a full queue blocks that reader (backpressure)
/// while hardware pacing keeps production at real-time rate. The mix loop
/// pairs frames by per-stream arrival order and is the only writer of the
/// pending-block buffer. The control thread only reads status and drives
/// `start`/`stop`.
pub struct SessionRecorder<H: DeviceCatalog + StreamBackend> {
    host: H,
    config: RecorderConfig,
    shared: Arc<Shared>,
    active: Option<ActiveSession>,
}

impl<H: DeviceCatalog + StreamBackend> SessionRecorder<H> {
    pub fn new(host: H, config: RecorderConfig) -> Result<Self, RecorderError> {
        config.validate().map_err(RecorderError::InvalidConfiguration)?;
        Ok(Self {
            host,
            config,
            shared: Arc::new(Shared::new()),
            active: None,
        })
    }

    pub fn set_delegate(&self, delegate: Arc<dyn RecorderDelegate>) {
        *self.shared.delegate.lock() = Some(delegate);
    }

    pub fn config(&self) -> &RecorderConfig {
        &self.config
    }

    pub fn status(&self) -> RecorderState {
        self.shared.state.lock().clone()
    }

    pub fn current_levels(&self) -> AudioLevels {
        *self.shared.levels.lock()
    }

    pub fn diagnostics(&self) -> SessionDiagnostics {
        self.shared.diagnostics.lock().clone()
    }

    /// Begin a session on the given endpoints.
    ///
    /// `system = None`, or a catalog with no loopback endpoints, degrades to
    /// microphone-only capture (mono output) instead of failing. Endpoint
    /// ids are validated against a fresh catalog snapshot before anything is
    /// opened; an open failure releases whatever was already reserved and
    /// leaves the session `Idle`.
    pub fn start(&mut self, mic: EndpointId, system: Option<EndpointId>) -> Result<(), RecorderError> {
        if !self.shared.state.lock().is_idle() {
            return Err(RecorderError::AlreadyRecording);
        }

        let inputs = self.host.list_inputs()?;
        let mic_endpoint = inputs
            .into_iter()
            .find(|e| e.id == mic)
            .ok_or_else(|| RecorderError::InvalidDeviceSelection(format!("input endpoint {} not found", mic)))?;

        let outputs = self.host.list_outputs()?;
        let system_endpoint = match system {
            Some(_) if outputs.is_empty() => {
                log::warn!("no loopback endpoints available, recording microphone only");
                None
            }
            Some(id) => Some(outputs.into_iter().find(|e| e.id == id).ok_or_else(|| {
                RecorderError::InvalidDeviceSelection(format!("loopback endpoint {} not found", id))
            })?),
            None => None,
        };

        let mic_only = system_endpoint.is_none();
        let output_channels = if mic_only { 1 } else { self.config.output_channels };

        let mut mic_reader = self.host.open(
            &mic_endpoint,
            StreamSpec {
                channels: 1,
                sample_rate: self.config.sample_rate,
                block_size: self.config.block_size,
            },
        )?;

        let system_reader = match &system_endpoint {
            Some(endpoint) => {
                let spec = StreamSpec {
                    channels: endpoint.channels.clamp(1, 2),
                    sample_rate: self.config.sample_rate,
                    block_size: self.config.block_size,
                };
                match self.host.open(endpoint, spec) {
                    Ok(reader) => Some(reader),
                    Err(err) => {
                        mic_reader.close();
                        return Err(err);
                    }
                }
            }
            None => None,
        };

        *self.shared.levels.lock() = AudioLevels::default();
        *self.shared.diagnostics.lock() = SessionDiagnostics::default();
        *self.shared.failure.lock() = None;
        self.shared.set_state(RecorderState::Recording { mic_only });

        let cancel = Arc::new(AtomicBool::new(false));
        let mix_abort = Arc::new(AtomicBool::new(false));
        let blocks = Arc::new(Mutex::new(Vec::new()));
        let (done_tx, done_rx) = bounded::<StreamRole>(2);

        let (mic_tx, mic_rx) = bounded::<Frame>(self.config.queue_capacity);
        let mut reader_handles = vec![spawn_reader(
            mic_reader,
            StreamRole::Mic,
            mic_tx,
            Arc::clone(&cancel),
            Arc::clone(&self.shared),
            done_tx.clone(),
        )];

        let system_rx = system_reader.map(|reader| {
            let (sys_tx, sys_rx) = bounded::<Frame>(self.config.queue_capacity);
            reader_handles.push(spawn_reader(
                reader,
                StreamRole::System,
                sys_tx,
                Arc::clone(&cancel),
                Arc::clone(&self.shared),
                done_tx.clone(),
            ));
            sys_rx
        });
        drop(done_tx);

        let mixer = BlockMixer::new(self.config.mix_preset, output_channels);
        let mix_handle = spawn_mixer(
            mixer,
            mic_rx,
            system_rx,
            Arc::clone(&blocks),
            Arc::clone(&self.shared),
            Arc::clone(&mix_abort),
        );

        log::info!(
            "recording started (mic: {}, system: {})",
            mic_endpoint.name,
            system_endpoint.as_ref().map(|e| e.name.as_str()).unwrap_or("none"),
        );

        self.active = Some(ActiveSession {
            cancel,
            mix_abort,
            reader_handles,
            done_rx,
            mix_handle,
            blocks,
            output_channels,
            mic_name: mic_endpoint.name,
            system_name: system_endpoint.map(|e| e.name),
        });
        Ok(())
    }

    /// End the session and commit the recording.
    ///
    /// Raises the cooperative cancel flag, waits for both readers to confirm
    /// termination (bounded by the shutdown grace period), drains in-flight
    /// frames, then writes `session_<UTC timestamp>.wav` plus its metadata
    /// sidecar. A session that failed mid-flight is still flushed
    /// best-effort before the stored error is returned.
    pub fn stop(&mut self) -> Result<RecordingOutcome, RecorderError> {
        {
            let state = self.shared.state.lock();
            if !(state.is_recording() || state.is_failed()) {
                return Err(RecorderError::NoActiveSession);
            }
        }
        let Some(active) = self.active.take() else {
            return Err(RecorderError::NoActiveSession);
        };

        self.shared.set_state(RecorderState::Finalizing);
        active.cancel.store(true, Ordering::SeqCst);

        let expected = active.reader_handles.len();
        let mut confirmed = 0;
        let mut timed_out = false;
        while confirmed < expected {
            match active.done_rx.recv_timeout(self.config.shutdown_grace) {
                Ok(role) => {
                    log::debug!("{} reader terminated", role.name());
                    confirmed += 1;
                }
                Err(_) => {
                    timed_out = true;
                    break;
                }
            }
        }

        if timed_out {
            let err = RecorderError::ShutdownTimeout(self.config.shutdown_grace);
            log::error!("{}", err);
            self.shared.record_failure(err);
            // The straggler thread is abandoned with its handle; tell the
            // mix loop to stop waiting on its queue.
            active.mix_abort.store(true, Ordering::SeqCst);
        } else {
            for handle in active.reader_handles {
                let _ = handle.join();
            }
        }
        let _ = active.mix_handle.join();

        let blocks = std::mem::take(&mut *active.blocks.lock());
        let blocks_written = blocks.len() as u64;
        self.shared.diagnostics.lock().blocks_written = blocks_written;

        let total_samples: usize = blocks.iter().map(|b| b.samples.len()).sum();
        let total_frames = total_samples / active.output_channels as usize;
        let duration_secs = total_frames as f64 / self.config.sample_rate as f64;

        let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S");
        let file_path = self.config.output_directory.join(format!("session_{}.wav", timestamp));

        let failure = self.shared.failure.lock().take();
        let result = wav_file::commit_wav(&file_path, self.config.sample_rate, active.output_channels, &blocks)
            .map(|committed| {
                let metadata = RecordingMetadata::new(
                    duration_secs,
                    &committed.path.to_string_lossy(),
                    &committed.checksum,
                    self.config.sample_rate,
                    active.output_channels,
                    blocks_written,
                    &active.mic_name,
                    active.system_name.as_deref(),
                );
                if let Err(err) = metadata::write_sidecar(&metadata, &committed.path) {
                    log::warn!("failed to write metadata sidecar: {}", err);
                }
                RecordingOutcome {
                    file_path: committed.path,
                    duration_secs,
                    blocks_written,
                    checksum: committed.checksum,
                    metadata,
                }
            });

        self.shared.set_state(RecorderState::Idle);

        match (failure, result) {
            (None, Ok(outcome)) => {
                log::info!("recording saved to {}", outcome.file_path.display());
                if let Some(delegate) = self.shared.delegate.lock().clone() {
                    delegate.on_recording_finished(&outcome);
                }
                Ok(outcome)
            }
            (None, Err(err)) => {
                log::error!("failed to commit recording: {}", err);
                Err(err)
            }
            (Some(failure), Ok(outcome)) => {
                log::info!("partial recording saved to {}", outcome.file_path.display());
                Err(failure)
            }
            (Some(failure), Err(err)) => {
                log::error!("failed to save partial recording: {}", err);
                Err(failure)
            }
        }
    }
}

impl<H> RecordingService for SessionRecorder<H>
where
    H: DeviceCatalog + StreamBackend + Send,
{
    fn list_inputs(&self) -> Result<Vec<crate::models::endpoint::AudioEndpoint>, RecorderError> {
        self.host.list_inputs()
    }

    fn list_outputs(&self) -> Result<Vec<crate::models::endpoint::AudioEndpoint>, RecorderError> {
        self.host.list_outputs()
    }

    fn start(&mut self, mic: EndpointId, system: Option<EndpointId>) -> Result<(), RecorderError> {
        SessionRecorder::start(self, mic, system)
    }

    fn stop(&mut self) -> Result<RecordingOutcome, RecorderError> {
        SessionRecorder::stop(self)
    }

    fn status(&self) -> RecorderState {
        SessionRecorder::status(self)
    }
}

/// Reader loop: pull blocks from the endpoint until cancelled, pushing each
/// into the bounded hand-off queue. Runs on its own thread so a stall on
/// this endpoint never blocks the other.
fn spawn_reader<R: StreamReader + 'static>(
    mut reader: R,
    role: StreamRole,
    frames: Sender<Frame>,
    cancel: Arc<AtomicBool>,
    shared: Arc<Shared>,
    done: Sender<StreamRole>,
) -> JoinHandle<()> {
    thread::Builder::new()
        .name(format!("{}-reader", role.name()))
        .spawn(move || {
            while !cancel.load(Ordering::SeqCst) {
                match reader.read_block() {
                    Ok(frame) => {
                        {
                            let mut diagnostics = shared.diagnostics.lock();
                            match role {
                                StreamRole::Mic => diagnostics.mic_blocks_read += 1,
                                StreamRole::System => diagnostics.system_blocks_read += 1,
                            }
                        }
                        // A full queue blocks here until the mix loop
                        // catches up; hardware pacing bounds the wait.
                        if frames.send(frame).is_err() {
                            break;
                        }
                    }
                    Err(err) => {
                        log::error!("{} stream failed: {}", role.name(), err);
                        shared.record_failure(err);
                        cancel.store(true, Ordering::SeqCst);
                        break;
                    }
                }
            }

            let overruns = reader.overruns();
            if overruns > 0 {
                log::warn!("{} stream dropped {} blocks to overruns", role.name(), overruns);
            }
            {
                let mut diagnostics = shared.diagnostics.lock();
                match role {
                    StreamRole::Mic => diagnostics.mic_overruns = overruns,
                    StreamRole::System => diagnostics.system_overruns = overruns,
                }
            }
            reader.close();
            let _ = done.send(role);
        })
        .expect("failed to spawn reader thread")
}

/// Mix loop: pair one frame from each queue in arrival order, mix, append
/// to the pending buffer with a strictly increasing sequence number. Sole
/// writer of the pending-block buffer.
fn spawn_mixer(
    mixer: BlockMixer,
    mic_rx: Receiver<Frame>,
    system_rx: Option<Receiver<Frame>>,
    blocks: Arc<Mutex<Vec<MixedBlock>>>,
    shared: Arc<Shared>,
    abort: Arc<AtomicBool>,
) -> JoinHandle<()> {
    thread::Builder::new()
        .name("mix-loop".into())
        .spawn(move || {
            let mut sequence = 0u64;
            loop {
                let Some(mic_frame) = next_frame(&mic_rx, &abort) else {
                    break;
                };
                let system_frame = match &system_rx {
                    Some(rx) => match next_frame(rx, &abort) {
                        Some(frame) => Some(frame),
                        None => break,
                    },
                    None => None,
                };

                let levels = {
                    let mut levels = shared.levels.lock();
                    levels.mic_rms = rms_level(&mic_frame.samples);
                    levels.mic_peak = peak_level(&mic_frame.samples);
                    if let Some(frame) = &system_frame {
                        levels.system_rms = rms_level(&frame.samples);
                        levels.system_peak = peak_level(&frame.samples);
                    }
                    *levels
                };

                let block = match &system_frame {
                    Some(frame) => mixer.mix(&mic_frame, frame, sequence),
                    None => mixer.passthrough(&mic_frame, sequence),
                };
                sequence += 1;

                shared.diagnostics.lock().mix_cycles += 1;
                blocks.lock().push(block);

                if let Some(delegate) = shared.delegate.lock().clone() {
                    delegate.on_levels_updated(&levels);
                }
            }
            log::debug!("mix loop exiting after {} blocks", sequence);
        })
        .expect("failed to spawn mix thread")
}

/// Next frame from `rx`. Blocks while the stream is live, drains whatever
/// is already queued once the sender side hangs up, and gives up promptly
/// when `abort` is raised (abandoned reader).
fn next_frame(rx: &Receiver<Frame>, abort: &AtomicBool) -> Option<Frame> {
    loop {
        if abort.load(Ordering::SeqCst) {
            return None;
        }
        match rx.recv_timeout(MIX_POLL) {
            Ok(frame) => return Some(frame),
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => return None,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::f32::consts::TAU;
    use std::fs;
    use std::path::Path;
    use std::time::Instant;

    use super::*;
    use crate::models::endpoint::{AudioEndpoint, EndpointKind};
    use crate::storage::metadata::read_sidecar;

    const TEST_RATE: u32 = 44_100;
    // Small blocks keep the paced synthetic streams fast in tests.
    const TEST_BLOCK: usize = 256;

    fn input_endpoint(id: u32, name: &str) -> AudioEndpoint {
        AudioEndpoint {
            id: EndpointId(id),
            name: name.into(),
            kind: EndpointKind::Input,
            channels: 1,
            sample_rate: TEST_RATE,
            is_default: true,
        }
    }

    fn loopback_endpoint(id: u32, name: &str) -> AudioEndpoint {
        AudioEndpoint {
            id: EndpointId(id),
            name: name.into(),
            kind: EndpointKind::Loopback,
            channels: 2,
            sample_rate: TEST_RATE,
            is_default: false,
        }
    }

    /// Backend producing hardware-paced 440 Hz sine blocks.
    struct SyntheticHost {
        inputs: Vec<AudioEndpoint>,
        outputs: Vec<AudioEndpoint>,
        fail_mic_after: Option<u64>,
    }

    impl SyntheticHost {
        fn new() -> Self {
            Self {
                inputs: vec![input_endpoint(2, "Desk Microphone")],
                outputs: vec![loopback_endpoint(5, "Speakers (System Audio)")],
                fail_mic_after: None,
            }
        }

        fn without_loopback() -> Self {
            Self {
                outputs: Vec::new(),
                ..Self::new()
            }
        }
    }

    impl DeviceCatalog for SyntheticHost {
        fn list_inputs(&self) -> Result<Vec<AudioEndpoint>, RecorderError> {
            Ok(self.inputs.clone())
        }

        fn list_outputs(&self) -> Result<Vec<AudioEndpoint>, RecorderError> {
            Ok(self.outputs.clone())
        }
    }

    impl StreamBackend for SyntheticHost {
        type Reader = SyntheticReader;

        fn open(&self, endpoint: &AudioEndpoint, spec: StreamSpec) -> Result<SyntheticReader, RecorderError> {
            let known = self.inputs.iter().chain(&self.outputs).any(|e| e.id == endpoint.id);
            if !known {
                return Err(RecorderError::DeviceOpen {
                    endpoint: endpoint.id,
                    reason: "endpoint not present".into(),
                });
            }
            let fail_after = match endpoint.kind {
                EndpointKind::Input => self.fail_mic_after,
                EndpointKind::Loopback => None,
            };
            Ok(SyntheticReader {
                spec,
                sequence: 0,
                phase: 0.0,
                fail_after,
            })
        }
    }

    struct SyntheticReader {
        spec: StreamSpec,
        sequence: u64,
        phase: f32,
        fail_after: Option<u64>,
    }

    impl StreamReader for SyntheticReader {
        fn read_block(&mut self) -> Result<Frame, RecorderError> {
            if let Some(limit) = self.fail_after {
                if self.sequence >= limit {
                    return Err(RecorderError::StreamFailed("synthetic device unplugged".into()));
                }
            }
            // Pace like hardware: one block per block-duration.
            thread::sleep(Duration::from_secs_f64(
                self.spec.block_size as f64 / self.spec.sample_rate as f64,
            ));
            let step = TAU * 440.0 / self.spec.sample_rate as f32;
            let mut samples = Vec::with_capacity(self.spec.block_size * self.spec.channels as usize);
            for _ in 0..self.spec.block_size {
                let value = 0.25 * self.phase.sin();
                self.phase += step;
                for _ in 0..self.spec.channels {
                    samples.push(value);
                }
            }
            let frame = Frame {
                samples,
                channels: self.spec.channels,
                sequence: self.sequence,
                captured_at: Instant::now(),
            };
            self.sequence += 1;
            Ok(frame)
        }

        fn overruns(&self) -> u64 {
            0
        }

        fn close(&mut self) {}
    }

    fn test_config(dir: &Path) -> RecorderConfig {
        RecorderConfig {
            sample_rate: TEST_RATE,
            block_size: TEST_BLOCK,
            output_directory: dir.join("recordings"),
            ..Default::default()
        }
    }

    fn wav_header_fields(path: &Path) -> (u16, u32, u16, u32) {
        let data = fs::read(path).unwrap();
        let channels = u16::from_le_bytes([data[22], data[23]]);
        let sample_rate = u32::from_le_bytes([data[24], data[25], data[26], data[27]]);
        let bit_depth = u16::from_le_bytes([data[34], data[35]]);
        let data_size = u32::from_le_bytes([data[40], data[41], data[42], data[43]]);
        (channels, sample_rate, bit_depth, data_size)
    }

    #[test]
    fn stop_while_idle_is_benign() {
        let dir = tempfile::tempdir().unwrap();
        let mut recorder = SessionRecorder::new(SyntheticHost::new(), test_config(dir.path())).unwrap();

        assert_eq!(recorder.stop().unwrap_err(), RecorderError::NoActiveSession);
        assert_eq!(recorder.status(), RecorderState::Idle);
    }

    #[test]
    fn start_while_recording_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut recorder = SessionRecorder::new(SyntheticHost::new(), test_config(dir.path())).unwrap();

        recorder.start(EndpointId(2), Some(EndpointId(5))).unwrap();
        assert_eq!(
            recorder.start(EndpointId(2), Some(EndpointId(5))).unwrap_err(),
            RecorderError::AlreadyRecording
        );
        assert!(recorder.status().is_recording());

        recorder.stop().unwrap();
    }

    #[test]
    fn unknown_endpoints_rejected_before_open() {
        let dir = tempfile::tempdir().unwrap();
        let mut recorder = SessionRecorder::new(SyntheticHost::new(), test_config(dir.path())).unwrap();

        let err = recorder.start(EndpointId(99), Some(EndpointId(5))).unwrap_err();
        assert!(matches!(err, RecorderError::InvalidDeviceSelection(_)));
        assert_eq!(recorder.status(), RecorderState::Idle);

        let err = recorder.start(EndpointId(2), Some(EndpointId(99))).unwrap_err();
        assert!(matches!(err, RecorderError::InvalidDeviceSelection(_)));
        assert_eq!(recorder.status(), RecorderState::Idle);
    }

    #[test]
    fn records_and_commits_wav() {
        let dir = tempfile::tempdir().unwrap();
        let mut recorder = SessionRecorder::new(SyntheticHost::new(), test_config(dir.path())).unwrap();

        recorder.start(EndpointId(2), Some(EndpointId(5))).unwrap();
        assert_eq!(recorder.status(), RecorderState::Recording { mic_only: false });

        thread::sleep(Duration::from_millis(200));
        let outcome = recorder.stop().unwrap();

        assert_eq!(recorder.status(), RecorderState::Idle);
        assert!(outcome.file_path.exists());
        assert!(outcome.blocks_written > 0);
        assert!(!outcome.checksum.is_empty());

        let (channels, sample_rate, bit_depth, data_size) = wav_header_fields(&outcome.file_path);
        assert_eq!(channels, 2);
        assert_eq!(sample_rate, TEST_RATE);
        assert_eq!(bit_depth, 16);
        assert_eq!(data_size as u64, outcome.blocks_written * TEST_BLOCK as u64 * 2 * 2);

        // Every committed block is one mix cycle; pairing is gapless.
        let diagnostics = recorder.diagnostics();
        assert_eq!(diagnostics.mix_cycles, outcome.blocks_written);
        let min_read = diagnostics.mic_blocks_read.min(diagnostics.system_blocks_read);
        assert!(outcome.blocks_written >= min_read.saturating_sub(1));
        assert!(outcome.blocks_written <= min_read);

        // Two in-phase 0.25 sines mixed additively never exceed half scale.
        let data = fs::read(&outcome.file_path).unwrap();
        let limit = (0.5 * i16::MAX as f32) as i16 + 1;
        for pair in data[44..].chunks_exact(2) {
            let sample = i16::from_le_bytes([pair[0], pair[1]]);
            assert!(sample.abs() <= limit, "sample {} out of range", sample);
        }

        let metadata = read_sidecar(&outcome.file_path).unwrap();
        assert_eq!(metadata, outcome.metadata);
        assert!(!metadata.mic_only);
        assert_eq!(metadata.system_endpoint.as_deref(), Some("Speakers (System Audio)"));
    }

    #[test]
    fn empty_loopback_catalog_degrades_to_mic_only() {
        let dir = tempfile::tempdir().unwrap();
        let mut recorder =
            SessionRecorder::new(SyntheticHost::without_loopback(), test_config(dir.path())).unwrap();

        recorder.start(EndpointId(2), Some(EndpointId(5))).unwrap();
        assert_eq!(recorder.status(), RecorderState::Recording { mic_only: true });

        thread::sleep(Duration::from_millis(100));
        let outcome = recorder.stop().unwrap();

        let (channels, _, _, data_size) = wav_header_fields(&outcome.file_path);
        assert_eq!(channels, 1);
        assert_eq!(data_size as u64, outcome.blocks_written * TEST_BLOCK as u64 * 2);
        assert!(outcome.metadata.mic_only);
    }

    #[test]
    fn reader_failure_marks_session_failed_and_flushes_partial() {
        let dir = tempfile::tempdir().unwrap();
        let host = SyntheticHost {
            fail_mic_after: Some(3),
            ..SyntheticHost::new()
        };
        let mut recorder = SessionRecorder::new(host, test_config(dir.path())).unwrap();

        recorder.start(EndpointId(2), Some(EndpointId(5))).unwrap();

        let deadline = Instant::now() + Duration::from_secs(2);
        while !recorder.status().is_failed() {
            assert!(Instant::now() < deadline, "session never failed");
            thread::sleep(Duration::from_millis(10));
        }

        let err = recorder.stop().unwrap_err();
        assert_eq!(err, RecorderError::StreamFailed("synthetic device unplugged".into()));
        assert_eq!(recorder.status(), RecorderState::Idle);

        // Best-effort flush: whatever was mixed before the failure is on disk.
        let recordings: Vec<_> = fs::read_dir(dir.path().join("recordings"))
            .unwrap()
            .map(|e| e.unwrap().path())
            .filter(|p| p.extension().map(|e| e == "wav").unwrap_or(false))
            .collect();
        assert_eq!(recordings.len(), 1);
        assert!(recorder.diagnostics().blocks_written <= 3);
    }

    #[test]
    fn delegate_observes_lifecycle() {
        struct Observer {
            states: Mutex<Vec<&'static str>>,
            finished: AtomicBool,
        }

        impl RecorderDelegate for Observer {
            fn on_state_changed(&self, state: &RecorderState) {
                self.states.lock().push(state.label());
            }
            fn on_levels_updated(&self, _levels: &AudioLevels) {}
            fn on_error(&self, _error: &RecorderError) {}
            fn on_recording_finished(&self, _outcome: &RecordingOutcome) {
                self.finished.store(true, Ordering::SeqCst);
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let mut recorder = SessionRecorder::new(SyntheticHost::new(), test_config(dir.path())).unwrap();
        let observer = Arc::new(Observer {
            states: Mutex::new(Vec::new()),
            finished: AtomicBool::new(false),
        });
        recorder.set_delegate(observer.clone());

        recorder.start(EndpointId(2), Some(EndpointId(5))).unwrap();
        thread::sleep(Duration::from_millis(50));
        recorder.stop().unwrap();

        assert_eq!(&*observer.states.lock(), &["recording", "saving", "ready"]);
        assert!(observer.finished.load(Ordering::SeqCst));
    }
}
