//! Blocking stream readers over `cpal` capture streams.
//!
//! `cpal::Stream` is not `Send`, so each open endpoint gets a dedicated
//! capture thread that owns the stream and forwards fixed-size blocks over
//! a bounded channel. `CpalStreamReader::read_block` blocks on that channel,
//! which gives the engine the pull-oriented contract it expects.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, StreamTrait};
use crossbeam_channel::{bounded, Receiver, Sender};

use session_capture_core::{
    AudioEndpoint, EndpointId, EndpointKind, Frame, RecorderError, StreamBackend, StreamReader, StreamSpec,
};

use crate::assembler::BlockAssembler;
use crate::catalog::CpalHost;

/// Blocks buffered between the audio callback and `read_block` (~1.5 s at
/// the reference 1024-frame block size).
const CAPTURE_QUEUE_BLOCKS: usize = 64;

/// How long `open` waits for the capture thread to report stream creation.
const OPEN_TIMEOUT: Duration = Duration::from_secs(5);

/// How often the capture thread wakes to check for shutdown.
const STOP_POLL: Duration = Duration::from_millis(20);

enum CaptureMessage {
    Block(Vec<f32>),
    Failed(String),
}

impl StreamBackend for CpalHost {
    type Reader = CpalStreamReader;

    fn open(&self, endpoint: &AudioEndpoint, spec: StreamSpec) -> Result<CpalStreamReader, RecorderError> {
        let device = self.device_at(endpoint.id)?;
        let loopback = endpoint.kind == EndpointKind::Loopback;
        let endpoint_id = endpoint.id;

        let (block_tx, block_rx) = bounded::<CaptureMessage>(CAPTURE_QUEUE_BLOCKS);
        let (ready_tx, ready_rx) = bounded::<Result<(), RecorderError>>(1);
        let stop = Arc::new(AtomicBool::new(false));
        let overruns = Arc::new(AtomicU64::new(0));

        let worker_stop = Arc::clone(&stop);
        let worker_overruns = Arc::clone(&overruns);
        let worker = thread::Builder::new()
            .name(format!("{}-capture", if loopback { "loopback" } else { "mic" }))
            .spawn(move || {
                capture_worker(
                    device,
                    endpoint_id,
                    spec,
                    loopback,
                    block_tx,
                    ready_tx,
                    worker_stop,
                    worker_overruns,
                );
            })
            .map_err(|e| RecorderError::DeviceOpen {
                endpoint: endpoint_id,
                reason: format!("failed to spawn capture thread: {}", e),
            })?;

        match ready_rx.recv_timeout(OPEN_TIMEOUT) {
            Ok(Ok(())) => Ok(CpalStreamReader {
                rx: block_rx,
                stop,
                worker: Some(worker),
                overruns,
                channels: spec.channels,
                next_sequence: 0,
            }),
            Ok(Err(err)) => {
                let _ = worker.join();
                Err(err)
            }
            Err(_) => {
                stop.store(true, Ordering::SeqCst);
                Err(RecorderError::DeviceOpen {
                    endpoint: endpoint_id,
                    reason: "timed out waiting for capture stream".into(),
                })
            }
        }
    }
}

/// Blocking reader over one open capture stream.
pub struct CpalStreamReader {
    rx: Receiver<CaptureMessage>,
    stop: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
    overruns: Arc<AtomicU64>,
    channels: u16,
    next_sequence: u64,
}

impl StreamReader for CpalStreamReader {
    fn read_block(&mut self) -> Result<Frame, RecorderError> {
        match self.rx.recv() {
            Ok(CaptureMessage::Block(samples)) => {
                let frame = Frame {
                    samples,
                    channels: self.channels,
                    sequence: self.next_sequence,
                    captured_at: Instant::now(),
                };
                self.next_sequence += 1;
                Ok(frame)
            }
            Ok(CaptureMessage::Failed(reason)) => Err(RecorderError::StreamFailed(reason)),
            Err(_) => Err(RecorderError::StreamFailed("capture worker exited".into())),
        }
    }

    fn overruns(&self) -> u64 {
        self.overruns.load(Ordering::Relaxed)
    }

    fn close(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

impl Drop for CpalStreamReader {
    fn drop(&mut self) {
        self.close();
    }
}

/// Capture thread body: owns the `cpal::Stream` for its whole life, reports
/// open success/failure once, then holds the stream until shutdown.
#[allow(clippy::too_many_arguments)]
fn capture_worker(
    device: cpal::Device,
    endpoint: EndpointId,
    spec: StreamSpec,
    loopback: bool,
    blocks: Sender<CaptureMessage>,
    ready: Sender<Result<(), RecorderError>>,
    stop: Arc<AtomicBool>,
    overruns: Arc<AtomicU64>,
) {
    let stream = match build_stream(&device, endpoint, spec, loopback, blocks, overruns) {
        Ok(stream) => stream,
        Err(err) => {
            let _ = ready.send(Err(err));
            return;
        }
    };

    if let Err(err) = stream.play() {
        let _ = ready.send(Err(RecorderError::DeviceOpen {
            endpoint,
            reason: format!("failed to start stream: {}", err),
        }));
        return;
    }
    let _ = ready.send(Ok(()));

    // The stream delivers audio via callbacks; this thread only keeps it
    // alive until close.
    while !stop.load(Ordering::SeqCst) {
        thread::sleep(STOP_POLL);
    }
    drop(stream);
}

fn build_stream(
    device: &cpal::Device,
    endpoint: EndpointId,
    spec: StreamSpec,
    loopback: bool,
    blocks: Sender<CaptureMessage>,
    overruns: Arc<AtomicU64>,
) -> Result<cpal::Stream, RecorderError> {
    // Loopback capture is an input stream built on a render endpoint, so
    // the render side's native format decides the sample type.
    let supported = if loopback {
        device.default_output_config()
    } else {
        device.default_input_config()
    }
    .map_err(|e| RecorderError::DeviceOpen {
        endpoint,
        reason: e.to_string(),
    })?;

    let config = cpal::StreamConfig {
        channels: spec.channels,
        sample_rate: cpal::SampleRate(spec.sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };

    match supported.sample_format() {
        cpal::SampleFormat::F32 => build_typed::<f32>(device, endpoint, &config, spec, blocks, overruns),
        cpal::SampleFormat::I16 => build_typed::<i16>(device, endpoint, &config, spec, blocks, overruns),
        cpal::SampleFormat::U16 => build_typed::<u16>(device, endpoint, &config, spec, blocks, overruns),
        other => Err(RecorderError::DeviceOpen {
            endpoint,
            reason: format!("unsupported sample format {:?}", other),
        }),
    }
}

fn build_typed<T>(
    device: &cpal::Device,
    endpoint: EndpointId,
    config: &cpal::StreamConfig,
    spec: StreamSpec,
    blocks: Sender<CaptureMessage>,
    overruns: Arc<AtomicU64>,
) -> Result<cpal::Stream, RecorderError>
where
    T: cpal::SizedSample + cpal::Sample<Float = f32>,
{
    let mut assembler = BlockAssembler::new(spec.block_size * spec.channels as usize);
    let data_tx = blocks.clone();
    let error_tx = blocks;

    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                let samples: Vec<f32> = data.iter().map(|s| s.to_float_sample()).collect();
                assembler.push(&samples, |block| {
                    // Never block the audio callback: when the reader falls
                    // behind, shed the block and count the overrun.
                    if data_tx.try_send(CaptureMessage::Block(block)).is_err() {
                        overruns.fetch_add(1, Ordering::Relaxed);
                        log::warn!("capture queue full, dropping one block");
                    }
                });
            },
            move |err| {
                log::error!("capture stream error: {}", err);
                let _ = error_tx.try_send(CaptureMessage::Failed(err.to_string()));
            },
            None,
        )
        .map_err(|e| RecorderError::DeviceOpen {
            endpoint,
            reason: e.to_string(),
        })
}
