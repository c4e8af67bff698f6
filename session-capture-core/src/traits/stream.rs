use crate::models::endpoint::AudioEndpoint;
use crate::models::error::RecorderError;
use crate::models::frame::Frame;

/// Requested stream format for an opened endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamSpec {
    pub channels: u16,
    pub sample_rate: u32,
    /// Frames per delivered block.
    pub block_size: usize,
}

/// A continuous sequence of fixed-size blocks from one open endpoint.
///
/// Each reader is serviced by its own capture thread, so a stall reading
/// one endpoint never blocks the other.
pub trait StreamReader: Send {
    /// Block the calling thread until one full block is available.
    ///
    /// Hardware overruns are a non-fatal side signal: the gap is logged and
    /// counted via `overruns()`, and the next available block is returned.
    /// An `Err` means the stream is unrecoverably gone.
    fn read_block(&mut self) -> Result<Frame, RecorderError>;

    /// Blocks dropped upstream since the stream was opened.
    fn overruns(&self) -> u64;

    /// Release the endpoint. Idempotent; also performed on drop.
    fn close(&mut self);
}

/// Factory for opening endpoints produced by the matching `DeviceCatalog`.
pub trait StreamBackend {
    type Reader: StreamReader + 'static;

    /// Reserve `endpoint` and start delivering blocks in `spec` format.
    ///
    /// Fails with `DeviceOpen` if the endpoint is busy, gone, or cannot
    /// satisfy the requested format. Errors surface synchronously.
    fn open(&self, endpoint: &AudioEndpoint, spec: StreamSpec) -> Result<Self::Reader, RecorderError>;
}
