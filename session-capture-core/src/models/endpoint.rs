use std::fmt;

/// Opaque endpoint identifier, stable for the process lifetime.
///
/// Backends assign ids from their enumeration order; the id is only
/// meaningful to the catalog that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EndpointId(pub u32);

impl fmt::Display for EndpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What a stream opened on this endpoint captures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EndpointKind {
    /// A physical capture device (microphone).
    Input,
    /// A render endpoint captured as the system's own output mix.
    Loopback,
}

/// Immutable snapshot of an audio endpoint at catalog-query time.
///
/// Devices can be hot-plugged, so a snapshot may go stale; `StreamBackend::open`
/// re-resolves the id and fails if the endpoint has disappeared.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioEndpoint {
    pub id: EndpointId,
    pub name: String,
    pub kind: EndpointKind,
    pub channels: u16,
    pub sample_rate: u32,
    pub is_default: bool,
}
