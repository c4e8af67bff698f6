//! Audio device enumeration over the default `cpal` host.
//!
//! Endpoint ids are positions in the host's device enumeration, stable for
//! the process lifetime. Input endpoints are capture devices; output
//! endpoints are render devices exposed for WASAPI loopback capture, so the
//! output catalog is empty on hosts without loopback support.

use cpal::traits::{DeviceTrait, HostTrait};

use session_capture_core::{AudioEndpoint, DeviceCatalog, EndpointId, EndpointKind, RecorderError};

/// Device catalog and stream factory over the default `cpal` host.
pub struct CpalHost {
    host: cpal::Host,
}

impl CpalHost {
    pub fn new() -> Self {
        Self {
            host: cpal::default_host(),
        }
    }

    /// Whether this host can capture a render endpoint's own output mix.
    pub fn supports_loopback() -> bool {
        cfg!(target_os = "windows")
    }

    /// Resolve an endpoint id back to its device.
    pub(crate) fn device_at(&self, id: EndpointId) -> Result<cpal::Device, RecorderError> {
        self.host
            .devices()
            .map_err(|e| RecorderError::DeviceQuery(e.to_string()))?
            .nth(id.0 as usize)
            .ok_or_else(|| RecorderError::DeviceOpen {
                endpoint: id,
                reason: "endpoint no longer present".into(),
            })
    }

    fn enumerate(&self, kind: EndpointKind) -> Result<Vec<AudioEndpoint>, RecorderError> {
        let devices = self
            .host
            .devices()
            .map_err(|e| RecorderError::DeviceQuery(e.to_string()))?;

        let default_name = match kind {
            EndpointKind::Input => self.host.default_input_device(),
            EndpointKind::Loopback => self.host.default_output_device(),
        }
        .and_then(|d| d.name().ok());

        let mut endpoints = Vec::new();
        for (index, device) in devices.enumerate() {
            let config = match kind {
                EndpointKind::Input => device.default_input_config(),
                EndpointKind::Loopback => device.default_output_config(),
            };
            let Ok(config) = config else { continue };
            let Ok(name) = device.name() else { continue };

            let is_default = default_name.as_deref() == Some(name.as_str());
            let display_name = match kind {
                EndpointKind::Input => name,
                EndpointKind::Loopback => format!("{} (System Audio)", name),
            };

            endpoints.push(AudioEndpoint {
                id: EndpointId(index as u32),
                name: display_name,
                kind,
                channels: config.channels(),
                sample_rate: config.sample_rate().0,
                is_default,
            });
        }
        Ok(endpoints)
    }
}

impl Default for CpalHost {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceCatalog for CpalHost {
    fn list_inputs(&self) -> Result<Vec<AudioEndpoint>, RecorderError> {
        self.enumerate(EndpointKind::Input)
    }

    fn list_outputs(&self) -> Result<Vec<AudioEndpoint>, RecorderError> {
        if !Self::supports_loopback() {
            return Ok(Vec::new());
        }
        self.enumerate(EndpointKind::Loopback)
    }
}
