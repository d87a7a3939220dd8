//! Host events broadcast to plugins

use bytes::Bytes;

/// Event raised by the host application
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    /// The service is about to tear down every stream set
    ShuttingDown,

    /// Application defined event with an opaque payload
    Custom { id: u32, data: Bytes },
}

impl HostEvent {
    pub fn name(&self) -> &'static str {
        match self {
            HostEvent::ShuttingDown => "shutting_down",
            HostEvent::Custom { .. } => "custom",
        }
    }
}
