//! Stream lifecycle event arguments

use std::sync::Arc;

use super::description::StreamDescription;
use crate::handle::{StreamHandle, StreamSetHandle};

/// Raised after a stream is added to a set, and replayed to late subscribers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamRegisteredEventArgs {
    pub stream_set: StreamSetHandle,
    pub uri: Arc<str>,
    pub stream: StreamHandle,
    pub description: StreamDescription,
}

/// Raised before a stream is destroyed, while it is still reachable
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamUnregisteringEventArgs {
    pub stream_set: StreamSetHandle,
    pub uri: Arc<str>,
    pub stream: StreamHandle,
    pub description: StreamDescription,
}
