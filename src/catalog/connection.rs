//! Consumer connections to whole stream sets

use std::sync::Arc;

use crate::handle::{SetConnectionHandle, StreamSetHandle};

/// A consumer's open handle on a stream set
///
/// Keeps the set alive in the catalog until closed, even when no producer
/// has claimed it yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamSetConnection {
    handle: SetConnectionHandle,
    set: StreamSetHandle,
    uri: Arc<str>,
}

impl StreamSetConnection {
    pub(super) fn new(handle: SetConnectionHandle, set: StreamSetHandle, uri: &str) -> Self {
        Self {
            handle,
            set,
            uri: Arc::from(uri),
        }
    }

    pub fn handle(&self) -> SetConnectionHandle {
        self.handle
    }

    pub fn set(&self) -> StreamSetHandle {
        self.set
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }
}
