//! Strongly typed handles
//!
//! Every object the service hands out (stream sets, streams, bins,
//! connections, parameter bins) is named by an opaque handle. All handles are
//! drawn from one monotonically increasing counter and are never reused, so a
//! handle that outlives its object is always detectable as stale instead of
//! silently aliasing a newer object.

use std::sync::atomic::{AtomicU64, Ordering};

macro_rules! define_handle {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u64);

        impl $name {
            /// Raw numeric value
            pub fn raw(self) -> u64 {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, concat!($label, "#{}"), self.0)
            }
        }
    };
}

define_handle!(
    /// Handle to a stream set in the catalog
    StreamSetHandle,
    "streamset"
);
define_handle!(
    /// Handle to a stream within a stream set
    StreamHandle,
    "stream"
);
define_handle!(
    /// Handle to a frame bin owned by a stream
    BinHandle,
    "bin"
);
define_handle!(
    /// Handle to a consumer connection on a stream
    ConnectionHandle,
    "connection"
);
define_handle!(
    /// Handle to a consumer connection on a whole stream set
    SetConnectionHandle,
    "setconnection"
);
define_handle!(
    /// Handle to a parameter bin
    ParameterBinHandle,
    "parameterbin"
);

/// Issues handles for every object kind from a single counter
#[derive(Debug)]
pub struct HandleAllocator {
    next: AtomicU64,
}

impl HandleAllocator {
    /// Create an allocator whose first handle is 1
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    fn next_raw(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }

    pub fn stream_set(&self) -> StreamSetHandle {
        StreamSetHandle(self.next_raw())
    }

    pub fn stream(&self) -> StreamHandle {
        StreamHandle(self.next_raw())
    }

    pub fn bin(&self) -> BinHandle {
        BinHandle(self.next_raw())
    }

    pub fn connection(&self) -> ConnectionHandle {
        ConnectionHandle(self.next_raw())
    }

    pub fn set_connection(&self) -> SetConnectionHandle {
        SetConnectionHandle(self.next_raw())
    }

    pub fn parameter_bin(&self) -> ParameterBinHandle {
        ParameterBinHandle(self.next_raw())
    }
}

impl Default for HandleAllocator {
    fn default() -> Self {
        Self::new()
    }
}
