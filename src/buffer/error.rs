//! Bin error types
//!
//! Error types for frame bin operations.

use std::time::Duration;

use crate::handle::{BinHandle, ConnectionHandle};

/// Error type for bin operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BinError {
    /// Bin still has linked connections
    Connected { bin: BinHandle, connections: usize },
    /// Bin has been torn down
    TornDown(BinHandle),
    /// Buffer does not belong to this bin's current write slot
    ForeignBuffer(BinHandle),
    /// Frame slot has been rewritten since the reference was taken
    FrameRetired { bin: BinHandle, generation: u64 },
    /// Connection is not linked to any bin
    NotLinked(ConnectionHandle),
    /// No frame was published within the wait window
    Timeout(Duration),
}

impl std::fmt::Display for BinError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BinError::Connected { bin, connections } => {
                write!(f, "Bin {} still has {} connection(s)", bin, connections)
            }
            BinError::TornDown(bin) => write!(f, "Bin torn down: {}", bin),
            BinError::ForeignBuffer(bin) => {
                write!(f, "Buffer is not the current write buffer of {}", bin)
            }
            BinError::FrameRetired { bin, generation } => {
                write!(f, "Frame {} of {} has been retired", generation, bin)
            }
            BinError::NotLinked(connection) => {
                write!(f, "Connection not linked to a bin: {}", connection)
            }
            BinError::Timeout(after) => write!(f, "No frame within {:?}", after),
        }
    }
}

impl std::error::Error for BinError {}
