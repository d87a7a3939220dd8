//! Error types
//!
//! Every fallible operation returns [`Result`]. The facade contract is a
//! status code, so each [`Error`] also knows which [`Status`] it maps to.

use crate::buffer::BinError;
use crate::handle::{
    BinHandle, ConnectionHandle, ParameterBinHandle, SetConnectionHandle, StreamHandle,
    StreamSetHandle,
};

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Status reported to plugins for every facade call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Success,
    /// Unknown or stale handle, malformed URI, out of range size
    InvalidArgument,
    /// Teardown attempted while dependents remain, or duplicate claim
    ResourceBusy,
    /// Underlying data source failed to open or read
    DeviceError,
    /// Bounded wait exceeded with no data
    Timeout,
    /// Anything else
    Failed,
}

impl Status {
    /// Status of an operation result
    pub fn of<T>(result: &Result<T>) -> Status {
        match result {
            Ok(_) => Status::Success,
            Err(e) => e.status(),
        }
    }

    pub fn is_success(self) -> bool {
        self == Status::Success
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Status::Success => "success",
            Status::InvalidArgument => "invalid argument",
            Status::ResourceBusy => "resource busy",
            Status::DeviceError => "device error",
            Status::Timeout => "timeout",
            Status::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Main error type
#[derive(Debug, Clone)]
pub enum Error {
    UnknownStreamSet(StreamSetHandle),
    UnknownStream(StreamHandle),
    UnknownBin(BinHandle),
    UnknownConnection(ConnectionHandle),
    UnknownSetConnection(SetConnectionHandle),
    UnknownParameterBin(ParameterBinHandle),
    /// URI is empty or contains whitespace/control characters
    InvalidUri(String),
    /// Argument out of range
    InvalidArgument(String),
    /// Bin layer error
    Bin(BinError),
    /// Stream set still has consumers
    StreamSetBusy { uri: String, connections: usize },
    /// Stream still has consumer connections
    StreamBusy { stream: StreamHandle, connections: usize },
    /// Stream set is already claimed by a producer
    AlreadyClaimed(String),
    /// Data source failure reported by a plugin
    Device(String),
    /// Bounded wait exceeded
    Timeout,
    /// Plugin does not implement the requested operation
    Unsupported(&'static str),
    Failed(String),
}

impl Error {
    /// Status code this error is reported as
    pub fn status(&self) -> Status {
        match self {
            Error::UnknownStreamSet(_)
            | Error::UnknownStream(_)
            | Error::UnknownBin(_)
            | Error::UnknownConnection(_)
            | Error::UnknownSetConnection(_)
            | Error::UnknownParameterBin(_)
            | Error::InvalidUri(_)
            | Error::InvalidArgument(_) => Status::InvalidArgument,
            Error::Bin(e) => match e {
                BinError::Connected { .. } => Status::ResourceBusy,
                BinError::Timeout(_) => Status::Timeout,
                BinError::TornDown(_)
                | BinError::ForeignBuffer(_)
                | BinError::FrameRetired { .. }
                | BinError::NotLinked(_) => Status::InvalidArgument,
            },
            Error::StreamSetBusy { .. } | Error::StreamBusy { .. } | Error::AlreadyClaimed(_) => {
                Status::ResourceBusy
            }
            Error::Device(_) => Status::DeviceError,
            Error::Timeout => Status::Timeout,
            Error::Unsupported(_) | Error::Failed(_) => Status::Failed,
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::UnknownStreamSet(h) => write!(f, "Unknown stream set: {}", h),
            Error::UnknownStream(h) => write!(f, "Unknown stream: {}", h),
            Error::UnknownBin(h) => write!(f, "Unknown bin: {}", h),
            Error::UnknownConnection(h) => write!(f, "Unknown connection: {}", h),
            Error::UnknownSetConnection(h) => write!(f, "Unknown set connection: {}", h),
            Error::UnknownParameterBin(h) => write!(f, "Unknown parameter bin: {}", h),
            Error::InvalidUri(uri) => write!(f, "Invalid stream set URI: {:?}", uri),
            Error::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
            Error::Bin(e) => write!(f, "Bin error: {}", e),
            Error::StreamSetBusy { uri, connections } => {
                write!(f, "Stream set {} still has {} connection(s)", uri, connections)
            }
            Error::StreamBusy {
                stream,
                connections,
            } => write!(f, "Stream {} still has {} connection(s)", stream, connections),
            Error::AlreadyClaimed(uri) => write!(f, "Stream set already claimed: {}", uri),
            Error::Device(msg) => write!(f, "Device error: {}", msg),
            Error::Timeout => write!(f, "Timed out waiting for data"),
            Error::Unsupported(what) => write!(f, "Operation not supported: {}", what),
            Error::Failed(msg) => write!(f, "Operation failed: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Bin(e) => Some(e),
            _ => None,
        }
    }
}

impl From<BinError> for Error {
    fn from(err: BinError) -> Self {
        match err {
            BinError::Timeout(_) => Error::Timeout,
            other => Error::Bin(other),
        }
    }
}
