//! Plugin supplied stream callbacks

use std::time::Duration;

use crate::buffer::parameter::ParameterBinPool;
use crate::error::{Error, Result};
use crate::handle::{BinHandle, ConnectionHandle, ParameterBinHandle};

/// Behaviour a producer plugin attaches to each stream it creates
///
/// Every method has a default so plugins only implement what their data
/// source needs. Callbacks run on the service thread with the service
/// locked; they must not block longer than the timeout they are given.
pub trait StreamCallbacks: Send {
    /// Start the underlying data source
    ///
    /// Failures should be reported as [`Error::Device`].
    fn open(&mut self) -> Result<()> {
        Ok(())
    }

    /// Stop the underlying data source
    fn close(&mut self) -> Result<()> {
        Ok(())
    }

    /// Wait up to `timeout` for new data and publish it to the stream's bins
    ///
    /// Return [`Error::Timeout`] when no data arrived in time.
    fn read(&mut self, _timeout: Duration) -> Result<()> {
        Ok(())
    }

    /// A consumer connected; return the bin it should be linked to
    fn connection_added(&mut self, _connection: ConnectionHandle) -> Option<BinHandle> {
        None
    }

    /// A consumer disconnected; `bin` is the bin it was linked to
    fn connection_removed(&mut self, _connection: ConnectionHandle, _bin: Option<BinHandle>) {}

    fn set_parameter(
        &mut self,
        _connection: ConnectionHandle,
        _id: u32,
        _data: &[u8],
    ) -> Result<()> {
        Err(Error::Unsupported("set_parameter"))
    }

    /// Answer a parameter query through a bin taken from `bins`
    fn get_parameter(
        &mut self,
        _connection: ConnectionHandle,
        _id: u32,
        _bins: &mut ParameterBinPool,
    ) -> Result<ParameterBinHandle> {
        Err(Error::Unsupported("get_parameter"))
    }
}
