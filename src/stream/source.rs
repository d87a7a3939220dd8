//! A single typed data source and its bins

use std::sync::Arc;
use std::time::Duration;

use super::callbacks::StreamCallbacks;
use super::description::StreamDescription;
use crate::buffer::connection::ConnectionLink;
use crate::buffer::{Bin, BinWriter, ParameterBinPool, StreamConnection};
use crate::error::{Error, Result};
use crate::handle::{BinHandle, ConnectionHandle, StreamHandle, StreamSetHandle};

/// Open/closed state of a stream's data source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Closed,
    Open,
}

struct ConnectionEntry {
    handle: ConnectionHandle,
    link: Arc<ConnectionLink>,
}

/// One typed channel of frames within a stream set
pub struct Stream {
    handle: StreamHandle,
    set: StreamSetHandle,
    description: StreamDescription,
    state: StreamState,
    callbacks: Box<dyn StreamCallbacks>,
    bins: Vec<Arc<Bin>>,
    connections: Vec<ConnectionEntry>,
}

impl Stream {
    pub(crate) fn new(
        handle: StreamHandle,
        set: StreamSetHandle,
        description: StreamDescription,
        callbacks: Box<dyn StreamCallbacks>,
    ) -> Self {
        Self {
            handle,
            set,
            description,
            state: StreamState::Closed,
            callbacks,
            bins: Vec::new(),
            connections: Vec::new(),
        }
    }

    pub fn handle(&self) -> StreamHandle {
        self.handle
    }

    /// Stream set that owns this stream
    pub fn set(&self) -> StreamSetHandle {
        self.set
    }

    pub fn description(&self) -> StreamDescription {
        self.description
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == StreamState::Open
    }

    /// Open the data source; no-op when already open
    pub fn open(&mut self) -> Result<()> {
        if self.is_open() {
            return Ok(());
        }

        self.callbacks.open()?;
        self.state = StreamState::Open;

        tracing::debug!(stream = %self.handle, kind = %self.description, "Stream opened");
        Ok(())
    }

    /// Close the data source; no-op when already closed
    pub fn close(&mut self) -> Result<()> {
        if !self.is_open() {
            return Ok(());
        }

        self.callbacks.close()?;
        self.state = StreamState::Closed;

        tracing::debug!(stream = %self.handle, kind = %self.description, "Stream closed");
        Ok(())
    }

    /// Let the plugin wait for and publish new data
    ///
    /// Reading a closed stream succeeds without calling the plugin.
    pub fn read(&mut self, timeout: Duration) -> Result<()> {
        if !self.is_open() {
            return Ok(());
        }
        self.callbacks.read(timeout)
    }

    pub fn bin_count(&self) -> usize {
        self.bins.len()
    }

    pub fn bins(&self) -> impl Iterator<Item = &Arc<Bin>> {
        self.bins.iter()
    }

    pub fn find_bin(&self, bin: BinHandle) -> Option<&Arc<Bin>> {
        self.bins.iter().find(|b| b.handle() == bin)
    }

    pub(crate) fn create_bin(
        &mut self,
        handle: BinHandle,
        byte_size: usize,
        pool_depth: usize,
    ) -> BinWriter {
        let (bin, buffer) = Bin::create(handle, self.handle, byte_size, pool_depth);
        self.bins.push(Arc::clone(&bin));
        BinWriter::new(bin, buffer)
    }

    /// Destroy a bin; fails while any connection is linked to it
    pub(crate) fn destroy_bin(&mut self, handle: BinHandle) -> Result<()> {
        let index = self
            .bins
            .iter()
            .position(|b| b.handle() == handle)
            .ok_or(Error::UnknownBin(handle))?;

        self.bins[index].destroy()?;
        self.bins.remove(index);
        Ok(())
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn has_connections(&self) -> bool {
        !self.connections.is_empty()
    }

    pub fn has_connection(&self, connection: ConnectionHandle) -> bool {
        self.connections.iter().any(|c| c.handle == connection)
    }

    /// Attach a consumer, opening the stream if needed
    ///
    /// The plugin picks the bin to link through
    /// [`StreamCallbacks::connection_added`]. If that bin cannot be linked
    /// the connection is dropped again and the link error returned.
    pub(crate) fn add_connection(&mut self, handle: ConnectionHandle) -> Result<StreamConnection> {
        self.open()?;

        let link = Arc::new(ConnectionLink::default());
        self.connections.push(ConnectionEntry {
            handle,
            link: Arc::clone(&link),
        });

        tracing::debug!(
            stream = %self.handle,
            connection = %handle,
            connections = self.connections.len(),
            "Connection added"
        );

        if let Some(bin) = self.callbacks.connection_added(handle) {
            if let Err(e) = self.link_connection(handle, bin) {
                self.connections.retain(|c| c.handle != handle);
                self.callbacks.connection_removed(handle, None);

                tracing::warn!(
                    stream = %self.handle,
                    connection = %handle,
                    bin = %bin,
                    error = %e,
                    "Connection rejected, plugin chose a bin that cannot be linked"
                );
                return Err(e);
            }
        }

        Ok(StreamConnection::new(handle, self.handle, link))
    }

    /// Link a connection to one of this stream's bins, replacing any
    /// previous link
    pub(crate) fn link_connection(&mut self, connection: ConnectionHandle, bin: BinHandle) -> Result<()> {
        let link = self
            .connections
            .iter()
            .find(|c| c.handle == connection)
            .map(|c| Arc::clone(&c.link))
            .ok_or(Error::UnknownConnection(connection))?;
        let target = self
            .find_bin(bin)
            .cloned()
            .ok_or(Error::UnknownBin(bin))?;

        target.link(connection)?;
        if let Some(previous) = link.set(Some(target)) {
            if previous.handle() != bin {
                previous.unlink(connection);
            }
        }
        Ok(())
    }

    /// Detach a consumer and unlink it from its bin
    pub(crate) fn remove_connection(&mut self, connection: ConnectionHandle) -> Result<()> {
        let index = self
            .connections
            .iter()
            .position(|c| c.handle == connection)
            .ok_or(Error::UnknownConnection(connection))?;

        let entry = self.connections.remove(index);
        let bin = entry.link.set(None).map(|bin| {
            bin.unlink(connection);
            bin.handle()
        });

        self.callbacks.connection_removed(connection, bin);

        tracing::debug!(
            stream = %self.handle,
            connection = %connection,
            connections = self.connections.len(),
            "Connection removed"
        );
        Ok(())
    }

    pub(crate) fn set_parameter(&mut self, connection: ConnectionHandle, id: u32, data: &[u8]) -> Result<()> {
        if !self.has_connection(connection) {
            return Err(Error::UnknownConnection(connection));
        }
        self.callbacks.set_parameter(connection, id, data)
    }

    pub(crate) fn get_parameter(
        &mut self,
        connection: ConnectionHandle,
        id: u32,
        bins: &mut ParameterBinPool,
    ) -> Result<crate::handle::ParameterBinHandle> {
        if !self.has_connection(connection) {
            return Err(Error::UnknownConnection(connection));
        }
        self.callbacks.get_parameter(connection, id, bins)
    }

    /// Drop every connection and bin, then close the data source
    pub(crate) fn teardown(&mut self) {
        for entry in self.connections.drain(..) {
            entry.link.set(None);
        }
        for bin in self.bins.drain(..) {
            bin.force_teardown();
        }

        if let Err(e) = self.close() {
            tracing::warn!(stream = %self.handle, error = %e, "Stream close failed during teardown");
        }
    }
}

impl std::fmt::Debug for Stream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stream")
            .field("handle", &self.handle)
            .field("set", &self.set)
            .field("description", &self.description)
            .field("state", &self.state)
            .field("bins", &self.bins.len())
            .field("connections", &self.connections.len())
            .finish()
    }
}
