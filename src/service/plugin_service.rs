//! Plugin service facade
//!
//! [`PluginService`] is the one boundary type plugins and hosts call
//! through. Every operation validates its handles, forwards to the owning
//! component, and reports failure as an [`Error`] whose
//! [`status`](Error::status) is the facade status code.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;

use super::config::ServiceConfig;
use super::event::HostEvent;
use super::log::{self, LogSeverity};
use crate::buffer::{BinWriter, ParameterBinPool, StreamConnection};
use crate::callback::{CallbackId, CallbackRegistry};
use crate::catalog::{StreamSetCatalog, StreamSetConnection};
use crate::error::{Error, Result};
use crate::handle::{
    BinHandle, ConnectionHandle, HandleAllocator, ParameterBinHandle, SetConnectionHandle,
    StreamHandle, StreamSetHandle,
};
use crate::stream::{
    StreamCallbacks, StreamDescription, StreamRegisteredEventArgs, StreamUnregisteringEventArgs,
};

/// Explicitly owned context shared by plugins and the host
///
/// Not internally synchronized; see [`ServiceHost`](super::ServiceHost) for
/// the shared, locked form.
pub struct PluginService {
    config: ServiceConfig,
    handles: Arc<HandleAllocator>,
    catalog: StreamSetCatalog,
    host_events: CallbackRegistry<HostEvent>,
    parameters: ParameterBinPool,
    shut_down: bool,
}

impl PluginService {
    pub fn new(config: ServiceConfig) -> Self {
        let handles = Arc::new(HandleAllocator::new());
        let parameters =
            ParameterBinPool::new(Arc::clone(&handles), config.max_parameter_bin_size);

        Self {
            catalog: StreamSetCatalog::new(Arc::clone(&handles)),
            host_events: CallbackRegistry::new("service.host_events"),
            config,
            handles,
            parameters,
            shut_down: false,
        }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn catalog(&self) -> &StreamSetCatalog {
        &self.catalog
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }

    // ---- Subscriptions ----

    /// Subscribe to stream registration; existing streams are replayed
    /// before this returns
    pub fn register_stream_registered_callback<F>(&self, callback: F) -> CallbackId
    where
        F: Fn(StreamRegisteredEventArgs) + Send + Sync + 'static,
    {
        self.catalog.register_for_stream_registered_event(callback)
    }

    pub fn register_stream_unregistering_callback<F>(&self, callback: F) -> CallbackId
    where
        F: Fn(StreamUnregisteringEventArgs) + Send + Sync + 'static,
    {
        self.catalog.register_for_stream_unregistering_event(callback)
    }

    pub fn register_host_event_callback<F>(&self, callback: F) -> CallbackId
    where
        F: Fn(HostEvent) + Send + Sync + 'static,
    {
        self.host_events.register(callback)
    }

    /// Unknown ids are ignored
    pub fn unregister_stream_registered_callback(&self, id: CallbackId) {
        self.catalog.unregister_for_stream_registered_event(id);
    }

    pub fn unregister_stream_unregistering_callback(&self, id: CallbackId) {
        self.catalog.unregister_for_stream_unregistering_event(id);
    }

    pub fn unregister_host_event_callback(&self, id: CallbackId) {
        self.host_events.unregister(id);
    }

    // ---- Producer operations ----

    /// Create and claim the stream set for `uri`
    ///
    /// A set opened earlier by a consumer is claimed rather than recreated.
    pub fn create_stream_set(&mut self, uri: &str) -> Result<StreamSetHandle> {
        if self.shut_down {
            return Err(Error::Failed("service is shut down".into()));
        }
        Ok(self.catalog.get_or_add(uri, true)?.handle())
    }

    pub fn destroy_stream_set(&mut self, set: StreamSetHandle) -> Result<()> {
        self.catalog.destroy_set(set)
    }

    pub fn get_streamset_uri(&self, set: StreamSetHandle) -> Result<&str> {
        self.catalog
            .find_set(set)
            .map(|s| s.uri())
            .ok_or(Error::UnknownStreamSet(set))
    }

    /// Add a stream to `set`; subscribers see the registered event before
    /// this returns
    pub fn create_stream<C>(
        &mut self,
        set: StreamSetHandle,
        description: StreamDescription,
        callbacks: C,
    ) -> Result<StreamHandle>
    where
        C: StreamCallbacks + 'static,
    {
        let handle = self.handles.stream();
        let set = self
            .catalog
            .find_set_mut(set)
            .ok_or(Error::UnknownStreamSet(set))?;
        Ok(set.add_stream(handle, description, Box::new(callbacks)))
    }

    pub fn destroy_stream(&mut self, stream: StreamHandle) -> Result<()> {
        self.catalog
            .find_streamset_for_stream_mut(stream)
            .ok_or(Error::UnknownStream(stream))?
            .remove_stream(stream)
    }

    /// Create a bin of `byte_size` bytes and return its writer
    pub fn create_stream_bin(&mut self, stream: StreamHandle, byte_size: usize) -> Result<BinWriter> {
        if byte_size == 0 || byte_size > self.config.max_bin_size {
            return Err(Error::InvalidArgument(format!(
                "bin size {} outside 1..={}",
                byte_size, self.config.max_bin_size
            )));
        }

        let handle = self.handles.bin();
        let pool_depth = self.config.bin_pool_depth;
        let stream = self
            .catalog
            .find_stream_mut(stream)
            .ok_or(Error::UnknownStream(stream))?;

        Ok(stream.create_bin(handle, byte_size, pool_depth))
    }

    /// Destroy the bin behind `writer`
    ///
    /// Refused while connections are linked; the writer is left intact in
    /// that case.
    pub fn destroy_stream_bin(&mut self, stream: StreamHandle, writer: &mut BinWriter) -> Result<()> {
        if writer.stream() != stream {
            return Err(Error::InvalidArgument(format!(
                "{} does not belong to {}",
                writer.handle(),
                stream
            )));
        }

        let bin = writer.handle();
        let result = self
            .catalog
            .find_stream_mut(stream)
            .ok_or(Error::UnknownStream(stream))?
            .destroy_bin(bin);

        match result {
            Ok(()) => {
                writer.release();
                tracing::debug!(stream = %stream, bin = %bin, "Bin destroyed");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(stream = %stream, bin = %bin, error = %e, "Bin destroy refused");
                Err(e)
            }
        }
    }

    pub fn bin_has_connections(&self, bin: BinHandle) -> Result<bool> {
        self.catalog
            .find_bin(bin)
            .map(|b| b.has_connections())
            .ok_or(Error::UnknownBin(bin))
    }

    /// Publish the writer's current buffer
    pub fn cycle_bin_buffers(&self, writer: &mut BinWriter) -> Result<()> {
        if self.catalog.find_bin(writer.handle()).is_none() {
            return Err(Error::UnknownBin(writer.handle()));
        }
        writer.cycle()?;
        Ok(())
    }

    /// Link a consumer connection to one of its stream's bins
    pub fn link_connection_to_bin(&mut self, connection: ConnectionHandle, bin: BinHandle) -> Result<()> {
        self.catalog
            .find_stream_for_connection_mut(connection)
            .ok_or(Error::UnknownConnection(connection))?
            .link_connection(connection, bin)
    }

    /// Allocate a zeroed parameter bin
    pub fn get_parameter_bin(&mut self, byte_size: usize) -> Result<(ParameterBinHandle, &mut [u8])> {
        self.parameters.get_parameter_bin(byte_size)
    }

    /// Route a plugin log line into `tracing`
    pub fn log(&self, channel: &str, severity: LogSeverity, args: fmt::Arguments<'_>) {
        log::emit(channel, severity, args);
    }

    // ---- Host and consumer operations ----

    pub fn open_set_connection(&mut self, uri: &str) -> Result<StreamSetConnection> {
        if self.shut_down {
            return Err(Error::Failed("service is shut down".into()));
        }
        self.catalog.open_set_connection(uri)
    }

    pub fn close_set_connection(&mut self, connection: SetConnectionHandle) -> Result<()> {
        self.catalog.close_set_connection(connection)
    }

    /// Connect a consumer to a stream, opening the stream if needed
    pub fn open_stream_connection(&mut self, stream: StreamHandle) -> Result<StreamConnection> {
        let handle = self.handles.connection();
        self.catalog
            .find_stream_mut(stream)
            .ok_or(Error::UnknownStream(stream))?
            .add_connection(handle)
    }

    pub fn close_stream_connection(&mut self, connection: ConnectionHandle) -> Result<()> {
        self.catalog
            .find_stream_for_connection_mut(connection)
            .ok_or(Error::UnknownConnection(connection))?
            .remove_connection(connection)
    }

    pub fn find_streamset_for_stream(&self, stream: StreamHandle) -> Result<StreamSetHandle> {
        self.catalog
            .find_streamset_for_stream(stream)
            .map(|s| s.handle())
            .ok_or(Error::UnknownStream(stream))
    }

    pub fn open_stream(&mut self, stream: StreamHandle) -> Result<()> {
        self.catalog
            .find_stream_mut(stream)
            .ok_or(Error::UnknownStream(stream))?
            .open()
    }

    pub fn close_stream(&mut self, stream: StreamHandle) -> Result<()> {
        self.catalog
            .find_stream_mut(stream)
            .ok_or(Error::UnknownStream(stream))?
            .close()
    }

    pub fn set_parameter(&mut self, connection: ConnectionHandle, id: u32, data: &[u8]) -> Result<()> {
        self.catalog
            .find_stream_for_connection_mut(connection)
            .ok_or(Error::UnknownConnection(connection))?
            .set_parameter(connection, id, data)
    }

    /// Query a parameter; the plugin answers through a parameter bin
    pub fn get_parameter(&mut self, connection: ConnectionHandle, id: u32) -> Result<Bytes> {
        let stream = self
            .catalog
            .find_stream_for_connection_mut(connection)
            .ok_or(Error::UnknownConnection(connection))?;

        let before = self.parameters.outstanding();
        let answer = match stream.get_parameter(connection, id, &mut self.parameters) {
            Ok(bin) if before.contains(&bin) => Err(Error::InvalidArgument(format!(
                "{} was not allocated for parameter {}",
                bin, id
            ))),
            other => other,
        };

        // Bins the plugin allocated but did not answer with are dropped
        let released = self
            .parameters
            .release_allocated_since(&before, answer.as_ref().ok().copied());
        if released > 0 {
            tracing::trace!(connection = %connection, id = id, released = released, "Parameter bins released");
        }

        self.parameters.take(answer?)
    }

    /// Deliver a host event to every subscriber; returns how many ran
    pub fn raise_host_event(&self, event: HostEvent) -> usize {
        tracing::debug!(event = event.name(), "Host event raised");
        self.host_events.dispatch(event)
    }

    /// One service pass: read every stream set once
    ///
    /// Timeouts are expected and skipped. The first other error is
    /// returned after every set has been read.
    pub fn update(&mut self) -> Result<()> {
        let timeout = self.config.read_timeout;
        let mut first_error = None;

        self.catalog.visit_sets_mut(|set| match set.read(timeout) {
            Ok(()) => {}
            Err(Error::Timeout) => {
                tracing::trace!(uri = %set.uri(), "Stream set read timed out");
            }
            Err(e) => {
                tracing::warn!(uri = %set.uri(), error = %e, "Stream set read failed");
                first_error.get_or_insert(e);
            }
        });

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Announce shutdown, then tear down every stream set
    ///
    /// Outstanding connections and bins are forced closed. Safe to call
    /// more than once.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;

        tracing::info!(sets = self.catalog.len(), "Plugin service shutting down");

        self.host_events.dispatch(HostEvent::ShuttingDown);
        self.catalog.teardown();
        self.parameters.clear();
    }
}

impl Default for PluginService {
    fn default() -> Self {
        Self::new(ServiceConfig::default())
    }
}

impl Drop for PluginService {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl fmt::Debug for PluginService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginService")
            .field("config", &self.config)
            .field("catalog", &self.catalog)
            .field("shut_down", &self.shut_down)
            .finish()
    }
}
