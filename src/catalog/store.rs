//! Stream set catalog implementation
//!
//! The catalog maps URIs to stream sets and re-broadcasts every set's stream
//! events at catalog scope.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use super::connection::StreamSetConnection;
use super::entry::StreamSetEntry;
use crate::buffer::Bin;
use crate::callback::{CallbackId, CallbackRegistry};
use crate::error::{Error, Result};
use crate::handle::{
    BinHandle, ConnectionHandle, HandleAllocator, SetConnectionHandle, StreamHandle,
    StreamSetHandle,
};
use crate::stream::{
    Stream, StreamRegisteredEventArgs, StreamSet, StreamUnregisteringEventArgs,
};

/// Registry of all stream sets, keyed by URI
///
/// Sets are enumerated in URI order. Not internally synchronized: callers
/// serialize access, typically through the service lock.
pub struct StreamSetCatalog {
    /// Map of URI to entry
    sets: BTreeMap<String, StreamSetEntry>,

    /// Open set connections and the URI each one refers to
    set_connections: HashMap<SetConnectionHandle, String>,

    handles: Arc<HandleAllocator>,
    registered: Arc<CallbackRegistry<StreamRegisteredEventArgs>>,
    unregistering: Arc<CallbackRegistry<StreamUnregisteringEventArgs>>,
}

/// Reject empty URIs and URIs with whitespace or control characters
fn validate_uri(uri: &str) -> Result<()> {
    if uri.is_empty() || uri.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(Error::InvalidUri(uri.to_string()));
    }
    Ok(())
}

impl StreamSetCatalog {
    /// Create an empty catalog drawing handles from `handles`
    pub fn new(handles: Arc<HandleAllocator>) -> Self {
        Self {
            sets: BTreeMap::new(),
            set_connections: HashMap::new(),
            handles,
            registered: Arc::new(CallbackRegistry::new("catalog.registered")),
            unregistering: Arc::new(CallbackRegistry::new("catalog.unregistering")),
        }
    }

    /// Get the set for `uri`, creating it if absent
    ///
    /// With `claim`, the caller takes producer ownership of the set; a set
    /// can only be claimed once.
    pub fn get_or_add(&mut self, uri: &str, claim: bool) -> Result<&mut StreamSet> {
        validate_uri(uri)?;

        let entry = match self.sets.entry(uri.to_string()) {
            Entry::Occupied(occupied) => {
                let entry = occupied.into_mut();
                if claim {
                    if entry.claimed {
                        tracing::warn!(uri = %uri, "Stream set already claimed");
                        return Err(Error::AlreadyClaimed(uri.to_string()));
                    }
                    entry.claimed = true;
                    tracing::info!(uri = %uri, set = %entry.set.handle(), "Stream set claimed");
                }
                entry
            }
            Entry::Vacant(vacant) => {
                let set = StreamSet::new(self.handles.stream_set(), uri);
                tracing::info!(uri = %uri, set = %set.handle(), claimed = claim, "Stream set created");

                vacant.insert(StreamSetEntry::new(
                    set,
                    &self.registered,
                    &self.unregistering,
                    claim,
                ))
            }
        };
        Ok(&mut entry.set)
    }

    fn uri_of(&self, set: StreamSetHandle) -> Option<&str> {
        self.sets
            .iter()
            .find(|(_, entry)| entry.set.handle() == set)
            .map(|(uri, _)| uri.as_str())
    }

    pub fn find_set(&self, set: StreamSetHandle) -> Option<&StreamSet> {
        self.sets
            .values()
            .map(|entry| &entry.set)
            .find(|s| s.handle() == set)
    }

    pub fn find_set_mut(&mut self, set: StreamSetHandle) -> Option<&mut StreamSet> {
        self.sets
            .values_mut()
            .map(|entry| &mut entry.set)
            .find(|s| s.handle() == set)
    }

    pub fn find_set_by_uri(&self, uri: &str) -> Option<&StreamSet> {
        self.sets.get(uri).map(|entry| &entry.set)
    }

    pub fn is_claimed(&self, set: StreamSetHandle) -> bool {
        self.sets
            .values()
            .any(|entry| entry.set.handle() == set && entry.claimed)
    }

    /// Remove a set and tear it down
    ///
    /// Fails while consumers hold set or stream connections to it.
    pub fn destroy_set(&mut self, set: StreamSetHandle) -> Result<()> {
        let uri = self
            .uri_of(set)
            .ok_or(Error::UnknownStreamSet(set))?
            .to_string();

        if let Some(entry) = self.sets.get(&uri) {
            let connections = entry.connections.len() + entry.set.connection_count();
            if connections > 0 {
                tracing::warn!(uri = %uri, connections = connections, "Stream set destroy refused");
                return Err(Error::StreamSetBusy { uri, connections });
            }
        }

        if let Some(entry) = self.sets.remove(&uri) {
            entry.teardown();
        }
        Ok(())
    }

    /// Open a consumer connection to `uri`, creating the set unclaimed if
    /// it does not exist yet
    pub fn open_set_connection(&mut self, uri: &str) -> Result<StreamSetConnection> {
        let set = self.get_or_add(uri, false)?.handle();
        let handle = self.handles.set_connection();

        if let Some(entry) = self.sets.get_mut(uri) {
            entry.connections.push(handle);
        }
        self.set_connections.insert(handle, uri.to_string());

        tracing::debug!(uri = %uri, connection = %handle, "Set connection opened");
        Ok(StreamSetConnection::new(handle, set, uri))
    }

    /// Close a set connection
    ///
    /// An unclaimed set with no streams and no remaining connections is
    /// destroyed.
    pub fn close_set_connection(&mut self, connection: SetConnectionHandle) -> Result<()> {
        let uri = self
            .set_connections
            .remove(&connection)
            .ok_or(Error::UnknownSetConnection(connection))?;

        let orphaned = match self.sets.get_mut(&uri) {
            Some(entry) => {
                entry.connections.retain(|c| *c != connection);
                !entry.claimed && entry.connections.is_empty() && entry.set.is_empty()
            }
            None => false,
        };

        tracing::debug!(uri = %uri, connection = %connection, "Set connection closed");

        if orphaned {
            if let Some(entry) = self.sets.remove(&uri) {
                entry.teardown();
            }
        }
        Ok(())
    }

    /// Reverse lookup from a stream to the set that owns it
    pub fn find_streamset_for_stream(&self, stream: StreamHandle) -> Option<&StreamSet> {
        self.sets
            .values()
            .map(|entry| &entry.set)
            .find(|s| s.find_stream(stream).is_some())
    }

    pub(crate) fn find_streamset_for_stream_mut(
        &mut self,
        stream: StreamHandle,
    ) -> Option<&mut StreamSet> {
        self.sets
            .values_mut()
            .map(|entry| &mut entry.set)
            .find(|s| s.find_stream(stream).is_some())
    }

    pub fn find_stream(&self, stream: StreamHandle) -> Option<&Stream> {
        self.sets
            .values()
            .find_map(|entry| entry.set.find_stream(stream))
    }

    pub fn find_stream_mut(&mut self, stream: StreamHandle) -> Option<&mut Stream> {
        self.sets
            .values_mut()
            .find_map(|entry| entry.set.find_stream_mut(stream))
    }

    pub(crate) fn find_stream_for_connection_mut(
        &mut self,
        connection: ConnectionHandle,
    ) -> Option<&mut Stream> {
        self.sets
            .values_mut()
            .find_map(|entry| entry.set.find_stream_for_connection_mut(connection))
    }

    pub fn find_bin(&self, bin: BinHandle) -> Option<Arc<Bin>> {
        self.sets
            .values()
            .find_map(|entry| entry.set.find_bin(bin))
            .cloned()
    }

    /// Visit every set in URI order
    pub fn visit_sets<F>(&self, mut visitor: F)
    where
        F: FnMut(&StreamSet),
    {
        for entry in self.sets.values() {
            visitor(&entry.set);
        }
    }

    pub(crate) fn visit_sets_mut<F>(&mut self, mut visitor: F)
    where
        F: FnMut(&mut StreamSet),
    {
        for entry in self.sets.values_mut() {
            visitor(&mut entry.set);
        }
    }

    /// Subscribe to stream registration across all sets
    ///
    /// Before returning, the callback receives one replayed event for every
    /// stream that already exists, in set-then-stream order.
    pub fn register_for_stream_registered_event<F>(&self, callback: F) -> CallbackId
    where
        F: Fn(StreamRegisteredEventArgs) + Send + Sync + 'static,
    {
        let callback = Arc::new(callback);
        let subscriber = Arc::clone(&callback);
        let id = self.registered.register(move |args| (*subscriber)(args));

        let mut replayed = 0;
        self.visit_sets(|set| {
            set.visit_streams(|stream| {
                (*callback)(StreamRegisteredEventArgs {
                    stream_set: set.handle(),
                    uri: Arc::from(set.uri()),
                    stream: stream.handle(),
                    description: stream.description(),
                });
                replayed += 1;
            });
        });

        tracing::trace!(id = %id, replayed = replayed, "Stream registered subscriber added");
        id
    }

    pub fn register_for_stream_unregistering_event<F>(&self, callback: F) -> CallbackId
    where
        F: Fn(StreamUnregisteringEventArgs) + Send + Sync + 'static,
    {
        self.unregistering.register(callback)
    }

    pub fn unregister_for_stream_registered_event(&self, id: CallbackId) {
        self.registered.unregister(id);
    }

    pub fn unregister_for_stream_unregistering_event(&self, id: CallbackId) {
        self.unregistering.unregister(id);
    }

    /// Number of stream sets
    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    /// Tear down every set, forcing connections and bins closed
    pub fn teardown(&mut self) {
        if self.sets.is_empty() {
            return;
        }

        tracing::info!(sets = self.sets.len(), "Tearing down stream set catalog");

        for (_, entry) in std::mem::take(&mut self.sets) {
            entry.teardown();
        }
        self.set_connections.clear();
    }
}

impl Drop for StreamSetCatalog {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl std::fmt::Debug for StreamSetCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamSetCatalog")
            .field("sets", &self.sets.keys().collect::<Vec<_>>())
            .field("set_connections", &self.set_connections.len())
            .finish()
    }
}
