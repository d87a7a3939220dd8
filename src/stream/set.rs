//! Stream sets
//!
//! A stream set is the collection of streams published under one URI,
//! typically one physical device. It raises a registered event after each
//! stream is added and an unregistering event before each stream is removed.

use std::sync::Arc;
use std::time::Duration;

use super::callbacks::StreamCallbacks;
use super::description::StreamDescription;
use super::events::{StreamRegisteredEventArgs, StreamUnregisteringEventArgs};
use super::source::Stream;
use crate::buffer::Bin;
use crate::callback::{CallbackId, CallbackRegistry};
use crate::error::{Error, Result};
use crate::handle::{BinHandle, ConnectionHandle, StreamHandle, StreamSetHandle};

/// Named collection of streams
pub struct StreamSet {
    handle: StreamSetHandle,
    uri: Arc<str>,
    streams: Vec<Stream>,
    registered: CallbackRegistry<StreamRegisteredEventArgs>,
    unregistering: CallbackRegistry<StreamUnregisteringEventArgs>,
}

impl StreamSet {
    pub(crate) fn new(handle: StreamSetHandle, uri: &str) -> Self {
        Self {
            handle,
            uri: Arc::from(uri),
            streams: Vec::new(),
            registered: CallbackRegistry::new("streamset.registered"),
            unregistering: CallbackRegistry::new("streamset.unregistering"),
        }
    }

    pub fn handle(&self) -> StreamSetHandle {
        self.handle
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn stream_count(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    /// Total consumer connections across all streams
    pub fn connection_count(&self) -> usize {
        self.streams.iter().map(Stream::connection_count).sum()
    }

    pub fn find_stream(&self, stream: StreamHandle) -> Option<&Stream> {
        self.streams.iter().find(|s| s.handle() == stream)
    }

    pub fn find_stream_mut(&mut self, stream: StreamHandle) -> Option<&mut Stream> {
        self.streams.iter_mut().find(|s| s.handle() == stream)
    }

    pub(crate) fn find_stream_for_connection_mut(
        &mut self,
        connection: ConnectionHandle,
    ) -> Option<&mut Stream> {
        self.streams
            .iter_mut()
            .find(|s| s.has_connection(connection))
    }

    pub fn find_bin(&self, bin: BinHandle) -> Option<&Arc<Bin>> {
        self.streams.iter().find_map(|s| s.find_bin(bin))
    }

    /// Visit every stream in creation order
    pub fn visit_streams<F>(&self, mut visitor: F)
    where
        F: FnMut(&Stream),
    {
        for stream in &self.streams {
            visitor(stream);
        }
    }

    /// Add a stream and raise the registered event
    pub(crate) fn add_stream(
        &mut self,
        handle: StreamHandle,
        description: StreamDescription,
        callbacks: Box<dyn StreamCallbacks>,
    ) -> StreamHandle {
        self.streams
            .push(Stream::new(handle, self.handle, description, callbacks));

        tracing::debug!(
            uri = %self.uri,
            stream = %handle,
            kind = %description,
            "Stream registered"
        );

        self.registered.dispatch(StreamRegisteredEventArgs {
            stream_set: self.handle,
            uri: Arc::clone(&self.uri),
            stream: handle,
            description,
        });

        handle
    }

    /// Raise the unregistering event, then destroy the stream
    ///
    /// Fails while the stream still has consumer connections.
    pub(crate) fn remove_stream(&mut self, handle: StreamHandle) -> Result<()> {
        let stream = self
            .find_stream(handle)
            .ok_or(Error::UnknownStream(handle))?;

        if stream.has_connections() {
            return Err(Error::StreamBusy {
                stream: handle,
                connections: stream.connection_count(),
            });
        }

        self.unregister_and_teardown(handle);
        Ok(())
    }

    /// Remove every stream regardless of connections
    pub(crate) fn remove_all_streams(&mut self) {
        let handles: Vec<StreamHandle> = self.streams.iter().map(Stream::handle).collect();
        for handle in handles {
            self.unregister_and_teardown(handle);
        }
    }

    fn unregister_and_teardown(&mut self, handle: StreamHandle) {
        let Some(index) = self.streams.iter().position(|s| s.handle() == handle) else {
            return;
        };
        let description = self.streams[index].description();

        self.unregistering.dispatch(StreamUnregisteringEventArgs {
            stream_set: self.handle,
            uri: Arc::clone(&self.uri),
            stream: handle,
            description,
        });

        let mut stream = self.streams.remove(index);
        stream.teardown();

        tracing::debug!(
            uri = %self.uri,
            stream = %handle,
            kind = %description,
            "Stream unregistered"
        );
    }

    /// Give every open stream one chance to read
    ///
    /// Every open stream is read even when an earlier one times out or
    /// fails. Returns the first error other than a timeout, else
    /// [`Error::Timeout`] when every read timed out.
    pub fn read(&mut self, timeout: Duration) -> Result<()> {
        let mut attempted = 0;
        let mut timed_out = 0;
        let mut first_error = None;

        for stream in self.streams.iter_mut().filter(|s| s.is_open()) {
            attempted += 1;
            match stream.read(timeout) {
                Ok(()) => {}
                Err(Error::Timeout) => timed_out += 1,
                Err(e) => {
                    tracing::debug!(stream = %stream.handle(), error = %e, "Stream read failed");
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None if attempted > 0 && timed_out == attempted => Err(Error::Timeout),
            None => Ok(()),
        }
    }

    pub fn register_for_stream_registered_event<F>(&self, callback: F) -> CallbackId
    where
        F: Fn(StreamRegisteredEventArgs) + Send + Sync + 'static,
    {
        self.registered.register(callback)
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

    /// Number of subscribers to this set's events, registered plus
    /// unregistering
    pub fn subscriber_count(&self) -> usize {
        self.registered.len() + self.unregistering.len()
    }
}

impl std::fmt::Debug for StreamSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamSet")
            .field("handle", &self.handle)
            .field("uri", &self.uri)
            .field("streams", &self.streams)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::handle::HandleAllocator;
    use crate::stream::StreamType;

    struct Source {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
        timeout: bool,
    }

    impl StreamCallbacks for Source {
        fn read(&mut self, _timeout: Duration) -> Result<()> {
            self.log.lock().unwrap().push(format!("read:{}", self.name));
            if self.timeout {
                Err(Error::Timeout)
            } else {
                Ok(())
            }
        }

        fn close(&mut self) -> Result<()> {
            self.log.lock().unwrap().push(format!("close:{}", self.name));
            Ok(())
        }
    }

    fn source(name: &'static str, log: &Arc<Mutex<Vec<String>>>) -> Box<Source> {
        Box::new(Source {
            name,
            log: Arc::clone(log),
            timeout: false,
        })
    }

    #[test]
    fn test_add_stream_raises_registered_event() {
        let handles = HandleAllocator::new();
        let mut set = StreamSet::new(handles.stream_set(), "astra://sensor0");
        let events = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&events);
        set.register_for_stream_registered_event(move |args| {
            sink.lock().unwrap().push(args.description);
        });

        let log = Arc::new(Mutex::new(Vec::new()));
        set.add_stream(
            handles.stream(),
            StreamDescription::of(StreamType::Depth),
            source("depth", &log),
        );
        set.add_stream(
            handles.stream(),
            StreamDescription::of(StreamType::Color),
            source("color", &log),
        );

        assert_eq!(
            *events.lock().unwrap(),
            vec![
                StreamDescription::of(StreamType::Depth),
                StreamDescription::of(StreamType::Color)
            ]
        );
        assert_eq!(set.stream_count(), 2);
    }

    #[test]
    fn test_unregistering_fires_before_teardown() {
        let handles = HandleAllocator::new();
        let mut set = StreamSet::new(handles.stream_set(), "astra://sensor0");
        let log = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&log);
        set.register_for_stream_unregistering_event(move |args| {
            sink.lock()
                .unwrap()
                .push(format!("unregistering:{}", args.description.stream_type));
        });

        let depth = set.add_stream(
            handles.stream(),
            StreamDescription::of(StreamType::Depth),
            source("depth", &log),
        );
        set.find_stream_mut(depth).unwrap().open().unwrap();

        set.remove_stream(depth).unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            vec!["unregistering:depth", "close:depth"]
        );
        let mut visited = 0;
        set.visit_streams(|_| visited += 1);
        assert_eq!(visited, 0);
        assert!(matches!(
            set.remove_stream(depth),
            Err(Error::UnknownStream(_))
        ));
    }

    #[test]
    fn test_remove_stream_with_connection_is_busy() {
        let handles = HandleAllocator::new();
        let mut set = StreamSet::new(handles.stream_set(), "astra://sensor0");
        let log = Arc::new(Mutex::new(Vec::new()));

        let depth = set.add_stream(
            handles.stream(),
            StreamDescription::of(StreamType::Depth),
            source("depth", &log),
        );
        let connection = set
            .find_stream_mut(depth)
            .unwrap()
            .add_connection(handles.connection())
            .unwrap();

        let err = set.remove_stream(depth).unwrap_err();
        assert_eq!(err.status(), crate::error::Status::ResourceBusy);
        assert_eq!(set.stream_count(), 1);

        set.find_stream_for_connection_mut(connection.handle())
            .unwrap()
            .remove_connection(connection.handle())
            .unwrap();
        set.remove_stream(depth).unwrap();
        assert!(set.is_empty());
    }

    fn quiet(name: &'static str, log: &Arc<Mutex<Vec<String>>>) -> Box<Source> {
        Box::new(Source {
            name,
            log: Arc::clone(log),
            timeout: true,
        })
    }

    struct Broken(Arc<Mutex<Vec<String>>>);

    impl StreamCallbacks for Broken {
        fn read(&mut self, _timeout: Duration) -> Result<()> {
            self.0.lock().unwrap().push("read:broken".into());
            Err(Error::Device("sensor unplugged".into()))
        }
    }

    #[test]
    fn test_quiet_stream_does_not_starve_others() {
        let handles = HandleAllocator::new();
        let mut set = StreamSet::new(handles.stream_set(), "astra://sensor0");
        let log = Arc::new(Mutex::new(Vec::new()));

        let depth = set.add_stream(
            handles.stream(),
            StreamDescription::of(StreamType::Depth),
            quiet("depth", &log),
        );
        let _closed = set.add_stream(
            handles.stream(),
            StreamDescription::of(StreamType::Infrared),
            source("closed", &log),
        );
        let color = set.add_stream(
            handles.stream(),
            StreamDescription::of(StreamType::Color),
            source("color", &log),
        );
        for handle in [depth, color] {
            set.find_stream_mut(handle).unwrap().open().unwrap();
        }

        for _ in 0..3 {
            set.read(Duration::from_millis(1)).unwrap();
        }

        let log = log.lock().unwrap();
        assert_eq!(log.iter().filter(|l| *l == "read:color").count(), 3);
        assert_eq!(log.iter().filter(|l| *l == "read:depth").count(), 3);
        assert!(!log.contains(&"read:closed".to_string()));
    }

    #[test]
    fn test_read_times_out_only_when_every_stream_does() {
        let handles = HandleAllocator::new();
        let mut set = StreamSet::new(handles.stream_set(), "astra://sensor0");
        let log = Arc::new(Mutex::new(Vec::new()));

        // Nothing open: nothing to wait for
        set.read(Duration::from_millis(1)).unwrap();

        for (name, kind) in [("a", StreamType::Depth), ("b", StreamType::Color)] {
            let handle = set.add_stream(
                handles.stream(),
                StreamDescription::of(kind),
                quiet(name, &log),
            );
            set.find_stream_mut(handle).unwrap().open().unwrap();
        }

        assert!(matches!(
            set.read(Duration::from_millis(1)),
            Err(Error::Timeout)
        ));
        assert_eq!(*log.lock().unwrap(), vec!["read:a", "read:b"]);
    }

    #[test]
    fn test_read_error_mid_pass_reads_remaining_streams() {
        let handles = HandleAllocator::new();
        let mut set = StreamSet::new(handles.stream_set(), "astra://sensor0");
        let log = Arc::new(Mutex::new(Vec::new()));

        let first = set.add_stream(
            handles.stream(),
            StreamDescription::of(StreamType::Depth),
            quiet("first", &log),
        );
        let broken = set.add_stream(
            handles.stream(),
            StreamDescription::of(StreamType::Color),
            Box::new(Broken(Arc::clone(&log))),
        );
        let last = set.add_stream(
            handles.stream(),
            StreamDescription::of(StreamType::Point),
            source("last", &log),
        );
        for handle in [first, broken, last] {
            set.find_stream_mut(handle).unwrap().open().unwrap();
        }

        let err = set.read(Duration::from_millis(1)).unwrap_err();
        assert_eq!(err.status(), crate::error::Status::DeviceError);
        assert_eq!(
            *log.lock().unwrap(),
            vec!["read:first", "read:broken", "read:last"]
        );
    }

    #[test]
    fn test_removed_stream_is_not_read() {
        let handles = HandleAllocator::new();
        let mut set = StreamSet::new(handles.stream_set(), "astra://sensor0");
        let log = Arc::new(Mutex::new(Vec::new()));

        let a = set.add_stream(
            handles.stream(),
            StreamDescription::of(StreamType::Depth),
            source("a", &log),
        );
        let b = set.add_stream(
            handles.stream(),
            StreamDescription::of(StreamType::Color),
            source("b", &log),
        );
        for handle in [a, b] {
            set.find_stream_mut(handle).unwrap().open().unwrap();
        }

        set.read(Duration::from_millis(1)).unwrap();
        set.remove_stream(a).unwrap();
        set.read(Duration::from_millis(1)).unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            vec!["read:a", "read:b", "close:a", "read:b"]
        );
    }

    #[test]
    fn test_unregistered_subscriber_is_not_called() {
        let handles = HandleAllocator::new();
        let mut set = StreamSet::new(handles.stream_set(), "astra://sensor0");
        let hits = Arc::new(Mutex::new(0));

        let h = Arc::clone(&hits);
        let id = set.register_for_stream_registered_event(move |_| *h.lock().unwrap() += 1);
        set.unregister_for_stream_registered_event(id);
        set.unregister_for_stream_registered_event(id);

        let log = Arc::new(Mutex::new(Vec::new()));
        set.add_stream(
            handles.stream(),
            StreamDescription::of(StreamType::Depth),
            source("depth", &log),
        );
        assert_eq!(*hits.lock().unwrap(), 0);
        assert_eq!(set.subscriber_count(), 0);
    }
}
