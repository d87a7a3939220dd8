//! Catalog entry
//!
//! An entry owns one stream set together with the catalog's two
//! subscriptions to it. The subscriptions forward the set's events to the
//! catalog-wide registries.

use std::sync::Arc;

use crate::callback::{CallbackId, CallbackRegistry};
use crate::handle::SetConnectionHandle;
use crate::stream::{StreamRegisteredEventArgs, StreamSet, StreamUnregisteringEventArgs};

/// A stream set plus the catalog's subscriptions to it
pub(super) struct StreamSetEntry {
    pub(super) set: StreamSet,
    registered_id: CallbackId,
    unregistering_id: CallbackId,
    attached: bool,

    /// Whether a producer has claimed the set
    pub(super) claimed: bool,

    /// Consumer connections to the set
    pub(super) connections: Vec<SetConnectionHandle>,
}

impl StreamSetEntry {
    /// Wrap `set` and subscribe the catalog registries to its events
    pub(super) fn new(
        set: StreamSet,
        registered: &Arc<CallbackRegistry<StreamRegisteredEventArgs>>,
        unregistering: &Arc<CallbackRegistry<StreamUnregisteringEventArgs>>,
        claimed: bool,
    ) -> Self {
        let forward = Arc::clone(registered);
        let registered_id = set.register_for_stream_registered_event(move |args| {
            forward.dispatch(args);
        });

        let forward = Arc::clone(unregistering);
        let unregistering_id = set.register_for_stream_unregistering_event(move |args| {
            forward.dispatch(args);
        });

        Self {
            set,
            registered_id,
            unregistering_id,
            attached: true,
            claimed,
            connections: Vec::new(),
        }
    }

    /// Drop the catalog's subscriptions to the set
    pub(super) fn detach(&mut self) {
        if !self.attached {
            return;
        }
        self.set
            .unregister_for_stream_registered_event(self.registered_id);
        self.set
            .unregister_for_stream_unregistering_event(self.unregistering_id);
        self.attached = false;
    }

    /// Ordered teardown: remove the streams while still subscribed so the
    /// catalog sees their unregistering events, unsubscribe, then drop the
    /// set
    pub(super) fn teardown(mut self) {
        self.set.remove_all_streams();
        self.detach();

        tracing::info!(uri = %self.set.uri(), set = %self.set.handle(), "Stream set destroyed");
    }
}

impl Drop for StreamSetEntry {
    fn drop(&mut self) {
        self.detach();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::handle::HandleAllocator;
    use crate::stream::{StreamCallbacks, StreamDescription, StreamType};

    struct Idle;
    impl StreamCallbacks for Idle {}

    fn registries() -> (
        Arc<CallbackRegistry<StreamRegisteredEventArgs>>,
        Arc<CallbackRegistry<StreamUnregisteringEventArgs>>,
    ) {
        (
            Arc::new(CallbackRegistry::new("test.registered")),
            Arc::new(CallbackRegistry::new("test.unregistering")),
        )
    }

    #[test]
    fn test_entry_forwards_set_events() {
        let handles = HandleAllocator::new();
        let (registered, unregistering) = registries();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&seen);
        registered.register(move |args: StreamRegisteredEventArgs| {
            sink.lock().unwrap().push(format!("+{}", args.description));
        });
        let sink = Arc::clone(&seen);
        unregistering.register(move |args: StreamUnregisteringEventArgs| {
            sink.lock().unwrap().push(format!("-{}", args.description));
        });

        let mut entry = StreamSetEntry::new(
            StreamSet::new(handles.stream_set(), "astra://sensor0"),
            &registered,
            &unregistering,
            true,
        );
        let stream = entry.set.add_stream(
            handles.stream(),
            StreamDescription::of(StreamType::Depth),
            Box::new(Idle),
        );
        entry.set.remove_stream(stream).unwrap();

        assert_eq!(*seen.lock().unwrap(), vec!["+depth/0", "-depth/0"]);
    }

    #[test]
    fn test_teardown_reports_streams_then_unsubscribes() {
        let handles = HandleAllocator::new();
        let (registered, unregistering) = registries();
        let removed = Arc::new(Mutex::new(0));

        let count = Arc::clone(&removed);
        unregistering.register(move |_| *count.lock().unwrap() += 1);

        let mut entry = StreamSetEntry::new(
            StreamSet::new(handles.stream_set(), "astra://sensor0"),
            &registered,
            &unregistering,
            true,
        );
        entry.set.add_stream(
            handles.stream(),
            StreamDescription::of(StreamType::Depth),
            Box::new(Idle),
        );
        entry.set.add_stream(
            handles.stream(),
            StreamDescription::of(StreamType::Color),
            Box::new(Idle),
        );
        assert_eq!(entry.set.subscriber_count(), 2);

        entry.teardown();
        assert_eq!(*removed.lock().unwrap(), 2);
    }

    #[test]
    fn test_detach_is_idempotent() {
        let handles = HandleAllocator::new();
        let (registered, unregistering) = registries();

        let mut entry = StreamSetEntry::new(
            StreamSet::new(handles.stream_set(), "astra://sensor0"),
            &registered,
            &unregistering,
            false,
        );
        entry.detach();
        entry.detach();
        assert_eq!(entry.set.subscriber_count(), 0);

        // Detached: set events no longer reach the catalog registries
        let hits = Arc::new(Mutex::new(0));
        let h = Arc::clone(&hits);
        registered.register(move |_| *h.lock().unwrap() += 1);
        entry.set.add_stream(
            handles.stream(),
            StreamDescription::of(StreamType::Depth),
            Box::new(Idle),
        );
        assert_eq!(*hits.lock().unwrap(), 0);
    }
}
