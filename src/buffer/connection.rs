//! Consumer side of a bin
//!
//! A [`StreamConnection`] is a consumer's subscription to a stream. The
//! stream's plugin decides which bin the connection is linked to; the link
//! is shared between the connection and the owning stream so relinking or
//! teardown is visible to the consumer immediately. Connections only ever
//! read: there is no path from a connection to a write buffer.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use super::bin::Bin;
use super::error::BinError;
use super::frame::{Frame, FrameRef};
use crate::handle::{BinHandle, ConnectionHandle, StreamHandle};

/// Link shared by a connection and its stream
#[derive(Debug, Default)]
pub(crate) struct ConnectionLink {
    bin: RwLock<Option<Arc<Bin>>>,
}

impl ConnectionLink {
    pub(crate) fn bin(&self) -> Option<Arc<Bin>> {
        self.bin
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the linked bin, returning the previous one
    pub(crate) fn set(&self, bin: Option<Arc<Bin>>) -> Option<Arc<Bin>> {
        let mut slot = self.bin.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *slot, bin)
    }
}

/// A consumer connection to a stream
#[derive(Debug)]
pub struct StreamConnection {
    handle: ConnectionHandle,
    stream: StreamHandle,
    link: Arc<ConnectionLink>,
}

impl StreamConnection {
    pub(crate) fn new(
        handle: ConnectionHandle,
        stream: StreamHandle,
        link: Arc<ConnectionLink>,
    ) -> Self {
        Self {
            handle,
            stream,
            link,
        }
    }

    pub fn handle(&self) -> ConnectionHandle {
        self.handle
    }

    pub fn stream(&self) -> StreamHandle {
        self.stream
    }

    /// Bin this connection is currently linked to
    pub fn bin(&self) -> Option<BinHandle> {
        self.linked_bin().map(|b| b.handle())
    }

    pub fn is_linked(&self) -> bool {
        self.linked_bin().is_some()
    }

    fn linked_bin(&self) -> Option<Arc<Bin>> {
        self.link.bin().filter(|b| !b.is_torn_down())
    }

    /// Reference to the latest completed frame
    pub fn latest(&self) -> Option<FrameRef> {
        self.linked_bin()?.latest()
    }

    /// Read a frame previously obtained from [`latest`](Self::latest)
    pub fn read(&self, frame_ref: FrameRef) -> Result<Frame, BinError> {
        let bin = self
            .linked_bin()
            .ok_or(BinError::NotLinked(self.handle))?;
        bin.frame(frame_ref)
    }

    /// Latest completed frame
    pub fn latest_frame(&self) -> Option<Frame> {
        self.linked_bin()?.latest_frame()
    }

    /// Wait for a frame newer than generation `after`
    ///
    /// Bounded by `timeout`; a bin torn down while waiting ends the wait
    /// with [`BinError::TornDown`].
    pub async fn wait_for_frame(&self, after: u64, timeout: Duration) -> Result<Frame, BinError> {
        let bin = self
            .linked_bin()
            .ok_or(BinError::NotLinked(self.handle))?;
        let mut rx = bin.subscribe();

        let published = {
            let wait = rx.wait_for(|p| p.torn_down || p.generation > after);
            match tokio::time::timeout(timeout, wait).await {
                Err(_) => return Err(BinError::Timeout(timeout)),
                Ok(Err(_)) => return Err(BinError::TornDown(bin.handle())),
                Ok(Ok(published)) => *published,
            }
        };

        if published.torn_down {
            return Err(BinError::TornDown(bin.handle()));
        }

        // Prefer the newest frame; if the producer lapped us, fall back to it
        bin.latest_frame()
            .filter(|f| f.generation > after)
            .ok_or(BinError::FrameRetired {
                bin: bin.handle(),
                generation: published.generation,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::writer::BinWriter;
    use crate::handle::HandleAllocator;

    fn linked_pair() -> (BinWriter, StreamConnection, Arc<Bin>) {
        let handles = HandleAllocator::new();
        let stream = handles.stream();
        let (bin, buffer) = Bin::create(handles.bin(), stream, 2, 2);
        let connection_handle = handles.connection();

        let link = Arc::new(ConnectionLink::default());
        bin.link(connection_handle).unwrap();
        link.set(Some(Arc::clone(&bin)));

        let connection = StreamConnection::new(connection_handle, stream, link);
        (BinWriter::new(Arc::clone(&bin), buffer), connection, bin)
    }

    #[test]
    fn test_unlinked_connection_reads_nothing() {
        let handles = HandleAllocator::new();
        let connection = StreamConnection::new(
            handles.connection(),
            handles.stream(),
            Arc::new(ConnectionLink::default()),
        );

        assert!(!connection.is_linked());
        assert!(connection.latest().is_none());

        let frame_ref = FrameRef {
            bin: handles.bin(),
            slot: 0,
            generation: 1,
        };
        assert!(matches!(
            connection.read(frame_ref),
            Err(BinError::NotLinked(_))
        ));
    }

    #[test]
    fn test_read_latest_frame() {
        let (mut writer, connection, _bin) = linked_pair();

        writer.begin_write(1).unwrap().data_mut().copy_from_slice(b"hi");
        writer.cycle().unwrap();

        let frame_ref = connection.latest().unwrap();
        let frame = connection.read(frame_ref).unwrap();
        assert_eq!(&frame.data[..], b"hi");
        assert_eq!(connection.bin(), Some(writer.handle()));
    }

    #[tokio::test]
    async fn test_wait_for_frame() {
        let (mut writer, connection, _bin) = linked_pair();

        let producer = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            writer.begin_write(9).unwrap().data_mut().copy_from_slice(b"ok");
            writer.cycle().unwrap();
            writer
        });

        let frame = connection
            .wait_for_frame(0, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(frame.frame_index, 9);
        assert_eq!(&frame.data[..], b"ok");

        let _writer = producer.await.unwrap();
    }

    #[tokio::test]
    async fn test_wait_for_frame_times_out() {
        let (_writer, connection, _bin) = linked_pair();

        let result = connection
            .wait_for_frame(0, Duration::from_millis(20))
            .await;
        assert!(matches!(result, Err(BinError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_wait_for_frame_ends_on_teardown() {
        let (_writer, connection, bin) = linked_pair();

        let teardown = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            bin.force_teardown();
        });

        let result = connection.wait_for_frame(0, Duration::from_secs(5)).await;
        assert!(matches!(result, Err(BinError::TornDown(_))));
        teardown.await.unwrap();
    }
}
