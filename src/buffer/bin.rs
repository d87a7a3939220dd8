//! Frame bin
//!
//! A bin is a fixed pool of frame slots for one stream. Exactly one buffer is
//! live for writing at a time and it is owned by the producer as a
//! [`FrameBuffer`] value, so readers can never observe it half written.
//! Cycling publishes the buffer into its slot and advances the write cursor
//! round-robin.
//!
//! ```text
//!            generation g lands in slot (g - 1) % depth
//!
//!   producer ── cycle(buf) ──► slot[0] slot[1] ... slot[depth-1]
//!                                 ▲
//!                      published ─┘ (atomic, Release)
//!                                 │
//!   readers ── latest() ─ Acquire ┴─► FrameRef { slot, generation }
//! ```
//!
//! The published generation is a single atomic value, so a reader sees either
//! the previous or the new complete frame. A [`FrameRef`] stays readable until
//! its slot is written again; afterwards reading it reports the frame as
//! retired.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;

use super::error::BinError;
use super::frame::{Frame, FrameBuffer, FrameRef};
use crate::handle::{BinHandle, ConnectionHandle, StreamHandle};

/// Smallest pool: one slot being written plus one readable slot
pub const MIN_POOL_DEPTH: usize = 2;

/// Value carried on a bin's publish signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Published {
    /// Latest completed generation (0 before the first cycle)
    pub generation: u64,
    pub torn_down: bool,
}

/// Frame buffer pool for one stream
pub struct Bin {
    handle: BinHandle,
    stream: StreamHandle,
    byte_size: usize,
    slots: Box<[Mutex<Option<Frame>>]>,
    published: AtomicU64,
    torn_down: AtomicBool,
    connections: Mutex<Vec<ConnectionHandle>>,
    connection_count: AtomicUsize,
    signal: watch::Sender<Published>,
}

impl Bin {
    /// Allocate a bin and hand back its first write buffer
    pub(crate) fn create(
        handle: BinHandle,
        stream: StreamHandle,
        byte_size: usize,
        pool_depth: usize,
    ) -> (Arc<Bin>, FrameBuffer) {
        let depth = pool_depth.max(MIN_POOL_DEPTH);
        let slots: Vec<Mutex<Option<Frame>>> = (0..depth).map(|_| Mutex::new(None)).collect();
        let (signal, _) = watch::channel(Published {
            generation: 0,
            torn_down: false,
        });

        let bin = Arc::new(Self {
            handle,
            stream,
            byte_size,
            slots: slots.into_boxed_slice(),
            published: AtomicU64::new(0),
            torn_down: AtomicBool::new(false),
            connections: Mutex::new(Vec::new()),
            connection_count: AtomicUsize::new(0),
            signal,
        });

        tracing::debug!(
            bin = %handle,
            stream = %stream,
            byte_size = byte_size,
            pool_depth = depth,
            "Bin created"
        );

        let first = FrameBuffer::new(handle, 0, byte_size);
        (bin, first)
    }

    pub fn handle(&self) -> BinHandle {
        self.handle
    }

    /// Stream that owns this bin
    pub fn stream(&self) -> StreamHandle {
        self.stream
    }

    pub fn byte_size(&self) -> usize {
        self.byte_size
    }

    pub fn pool_depth(&self) -> usize {
        self.slots.len()
    }

    /// Whether any consumer is linked
    ///
    /// Producers skip frame generation entirely while this is false.
    pub fn has_connections(&self) -> bool {
        self.connection_count.load(Ordering::Acquire) > 0
    }

    pub fn connection_count(&self) -> usize {
        self.connection_count.load(Ordering::Acquire)
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down.load(Ordering::Acquire)
    }

    /// Latest completed generation, 0 if nothing was published yet
    pub fn generation(&self) -> u64 {
        self.published.load(Ordering::Acquire)
    }

    fn slot_for(&self, generation: u64) -> usize {
        (generation.saturating_sub(1) % self.slots.len() as u64) as usize
    }

    fn lock_slot(&self, slot: usize) -> MutexGuard<'_, Option<Frame>> {
        self.slots[slot]
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_connections(&self) -> MutexGuard<'_, Vec<ConnectionHandle>> {
        self.connections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Publish `buffer` and return the next write buffer
    ///
    /// Must only be driven by the bin's single writer.
    pub(crate) fn cycle(&self, buffer: FrameBuffer) -> Result<FrameBuffer, BinError> {
        if self.is_torn_down() {
            return Err(BinError::TornDown(self.handle));
        }

        let generation = self.published.load(Ordering::Acquire) + 1;
        let slot = self.slot_for(generation);
        if buffer.bin() != self.handle || buffer.slot() != slot {
            return Err(BinError::ForeignBuffer(self.handle));
        }

        let frame = buffer.publish(generation);
        *self.lock_slot(slot) = Some(frame);
        self.published.store(generation, Ordering::Release);
        self.signal.send_replace(Published {
            generation,
            torn_down: false,
        });

        tracing::trace!(bin = %self.handle, generation = generation, slot = slot, "Bin cycled");

        Ok(FrameBuffer::new(
            self.handle,
            self.slot_for(generation + 1),
            self.byte_size,
        ))
    }

    /// Reference to the most recently completed frame
    pub fn latest(&self) -> Option<FrameRef> {
        if self.is_torn_down() {
            return None;
        }

        match self.published.load(Ordering::Acquire) {
            0 => None,
            generation => Some(FrameRef {
                bin: self.handle,
                slot: self.slot_for(generation),
                generation,
            }),
        }
    }

    /// Read a completed frame
    pub fn frame(&self, frame_ref: FrameRef) -> Result<Frame, BinError> {
        if self.is_torn_down() {
            return Err(BinError::TornDown(self.handle));
        }

        let retired = BinError::FrameRetired {
            bin: self.handle,
            generation: frame_ref.generation,
        };
        if frame_ref.bin != self.handle || frame_ref.slot >= self.slots.len() {
            return Err(retired);
        }

        match &*self.lock_slot(frame_ref.slot) {
            Some(frame) if frame.generation == frame_ref.generation => Ok(frame.clone()),
            _ => Err(retired),
        }
    }

    /// Most recently completed frame, if any
    pub fn latest_frame(&self) -> Option<Frame> {
        let frame_ref = self.latest()?;
        // A cycle may land between the two reads; retry once on the newer ref
        self.frame(frame_ref)
            .ok()
            .or_else(|| self.latest().and_then(|r| self.frame(r).ok()))
    }

    /// Receiver notified on every cycle and on teardown
    pub fn subscribe(&self) -> watch::Receiver<Published> {
        self.signal.subscribe()
    }

    pub(crate) fn link(&self, connection: ConnectionHandle) -> Result<(), BinError> {
        let mut connections = self.lock_connections();
        if self.is_torn_down() {
            return Err(BinError::TornDown(self.handle));
        }

        if !connections.contains(&connection) {
            connections.push(connection);
            self.connection_count
                .store(connections.len(), Ordering::Release);

            tracing::debug!(
                bin = %self.handle,
                connection = %connection,
                connections = connections.len(),
                "Connection linked"
            );
        }

        Ok(())
    }

    pub(crate) fn unlink(&self, connection: ConnectionHandle) -> bool {
        let mut connections = self.lock_connections();
        let before = connections.len();
        connections.retain(|c| *c != connection);
        self.connection_count
            .store(connections.len(), Ordering::Release);

        let removed = connections.len() != before;
        if removed {
            tracing::debug!(
                bin = %self.handle,
                connection = %connection,
                connections = connections.len(),
                "Connection unlinked"
            );
        }
        removed
    }

    /// Release the pool; fails while any connection is linked
    pub(crate) fn destroy(&self) -> Result<(), BinError> {
        let connections = self.lock_connections();
        if !connections.is_empty() {
            return Err(BinError::Connected {
                bin: self.handle,
                connections: connections.len(),
            });
        }

        self.release();
        Ok(())
    }

    /// Tear down regardless of connections; returns the connections that
    /// were still linked
    pub(crate) fn force_teardown(&self) -> Vec<ConnectionHandle> {
        let dropped = {
            let mut connections = self.lock_connections();
            self.connection_count.store(0, Ordering::Release);
            std::mem::take(&mut *connections)
        };

        if !dropped.is_empty() {
            tracing::warn!(
                bin = %self.handle,
                connections = dropped.len(),
                "Bin torn down with linked connections"
            );
        }

        self.release();
        dropped
    }

    fn release(&self) {
        if self.torn_down.swap(true, Ordering::AcqRel) {
            return;
        }

        for slot in 0..self.slots.len() {
            self.lock_slot(slot).take();
        }
        self.signal.send_replace(Published {
            generation: self.published.load(Ordering::Acquire),
            torn_down: true,
        });

        tracing::debug!(bin = %self.handle, "Bin released");
    }

    pub fn stats(&self) -> BinStats {
        BinStats {
            handle: self.handle,
            stream: self.stream,
            byte_size: self.byte_size,
            pool_depth: self.pool_depth(),
            connections: self.connection_count(),
            frames_published: self.generation(),
            torn_down: self.is_torn_down(),
        }
    }
}

impl std::fmt::Debug for Bin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bin")
            .field("handle", &self.handle)
            .field("stream", &self.stream)
            .field("byte_size", &self.byte_size)
            .field("pool_depth", &self.slots.len())
            .field("generation", &self.generation())
            .field("connections", &self.connection_count())
            .finish()
    }
}

/// Statistics for a bin
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinStats {
    pub handle: BinHandle,
    pub stream: StreamHandle,
    pub byte_size: usize,
    pub pool_depth: usize,
    /// Number of linked connections
    pub connections: usize,
    /// Number of completed cycles
    pub frames_published: u64,
    pub torn_down: bool,
}
