//! Frame types for bin exchange
//!
//! A producer owns a [`FrameBuffer`] exclusively while writing it. Cycling the
//! bin freezes the buffer into a read-only [`Frame`] whose bytes are shared by
//! reference counting with every reader.

use bytes::{Bytes, BytesMut};

use crate::handle::BinHandle;

/// Reference to a completed frame: pool slot plus the generation written
/// into it
///
/// A reference stays readable until the same slot is written again, one full
/// cycle of the pool later. After that, reading it reports the frame as
/// retired instead of returning newer data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameRef {
    pub bin: BinHandle,
    pub slot: usize,
    pub generation: u64,
}

/// The current write buffer of a bin
#[derive(Debug)]
pub struct FrameBuffer {
    bin: BinHandle,
    slot: usize,
    frame_index: u64,
    data: BytesMut,
    metadata: Bytes,
}

impl FrameBuffer {
    pub(super) fn new(bin: BinHandle, slot: usize, byte_size: usize) -> Self {
        let mut data = BytesMut::with_capacity(byte_size);
        data.resize(byte_size, 0);

        Self {
            bin,
            slot,
            frame_index: 0,
            data,
            metadata: Bytes::new(),
        }
    }

    pub fn bin(&self) -> BinHandle {
        self.bin
    }

    /// Pool slot this buffer will be published into
    pub fn slot(&self) -> usize {
        self.slot
    }

    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    pub fn set_frame_index(&mut self, frame_index: u64) {
        self.frame_index = frame_index;
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Writable frame bytes; the length is fixed at bin creation
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Opaque per-frame metadata (dimensions, pixel format, ...)
    pub fn set_metadata(&mut self, metadata: Bytes) {
        self.metadata = metadata;
    }

    pub fn metadata(&self) -> &Bytes {
        &self.metadata
    }

    /// Freeze into a published frame
    pub(super) fn publish(self, generation: u64) -> Frame {
        Frame {
            bin: self.bin,
            slot: self.slot,
            frame_index: self.frame_index,
            generation,
            data: self.data.freeze(),
            metadata: self.metadata,
        }
    }
}

/// A completed, read-only frame
///
/// Cheap to clone: the payload is reference counted.
#[derive(Debug, Clone)]
pub struct Frame {
    pub bin: BinHandle,
    pub slot: usize,
    /// Producer supplied frame index
    pub frame_index: u64,
    /// Bin-wide publish counter, starting at 1
    pub generation: u64,
    pub data: Bytes,
    pub metadata: Bytes,
}

impl Frame {
    pub fn frame_ref(&self) -> FrameRef {
        FrameRef {
            bin: self.bin,
            slot: self.slot,
            generation: self.generation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::HandleAllocator;

    #[test]
    fn test_buffer_is_zeroed_with_fixed_length() {
        let bin = HandleAllocator::new().bin();
        let buffer = FrameBuffer::new(bin, 0, 16);

        assert_eq!(buffer.len(), 16);
        assert!(buffer.data().iter().all(|b| *b == 0));
    }

    #[test]
    fn test_publish_keeps_contents() {
        let bin = HandleAllocator::new().bin();
        let mut buffer = FrameBuffer::new(bin, 1, 4);
        buffer.set_frame_index(42);
        buffer.data_mut().copy_from_slice(&[1, 2, 3, 4]);
        buffer.set_metadata(Bytes::from_static(b"640x480"));

        let frame = buffer.publish(7);

        assert_eq!(frame.frame_index, 42);
        assert_eq!(frame.generation, 7);
        assert_eq!(&frame.data[..], &[1, 2, 3, 4]);
        assert_eq!(&frame.metadata[..], b"640x480");
        assert_eq!(
            frame.frame_ref(),
            FrameRef {
                bin,
                slot: 1,
                generation: 7
            }
        );
    }
}
