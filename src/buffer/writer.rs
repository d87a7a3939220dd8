//! Producer side of a bin
//!
//! A [`BinWriter`] is handed to the plugin that created the bin. It owns the
//! current write buffer, so it can be moved to whatever thread the data
//! source runs on while the service keeps its own reference to the bin.

use std::sync::Arc;

use super::bin::{Bin, BinStats};
use super::error::BinError;
use super::frame::FrameBuffer;
use crate::handle::{BinHandle, StreamHandle};

/// Exclusive writer for one bin
#[derive(Debug)]
pub struct BinWriter {
    bin: Arc<Bin>,
    buffer: Option<FrameBuffer>,
}

impl BinWriter {
    pub(crate) fn new(bin: Arc<Bin>, buffer: FrameBuffer) -> Self {
        Self {
            bin,
            buffer: Some(buffer),
        }
    }

    pub fn handle(&self) -> BinHandle {
        self.bin.handle()
    }

    pub fn stream(&self) -> StreamHandle {
        self.bin.stream()
    }

    pub fn has_connections(&self) -> bool {
        self.bin.has_connections()
    }

    /// Current write buffer tagged with `frame_index`
    ///
    /// Returns `None` once the bin has been torn down; callers skip the
    /// frame in that case.
    pub fn begin_write(&mut self, frame_index: u64) -> Option<&mut FrameBuffer> {
        if self.bin.is_torn_down() {
            self.buffer = None;
            return None;
        }

        let buffer = self.buffer.as_mut()?;
        buffer.set_frame_index(frame_index);
        Some(buffer)
    }

    /// Publish the current buffer and take the next one
    pub fn cycle(&mut self) -> Result<(), BinError> {
        let buffer = self
            .buffer
            .take()
            .ok_or(BinError::TornDown(self.bin.handle()))?;

        self.buffer = Some(self.bin.cycle(buffer)?);
        Ok(())
    }

    /// Whether the writer still holds a live buffer
    pub fn is_live(&self) -> bool {
        self.buffer.is_some() && !self.bin.is_torn_down()
    }

    pub fn stats(&self) -> BinStats {
        self.bin.stats()
    }

    /// Drop the write buffer after the bin was destroyed
    pub(crate) fn release(&mut self) {
        self.buffer = None;
    }
}
