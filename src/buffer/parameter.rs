//! Parameter bins
//!
//! Scratch buffers a plugin fills to answer a parameter query. The plugin
//! obtains a bin, writes the value, and returns the handle; the host then
//! takes the bytes out, which frees the bin.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use bytes::{Bytes, BytesMut};

use crate::error::{Error, Result};
use crate::handle::{HandleAllocator, ParameterBinHandle};

/// Pool of outstanding parameter bins
#[derive(Debug)]
pub struct ParameterBinPool {
    handles: Arc<HandleAllocator>,
    max_size: usize,
    bins: HashMap<ParameterBinHandle, BytesMut>,
}

impl ParameterBinPool {
    pub fn new(handles: Arc<HandleAllocator>, max_size: usize) -> Self {
        Self {
            handles,
            max_size,
            bins: HashMap::new(),
        }
    }

    /// Allocate a zeroed bin of `byte_size` bytes
    pub fn get_parameter_bin(&mut self, byte_size: usize) -> Result<(ParameterBinHandle, &mut [u8])> {
        if byte_size > self.max_size {
            return Err(Error::InvalidArgument(format!(
                "parameter bin of {} bytes exceeds limit of {}",
                byte_size, self.max_size
            )));
        }

        let handle = self.handles.parameter_bin();
        let mut data = BytesMut::with_capacity(byte_size);
        data.resize(byte_size, 0);

        tracing::trace!(bin = %handle, byte_size = byte_size, "Parameter bin allocated");

        let data = self.bins.entry(handle).or_insert(data);
        Ok((handle, &mut data[..]))
    }

    /// Remove a bin and return its contents
    pub fn take(&mut self, handle: ParameterBinHandle) -> Result<Bytes> {
        self.bins
            .remove(&handle)
            .map(BytesMut::freeze)
            .ok_or(Error::UnknownParameterBin(handle))
    }

    /// Discard a bin without reading it
    pub fn release(&mut self, handle: ParameterBinHandle) -> bool {
        self.bins.remove(&handle).is_some()
    }

    /// Handles of every bin currently allocated
    pub(crate) fn outstanding(&self) -> HashSet<ParameterBinHandle> {
        self.bins.keys().copied().collect()
    }

    /// Release bins allocated after `before` was taken, except `keep`;
    /// returns how many were released
    pub(crate) fn release_allocated_since(
        &mut self,
        before: &HashSet<ParameterBinHandle>,
        keep: Option<ParameterBinHandle>,
    ) -> usize {
        let count = self.bins.len();
        self.bins
            .retain(|handle, _| before.contains(handle) || Some(*handle) == keep);
        count - self.bins.len()
    }

    pub(crate) fn clear(&mut self) {
        self.bins.clear();
    }

    pub fn len(&self) -> usize {
        self.bins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_and_take() {
        let mut pool = ParameterBinPool::new(Arc::new(HandleAllocator::new()), 64);

        let (handle, data) = pool.get_parameter_bin(4).unwrap();
        data.copy_from_slice(&[9, 8, 7, 6]);
        assert_eq!(pool.len(), 1);

        let bytes = pool.take(handle).unwrap();
        assert_eq!(&bytes[..], &[9, 8, 7, 6]);
        assert!(pool.is_empty());
        assert!(matches!(
            pool.take(handle),
            Err(Error::UnknownParameterBin(_))
        ));
    }

    #[test]
    fn test_size_limit() {
        let mut pool = ParameterBinPool::new(Arc::new(HandleAllocator::new()), 8);

        assert!(pool.get_parameter_bin(9).is_err());
        assert!(pool.get_parameter_bin(8).is_ok());
    }

    #[test]
    fn test_release() {
        let mut pool = ParameterBinPool::new(Arc::new(HandleAllocator::new()), 8);
        let (handle, _) = pool.get_parameter_bin(2).unwrap();

        assert!(pool.release(handle));
        assert!(!pool.release(handle));
    }

    #[test]
    fn test_release_allocated_since() {
        let mut pool = ParameterBinPool::new(Arc::new(HandleAllocator::new()), 8);
        let (earlier, _) = pool.get_parameter_bin(2).unwrap();

        let before = pool.outstanding();
        let (answer, _) = pool.get_parameter_bin(4).unwrap();
        let (scratch, _) = pool.get_parameter_bin(4).unwrap();

        assert_eq!(pool.release_allocated_since(&before, Some(answer)), 1);
        assert!(!pool.release(scratch));
        assert_eq!(pool.len(), 2);

        assert_eq!(pool.release_allocated_since(&before, None), 1);
        assert_eq!(pool.outstanding().into_iter().collect::<Vec<_>>(), vec![earlier]);
    }
}
