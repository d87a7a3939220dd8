//! Service configuration

use std::time::Duration;

use crate::buffer::MIN_POOL_DEPTH;

/// Plugin service configuration options
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Buffers per bin (at least [`MIN_POOL_DEPTH`])
    pub bin_pool_depth: usize,

    /// Largest byte size accepted by `create_stream_bin`
    pub max_bin_size: usize,

    /// Largest byte size accepted by `get_parameter_bin`
    pub max_parameter_bin_size: usize,

    /// Bounded wait handed to every stream read
    pub read_timeout: Duration,

    /// Tick period of the host update task
    pub update_interval: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bin_pool_depth: MIN_POOL_DEPTH,
            max_bin_size: 64 * 1024 * 1024,       // 64MB
            max_parameter_bin_size: 1024 * 1024, // 1MB
            read_timeout: Duration::from_millis(100),
            update_interval: Duration::from_millis(10),
        }
    }
}

impl ServiceConfig {
    /// Set buffers per bin
    pub fn bin_pool_depth(mut self, depth: usize) -> Self {
        self.bin_pool_depth = depth.max(MIN_POOL_DEPTH);
        self
    }

    /// Set the largest bin size
    pub fn max_bin_size(mut self, size: usize) -> Self {
        self.max_bin_size = size;
        self
    }

    /// Set the largest parameter bin size
    pub fn max_parameter_bin_size(mut self, size: usize) -> Self {
        self.max_parameter_bin_size = size;
        self
    }

    /// Set the stream read timeout
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Set the update task period
    pub fn update_interval(mut self, interval: Duration) -> Self {
        self.update_interval = interval;
        self
    }
}
