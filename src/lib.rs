//! Stream set catalog and frame exchange for sensor plugin hosts
//!
//! Producer plugins publish stream sets (one per device URI) made of typed
//! streams. Each stream hands frames to consumers through bins: fixed pools
//! of buffers with one writer and any number of readers.
//!
//! ```text
//!   plugin                       PluginService                      consumer
//!     │ create_stream_set("astra://sensor0")                            │
//!     │ create_stream(depth) ──► registered event ──────────────────────►│
//!     │ create_stream_bin ──► BinWriter            open_stream_connection│
//!     │                                      StreamConnection ◄──────────┤
//!     │ begin_write / cycle ─────────► Bin ─────────► latest_frame ─────►│
//! ```
//!
//! # Example
//!
//! ```no_run
//! use sensekit::service::PluginService;
//! use sensekit::stream::{StreamCallbacks, StreamDescription, StreamType};
//!
//! struct Depth;
//! impl StreamCallbacks for Depth {}
//!
//! # fn main() -> sensekit::Result<()> {
//! let mut service = PluginService::default();
//! service.register_stream_registered_callback(|args| {
//!     println!("{} now has {}", args.uri, args.description);
//! });
//!
//! let set = service.create_stream_set("astra://sensor0")?;
//! let depth = service.create_stream(set, StreamDescription::of(StreamType::Depth), Depth)?;
//! let mut writer = service.create_stream_bin(depth, 640 * 480 * 2)?;
//!
//! if writer.has_connections() {
//!     if let Some(buffer) = writer.begin_write(1) {
//!         buffer.data_mut().fill(0);
//!     }
//!     service.cycle_bin_buffers(&mut writer)?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod buffer;
pub mod callback;
pub mod catalog;
pub mod error;
pub mod handle;
pub mod service;
pub mod stream;

pub use error::{Error, Result, Status};
pub use handle::{
    BinHandle, ConnectionHandle, ParameterBinHandle, SetConnectionHandle, StreamHandle,
    StreamSetHandle,
};
pub use service::{PluginService, ServiceConfig, ServiceHost};
