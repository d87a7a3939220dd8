//! Plugin service
//!
//! The facade producer plugins and the host call through, plus the host
//! side plumbing around it.
//!
//! # Architecture
//!
//! ```text
//!   plugin ──create_stream_set / create_stream / create_stream_bin──┐
//!                                                                   ▼
//!   ServiceHost ── Mutex<PluginService> ──► StreamSetCatalog ──► StreamSet ──► Stream
//!        │                │                                                     │
//!   update task      HostEvent                                              BinWriter
//!   (interval +      subscribers                                                │
//!   spawn_blocking)                                                             ▼
//!                                              consumer ◄── StreamConnection ◄── Bin
//! ```
//!
//! Lifecycle operations go through the lock; frame traffic between
//! [`BinWriter`](crate::buffer::BinWriter) and
//! [`StreamConnection`](crate::buffer::StreamConnection) never takes it.

pub mod config;
pub mod event;
pub mod host;
pub mod log;
pub mod plugin_service;

pub use config::ServiceConfig;
pub use event::HostEvent;
pub use host::ServiceHost;
pub use log::{LogSeverity, PLUGIN_LOG_TARGET};
pub use plugin_service::PluginService;
