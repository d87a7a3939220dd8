//! Callback registry
//!
//! Typed subscriber tables with stable ids, used for every event the core
//! raises (stream registered, stream unregistering, host events).

pub mod registry;

pub use registry::{CallbackId, CallbackRegistry};
