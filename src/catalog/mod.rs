//! Stream set catalog
//!
//! The catalog owns every stream set, keyed by URI, and turns per-set
//! stream events into catalog-wide events.
//!
//! # Architecture
//!
//! ```text
//!                      StreamSetCatalog
//!        ┌────────────────────────────────────────────┐
//!        │ sets: BTreeMap<uri, StreamSetEntry {       │
//!        │          set: StreamSet,                   │
//!        │          registered_id, unregistering_id,  │──► catalog registries
//!        │        }>                                  │      (replay on subscribe)
//!        └────────────────────────────────────────────┘
//!                            │
//!              ┌─────────────┼──────────────┐
//!              ▼             ▼              ▼
//!          Stream         Stream         Stream ──► Bins ──► Connections
//! ```
//!
//! # Teardown order
//!
//! Destroying a set first removes its streams (the catalog still sees their
//! unregistering events), then drops the catalog's subscriptions to the set,
//! and only then drops the set. No forwarding callback can outlive the set
//! it is registered on.

pub mod connection;
mod entry;
pub mod store;

pub use connection::StreamSetConnection;
pub use store::StreamSetCatalog;
