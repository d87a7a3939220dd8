//! Frame bins: producer to consumer buffer exchange
//!
//! A bin decouples one producing stream from any number of consumer
//! connections. The producer never waits for consumers and consumers never
//! see a partially written frame.
//!
//! # Architecture
//!
//! ```text
//!        plugin thread                         consumers
//!   ┌──────────────────────┐
//!   │ BinWriter            │           ┌─► StreamConnection ─► latest()/read()
//!   │  begin_write(index)  │  Arc<Bin> │
//!   │  ... fill bytes ...  ├──────────►┼─► StreamConnection ─► wait_for_frame()
//!   │  cycle()             │           │
//!   └──────────────────────┘           └─► ...
//!              │
//!              └── has_connections() == false ─► skip producing the frame
//! ```
//!
//! # Zero-Copy Design
//!
//! The write buffer is a `BytesMut` owned by the producer. Cycling freezes it
//! into `Bytes`, so every reader shares the same allocation by reference
//! count and can keep a frame alive past the slot being rewritten.

pub mod bin;
pub mod connection;
pub mod error;
pub mod frame;
pub mod parameter;
pub mod writer;

pub use bin::{Bin, BinStats, Published, MIN_POOL_DEPTH};
pub use connection::StreamConnection;
pub use error::BinError;
pub use frame::{Frame, FrameBuffer, FrameRef};
pub use parameter::ParameterBinPool;
pub use writer::BinWriter;
