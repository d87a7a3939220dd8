//! Streams and stream sets
//!
//! A [`StreamSet`] owns [`Stream`]s; a stream owns its bins and the
//! plugin's [`StreamCallbacks`].

pub mod callbacks;
pub mod description;
pub mod events;
pub mod set;
pub mod source;

pub use callbacks::StreamCallbacks;
pub use description::{StreamDescription, StreamType};
pub use events::{StreamRegisteredEventArgs, StreamUnregisteringEventArgs};
pub use set::StreamSet;
pub use source::{Stream, StreamState};
