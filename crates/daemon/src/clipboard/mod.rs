//! Shared clipboard state and change fan-out.

pub mod broadcast;
pub mod store;

pub use broadcast::ClipboardBroadcaster;
pub use store::{ClipboardSource, ClipboardStore};
