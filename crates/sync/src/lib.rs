//! Pokerplan Synchronization Layer
//!
//! Keeps every connected client's view of a room consistent with the
//! authoritative store. Mutators publish a [`ChangeNotice`] after each
//! successful operation; subscribed watchers treat notices purely as
//! triggers and refetch the whole room snapshot after a debounce window.
//! No state ever travels inside a notification.

pub mod error;
pub mod hub;
pub mod protocol;
pub mod watcher;

pub use error::{Result, SyncError};
pub use hub::ChangeHub;
pub use protocol::{ChangeNotice, EntityKind, RoomEvent};
pub use watcher::RoomWatcher;
