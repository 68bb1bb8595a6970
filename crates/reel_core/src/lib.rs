//! Headless controller for a wedding invitation reel: envelope intro,
//! synchronized video/audio playback, likes with floating hearts, a realtime
//! comment feed with swipe-to-delete, and share/copy-link.

pub mod config;
pub mod controller;
pub mod engagement;
pub mod events;
pub mod feed;
pub mod intro;
pub mod playback;
pub mod rest_store;
pub mod share;
pub mod store;
pub mod swipe;
pub mod time_ago;
pub mod timers;

pub use config::{load_settings, load_settings_from, Settings};
pub use controller::{ReelDependencies, ReelSnapshot, ReelsController};
pub use events::{Notification, NotificationVariant, ReelEvent};
pub use rest_store::RestCommentStore;
pub use store::{CommentStore, CommentSubscription, InMemoryCommentStore, MissingCommentStore};
