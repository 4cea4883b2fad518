//! Session state shared by every UI surface and process.
//!
//! This module provides:
//! - `Session` / `UserProfile`: the authenticated identity + token pair
//! - `SessionStore`: durable read/write/clear of the one current session
//! - `SessionBroadcaster`: change notifications for all subscribed surfaces
//!
//! The store is the single source of truth; everything else holds transient
//! copies that are stale as soon as a notification arrives.

pub mod broadcast;
pub mod session;
pub mod store;

pub use broadcast::{SessionBroadcaster, SessionWatch};
pub use session::{Session, UserProfile};
pub use store::SessionStore;
