//! Types stored in the cookie session and shown to visitors.

pub mod notification;
pub mod session;

pub use notification::{Notification, NotificationLevel};
pub use session::keys as session_keys;
