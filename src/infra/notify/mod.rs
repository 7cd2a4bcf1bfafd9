//! Notification dispatch backends.

pub mod memory;

pub use memory::InMemoryNotificationQueue;
