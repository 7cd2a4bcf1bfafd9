//! Infrastructure adapters for the job registry, recipient directory and
//! notification queue.

pub mod directory;
pub mod notify;
pub mod registry;

pub use directory::InMemoryRecipientDirectory;
pub use notify::InMemoryNotificationQueue;
pub use registry::InMemoryJobRegistry;
