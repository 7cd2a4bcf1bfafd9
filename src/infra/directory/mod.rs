//! Recipient directory backends.

pub mod memory;

pub use memory::InMemoryRecipientDirectory;
