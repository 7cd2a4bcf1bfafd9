//! Job registry backends.

pub mod memory;

pub use memory::InMemoryJobRegistry;
