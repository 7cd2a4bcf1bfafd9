//! Unit tests for individual components

#[path = "../common/mod.rs"]
mod common;

mod audit_test;
mod builders_test;
mod config_test;
mod error_test;
mod notify_queue_test;
mod runtime_test;
mod util_test;
