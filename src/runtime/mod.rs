//! Runtime adapters: task spawning, periodic loops and the batch API surface.

pub mod api;
pub mod periodic;
pub mod tokio_spawner;

pub use api::{
    handle_notification_batch, BatchItemFailure, BatchResponse, NotificationBatch, NotificationRecord,
};
pub use periodic::{spawn_periodic, spawn_pruner_loop, spawn_scheduler_loop, Shutdown};
pub use tokio_spawner::{Spawn, TokioSpawner};
