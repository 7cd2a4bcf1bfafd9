//! Fixed-interval loops for the scheduler and the channel pruner.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use crate::core::{ChannelPruner, Scheduler};
use crate::runtime::Spawn;

/// Sender side of a loop shutdown signal.
#[derive(Debug)]
pub struct Shutdown {
    tx: watch::Sender<bool>,
}

impl Shutdown {
    /// Create a signal that has not fired.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    /// Receiver to hand to a loop.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }

    /// Ask every subscribed loop to stop after its current tick.
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Run `task` every `interval` until `shutdown` fires.
///
/// The first run happens immediately. Ticks never overlap within one loop: a
/// run that outlasts the interval delays the next tick instead of stacking.
pub fn spawn_periodic<S, F, Fut>(
    spawner: &S,
    name: &'static str,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
    task: F,
) where
    S: Spawn,
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    spawner.spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!(task = name, interval_ms = interval.as_millis(), "periodic task started");
        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                _ = ticker.tick() => task().await,
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        tracing::info!(task = name, "periodic task stopped");
    });
}

/// Drive [`Scheduler::run_once`] on a fixed interval.
pub fn spawn_scheduler_loop<S: Spawn>(
    spawner: &S,
    scheduler: Arc<Scheduler>,
    interval: Duration,
    shutdown: watch::Receiver<bool>,
) {
    spawn_periodic(spawner, "scheduler", interval, shutdown, move || {
        let scheduler = Arc::clone(&scheduler);
        async move {
            scheduler.run_once().await;
        }
    });
}

/// Drive [`ChannelPruner::run_once`] on a fixed interval.
pub fn spawn_pruner_loop<S: Spawn>(
    spawner: &S,
    pruner: Arc<ChannelPruner>,
    interval: Duration,
    shutdown: watch::Receiver<bool>,
) {
    spawn_periodic(spawner, "channel_pruner", interval, shutdown, move || {
        let pruner = Arc::clone(&pruner);
        async move {
            pruner.run_once().await;
        }
    });
}
