//! Tests for the tokio spawner and periodic loops

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use prometheus_media_jobs::runtime::{spawn_periodic, Shutdown, Spawn, TokioSpawner};

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_tokio_spawner_spawn() {
    let spawner = TokioSpawner::new(tokio::runtime::Handle::current());

    let (tx, rx) = tokio::sync::oneshot::channel();
    spawner.spawn(async move {
        tx.send(123).unwrap();
    });

    let result = rx.await.expect("oneshot result");
    assert_eq!(result, 123);
}

#[tokio::test(start_paused = true)]
async fn test_periodic_runs_until_shutdown() {
    let runs = Arc::new(AtomicUsize::new(0));
    let shutdown = Shutdown::new();
    let counter = runs.clone();
    spawn_periodic(
        &TokioSpawner::current(),
        "counter",
        Duration::from_secs(10),
        shutdown.subscribe(),
        move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        },
    );

    tokio::time::sleep(Duration::from_secs(25)).await;
    assert_eq!(runs.load(Ordering::SeqCst), 3);

    shutdown.trigger();
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(runs.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn test_periodic_never_starts_after_shutdown() {
    let runs = Arc::new(AtomicUsize::new(0));
    let shutdown = Shutdown::new();
    shutdown.trigger();
    let counter = runs.clone();
    spawn_periodic(
        &TokioSpawner::current(),
        "counter",
        Duration::from_secs(1),
        shutdown.subscribe(),
        move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        },
    );

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(runs.load(Ordering::SeqCst), 0);
}
