//! Tests for configuration validation

use std::time::Duration;

use prometheus_media_jobs::config::{
    CapabilityManifest, Operation, OrchestratorConfig, RetryConfig, SchedulerConfig,
    CLAIM_TTL_MARGIN_SECS,
};

#[test]
fn test_defaults_are_valid() {
    let cfg = OrchestratorConfig::default();
    assert!(cfg.validate().is_ok());

    let limits = cfg.scheduler.limits();
    assert_eq!(limits.batch_size, 5);
    assert_eq!(limits.pacing_delay, Duration::from_secs(1));
    assert_eq!(limits.claim_ttl, Duration::from_secs(900));

    let policy = cfg.retry.policy();
    assert_eq!(policy.initial_delay, Duration::from_secs(30));
    assert_eq!(policy.max_delay, Duration::from_secs(3_600));
    assert!(cfg.pruner.limits().probe_concurrency >= 4);
}

#[test]
fn test_scheduler_config_invalid_batch_size() {
    let invalid = SchedulerConfig {
        batch_size: 0,
        ..SchedulerConfig::default()
    };
    assert!(invalid.validate().is_err());
}

#[test]
fn test_retry_config_rejects_jitter_that_breaks_ordering() {
    let invalid = RetryConfig {
        multiplier: 1.5,
        jitter_ratio: 0.5,
        ..RetryConfig::default()
    };
    assert!(invalid.validate().is_err());

    let invalid = RetryConfig {
        default_max_attempts: 0,
        ..RetryConfig::default()
    };
    assert!(invalid.validate().is_err());
}

#[test]
fn test_root_validation_names_section() {
    let mut cfg = OrchestratorConfig::default();
    cfg.pruner.probe_concurrency = 0;
    let err = cfg.validate().unwrap_err();
    assert!(err.starts_with("pruner invalid"), "{err}");
}

#[test]
fn test_claim_ttl_must_outlast_attempt_timeout() {
    let mut cfg = OrchestratorConfig::default();
    cfg.scheduler.claim_ttl_secs = 60;
    cfg.worker.attempt_timeout_secs = 300;
    let err = cfg.validate().unwrap_err();
    assert!(err.starts_with("scheduler invalid"), "{err}");
    assert!(err.contains("claim_ttl_secs"), "{err}");

    cfg.scheduler.claim_ttl_secs = 300 + CLAIM_TTL_MARGIN_SECS - 1;
    assert!(cfg.validate().is_err());

    cfg.scheduler.claim_ttl_secs = 300 + CLAIM_TTL_MARGIN_SECS;
    assert!(cfg.validate().is_ok());

    let err = OrchestratorConfig::from_json_str(r#"{ "worker": { "attempt_timeout_secs": 900 } }"#)
        .unwrap_err();
    assert!(err.contains("claim_ttl_secs"), "{err}");
}

#[test]
fn test_from_json_str_keeps_defaults_for_missing_fields() {
    let cfg = OrchestratorConfig::from_json_str(
        r#"{
            "scheduler": { "batch_size": 10 },
            "retry": { "initial_delay_ms": 1000, "max_delay_ms": 60000 },
            "capabilities": [
                { "unit": "scheduler-fn", "operations": ["run_scheduler", "process_job"] },
                { "unit": "pruner-fn", "operations": ["prune_channels"] }
            ]
        }"#,
    )
    .unwrap();

    assert_eq!(cfg.scheduler.batch_size, 10);
    assert_eq!(cfg.scheduler.pacing_ms, 1_000);
    assert_eq!(cfg.retry.initial_delay_ms, 1_000);
    assert_eq!(cfg.worker.attempt_timeout_secs, 300);

    let manifest = cfg.manifest("pruner-fn").unwrap();
    assert!(manifest.allows(Operation::PruneChannels));
    assert!(!manifest.allows(Operation::RunScheduler));
    assert!(cfg.manifest("missing").is_none());
}

#[test]
fn test_from_json_str_rejects_bad_input() {
    assert!(OrchestratorConfig::from_json_str("{ not json").is_err());
    let err = OrchestratorConfig::from_json_str(r#"{ "scheduler": { "page_size": 0 } }"#).unwrap_err();
    assert!(err.contains("scheduler invalid"), "{err}");
    let err = OrchestratorConfig::from_json_str(
        r#"{ "capabilities": [ { "unit": " ", "operations": [] } ] }"#,
    )
    .unwrap_err();
    assert!(err.contains("unit"), "{err}");
}

#[test]
fn test_manifest_round_trips_through_json() {
    let manifest = CapabilityManifest {
        unit: "fanout-fn".into(),
        operations: vec![Operation::DeliverNotifications],
    };
    let json = serde_json::to_string(&manifest).unwrap();
    assert!(json.contains("deliver_notifications"));
}

#[test]
fn test_from_env_overrides() {
    std::env::set_var("MEDIA_JOBS_BATCH_SIZE", "7");
    std::env::set_var("MEDIA_JOBS_PROBE_CONCURRENCY", "3");
    let cfg = OrchestratorConfig::from_env().unwrap();
    assert_eq!(cfg.scheduler.batch_size, 7);
    assert_eq!(cfg.pruner.probe_concurrency, 3);

    std::env::set_var("MEDIA_JOBS_BATCH_SIZE", "many");
    assert!(OrchestratorConfig::from_env().is_err());

    std::env::set_var("MEDIA_JOBS_BATCH_SIZE", "0");
    assert!(OrchestratorConfig::from_env().is_err());

    std::env::remove_var("MEDIA_JOBS_BATCH_SIZE");
    std::env::remove_var("MEDIA_JOBS_PROBE_CONCURRENCY");
}
