//! Tests for identifier and clock utilities

use std::time::Duration;

use prometheus_media_jobs::util::{now_ms, Clock, JobId, ManualClock, PrincipalId, SystemClock};

#[test]
fn test_ids_serialize_transparently() {
    let id = JobId::from("job-1");
    assert_eq!(serde_json::to_string(&id).unwrap(), "\"job-1\"");
    let back: PrincipalId = serde_json::from_str("\"alice\"").unwrap();
    assert_eq!(back.as_str(), "alice");
    assert_eq!(JobId::new("a").to_string(), "a");
}

#[test]
fn test_manual_clock_is_shared_between_clones() {
    let clock = ManualClock::new(5);
    let other = clock.clone();
    clock.advance(Duration::from_millis(10));
    assert_eq!(other.now_ms(), 15);
}

#[test]
fn test_system_clock_tracks_wall_time() {
    let before = now_ms();
    let reading = SystemClock.now_ms();
    assert!(reading >= before);
}
