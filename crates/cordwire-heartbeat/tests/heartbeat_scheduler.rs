//! Integration tests for the heartbeat scheduler.
//!
//! Uses `start_paused = true` to control time deterministically. With a
//! paused clock Tokio auto-advances to the next timer whenever every task
//! is idle, so `sleep_until` resolves instantly.

use std::time::Duration;

use cordwire_heartbeat::{HeartbeatConfig, HeartbeatScheduler};
use tokio::time::Instant;

// =========================================================================
// Helpers
// =========================================================================

fn no_jitter(ms: u64) -> HeartbeatConfig {
    HeartbeatConfig::from_millis(ms).jitter(false)
}

// =========================================================================
// HeartbeatConfig
// =========================================================================

#[test]
fn test_with_interval_enables_jitter() {
    let cfg = HeartbeatConfig::with_interval(Duration::from_secs(41));
    assert!(cfg.first_beat_jitter);
    assert_eq!(cfg.interval, Duration::from_secs(41));
}

#[test]
fn test_validated_clamps_zero_interval() {
    let cfg = HeartbeatConfig::from_millis(0).validated();
    assert_eq!(cfg.interval, HeartbeatConfig::MIN_INTERVAL);
}

#[test]
fn test_validated_clamps_huge_interval() {
    let cfg = HeartbeatConfig::from_millis(u64::MAX).validated();
    assert_eq!(cfg.interval, HeartbeatConfig::MAX_INTERVAL);
}

// =========================================================================
// Scheduler creation and accessors
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_scheduler_initial_state() {
    let s = HeartbeatScheduler::new(no_jitter(1_000));
    assert_eq!(s.beat_count(), 0);
    assert!(!s.is_awaiting_ack());
    assert_eq!(s.interval(), Duration::from_millis(1_000));
    assert_eq!(s.metrics().beats_sent, 0);
    assert_eq!(s.metrics().last_rtt, None);
}

#[tokio::test(start_paused = true)]
async fn test_huge_interval_schedules_without_overflow() {
    let start = Instant::now();
    let s = HeartbeatScheduler::new(no_jitter(u64::MAX));
    assert_eq!(s.interval(), HeartbeatConfig::MAX_INTERVAL);
    assert_eq!(s.next_beat_at(), start + HeartbeatConfig::MAX_INTERVAL);
}

#[tokio::test(start_paused = true)]
async fn test_jittered_first_beat_within_one_interval() {
    let start = Instant::now();
    let s = HeartbeatScheduler::new(HeartbeatConfig::from_millis(1_000));
    assert!(s.next_beat_at() >= start);
    assert!(s.next_beat_at() < start + Duration::from_millis(1_000));
}

// =========================================================================
// Beat timing
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_first_beat_after_one_interval_without_jitter() {
    let start = Instant::now();
    let mut s = HeartbeatScheduler::new(no_jitter(500));

    let info = s.wait_for_beat().await;
    assert_eq!(info.beat, 1);
    assert!(!info.missed_ack);
    assert!(!info.requested);
    let elapsed = Instant::now() - start;
    assert!(elapsed >= Duration::from_millis(500) && elapsed < Duration::from_millis(502));
}

#[tokio::test(start_paused = true)]
async fn test_beats_follow_interval() {
    let start = Instant::now();
    let mut s = HeartbeatScheduler::new(no_jitter(100));

    for expected in 1..=4 {
        let info = s.wait_for_beat().await;
        assert_eq!(info.beat, expected);
        s.record_ack();
    }
    let elapsed = Instant::now() - start;
    assert!(elapsed >= Duration::from_millis(400) && elapsed < Duration::from_millis(405));
}

#[tokio::test(start_paused = true)]
async fn test_beat_not_due_before_interval() {
    let mut s = HeartbeatScheduler::new(no_jitter(1_000));
    let result = tokio::time::timeout(Duration::from_millis(999), s.wait_for_beat()).await;
    assert!(result.is_err(), "beat fired early");
    // The cancelled wait did not disturb the schedule.
    assert_eq!(s.beat_count(), 0);
    let info = s.wait_for_beat().await;
    assert_eq!(info.beat, 1);
}

#[tokio::test(start_paused = true)]
async fn test_beat_now_is_immediate_and_keeps_schedule() {
    let mut s = HeartbeatScheduler::new(no_jitter(1_000));
    let due = s.next_beat_at();

    let info = s.beat_now();
    assert_eq!(info.beat, 1);
    assert!(info.requested);
    assert_eq!(s.next_beat_at(), due);
}

// =========================================================================
// Acks and metrics
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_ack_clears_outstanding_and_records_rtt() {
    let mut s = HeartbeatScheduler::new(no_jitter(100));
    s.wait_for_beat().await;
    assert!(s.is_awaiting_ack());

    tokio::time::advance(Duration::from_millis(30)).await;
    s.record_ack();

    assert!(!s.is_awaiting_ack());
    assert_eq!(s.metrics().acks_received, 1);
    assert_eq!(s.metrics().last_rtt, Some(Duration::from_millis(30)));
}

#[tokio::test(start_paused = true)]
async fn test_missed_ack_flagged_on_next_beat() {
    let mut s = HeartbeatScheduler::new(no_jitter(100));
    let first = s.wait_for_beat().await;
    assert!(!first.missed_ack);

    // No ack before the next beat is due.
    let second = s.wait_for_beat().await;
    assert!(second.missed_ack);
    assert_eq!(s.metrics().missed_acks, 1);

    s.record_ack();
    let third = s.wait_for_beat().await;
    assert!(!third.missed_ack);
    assert_eq!(s.metrics().missed_acks, 1);
    assert_eq!(s.metrics().beats_sent, 3);
}

#[tokio::test(start_paused = true)]
async fn test_unsolicited_ack_is_counted_without_rtt() {
    let mut s = HeartbeatScheduler::new(no_jitter(100));
    s.record_ack();
    assert_eq!(s.metrics().acks_received, 1);
    assert_eq!(s.metrics().last_rtt, None);
}

// =========================================================================
// Integration: select! loop pattern (mirrors the heartbeat task)
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_select_loop_pattern() {
    let mut s = HeartbeatScheduler::new(no_jitter(50));
    let (tx, mut rx) = tokio::sync::mpsc::channel::<&str>(10);

    tokio::spawn(async move {
        // Stop after ~3 beats at 50ms each.
        tokio::time::sleep(Duration::from_millis(160)).await;
        tx.send("stop").await.ok();
    });

    let mut beats = 0u64;
    loop {
        tokio::select! {
            Some(cmd) = rx.recv() => {
                assert_eq!(cmd, "stop");
                break;
            }
            info = s.wait_for_beat() => {
                beats += 1;
                assert_eq!(info.beat, beats);
                s.record_ack();
            }
        }
    }

    assert_eq!(beats, 3);
}
