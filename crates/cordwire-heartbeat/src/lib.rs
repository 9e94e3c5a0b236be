//! Heartbeat timing for the Cordwire gateway client.
//!
//! After HELLO the gateway expects a heartbeat every `heartbeat_interval`
//! milliseconds and answers each one with an ack (opcode 11). This crate
//! owns the *when*: it decides when the next beat is due, tracks whether
//! the previous one was acknowledged, and keeps round-trip metrics. It
//! never touches a socket; the client crate wires it to one.
//!
//! # First-beat jitter
//!
//! The gateway asks clients to send the first beat after
//! `interval * jitter` (jitter in `[0, 1)`) so that a fleet reconnecting
//! at once does not beat in lockstep. Later beats follow the plain
//! interval. Jitter can be turned off for deterministic tests.
//!
//! # Integration
//!
//! The scheduler sits inside the heartbeat task's `tokio::select!` loop:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         Some(signal) = signals.recv() => match signal {
//!             Ack => scheduler.record_ack(),
//!             BeatNow => { scheduler.beat_now(); send_heartbeat().await?; }
//!         },
//!         _beat = scheduler.wait_for_beat() => send_heartbeat().await?,
//!     }
//! }
//! ```

use std::time::Duration;

use rand::Rng;
use tokio::time::{self, Instant};
use tracing::{debug, trace, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration for one connection's heartbeat.
#[derive(Debug, Clone)]
pub struct HeartbeatConfig {
    /// Time between beats, as announced by HELLO.
    pub interval: Duration,
    /// Delay the first beat by a random fraction of the interval.
    pub first_beat_jitter: bool,
}

impl HeartbeatConfig {
    /// Smallest interval the scheduler will run at. A zero interval would
    /// turn the heartbeat task into a busy loop.
    pub const MIN_INTERVAL: Duration = Duration::from_millis(10);

    /// Largest interval the scheduler will run at. Keeps deadline
    /// arithmetic on `Instant` from overflowing.
    pub const MAX_INTERVAL: Duration = Duration::from_secs(60 * 60);

    /// A config for `interval` with jitter enabled.
    pub fn with_interval(interval: Duration) -> Self {
        Self {
            interval,
            first_beat_jitter: true,
        }
    }

    /// Same, from the millisecond value HELLO carries.
    pub fn from_millis(interval_ms: u64) -> Self {
        Self::with_interval(Duration::from_millis(interval_ms))
    }

    /// Returns a copy with jitter switched on or off.
    pub fn jitter(mut self, enabled: bool) -> Self {
        self.first_beat_jitter = enabled;
        self
    }

    /// Clamps out-of-range values so the config is safe to use.
    ///
    /// Called automatically by [`HeartbeatScheduler::new`].
    pub fn validated(mut self) -> Self {
        if self.interval < Self::MIN_INTERVAL {
            warn!(
                interval_ms = self.interval.as_millis() as u64,
                min_ms = Self::MIN_INTERVAL.as_millis() as u64,
                "heartbeat interval below minimum, clamping"
            );
            self.interval = Self::MIN_INTERVAL;
        } else if self.interval > Self::MAX_INTERVAL {
            warn!(
                interval_ms = self.interval.as_millis() as u64,
                max_ms = Self::MAX_INTERVAL.as_millis() as u64,
                "heartbeat interval above maximum, clamping"
            );
            self.interval = Self::MAX_INTERVAL;
        }
        self
    }
}

// ---------------------------------------------------------------------------
// Beat info (returned to caller each beat)
// ---------------------------------------------------------------------------

/// Information about a beat that is due, returned by
/// [`HeartbeatScheduler::wait_for_beat`] and [`HeartbeatScheduler::beat_now`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BeatInfo {
    /// Monotonically increasing beat number (starts at 1).
    pub beat: u64,
    /// `true` if the previous beat was never acknowledged.
    pub missed_ack: bool,
    /// `true` if the server asked for this beat (opcode 1) rather than the
    /// timer firing.
    pub requested: bool,
}

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

/// Running counters for one connection's heartbeat.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeartbeatMetrics {
    /// Beats handed out (timer and server-requested).
    pub beats_sent: u64,
    /// Acks recorded.
    pub acks_received: u64,
    /// Beats that went out while the previous one was still unacked.
    pub missed_acks: u64,
    /// Time from the last acknowledged beat to its ack.
    pub last_rtt: Option<Duration>,
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Heartbeat scheduler for a single connection.
///
/// Uses Tokio's clock throughout, so tests can drive it with
/// `tokio::time::pause()`.
#[derive(Debug)]
pub struct HeartbeatScheduler {
    config: HeartbeatConfig,
    next_beat: Instant,
    beat_count: u64,
    /// When the last beat went out, while it waits for its ack.
    awaiting_ack_since: Option<Instant>,
    metrics: HeartbeatMetrics,
}

impl HeartbeatScheduler {
    /// Creates a scheduler; the first beat is due one (possibly jittered)
    /// interval from now.
    pub fn new(config: HeartbeatConfig) -> Self {
        let config = config.validated();

        let first_delay = if config.first_beat_jitter {
            config.interval.mul_f64(rand::rng().random::<f64>())
        } else {
            config.interval
        };

        debug!(
            interval_ms = config.interval.as_millis() as u64,
            first_beat_ms = first_delay.as_millis() as u64,
            "heartbeat scheduler created"
        );

        Self {
            config,
            next_beat: Instant::now() + first_delay,
            beat_count: 0,
            awaiting_ack_since: None,
            metrics: HeartbeatMetrics::default(),
        }
    }

    /// Waits until the next beat is due. Returns its [`BeatInfo`].
    ///
    /// Cancel-safe: dropping the future before it resolves (for example
    /// when another `select!` branch wins) leaves the schedule untouched.
    pub async fn wait_for_beat(&mut self) -> BeatInfo {
        time::sleep_until(self.next_beat).await;

        let now = Instant::now();
        let late_by = now.saturating_duration_since(self.next_beat);
        if late_by > self.config.interval / 10 {
            debug!(
                beat = self.beat_count + 1,
                late_ms = late_by.as_millis() as u64,
                "heartbeat fired late"
            );
        }
        // Schedule from now, never from the missed deadline.
        self.next_beat = now + self.config.interval;
        self.fire(now, false)
    }

    /// Produces a beat immediately, for a server heartbeat request.
    ///
    /// The timer schedule is left as it is.
    pub fn beat_now(&mut self) -> BeatInfo {
        self.fire(Instant::now(), true)
    }

    fn fire(&mut self, now: Instant, requested: bool) -> BeatInfo {
        self.beat_count += 1;
        let missed_ack = self.awaiting_ack_since.is_some();
        if missed_ack {
            self.metrics.missed_acks += 1;
            warn!(
                beat = self.beat_count,
                missed = self.metrics.missed_acks,
                "previous heartbeat was not acknowledged"
            );
        }
        self.awaiting_ack_since = Some(now);
        self.metrics.beats_sent += 1;

        trace!(beat = self.beat_count, requested, "heartbeat due");

        BeatInfo {
            beat: self.beat_count,
            missed_ack,
            requested,
        }
    }

    /// Records an ack from the gateway.
    pub fn record_ack(&mut self) {
        self.metrics.acks_received += 1;
        match self.awaiting_ack_since.take() {
            Some(sent) => {
                let rtt = sent.elapsed();
                self.metrics.last_rtt = Some(rtt);
                trace!(rtt_ms = rtt.as_millis() as u64, "heartbeat acknowledged");
            }
            None => debug!("heartbeat ack with no beat outstanding"),
        }
    }

    /// Whether the last beat is still waiting for its ack.
    pub fn is_awaiting_ack(&self) -> bool {
        self.awaiting_ack_since.is_some()
    }

    /// Beats produced so far.
    pub fn beat_count(&self) -> u64 {
        self.beat_count
    }

    /// When the timer will fire next.
    pub fn next_beat_at(&self) -> Instant {
        self.next_beat
    }

    pub fn interval(&self) -> Duration {
        self.config.interval
    }

    pub fn metrics(&self) -> &HeartbeatMetrics {
        &self.metrics
    }
}
