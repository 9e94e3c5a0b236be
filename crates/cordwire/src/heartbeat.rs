//! The per-connection heartbeat task.
//!
//! [`HeartbeatTask`] owns a spawned task that sends `{op:1}` frames on the
//! schedule from `cordwire-heartbeat`. Dropping the handle aborts the task,
//! so a heartbeat never outlives the attempt that started it.
//!
//! A timer beat that comes due while the previous one is still unacked
//! ends the task with [`CordwireError::Heartbeat`]. The read loop sees that
//! through [`HeartbeatTask::stopped`] and the attempt is abandoned, so a
//! gateway that went silent is dropped after two intervals at most.

use std::convert::Infallible;
use std::sync::Arc;

use cordwire_heartbeat::{HeartbeatConfig, HeartbeatMetrics, HeartbeatScheduler};
use cordwire_protocol::{Codec, JsonCodec, outbound};
use cordwire_session::SequenceReader;
use cordwire_transport::Connection;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::CordwireError;

/// Messages from the read loop to the heartbeat task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HeartbeatSignal {
    /// Opcode 11 arrived.
    Ack,
    /// Opcode 1 arrived: beat immediately.
    BeatNow,
}

/// Handle to a running heartbeat task. Aborts the task on drop.
pub(crate) struct HeartbeatTask {
    handle: JoinHandle<Result<Infallible, CordwireError>>,
    signals: mpsc::UnboundedSender<HeartbeatSignal>,
}

impl HeartbeatTask {
    pub(crate) fn spawn<T: Connection>(
        conn: Arc<T>,
        codec: JsonCodec,
        config: HeartbeatConfig,
        sequence: SequenceReader,
        metrics: Arc<watch::Sender<HeartbeatMetrics>>,
    ) -> Self {
        let (signals, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(beat_loop(conn, codec, config, sequence, metrics, rx));
        Self { handle, signals }
    }

    /// Forwards a signal. Lost only if the task already stopped, which
    /// [`stopped`](Self::stopped) reports.
    pub(crate) fn signal(&self, signal: HeartbeatSignal) {
        let _ = self.signals.send(signal);
    }

    /// Resolves when the task ends, with the reason. Cancel-safe.
    pub(crate) async fn stopped(&mut self) -> CordwireError {
        match (&mut self.handle).await {
            Ok(Err(e)) => e,
            Ok(Ok(never)) => match never {},
            Err(join) => CordwireError::Heartbeat(join.to_string()),
        }
    }
}

impl Drop for HeartbeatTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn beat_loop<T: Connection>(
    conn: Arc<T>,
    codec: JsonCodec,
    config: HeartbeatConfig,
    sequence: SequenceReader,
    metrics: Arc<watch::Sender<HeartbeatMetrics>>,
    mut signals: mpsc::UnboundedReceiver<HeartbeatSignal>,
) -> Result<Infallible, CordwireError> {
    let mut scheduler = HeartbeatScheduler::new(config);
    metrics.send_replace(scheduler.metrics().clone());
    debug!(conn = %conn.id(), interval_ms = scheduler.interval().as_millis() as u64, "heartbeat started");

    loop {
        tokio::select! {
            signal = signals.recv() => match signal {
                Some(HeartbeatSignal::Ack) => scheduler.record_ack(),
                Some(HeartbeatSignal::BeatNow) => {
                    let beat = scheduler.beat_now();
                    trace!(beat = beat.beat, "gateway requested a heartbeat");
                    send_beat(&*conn, &codec, &sequence).await?;
                }
                None => {
                    return Err(CordwireError::Heartbeat("signal channel closed".into()));
                }
            },
            beat = scheduler.wait_for_beat() => {
                if beat.missed_ack {
                    metrics.send_replace(scheduler.metrics().clone());
                    return Err(CordwireError::Heartbeat(format!(
                        "beat {} was not acknowledged",
                        beat.beat - 1
                    )));
                }
                send_beat(&*conn, &codec, &sequence).await?;
            }
        }
        metrics.send_replace(scheduler.metrics().clone());
    }
}

async fn send_beat<T: Connection>(
    conn: &T,
    codec: &JsonCodec,
    sequence: &SequenceReader,
) -> Result<(), CordwireError> {
    let seq = sequence.get();
    let text = codec.encode(&outbound::heartbeat(seq))?;
    conn.send(&text).await?;
    trace!(?seq, "heartbeat sent");
    Ok(())
}
