//! The dispatch sequence number, shared between the connection loop (the
//! only writer) and the heartbeat task (a reader).

use tokio::sync::watch;
use tracing::warn;

/// Single-writer cell holding the last sequence number seen on this
/// connection. `None` until the first dispatch.
///
/// Backed by a `watch` channel so readers on other tasks always see the
/// latest value without locking the writer out.
#[derive(Debug)]
pub struct SequenceTracker {
    tx: watch::Sender<Option<u64>>,
}

impl SequenceTracker {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx }
    }

    /// Records a sequence number from a dispatch.
    ///
    /// The stored value never decreases: a number below the current one is
    /// dropped with a warning and `false` is returned. Repeating the
    /// current number is accepted.
    pub fn record(&self, seq: u64) -> bool {
        let mut accepted = true;
        self.tx.send_if_modified(|current| match *current {
            Some(prev) if seq < prev => {
                accepted = false;
                false
            }
            Some(prev) if seq == prev => false,
            _ => {
                *current = Some(seq);
                true
            }
        });
        if !accepted {
            warn!(seq, current = ?self.current(), "ignoring sequence regression");
        }
        accepted
    }

    /// The last recorded sequence, if any.
    pub fn current(&self) -> Option<u64> {
        *self.tx.borrow()
    }

    /// A read-only handle for another task.
    pub fn reader(&self) -> SequenceReader {
        SequenceReader {
            rx: self.tx.subscribe(),
        }
    }
}

impl Default for SequenceTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Read-only view of a [`SequenceTracker`].
#[derive(Debug, Clone)]
pub struct SequenceReader {
    rx: watch::Receiver<Option<u64>>,
}

impl SequenceReader {
    /// The latest sequence the writer recorded.
    pub fn get(&self) -> Option<u64> {
        *self.rx.borrow()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_tracker_is_none() {
        assert_eq!(SequenceTracker::new().current(), None);
    }

    #[test]
    fn test_record_advances() {
        let t = SequenceTracker::new();
        assert!(t.record(1));
        assert!(t.record(5));
        assert_eq!(t.current(), Some(5));
    }

    #[test]
    fn test_record_regression_is_ignored() {
        let t = SequenceTracker::new();
        t.record(10);
        assert!(!t.record(3));
        assert_eq!(t.current(), Some(10));
    }

    #[test]
    fn test_record_repeat_is_accepted() {
        let t = SequenceTracker::new();
        t.record(4);
        assert!(t.record(4));
        assert_eq!(t.current(), Some(4));
    }

    #[test]
    fn test_reader_sees_latest_value() {
        let t = SequenceTracker::new();
        let reader = t.reader();
        assert_eq!(reader.get(), None);
        t.record(7);
        assert_eq!(reader.get(), Some(7));
        let cloned = reader.clone();
        t.record(8);
        assert_eq!(cloned.get(), Some(8));
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn current_is_running_max(seqs in proptest::collection::vec(any::<u64>(), 1..64)) {
                let t = SequenceTracker::new();
                let reader = t.reader();
                let mut max = 0;
                for seq in seqs {
                    let accepted = t.record(seq);
                    prop_assert_eq!(accepted, seq >= max);
                    max = max.max(seq);
                    prop_assert_eq!(t.current(), Some(max));
                    prop_assert_eq!(reader.get(), Some(max));
                }
            }
        }
    }
}
