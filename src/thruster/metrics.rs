// Bus counters
//
// Updated by the polling thread, readable from anywhere without locking.
// Malformed replies and timeouts are never fatal; they only show up here and
// in the log.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use super::error::ProtocolError;

#[derive(Debug, Default)]
pub struct BusMetrics {
    /// Completed polling rounds
    pub rounds: AtomicU64,
    /// Frames written to the transport
    pub frames_sent: AtomicU64,
    /// Replies parsed and applied to the store
    pub replies_applied: AtomicU64,
    /// Reads that returned no bytes
    pub timeouts: AtomicU64,
    pub checksum_errors: AtomicU64,
    pub size_errors: AtomicU64,
    pub truncated_commands: AtomicU64,
    /// Replies from ids outside the store
    pub unknown_ids: AtomicU64,
    /// Write/flush/read failures
    pub transport_errors: AtomicU64,
}

impl BusMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_protocol_error(&self, err: &ProtocolError) {
        let counter = match err {
            ProtocolError::ChecksumMismatch { .. } => &self.checksum_errors,
            ProtocolError::SizeMismatch { .. } | ProtocolError::PayloadTooLarge { .. } => {
                &self.size_errors
            }
            ProtocolError::TruncatedCommand { .. } => &self.truncated_commands,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            rounds: self.rounds.load(Ordering::Relaxed),
            frames_sent: self.frames_sent.load(Ordering::Relaxed),
            replies_applied: self.replies_applied.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            checksum_errors: self.checksum_errors.load(Ordering::Relaxed),
            size_errors: self.size_errors.load(Ordering::Relaxed),
            truncated_commands: self.truncated_commands.load(Ordering::Relaxed),
            unknown_ids: self.unknown_ids.load(Ordering::Relaxed),
            transport_errors: self.transport_errors.load(Ordering::Relaxed),
        }
    }
}

/// Plain copy of the counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub rounds: u64,
    pub frames_sent: u64,
    pub replies_applied: u64,
    pub timeouts: u64,
    pub checksum_errors: u64,
    pub size_errors: u64,
    pub truncated_commands: u64,
    pub unknown_ids: u64,
    pub transport_errors: u64,
}

impl MetricsSnapshot {
    /// Replies discarded for any decode reason
    pub fn discarded_replies(&self) -> u64 {
        self.checksum_errors + self.size_errors + self.truncated_commands
    }
}
