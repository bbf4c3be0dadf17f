/*
[INPUT]:  Wall clock (nanoseconds since epoch)
[OUTPUT]: Strictly increasing per-source nonces ("tonce")
[POS]:    Auth layer - replay protection for signed requests
[UPDATE]: When the server's nonce window or resolution changes
*/

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;

/// Hands out nanosecond timestamps that never repeat or go backwards.
///
/// Share one source per credential; the server rejects stale nonces.
#[derive(Debug, Default)]
pub struct NonceSource {
    last: AtomicU64,
}

impl NonceSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next nonce: the current clock, or previous + 1 if the clock stalled.
    pub fn next(&self) -> u64 {
        let now = now_nanos();
        let mut prev = self.last.load(Ordering::Relaxed);
        loop {
            let candidate = now.max(prev.saturating_add(1));
            match self
                .last
                .compare_exchange_weak(prev, candidate, Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(_) => return candidate,
                Err(actual) => prev = actual,
            }
        }
    }

    /// Record a caller-supplied nonce so later generated ones stay above it.
    pub fn observe(&self, nonce: u64) {
        self.last.fetch_max(nonce, Ordering::AcqRel);
    }
}

fn now_nanos() -> u64 {
    Utc::now()
        .timestamp_nanos_opt()
        .and_then(|nanos| u64::try_from(nanos).ok())
        .unwrap_or_default()
}
