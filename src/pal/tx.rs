//! Transmit completion tracker
//!
//! Counts the bytes of the in-flight write that the driver has not yet
//! confirmed. The writer arms it, the transmit completion handler counts it
//! down, and the handler learns exactly once that the write is complete.

use core::sync::atomic::{AtomicUsize, Ordering};

/// Result of applying a transmit confirmation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    /// No write in flight; the confirmation was ignored
    Idle,
    /// Bytes are still outstanding
    Pending(usize),
    /// The write just completed
    Complete,
}

/// Outstanding-bytes counter for the current write
pub struct TxTracker {
    outstanding: AtomicUsize,
}

impl TxTracker {
    pub const fn new() -> Self {
        Self {
            outstanding: AtomicUsize::new(0),
        }
    }

    /// Bytes not yet confirmed
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::Acquire)
    }

    /// Whether a write is waiting for confirmations
    pub fn is_busy(&self) -> bool {
        self.outstanding() != 0
    }

    /// Start tracking a write of `len` bytes
    pub fn arm(&self, len: usize) {
        self.outstanding.store(len, Ordering::Release);
    }

    /// Abandon the current write (the driver refused it)
    pub fn disarm(&self) {
        self.outstanding.store(0, Ordering::Release);
    }

    /// Apply a confirmation of `count` bytes (interrupt context)
    ///
    /// Confirmations while idle are ignored. A confirmation larger than
    /// what is outstanding completes the write.
    pub fn confirm(&self, count: usize) -> Confirmation {
        let previous = self
            .outstanding
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                if current == 0 {
                    None
                } else {
                    Some(current.saturating_sub(count))
                }
            });

        match previous {
            Err(_) => Confirmation::Idle,
            Ok(current) if current <= count => {
                if current < count {
                    log::warn!("tx: confirmed {} bytes with only {} outstanding", count, current);
                }
                Confirmation::Complete
            }
            Ok(current) => Confirmation::Pending(current - count),
        }
    }
}

impl Default for TxTracker {
    fn default() -> Self {
        Self::new()
    }
}
