//! Wake signal with independent event bits
//!
//! One event object shared by the interrupt-side producers and the task-side
//! waiters. The bits live in a single atomic word; each bit has its own
//! waker, so setting one bit never wakes a waiter on another.

use core::future::poll_fn;
use core::sync::atomic::{AtomicU32, Ordering};
use core::task::Poll;

use embassy_sync::waitqueue::AtomicWaker;

use crate::config::events;

/// Set of event bits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventMask(u32);

impl EventMask {
    pub const RECEIVE: Self = Self(events::RECEIVE);
    pub const TRANSMIT: Self = Self(events::TRANSMIT);

    /// Mask with only bit `index` set
    const fn bit(index: usize) -> Self {
        Self(1 << index)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

/// Rendezvous object carrying the RECEIVE and TRANSMIT bits
pub struct WakeSignal {
    bits: AtomicU32,
    wakers: [AtomicWaker; events::COUNT],
}

impl WakeSignal {
    /// Create a wake signal with every bit clear
    pub const fn new() -> Self {
        Self {
            bits: AtomicU32::new(0),
            wakers: [AtomicWaker::new(), AtomicWaker::new()],
        }
    }

    /// Set every bit in `mask`
    ///
    /// Never blocks; safe to call from interrupt context.
    pub fn set(&self, mask: EventMask) {
        self.bits.fetch_or(mask.bits(), Ordering::AcqRel);
        for (index, waker) in self.wakers.iter().enumerate() {
            if mask.contains(EventMask::bit(index)) {
                waker.wake();
            }
        }
    }

    /// Whether any bit in `mask` is currently set
    pub fn is_set(&self, mask: EventMask) -> bool {
        self.bits.load(Ordering::Acquire) & mask.bits() != 0
    }

    /// Wait until any bit in `mask` is set
    ///
    /// Returns the bits that fired; those bits are cleared.
    pub async fn wait(&self, mask: EventMask) -> EventMask {
        poll_fn(|cx| {
            // Register first so a `set` between the check and the return
            // still wakes this task
            for (index, waker) in self.wakers.iter().enumerate() {
                if mask.contains(EventMask::bit(index)) {
                    waker.register(cx.waker());
                }
            }

            let fired = self.bits.fetch_and(!mask.bits(), Ordering::AcqRel) & mask.bits();
            if fired == 0 {
                Poll::Pending
            } else {
                Poll::Ready(EventMask(fired))
            }
        })
        .await
    }
}

impl Default for WakeSignal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_bits_match_config() {
        assert_eq!(EventMask::RECEIVE.bits(), 0x1);
        assert_eq!(EventMask::TRANSMIT.bits(), 0x2);
        assert_eq!(EventMask::bit(0), EventMask::RECEIVE);
        assert_eq!(EventMask::bit(1), EventMask::TRANSMIT);
    }

    #[test]
    fn test_wait_consumes_bit() {
        let signal = WakeSignal::new();
        signal.set(EventMask::RECEIVE);
        assert!(signal.is_set(EventMask::RECEIVE));

        let fired = futures::executor::block_on(signal.wait(EventMask::RECEIVE));

        assert_eq!(fired, EventMask::RECEIVE);
        assert!(!signal.is_set(EventMask::RECEIVE));
    }

    #[test]
    fn test_bits_are_independent() {
        let signal = WakeSignal::new();
        signal.set(EventMask::TRANSMIT);

        assert!(!signal.is_set(EventMask::RECEIVE));

        signal.set(EventMask::RECEIVE);
        let fired = futures::executor::block_on(signal.wait(EventMask::RECEIVE));

        assert_eq!(fired, EventMask::RECEIVE);
        // TRANSMIT is left for its own waiter
        assert!(signal.is_set(EventMask::TRANSMIT));
    }

    #[test]
    fn test_repeated_sets_coalesce() {
        let signal = WakeSignal::new();
        signal.set(EventMask::RECEIVE);
        signal.set(EventMask::RECEIVE);

        futures::executor::block_on(signal.wait(EventMask::RECEIVE));

        assert!(!signal.is_set(EventMask::RECEIVE));
    }

    #[test]
    fn test_wait_any_clears_all_fired_bits() {
        let signal = WakeSignal::new();
        let both = EventMask::RECEIVE.union(EventMask::TRANSMIT);
        signal.set(both);

        let fired = futures::executor::block_on(signal.wait(both));

        assert_eq!(fired, both);
        assert!(!signal.is_set(both));
    }

    #[test]
    fn test_wait_wakes_from_other_thread() {
        let signal = WakeSignal::new();

        std::thread::scope(|s| {
            s.spawn(|| {
                std::thread::sleep(std::time::Duration::from_millis(20));
                signal.set(EventMask::TRANSMIT);
            });

            let fired = futures::executor::block_on(signal.wait(EventMask::TRANSMIT));
            assert_eq!(fired, EventMask::TRANSMIT);
        });
    }

    #[test]
    fn test_other_bit_does_not_release_waiter() {
        let signal = WakeSignal::new();

        std::thread::scope(|s| {
            s.spawn(|| {
                signal.set(EventMask::TRANSMIT);
                std::thread::sleep(std::time::Duration::from_millis(20));
                signal.set(EventMask::RECEIVE);
            });

            let fired = futures::executor::block_on(signal.wait(EventMask::RECEIVE));
            assert_eq!(fired, EventMask::RECEIVE);
        });

        // The TRANSMIT bit was never consumed by the RECEIVE waiter
        assert!(signal.is_set(EventMask::TRANSMIT));
    }
}
