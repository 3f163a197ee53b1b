//! Fixed-size ring of receive slots
//!
//! `N` preallocated slots of `C` bytes. Slots are armed with the driver in
//! ring order, so the driver fills them in ring order too: the producer
//! only accepts a fill for the slot at the in-index, and the consumer drains
//! the slot at the out-index.
//!
//! `free_count` counts armed slots and is the only field both sides write.
//! The producer only decrements it for a slot it finds `Free`, so its
//! check-then-decrement can never underflow.
//!
//! A drained slot is `Released` until the driver takes it back. Released
//! slots are re-armed strictly from the arm-index onwards, which keeps the
//! driver's fill order equal to ring order even after a failed re-arm. A
//! slot is marked `Free` before it is handed to the driver, so a fill that
//! races the hand-off is never lost.

use core::cell::RefCell;
use core::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use heapless::Vec;

/// Lifecycle of a single slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    /// Armed with the driver, waiting for data
    Free,
    /// Holds received bytes not yet picked up by the consumer
    Filled,
    /// Picked up by the consumer, not yet released
    Draining,
    /// Drained, waiting to be armed with the driver again
    Released,
}

/// Outcome of recording a receive completion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillOutcome {
    /// Bytes recorded; the value is the stored length
    Recorded(usize),
    /// Every armed slot is already filled; the data was discarded
    Full,
    /// The reported slot is not the next one in arming order
    Rejected,
}

struct Slot<const C: usize> {
    data: [u8; C],
    len: usize,
    state: SlotState,
}

impl<const C: usize> Slot<C> {
    const fn new() -> Self {
        Self {
            data: [0; C],
            len: 0,
            state: SlotState::Free,
        }
    }
}

/// A slot handed to the consumer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilledSlot<const C: usize> {
    index: usize,
    data: Vec<u8, C>,
}

impl<const C: usize> FilledSlot<C> {
    /// Ring index of the slot
    pub fn index(&self) -> usize {
        self.index
    }

    /// Bytes received into the slot
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Ring of `N` receive slots of `C` bytes each
pub struct SlotRing<const N: usize, const C: usize> {
    slots: [Mutex<CriticalSectionRawMutex, RefCell<Slot<C>>>; N],
    in_index: AtomicUsize,
    out_index: AtomicUsize,
    arm_index: AtomicUsize,
    free: AtomicUsize,
    dropped: AtomicU32,
}

impl<const N: usize, const C: usize> SlotRing<N, C> {
    /// Create a ring with every slot free
    pub fn new() -> Self {
        assert!(N > 0, "receive ring needs at least one slot");

        Self {
            slots: core::array::from_fn(|_| Mutex::new(RefCell::new(Slot::new()))),
            in_index: AtomicUsize::new(0),
            out_index: AtomicUsize::new(0),
            arm_index: AtomicUsize::new(0),
            free: AtomicUsize::new(N),
            dropped: AtomicU32::new(0),
        }
    }

    /// Number of slots in the ring
    pub const fn slot_count(&self) -> usize {
        N
    }

    /// Capacity of each slot in bytes
    pub const fn slot_capacity(&self) -> usize {
        C
    }

    /// Number of slots currently armed with the driver
    pub fn free_count(&self) -> usize {
        self.free.load(Ordering::Acquire)
    }

    /// Whether the slot at the out-index holds data for the consumer
    pub fn has_filled(&self) -> bool {
        self.state_at(self.out_index()) == SlotState::Filled
    }

    /// Next slot the producer expects to fill
    pub fn in_index(&self) -> usize {
        self.in_index.load(Ordering::Acquire)
    }

    /// Next slot the consumer will drain
    pub fn out_index(&self) -> usize {
        self.out_index.load(Ordering::Acquire)
    }

    /// Receive completions discarded because every slot was filled
    pub fn dropped(&self) -> u32 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// State of slot `index`, if it exists
    pub fn slot_state(&self, index: usize) -> Option<SlotState> {
        self.slots.get(index).map(|_| self.state_at(index))
    }

    fn state_at(&self, index: usize) -> SlotState {
        self.slots[index].lock(|cell| cell.borrow().state)
    }

    /// Record a receive completion into slot `index` (producer side)
    ///
    /// Bytes beyond the slot capacity are discarded. When every slot is
    /// already filled the completion is dropped and nothing changes except
    /// the drop counter. A report for any slot but the in-index is
    /// rejected.
    pub fn mark_filled(&self, index: usize, data: &[u8]) -> FillOutcome {
        if self.free.load(Ordering::Acquire) == 0 {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return FillOutcome::Full;
        }

        let expected = self.in_index.load(Ordering::Relaxed);
        if index != expected {
            return FillOutcome::Rejected;
        }

        let len = data.len().min(C);
        let stored = self.slots[index].lock(|cell| {
            let mut slot = cell.borrow_mut();
            if slot.state != SlotState::Free {
                return false;
            }
            slot.data[..len].copy_from_slice(&data[..len]);
            slot.len = len;
            slot.state = SlotState::Filled;
            true
        });
        if !stored {
            return FillOutcome::Rejected;
        }

        self.in_index.store((index + 1) % N, Ordering::Release);

        // Publish only after the slot is written
        self.free.fetch_sub(1, Ordering::AcqRel);

        FillOutcome::Recorded(len)
    }

    /// Take the slot at the out-index if it holds data (consumer side)
    ///
    /// The slot stays `Draining` until [`release`](Self::release) is called,
    /// so it can never be handed out twice.
    pub fn try_drain(&self) -> Option<FilledSlot<C>> {
        let index = self.out_index.load(Ordering::Acquire);
        self.slots[index].lock(|cell| {
            let mut slot = cell.borrow_mut();
            if slot.state != SlotState::Filled {
                return None;
            }
            slot.state = SlotState::Draining;

            let mut data = Vec::new();
            // Cannot fail: len <= C
            let _ = data.extend_from_slice(&slot.data[..slot.len]);
            Some(FilledSlot { index, data })
        })
    }

    /// Hand a drained slot back to the ring (consumer side)
    ///
    /// Advances the out-index; the slot becomes `Released` until
    /// [`arm_next`](Self::arm_next) picks it up. Returns `false` (and changes
    /// nothing) if `index` is not the slot being drained.
    pub fn release(&self, index: usize) -> bool {
        if index != self.out_index.load(Ordering::Acquire) {
            return false;
        }

        let released = self.slots[index].lock(|cell| {
            let mut slot = cell.borrow_mut();
            if slot.state != SlotState::Draining {
                return false;
            }
            slot.len = 0;
            slot.state = SlotState::Released;
            true
        });
        if !released {
            return false;
        }

        self.out_index.store((index + 1) % N, Ordering::Release);
        true
    }

    /// Next released slot to arm with the driver, in ring order
    pub fn next_to_arm(&self) -> Option<usize> {
        let index = self.arm_index.load(Ordering::Acquire);
        (self.state_at(index) == SlotState::Released).then_some(index)
    }

    /// Mark the next released slot `Free` ahead of handing it to the driver
    /// (consumer side)
    ///
    /// Increments `free_count`. If the driver then refuses the slot, undo
    /// with [`cancel_arm`](Self::cancel_arm).
    pub fn arm_next(&self) -> Option<usize> {
        let index = self.next_to_arm()?;

        self.slots[index].lock(|cell| cell.borrow_mut().state = SlotState::Free);
        self.arm_index.store((index + 1) % N, Ordering::Release);
        self.free.fetch_add(1, Ordering::AcqRel);
        Some(index)
    }

    /// Undo [`arm_next`](Self::arm_next) for a slot the driver refused
    pub fn cancel_arm(&self, index: usize) -> bool {
        if index >= N || (index + 1) % N != self.arm_index.load(Ordering::Acquire) {
            return false;
        }

        let cancelled = self.slots[index].lock(|cell| {
            let mut slot = cell.borrow_mut();
            if slot.state != SlotState::Free {
                return false;
            }
            slot.state = SlotState::Released;
            true
        });
        if !cancelled {
            return false;
        }

        self.arm_index.store(index, Ordering::Release);
        self.free.fetch_sub(1, Ordering::AcqRel);
        true
    }

    /// Take slots `from..N` back from the driver before any of them filled
    ///
    /// Used when arming fails part-way through opening the port. The slots
    /// become `Released` and are armed again in ring order.
    pub fn disarm_from(&self, from: usize) {
        let mut first = None;
        for index in from..N {
            let disarmed = self.slots[index].lock(|cell| {
                let mut slot = cell.borrow_mut();
                if slot.state != SlotState::Free {
                    return false;
                }
                slot.state = SlotState::Released;
                true
            });
            if disarmed {
                first.get_or_insert(index);
                self.free.fetch_sub(1, Ordering::AcqRel);
            }
        }

        if let Some(index) = first {
            self.arm_index.store(index, Ordering::Release);
        }
    }
}

impl<const N: usize, const C: usize> Default for SlotRing<N, C> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Release a drained slot and re-arm it straight away
    fn recycle<const N: usize, const C: usize>(ring: &SlotRing<N, C>, index: usize) {
        assert!(ring.release(index));
        assert_eq!(ring.arm_next(), Some(index));
    }

    #[test]
    fn test_new_ring_is_free() {
        let ring: SlotRing<2, 128> = SlotRing::new();

        assert_eq!(ring.slot_count(), 2);
        assert_eq!(ring.slot_capacity(), 128);
        assert_eq!(ring.free_count(), 2);
        assert!(!ring.has_filled());
        assert!(ring.try_drain().is_none());
        assert!(ring.next_to_arm().is_none());
        assert_eq!(ring.slot_state(0), Some(SlotState::Free));
        assert_eq!(ring.slot_state(2), None);
    }

    #[test]
    fn test_free_count_tracks_fills() {
        let ring: SlotRing<4, 16> = SlotRing::new();

        for (m, index) in (0..4).enumerate() {
            assert_eq!(ring.mark_filled(index, &[index as u8]), FillOutcome::Recorded(1));
            assert_eq!(ring.free_count(), 4 - (m + 1));
        }
    }

    #[test]
    fn test_fill_when_full_changes_nothing() {
        let ring: SlotRing<2, 8> = SlotRing::new();
        ring.mark_filled(0, b"a");
        ring.mark_filled(1, b"b");
        let (in_before, out_before) = (ring.in_index(), ring.out_index());

        assert_eq!(ring.mark_filled(0, b"c"), FillOutcome::Full);

        assert_eq!(ring.free_count(), 0);
        assert_eq!(ring.in_index(), in_before);
        assert_eq!(ring.out_index(), out_before);
        assert_eq!(ring.dropped(), 1);
        assert_eq!(ring.try_drain().unwrap().data(), b"a");
    }

    #[test]
    fn test_oversized_receive_is_clamped() {
        let ring: SlotRing<2, 4> = SlotRing::new();

        assert_eq!(ring.mark_filled(0, &[1, 2, 3, 4, 5, 6]), FillOutcome::Recorded(4));
        assert_eq!(ring.try_drain().unwrap().data(), &[1, 2, 3, 4]);
    }

    #[test]
    fn test_bad_slot_is_rejected() {
        let ring: SlotRing<2, 8> = SlotRing::new();

        assert_eq!(ring.mark_filled(5, b"x"), FillOutcome::Rejected);
        ring.mark_filled(0, b"x");
        // Slot 0 is filled, slot 1 is next
        assert_eq!(ring.mark_filled(0, b"y"), FillOutcome::Rejected);
        assert_eq!(ring.free_count(), 1);
    }

    #[test]
    fn test_out_of_order_fill_is_rejected() {
        let ring: SlotRing<2, 8> = SlotRing::new();

        assert_eq!(ring.mark_filled(1, b"late"), FillOutcome::Rejected);

        // Nothing recorded, so nothing is waiting at the out-index
        assert_eq!(ring.free_count(), 2);
        assert_eq!(ring.in_index(), 0);
        assert!(!ring.has_filled());

        assert_eq!(ring.mark_filled(0, b"ok"), FillOutcome::Recorded(2));
        assert_eq!(ring.try_drain().unwrap().data(), b"ok");
    }

    #[test]
    fn test_drain_is_fifo_and_single_delivery() {
        let ring: SlotRing<2, 128> = SlotRing::new();
        ring.mark_filled(0, &[0xAA; 50]);
        ring.mark_filled(1, &[0xBB; 30]);

        let first = ring.try_drain().unwrap();
        assert_eq!((first.index(), first.len()), (0, 50));
        // Not released yet: the same slot is not handed out again
        assert!(ring.try_drain().is_none());

        recycle(&ring, first.index());
        assert_eq!(ring.free_count(), 1);

        let second = ring.try_drain().unwrap();
        assert_eq!((second.index(), second.len()), (1, 30));
    }

    #[test]
    fn test_release_requires_draining_slot() {
        let ring: SlotRing<2, 8> = SlotRing::new();
        ring.mark_filled(0, b"a");

        // Filled but not drained
        assert!(!ring.release(0));
        let slot = ring.try_drain().unwrap();
        // Wrong index
        assert!(!ring.release(1));
        assert!(ring.release(slot.index()));
        // Already released
        assert!(!ring.release(slot.index()));

        assert_eq!(ring.slot_state(0), Some(SlotState::Released));
        assert_eq!(ring.free_count(), 1);
        assert_eq!(ring.arm_next(), Some(0));
        assert_eq!(ring.free_count(), 2);
    }

    #[test]
    fn test_released_slots_are_armed_in_ring_order() {
        let ring: SlotRing<2, 8> = SlotRing::new();
        ring.mark_filled(0, b"a");
        ring.mark_filled(1, b"b");

        let first = ring.try_drain().unwrap();
        assert!(ring.release(first.index()));
        // Slot 0 stays unarmed while slot 1 is drained
        let second = ring.try_drain().unwrap();
        assert!(ring.release(second.index()));

        // Slot 0 goes back to the driver before slot 1
        assert_eq!(ring.next_to_arm(), Some(0));
        assert_eq!(ring.arm_next(), Some(0));
        assert_eq!(ring.arm_next(), Some(1));
        assert!(ring.arm_next().is_none());

        assert_eq!(ring.mark_filled(0, b"c"), FillOutcome::Recorded(1));
    }

    #[test]
    fn test_cancelled_arm_is_retried_first() {
        let ring: SlotRing<2, 8> = SlotRing::new();
        ring.mark_filled(0, b"a");
        let slot = ring.try_drain().unwrap();
        assert!(ring.release(slot.index()));

        assert_eq!(ring.arm_next(), Some(0));
        assert_eq!(ring.free_count(), 2);
        // Only the slot just armed can be cancelled
        assert!(!ring.cancel_arm(1));
        assert!(ring.cancel_arm(0));

        assert_eq!(ring.free_count(), 1);
        assert_eq!(ring.slot_state(0), Some(SlotState::Released));
        assert_eq!(ring.next_to_arm(), Some(0));
    }

    #[test]
    fn test_disarm_from_rearms_in_order() {
        let ring: SlotRing<3, 8> = SlotRing::new();

        ring.disarm_from(1);

        assert_eq!(ring.free_count(), 1);
        assert_eq!(ring.next_to_arm(), Some(1));
        assert_eq!(ring.arm_next(), Some(1));
        assert_eq!(ring.arm_next(), Some(2));
        assert_eq!(ring.free_count(), 3);

        for index in 0..3 {
            assert_eq!(ring.mark_filled(index, &[index as u8]), FillOutcome::Recorded(1));
        }
    }

    #[test]
    fn test_indices_wrap() {
        let ring: SlotRing<2, 8> = SlotRing::new();

        for round in 0..5u8 {
            let index = (round % 2) as usize;
            assert_eq!(ring.in_index(), index);
            ring.mark_filled(index, &[round]);
            let slot = ring.try_drain().unwrap();
            assert_eq!(slot.data(), &[round]);
            recycle(&ring, slot.index());
        }

        assert_eq!(ring.free_count(), 2);
    }

    #[test]
    fn test_single_slot_ring() {
        let ring: SlotRing<1, 8> = SlotRing::new();

        ring.mark_filled(0, b"one");
        assert_eq!(ring.mark_filled(0, b"two"), FillOutcome::Full);

        let slot = ring.try_drain().unwrap();
        assert_eq!(slot.data(), b"one");
        recycle(&ring, 0);

        ring.mark_filled(0, b"three");
        assert_eq!(ring.try_drain().unwrap().data(), b"three");
    }
}
