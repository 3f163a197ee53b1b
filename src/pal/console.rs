//! Console I/O core
//!
//! Binds a [`UartDriver`] to a ring of receive slots, a transmit tracker and
//! a wake signal.
//!
//! Input: driver → [`Console::on_receive`] → ring → [`Console::run`] →
//! [`LineProcessor`] → slot recycled to the driver.
//!
//! Output: [`Console::write`] → driver → [`Console::on_transmit`] → writer
//! released.
//!
//! The `on_*` callbacks are the interrupt-context half. They never block and
//! only touch atomics and the slot being filled.

use core::future::Future;
use core::sync::atomic::{AtomicBool, Ordering};

use embassy_futures::select::{select, Either};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::mutex::Mutex;
use embassy_sync::signal::Signal;

use crate::config::console::{
    BANNER, END_OF_LINE, EXIT_MESSAGE, RESET_MESSAGE, RX_BUFFER_COUNT, RX_BUFFER_SIZE,
};
use crate::pal::event::{EventMask, WakeSignal};
use crate::pal::ring::{FillOutcome, FilledSlot, SlotRing};
use crate::pal::tx::{Confirmation, TxTracker};
use crate::uart::{UartConfig, UartDriver, UartError};

/// Signal used to stop [`Console::run_until`]
pub type StopSignal = Signal<CriticalSectionRawMutex, ()>;

/// Console with the default slot count and size
pub type PalConsole<D> = Console<D, RX_BUFFER_COUNT, RX_BUFFER_SIZE>;

/// Consumer of received data
///
/// Called once per drained slot, in arrival order, on the consumer task.
/// The slot is recycled as soon as this returns, so anything worth keeping
/// must be copied. Processing delays every further receive; it must not
/// wait indefinitely.
pub trait LineProcessor {
    fn process(&mut self, data: &[u8]) -> impl Future<Output = ()>;
}

/// Double-buffered console over a UART driver
pub struct Console<D: UartDriver, const N: usize, const C: usize> {
    driver: D,
    ring: SlotRing<N, C>,
    tx: TxTracker,
    events: WakeSignal,
    output_enabled: AtomicBool,
    /// Serialises writers; never taken from interrupt context
    write_gate: Mutex<CriticalSectionRawMutex, ()>,
}

impl<D: UartDriver, const N: usize, const C: usize> Console<D, N, C> {
    /// Create a console around `driver`. Nothing is armed until [`open`](Self::open).
    pub fn new(driver: D) -> Self {
        Self {
            driver,
            ring: SlotRing::new(),
            tx: TxTracker::new(),
            events: WakeSignal::new(),
            output_enabled: AtomicBool::new(false),
            write_gate: Mutex::new(()),
        }
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn ring(&self) -> &SlotRing<N, C> {
        &self.ring
    }

    /// Number of receive slots currently armed with the driver
    pub fn free_slots(&self) -> usize {
        self.ring.free_count()
    }

    /// Receive completions discarded because every slot was full
    pub fn dropped_receives(&self) -> u32 {
        self.ring.dropped()
    }

    /// Bytes of the current write not yet confirmed by the driver
    pub fn outstanding_tx(&self) -> usize {
        self.tx.outstanding()
    }

    // --- Lifecycle ---

    /// Open the driver, enable output and arm every receive slot
    ///
    /// If the driver refuses a slot, that slot and the ones after it are
    /// armed later by the consumer loop, still in ring order.
    pub fn open(&self, config: &UartConfig) -> Result<(), UartError> {
        self.driver.open(config)?;
        self.output_enabled.store(true, Ordering::Release);

        for index in 0..N {
            if let Err(e) = self.submit_for_receive(index) {
                log::warn!("console: arming slot {} failed: {:?}", index, e);
                self.ring.disarm_from(index);
                break;
            }
        }

        log::debug!("console: open at {} baud, {} x {} byte slots", config.baud_rate, N, C);
        Ok(())
    }

    /// Disable output and close the driver
    pub fn close(&self) -> Result<(), UartError> {
        self.output_enabled.store(false, Ordering::Release);
        log::debug!("console: closing");
        self.driver.close()
    }

    /// Enable or disable the write gate
    ///
    /// While disabled, writes are accepted and silently discarded.
    pub fn set_output_enabled(&self, enabled: bool) {
        self.output_enabled.store(enabled, Ordering::Release);
    }

    pub fn is_output_enabled(&self) -> bool {
        self.output_enabled.load(Ordering::Acquire)
    }

    /// Print the start-up banner
    pub async fn print_banner(&self) -> Result<(), UartError> {
        self.write_line(BANNER).await
    }

    /// Announce the exit, then close the port
    pub async fn shutdown(&self) -> Result<(), UartError> {
        self.write_line(EXIT_MESSAGE).await?;
        self.close()
    }

    /// Announce a reset, close the port and hand over to `restart`
    ///
    /// `restart` is expected to reboot the board; the announcement and the
    /// close are best effort.
    pub async fn reset<R: FnOnce()>(&self, restart: R) {
        if let Err(e) = self.write_line(RESET_MESSAGE).await {
            log::warn!("console: reset announcement failed: {:?}", e);
        }
        if let Err(e) = self.close() {
            log::debug!("console: close before reset: {:?}", e);
        }
        restart();
    }

    // --- Interrupt-context callbacks ---

    /// Receive completion from the driver: `data` arrived in slot `index`
    pub fn on_receive(&self, index: usize, data: &[u8]) {
        match self.ring.mark_filled(index, data) {
            FillOutcome::Recorded(len) => {
                if len < data.len() {
                    log::warn!("console: slot {} clamped {} -> {} bytes", index, data.len(), len);
                }
                log::trace!("console: slot {} filled with {} bytes", index, len);
                self.events.set(EventMask::RECEIVE);
            }
            FillOutcome::Full => {
                log::warn!("console: all slots full, dropped {} bytes", data.len());
            }
            FillOutcome::Rejected => {
                log::warn!("console: ignored receive for slot {}", index);
            }
        }
    }

    /// Transmit completion from the driver: `count` more bytes went out
    pub fn on_transmit(&self, count: usize) {
        if self.tx.confirm(count) == Confirmation::Complete {
            self.events.set(EventMask::TRANSMIT);
        }
    }

    // --- Receive path ---

    /// Hand slot `index` to the driver to be filled
    pub fn submit_for_receive(&self, index: usize) -> Result<(), UartError> {
        if index >= N {
            return Err(UartError::InvalidSlot);
        }
        self.driver.receive(index, C)
    }

    /// Wait for the next filled slot, in ring order
    ///
    /// Re-checks the ring before every wait, so several fills that raised
    /// a single RECEIVE wake-up are all drained. Slots whose re-arm failed
    /// earlier are retried first.
    pub async fn drain_next(&self) -> FilledSlot<C> {
        loop {
            if let Err(e) = self.arm_released() {
                log::debug!("console: re-arm still refused: {:?}", e);
            }
            if let Some(slot) = self.ring.try_drain() {
                return slot;
            }
            self.events.wait(EventMask::RECEIVE).await;
        }
    }

    /// Return a drained slot to the ring and re-arm it with the driver
    ///
    /// If the driver refuses, the slot stays released and is re-armed by a
    /// later `recycle` or `drain_next`, before any slot after it.
    pub fn recycle(&self, index: usize) -> Result<(), UartError> {
        if !self.ring.release(index) {
            return Err(UartError::InvalidSlot);
        }
        self.arm_released()
    }

    /// Arm released slots with the driver in ring order, stopping at the
    /// first refusal
    fn arm_released(&self) -> Result<(), UartError> {
        while let Some(index) = self.ring.arm_next() {
            if let Err(e) = self.submit_for_receive(index) {
                self.ring.cancel_arm(index);
                return Err(e);
            }
        }
        Ok(())
    }

    /// Consumer loop: drain, process and recycle slots forever
    pub async fn run<P: LineProcessor>(&self, processor: &mut P) {
        loop {
            let slot = self.drain_next().await;
            self.dispatch(processor, slot).await;
        }
    }

    /// Consumer loop that returns once `stop` is signalled
    ///
    /// The stop is only observed while waiting for data: slots that are
    /// already filled are processed first.
    pub async fn run_until<P: LineProcessor>(&self, processor: &mut P, stop: &StopSignal) {
        loop {
            let slot = match select(self.drain_next(), stop.wait()).await {
                Either::First(slot) => slot,
                Either::Second(()) => {
                    log::debug!("console: consumer stopped");
                    return;
                }
            };
            self.dispatch(processor, slot).await;
        }
    }

    async fn dispatch<P: LineProcessor>(&self, processor: &mut P, slot: FilledSlot<C>) {
        processor.process(slot.data()).await;

        if let Err(e) = self.recycle(slot.index()) {
            log::warn!("console: re-arming slot {} failed: {:?}", slot.index(), e);
        }
    }

    // --- Transmit path ---

    /// Arm the transmit tracker and ask the driver to send `data`
    ///
    /// If the driver refuses, nothing stays armed and the write is dropped.
    pub fn begin_write(&self, data: &[u8]) -> Result<(), UartError> {
        self.tx.arm(data.len());

        if let Err(e) = self.driver.transmit(data) {
            self.tx.disarm();
            log::warn!("console: transmit of {} bytes refused: {:?}", data.len(), e);
            return Err(e);
        }
        Ok(())
    }

    /// Wait until the driver has confirmed every byte of the current write
    pub async fn wait_for_completion(&self) {
        self.events.wait(EventMask::TRANSMIT).await;
    }

    /// Write `data` and return once all of it has been sent
    ///
    /// Empty writes and writes while output is disabled return `Ok(())`
    /// without touching the driver.
    pub async fn write(&self, data: &[u8]) -> Result<(), UartError> {
        if data.is_empty() || !self.is_output_enabled() {
            return Ok(());
        }

        let _gate = self.write_gate.lock().await;
        self.transfer(data).await
    }

    pub async fn write_str(&self, s: &str) -> Result<(), UartError> {
        self.write(s.as_bytes()).await
    }

    /// Write `s` followed by the end-of-line sequence
    pub async fn write_line(&self, s: &str) -> Result<(), UartError> {
        self.write_line_prefixed("", s).await
    }

    /// Write `prefix`, `s` and the end-of-line sequence without another
    /// writer getting in between
    pub async fn write_line_prefixed(&self, prefix: &str, s: &str) -> Result<(), UartError> {
        if !self.is_output_enabled() {
            return Ok(());
        }

        let _gate = self.write_gate.lock().await;
        self.transfer(prefix.as_bytes()).await?;
        self.transfer(s.as_bytes()).await?;
        self.transfer(END_OF_LINE.as_bytes()).await
    }

    async fn transfer(&self, data: &[u8]) -> Result<(), UartError> {
        if data.is_empty() || !self.is_output_enabled() {
            return Ok(());
        }

        self.begin_write(data)?;
        self.wait_for_completion().await;
        Ok(())
    }
}
