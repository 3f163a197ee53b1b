//! `UartDriver` binding for the ESP32-S3 UART.
//!
//! The hardware itself is driven by the pump tasks in `tasks::uart`. This
//! type is the hand-off point between them and the console: `receive` queues
//! a slot for the receive pump, `transmit` stages bytes for the transmit
//! pump. Both return immediately.

use core::cell::RefCell;
use core::sync::atomic::{AtomicBool, Ordering};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::channel::Channel;
use embassy_sync::signal::Signal;
use esp_hal::uart::{Config, DataBits, Parity as EspParity, StopBits as EspStopBits};
use heapless::Vec;

use super::{Parity, StopBits, UartConfig, UartDriver, UartError};
use crate::config::console::RX_BUFFER_COUNT;
use crate::config::transmit::TX_BUFFER_SIZE;

/// Channel-backed UART driver shared by the console and the pump tasks
pub struct EspUart {
    open: AtomicBool,
    /// Slots armed by the console, in the order they must be filled
    armed: Channel<CriticalSectionRawMutex, usize, RX_BUFFER_COUNT>,
    /// Bytes waiting for the transmit pump
    staged: Mutex<CriticalSectionRawMutex, RefCell<Vec<u8, TX_BUFFER_SIZE>>>,
    staged_ready: Signal<CriticalSectionRawMutex, ()>,
}

impl EspUart {
    pub const fn new() -> Self {
        Self {
            open: AtomicBool::new(false),
            armed: Channel::new(),
            staged: Mutex::new(RefCell::new(Vec::new())),
            staged_ready: Signal::new(),
        }
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    /// Wait for the next slot the console armed
    pub async fn next_armed_slot(&self) -> usize {
        self.armed.receive().await
    }

    /// Wait for the next staged transmission and take it
    pub async fn next_transmission(&self) -> Vec<u8, TX_BUFFER_SIZE> {
        loop {
            self.staged_ready.wait().await;
            let staged = self
                .staged
                .lock(|cell| core::mem::take(&mut *cell.borrow_mut()));
            if !staged.is_empty() {
                return staged;
            }
        }
    }
}

impl Default for EspUart {
    fn default() -> Self {
        Self::new()
    }
}

impl UartDriver for EspUart {
    fn open(&self, config: &UartConfig) -> Result<(), UartError> {
        // The hardware is configured from the same record in main; this only
        // rejects what the binding cannot do.
        esp_config(config)?;

        if self.open.swap(true, Ordering::AcqRel) {
            return Err(UartError::AlreadyOpen);
        }
        Ok(())
    }

    fn close(&self) -> Result<(), UartError> {
        if !self.open.swap(false, Ordering::AcqRel) {
            return Err(UartError::NotOpen);
        }
        self.armed.clear();
        Ok(())
    }

    fn transmit(&self, data: &[u8]) -> Result<(), UartError> {
        if !self.is_open() {
            return Err(UartError::NotOpen);
        }

        self.staged.lock(|cell| {
            let mut staged = cell.borrow_mut();
            if !staged.is_empty() {
                return Err(UartError::Busy);
            }
            staged
                .extend_from_slice(data)
                .map_err(|_| UartError::Overflow)
        })?;

        self.staged_ready.signal(());
        Ok(())
    }

    fn receive(&self, slot: usize, _capacity: usize) -> Result<(), UartError> {
        if !self.is_open() {
            return Err(UartError::NotOpen);
        }
        self.armed.try_send(slot).map_err(|_| UartError::Busy)
    }
}

/// Translate a `UartConfig` into esp-hal's UART configuration
pub fn esp_config(config: &UartConfig) -> Result<Config, UartError> {
    if config.loopback || config.flow_control {
        return Err(UartError::Unsupported);
    }

    let data_bits = match config.data_bits {
        5 => DataBits::_5,
        6 => DataBits::_6,
        7 => DataBits::_7,
        8 => DataBits::_8,
        _ => return Err(UartError::Unsupported),
    };
    let parity = match config.parity {
        Parity::None => EspParity::None,
        Parity::Odd => EspParity::Odd,
        Parity::Even => EspParity::Even,
    };
    let stop_bits = match config.stop_bits {
        StopBits::One => EspStopBits::_1,
        StopBits::OneAndHalf => EspStopBits::_1p5,
        StopBits::Two => EspStopBits::_2,
    };

    Ok(Config::default()
        .with_baudrate(config.baud_rate)
        .with_data_bits(data_bits)
        .with_parity(parity)
        .with_stop_bits(stop_bits))
}
