//! UART driver trait for abstraction and testability
//!
//! The console core never touches hardware directly. It arms receive slots
//! and starts transmissions through this trait; the driver reports
//! completions back by calling `Console::on_receive` and
//! `Console::on_transmit` from its interrupt (or pump task) context.

use crate::config::uart_defaults;

/// Errors reported by a UART driver when it rejects a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UartError {
    /// Port has not been opened (or was closed)
    NotOpen,
    /// Port is already open
    AlreadyOpen,
    /// Driver cannot accept another request right now
    Busy,
    /// Request larger than the driver can stage
    Overflow,
    /// Configuration option not supported by this driver
    Unsupported,
    /// Slot index outside the receive ring
    InvalidSlot,
    /// Low-level hardware failure
    Hardware,
}

/// Parity mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parity {
    None,
    Odd,
    Even,
}

/// Number of stop bits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopBits {
    One,
    OneAndHalf,
    Two,
}

/// Line configuration applied when the port is opened
///
/// Fixed for the lifetime of the open port; it is never renegotiated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UartConfig {
    pub baud_rate: u32,
    pub parity: Parity,
    pub stop_bits: StopBits,
    /// Bits per character (5-8)
    pub data_bits: u8,
    pub loopback: bool,
    pub flow_control: bool,
}

impl Default for UartConfig {
    fn default() -> Self {
        Self {
            baud_rate: uart_defaults::BAUD_RATE,
            parity: Parity::None,
            stop_bits: StopBits::One,
            data_bits: uart_defaults::DATA_BITS,
            loopback: uart_defaults::LOOPBACK,
            flow_control: uart_defaults::FLOW_CONTROL,
        }
    }
}

/// Abstract UART driver
///
/// Every method only *initiates* an operation and returns immediately.
/// Methods take `&self` because the same driver is used concurrently by
/// the consumer loop (re-arming slots) and by writers (transmitting).
pub trait UartDriver {
    /// Open the port with the given line configuration
    fn open(&self, config: &UartConfig) -> Result<(), UartError>;

    /// Close the port
    fn close(&self) -> Result<(), UartError>;

    /// Start transmitting `data`
    ///
    /// The driver must report progress through `Console::on_transmit`,
    /// possibly across several partial completions.
    fn transmit(&self, data: &[u8]) -> Result<(), UartError>;

    /// Arm receive slot `slot` (of `capacity` bytes) for the next incoming data
    ///
    /// The driver reports the arrival through `Console::on_receive(slot, ..)`.
    fn receive(&self, slot: usize, capacity: usize) -> Result<(), UartError>;
}

impl<T: UartDriver + ?Sized> UartDriver for &T {
    fn open(&self, config: &UartConfig) -> Result<(), UartError> {
        (**self).open(config)
    }

    fn close(&self) -> Result<(), UartError> {
        (**self).close()
    }

    fn transmit(&self, data: &[u8]) -> Result<(), UartError> {
        (**self).transmit(data)
    }

    fn receive(&self, slot: usize, capacity: usize) -> Result<(), UartError> {
        (**self).receive(slot, capacity)
    }
}
