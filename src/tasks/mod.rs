//! Embassy tasks module
//!
//! Contains the async tasks for the firmware, organised by functionality.

pub mod console;
pub mod logging;
pub mod uart;

pub use console::console_task;
pub use logging::log_task;
pub use uart::{uart_rx_pump, uart_tx_pump};
