//! Log output task.
//!
//! Drains the buffered logger to the USB-JTAG serial port so diagnostics
//! never share the console UART.

use crate::logger::LOGGER;

pub async fn log_task() {
    loop {
        let msg = LOGGER.next_message().await;
        esp_println::println!("{}", msg);
    }
}
