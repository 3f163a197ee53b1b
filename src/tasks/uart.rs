//! UART pump tasks.
//!
//! These play the part of the UART interrupt handlers: they move bytes
//! between the hardware and the console and report completions through
//! `Console::on_receive` / `Console::on_transmit`. Generic over
//! `embedded_io_async` so they work with any async serial half.

use embassy_time::{Duration, Timer};
use embedded_io_async::{Read, Write};

use crate::config::transmit::TX_CHUNK_SIZE;
use crate::pal::Console;
use crate::uart::esp::EspUart;

/// Receive pump: fills each armed slot with the next bytes read.
pub async fn uart_rx_pump<R: Read, const N: usize, const C: usize>(
    mut reader: R,
    uart: &'static EspUart,
    console: &'static Console<&'static EspUart, N, C>,
) {
    let mut buf = [0u8; C];

    loop {
        let slot = uart.next_armed_slot().await;

        loop {
            match reader.read(&mut buf).await {
                Ok(0) => continue,
                Ok(n) => {
                    console.on_receive(slot, &buf[..n]);
                    break;
                }
                Err(e) => {
                    // UART error, back off and retry into the same slot
                    log::warn!("uart: read error {:?}", e);
                    Timer::after(Duration::from_millis(10)).await;
                }
            }
        }
    }
}

/// Transmit pump: writes staged bytes in chunks, confirming each chunk.
///
/// On a write error the unsent remainder is confirmed as well, so the
/// writer waiting in the console is never left hanging.
pub async fn uart_tx_pump<W: Write, const N: usize, const C: usize>(
    mut writer: W,
    uart: &'static EspUart,
    console: &'static Console<&'static EspUart, N, C>,
) {
    loop {
        let pending = uart.next_transmission().await;
        let mut remaining = pending.len();

        for chunk in pending.chunks(TX_CHUNK_SIZE) {
            let sent = match writer.write_all(chunk).await {
                Ok(()) => writer.flush().await,
                Err(e) => Err(e),
            };
            if let Err(e) = sent {
                log::warn!("uart: write error {:?}, dropping {} bytes", e, remaining);
                break;
            }

            remaining -= chunk.len();
            console.on_transmit(chunk.len());
        }

        if remaining > 0 {
            console.on_transmit(remaining);
        }
    }
}
