//! Console consumer task.

use crate::pal::{Console, LineProcessor};
use crate::uart::UartDriver;

/// Runs the consumer loop for the lifetime of the firmware.
pub async fn console_task<D, P, const N: usize, const C: usize>(
    console: &'static Console<D, N, C>,
    mut processor: P,
) where
    D: UartDriver + 'static,
    P: LineProcessor,
{
    log::info!("console: consumer running");
    console.run(&mut processor).await;
}
