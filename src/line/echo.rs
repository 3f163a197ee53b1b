//! Line echo processor
//!
//! Demo [`LineProcessor`]: assembles received bytes into lines and writes
//! each completed line back through the console's write gate.

use crate::line::accumulator::LineAccumulator;
use crate::pal::{Console, LineProcessor};
use crate::uart::UartDriver;

/// Prefix written before each echoed line
pub const ECHO_PREFIX: &str = "> ";

pub struct LineEcho<'a, D: UartDriver, const N: usize, const C: usize> {
    console: &'a Console<D, N, C>,
    lines: LineAccumulator,
    echoed: u32,
}

impl<'a, D: UartDriver, const N: usize, const C: usize> LineEcho<'a, D, N, C> {
    pub fn new(console: &'a Console<D, N, C>) -> Self {
        Self {
            console,
            lines: LineAccumulator::new(),
            echoed: 0,
        }
    }

    /// Number of lines echoed so far
    pub fn echoed(&self) -> u32 {
        self.echoed
    }

    async fn echo(&self, line: &[u8]) {
        let text = match core::str::from_utf8(line) {
            Ok(text) => text,
            Err(_) => {
                log::debug!("echo: {} byte line is not UTF-8", line.len());
                "<binary>"
            }
        };

        if let Err(e) = self.console.write_line_prefixed(ECHO_PREFIX, text).await {
            log::warn!("echo: write failed: {:?}", e);
        }
    }
}

impl<D: UartDriver, const N: usize, const C: usize> LineProcessor for LineEcho<'_, D, N, C> {
    async fn process(&mut self, data: &[u8]) {
        for &byte in data {
            if let Some(line) = self.lines.push(byte) {
                self.echo(&line).await;
                self.echoed = self.echoed.wrapping_add(1);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pal::console::test_support::auto_confirm;
    use crate::uart::traits::mock::MockUart;
    use crate::uart::UartConfig;
    use core::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn test_echoes_complete_lines() {
        let uart = MockUart::new();
        let console: Console<&MockUart, 2, 128> = Console::new(&uart);
        console.open(&UartConfig::default()).unwrap();
        let done = AtomicBool::new(false);
        let mut echo = LineEcho::new(&console);

        std::thread::scope(|s| {
            s.spawn(|| auto_confirm(&uart, &console, &done));

            futures::executor::block_on(async {
                echo.process(b"hel").await;
                assert_eq!(echo.echoed(), 0);
                echo.process(b"lo\r\nworld\r\n").await;
            });
            done.store(true, Ordering::Release);
        });

        assert_eq!(echo.echoed(), 2);
        assert_eq!(
            uart.transmitted(),
            vec![
                b"> ".to_vec(),
                b"hello".to_vec(),
                b"\r\n".to_vec(),
                b"> ".to_vec(),
                b"world".to_vec(),
                b"\r\n".to_vec(),
            ]
        );
    }

    #[test]
    fn test_binary_line_is_replaced() {
        let uart = MockUart::new();
        let console: Console<&MockUart, 2, 128> = Console::new(&uart);
        console.open(&UartConfig::default()).unwrap();
        let done = AtomicBool::new(false);
        let mut echo = LineEcho::new(&console);

        std::thread::scope(|s| {
            s.spawn(|| auto_confirm(&uart, &console, &done));

            futures::executor::block_on(echo.process(&[0xFF, 0xFE, b'\n']));
            done.store(true, Ordering::Release);
        });

        assert_eq!(uart.transmitted()[1], b"<binary>".to_vec());
    }
}
