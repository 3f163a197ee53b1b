//! Device communication client.

use std::io::{Read, Write};
use std::time::{Duration, Instant};

use anyhow::Result;
use serialport::SerialPort;

/// Prefix the firmware writes before each echoed line.
pub const ECHO_PREFIX: &str = "> ";

/// Resolve a port argument - returns the port path if not "auto", otherwise
/// picks the first USB serial adapter.
pub fn resolve_port(port_arg: &str) -> Result<String> {
    if port_arg != "auto" {
        return Ok(port_arg.to_string());
    }

    let ports = serialport::available_ports()?;
    ports
        .into_iter()
        .map(|p| p.port_name)
        .find(|name| name.contains("ttyUSB") || name.contains("ttyACM"))
        .ok_or_else(|| anyhow::anyhow!("No serial port found - ensure device is connected"))
}

/// Client for talking to the console firmware over its UART.
pub struct DeviceClient {
    port: Box<dyn SerialPort>,
    timeout: Duration,
    pending: Vec<u8>,
}

impl DeviceClient {
    /// Create a new device client.
    pub fn new(port_name: &str, baud_rate: u32) -> Result<Self> {
        let port = serialport::new(port_name, baud_rate)
            .timeout(Duration::from_millis(100))
            .open()?;

        Ok(Self {
            port,
            timeout: Duration::from_secs(2),
            pending: Vec::new(),
        })
    }

    /// Clear any pending data in the serial buffer.
    pub fn clear_buffer(&mut self) -> Result<()> {
        self.port.clear(serialport::ClearBuffer::All)?;
        self.pending.clear();
        Ok(())
    }

    /// Send raw bytes.
    pub fn send(&mut self, data: &[u8]) -> Result<()> {
        self.port.write_all(data)?;
        self.port.flush()?;
        Ok(())
    }

    /// Send a line terminated with CRLF.
    pub fn send_line(&mut self, line: &str) -> Result<()> {
        self.send(format!("{}\r\n", line).as_bytes())
    }

    /// Read one CRLF-terminated line (without the terminator).
    pub fn read_line(&mut self) -> Result<String> {
        let start = Instant::now();
        let mut buf = [0u8; 256];

        loop {
            if let Some(end) = self.pending.windows(2).position(|w| w == b"\r\n") {
                let line: Vec<u8> = self.pending.drain(..end + 2).take(end).collect();
                return Ok(String::from_utf8_lossy(&line).into_owned());
            }

            if start.elapsed() >= self.timeout {
                anyhow::bail!(
                    "Timeout waiting for line, got {} bytes: {:?}",
                    self.pending.len(),
                    String::from_utf8_lossy(&self.pending)
                );
            }

            match self.port.read(&mut buf) {
                Ok(n) => self.pending.extend_from_slice(&buf[..n]),
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Read one line and check it is the echo of `expected`.
    pub fn expect_echo(&mut self, expected: &str) -> Result<()> {
        let line = self.read_line()?;
        let wanted = format!("{}{}", ECHO_PREFIX, expected);
        if line != wanted {
            anyhow::bail!("Expected {:?}, got {:?}", wanted, line);
        }
        Ok(())
    }

    /// Check that nothing arrives within `quiet`.
    pub fn expect_silence(&mut self, quiet: Duration) -> Result<()> {
        let old_timeout = self.timeout;
        self.timeout = quiet;
        let result = self.read_line();
        self.timeout = old_timeout;

        match result {
            Ok(line) => anyhow::bail!("Expected no output, got {:?}", line),
            Err(_) => Ok(()),
        }
    }
}
