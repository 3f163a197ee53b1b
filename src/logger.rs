//! Buffered `log` sink.
//!
//! Formats log records into a fixed-size buffer that an output task drains.
//! Logging never blocks, so it is safe from the UART callbacks; a message is
//! truncated if it is too long and overwritten if the output task has not
//! caught up.

use core::cell::RefCell;
use core::fmt::Write;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::signal::Signal;
use heapless::String;
use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};

use crate::config::logging::MAX_LOG_MSG_LEN;

/// Latest pending log message plus a signal for the output task
pub struct LogBuffer {
    message: Mutex<CriticalSectionRawMutex, RefCell<String<MAX_LOG_MSG_LEN>>>,
    ready: Signal<CriticalSectionRawMutex, ()>,
}

impl LogBuffer {
    pub const fn new() -> Self {
        Self {
            message: Mutex::new(RefCell::new(String::new())),
            ready: Signal::new(),
        }
    }

    /// Replace the pending message with a formatted one.
    pub fn write_fmt_message(&self, args: core::fmt::Arguments) {
        self.message.lock(|cell| {
            let mut buffer = cell.borrow_mut();
            // We only keep the latest
            buffer.clear();
            let _ = Truncating(&mut *buffer).write_fmt(args);
        });
        self.ready.signal(());
    }

    /// Take the pending message, if any.
    pub fn take_message(&self) -> Option<String<MAX_LOG_MSG_LEN>> {
        self.message.lock(|cell| {
            let mut buffer = cell.borrow_mut();
            if buffer.is_empty() {
                None
            } else {
                Some(core::mem::take(&mut *buffer))
            }
        })
    }

    /// Wait for a message and take it.
    pub async fn next_message(&self) -> String<MAX_LOG_MSG_LEN> {
        loop {
            self.ready.wait().await;
            if let Some(msg) = self.take_message() {
                return msg;
            }
        }
    }
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl Log for LogBuffer {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            self.write_fmt_message(format_args!("[{}] {}", record.level(), record.args()));
        }
    }

    fn flush(&self) {}
}

/// Writer that drops whatever does not fit instead of failing.
struct Truncating<'a>(&'a mut String<MAX_LOG_MSG_LEN>);

impl Write for Truncating<'_> {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        for c in s.chars() {
            if self.0.push(c).is_err() {
                break;
            }
        }
        Ok(())
    }
}

/// Buffer behind the global logger.
pub static LOGGER: LogBuffer = LogBuffer::new();

/// Install [`LOGGER`] as the global logger.
///
/// Must be called once during startup.
pub fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
    log::set_logger(&LOGGER).map(|()| log::set_max_level(level))
}
