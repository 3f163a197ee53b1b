//! Hardware and console configuration constants for the ESP32-S3 console

/// Console receive ring and line handling
pub mod console {
    /// Size of each receive slot in bytes
    pub const RX_BUFFER_SIZE: usize = 128;

    /// Number of receive slots handed to the UART driver
    pub const RX_BUFFER_COUNT: usize = 2;

    /// Line terminator written after each console line
    pub const END_OF_LINE: &str = "\r\n";

    /// Longest line the line accumulator will assemble
    pub const MAX_LINE_LEN: usize = 256;

    /// Banner printed once the console is up
    pub const BANNER: &str = "UART console ready";

    /// Written by `Console::shutdown` before the port is closed
    pub const EXIT_MESSAGE: &str = "Exiting...";

    /// Written by `Console::reset` before the board restarts
    pub const RESET_MESSAGE: &str = "Resetting...";
}

/// Transmit staging used by the UART binding
pub mod transmit {
    /// Largest single write the binding will accept
    pub const TX_BUFFER_SIZE: usize = 512;

    /// Bytes handed to the hardware per transmit completion
    pub const TX_CHUNK_SIZE: usize = 64;
}

/// Default UART line settings (115200 8N1, no loopback, no flow control)
pub mod uart_defaults {
    pub const BAUD_RATE: u32 = 115200;
    pub const DATA_BITS: u8 = 8;
    pub const LOOPBACK: bool = false;
    pub const FLOW_CONTROL: bool = false;
}

/// Wake signal bit masks
pub mod events {
    /// Data was recorded into a receive slot
    pub const RECEIVE: u32 = 0x0000_0001;

    /// All bytes of the in-flight write were confirmed
    pub const TRANSMIT: u32 = 0x0000_0002;

    /// Number of distinct event bits
    pub const COUNT: usize = 2;
}

/// Logging sink configuration
pub mod logging {
    /// Maximum length of a single formatted log message
    pub const MAX_LOG_MSG_LEN: usize = 256;
}
