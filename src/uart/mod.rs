pub mod traits;

#[cfg(feature = "embedded")]
pub mod esp;

pub use traits::{Parity, StopBits, UartConfig, UartDriver, UartError};
