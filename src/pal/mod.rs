//! Platform I/O core for the console UART
//!
//! Receive slots, transmit tracking and the wake signal, tied together by
//! [`Console`].

pub mod console;
pub mod event;
pub mod ring;
pub mod tx;

pub use console::{Console, LineProcessor, PalConsole, StopSignal};
pub use event::{EventMask, WakeSignal};
pub use ring::{FillOutcome, FilledSlot, SlotRing, SlotState};
pub use tx::{Confirmation, TxTracker};
