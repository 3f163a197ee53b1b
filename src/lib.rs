#![cfg_attr(not(test), no_std)]

pub mod config;
pub mod line;
pub mod logger;
pub mod pal;
pub mod uart;

// These modules depend on esp-hal/embassy features only available with embedded feature
#[cfg(feature = "embedded")]
pub mod tasks;
