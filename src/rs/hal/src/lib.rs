#![cfg_attr(not(test), no_std)]
#![allow(clippy::inline_always)]
#![allow(clippy::must_use_candidate)]

#[cfg(test)]
#[macro_use]
extern crate std;

// modules
pub mod dummy;
pub mod pwm;
pub mod serial;

pub use embedded_hal as hal;
pub use embedded_hal_nb as hal_nb;

pub use nb;
