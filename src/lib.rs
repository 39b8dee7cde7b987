//! HAL for the Atmel AVR32 UC3A microcontrollers
//!
//! Currently covers the Power Manager (PM) peripheral: oscillator startup,
//! PLL frequency synthesis, generic (peripheral) clock generation,
//! clock-domain prescaling and master-clock selection.
//!
//! Each clock resource is a small typestate machine whose transitions mirror
//! the sequence the hardware requires: an oscillator must report stable
//! before a PLL may lock onto it, and the master clock should only be
//! switched onto a locked PLL. Hardware-readiness waits are exposed as
//! [`nb`] non-blocking polls with `*_blocking` convenience wrappers.
//!
//! NOTE This HAL is still under active development. This API will remain
//! volatile until 1.0.0
//!
//! # Crate features
//!
//! * **defmt** -
//!   Implement `defmt::Format` for several types.

#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]

pub mod clocks;
pub mod gclk;
pub mod osc;
pub mod pll;
pub mod pm;
pub mod typelevel;

pub use clocks::ClocksManager;

// Re-export crates used in uc3a-hal's public API
pub extern crate fugit;
pub extern crate nb;
