//! Host simulation of a flash controller shared with a wireless stack
//!
//! This crate provides `std` implementations of the `sdflash-hal` traits
//! for tests:
//!
//! - [`SimMemory`] - NOR flash array (erase to 0xFF, program clears bits)
//! - [`SimController`] - Controller with busy/error injection and
//!   asynchronous completion events delivered from a separate thread
//!   while the simulated stack is enabled
//! - [`SimDelay`] - Delay that records instead of sleeping

pub mod controller;
pub mod delay;
pub mod memory;

pub use controller::{Call, EventSink, SimController, SimHandle, SIM_ERROR_INVALID_ADDR, SIM_ERROR_INVALID_LENGTH};
pub use delay::SimDelay;
pub use memory::SimMemory;
