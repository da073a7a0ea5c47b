//! sdflash Hardware Abstraction Layer
//!
//! This crate defines the traits a flash controller backend implements so
//! the blocking flash core can run on top of it. The controller is assumed
//! to be shared with a coexisting wireless stack: while the stack is
//! enabled, a successful request only means "accepted", and the actual
//! completion is reported later through a [`event::ControllerEvent`].
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  Application / bootloader               │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  sdflash-core (cache, sync, erratum)    │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  sdflash-hal (this crate - traits)      │
//! └─────────────────────────────────────────┘
//!                     │
//!         ┌───────────┴───────────┐
//!         ▼                       ▼
//! ┌───────────────┐       ┌───────────────┐
//! │ sdflash-hal-  │       │ sdflash-hal-  │
//! │    nrf52      │       │     sim       │
//! └───────────────┘       └───────────────┘
//! ```
//!
//! # Traits
//!
//! - [`controller::FlashController`] - Page erase, word-batch write, stack query
//! - [`memory::MappedFlash`] - Memory-mapped read and compare

#![no_std]
#![deny(unsafe_code)]

pub mod controller;
pub mod event;
pub mod memory;

// Re-export key traits at crate root for convenience
pub use controller::{check_write, FlashController, Outcome, WriteFault, ERASED_BYTE, WORD_SIZE};
pub use event::ControllerEvent;
pub use memory::MappedFlash;
