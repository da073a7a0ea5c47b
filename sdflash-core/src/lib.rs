//! Blocking flash access beside a coexisting wireless stack
//!
//! This crate makes a flash controller that is shared with an asynchronous
//! radio stack usable through plain blocking calls:
//!
//! - Completion signal bridging the stack's completion event to a caller
//! - Busy-retry of controller primitives
//! - Coexistence detection (synchronous vs. event-completed operations)
//! - Erase/program/read/verify, with the split-write erratum workaround
//! - Write-combining page cache and the application-facing API
//!
//! # Wiring
//!
//! ```text
//! stack event dispatcher ──► CompletionSignal::notify ──┐
//!                                                       ▼
//! InternalFlash ──► FlashCache ──► SyncFlash ──► FlashController
//!                                      └───────► MappedFlash
//! ```

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

#[macro_use]
mod fmt;

pub mod api;
pub mod cache;
pub mod coexist;
pub mod config;
pub mod error;
pub mod flash;
pub mod primitives;
pub mod retry;
pub mod signal;

pub use api::InternalFlash;
pub use cache::FlashCache;
pub use config::{FlashConfig, WritableRegion, WriteStrategy};
pub use error::FlashError;
pub use flash::SyncFlash;
pub use primitives::FlashPrimitives;
pub use signal::{Completion, CompletionSignal};
