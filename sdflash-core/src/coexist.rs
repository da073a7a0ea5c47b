//! Coexistence detection
//!
//! Whether an accepted request is already finished depends on whether the
//! wireless stack currently owns the controller. The answer can change at
//! any time, so it is queried for every operation and never cached.

use sdflash_hal::FlashController;

/// How an accepted controller request finishes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CompletionMode {
    /// Stack disabled: accepted means finished
    Synchronous,
    /// Stack enabled: finished once the completion event arrives
    Asynchronous,
}

impl CompletionMode {
    /// Query the controller for the current mode
    pub fn detect<C: FlashController + ?Sized>(controller: &C) -> Self {
        if controller.stack_enabled() {
            CompletionMode::Asynchronous
        } else {
            CompletionMode::Synchronous
        }
    }

    /// Check if the caller must wait for a completion event
    pub fn needs_wait(self) -> bool {
        self == CompletionMode::Asynchronous
    }
}
