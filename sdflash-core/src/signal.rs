//! Completion signal
//!
//! Bridges the coexisting stack's asynchronous "flash operation finished"
//! event to a blocked caller. The event side only ever does a non-blocking
//! `try_send` into a bounded channel, so it is safe to call from interrupt
//! context; the waiting side blocks on `receive`.
//!
//! The signal is constructed once (usually as a `static`) and lives for the
//! rest of the program.

use embassy_futures::block_on;
use embassy_sync::blocking_mutex::raw::{CriticalSectionRawMutex, RawMutex};
use embassy_sync::channel::Channel;
use sdflash_hal::ControllerEvent;

/// Number of completions that can be pending before new ones are dropped
pub const SIGNAL_CAPACITY: usize = 10;

/// How an asynchronous flash operation ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Completion {
    /// Operation finished
    Succeeded,
    /// Operation was attempted and failed
    Failed,
}

/// Counting completion signal
///
/// Each released unit wakes exactly one [`wait`](CompletionSignal::wait).
pub struct CompletionSignal<M: RawMutex = CriticalSectionRawMutex, const N: usize = SIGNAL_CAPACITY> {
    completions: Channel<M, Completion, N>,
}

impl<M: RawMutex, const N: usize> Default for CompletionSignal<M, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: RawMutex, const N: usize> CompletionSignal<M, N> {
    /// Create an empty signal
    pub const fn new() -> Self {
        Self {
            completions: Channel::new(),
        }
    }

    /// Completion callback for the controller's event dispatcher
    ///
    /// Releases one unit for a flash completion event. Other event kinds
    /// are ignored. Never blocks or allocates.
    ///
    /// Returns true if a unit was released.
    pub fn notify(&self, event: ControllerEvent) -> bool {
        match event {
            ControllerEvent::FlashOperationSuccess => self.release(Completion::Succeeded),
            ControllerEvent::FlashOperationError => self.release(Completion::Failed),
            ControllerEvent::Other(_) => false,
        }
    }

    /// Release one unit
    ///
    /// Returns false (and drops the completion) if `N` units are already
    /// pending.
    pub fn release(&self, completion: Completion) -> bool {
        match self.completions.try_send(completion) {
            Ok(()) => true,
            Err(_) => {
                warn!("completion signal full, dropping {:?}", completion);
                false
            }
        }
    }

    /// Block until one unit is released, then consume it
    ///
    /// There is no timeout: if the stack never reports completion, this
    /// never returns.
    ///
    /// Spins without yielding, so [`notify`](Self::notify) must run in
    /// another context (interrupt, thread or higher-priority executor).
    pub fn wait(&self) -> Completion {
        block_on(self.completions.receive())
    }

    /// Consume one unit if one is pending
    pub fn try_take(&self) -> Option<Completion> {
        self.completions.try_receive().ok()
    }

    /// Number of released units not yet consumed
    pub fn pending(&self) -> usize {
        self.completions.len()
    }

    /// Drop all pending units
    ///
    /// Returns how many were dropped.
    pub fn clear(&self) -> usize {
        let mut dropped = 0;
        while self.try_take().is_some() {
            dropped += 1;
        }
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embassy_sync::blocking_mutex::raw::NoopRawMutex;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_flash_events_release_units() {
        let signal: CompletionSignal<NoopRawMutex, 4> = CompletionSignal::new();

        assert!(signal.notify(ControllerEvent::FlashOperationSuccess));
        assert!(signal.notify(ControllerEvent::FlashOperationError));
        assert_eq!(signal.pending(), 2);

        assert_eq!(signal.wait(), Completion::Succeeded);
        assert_eq!(signal.wait(), Completion::Failed);
        assert_eq!(signal.pending(), 0);
    }

    #[test]
    fn test_other_events_are_ignored() {
        let signal: CompletionSignal<NoopRawMutex, 4> = CompletionSignal::new();
        assert!(!signal.notify(ControllerEvent::Other(0)));
        assert_eq!(signal.pending(), 0);
    }

    #[test]
    fn test_full_signal_drops_release() {
        let signal: CompletionSignal<NoopRawMutex, 2> = CompletionSignal::new();
        assert!(signal.release(Completion::Succeeded));
        assert!(signal.release(Completion::Succeeded));
        assert!(!signal.release(Completion::Succeeded));
        assert_eq!(signal.pending(), 2);
    }

    #[test]
    fn test_clear_drops_pending() {
        let signal: CompletionSignal<NoopRawMutex, 4> = CompletionSignal::new();
        signal.release(Completion::Succeeded);
        signal.release(Completion::Failed);
        assert_eq!(signal.clear(), 2);
        assert_eq!(signal.try_take(), None);
    }

    #[test]
    fn test_wait_blocks_until_released_from_other_thread() {
        let signal: &'static CompletionSignal = Box::leak(Box::new(CompletionSignal::new()));

        let notifier = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            signal.notify(ControllerEvent::FlashOperationSuccess)
        });

        assert_eq!(signal.wait(), Completion::Succeeded);
        assert!(notifier.join().unwrap());
    }
}
