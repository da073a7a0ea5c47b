//! Blocking flash operations
//!
//! [`SyncFlash`] turns the controller's "accepted now, finished later"
//! protocol into plain blocking calls:
//!
//! 1. Issue the primitive, retrying while the controller is busy.
//! 2. If the coexisting stack is enabled, block on the
//!    [`CompletionSignal`] until the stack reports the operation finished.
//!
//! Erase and program hold an internal lock for the whole sequence, so at
//! most one mutating operation is in flight and every completion event
//! pairs with the operation that caused it. Read and verify go straight to
//! memory-mapped flash without the lock.
//!
//! # Partial writes
//!
//! With [`WriteStrategy::SplitHalves`](crate::config::WriteStrategy), a
//! failure on the second half leaves the first half programmed. Any
//! program error means the destination range content is undefined; the
//! caller must erase and program the range again.

use embassy_futures::block_on;
use embassy_sync::blocking_mutex::raw::{CriticalSectionRawMutex, RawMutex};
use embassy_sync::mutex::Mutex;
use embedded_hal::delay::DelayNs;
use sdflash_hal::{check_write, FlashController, MappedFlash, Outcome};

use crate::coexist::CompletionMode;
use crate::config::FlashConfig;
use crate::error::FlashError;
use crate::retry::retry_while_busy;
use crate::signal::{Completion, CompletionSignal, SIGNAL_CAPACITY};

/// Controller and backoff delay, only touched while locked
struct Hardware<C, D> {
    controller: C,
    delay: D,
}

/// Blocking flash driver over a shared controller
pub struct SyncFlash<'s, C, D, F, M: RawMutex = CriticalSectionRawMutex, const N: usize = SIGNAL_CAPACITY> {
    hardware: Mutex<M, Hardware<C, D>>,
    memory: F,
    signal: &'s CompletionSignal<M, N>,
    config: FlashConfig,
    page_size: u32,
}

impl<'s, C, D, F, M, const N: usize> SyncFlash<'s, C, D, F, M, N>
where
    C: FlashController,
    D: DelayNs,
    F: MappedFlash,
    M: RawMutex,
{
    /// Create a new driver
    ///
    /// `signal` must be the one the controller's event dispatcher notifies.
    pub fn new(controller: C, delay: D, memory: F, signal: &'s CompletionSignal<M, N>, config: FlashConfig) -> Self {
        let page_size = controller.page_size();
        Self {
            hardware: Mutex::new(Hardware { controller, delay }),
            memory,
            signal,
            config,
            page_size,
        }
    }

    /// Get the driver configuration
    pub fn config(&self) -> &FlashConfig {
        &self.config
    }

    /// Size of one erase page in bytes
    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Erase the page containing `address`
    ///
    /// `address` is expected to be page-aligned; the page index is
    /// `address / page_size`. Blocks until the page is erased.
    pub fn erase(&self, address: u32) -> Result<(), FlashError> {
        let page = address / self.page_size;
        debug!("erasing page {} ({:#x})", page, address);

        let mut hardware = block_on(self.hardware.lock());
        self.run(&mut hardware, |controller| controller.erase_page(page))
    }

    /// Program `data` at `address`
    ///
    /// The target range must be erased (programming can only clear bits).
    /// `address` and `data.len()` must be multiples of the controller word
    /// size; otherwise [`FlashError::Misaligned`] is returned before the
    /// controller is touched. Returns the number of bytes written, which is
    /// `data.len()` on success. Blocks until every write request has
    /// finished.
    pub fn program(&self, address: u32, data: &[u8]) -> Result<usize, FlashError> {
        if data.is_empty() {
            return Ok(0);
        }
        if let Err(fault) = check_write(address, data) {
            warn!("rejected program {:#x} ({} bytes): {:?}", address, data.len(), fault);
            return Err(FlashError::Misaligned);
        }
        debug!("programming {:#x} ({} bytes)", address, data.len());

        let mut hardware = block_on(self.hardware.lock());
        for segment in self.config.write_strategy.segments(data) {
            let target = address + segment.offset as u32;
            self.run(&mut hardware, |controller| controller.write_words(target, segment.data))?;
        }

        Ok(data.len())
    }

    /// Copy flash content at `address` into `buf`
    ///
    /// Returns the number of bytes read (always `buf.len()`).
    pub fn read(&self, address: u32, buf: &mut [u8]) -> usize {
        self.memory.read(address, buf);
        buf.len()
    }

    /// Check if flash content at `address` equals `data`
    pub fn verify(&self, address: u32, data: &[u8]) -> bool {
        self.memory.verify(address, data)
    }

    /// Take the driver apart, returning controller, delay and memory
    pub fn release(self) -> (C, D, F) {
        let Hardware { controller, delay } = self.hardware.into_inner();
        (controller, delay, self.memory)
    }

    /// One primitive: busy-retry, then wait for completion if needed
    fn run<Op>(&self, hardware: &mut Hardware<C, D>, mut op: Op) -> Result<(), FlashError>
    where
        Op: FnMut(&mut C) -> Outcome,
    {
        // Units left from a completion nobody waited for would end the
        // next wait early.
        let stale = self.signal.clear();
        if stale > 0 {
            warn!("dropped {} stale flash completions", stale);
        }

        let Hardware { controller, delay } = hardware;
        retry_while_busy(delay, self.config.busy_backoff_ms, || op(controller))?;

        if !CompletionMode::detect(&*controller).needs_wait() {
            return Ok(());
        }

        match self.signal.wait() {
            Completion::Succeeded => Ok(()),
            Completion::Failed => {
                warn!("flash operation reported failure by stack");
                Err(FlashError::CompletionFailed)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WriteStrategy;
    use proptest::prelude::*;
    use sdflash_hal_sim::{SimController, SimDelay, SimHandle, SimMemory, SIM_ERROR_INVALID_ADDR};
    use std::sync::Arc;
    use std::thread;

    const PAGE: u32 = 4096;

    struct Rig {
        flash: SyncFlash<'static, SimController, SimDelay, SimMemory>,
        memory: SimMemory,
        handle: SimHandle,
        delay: SimDelay,
        signal: &'static CompletionSignal,
    }

    fn rig(stack: bool, config: FlashConfig) -> Rig {
        let memory = SimMemory::new(4 * PAGE as usize);
        let signal: &'static CompletionSignal = Box::leak(Box::new(CompletionSignal::new()));
        let mut controller = SimController::new(memory.clone(), PAGE);
        if stack {
            controller = controller.with_stack(Arc::new(move |event| {
                signal.notify(event);
            }));
        }
        let handle = controller.handle();
        let delay = SimDelay::new();
        let flash = SyncFlash::new(controller, delay.clone(), memory.clone(), signal, config);

        Rig {
            flash,
            memory,
            handle,
            delay,
            signal,
        }
    }

    #[test]
    fn test_erase_then_read_is_erased() {
        let rig = rig(false, FlashConfig::default());
        rig.memory.fill(0x1000, &[0u8; 64]);

        assert_eq!(rig.flash.erase(0x1000), Ok(()));

        let mut page = vec![0u8; PAGE as usize];
        assert_eq!(rig.flash.read(0x1000, &mut page), PAGE as usize);
        assert!(page.iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn test_program_stack_disabled_returns_immediately() {
        let rig = rig(false, FlashConfig::split_write());
        rig.flash.erase(0x1000).unwrap();

        assert_eq!(rig.flash.program(0x1000, &[0xAA; 16]), Ok(16));

        let mut buf = [0u8; 16];
        rig.flash.read(0x1000, &mut buf);
        assert_eq!(buf, [0xAA; 16]);
        assert!(rig.flash.verify(0x1000, &[0xAA; 16]));
        assert_eq!(rig.handle.events_delivered(), 0);
    }

    #[test]
    fn test_erase_stack_enabled_waits_for_event() {
        let rig = rig(true, FlashConfig::default());
        rig.memory.fill(0x2000, &[0u8; 32]);

        assert_eq!(rig.flash.erase(0x2000), Ok(()));

        // The erase is carried out on the event thread just before the
        // event, so returning means both have happened.
        assert_eq!(rig.handle.events_delivered(), 1);
        assert_eq!(rig.signal.pending(), 0);
        assert_eq!(rig.memory.contents(0x2000, 32), vec![0xFF; 32]);
    }

    #[test]
    fn test_split_program_waits_per_half() {
        let rig = rig(true, FlashConfig::split_write());
        rig.flash.erase(0x1000).unwrap();

        assert_eq!(rig.flash.program(0x1000, &[0xAA; 16]), Ok(16));

        assert_eq!(rig.handle.accepted_writes(), vec![(0x1000, 8), (0x1008, 8)]);
        assert_eq!(rig.handle.events_delivered(), 3);
        assert!(rig.flash.verify(0x1000, &[0xAA; 16]));
    }

    #[test]
    fn test_whole_program_is_single_write() {
        let rig = rig(true, FlashConfig::unaffected());

        assert_eq!(rig.flash.program(0x0, &[0x55; PAGE as usize]), Ok(PAGE as usize));

        assert_eq!(rig.handle.accepted_writes(), vec![(0x0, PAGE as usize)]);
        assert_eq!(rig.handle.events_delivered(), 1);
    }

    #[test]
    fn test_error_on_second_half_leaves_first_half() {
        let rig = rig(true, FlashConfig::split_write());
        rig.flash.erase(0x1000).unwrap();
        rig.handle.inject_write_error(1, SIM_ERROR_INVALID_ADDR);

        let data: Vec<u8> = (0..16).collect();
        assert_eq!(
            rig.flash.program(0x1000, &data),
            Err(FlashError::Controller(SIM_ERROR_INVALID_ADDR))
        );

        // Expected partial state: first half new, second half not written
        assert_eq!(rig.memory.contents(0x1000, 8), data[..8].to_vec());
        assert_eq!(rig.handle.events_delivered(), 2);
        assert_eq!(rig.signal.pending(), 0);
    }

    #[test]
    fn test_error_on_first_half_skips_second() {
        let rig = rig(false, FlashConfig::split_write());
        rig.handle.inject_write_error(0, 0x11);

        assert_eq!(rig.flash.program(0x0, &[0u8; 16]), Err(FlashError::Controller(0x11)));
        assert!(rig.handle.accepted_writes().is_empty());
        assert_eq!(rig.memory.contents(0, 16), vec![0xFF; 16]);
    }

    #[test]
    fn test_partial_word_program_touches_nothing() {
        let rig = rig(false, FlashConfig::split_write());

        assert_eq!(rig.flash.program(0x0, &[0u8; 10]), Err(FlashError::Misaligned));

        assert!(rig.handle.calls().is_empty());
        assert_eq!(rig.memory.contents(0, 10), vec![0xFF; 10]);
    }

    #[test]
    fn test_misaligned_program_touches_nothing() {
        let rig = rig(true, FlashConfig::unaffected());

        assert_eq!(rig.flash.program(0x1002, &[0u8; 8]), Err(FlashError::Misaligned));

        assert!(rig.handle.calls().is_empty());
        assert_eq!(rig.handle.events_delivered(), 0);
        assert_eq!(rig.memory.contents(0x1000, 12), vec![0xFF; 12]);
    }

    #[test]
    fn test_busy_is_retried_with_backoff() {
        let rig = rig(true, FlashConfig::default());
        rig.handle.inject_busy(5);

        assert_eq!(rig.flash.erase(0x0), Ok(()));

        assert_eq!(rig.handle.busy_responses(), 5);
        assert_eq!(rig.delay.calls(), 5);
        assert_eq!(rig.delay.total_ms(), 5);
        assert_eq!(rig.handle.events_delivered(), 1);
    }

    #[test]
    fn test_hard_erase_error_does_not_wait() {
        let rig = rig(true, FlashConfig::default());
        rig.handle.inject_erase_error(0, 0x08);

        assert_eq!(rig.flash.erase(0x0), Err(FlashError::Controller(0x08)));
        assert_eq!(rig.handle.events_delivered(), 0);
    }

    #[test]
    fn test_failed_completion_is_reported() {
        let rig = rig(true, FlashConfig::default());
        rig.handle.fail_next_completion();

        assert_eq!(rig.flash.program(0x0, &[0u8; 8]), Err(FlashError::CompletionFailed));
        assert_eq!(rig.memory.contents(0, 8), vec![0xFF; 8]);
    }

    #[test]
    fn test_stale_completion_is_not_consumed_as_own() {
        let rig = rig(true, FlashConfig::default());
        rig.memory.fill(0x0, &[0u8; 4]);
        rig.signal.release(Completion::Succeeded);

        assert_eq!(rig.flash.erase(0x0), Ok(()));

        assert_eq!(rig.handle.events_delivered(), 1);
        assert_eq!(rig.memory.contents(0, 4), vec![0xFF; 4]);
    }

    #[test]
    fn test_stack_disabled_never_waits() {
        let rig = rig(true, FlashConfig::split_write());
        rig.handle.set_stack_enabled(false);

        // No event will arrive; returning at all is the assertion.
        assert_eq!(rig.flash.erase(0x0), Ok(()));
        assert_eq!(rig.flash.program(0x0, &[0x12; 32]), Ok(32));
        assert_eq!(rig.handle.events_delivered(), 0);
        assert!(rig.flash.verify(0x0, &[0x12; 32]));
    }

    #[test]
    fn test_empty_program_touches_nothing() {
        let rig = rig(true, FlashConfig::default());

        assert_eq!(rig.flash.program(0x0, &[]), Ok(0));
        assert!(rig.handle.calls().is_empty());
    }

    #[test]
    fn test_concurrent_callers_are_serialized() {
        let rig = rig(true, FlashConfig::split_write());
        let flash = &rig.flash;

        thread::scope(|s| {
            for worker in 0..4u32 {
                s.spawn(move || {
                    let address = worker * PAGE;
                    let data = [worker as u8; 64];
                    flash.erase(address).unwrap();
                    assert_eq!(flash.program(address, &data), Ok(64));
                });
            }
        });

        for worker in 0..4u32 {
            assert!(rig.flash.verify(worker * PAGE, &[worker as u8; 64]));
        }
        // 4 erases + 4 split programs
        assert_eq!(rig.handle.events_delivered(), 12);
        assert_eq!(rig.signal.pending(), 0);
    }

    #[test]
    fn test_release_returns_parts() {
        let rig = rig(false, FlashConfig::default());
        let (controller, _delay, memory) = rig.flash.release();
        assert_eq!(controller.page_size(), PAGE);
        assert_eq!(memory.size(), 4 * PAGE as usize);
    }

    proptest! {
        #[test]
        fn prop_program_then_read_roundtrips(
            words in prop::collection::vec(any::<u32>(), 1..256),
            slot in 0u32..4,
            split in any::<bool>(),
        ) {
            let config = if split { FlashConfig::split_write() } else { FlashConfig::unaffected() };
            let rig = rig(false, config);
            let data: Vec<u8> = words.iter().flat_map(|w| w.to_le_bytes()).collect();
            let address = slot * PAGE;

            rig.flash.erase(address).unwrap();
            prop_assert_eq!(rig.flash.program(address, &data), Ok(data.len()));

            let mut buf = vec![0u8; data.len()];
            rig.flash.read(address, &mut buf);
            prop_assert_eq!(&buf, &data);
            prop_assert!(rig.flash.verify(address, &data));
        }

        #[test]
        fn prop_split_matches_unsplit(words in prop::collection::vec(any::<u32>(), 1..256)) {
            let data: Vec<u8> = words.iter().flat_map(|w| w.to_le_bytes()).collect();
            let whole = rig(false, FlashConfig::unaffected());
            let split = rig(false, FlashConfig::split_write());

            whole.flash.program(0, &data).unwrap();
            split.flash.program(0, &data).unwrap();

            prop_assert_eq!(whole.memory.contents(0, PAGE as usize), split.memory.contents(0, PAGE as usize));

            let writes = split.handle.accepted_writes();
            let covered: usize = writes.iter().map(|&(_, len)| len).sum();
            prop_assert_eq!(covered, data.len());
            if writes.len() == 2 {
                prop_assert_eq!(writes[1].0 as usize, writes[0].1);
            }
        }
    }

    #[test]
    fn test_write_strategy_in_config() {
        let rig = rig(false, FlashConfig::split_write());
        assert_eq!(rig.flash.config().write_strategy, WriteStrategy::SplitHalves);
        assert_eq!(rig.flash.page_size(), PAGE);
    }
}
