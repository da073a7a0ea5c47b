//! Simulated flash controller
//!
//! Behaves like a controller mediated by a wireless stack:
//!
//! - Stack disabled: accepted requests are carried out before returning.
//! - Stack enabled: accepted requests return immediately; the operation is
//!   carried out on a separate "event context" thread, which then reports a
//!   completion event through the registered [`EventSink`].

use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use sdflash_hal::{check_write, ControllerEvent, FlashController, Outcome, WriteFault};

use crate::memory::SimMemory;

/// Status code for a misaligned or out-of-range address
pub const SIM_ERROR_INVALID_ADDR: u32 = 0x10;

/// Status code for a zero or non-word-multiple length
pub const SIM_ERROR_INVALID_LENGTH: u32 = 0x09;

/// Default delay between accepting a request and reporting completion
const DEFAULT_EVENT_LATENCY: Duration = Duration::from_millis(2);

/// Receiver of controller events, called from the event context thread
pub type EventSink = Arc<dyn Fn(ControllerEvent) + Send + Sync>;

/// One primitive call as seen by the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    /// Page erase request
    Erase { page: u32, outcome: Outcome },
    /// Word write request
    Write { address: u32, len: usize, outcome: Outcome },
}

#[derive(Debug, Clone, Copy)]
enum Operation {
    Erase,
    Write,
}

#[derive(Debug, Default)]
struct SimState {
    stack_enabled: bool,
    busy_remaining: u32,
    erase_errors: Vec<(usize, u32)>,
    write_errors: Vec<(usize, u32)>,
    fail_next_completion: bool,
    erases: usize,
    writes: usize,
    calls: Vec<Call>,
    events_delivered: usize,
}

impl SimState {
    /// Consume an injected error for the `index`-th request, if any
    fn take_error(errors: &mut Vec<(usize, u32)>, index: usize) -> Option<u32> {
        let pos = errors.iter().position(|&(nth, _)| nth == index)?;
        Some(errors.swap_remove(pos).1)
    }
}

/// Test-side handle onto a [`SimController`]
///
/// Stays usable after the controller has been moved into a driver.
#[derive(Clone)]
pub struct SimHandle {
    state: Arc<Mutex<SimState>>,
}

impl SimHandle {
    /// Enable or disable the simulated stack
    pub fn set_stack_enabled(&self, enabled: bool) {
        self.lock().stack_enabled = enabled;
    }

    /// Answer the next `count` primitive calls with busy
    pub fn inject_busy(&self, count: u32) {
        self.lock().busy_remaining += count;
    }

    /// Fail the `nth` non-busy erase request (0-based) with `code`
    pub fn inject_erase_error(&self, nth: usize, code: u32) {
        self.lock().erase_errors.push((nth, code));
    }

    /// Fail the `nth` non-busy write request (0-based) with `code`
    pub fn inject_write_error(&self, nth: usize, code: u32) {
        self.lock().write_errors.push((nth, code));
    }

    /// Report the next asynchronous operation as failed (nothing is written)
    pub fn fail_next_completion(&self) {
        self.lock().fail_next_completion = true;
    }

    /// All primitive calls so far, in order
    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    /// Accepted write requests as `(address, len)`
    pub fn accepted_writes(&self) -> Vec<(u32, usize)> {
        self.lock()
            .calls
            .iter()
            .filter_map(|call| match *call {
                Call::Write {
                    address,
                    len,
                    outcome: Outcome::Success,
                } => Some((address, len)),
                _ => None,
            })
            .collect()
    }

    /// Number of busy responses handed out so far
    pub fn busy_responses(&self) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|call| {
                matches!(
                    call,
                    Call::Erase { outcome: Outcome::Busy, .. } | Call::Write { outcome: Outcome::Busy, .. }
                )
            })
            .count()
    }

    /// Number of completion events reported to the sink
    pub fn events_delivered(&self) -> usize {
        self.lock().events_delivered
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Simulated flash controller
pub struct SimController {
    memory: SimMemory,
    page_size: u32,
    state: Arc<Mutex<SimState>>,
    sink: Option<EventSink>,
    event_latency: Duration,
}

impl SimController {
    /// Create a controller over `memory` with the stack disabled
    pub fn new(memory: SimMemory, page_size: u32) -> Self {
        Self {
            memory,
            page_size,
            state: Arc::new(Mutex::new(SimState::default())),
            sink: None,
            event_latency: DEFAULT_EVENT_LATENCY,
        }
    }

    /// Register the event dispatcher target and enable the stack
    pub fn with_stack(self, sink: EventSink) -> Self {
        self.handle().set_stack_enabled(true);
        Self {
            sink: Some(sink),
            ..self
        }
    }

    /// Set the delay between accepting a request and its completion event
    pub fn with_event_latency(self, event_latency: Duration) -> Self {
        Self { event_latency, ..self }
    }

    /// Get a handle for injecting faults and inspecting calls
    pub fn handle(&self) -> SimHandle {
        SimHandle {
            state: self.state.clone(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Busy check shared by all primitives
    fn take_busy(state: &mut SimState) -> bool {
        if state.busy_remaining > 0 {
            state.busy_remaining -= 1;
            true
        } else {
            false
        }
    }

    /// Carry out an accepted request, now or from the event context
    fn complete(&self, operation: Operation, address: u32, data: Vec<u8>, len: usize) {
        let (asynchronous, fail) = {
            let mut state = self.lock();
            let asynchronous = state.stack_enabled && self.sink.is_some();
            let fail = asynchronous && core::mem::take(&mut state.fail_next_completion);
            (asynchronous, fail)
        };

        let memory = self.memory.clone();
        let apply = move || match operation {
            Operation::Erase => memory.erase(address, len),
            Operation::Write => memory.program(address, &data),
        };

        let Some(sink) = self.sink.clone().filter(|_| asynchronous) else {
            apply();
            return;
        };

        let state = self.state.clone();
        let latency = self.event_latency;
        thread::spawn(move || {
            thread::sleep(latency);
            let event = if fail {
                ControllerEvent::FlashOperationError
            } else {
                apply();
                ControllerEvent::FlashOperationSuccess
            };
            state
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .events_delivered += 1;
            sink(event);
        });
    }
}

impl FlashController for SimController {
    fn page_size(&self) -> u32 {
        self.page_size
    }

    fn erase_page(&mut self, page: u32) -> Outcome {
        let address = page.wrapping_mul(self.page_size);
        let outcome = {
            let mut state = self.lock();
            let outcome = if Self::take_busy(&mut state) {
                Outcome::Busy
            } else {
                let index = state.erases;
                state.erases += 1;
                match SimState::take_error(&mut state.erase_errors, index) {
                    Some(code) => Outcome::Error(code),
                    None if !self.memory.in_range(address, self.page_size as usize) => {
                        Outcome::Error(SIM_ERROR_INVALID_ADDR)
                    }
                    None => Outcome::Success,
                }
            };
            state.calls.push(Call::Erase { page, outcome });
            outcome
        };

        if outcome.is_success() {
            self.complete(Operation::Erase, address, Vec::new(), self.page_size as usize);
        }
        outcome
    }

    fn write_words(&mut self, address: u32, data: &[u8]) -> Outcome {
        let outcome = {
            let mut state = self.lock();
            let outcome = if Self::take_busy(&mut state) {
                Outcome::Busy
            } else {
                let index = state.writes;
                state.writes += 1;
                match SimState::take_error(&mut state.write_errors, index) {
                    Some(code) => Outcome::Error(code),
                    None => match check_write(address, data) {
                        Err(WriteFault::Length) => Outcome::Error(SIM_ERROR_INVALID_LENGTH),
                        Err(WriteFault::Address) => Outcome::Error(SIM_ERROR_INVALID_ADDR),
                        Ok(()) if !self.memory.in_range(address, data.len()) => Outcome::Error(SIM_ERROR_INVALID_ADDR),
                        Ok(()) => Outcome::Success,
                    },
                }
            };
            state.calls.push(Call::Write {
                address,
                len: data.len(),
                outcome,
            });
            outcome
        };

        if outcome.is_success() {
            self.complete(Operation::Write, address, data.to_vec(), data.len());
        }
        outcome
    }

    fn stack_enabled(&self) -> bool {
        self.lock().stack_enabled
    }
}
