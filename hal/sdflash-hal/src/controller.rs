//! Flash controller abstractions
//!
//! The controller primitives are the raw requests a backend can issue:
//! erase one page, write a batch of 32-bit words, and report whether the
//! coexisting stack currently owns the controller.

/// Value every byte of a page holds after erase
pub const ERASED_BYTE: u8 = 0xFF;

/// Controller write granularity in bytes (one 32-bit word)
pub const WORD_SIZE: usize = 4;

/// Result of a single controller primitive call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Outcome {
    /// Request accepted (and finished, unless the stack is enabled)
    Success,
    /// Another flash operation is in progress; the request may be repeated
    Busy,
    /// Non-retryable failure, carrying the backend's status code
    Error(u32),
}

impl Outcome {
    /// Check if the request was accepted
    pub fn is_success(self) -> bool {
        matches!(self, Outcome::Success)
    }

    /// Check if the request should be repeated
    pub fn is_busy(self) -> bool {
        matches!(self, Outcome::Busy)
    }
}

/// Why a write request does not fit the controller's word granularity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WriteFault {
    /// Empty, or not a whole number of words
    Length,
    /// Destination not word-aligned
    Address,
}

/// Check a write request against [`WORD_SIZE`]
///
/// Length is checked before address.
pub fn check_write(address: u32, data: &[u8]) -> Result<(), WriteFault> {
    if data.is_empty() || data.len() % WORD_SIZE != 0 {
        return Err(WriteFault::Length);
    }
    if address as usize % WORD_SIZE != 0 {
        return Err(WriteFault::Address);
    }
    Ok(())
}

/// Flash controller primitives
///
/// Implementations forward to the vendor driver. None of these calls wait
/// for the operation to finish when the coexisting stack is enabled; the
/// stack reports completion later through a
/// [`ControllerEvent`](crate::event::ControllerEvent).
///
/// # Buffer lifetime
///
/// While the stack is enabled the controller may still be reading `data`
/// after [`write_words`](FlashController::write_words) returns. Callers
/// must keep the buffer alive until the completion event arrives.
pub trait FlashController {
    /// Size of one erase page in bytes
    fn page_size(&self) -> u32;

    /// Request erase of the page with the given index
    ///
    /// The page index is `address / page_size()`.
    fn erase_page(&mut self, page: u32) -> Outcome;

    /// Request a write of `data` to `address`
    ///
    /// `address` and `data.len()` are expected to be multiples of
    /// [`WORD_SIZE`]; backends report a violation (see [`check_write`]) as
    /// [`Outcome::Error`] and write nothing.
    fn write_words(&mut self, address: u32, data: &[u8]) -> Outcome;

    /// Check if the coexisting stack is currently enabled
    ///
    /// When it is, every accepted request is followed by exactly one
    /// completion event.
    fn stack_enabled(&self) -> bool;
}

impl<T: FlashController + ?Sized> FlashController for &mut T {
    fn page_size(&self) -> u32 {
        (**self).page_size()
    }

    fn erase_page(&mut self, page: u32) -> Outcome {
        (**self).erase_page(page)
    }

    fn write_words(&mut self, address: u32, data: &[u8]) -> Outcome {
        (**self).write_words(address, data)
    }

    fn stack_enabled(&self) -> bool {
        (**self).stack_enabled()
    }
}
