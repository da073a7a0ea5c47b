//! Flash operation errors
//!
//! Busy is never surfaced: it is retried away by
//! [`retry_while_busy`](crate::retry::retry_while_busy).

/// Errors from flash operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FlashError {
    /// Controller rejected the request with a non-busy status code
    Controller(u32),
    /// Request was accepted but the stack reported the operation failed
    CompletionFailed,
    /// Address range is outside the writable region
    Protected,
    /// Program request is not whole words at a word-aligned address
    Misaligned,
}

impl FlashError {
    /// Get the controller status code, if the controller produced one
    pub fn status_code(self) -> Option<u32> {
        match self {
            FlashError::Controller(code) => Some(code),
            _ => None,
        }
    }
}

impl core::fmt::Display for FlashError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            FlashError::Controller(code) => write!(f, "flash controller error {:#x}", code),
            FlashError::CompletionFailed => f.write_str("flash operation completed with error"),
            FlashError::Protected => f.write_str("address outside writable flash region"),
            FlashError::Misaligned => f.write_str("program request not word-aligned"),
        }
    }
}
