//! Busy-retry wrapper for controller primitives

use embedded_hal::delay::DelayNs;
use sdflash_hal::Outcome;

use crate::error::FlashError;

/// Issue `op` until the controller stops reporting busy
///
/// Sleeps `backoff_ms` between attempts. There is no attempt limit: a
/// controller that stays busy keeps the caller here. The first
/// [`Outcome::Success`] or [`Outcome::Error`] ends the loop.
///
/// Returns the number of busy responses seen before success.
pub fn retry_while_busy<D, F>(delay: &mut D, backoff_ms: u32, mut op: F) -> Result<u32, FlashError>
where
    D: DelayNs,
    F: FnMut() -> Outcome,
{
    let mut busy = 0u32;

    loop {
        match op() {
            Outcome::Success => return Ok(busy),
            Outcome::Busy => {
                busy = busy.wrapping_add(1);
                trace!("flash controller busy, retry {}", busy);
                delay.delay_ms(backoff_ms);
            }
            Outcome::Error(code) => {
                warn!("flash controller error {:#x}", code);
                return Err(FlashError::Controller(code));
            }
        }
    }
}
