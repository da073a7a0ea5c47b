//! Flash driver configuration
//!
//! Selected once when the driver is constructed. Optionally serializable so
//! firmware can keep it alongside its board configuration.

use heapless::Vec;
use sdflash_hal::WORD_SIZE;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Default delay between attempts while the controller reports busy
pub const DEFAULT_BUSY_BACKOFF_MS: u32 = 1;

/// How a program request is handed to the controller
///
/// Some stack/controller combinations fault when a single write request
/// covers more than half of a page. `SplitHalves` avoids that by issuing
/// two half-size writes, each retried and awaited on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum WriteStrategy {
    /// One write request for the whole buffer
    #[default]
    Whole,
    /// Two write requests, first and second half
    SplitHalves,
}

/// One write request produced by a [`WriteStrategy`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment<'a> {
    /// Offset of this segment from the start of the buffer
    pub offset: usize,
    /// Bytes to write
    pub data: &'a [u8],
}

impl WriteStrategy {
    /// Split point for a buffer of `len` bytes
    ///
    /// Half the length, rounded down to the controller word size. Returns
    /// `None` when the buffer is too short to split (or the strategy is
    /// `Whole`).
    pub fn split_point(self, len: usize) -> Option<usize> {
        match self {
            WriteStrategy::Whole => None,
            WriteStrategy::SplitHalves => {
                let mid = (len / 2) / WORD_SIZE * WORD_SIZE;
                (mid > 0).then_some(mid)
            }
        }
    }

    /// Partition `data` into the write requests to issue, in order
    ///
    /// Segments never overlap and together cover `data` exactly.
    pub fn segments(self, data: &[u8]) -> Vec<Segment<'_>, 2> {
        let mut segments = Vec::new();

        // Capacity is 2 and at most 2 segments are pushed
        match self.split_point(data.len()) {
            Some(mid) => {
                let (first, second) = data.split_at(mid);
                let _ = segments.push(Segment { offset: 0, data: first });
                let _ = segments.push(Segment { offset: mid, data: second });
            }
            None => {
                let _ = segments.push(Segment { offset: 0, data });
            }
        }

        segments
    }
}

/// Flash driver configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FlashConfig {
    /// How program requests are split
    pub write_strategy: WriteStrategy,
    /// Delay between attempts while the controller is busy (ms)
    pub busy_backoff_ms: u32,
}

impl Default for FlashConfig {
    fn default() -> Self {
        Self::unaffected()
    }
}

impl FlashConfig {
    /// Configuration for controllers without the split-write erratum
    pub const fn unaffected() -> Self {
        Self {
            write_strategy: WriteStrategy::Whole,
            busy_backoff_ms: DEFAULT_BUSY_BACKOFF_MS,
        }
    }

    /// Configuration for controllers affected by the split-write erratum
    pub const fn split_write() -> Self {
        Self {
            write_strategy: WriteStrategy::SplitHalves,
            busy_backoff_ms: DEFAULT_BUSY_BACKOFF_MS,
        }
    }
}

/// Address range the application may erase or program
///
/// Keeps application writes away from the stack image and the bootloader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct WritableRegion {
    /// First writable address
    pub start: u32,
    /// One past the last writable address
    pub end: u32,
}

impl WritableRegion {
    /// Create a new region covering `start..end`
    pub const fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    /// Check if `len` bytes at `address` lie entirely inside the region
    pub fn contains(&self, address: u32, len: usize) -> bool {
        let end = address as u64 + len as u64;
        address >= self.start && end <= self.end as u64
    }
}
