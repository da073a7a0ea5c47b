//! Flash primitives consumed by the page cache
//!
//! The cache only needs four operations plus the page size. [`SyncFlash`]
//! provides them; tests can substitute a recording double.

use embedded_hal::delay::DelayNs;
use embassy_sync::blocking_mutex::raw::RawMutex;
use sdflash_hal::{FlashController, MappedFlash};

use crate::error::FlashError;
use crate::flash::SyncFlash;

/// Erase/program/read/verify contract
pub trait FlashPrimitives {
    /// Size of one erase page in bytes
    fn page_size(&self) -> u32;

    /// Erase the page at `address` (page-aligned)
    fn erase(&mut self, address: u32) -> Result<(), FlashError>;

    /// Program `data` at `address`, returning bytes written
    fn program(&mut self, address: u32, data: &[u8]) -> Result<usize, FlashError>;

    /// Read flash at `address` into `buf`, returning bytes read
    fn read(&mut self, address: u32, buf: &mut [u8]) -> usize;

    /// Check if flash at `address` equals `data`
    fn verify(&mut self, address: u32, data: &[u8]) -> bool;
}

impl<C, D, F, M, const N: usize> FlashPrimitives for SyncFlash<'_, C, D, F, M, N>
where
    C: FlashController,
    D: DelayNs,
    F: MappedFlash,
    M: RawMutex,
{
    fn page_size(&self) -> u32 {
        SyncFlash::page_size(self)
    }

    fn erase(&mut self, address: u32) -> Result<(), FlashError> {
        SyncFlash::erase(self, address)
    }

    fn program(&mut self, address: u32, data: &[u8]) -> Result<usize, FlashError> {
        SyncFlash::program(self, address, data)
    }

    fn read(&mut self, address: u32, buf: &mut [u8]) -> usize {
        SyncFlash::read(self, address, buf)
    }

    fn verify(&mut self, address: u32, data: &[u8]) -> bool {
        SyncFlash::verify(self, address, data)
    }
}

impl<C, D, F, M, const N: usize> FlashPrimitives for &SyncFlash<'_, C, D, F, M, N>
where
    C: FlashController,
    D: DelayNs,
    F: MappedFlash,
    M: RawMutex,
{
    fn page_size(&self) -> u32 {
        SyncFlash::page_size(self)
    }

    fn erase(&mut self, address: u32) -> Result<(), FlashError> {
        SyncFlash::erase(self, address)
    }

    fn program(&mut self, address: u32, data: &[u8]) -> Result<usize, FlashError> {
        SyncFlash::program(self, address, data)
    }

    fn read(&mut self, address: u32, buf: &mut [u8]) -> usize {
        SyncFlash::read(self, address, buf)
    }

    fn verify(&mut self, address: u32, data: &[u8]) -> bool {
        SyncFlash::verify(self, address, data)
    }
}
