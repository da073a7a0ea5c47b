//! Memory-mapped flash access
//!
//! Program flash is readable as ordinary memory, so reads and compares
//! never go through the controller and never wait.

/// Chunk size used by the default [`MappedFlash::verify`]
const VERIFY_CHUNK: usize = 64;

/// Memory-mapped view of program flash
///
/// Addresses outside the mapped flash are a caller error and are not
/// checked by implementations for real hardware.
pub trait MappedFlash {
    /// Copy `buf.len()` bytes starting at `address` into `buf`
    fn read(&self, address: u32, buf: &mut [u8]);

    /// Compare `data` against flash content at `address`
    ///
    /// Returns true if every byte matches.
    fn verify(&self, address: u32, data: &[u8]) -> bool {
        let mut chunk = [0u8; VERIFY_CHUNK];
        let mut offset = 0usize;

        for expected in data.chunks(VERIFY_CHUNK) {
            let actual = &mut chunk[..expected.len()];
            self.read(address + offset as u32, actual);
            if actual != expected {
                return false;
            }
            offset += expected.len();
        }

        true
    }
}

impl<T: MappedFlash + ?Sized> MappedFlash for &T {
    fn read(&self, address: u32, buf: &mut [u8]) {
        (**self).read(address, buf)
    }

    fn verify(&self, address: u32, data: &[u8]) -> bool {
        (**self).verify(address, data)
    }
}
