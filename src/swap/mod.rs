//! Page-granular swap device.
//!
//! [`SwapDevice`] is the narrow trait the VMM depends on; [`FileSwapDevice`]
//! is the shipping implementation (a flat file, one page per slot).
//! [`InMemorySwap`] is a fault-injectable stand-in used by tests.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::page::PAGE_SIZE;

/// A page-size random-access store of evicted frames, addressed by slot.
pub trait SwapDevice {
    /// Writes `page` (exactly one page) to `slot`, growing the store if needed.
    fn swap_out(&mut self, slot: u64, page: &[u8]) -> Result<()>;

    /// Reads the page previously written to `slot` into `out` (exactly one page).
    fn swap_in(&mut self, slot: u64, out: &mut [u8]) -> Result<()>;
}

/// A flat file whose byte `slot * PAGE_SIZE + k` holds byte `k` of the page
/// assigned to `slot`. Opened `O_RDWR | O_CREATE` at construction; `Drop`
/// best-effort-closes the handle, and [`FileSwapDevice::terminate`] closes
/// and removes the file for the common, non-crashing teardown path.
pub struct FileSwapDevice {
    file: File,
    path: PathBuf,
}

impl FileSwapDevice {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)?;
        Ok(FileSwapDevice { file, path })
    }

    /// Closes the file and removes it from disk.
    pub fn terminate(self) -> Result<()> {
        let path = self.path.clone();
        drop(self);
        std::fs::remove_file(path)?;
        Ok(())
    }

    fn slot_offset(slot: u64) -> u64 {
        slot * PAGE_SIZE
    }
}

impl SwapDevice for FileSwapDevice {
    fn swap_out(&mut self, slot: u64, page: &[u8]) -> Result<()> {
        self.file.seek(SeekFrom::Start(Self::slot_offset(slot)))?;
        self.file.write_all(&page[..PAGE_SIZE as usize])?;
        Ok(())
    }

    fn swap_in(&mut self, slot: u64, out: &mut [u8]) -> Result<()> {
        self.file.seek(SeekFrom::Start(Self::slot_offset(slot)))?;
        self.file.read_exact(&mut out[..PAGE_SIZE as usize])?;
        Ok(())
    }
}

/// An in-memory swap device that can be told to fail its next `swap_out` or
/// `swap_in`. Used to exercise the VMM's I/O-failure recovery paths (§8
/// scenario 6) without relying on filesystem-level fault injection.
#[derive(Default)]
pub struct InMemorySwap {
    pub fail_next_out: bool,
    pub fail_next_in: bool,
    slots: std::collections::HashMap<u64, Vec<u8>>,
}

impl InMemorySwap {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SwapDevice for InMemorySwap {
    fn swap_out(&mut self, slot: u64, page: &[u8]) -> Result<()> {
        if self.fail_next_out {
            self.fail_next_out = false;
            return Err(std::io::Error::new(std::io::ErrorKind::Other, "injected swap-out fault").into());
        }
        self.slots.insert(slot, page[..PAGE_SIZE as usize].to_vec());
        Ok(())
    }

    fn swap_in(&mut self, slot: u64, out: &mut [u8]) -> Result<()> {
        if self.fail_next_in {
            self.fail_next_in = false;
            return Err(std::io::Error::new(std::io::ErrorKind::Other, "injected swap-in fault").into());
        }
        let page = self.slots.get(&slot).ok_or(Error::Unmapped)?;
        out[..PAGE_SIZE as usize].copy_from_slice(page);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_page_through_a_real_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("swap.bin");
        let mut dev = FileSwapDevice::open(&path).unwrap();

        let mut page_a = vec![0u8; PAGE_SIZE as usize];
        page_a[0] = 0xAA;
        let mut page_b = vec![0u8; PAGE_SIZE as usize];
        page_b[0] = 0xBB;

        dev.swap_out(0, &page_a).unwrap();
        dev.swap_out(1, &page_b).unwrap();

        let mut out = vec![0u8; PAGE_SIZE as usize];
        dev.swap_in(0, &mut out).unwrap();
        assert_eq!(out, page_a);
        dev.swap_in(1, &mut out).unwrap();
        assert_eq!(out, page_b);
    }

    #[test]
    fn terminate_removes_the_backing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("swap.bin");
        let dev = FileSwapDevice::open(&path).unwrap();
        assert!(path.exists());
        dev.terminate().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn in_memory_swap_fails_exactly_once() {
        let mut dev = InMemorySwap::new();
        dev.fail_next_out = true;
        let page = vec![0u8; PAGE_SIZE as usize];
        assert!(dev.swap_out(0, &page).is_err());
        assert!(dev.swap_out(0, &page).is_ok());
    }
}
