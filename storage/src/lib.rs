//! Flash device trait contract.
//!
//! This crate does not implement a flash device; it only describes the
//! contract a device (or its emulator) must satisfy: page-granular reads,
//! page-granular 1->0 writes, and sector/block/chip erase. `FlashDevice` is
//! the capability the `sffs` crate is built on top of.

#![cfg_attr(not(any(feature = "std", test)), no_std)]

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Error {
    NotAligned,
    OutOfBounds,
    /// A page write attempted to set a bit from 0 to 1.
    NotWritten,
    NotErased,
}

pub type Result<T> = core::result::Result<T, Error>;

/// Geometry reported by a flash device.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct FlashInfo {
    pub capacity: usize,
    pub page_size: usize,
    pub sector_size: usize,
    pub block_size: usize,
}

/// A NOR-flash-like device: page-granular reads and 1->0 writes, erase only
/// at sector/block/chip granularity.
pub trait FlashDevice {
    fn info(&self) -> FlashInfo;

    /// Read `dst.len()` bytes starting at `addr`. Must not cross a page
    /// boundary.
    fn page_read(&mut self, addr: usize, dst: &mut [u8]) -> Result<()>;

    /// AND `src` into the bytes at `addr` (1->0 only). Must not cross a page
    /// boundary. Implementations must reject (return `Error::NotWritten`)
    /// any write that would need to set a bit from 0 to 1.
    fn page_write(&mut self, addr: usize, src: &[u8]) -> Result<()>;

    /// Erase one sector (the erase-block unit this filesystem reasons
    /// about) back to all-`0xFF`.
    fn sector_erase(&mut self, addr: usize) -> Result<()>;

    /// Erase one hardware erase-block (may span multiple sectors).
    fn block_erase(&mut self, addr: usize) -> Result<()>;

    /// Erase the entire device.
    fn chip_erase(&mut self) -> Result<()>;
}

/// Check that a page-granular access of `length` bytes at `offset` stays
/// within one page and within device bounds.
pub fn check_page_access(info: &FlashInfo, offset: usize, length: usize) -> Result<()> {
    if length == 0 || length > info.page_size {
        return Err(Error::OutOfBounds);
    }
    if offset
        .checked_add(length)
        .map(|end| end > info.capacity)
        .unwrap_or(true)
    {
        return Err(Error::OutOfBounds);
    }
    let page_start = (offset / info.page_size) * info.page_size;
    if offset + length > page_start + info.page_size {
        return Err(Error::NotAligned);
    }
    Ok(())
}

/// Check that an erase of `addr` is aligned to `unit` and in bounds.
pub fn check_erase(info: &FlashInfo, addr: usize, unit: usize) -> Result<()> {
    if addr >= info.capacity {
        return Err(Error::OutOfBounds);
    }
    if !addr.is_multiple_of(unit) {
        return Err(Error::NotAligned);
    }
    Ok(())
}
