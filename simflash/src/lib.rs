//! Simulated flash.
//!
//! NOR-type flash devices used on microcontrollers differ quite a bit in
//! terms of capabilities, but the constraints this filesystem cares about
//! are universal: a write can only turn 1 bits into 0 bits, and a bit can
//! only be set back to 1 by erasing a whole sector/block/chip. This
//! simulator captures exactly that, and nothing more, so that it exercises
//! `sffs` the same way a real device would.
//!
//! Grounded directly in the reference C flash emulator: a write ANDs the new
//! bytes into the existing ones and rejects (rather than silently
//! corrupting) any write that would need to set a bit, and an erase fills
//! the affected region with `0xFF`.

pub mod styles;

use storage::{check_erase, check_page_access, Error, FlashDevice, FlashInfo, Result};

/// An in-memory flash device.
#[derive(Clone)]
pub struct SimFlash {
    info: FlashInfo,
    data: Vec<u8>,
}

impl SimFlash {
    /// Build a fresh, fully-erased flash device of the given geometry.
    pub fn new(page_size: usize, sector_size: usize, block_size: usize, capacity: usize) -> Self {
        assert!(page_size > 0 && sector_size.is_multiple_of(page_size));
        assert!(block_size.is_multiple_of(sector_size));
        assert!(capacity.is_multiple_of(block_size));
        SimFlash {
            info: FlashInfo {
                capacity,
                page_size,
                sector_size,
                block_size,
            },
            data: vec![0xFFu8; capacity],
        }
    }

    /// Raw view of the backing store, for test assertions.
    pub fn raw(&self) -> &[u8] {
        &self.data
    }
}

impl FlashDevice for SimFlash {
    fn info(&self) -> FlashInfo {
        self.info
    }

    fn page_read(&mut self, addr: usize, dst: &mut [u8]) -> Result<()> {
        check_page_access(&self.info, addr, dst.len())?;
        dst.copy_from_slice(&self.data[addr..addr + dst.len()]);
        Ok(())
    }

    fn page_write(&mut self, addr: usize, src: &[u8]) -> Result<()> {
        check_page_access(&self.info, addr, src.len())?;

        // A write can only clear bits. If `src` wants a 1 where the medium
        // currently holds a 0, the write is illegal (would require an
        // erase first). Detect this before mutating anything.
        for (i, &b) in src.iter().enumerate() {
            let cur = self.data[addr + i];
            if b & !cur != 0 {
                return Err(Error::NotWritten);
            }
        }

        for (i, &b) in src.iter().enumerate() {
            self.data[addr + i] &= b;
        }
        Ok(())
    }

    fn sector_erase(&mut self, addr: usize) -> Result<()> {
        check_erase(&self.info, addr, self.info.sector_size)?;
        self.data[addr..addr + self.info.sector_size].fill(0xFF);
        Ok(())
    }

    fn block_erase(&mut self, addr: usize) -> Result<()> {
        check_erase(&self.info, addr, self.info.block_size)?;
        self.data[addr..addr + self.info.block_size].fill(0xFF);
        Ok(())
    }

    fn chip_erase(&mut self) -> Result<()> {
        self.data.fill(0xFF);
        Ok(())
    }
}
