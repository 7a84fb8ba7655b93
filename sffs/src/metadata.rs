//! Metadata engine: per-page item read/write and sector-state derivation.

use crate::error::{Error, Result};
use crate::fs::Sffs;
use crate::layout::{self, MetadataItem, PageState, SectorHeader, SectorState};
use storage::FlashDevice;

impl<F: FlashDevice> Sffs<F> {
    pub(crate) fn read_sector_header(&mut self, sector: usize) -> Result<SectorHeader> {
        let mut buf = [0u8; layout::SECTOR_HEADER_SIZE];
        self.read_region(self.header_addr(sector), &mut buf)?;
        let header = SectorHeader::decode(&buf);
        if header.magic != layout::METADATA_MAGIC {
            return Err(Error::BadGeometry);
        }
        if header.metadata_page_count as usize >= self.sector_size / self.page_size {
            return Err(Error::BadGeometry);
        }
        Ok(header)
    }

    pub(crate) fn get_page_metadata(&mut self, sector: usize, idx: usize) -> Result<MetadataItem> {
        let mut buf = [0u8; layout::METADATA_ITEM_SIZE];
        self.read_region(self.item_addr(sector, idx), &mut buf)?;
        Ok(MetadataItem::decode(&buf))
    }

    pub(crate) fn set_page_metadata(
        &mut self,
        sector: usize,
        idx: usize,
        item: &MetadataItem,
    ) -> Result<()> {
        let mut buf = [0u8; layout::METADATA_ITEM_SIZE];
        item.encode(&mut buf);
        self.write_region(self.item_addr(sector, idx), &buf)?;
        self.update_sector_metadata(sector)
    }

    /// Read-modify-write of just the state byte of one item.
    pub(crate) fn set_page_state(&mut self, sector: usize, idx: usize, new_state: PageState) -> Result<()> {
        // The state byte sits at offset 4 within the packed item.
        let addr = self.item_addr(sector, idx) + 4;
        self.write_region(addr, &[new_state.code()])?;
        self.update_sector_metadata(sector)
    }

    /// Tally the states of every data page in `sector` and rewrite the
    /// sector header's state byte per the derivation table. The new code
    /// must be a bitwise submask of the old one; anything else means the
    /// header was corrupted or progressed out of order.
    ///
    /// The source names a fifth sector state, `OLD` (every page `OLD`), but
    /// never assigns it an on-media code distinct from `DIRTY` -- both mean
    /// "reclaimable", so an all-`OLD` sector is folded into `DIRTY` here.
    pub(crate) fn update_sector_metadata(&mut self, sector: usize) -> Result<()> {
        let item_count = self.data_pages_per_sector;
        let (mut erased, mut reserved, mut used, mut moving, mut old) = (0usize, 0usize, 0usize, 0usize, 0usize);
        for idx in 0..item_count {
            let item = self.get_page_metadata(sector, idx)?;
            match PageState::from_code(item.state) {
                Some(PageState::Erased) => erased += 1,
                Some(PageState::Reserved) => reserved += 1,
                Some(PageState::Used) => used += 1,
                Some(PageState::Moving) => moving += 1,
                Some(PageState::Old) => old += 1,
                None => return Err(Error::BadGeometry),
            }
        }

        let new_state = if erased == item_count {
            SectorState::Erased
        } else if erased > 0 {
            SectorState::Used
        } else if reserved + used + moving + old == item_count && old > 0 {
            // Covers both "some pages still live" (DIRTY) and "every page
            // OLD" -- the source names the latter a distinct sector state
            // but never gives it an on-media code, so it folds in here.
            SectorState::Dirty
        } else {
            SectorState::Full
        };

        let old_code = self.read_sector_header(sector)?.state;
        let new_code = new_state.code();
        if new_code != old_code && new_code & old_code != new_code {
            return Err(Error::BadGeometry);
        }

        let addr = self.header_addr(sector) + 4;
        self.write_region(addr, &[new_code])
    }
}
