//! The write path: stage, merge, allocate, precommit, write, commit, retire.

use alloc::vec;
use defmt_or_log::{debug, warn};

use crate::error::{Error, Result};
use crate::fs::Sffs;
use crate::layout::{self, MetadataItem, PageState, SectorHeader, SectorState};
use storage::FlashDevice;

impl<F: FlashDevice> Sffs<F> {
    /// Write `buf` at logical `pos` for `file_id`, iterating over every
    /// page-sized logical block the write touches.
    pub(crate) fn write_logical(&mut self, file_id: u16, pos: u32, buf: &[u8]) -> Result<()> {
        if buf.is_empty() {
            return Ok(());
        }

        let page_size = self.page_size as u32;
        let len = buf.len() as u32;
        let b_start = pos / page_size;
        let b_end = (pos + len - 1) / page_size;

        for block in b_start..=b_end {
            // Step 1: stage. Load the existing page, or start from a
            // background of zeros -- not 0xFF, since these bytes are what
            // will actually land on the new page and zero reads as
            // "unwritten" rather than "erased, ignore me".
            let mut scratch = vec![0u8; self.page_size];
            let mut used = 0u16;
            if let Some((sector, idx)) = self.find_page(file_id, block as u16)? {
                let item = self.get_page_metadata(sector, idx)?;
                self.read_region(self.data_page_addr(sector, idx), &mut scratch)?;
                used = item.size;
            }

            // Step 2: merge the overlap of [pos, pos+len) with this block.
            let block_start = block * page_size;
            let block_end = block_start + page_size - 1;
            let data_start = pos.max(block_start);
            let data_end = (pos + len - 1).min(block_end);
            let src_off = (data_start - pos) as usize;
            let dst_off = (data_start % page_size) as usize;
            let n = (data_end - data_start + 1) as usize;
            scratch[dst_off..dst_off + n].copy_from_slice(&buf[src_off..src_off + n]);

            let new_used = ((dst_off + n) as u16).max(used);
            self.commit_block(file_id, block as u16, &scratch, new_used)?;
        }

        Ok(())
    }

    /// Steps 3-7: allocate a target page, precommit both ends of the
    /// transition, write the data, commit the new item, then retire the
    /// page it replaced. Every step is a single 1->0 write, so a crash at
    /// any point leaves the medium in a recoverable state.
    pub(crate) fn commit_block(
        &mut self,
        file_id: u16,
        block: u16,
        scratch: &[u8],
        used_size: u16,
    ) -> Result<()> {
        let old = self.find_page(file_id, block)?;

        let target = match self.find_erased_page()? {
            Some(loc) => loc,
            None => {
                debug!("no erased page free, reclaiming before write");
                self.reclaim()?;
                self.find_erased_page()?.ok_or_else(|| {
                    warn!("medium full: no erased page after reclamation");
                    Error::MediumFull
                })?
            }
        };

        if let Some((old_sector, old_idx)) = old {
            self.set_page_state(old_sector, old_idx, PageState::Moving)?;
        }
        self.set_page_state(target.0, target.1, PageState::Reserved)?;

        self.write_region(self.data_page_addr(target.0, target.1), scratch)?;

        let item = MetadataItem {
            file_id,
            block,
            state: PageState::Used.code(),
            size: used_size,
            reserved: 0xFF,
        };
        self.set_page_metadata(target.0, target.1, &item)?;

        if let Some((old_sector, old_idx)) = old {
            self.set_page_state(old_sector, old_idx, PageState::Old)?;
        }

        Ok(())
    }

    /// Relocate the exact page at `(src_sector, src_idx)` to a fresh
    /// erased page, preserving its `(file_id, block)` key.
    ///
    /// Unlike `commit_block`, this never re-resolves "old" through
    /// `find_page`: the caller already knows precisely which page is being
    /// superseded, and a fresh index lookup could resolve to a different
    /// page of the same key that is more current than this one (e.g. a
    /// stale `MOVING` twin being reclaimed while the authoritative `USED`
    /// copy lives elsewhere) -- relocating that other page's data here,
    /// then retiring it, would silently revert the file to stale content.
    fn relocate_page(
        &mut self,
        file_id: u16,
        block: u16,
        src_sector: usize,
        src_idx: usize,
        scratch: &[u8],
        used_size: u16,
    ) -> Result<()> {
        let target = self.find_erased_page()?.ok_or(Error::MediumFull)?;

        self.set_page_state(src_sector, src_idx, PageState::Moving)?;
        self.set_page_state(target.0, target.1, PageState::Reserved)?;

        self.write_region(self.data_page_addr(target.0, target.1), scratch)?;

        let item = MetadataItem {
            file_id,
            block,
            state: PageState::Used.code(),
            size: used_size,
            reserved: 0xFF,
        };
        self.set_page_metadata(target.0, target.1, &item)?;

        self.set_page_state(src_sector, src_idx, PageState::Old)?;

        Ok(())
    }

    /// Reclaim the first `DIRTY` sector found, if any. A no-op if none
    /// exists; callers that still have no erased page after this report
    /// `MediumFull`.
    pub(crate) fn reclaim(&mut self) -> Result<()> {
        for sector in 0..self.sector_count {
            let header = self.read_sector_header(sector)?;
            if SectorState::from_code(header.state) == Some(SectorState::Dirty) {
                debug!("reclaiming sector {}", sector);
                self.reclaim_sector(sector)?;
                return Ok(());
            }
        }
        Ok(())
    }

    fn reclaim_sector(&mut self, sector: usize) -> Result<()> {
        for idx in 0..self.data_pages_per_sector {
            let item = self.get_page_metadata(sector, idx)?;
            match PageState::from_code(item.state) {
                Some(PageState::Old) | Some(PageState::Erased) => {}
                Some(PageState::Reserved) => {
                    // Orphaned half-write: no committed file_id/block to
                    // relocate, just retire it.
                    self.set_page_state(sector, idx, PageState::Old)?;
                }
                Some(PageState::Used) | Some(PageState::Moving) => {
                    // A USED page found here can still have a stale MOVING
                    // twin (or vice versa) left by a crash elsewhere on the
                    // medium. Resolve the key through the index first: if
                    // this exact page isn't the authoritative copy, it was
                    // the stale twin and find_page has just retired it to
                    // OLD as a side effect, so there is nothing left to
                    // relocate.
                    if self.find_page(item.file_id, item.block)? != Some((sector, idx)) {
                        continue;
                    }
                    let mut scratch = vec![0u8; self.page_size];
                    self.read_region(self.data_page_addr(sector, idx), &mut scratch)?;
                    self.relocate_page(item.file_id, item.block, sector, idx, &scratch, item.size)?;
                }
                None => return Err(Error::BadGeometry),
            }
        }

        self.flash.sector_erase(self.sector_addr(sector))?;

        let header = SectorHeader {
            magic: layout::METADATA_MAGIC,
            state: SectorState::Erased.code(),
            metadata_page_count: self.first_data_page as u8,
            metadata_item_count: self.data_pages_per_sector as u8,
            reserved: 0xFF,
        };
        let mut buf = [0u8; layout::SECTOR_HEADER_SIZE];
        header.encode(&mut buf);
        self.write_region(self.header_addr(sector), &buf)?;

        let item = MetadataItem::unassigned();
        let mut item_buf = [0u8; layout::METADATA_ITEM_SIZE];
        item.encode(&mut item_buf);
        for idx in 0..self.data_pages_per_sector {
            self.write_region(self.item_addr(sector, idx), &item_buf)?;
        }

        Ok(())
    }
}
