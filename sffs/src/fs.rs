//! Filesystem instance: geometry derivation, region I/O, format and mount.

use alloc::vec::Vec;
use defmt_or_log::{debug, info, warn};

use crate::error::{Error, Result};
use crate::layout::{self, MasterPage, MetadataItem, PageState, SectorHeader, SectorState};
use storage::FlashDevice;

/// A mounted (or freshly formatted) filesystem bound to one flash device.
///
/// All state lives here, passed by `&mut self` to every operation, rather
/// than in file-scope globals the way the source's test harness did it.
pub struct Sffs<F: FlashDevice> {
    pub(crate) flash: F,
    pub(crate) page_size: usize,
    pub(crate) sector_size: usize,
    pub(crate) sector_count: usize,
    pub(crate) data_pages_per_sector: usize,
    pub(crate) first_data_page: usize,
}

impl<F: FlashDevice> Sffs<F> {
    fn derive_geometry(flash: &F) -> (usize, usize, usize, usize, usize) {
        let info = flash.info();
        let page_size = info.page_size;
        let sector_size = info.sector_size;
        let sector_count = info.capacity / sector_size;
        let pages_per_sector = sector_size / page_size;
        let data_pages_per_sector =
            (sector_size - layout::SECTOR_HEADER_SIZE) / (layout::METADATA_ITEM_SIZE + page_size);
        let first_data_page = pages_per_sector - data_pages_per_sector;
        (page_size, sector_size, sector_count, data_pages_per_sector, first_data_page)
    }

    fn dim_to_code(dim: usize) -> Result<u8> {
        if dim == 0 || !dim.is_power_of_two() {
            return Err(Error::BadGeometry);
        }
        Ok(dim.trailing_zeros() as u8)
    }

    fn code_to_dim(code: u8) -> usize {
        1usize << code
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn sector_size(&self) -> usize {
        self.sector_size
    }

    pub fn sector_count(&self) -> usize {
        self.sector_count
    }

    pub fn data_pages_per_sector(&self) -> usize {
        self.data_pages_per_sector
    }

    /// Reclaim the underlying flash device, e.g. to inspect or reuse its
    /// raw contents outside the filesystem.
    pub fn into_device(self) -> F {
        self.flash
    }

    pub(crate) fn sector_addr(&self, sector: usize) -> usize {
        sector * self.sector_size
    }

    pub(crate) fn header_addr(&self, sector: usize) -> usize {
        self.sector_addr(sector)
    }

    pub(crate) fn item_addr(&self, sector: usize, idx: usize) -> usize {
        self.sector_addr(sector) + layout::SECTOR_HEADER_SIZE + idx * layout::METADATA_ITEM_SIZE
    }

    pub(crate) fn data_page_addr(&self, sector: usize, idx: usize) -> usize {
        self.sector_addr(sector) + self.first_data_page * self.page_size + idx * self.page_size
    }

    /// Read `buf.len()` bytes starting at `addr`, splitting the access at
    /// physical page boundaries as the flash adaptor requires.
    pub(crate) fn read_region(&mut self, mut addr: usize, buf: &mut [u8]) -> Result<()> {
        let mut done = 0usize;
        while done < buf.len() {
            let page_off = addr % self.page_size;
            let chunk = (self.page_size - page_off).min(buf.len() - done);
            self.flash.page_read(addr, &mut buf[done..done + chunk])?;
            addr += chunk;
            done += chunk;
        }
        Ok(())
    }

    /// Write `data` starting at `addr`, one physical page at a time.
    pub(crate) fn write_region(&mut self, mut addr: usize, data: &[u8]) -> Result<()> {
        let mut done = 0usize;
        while done < data.len() {
            let page_off = addr % self.page_size;
            let chunk = (self.page_size - page_off).min(data.len() - done);
            self.flash.page_write(addr, &data[done..done + chunk])?;
            addr += chunk;
            done += chunk;
        }
        Ok(())
    }

    /// Retire any `RESERVED` page left behind by a write interrupted between
    /// allocation and commit. Forward-safe: `RESERVED -> OLD` only clears
    /// bits (see the layout module's refinement chain).
    pub(crate) fn recover_orphans(&mut self) -> Result<()> {
        let mut recovered = 0u32;
        for sector in 0..self.sector_count {
            for idx in 0..self.data_pages_per_sector {
                let item = self.get_page_metadata(sector, idx)?;
                if PageState::from_code(item.state) == Some(PageState::Reserved) {
                    self.set_page_state(sector, idx, PageState::Old)?;
                    recovered += 1;
                }
            }
        }
        if recovered > 0 {
            warn!("mount: retired {} orphaned RESERVED page(s)", recovered);
        }
        Ok(())
    }

    /// Initialize every sector header and item table, then place the master
    /// page at `(file_id=0, block=0)` through the ordinary write path.
    pub fn format(flash: F) -> Result<Sffs<F>> {
        let (page_size, sector_size, sector_count, data_pages_per_sector, first_data_page) =
            Self::derive_geometry(&flash);
        if data_pages_per_sector == 0 {
            return Err(Error::BadGeometry);
        }

        let mut fs = Sffs {
            flash,
            page_size,
            sector_size,
            sector_count,
            data_pages_per_sector,
            first_data_page,
        };

        for sector in 0..sector_count {
            let header = SectorHeader {
                magic: layout::METADATA_MAGIC,
                state: SectorState::Erased.code(),
                metadata_page_count: first_data_page as u8,
                metadata_item_count: data_pages_per_sector as u8,
                reserved: 0xFF,
            };
            let mut buf = [0u8; layout::SECTOR_HEADER_SIZE];
            header.encode(&mut buf);
            fs.write_region(fs.header_addr(sector), &buf)?;

            let item = MetadataItem::unassigned();
            let mut item_buf = [0u8; layout::METADATA_ITEM_SIZE];
            item.encode(&mut item_buf);
            for idx in 0..data_pages_per_sector {
                fs.write_region(fs.item_addr(sector, idx), &item_buf)?;
            }
        }

        let master = MasterPage {
            magic: layout::MASTER_MAGIC,
            page_size: Self::dim_to_code(page_size)?,
            sector_size: Self::dim_to_code(sector_size)?,
            sector_count: sector_count as u16,
            label: *b"sffs0001",
        };
        let mut master_buf = [0u8; layout::MASTER_PAGE_SIZE];
        master.encode(&mut master_buf);
        fs.write_logical(layout::MASTER_FILE_ID, 0, &master_buf)?;

        info!(
            "formatted {} sectors, {} data pages/sector",
            sector_count, data_pages_per_sector
        );
        Ok(fs)
    }

    /// Derive geometry from the device, clean up orphaned `RESERVED` pages,
    /// and validate the master page.
    pub fn mount(flash: F) -> Result<Sffs<F>> {
        let (page_size, sector_size, sector_count, data_pages_per_sector, first_data_page) =
            Self::derive_geometry(&flash);
        if data_pages_per_sector == 0 {
            return Err(Error::BadGeometry);
        }

        let mut fs = Sffs {
            flash,
            page_size,
            sector_size,
            sector_count,
            data_pages_per_sector,
            first_data_page,
        };

        fs.recover_orphans()?;

        let (sector, idx) = fs.find_page(layout::MASTER_FILE_ID, 0)?.ok_or_else(|| {
            warn!("mount: no master page found, medium is unformatted or corrupt");
            Error::BadGeometry
        })?;
        let mut master_buf = [0u8; layout::MASTER_PAGE_SIZE];
        fs.read_region(fs.data_page_addr(sector, idx), &mut master_buf)?;
        let master = MasterPage::decode(&master_buf);

        if master.magic != layout::MASTER_MAGIC {
            warn!("mount: master page magic mismatch");
            return Err(Error::BadGeometry);
        }
        if Self::code_to_dim(master.page_size) != page_size
            || Self::code_to_dim(master.sector_size) != sector_size
        {
            warn!("mount: master page geometry does not match the device");
            return Err(Error::BadGeometry);
        }
        if master.sector_count as usize != sector_count {
            warn!("mount: master page sector count does not match the device");
            return Err(Error::BadGeometry);
        }

        debug!("mounted {} sectors", sector_count);
        Ok(fs)
    }

    pub fn file_size(&mut self, file_id: u16) -> Result<u32> {
        let mut max_end: u32 = 0;
        for sector in 0..self.sector_count {
            for idx in 0..self.data_pages_per_sector {
                let item = self.get_page_metadata(sector, idx)?;
                if item.file_id != file_id {
                    continue;
                }
                if matches!(
                    PageState::from_code(item.state),
                    Some(PageState::Used) | Some(PageState::Moving)
                ) {
                    let end = item.block as u32 * self.page_size as u32 + item.size as u32;
                    max_end = max_end.max(end);
                }
            }
        }
        Ok(max_end)
    }

    /// Every data-page item's `(file_id, block, state)`, for diagnostics and
    /// invariant checks; not needed by normal filesystem operation.
    pub fn scan_items(&mut self) -> Result<Vec<(u16, u16, u8)>> {
        let mut items = Vec::new();
        for sector in 0..self.sector_count {
            for idx in 0..self.data_pages_per_sector {
                let item = self.get_page_metadata(sector, idx)?;
                items.push((item.file_id, item.block, item.state));
            }
        }
        Ok(items)
    }

    pub fn file_remove(&mut self, file_id: u16) -> Result<()> {
        for sector in 0..self.sector_count {
            for idx in 0..self.data_pages_per_sector {
                let item = self.get_page_metadata(sector, idx)?;
                if item.file_id != file_id {
                    continue;
                }
                if matches!(
                    PageState::from_code(item.state),
                    Some(PageState::Used) | Some(PageState::Moving)
                ) {
                    self.set_page_state(sector, idx, PageState::Old)?;
                }
            }
        }
        Ok(())
    }
}
