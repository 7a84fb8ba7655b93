//! Page index: `(file_id, block) -> physical page` lookup and the
//! erased-page allocator.

use crate::error::Result;
use crate::fs::Sffs;
use crate::layout::{PageState, SectorState};
use storage::FlashDevice;

impl<F: FlashDevice> Sffs<F> {
    /// Resolve `(file_id, block)` to its current physical page, if any.
    ///
    /// Scans every sector and page -- a `USED` hit is authoritative
    /// regardless of where in scan order it turns up relative to a `MOVING`
    /// duplicate, since reclamation can relocate the committed copy into an
    /// earlier sector than the stale original it superseded. Whenever both
    /// a `USED` and a `MOVING` page are found for the same key, the `MOVING`
    /// twin is stale (the crash-recovery case described in the write path)
    /// and is retired to `OLD` in passing; the `USED` page wins.
    pub(crate) fn find_page(&mut self, file_id: u16, block: u16) -> Result<Option<(usize, usize)>> {
        let mut used_hit: Option<(usize, usize)> = None;
        let mut moving_hit: Option<(usize, usize)> = None;

        'scan: for sector in 0..self.sector_count {
            for idx in 0..self.data_pages_per_sector {
                let item = self.get_page_metadata(sector, idx)?;
                if item.file_id != file_id || item.block != block {
                    continue;
                }
                match PageState::from_code(item.state) {
                    Some(PageState::Used) if used_hit.is_none() => {
                        used_hit = Some((sector, idx));
                    }
                    Some(PageState::Moving) if moving_hit.is_none() => {
                        moving_hit = Some((sector, idx));
                    }
                    _ => {}
                }
                if used_hit.is_some() && moving_hit.is_some() {
                    break 'scan;
                }
            }
        }

        if let Some((u_sector, u_idx)) = used_hit {
            if let Some((m_sector, m_idx)) = moving_hit {
                self.set_page_state(m_sector, m_idx, PageState::Old)?;
            }
            return Ok(Some((u_sector, u_idx)));
        }

        Ok(moving_hit)
    }

    /// First-fit search for an `ERASED` data page, skipping sectors that
    /// cannot offer one (`FULL`, `DIRTY`).
    pub(crate) fn find_erased_page(&mut self) -> Result<Option<(usize, usize)>> {
        for sector in 0..self.sector_count {
            let header = self.read_sector_header(sector)?;
            if matches!(
                SectorState::from_code(header.state),
                Some(SectorState::Full) | Some(SectorState::Dirty)
            ) {
                continue;
            }
            for idx in 0..self.data_pages_per_sector {
                let item = self.get_page_metadata(sector, idx)?;
                if PageState::from_code(item.state) == Some(PageState::Erased) {
                    return Ok(Some((sector, idx)));
                }
            }
        }
        Ok(None)
    }
}
