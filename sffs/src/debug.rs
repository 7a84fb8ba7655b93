//! Textual dump of sector/page state, supplementing the spec's distilled
//! API with the debug view the original source's `sffs_debug_print`
//! provides.

use alloc::format;
use alloc::string::String;

use crate::error::Result;
use crate::fs::Sffs;
use crate::layout::{PageState, SectorState};
use storage::FlashDevice;

impl<F: FlashDevice> Sffs<F> {
    /// One line per sector: `NNNN [X]:` where `X` is the sector-state
    /// glyph, followed by one `[x]` per data page.
    pub fn debug_print(&mut self) -> Result<String> {
        let mut out = String::new();
        for sector in 0..self.sector_count {
            let header = self.read_sector_header(sector)?;
            let sector_glyph = SectorState::from_code(header.state)
                .map(SectorState::glyph)
                .unwrap_or('?');
            out.push_str(&format!("{sector:04} [{sector_glyph}]:"));

            for idx in 0..self.data_pages_per_sector {
                let item = self.get_page_metadata(sector, idx)?;
                let glyph = PageState::from_code(item.state)
                    .map(PageState::glyph)
                    .unwrap_or('?');
                out.push_str(&format!("[{glyph}]"));
            }
            out.push('\n');
        }
        Ok(out)
    }
}
