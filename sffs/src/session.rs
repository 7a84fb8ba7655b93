//! File sessions: per-open position tracking and the read/write/seek API.

use alloc::vec;

use crate::error::{Error, Result};
use crate::fs::Sffs;
use crate::layout::PageState;
use storage::FlashDevice;

/// How a session was opened; governs the initial position and what happens
/// to the old content of the file at `close`.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum OpenMode {
    /// Start at offset 0; existing blocks not written are left alone.
    Read,
    /// Start at offset 0; on close, any of the file's old blocks beyond the
    /// highest offset actually written in this session are retired
    /// (truncate to the new length).
    Overwrite,
    /// Start at the file's current size; writes extend it.
    Append,
}

/// A bound, position-tracking handle onto one file.
pub struct FileSession<'a, F: FlashDevice> {
    fs: &'a mut Sffs<F>,
    file_id: u16,
    pos: u32,
    mode: OpenMode,
    high_water: u32,
}

impl<'a, F: FlashDevice> FileSession<'a, F> {
    /// `file_id` must be in `1..=0xFFFE`; 0 is reserved for the master page
    /// and `0xFFFF` means "unassigned" in metadata items.
    pub fn open(fs: &'a mut Sffs<F>, file_id: u16, mode: OpenMode) -> Result<FileSession<'a, F>> {
        if file_id == 0 || file_id == 0xFFFF {
            return Err(Error::InvalidArgument);
        }
        let pos = match mode {
            OpenMode::Read | OpenMode::Overwrite => 0,
            OpenMode::Append => fs.file_size(file_id)?,
        };
        Ok(FileSession {
            fs,
            file_id,
            pos,
            mode,
            high_water: pos,
        })
    }

    pub fn file_id(&self) -> u16 {
        self.file_id
    }

    pub fn pos(&self) -> u32 {
        self.pos
    }

    pub fn seek(&mut self, pos: u32) {
        self.pos = pos;
    }

    /// Read up to `buf.len()` bytes, per block via the page index. An
    /// absent page, or a page whose recorded size doesn't reach the
    /// requested offset, ends the read short of EOF.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let page_size = self.fs.page_size as u32;
        let mut n = 0usize;

        while n < buf.len() {
            let block = self.pos / page_size;
            let offset = (self.pos % page_size) as usize;

            let loc = match self.fs.find_page(self.file_id, block as u16)? {
                Some(loc) => loc,
                None => break,
            };
            let item = self.fs.get_page_metadata(loc.0, loc.1)?;
            let used = item.size as usize;
            if offset >= used {
                break;
            }

            let avail = used - offset;
            let want = (buf.len() - n).min(avail);
            let mut page_buf = vec![0u8; want];
            self.fs
                .read_region(self.fs.data_page_addr(loc.0, loc.1) + offset, &mut page_buf)?;
            buf[n..n + want].copy_from_slice(&page_buf);

            n += want;
            self.pos += want as u32;
        }

        Ok(n)
    }

    pub fn write(&mut self, buf: &[u8]) -> Result<()> {
        self.fs.write_logical(self.file_id, self.pos, buf)?;
        self.pos += buf.len() as u32;
        self.high_water = self.high_water.max(self.pos);
        Ok(())
    }

    /// Flush any deferred bookkeeping and detach. In `OVERWRITE` mode,
    /// retires every block of the file beyond the new high-water mark.
    pub fn close(self) -> Result<()> {
        if self.mode != OpenMode::Overwrite {
            return Ok(());
        }

        let last_kept_block = if self.high_water == 0 {
            None
        } else {
            Some((self.high_water - 1) / self.fs.page_size as u32)
        };

        for sector in 0..self.fs.sector_count {
            for idx in 0..self.fs.data_pages_per_sector {
                let item = self.fs.get_page_metadata(sector, idx)?;
                if item.file_id != self.file_id {
                    continue;
                }
                if !matches!(
                    PageState::from_code(item.state),
                    Some(PageState::Used) | Some(PageState::Moving)
                ) {
                    continue;
                }
                let beyond_eof = match last_kept_block {
                    None => true,
                    Some(last) => item.block as u32 > last,
                };
                if beyond_eof {
                    self.fs.set_page_state(sector, idx, PageState::Old)?;
                }
            }
        }

        Ok(())
    }
}
