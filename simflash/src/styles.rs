//! Named device geometries.
//!
//! Real flash devices come in a handful of common geometries; rather than
//! pick one arbitrarily, tests can exercise `sffs` against the same spread
//! of shapes. Mirrors the teacher's `AreaLayout`/`ALL_FLASHES` pattern, but
//! parameterized on the page/sector/block geometry SFFS actually cares
//! about instead of NOR write/erase sizes.

use crate::SimFlash;

/// The geometry of one device.
#[derive(Debug, Clone, Copy)]
pub struct DeviceLayout {
    pub page_size: usize,
    pub sector_size: usize,
    pub block_size: usize,
    pub sector_count: usize,
}

impl DeviceLayout {
    pub fn capacity(&self) -> usize {
        self.sector_size * self.sector_count
    }

    pub fn build(&self) -> SimFlash {
        SimFlash::new(self.page_size, self.sector_size, self.block_size, self.capacity())
    }
}

/// The geometry used throughout `spec.md`'s worked examples: 256-byte pages,
/// 4 KiB sectors, an 8-sector (32 KiB) device.
pub static REFERENCE: DeviceLayout = DeviceLayout {
    page_size: 256,
    sector_size: 4096,
    block_size: 4096,
    sector_count: 8,
};

/// A larger device, useful for randomized multi-file tests.
pub static LARGE: DeviceLayout = DeviceLayout {
    page_size: 256,
    sector_size: 4096,
    block_size: 65536,
    sector_count: 64,
};

/// A device with few, very small sectors: stresses reclamation and
/// medium-full handling quickly.
pub static TINY: DeviceLayout = DeviceLayout {
    page_size: 64,
    sector_size: 512,
    block_size: 512,
    sector_count: 4,
};

pub static ALL_LAYOUTS: [&DeviceLayout; 3] = [&REFERENCE, &LARGE, &TINY];

/// Build every named layout in turn.
pub fn all_devices() -> impl Iterator<Item = SimFlash> {
    ALL_LAYOUTS.iter().map(|l| l.build())
}
