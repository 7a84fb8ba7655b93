//! Error kinds for SFFS operations.
//!
//! Kept as a hand-rolled enum wrapping the flash device's own error, the way
//! `boot::image::Error<E>` wraps its flash error type, rather than reaching
//! for an error-derive crate the teacher never used.

use storage::Error as FlashError;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Error {
    /// The flash adaptor reported a failure (I/O failure, alignment, etc).
    Flash(FlashError),
    /// Sector or master-page magic did not match, or the computed geometry
    /// is impossible (unformatted or corrupt medium).
    BadGeometry,
    /// No erased page is available and no sector is reclaimable.
    MediumFull,
    /// Programmer error: bad file_id, read before mount, etc.
    InvalidArgument,
}

impl From<FlashError> for Error {
    fn from(e: FlashError) -> Self {
        Error::Flash(e)
    }
}

pub type Result<T> = core::result::Result<T, Error>;
