//! Small flash-aware file system.
//!
//! `sffs` is the on-media layout, allocation and wear-aware relocation
//! machinery that makes a writable, overwrite-capable, appendable file API
//! sit atop a NOR-flash-like medium: bits only clear in place, and only an
//! erase resets a whole sector back to ones. See [`Sffs`] for the entry
//! points (`format`/`mount`) and [`FileSession`] for per-file operations.

#![cfg_attr(not(any(feature = "std", test)), no_std)]

extern crate alloc;

mod debug;
pub mod error;
mod fs;
mod index;
pub mod layout;
mod metadata;
mod session;
mod write;

pub use error::{Error, Result};
pub use fs::Sffs;
pub use session::{FileSession, OpenMode};
