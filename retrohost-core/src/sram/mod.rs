//! Battery-backed memory persistence.
//!
//! The core owns its save RAM; the host only copies it. Each supported region is stored as one
//! flat file per content, named after the content's file stem, with no header:
//! - `<save dir>/<stem>.srm` for save RAM
//! - `<save dir>/<stem>.rtc` for real-time clock state
//!
//! A region the core reports as zero-sized (or null) is unsupported and skipped.

use crate::abi::memory;
use crate::error::SramError;
use std::ffi::c_uint;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Access to a core's memory regions.
pub trait MemoryRegions {
    /// The region `id`, or `None` when the core does not expose it.
    fn region(&mut self, id: c_uint) -> Option<&mut [u8]>;
}

/// Persisted regions and their file extensions.
pub const REGIONS: [(c_uint, &str); 2] = [(memory::SAVE_RAM, "srm"), (memory::RTC, "rtc")];

/// What happened to one region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SramOutcome {
    /// Copied; the value is the number of bytes.
    Copied(usize),
    /// The core does not expose this region.
    Unsupported,
    /// Loading only: there is no file yet.
    NoFile,
}

/// Save files for one piece of content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SramStore {
    directory: PathBuf,
    stem: String,
}

impl SramStore {
    /// Save files for `content` inside `directory`.
    pub fn for_content(directory: impl Into<PathBuf>, content: &Path) -> Self {
        let stem = content
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "content".to_owned());
        Self {
            directory: directory.into(),
            stem,
        }
    }

    /// Path of the file backing a region with extension `ext`.
    pub fn path_for(&self, ext: &str) -> PathBuf {
        self.directory.join(format!("{}.{ext}", self.stem))
    }

    /// Write one region to disk.
    pub fn save_region(
        &self,
        regions: &mut dyn MemoryRegions,
        id: c_uint,
        ext: &str,
    ) -> Result<SramOutcome, SramError> {
        let Some(data) = regions.region(id) else {
            return Ok(SramOutcome::Unsupported);
        };
        fs::create_dir_all(&self.directory)?;
        let path = self.path_for(ext);
        fs::write(&path, &*data)?;
        log::debug!("saved {} bytes to {}", data.len(), path.display());
        Ok(SramOutcome::Copied(data.len()))
    }

    /// Read one region back into the core.
    ///
    /// The file must be exactly the size of the region; on mismatch the core's memory is left
    /// untouched.
    pub fn load_region(
        &self,
        regions: &mut dyn MemoryRegions,
        id: c_uint,
        ext: &str,
    ) -> Result<SramOutcome, SramError> {
        let Some(dest) = regions.region(id) else {
            return Ok(SramOutcome::Unsupported);
        };
        let path = self.path_for(ext);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(SramOutcome::NoFile),
            Err(e) => return Err(e.into()),
        };
        if bytes.len() != dest.len() {
            return Err(SramError::SizeMismatch {
                file: bytes.len(),
                region: dest.len(),
            });
        }
        dest.copy_from_slice(&bytes);
        log::debug!("restored {} bytes from {}", bytes.len(), path.display());
        Ok(SramOutcome::Copied(bytes.len()))
    }

    /// Save every region, logging failures instead of stopping at the first.
    pub fn save_all(&self, regions: &mut dyn MemoryRegions) -> usize {
        let mut saved = 0;
        for (id, ext) in REGIONS {
            match self.save_region(regions, id, ext) {
                Ok(SramOutcome::Copied(_)) => saved += 1,
                Ok(_) => {}
                Err(e) => log::warn!("failed to save {}: {e}", self.path_for(ext).display()),
            }
        }
        saved
    }

    /// Load every region, logging and skipping mismatches and I/O failures.
    pub fn load_all(&self, regions: &mut dyn MemoryRegions) -> usize {
        let mut loaded = 0;
        for (id, ext) in REGIONS {
            match self.load_region(regions, id, ext) {
                Ok(SramOutcome::Copied(_)) => loaded += 1,
                Ok(_) => {}
                Err(e) => log::warn!("skipping {}: {e}", self.path_for(ext).display()),
            }
        }
        loaded
    }
}
