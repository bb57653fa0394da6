use crate::abi::{GameInfo, SystemInfo, region};
use crate::error::LoadError;
use std::ffi::{CStr, CString, c_char, c_uint};
use std::fs;
use std::path::Path;

/// What a core says about itself (`retro_get_system_info`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoreInfo {
    pub library_name: String,
    pub library_version: String,
    /// Lower-case extensions without the dot, e.g. `["sfc", "smc"]`.
    pub valid_extensions: Vec<String>,
    /// The core wants the content path only and reads the file itself.
    pub need_fullpath: bool,
    /// The core cannot load content from inside an archive.
    pub block_extract: bool,
}

impl CoreInfo {
    pub(crate) fn from_raw(raw: &SystemInfo) -> Self {
        let valid_extensions = lossy(raw.valid_extensions)
            .split('|')
            .filter(|ext| !ext.is_empty())
            .map(str::to_ascii_lowercase)
            .collect();
        Self {
            library_name: lossy(raw.library_name),
            library_version: lossy(raw.library_version),
            valid_extensions,
            need_fullpath: raw.need_fullpath,
            block_extract: raw.block_extract,
        }
    }

    /// Whether `path` has one of the core's declared extensions.
    pub fn supports(&self, path: &Path) -> bool {
        let Some(ext) = path.extension().map(|e| e.to_string_lossy().to_ascii_lowercase()) else {
            return false;
        };
        self.valid_extensions.iter().any(|valid| *valid == ext)
    }
}

fn lossy(ptr: *const c_char) -> String {
    if ptr.is_null() {
        return String::new();
    }
    // SAFETY: the core returns NUL-terminated static strings.
    unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned()
}

/// Video standard reported by `retro_get_region`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Region {
    Ntsc,
    Pal,
}

impl Region {
    pub fn from_raw(raw: c_uint) -> Option<Self> {
        match raw {
            region::NTSC => Some(Region::Ntsc),
            region::PAL => Some(Region::Pal),
            _ => None,
        }
    }
}

/// Content kept alive for as long as the core has it loaded.
pub(crate) struct Content {
    path: CString,
    data: Vec<u8>,
}

impl Content {
    /// Read `path`, or only validate it when the core reads the file itself.
    pub(crate) fn read(path: &Path, need_fullpath: bool) -> Result<Self, LoadError> {
        let meta = fs::metadata(path).map_err(|e| LoadError::from_content_io(&e))?;
        if !meta.is_file() {
            return Err(LoadError::GameUnknown(format!(
                "{} is not a regular file",
                path.display()
            )));
        }

        let data = if need_fullpath {
            Vec::new()
        } else {
            fs::read(path).map_err(|e| LoadError::from_content_io(&e))?
        };

        let path = CString::new(path.to_string_lossy().as_bytes()).map_err(|_| {
            LoadError::GameLoad(format!("{} cannot be passed to the core", path.display()))
        })?;
        Ok(Self { path, data })
    }

    pub(crate) fn len(&self) -> usize {
        self.data.len()
    }

    pub(crate) fn game_info(&self) -> GameInfo {
        GameInfo {
            path: self.path.as_ptr(),
            data: if self.data.is_empty() {
                std::ptr::null()
            } else {
                self.data.as_ptr().cast()
            },
            size: self.data.len(),
            meta: std::ptr::null(),
        }
    }
}
