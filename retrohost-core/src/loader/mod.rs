//! Opening core modules.
//!
//! Responsibilities:
//! - Open a core file as a dynamic module (via `libloading`).
//! - Classify open failures so the adapter can report the right error subkind.
//! - Hand out raw symbol addresses by name; typing them is `crate::symbols`' job.
//!
//! The platform primitive sits behind [`ModuleLoader`] / [`CoreModule`] so a frontend (or a
//! test) can supply modules that do not come from disk.

use crate::error::LoadError;
use libloading::Library;
use std::ffi::c_void;
use std::io;
use std::path::Path;
use thiserror::Error;

/// Why a module could not be opened.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OpenFailure {
    #[error("file not found")]
    NotFound,

    #[error("access denied")]
    AccessDenied,

    /// The file exists but the platform refused to map it as a library.
    #[error("not a loadable library: {0}")]
    NotALibrary(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl From<OpenFailure> for LoadError {
    fn from(failure: OpenFailure) -> Self {
        match failure {
            OpenFailure::NotFound => LoadError::CoreNotFound,
            OpenFailure::AccessDenied => LoadError::CoreAccessDenied,
            OpenFailure::NotALibrary(_) => LoadError::CoreNotLibrary,
            OpenFailure::Io(msg) => LoadError::CoreUnknown(msg),
        }
    }
}

impl OpenFailure {
    fn from_io(err: &io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => OpenFailure::NotFound,
            io::ErrorKind::PermissionDenied => OpenFailure::AccessDenied,
            _ => OpenFailure::Io(err.to_string()),
        }
    }
}

/// An opened dynamic module.
///
/// Dropping the module unloads it; every address it handed out becomes dangling.
pub trait CoreModule: Send {
    /// Address of the exported symbol `name`, if present.
    fn symbol(&self, name: &str) -> Option<*const c_void>;
}

/// Opens core modules.
pub trait ModuleLoader: Send {
    fn open(&self, path: &Path) -> Result<Box<dyn CoreModule>, OpenFailure>;
}

/// Loader backed by the platform dynamic linker.
#[derive(Debug, Default, Clone, Copy)]
pub struct LibraryLoader;

impl ModuleLoader for LibraryLoader {
    fn open(&self, path: &Path) -> Result<Box<dyn CoreModule>, OpenFailure> {
        // The dynamic linker reports everything as an opaque string; stat first so missing and
        // unreadable files get their own classification.
        let meta = std::fs::metadata(path).map_err(|e| OpenFailure::from_io(&e))?;
        if !meta.is_file() {
            return Err(OpenFailure::NotALibrary(format!(
                "{} is not a regular file",
                path.display()
            )));
        }
        if let Err(e) = std::fs::File::open(path) {
            return Err(OpenFailure::from_io(&e));
        }

        // SAFETY: loading a dynamic library runs its initializers. The caller chose this path
        // as a libretro core and accepts that it executes arbitrary code.
        let library =
            unsafe { Library::new(path).map_err(|e| OpenFailure::NotALibrary(e.to_string()))? };

        log::debug!("opened core module {}", path.display());
        Ok(Box::new(LibraryModule { library }))
    }
}

/// A core opened through `libloading`.
pub struct LibraryModule {
    library: Library,
}

impl CoreModule for LibraryModule {
    fn symbol(&self, name: &str) -> Option<*const c_void> {
        // SAFETY: the symbol is only read as an address here. `crate::symbols` gives it a type,
        // and the address is never used after this module is dropped.
        unsafe {
            self.library
                .get::<unsafe extern "C" fn()>(name.as_bytes())
                .ok()
                .map(|sym| *sym as *const c_void)
        }
    }
}

impl std::fmt::Debug for LibraryModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LibraryModule").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_not_found() {
        let result = LibraryLoader.open(Path::new("/definitely/not/here/core.so"));
        assert!(matches!(result, Err(OpenFailure::NotFound)));
    }

    #[test]
    fn directory_is_not_a_library() {
        let dir = tempfile::tempdir().unwrap();
        let result = LibraryLoader.open(dir.path());
        assert!(matches!(result, Err(OpenFailure::NotALibrary(_))));
    }

    #[test]
    fn garbage_file_is_not_a_library() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.so");
        std::fs::write(&path, b"this is not an ELF, PE or Mach-O image").unwrap();

        let result = LibraryLoader.open(&path);
        assert!(matches!(result, Err(OpenFailure::NotALibrary(_))));
    }

    #[test]
    fn failures_map_onto_core_errors() {
        assert_eq!(LoadError::from(OpenFailure::NotFound), LoadError::CoreNotFound);
        assert_eq!(
            LoadError::from(OpenFailure::AccessDenied),
            LoadError::CoreAccessDenied
        );
        assert_eq!(
            LoadError::from(OpenFailure::NotALibrary("bad elf".into())),
            LoadError::CoreNotLibrary
        );
        assert!(matches!(
            LoadError::from(OpenFailure::Io("eio".into())),
            LoadError::CoreUnknown(_)
        ));
    }
}
