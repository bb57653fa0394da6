//! Error types for retrohost-core.

use std::io;
use thiserror::Error;

/// Why a core or its content could not be brought up.
///
/// Carried by [`StateChange::Error`](crate::StateChange::Error); never returned from a public
/// method directly. Payloads are strings so the value stays `Clone` for notification fan-out.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    /// The file exists but could not be loaded: wrong architecture, corrupt, missing a
    /// mandatory entry point, or an unsupported API version.
    #[error("unable to load core: {0}")]
    CoreLoad(String),

    /// The file is not a shared library at all.
    #[error("core is not a shared library")]
    CoreNotLibrary,

    #[error("core not found")]
    CoreNotFound,

    #[error("access to core denied")]
    CoreAccessDenied,

    /// Some other filesystem error (I/O error, volume dismounted, network resource gone).
    #[error("filesystem error while loading core: {0}")]
    CoreUnknown(String),

    #[error("content not found")]
    GameNotFound,

    #[error("access to content denied")]
    GameAccessDenied,

    #[error("filesystem error while loading content: {0}")]
    GameUnknown(String),

    /// The content could not be handed to the core, or the core rejected it.
    #[error("unable to load content: {0}")]
    GameLoad(String),

    /// The core refused a serialized state.
    #[error("core rejected serialized state")]
    StateRejected,
}

impl LoadError {
    /// Classify a filesystem error raised while reading content.
    pub fn from_content_io(err: &io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => LoadError::GameNotFound,
            io::ErrorKind::PermissionDenied => LoadError::GameAccessDenied,
            _ => LoadError::GameUnknown(err.to_string()),
        }
    }

    /// Whether the error belongs to the core-load family.
    pub fn is_core_error(&self) -> bool {
        matches!(
            self,
            LoadError::CoreLoad(_)
                | LoadError::CoreNotLibrary
                | LoadError::CoreNotFound
                | LoadError::CoreAccessDenied
                | LoadError::CoreUnknown(_)
        )
    }
}

/// Contract violations reported synchronously by [`Adapter`](crate::Adapter) methods.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AdapterError {
    /// Another adapter is bound to the process-wide callback context.
    #[error("another adapter is already running a core in this process")]
    ContextOccupied,

    /// A frame run is in progress; loads and nested runs must wait for it to return.
    #[error("a frame is currently being run")]
    FrameInFlight,

    /// Content or a core control was requested before any core was loaded.
    #[error("no core is loaded")]
    NoCoreLoaded,

    /// The operation needs a different lifecycle state.
    #[error("operation requires state {expected:?}, adapter is {actual:?}")]
    WrongState {
        expected: crate::AdapterState,
        actual: crate::AdapterState,
    },
}

/// Errors from SRAM persistence.
#[derive(Error, Debug)]
pub enum SramError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The file on disk does not match the size of the core's region.
    #[error("save file is {file} bytes, core region is {region} bytes")]
    SizeMismatch { file: usize, region: usize },
}
