//! The process-wide callback context.
//!
//! libretro callbacks are plain C functions with no user-data argument, so the bridge cannot be
//! told which adapter a call belongs to. This module owns the single slot that answers that
//! question: the [`Session`] of the adapter currently driving a core.
//!
//! Model:
//! - An adapter claims the slot when it starts loading a core and releases it on unload or
//!   teardown. Claiming an occupied slot fails; nothing is ever silently aliased.
//! - The session lives *inside* the slot. The bridge reaches it with [`with_active`], the owning
//!   adapter with [`with_session`]. Both lock the slot only for the duration of the closure, and
//!   the adapter never holds the lock while calling into the core (the core would call back and
//!   deadlock).
//! - A separate flag tracks whether a frame is in flight so loads and nested runs are refused.

use crate::abi::PixelFormat;
use crate::av::{AudioStream, VideoStream};
use crate::config::AdapterConfig;
use crate::error::AdapterError;
use crate::input::{InputBinding, InputProvider, NoInput};
use crate::variables::VariableStore;
use std::collections::HashMap;
use std::ffi::CString;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

/// Identifies the adapter owning a session.
pub type SessionId = u64;

lazy_static::lazy_static! {
    static ref CONTEXT: Mutex<Option<Session>> = Mutex::new(None);
}

static FRAME_IN_FLIGHT: AtomicBool = AtomicBool::new(false);
static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Allocate an id for a new adapter.
pub fn next_session_id() -> SessionId {
    NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed)
}

/// Host-side state the callbacks operate on.
pub struct Session {
    pub id: SessionId,

    pub audio: AudioStream,
    pub video: VideoStream,
    pub variables: VariableStore,

    pub input: Box<dyn InputProvider>,
    pub input_bindings: Vec<InputBinding>,

    /// Directories and paths handed to the core. They must outlive any pointer given out, so
    /// they are kept here as C strings for the whole session.
    pub system_directory: CString,
    pub save_directory: CString,
    pub core_path: CString,

    /// Option values handed out through `GET_VARIABLE`, kept alive until the next query of the
    /// same key.
    pub handed_out: HashMap<String, CString>,

    pub log_core_messages: bool,

    pub support_no_game: bool,
    pub hw_render_requested: bool,
    pub shutdown_requested: bool,
}

impl Session {
    pub fn new(id: SessionId, config: &AdapterConfig, core_path: &Path) -> Self {
        Self {
            id,
            audio: AudioStream::new(),
            video: VideoStream::new(),
            variables: VariableStore::new(),
            input: Box::new(NoInput),
            input_bindings: Vec::new(),
            system_directory: path_to_cstring(&config.system_directory),
            save_directory: path_to_cstring(&config.save_directory),
            core_path: path_to_cstring(core_path),
            handed_out: HashMap::new(),
            log_core_messages: config.log_core_messages,
            support_no_game: false,
            hw_render_requested: false,
            shutdown_requested: false,
        }
    }

    pub fn pixel_format(&self) -> PixelFormat {
        self.video.pixel_format()
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("pixel_format", &self.pixel_format())
            .field("variables", &self.variables.len())
            .field("shutdown_requested", &self.shutdown_requested)
            .finish_non_exhaustive()
    }
}

// Interior NULs cannot be represented; such a path is handed over truncated at the NUL.
fn path_to_cstring(path: &Path) -> CString {
    let text = path.to_string_lossy();
    let bytes: Vec<u8> = text.bytes().take_while(|b| *b != 0).collect();
    CString::new(bytes).unwrap_or_default()
}

fn slot() -> std::sync::MutexGuard<'static, Option<Session>> {
    CONTEXT.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Bind `session` to the process-wide slot.
pub fn claim(session: Session) -> Result<(), AdapterError> {
    let mut slot = slot();
    match slot.as_ref() {
        Some(active) if active.id != session.id => Err(AdapterError::ContextOccupied),
        _ => {
            log::debug!("session {} bound to callback context", session.id);
            *slot = Some(session);
            Ok(())
        }
    }
}

/// Unbind the session owned by `id`, handing it back.
pub fn release(id: SessionId) -> Option<Session> {
    let mut slot = slot();
    if slot.as_ref().is_some_and(|s| s.id == id) {
        log::debug!("session {id} released callback context");
        slot.take()
    } else {
        None
    }
}

/// Whether `id` currently owns the slot.
pub fn is_bound(id: SessionId) -> bool {
    slot().as_ref().is_some_and(|s| s.id == id)
}

/// Whether any adapter owns the slot.
pub fn is_occupied() -> bool {
    slot().is_some()
}

/// Run `f` against the session owned by `id`. `None` if `id` is not bound.
pub fn with_session<R>(id: SessionId, f: impl FnOnce(&mut Session) -> R) -> Option<R> {
    let mut slot = slot();
    match slot.as_mut() {
        Some(session) if session.id == id => Some(f(session)),
        _ => None,
    }
}

/// Run `f` against whichever session is bound. Used by the C callbacks.
pub fn with_active<R>(f: impl FnOnce(&mut Session) -> R) -> Option<R> {
    slot().as_mut().map(f)
}

/// Marks a frame as running until dropped.
#[derive(Debug)]
pub struct FrameGuard(());

impl Drop for FrameGuard {
    fn drop(&mut self) {
        FRAME_IN_FLIGHT.store(false, Ordering::Release);
    }
}

/// Start a frame run. Fails if one is already running anywhere in the process.
pub fn begin_frame() -> Result<FrameGuard, AdapterError> {
    FRAME_IN_FLIGHT
        .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
        .map(|_| FrameGuard(()))
        .map_err(|_| AdapterError::FrameInFlight)
}

pub fn frame_in_flight() -> bool {
    FRAME_IN_FLIGHT.load(Ordering::Acquire)
}

/// Serializes tests that touch the process-wide slot.
#[cfg(test)]
pub(crate) fn test_lock() -> std::sync::MutexGuard<'static, ()> {
    static LOCK: Mutex<()> = Mutex::new(());
    LOCK.lock().unwrap_or_else(PoisonError::into_inner)
}
