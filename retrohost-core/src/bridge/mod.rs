//! C callbacks handed to the core.
//!
//! Every function here has the exact signature the libretro ABI expects and carries no
//! context; each one looks up the bound [`Session`](crate::state::Session) through
//! [`state::with_active`] and works on it. A callback arriving while nothing is bound (a core
//! calling back after unload, say) is logged and answered with a neutral value.
//!
//! None of these may panic: unwinding out of an `extern "C"` function aborts the process.

mod commands;

use crate::abi::{self, LogLevel};
use crate::state;
use crate::symbols::CoreSymbols;
use std::ffi::{CStr, c_char, c_int, c_uint, c_void};

pub(crate) use commands::dispatch;

/// Target used for records forwarded from the core's log interface.
pub const CORE_LOG_TARGET: &str = "retrohost::core";

/// `RETRO_HW_FRAME_BUFFER_VALID`: the frame was rendered into the hardware context.
const HW_FRAME_BUFFER_VALID: usize = usize::MAX;

/// Register the environment callback. Must precede `retro_init`.
pub fn install_environment(symbols: &CoreSymbols) {
    // SAFETY: the registration entry point comes from a fully resolved table, and the callback
    // has the signature the ABI prescribes.
    unsafe { (symbols.set_environment)(environment) };
}

/// Register the remaining mandatory callbacks.
pub fn install_callbacks(symbols: &CoreSymbols) {
    // SAFETY: as in `install_environment`.
    unsafe {
        (symbols.set_video_refresh)(video_refresh);
        (symbols.set_audio_sample)(audio_sample);
        (symbols.set_audio_sample_batch)(audio_sample_batch);
        (symbols.set_input_poll)(input_poll);
        (symbols.set_input_state)(input_state);
    }
}

/// `retro_environment_t`.
pub unsafe extern "C" fn environment(cmd: c_uint, data: *mut c_void) -> bool {
    // SAFETY: `data` is whatever the core passed for `cmd`; `dispatch` interprets it per the
    // command's documented payload.
    state::with_active(|session| unsafe { dispatch(session, cmd, data) }).unwrap_or_else(|| {
        log::warn!("environment command {cmd} arrived with no active session");
        false
    })
}

/// `retro_video_refresh_t`.
pub unsafe extern "C" fn video_refresh(
    data: *const c_void,
    width: c_uint,
    height: c_uint,
    pitch: usize,
) {
    // Null means "same as last frame"; the hardware marker means the frame never left the GPU.
    if data.is_null() || data as usize == HW_FRAME_BUFFER_VALID {
        return;
    }
    let len = (height as usize).saturating_mul(pitch);
    // SAFETY: the core guarantees `height` rows of `pitch` bytes at `data` for the duration of
    // the call. They are copied before returning.
    let frame = unsafe { std::slice::from_raw_parts(data.cast::<u8>(), len) };
    let pushed = state::with_active(|session| session.video.push_frame(frame, width, height, pitch));
    if pushed.is_none() {
        log::warn!("video frame arrived with no active session");
    }
}

/// `retro_audio_sample_t`.
pub unsafe extern "C" fn audio_sample(left: i16, right: i16) {
    state::with_active(|session| session.audio.push_sample(left, right));
}

/// `retro_audio_sample_batch_t`. Returns the number of stereo frames consumed.
pub unsafe extern "C" fn audio_sample_batch(data: *const i16, frames: usize) -> usize {
    if data.is_null() || frames == 0 {
        return 0;
    }
    // SAFETY: the core hands over `frames` interleaved stereo frames.
    let samples = unsafe { std::slice::from_raw_parts(data, frames.saturating_mul(2)) };
    state::with_active(|session| session.audio.push_interleaved(samples)).unwrap_or(0)
}

/// `retro_input_poll_t`.
pub unsafe extern "C" fn input_poll() {
    state::with_active(|session| session.input.poll());
}

/// `retro_input_state_t`.
pub unsafe extern "C" fn input_state(
    port: c_uint,
    device: c_uint,
    index: c_uint,
    id: c_uint,
) -> i16 {
    state::with_active(|session| session.input.state(port, device, index, id)).unwrap_or(0)
}

/// `retro_log_printf_t`, minus the variadic tail (see [`abi::LogFn`]).
pub unsafe extern "C" fn core_log(level: c_int, fmt: *const c_char) {
    if fmt.is_null() {
        return;
    }
    let enabled = state::with_active(|session| session.log_core_messages).unwrap_or(true);
    if !enabled {
        return;
    }
    // SAFETY: the core passes a NUL-terminated format string.
    let message = unsafe { CStr::from_ptr(fmt) }.to_string_lossy();
    log::log!(
        target: CORE_LOG_TARGET,
        LogLevel::from_raw(level).to_log(),
        "{}",
        message.trim_end()
    );
}

/// The log interface handed out through `GET_LOG_INTERFACE`.
pub(crate) fn log_interface() -> abi::LogInterface {
    abi::LogInterface { log: core_log }
}
