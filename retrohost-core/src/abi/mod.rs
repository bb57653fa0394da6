//! retrohost-core ABI module
//!
//! This module defines the ABI contract between:
//! - **Host**: `retrohost-core` (the frontend side)
//! - **Core**: the dynamically loaded libretro module ("emulation core")
//!
//! ## High-level model (callback-based)
//! The host resolves the core's exported `retro_*` entry points by name, then hands the core a
//! set of plain C function pointers (the callbacks in `crate::bridge`). The core calls those
//! synchronously from inside `retro_run` (and occasionally from `retro_init`/`retro_load_game`).
//!
//! ## Exports (core -> host) required
//! Lifecycle, content, serialization, memory and info entry points; see [`core_exports`].
//! The seven `retro_set_*` registration points are required as well.
//!
//! ## Exports (core -> host) optional
//! `retro_audio`, `retro_audio_set_state`, `retro_frame_time`, `retro_keyboard_event`.
//!
//! ## Callbacks (host -> core)
//! Environment, video refresh, audio sample, audio sample batch, input poll, input state.
//! The log callback is handed out through `GET_LOG_INTERFACE`.
//!
//! ## ABI Stability
//! The core reports its API version through `retro_api_version`. The host refuses to drive cores
//! that report anything other than [`API_VERSION`].
//!
//! C struct layouts shared with every libretro frontend come from `libretro-sys`; the handful of
//! structures the host needs beyond those are declared here with `#[repr(C)]`.

use std::ffi::{c_char, c_int, c_uint, c_void};

pub use libretro_sys::{GameGeometry, GameInfo, SystemAvInfo, SystemInfo, SystemTiming, Variable};

/// API version the host speaks.
pub const API_VERSION: c_uint = libretro_sys::API_VERSION;

/// Environment command ids understood by the host.
///
/// Anything not listed here is answered with "unhandled" (`false`).
pub mod env_cmd {
    use std::ffi::c_uint;

    pub const GET_OVERSCAN: c_uint = libretro_sys::ENVIRONMENT_GET_OVERSCAN;
    pub const GET_CAN_DUPE: c_uint = libretro_sys::ENVIRONMENT_GET_CAN_DUPE;
    pub const SET_MESSAGE: c_uint = libretro_sys::ENVIRONMENT_SET_MESSAGE;
    pub const SHUTDOWN: c_uint = libretro_sys::ENVIRONMENT_SHUTDOWN;
    pub const SET_PERFORMANCE_LEVEL: c_uint = libretro_sys::ENVIRONMENT_SET_PERFORMANCE_LEVEL;
    pub const GET_SYSTEM_DIRECTORY: c_uint = libretro_sys::ENVIRONMENT_GET_SYSTEM_DIRECTORY;
    pub const SET_PIXEL_FORMAT: c_uint = libretro_sys::ENVIRONMENT_SET_PIXEL_FORMAT;
    pub const SET_INPUT_DESCRIPTORS: c_uint = libretro_sys::ENVIRONMENT_SET_INPUT_DESCRIPTORS;
    pub const SET_HW_RENDER: c_uint = libretro_sys::ENVIRONMENT_SET_HW_RENDER;
    pub const GET_VARIABLE: c_uint = libretro_sys::ENVIRONMENT_GET_VARIABLE;
    pub const SET_VARIABLES: c_uint = libretro_sys::ENVIRONMENT_SET_VARIABLES;
    pub const GET_VARIABLE_UPDATE: c_uint = libretro_sys::ENVIRONMENT_GET_VARIABLE_UPDATE;
    pub const SET_SUPPORT_NO_GAME: c_uint = libretro_sys::ENVIRONMENT_SET_SUPPORT_NO_GAME;
    pub const GET_LIBRETRO_PATH: c_uint = libretro_sys::ENVIRONMENT_GET_LIBRETRO_PATH;
    pub const GET_LOG_INTERFACE: c_uint = libretro_sys::ENVIRONMENT_GET_LOG_INTERFACE;
    pub const GET_SAVE_DIRECTORY: c_uint = libretro_sys::ENVIRONMENT_GET_SAVE_DIRECTORY;
}

/// Memory region ids for `retro_get_memory_data` / `retro_get_memory_size`.
pub mod memory {
    use std::ffi::c_uint;

    /// Battery-backed save RAM.
    pub const SAVE_RAM: c_uint = libretro_sys::MEMORY_SAVE_RAM;
    /// Real-time clock state.
    pub const RTC: c_uint = libretro_sys::MEMORY_RTC;
}

/// Values returned by `retro_get_region`.
pub mod region {
    use std::ffi::c_uint;

    pub const NTSC: c_uint = 0;
    pub const PAL: c_uint = 1;
}

/// Exported symbol names resolved from the core.
pub mod core_exports {
    pub const API_VERSION: &str = "retro_api_version";
    pub const INIT: &str = "retro_init";
    pub const DEINIT: &str = "retro_deinit";
    pub const GET_SYSTEM_INFO: &str = "retro_get_system_info";
    pub const GET_SYSTEM_AV_INFO: &str = "retro_get_system_av_info";
    pub const GET_REGION: &str = "retro_get_region";
    pub const LOAD_GAME: &str = "retro_load_game";
    pub const LOAD_GAME_SPECIAL: &str = "retro_load_game_special";
    pub const UNLOAD_GAME: &str = "retro_unload_game";
    pub const RUN: &str = "retro_run";
    pub const RESET: &str = "retro_reset";
    pub const SERIALIZE_SIZE: &str = "retro_serialize_size";
    pub const SERIALIZE: &str = "retro_serialize";
    pub const UNSERIALIZE: &str = "retro_unserialize";
    pub const GET_MEMORY_DATA: &str = "retro_get_memory_data";
    pub const GET_MEMORY_SIZE: &str = "retro_get_memory_size";
    pub const CHEAT_RESET: &str = "retro_cheat_reset";
    pub const CHEAT_SET: &str = "retro_cheat_set";

    // Callback registration points.
    pub const SET_ENVIRONMENT: &str = "retro_set_environment";
    pub const SET_VIDEO_REFRESH: &str = "retro_set_video_refresh";
    pub const SET_AUDIO_SAMPLE: &str = "retro_set_audio_sample";
    pub const SET_AUDIO_SAMPLE_BATCH: &str = "retro_set_audio_sample_batch";
    pub const SET_INPUT_POLL: &str = "retro_set_input_poll";
    pub const SET_INPUT_STATE: &str = "retro_set_input_state";
    pub const SET_CONTROLLER_PORT_DEVICE: &str = "retro_set_controller_port_device";

    // Optional.
    pub const AUDIO: &str = "retro_audio";
    pub const AUDIO_SET_STATE: &str = "retro_audio_set_state";
    pub const FRAME_TIME: &str = "retro_frame_time";
    pub const KEYBOARD_EVENT: &str = "retro_keyboard_event";
}

// --- Host callbacks handed to the core ---

pub type EnvironmentFn = unsafe extern "C" fn(cmd: c_uint, data: *mut c_void) -> bool;
pub type VideoRefreshFn =
    unsafe extern "C" fn(data: *const c_void, width: c_uint, height: c_uint, pitch: usize);
pub type AudioSampleFn = unsafe extern "C" fn(left: i16, right: i16);
pub type AudioSampleBatchFn = unsafe extern "C" fn(data: *const i16, frames: usize) -> usize;
pub type InputPollFn = unsafe extern "C" fn();
pub type InputStateFn =
    unsafe extern "C" fn(port: c_uint, device: c_uint, index: c_uint, id: c_uint) -> i16;

/// Log callback as seen by the host.
///
/// The C signature is variadic (`printf`-style). Only the fixed arguments are read, so the
/// format string is forwarded without substitution.
pub type LogFn = unsafe extern "C" fn(level: c_int, fmt: *const c_char);

// --- Core entry points ---

pub type ApiVersionFn = unsafe extern "C" fn() -> c_uint;
pub type VoidFn = unsafe extern "C" fn();
pub type GetSystemInfoFn = unsafe extern "C" fn(info: *mut SystemInfo);
pub type GetSystemAvInfoFn = unsafe extern "C" fn(info: *mut SystemAvInfo);
pub type GetRegionFn = unsafe extern "C" fn() -> c_uint;
pub type LoadGameFn = unsafe extern "C" fn(game: *const GameInfo) -> bool;
pub type LoadGameSpecialFn =
    unsafe extern "C" fn(game_type: c_uint, info: *const GameInfo, num_info: usize) -> bool;
pub type SerializeSizeFn = unsafe extern "C" fn() -> usize;
pub type SerializeFn = unsafe extern "C" fn(data: *mut c_void, size: usize) -> bool;
pub type UnserializeFn = unsafe extern "C" fn(data: *const c_void, size: usize) -> bool;
pub type GetMemoryDataFn = unsafe extern "C" fn(id: c_uint) -> *mut c_void;
pub type GetMemorySizeFn = unsafe extern "C" fn(id: c_uint) -> usize;
pub type CheatSetFn = unsafe extern "C" fn(index: c_uint, enabled: bool, code: *const c_char);
pub type SetEnvironmentFn = unsafe extern "C" fn(cb: EnvironmentFn);
pub type SetVideoRefreshFn = unsafe extern "C" fn(cb: VideoRefreshFn);
pub type SetAudioSampleFn = unsafe extern "C" fn(cb: AudioSampleFn);
pub type SetAudioSampleBatchFn = unsafe extern "C" fn(cb: AudioSampleBatchFn);
pub type SetInputPollFn = unsafe extern "C" fn(cb: InputPollFn);
pub type SetInputStateFn = unsafe extern "C" fn(cb: InputStateFn);
pub type SetControllerPortDeviceFn = unsafe extern "C" fn(port: c_uint, device: c_uint);
pub type AudioSetStateFn = unsafe extern "C" fn(enabled: bool);
pub type FrameTimeFn = unsafe extern "C" fn(usec: i64);
pub type KeyboardEventFn =
    unsafe extern "C" fn(down: bool, keycode: c_uint, character: u32, key_modifiers: u16);

// --- Structures exchanged through the environment channel ---

/// `struct retro_input_descriptor`. Arrays are terminated by a null `description`.
#[repr(C)]
#[derive(Copy, Clone, Debug)]
pub struct InputDescriptor {
    pub port: c_uint,
    pub device: c_uint,
    pub index: c_uint,
    pub id: c_uint,
    pub description: *const c_char,
}

/// `struct retro_log_callback`.
#[repr(C)]
pub struct LogInterface {
    pub log: LogFn,
}

/// `struct retro_message`.
#[repr(C)]
pub struct Message {
    pub msg: *const c_char,
    pub frames: c_uint,
}

/// Pixel format values negotiated through `SET_PIXEL_FORMAT`.
///
/// Keep these stable; they are part of the ABI. `Argb1555` is the format a core gets when it
/// never asks for anything else.
#[repr(u32)]
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub enum PixelFormat {
    /// 0RGB1555, native endian. 15 bits of color, top bit ignored.
    #[default]
    Argb1555 = 0,

    /// XRGB8888, native endian. Top byte ignored.
    Xrgb8888 = 1,

    /// RGB565, native endian.
    Rgb565 = 2,
}

impl PixelFormat {
    pub const fn bytes_per_pixel(self) -> u32 {
        match self {
            PixelFormat::Argb1555 | PixelFormat::Rgb565 => 2,
            PixelFormat::Xrgb8888 => 4,
        }
    }

    /// Convert the raw enum value a core passes through the environment channel.
    pub fn from_raw(raw: c_uint) -> Option<Self> {
        match raw {
            x if x == PixelFormat::Argb1555 as u32 => Some(PixelFormat::Argb1555),
            x if x == PixelFormat::Xrgb8888 as u32 => Some(PixelFormat::Xrgb8888),
            x if x == PixelFormat::Rgb565 as u32 => Some(PixelFormat::Rgb565),
            _ => None,
        }
    }
}

/// Log levels used by `retro_log_printf_t`.
#[repr(i32)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum LogLevel {
    Debug = 0,
    Info = 1,
    Warn = 2,
    Error = 3,
}

impl LogLevel {
    pub fn from_raw(raw: c_int) -> Self {
        match raw {
            0 => LogLevel::Debug,
            1 => LogLevel::Info,
            2 => LogLevel::Warn,
            // Out-of-range levels are still delivered, at the loudest level.
            _ => LogLevel::Error,
        }
    }

    pub fn to_log(self) -> log::Level {
        match self {
            LogLevel::Debug => log::Level::Debug,
            LogLevel::Info => log::Level::Info,
            LogLevel::Warn => log::Level::Warn,
            LogLevel::Error => log::Level::Error,
        }
    }
}

/// Device ids used by `retro_set_controller_port_device` and the input state callback.
pub mod device {
    use std::ffi::c_uint;

    pub const NONE: c_uint = libretro_sys::DEVICE_NONE;
    pub const JOYPAD: c_uint = libretro_sys::DEVICE_JOYPAD;
}

/// RetroPad button ids (`RETRO_DEVICE_ID_JOYPAD_*`).
#[repr(u32)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum JoypadButton {
    B = 0,
    Y = 1,
    Select = 2,
    Start = 3,
    Up = 4,
    Down = 5,
    Left = 6,
    Right = 7,
    A = 8,
    X = 9,
    L1 = 10,
    R1 = 11,
    L2 = 12,
    R2 = 13,
    L3 = 14,
    R3 = 15,
}

impl JoypadButton {
    /// Convert a raw joypad id into a button.
    pub fn from_id(id: c_uint) -> Option<Self> {
        use JoypadButton::*;
        const ALL: [JoypadButton; 16] = [
            B, Y, Select, Start, Up, Down, Left, Right, A, X, L1, R1, L2, R2, L3, R3,
        ];
        ALL.get(id as usize).copied()
    }

    pub const fn mask(self) -> u16 {
        1 << (self as u32)
    }
}
