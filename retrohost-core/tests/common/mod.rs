//! An in-process fake core for driving the adapter without a shared library.
//!
//! The fake exports every `retro_*` symbol as a plain Rust `extern "C"` function and keeps its
//! state in statics, like a real core would. Tests touching it must hold [`serial`].

#![allow(dead_code)]

use retrohost_core::abi::{
    self, AudioSampleBatchFn, EnvironmentFn, GameGeometry, GameInfo, InputDescriptor,
    InputPollFn, InputStateFn, JoypadButton, SystemAvInfo, SystemInfo, SystemTiming, Variable,
    VideoRefreshFn, core_exports as sym, device, env_cmd,
};
use retrohost_core::{
    AdapterConfig, CoreModule, Event, LibraryLoader, ModuleLoader, OpenFailure,
};
use std::collections::HashMap;
use std::ffi::{CStr, OsStr, c_char, c_uint, c_void};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::{Mutex, MutexGuard, PoisonError};

pub const FAKE_CORE: &str = "fake_libretro.so";
pub const WIDTH: u32 = 4;
pub const HEIGHT: u32 = 2;
pub const PITCH: usize = 16;
pub const SAMPLES_PER_FRAME: usize = 735;
pub const SRAM_SIZE: usize = 64;
pub const UNKNOWN_COMMAND: c_uint = 0xDEAD;

pub static INIT_CALLS: AtomicUsize = AtomicUsize::new(0);
pub static DEINIT_CALLS: AtomicUsize = AtomicUsize::new(0);
pub static LOAD_CALLS: AtomicUsize = AtomicUsize::new(0);
pub static UNLOAD_CALLS: AtomicUsize = AtomicUsize::new(0);
pub static RUN_CALLS: AtomicUsize = AtomicUsize::new(0);
pub static FRAME_TIME_CALLS: AtomicUsize = AtomicUsize::new(0);
pub static RESET_CALLS: AtomicUsize = AtomicUsize::new(0);
pub static OPTION_UPDATES: AtomicUsize = AtomicUsize::new(0);
pub static CHEATS_SET: AtomicUsize = AtomicUsize::new(0);

pub static API: AtomicU32 = AtomicU32::new(abi::API_VERSION);
pub static FRAME: AtomicU32 = AtomicU32::new(0);
pub static CONTROLLER_DEVICE: AtomicU32 = AtomicU32::new(u32::MAX);
/// Run number on which the core asks to shut down; 0 = never.
pub static SHUTDOWN_ON_FRAME: AtomicU32 = AtomicU32::new(0);
pub static LAST_CONTENT_SIZE: AtomicUsize = AtomicUsize::new(0);

pub static REJECT_CONTENT: AtomicBool = AtomicBool::new(false);
pub static LOAD_HAD_DATA: AtomicBool = AtomicBool::new(false);
pub static AUDIO_ENABLED: AtomicBool = AtomicBool::new(false);
pub static START_PRESSED: AtomicBool = AtomicBool::new(false);
/// Answer the host gave to `SET_HW_RENDER`. Starts `true` so a `false` proves it was asked.
pub static HW_RENDER_ACCEPTED: AtomicBool = AtomicBool::new(true);
/// Answer the host gave to [`UNKNOWN_COMMAND`]. Starts `true` so a `false` proves it was asked.
pub static UNKNOWN_COMMAND_HANDLED: AtomicBool = AtomicBool::new(true);

static LAST_OPTION: Mutex<String> = Mutex::new(String::new());
static SYSTEM_DIRECTORY: Mutex<String> = Mutex::new(String::new());

static mut SRAM: [u8; SRAM_SIZE] = [0; SRAM_SIZE];

#[derive(Clone, Copy)]
struct Callbacks {
    environment: Option<EnvironmentFn>,
    video: Option<VideoRefreshFn>,
    audio_batch: Option<AudioSampleBatchFn>,
    input_poll: Option<InputPollFn>,
    input_state: Option<InputStateFn>,
}

static CALLBACKS: Mutex<Callbacks> = Mutex::new(Callbacks {
    environment: None,
    video: None,
    audio_batch: None,
    input_poll: None,
    input_state: None,
});

fn callbacks() -> Callbacks {
    *CALLBACKS.lock().unwrap_or_else(PoisonError::into_inner)
}

fn set_callbacks(f: impl FnOnce(&mut Callbacks)) {
    f(&mut CALLBACKS.lock().unwrap_or_else(PoisonError::into_inner));
}

/// Serializes tests in one binary: the fake core and the adapter's context slot are global.
pub fn serial() -> MutexGuard<'static, ()> {
    static LOCK: Mutex<()> = Mutex::new(());
    let guard = LOCK.lock().unwrap_or_else(PoisonError::into_inner);
    reset();
    guard
}

/// Put the fake core back into its initial state.
pub fn reset() {
    for counter in [
        &INIT_CALLS,
        &DEINIT_CALLS,
        &LOAD_CALLS,
        &UNLOAD_CALLS,
        &RUN_CALLS,
        &FRAME_TIME_CALLS,
        &RESET_CALLS,
        &OPTION_UPDATES,
        &CHEATS_SET,
        &LAST_CONTENT_SIZE,
    ] {
        counter.store(0, Ordering::SeqCst);
    }
    API.store(abi::API_VERSION, Ordering::SeqCst);
    FRAME.store(0, Ordering::SeqCst);
    CONTROLLER_DEVICE.store(u32::MAX, Ordering::SeqCst);
    SHUTDOWN_ON_FRAME.store(0, Ordering::SeqCst);
    REJECT_CONTENT.store(false, Ordering::SeqCst);
    LOAD_HAD_DATA.store(false, Ordering::SeqCst);
    AUDIO_ENABLED.store(false, Ordering::SeqCst);
    START_PRESSED.store(false, Ordering::SeqCst);
    UNKNOWN_COMMAND_HANDLED.store(true, Ordering::SeqCst);
    HW_RENDER_ACCEPTED.store(true, Ordering::SeqCst);
    LAST_OPTION.lock().unwrap_or_else(PoisonError::into_inner).clear();
    SYSTEM_DIRECTORY.lock().unwrap_or_else(PoisonError::into_inner).clear();
    set_sram(&[0; SRAM_SIZE]);
    set_callbacks(|cb| {
        *cb = Callbacks {
            environment: None,
            video: None,
            audio_batch: None,
            input_poll: None,
            input_state: None,
        }
    });
}

pub fn last_option() -> String {
    LAST_OPTION.lock().unwrap_or_else(PoisonError::into_inner).clone()
}

pub fn system_directory() -> String {
    SYSTEM_DIRECTORY.lock().unwrap_or_else(PoisonError::into_inner).clone()
}

pub fn sram() -> Vec<u8> {
    // SAFETY: tests are serialized and the adapter only touches SRAM from the test thread.
    unsafe { (*&raw const SRAM).to_vec() }
}

pub fn set_sram(bytes: &[u8; SRAM_SIZE]) {
    unsafe { (&raw mut SRAM).write(*bytes) };
}

/// Scratch directories plus a configuration pointing at them.
pub struct Fixture {
    pub dir: tempfile::TempDir,
    pub config: AdapterConfig,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = AdapterConfig {
            system_directory: dir.path().join("system"),
            save_directory: dir.path().join("saves"),
            ..AdapterConfig::default()
        };
        Self { dir, config }
    }

    /// Write a small content file and return its path.
    pub fn content(&self, name: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, [0x42u8; 16]).expect("write content");
        path
    }

    pub fn save_file(&self, stem: &str, ext: &str) -> PathBuf {
        self.config.save_directory.join(format!("{stem}.{ext}"))
    }
}

pub fn drain(events: &Receiver<Event>) -> Vec<Event> {
    events.try_iter().collect()
}

pub fn count(events: &[Event], pred: impl Fn(&Event) -> bool) -> usize {
    events.iter().filter(|e| pred(e)).count()
}

// --- Loader ---

/// Serves the fake core for [`FAKE_CORE`] and defers to the real loader for anything else.
#[derive(Default)]
pub struct FakeLoader {
    /// Exports to leave out of the symbol table.
    pub omit: Vec<&'static str>,
}

impl FakeLoader {
    pub fn without(omit: &[&'static str]) -> Self {
        Self {
            omit: omit.to_vec(),
        }
    }
}

impl ModuleLoader for FakeLoader {
    fn open(&self, path: &Path) -> Result<Box<dyn CoreModule>, OpenFailure> {
        if path.file_name() != Some(OsStr::new(FAKE_CORE)) {
            return LibraryLoader.open(path);
        }
        let mut table = symbol_table();
        for name in &self.omit {
            table.remove(name);
        }
        Ok(Box::new(FakeModule(table)))
    }
}

struct FakeModule(HashMap<&'static str, usize>);

impl CoreModule for FakeModule {
    fn symbol(&self, name: &str) -> Option<*const c_void> {
        self.0.get(name).map(|addr| *addr as *const c_void)
    }
}

fn symbol_table() -> HashMap<&'static str, usize> {
    HashMap::from([
        (sym::API_VERSION, retro_api_version as usize),
        (sym::INIT, retro_init as usize),
        (sym::DEINIT, retro_deinit as usize),
        (sym::GET_SYSTEM_INFO, retro_get_system_info as usize),
        (sym::GET_SYSTEM_AV_INFO, retro_get_system_av_info as usize),
        (sym::GET_REGION, retro_get_region as usize),
        (sym::LOAD_GAME, retro_load_game as usize),
        (sym::LOAD_GAME_SPECIAL, retro_load_game_special as usize),
        (sym::UNLOAD_GAME, retro_unload_game as usize),
        (sym::RUN, retro_run as usize),
        (sym::RESET, retro_reset as usize),
        (sym::SERIALIZE_SIZE, retro_serialize_size as usize),
        (sym::SERIALIZE, retro_serialize as usize),
        (sym::UNSERIALIZE, retro_unserialize as usize),
        (sym::GET_MEMORY_DATA, retro_get_memory_data as usize),
        (sym::GET_MEMORY_SIZE, retro_get_memory_size as usize),
        (sym::CHEAT_RESET, retro_cheat_reset as usize),
        (sym::CHEAT_SET, retro_cheat_set as usize),
        (sym::SET_ENVIRONMENT, retro_set_environment as usize),
        (sym::SET_VIDEO_REFRESH, retro_set_video_refresh as usize),
        (sym::SET_AUDIO_SAMPLE, retro_set_audio_sample as usize),
        (sym::SET_AUDIO_SAMPLE_BATCH, retro_set_audio_sample_batch as usize),
        (sym::SET_INPUT_POLL, retro_set_input_poll as usize),
        (sym::SET_INPUT_STATE, retro_set_input_state as usize),
        (
            sym::SET_CONTROLLER_PORT_DEVICE,
            retro_set_controller_port_device as usize,
        ),
        (sym::AUDIO_SET_STATE, retro_audio_set_state as usize),
        (sym::FRAME_TIME, retro_frame_time as usize),
    ])
}

// --- Environment helpers used by the fake ---

fn env(cmd: c_uint, data: *mut c_void) -> bool {
    match callbacks().environment {
        Some(environment) => unsafe { environment(cmd, data) },
        None => false,
    }
}

fn query_option() -> Option<String> {
    let mut var = Variable {
        key: c"fake_speed".as_ptr(),
        value: std::ptr::null(),
    };
    if !env(env_cmd::GET_VARIABLE, (&raw mut var).cast()) || var.value.is_null() {
        return None;
    }
    Some(unsafe { CStr::from_ptr(var.value) }.to_string_lossy().into_owned())
}

// --- Exports ---

unsafe extern "C" fn retro_api_version() -> c_uint {
    API.load(Ordering::SeqCst)
}

unsafe extern "C" fn retro_set_environment(cb: EnvironmentFn) {
    set_callbacks(|c| c.environment = Some(cb));
}

unsafe extern "C" fn retro_set_video_refresh(cb: VideoRefreshFn) {
    set_callbacks(|c| c.video = Some(cb));
}

unsafe extern "C" fn retro_set_audio_sample(_cb: abi::AudioSampleFn) {}

unsafe extern "C" fn retro_set_audio_sample_batch(cb: AudioSampleBatchFn) {
    set_callbacks(|c| c.audio_batch = Some(cb));
}

unsafe extern "C" fn retro_set_input_poll(cb: InputPollFn) {
    set_callbacks(|c| c.input_poll = Some(cb));
}

unsafe extern "C" fn retro_set_input_state(cb: InputStateFn) {
    set_callbacks(|c| c.input_state = Some(cb));
}

unsafe extern "C" fn retro_set_controller_port_device(_port: c_uint, device: c_uint) {
    CONTROLLER_DEVICE.store(device, Ordering::SeqCst);
}

unsafe extern "C" fn retro_init() {
    INIT_CALLS.fetch_add(1, Ordering::SeqCst);

    let mut format: c_uint = abi::PixelFormat::Xrgb8888 as c_uint;
    env(env_cmd::SET_PIXEL_FORMAT, (&raw mut format).cast());

    let mut vars = [
        Variable {
            key: c"fake_speed".as_ptr(),
            value: c"Emulation speed; normal|fast".as_ptr(),
        },
        Variable {
            key: std::ptr::null(),
            value: std::ptr::null(),
        },
    ];
    env(env_cmd::SET_VARIABLES, vars.as_mut_ptr().cast());

    let mut descriptors = [
        InputDescriptor {
            port: 0,
            device: device::JOYPAD,
            index: 0,
            id: JoypadButton::A as c_uint,
            description: c"Jump".as_ptr(),
        },
        InputDescriptor {
            port: 0,
            device: 0,
            index: 0,
            id: 0,
            description: std::ptr::null(),
        },
    ];
    env(env_cmd::SET_INPUT_DESCRIPTORS, descriptors.as_mut_ptr().cast());

    let mut dir: *const c_char = std::ptr::null();
    if env(env_cmd::GET_SYSTEM_DIRECTORY, (&raw mut dir).cast()) && !dir.is_null() {
        *SYSTEM_DIRECTORY.lock().unwrap_or_else(PoisonError::into_inner) =
            unsafe { CStr::from_ptr(dir) }.to_string_lossy().into_owned();
    }

    let mut no_game = true;
    env(env_cmd::SET_SUPPORT_NO_GAME, (&raw mut no_game).cast());

    // Only the host's answer matters; the payload stands in for `retro_hw_render_callback`.
    let mut hw_render = [0u8; 64];
    let accepted = env(env_cmd::SET_HW_RENDER, hw_render.as_mut_ptr().cast());
    HW_RENDER_ACCEPTED.store(accepted, Ordering::SeqCst);

    let handled = env(UNKNOWN_COMMAND, std::ptr::null_mut());
    UNKNOWN_COMMAND_HANDLED.store(handled, Ordering::SeqCst);
}

unsafe extern "C" fn retro_deinit() {
    DEINIT_CALLS.fetch_add(1, Ordering::SeqCst);
}

unsafe extern "C" fn retro_get_system_info(info: *mut SystemInfo) {
    unsafe {
        info.write(SystemInfo {
            library_name: c"Fake".as_ptr(),
            library_version: c"1.0".as_ptr(),
            valid_extensions: c"bin|rom".as_ptr(),
            need_fullpath: false,
            block_extract: false,
        })
    };
}

unsafe extern "C" fn retro_get_system_av_info(info: *mut SystemAvInfo) {
    unsafe {
        info.write(SystemAvInfo {
            geometry: GameGeometry {
                base_width: WIDTH,
                base_height: HEIGHT,
                max_width: WIDTH,
                max_height: HEIGHT,
                aspect_ratio: 0.0,
            },
            timing: SystemTiming {
                fps: 60.0,
                sample_rate: 44100.0,
            },
        })
    };
}

unsafe extern "C" fn retro_get_region() -> c_uint {
    abi::region::NTSC
}

unsafe extern "C" fn retro_load_game(game: *const GameInfo) -> bool {
    LOAD_CALLS.fetch_add(1, Ordering::SeqCst);
    if game.is_null() {
        return false;
    }
    let game = unsafe { &*game };
    LOAD_HAD_DATA.store(!game.data.is_null(), Ordering::SeqCst);
    LAST_CONTENT_SIZE.store(game.size, Ordering::SeqCst);
    FRAME.store(0, Ordering::SeqCst);
    !REJECT_CONTENT.load(Ordering::SeqCst)
}

unsafe extern "C" fn retro_load_game_special(
    _game_type: c_uint,
    _info: *const GameInfo,
    _num_info: usize,
) -> bool {
    false
}

unsafe extern "C" fn retro_unload_game() {
    UNLOAD_CALLS.fetch_add(1, Ordering::SeqCst);
}

unsafe extern "C" fn retro_run() {
    RUN_CALLS.fetch_add(1, Ordering::SeqCst);
    let cb = callbacks();

    if let Some(poll) = cb.input_poll {
        unsafe { poll() };
    }
    if let Some(state) = cb.input_state {
        let pressed =
            unsafe { state(0, device::JOYPAD, 0, JoypadButton::Start as c_uint) } != 0;
        START_PRESSED.store(pressed, Ordering::SeqCst);
    }

    let mut updated = false;
    if env(env_cmd::GET_VARIABLE_UPDATE, (&raw mut updated).cast()) && updated {
        OPTION_UPDATES.fetch_add(1, Ordering::SeqCst);
    }
    if let Some(value) = query_option() {
        *LAST_OPTION.lock().unwrap_or_else(PoisonError::into_inner) = value;
    }

    let frame = FRAME.load(Ordering::SeqCst);
    if let Some(video) = cb.video {
        let pixels = [frame as u8; PITCH * HEIGHT as usize];
        unsafe { video(pixels.as_ptr().cast(), WIDTH, HEIGHT, PITCH) };
    }
    if let Some(audio) = cb.audio_batch {
        let samples = vec![frame as i16; SAMPLES_PER_FRAME * 2];
        unsafe { audio(samples.as_ptr(), SAMPLES_PER_FRAME) };
    }

    let run = FRAME.fetch_add(1, Ordering::SeqCst) + 1;
    if SHUTDOWN_ON_FRAME.load(Ordering::SeqCst) == run {
        env(env_cmd::SHUTDOWN, std::ptr::null_mut());
    }
}

unsafe extern "C" fn retro_reset() {
    RESET_CALLS.fetch_add(1, Ordering::SeqCst);
    FRAME.store(0, Ordering::SeqCst);
}

unsafe extern "C" fn retro_serialize_size() -> usize {
    4
}

unsafe extern "C" fn retro_serialize(data: *mut c_void, size: usize) -> bool {
    if size != 4 {
        return false;
    }
    let bytes = FRAME.load(Ordering::SeqCst).to_le_bytes();
    unsafe { std::ptr::copy_nonoverlapping(bytes.as_ptr(), data.cast::<u8>(), 4) };
    true
}

unsafe extern "C" fn retro_unserialize(data: *const c_void, size: usize) -> bool {
    if size != 4 {
        return false;
    }
    let mut bytes = [0u8; 4];
    unsafe { std::ptr::copy_nonoverlapping(data.cast::<u8>(), bytes.as_mut_ptr(), 4) };
    FRAME.store(u32::from_le_bytes(bytes), Ordering::SeqCst);
    true
}

unsafe extern "C" fn retro_get_memory_data(id: c_uint) -> *mut c_void {
    if id == abi::memory::SAVE_RAM {
        (&raw mut SRAM).cast()
    } else {
        std::ptr::null_mut()
    }
}

unsafe extern "C" fn retro_get_memory_size(id: c_uint) -> usize {
    if id == abi::memory::SAVE_RAM { SRAM_SIZE } else { 0 }
}

unsafe extern "C" fn retro_cheat_reset() {
    CHEATS_SET.store(0, Ordering::SeqCst);
}

unsafe extern "C" fn retro_cheat_set(_index: c_uint, _enabled: bool, code: *const c_char) {
    if !code.is_null() {
        CHEATS_SET.fetch_add(1, Ordering::SeqCst);
    }
}

unsafe extern "C" fn retro_audio_set_state(enabled: bool) {
    AUDIO_ENABLED.store(enabled, Ordering::SeqCst);
}

unsafe extern "C" fn retro_frame_time(_usec: i64) {
    FRAME_TIME_CALLS.fetch_add(1, Ordering::SeqCst);
}
