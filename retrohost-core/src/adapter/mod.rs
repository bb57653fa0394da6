//! The adapter: lifecycle state machine and controller-facing API.
//!
//! Responsibilities:
//! - Drive a core through load core -> load content -> run frames -> unload.
//! - Own the loaded [`PluginHandle`] and bind the adapter's [`Session`] to the callback context
//!   while the core is initialized.
//! - Drain the frame pools after every `retro_run` and forward them as [`Event`]s.
//!
//! Notes / constraints:
//! - The context lock is never held while calling into the core: the core calls straight back
//!   into the bridge, which takes the same lock.
//! - Load failures are not returned. They move the adapter into [`AdapterState::Error`] and are
//!   reported through [`StateChange::Error`]. Methods only return [`AdapterError`] for calls made
//!   in the wrong state or while the context belongs to another adapter.

mod events;
mod info;

pub use events::{AdapterState, Event, StateChange};
pub use info::{CoreInfo, Region};

use crate::abi::{self, SystemAvInfo, SystemInfo};
use crate::av::{AudioFrameBuffer, AvInfo, VideoFrameBuffer};
use crate::bridge;
use crate::config::AdapterConfig;
use crate::error::{AdapterError, LoadError};
use crate::input::{InputBinding, InputProvider};
use crate::loader::{LibraryLoader, ModuleLoader};
use crate::sram::SramStore;
use crate::state::{self, Session, SessionId};
use crate::symbols::{CoreSymbols, PluginHandle};
use crate::variables::{Variable, VariableError};
use info::Content;
use std::ffi::{CString, c_uint};
use std::path::Path;
use std::sync::mpsc::{self, Receiver, Sender};
use std::time::Instant;

/// Frames overwritten in the pools before the controller got them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DroppedFrames {
    pub audio: u64,
    pub video: u64,
}

/// Host adapter for one libretro core.
pub struct Adapter {
    id: SessionId,
    config: AdapterConfig,
    loader: Box<dyn ModuleLoader>,
    events: Sender<Event>,

    state: AdapterState,
    plugin: Option<PluginHandle>,
    /// `retro_init` ran and `retro_deinit` has not.
    initialized: bool,
    /// Kept alive from `retro_load_game` to `retro_unload_game`.
    content: Option<Content>,
    sram: Option<SramStore>,

    av_info: Option<AvInfo>,
    core_info: Option<CoreInfo>,

    /// Parked here while no session is bound.
    input: Option<Box<dyn InputProvider>>,
    last_frame: Option<Instant>,
}

impl Adapter {
    /// An adapter loading cores from shared libraries on disk.
    pub fn new(config: AdapterConfig) -> (Self, Receiver<Event>) {
        Self::with_loader(config, LibraryLoader)
    }

    /// An adapter opening cores through `loader`.
    pub fn with_loader(
        config: AdapterConfig,
        loader: impl ModuleLoader + 'static,
    ) -> (Self, Receiver<Event>) {
        let (events, receiver) = mpsc::channel();
        let adapter = Self {
            id: state::next_session_id(),
            config,
            loader: Box::new(loader),
            events,
            state: AdapterState::Uninitialized,
            plugin: None,
            initialized: false,
            content: None,
            sram: None,
            av_info: None,
            core_info: None,
            input: None,
            last_frame: None,
        };
        (adapter, receiver)
    }

    pub fn state(&self) -> AdapterState {
        self.state
    }

    /// Timing and format negotiated on the last entry into `Ready`.
    pub fn av_info(&self) -> Option<AvInfo> {
        self.av_info
    }

    pub fn core_info(&self) -> Option<&CoreInfo> {
        self.core_info.as_ref()
    }

    /// Whether a core module is open, initialized or not.
    pub fn is_core_loaded(&self) -> bool {
        self.plugin.is_some()
    }

    /// Open the core at `path` and initialize it.
    ///
    /// Any previously loaded core is unloaded first. From `Finished` or `Error` this restarts the
    /// lifecycle at `Uninitialized`.
    pub fn load_core(&mut self, path: impl AsRef<Path>) -> Result<(), AdapterError> {
        let path = path.as_ref();
        self.ensure_no_frame()?;
        if self.state == AdapterState::Ready {
            return Err(AdapterError::WrongState {
                expected: AdapterState::Uninitialized,
                actual: self.state,
            });
        }
        self.ensure_context_available()?;

        self.shutdown_core(false);
        self.plugin = None;
        self.core_info = None;
        self.restart();

        log::info!("loading core {}", path.display());
        let module = match self.loader.open(path) {
            Ok(module) => module,
            Err(failure) => {
                self.fail(failure.into());
                return Ok(());
            }
        };
        let plugin = match PluginHandle::new(module, path) {
            Ok(plugin) => plugin,
            Err(missing) => {
                self.fail(LoadError::CoreLoad(missing.to_string()));
                return Ok(());
            }
        };

        // SAFETY: resolved from the module `plugin` owns.
        let version = unsafe { (plugin.symbols().api_version)() };
        if version != abi::API_VERSION {
            self.fail(LoadError::CoreLoad(format!(
                "unsupported API version {version}, expected {}",
                abi::API_VERSION
            )));
            return Ok(());
        }

        self.plugin = Some(plugin);
        self.init_core()
    }

    /// Load the content at `path` into the loaded core. Ends in `Ready` or `Error`.
    pub fn load_content(&mut self, path: impl AsRef<Path>) -> Result<(), AdapterError> {
        let path = path.as_ref();
        self.ensure_no_frame()?;
        match self.state {
            AdapterState::Ready => {
                return Err(AdapterError::WrongState {
                    expected: AdapterState::Uninitialized,
                    actual: self.state,
                });
            }
            _ if self.plugin.is_none() => return Err(AdapterError::NoCoreLoaded),
            _ => {}
        }
        self.ensure_context_available()?;
        self.restart();
        if !self.initialized {
            self.init_core()?;
        }

        let Some(plugin) = self.plugin.as_ref() else {
            return Err(AdapterError::NoCoreLoaded);
        };
        let symbols = *plugin.symbols();
        let need_fullpath = self.core_info.as_ref().is_some_and(|info| info.need_fullpath);

        log::info!("loading content {}", path.display());
        let content = match Content::read(path, need_fullpath) {
            Ok(content) => content,
            Err(e) => {
                self.fail(e);
                return Ok(());
            }
        };

        let game = content.game_info();
        // SAFETY: `game` points into `content`, which stays alive until `retro_unload_game`.
        let accepted = unsafe { (symbols.load_game)(&game) };
        if !accepted {
            self.fail(LoadError::GameLoad(format!(
                "core rejected {}",
                path.display()
            )));
            return Ok(());
        }
        log::debug!("core accepted {} bytes of content", content.len());
        self.content = Some(content);

        // SAFETY: `SystemAvInfo` is plain numbers; zero is a valid bit pattern.
        let mut raw: SystemAvInfo = unsafe { std::mem::zeroed() };
        unsafe { (symbols.get_system_av_info)(&mut raw) };
        let pixel_format = state::with_session(self.id, |s| s.pixel_format()).unwrap_or_default();
        let av = AvInfo::from_raw(&raw, pixel_format);
        state::with_session(self.id, |s| {
            s.audio.set_timing(av.timing.sample_rate, av.timing.fps);
            s.audio.pool_mut().reset();
            s.video.pool_mut().reset();
        });

        let sram = SramStore::for_content(&self.config.save_directory, path);
        if let Some(plugin) = self.plugin.as_mut() {
            let restored = sram.load_all(plugin);
            if restored > 0 {
                log::info!("restored {restored} save region(s)");
            }
        }
        self.sram = Some(sram);

        if let Some(audio_set_state) = symbols.audio_set_state {
            unsafe { audio_set_state(true) };
        }

        self.av_info = Some(av);
        self.last_frame = None;
        self.transition(StateChange::Ready(av));
        Ok(())
    }

    /// Run the core for exactly one frame and emit what it produced.
    pub fn run_frame(&mut self) -> Result<(), AdapterError> {
        let symbols = self.ready_symbols()?;
        let frame = state::begin_frame()?;

        if let Some(frame_time) = symbols.frame_time {
            let now = Instant::now();
            let usec = match self.last_frame {
                Some(last) => now.duration_since(last).as_micros() as i64,
                None => self.nominal_frame_usec(),
            };
            self.last_frame = Some(now);
            unsafe { frame_time(usec) };
        }

        // SAFETY: the core is initialized and has content loaded.
        unsafe { (symbols.run)() };
        if let Some(audio) = symbols.audio {
            unsafe { audio() };
        }
        drop(frame);

        let drained = state::with_session(self.id, Drained::take).unwrap_or_default();
        for frame in drained.video {
            self.emit(Event::VideoDataReady(frame));
        }
        for frame in drained.audio {
            self.emit(Event::AudioDataReady(frame));
        }
        self.emit(Event::FrameRendered);

        if drained.shutdown {
            log::info!("unloading after core shutdown request");
            self.unload()?;
        }
        Ok(())
    }

    /// Unload content and deinitialize the core, flushing SRAM when configured to.
    ///
    /// The module stays open, so [`load_content`](Self::load_content) can start a new session
    /// with the same core. A no-op when nothing is initialized.
    pub fn unload(&mut self) -> Result<(), AdapterError> {
        self.ensure_no_frame()?;
        if !self.initialized {
            return Ok(());
        }
        self.shutdown_core(true);
        self.av_info = None;
        self.transition(StateChange::Finished);
        Ok(())
    }

    /// `retro_reset`.
    pub fn reset(&mut self) -> Result<(), AdapterError> {
        let symbols = self.ready_symbols()?;
        unsafe { (symbols.reset)() };
        Ok(())
    }

    /// Serialize the running session. `None` when the core does not support it.
    pub fn save_state(&mut self) -> Result<Option<Vec<u8>>, AdapterError> {
        let symbols = self.ready_symbols()?;
        let size = unsafe { (symbols.serialize_size)() };
        if size == 0 {
            return Ok(None);
        }
        let mut buf = vec![0u8; size];
        let ok = unsafe { (symbols.serialize)(buf.as_mut_ptr().cast(), buf.len()) };
        Ok(ok.then_some(buf))
    }

    /// Restore a state produced by [`save_state`](Self::save_state). A core rejecting it ends
    /// the session in `Error`.
    pub fn load_state(&mut self, data: &[u8]) -> Result<(), AdapterError> {
        let symbols = self.ready_symbols()?;
        let ok = unsafe { (symbols.unserialize)(data.as_ptr().cast(), data.len()) };
        if !ok {
            self.fail(LoadError::StateRejected);
        }
        Ok(())
    }

    pub fn cheat_reset(&mut self) -> Result<(), AdapterError> {
        let symbols = self.ready_symbols()?;
        unsafe { (symbols.cheat_reset)() };
        Ok(())
    }

    /// `retro_cheat_set`. Codes containing NUL cannot be passed and are skipped.
    pub fn cheat_set(&mut self, index: u32, enabled: bool, code: &str) -> Result<(), AdapterError> {
        let symbols = self.ready_symbols()?;
        let Ok(code) = CString::new(code) else {
            log::warn!("cheat {index} contains a NUL byte, skipped");
            return Ok(());
        };
        unsafe { (symbols.cheat_set)(index, enabled, code.as_ptr()) };
        Ok(())
    }

    /// The content's video standard. `None` for values outside the ABI.
    pub fn region(&self) -> Result<Option<Region>, AdapterError> {
        let symbols = self.ready_symbols()?;
        let raw = unsafe { (symbols.get_region)() };
        Ok(Region::from_raw(raw))
    }

    /// Plug `device` into `port` (`retro_set_controller_port_device`).
    pub fn set_controller_port_device(
        &mut self,
        port: u32,
        device: c_uint,
    ) -> Result<(), AdapterError> {
        let Some(plugin) = self.plugin.as_ref().filter(|_| self.initialized) else {
            return Err(AdapterError::NoCoreLoaded);
        };
        unsafe { (plugin.symbols().set_controller_port_device)(port, device) };
        Ok(())
    }

    /// Forward a key event. Returns whether the core takes keyboard input at all.
    pub fn keyboard_event(
        &mut self,
        down: bool,
        keycode: u32,
        character: u32,
        modifiers: u16,
    ) -> Result<bool, AdapterError> {
        let symbols = self.ready_symbols()?;
        let Some(keyboard_event) = symbols.keyboard_event else {
            return Ok(false);
        };
        unsafe { keyboard_event(down, keycode, character, modifiers) };
        Ok(true)
    }

    /// Write battery-backed memory to disk now. Returns the number of regions written.
    pub fn save_sram(&mut self) -> Result<usize, AdapterError> {
        self.ready_symbols()?;
        match (self.sram.as_ref(), self.plugin.as_mut()) {
            (Some(sram), Some(plugin)) => Ok(sram.save_all(plugin)),
            _ => Ok(0),
        }
    }

    /// Options the core declared, ordered by key.
    pub fn variables(&self) -> Vec<Variable> {
        state::with_session(self.id, |s| s.variables.iter().cloned().collect()).unwrap_or_default()
    }

    /// Change an option; the core sees it on its next `GET_VARIABLE_UPDATE`.
    pub fn set_variable(&mut self, key: &str, value: &str) -> Result<(), VariableError> {
        state::with_session(self.id, |s| s.variables.set(key, value))
            .unwrap_or_else(|| Err(VariableError::UnknownKey(key.to_owned())))
    }

    /// Button labels the core declared.
    pub fn input_descriptors(&self) -> Vec<InputBinding> {
        state::with_session(self.id, |s| s.input_bindings.clone()).unwrap_or_default()
    }

    /// Answer the core's input queries with `provider` from now on.
    pub fn set_input_provider(&mut self, provider: impl InputProvider + 'static) {
        let mut provider: Option<Box<dyn InputProvider>> = Some(Box::new(provider));
        state::with_session(self.id, |s| {
            if let Some(provider) = provider.take() {
                s.input = provider;
            }
        });
        if provider.is_some() {
            self.input = provider;
        }
    }

    /// Whether the initialized core declared it can run without content (`SET_SUPPORT_NO_GAME`).
    pub fn supports_no_game(&self) -> bool {
        state::with_session(self.id, |s| s.support_no_game).unwrap_or(false)
    }

    /// Whether the initialized core asked for hardware rendering. The request is always refused;
    /// a core that cannot fall back to software rendering will typically reject its content.
    pub fn hw_render_requested(&self) -> bool {
        state::with_session(self.id, |s| s.hw_render_requested).unwrap_or(false)
    }

    pub fn dropped_frames(&self) -> DroppedFrames {
        state::with_session(self.id, |s| DroppedFrames {
            audio: s.audio.pool().dropped(),
            video: s.video.pool().dropped(),
        })
        .unwrap_or_default()
    }

    fn ready_symbols(&self) -> Result<CoreSymbols, AdapterError> {
        if self.state != AdapterState::Ready {
            return Err(AdapterError::WrongState {
                expected: AdapterState::Ready,
                actual: self.state,
            });
        }
        self.plugin
            .as_ref()
            .map(|plugin| *plugin.symbols())
            .ok_or(AdapterError::NoCoreLoaded)
    }

    fn ensure_no_frame(&self) -> Result<(), AdapterError> {
        if state::frame_in_flight() {
            Err(AdapterError::FrameInFlight)
        } else {
            Ok(())
        }
    }

    fn ensure_context_available(&self) -> Result<(), AdapterError> {
        if state::is_occupied() && !state::is_bound(self.id) {
            Err(AdapterError::ContextOccupied)
        } else {
            Ok(())
        }
    }

    /// Bind a fresh session and run the core's init sequence.
    fn init_core(&mut self) -> Result<(), AdapterError> {
        let Some(plugin) = self.plugin.as_ref() else {
            return Err(AdapterError::NoCoreLoaded);
        };
        let symbols = *plugin.symbols();

        let mut session = Session::new(self.id, &self.config, plugin.path());
        if let Some(input) = self.input.take() {
            session.input = input;
        }
        state::claim(session)?;

        bridge::install_environment(&symbols);
        unsafe { (symbols.init)() };
        self.initialized = true;

        // SAFETY: null pointers and `false` are valid for every field.
        let mut raw: SystemInfo = unsafe { std::mem::zeroed() };
        unsafe { (symbols.get_system_info)(&mut raw) };
        let info = CoreInfo::from_raw(&raw);
        log::info!(
            "core {} {} initialized ({} optional entry points)",
            info.library_name,
            info.library_version,
            symbols.optional_count()
        );
        self.core_info = Some(info);

        bridge::install_callbacks(&symbols);
        Ok(())
    }

    /// Unload content, deinitialize, and give the context back. The module stays open.
    fn shutdown_core(&mut self, flush_sram: bool) {
        if let Some(plugin) = self.plugin.as_mut() {
            let symbols = *plugin.symbols();
            if self.content.is_some() {
                if flush_sram && self.config.autosave_sram {
                    if let Some(sram) = self.sram.as_ref() {
                        sram.save_all(plugin);
                    }
                }
                unsafe { (symbols.unload_game)() };
            }
            if self.initialized {
                unsafe { (symbols.deinit)() };
            }
        }
        self.initialized = false;
        self.content = None;
        self.sram = None;
        self.last_frame = None;
        self.release_context();
    }

    fn release_context(&mut self) {
        if let Some(session) = state::release(self.id) {
            self.input = Some(session.input);
        }
    }

    fn restart(&mut self) {
        if matches!(self.state, AdapterState::Finished | AdapterState::Error) {
            self.transition(StateChange::Uninitialized);
        }
    }

    fn fail(&mut self, error: LoadError) {
        log::error!("{error}");
        self.shutdown_core(true);
        self.av_info = None;
        self.transition(StateChange::Error(error));
    }

    fn transition(&mut self, change: StateChange) {
        let next = change.state();
        log::info!("state {:?} -> {next:?}", self.state);
        self.state = next;
        self.emit(Event::StateChanged(change));
    }

    fn emit(&self, event: Event) {
        // Nobody listening is not an error for the adapter.
        let _ = self.events.send(event);
    }

    fn nominal_frame_usec(&self) -> i64 {
        self.av_info
            .map(|av| av.timing.fps)
            .filter(|fps| *fps > 0.0)
            .map_or(0, |fps| (1_000_000.0 / fps).round() as i64)
    }
}

impl Drop for Adapter {
    fn drop(&mut self) {
        self.shutdown_core(true);
    }
}

impl std::fmt::Debug for Adapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Adapter")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("plugin", &self.plugin)
            .field("initialized", &self.initialized)
            .field("av_info", &self.av_info)
            .finish_non_exhaustive()
    }
}

/// Everything a frame left in the pools.
#[derive(Default)]
struct Drained {
    video: Vec<VideoFrameBuffer>,
    audio: Vec<AudioFrameBuffer>,
    shutdown: bool,
}

impl Drained {
    fn take(session: &mut Session) -> Self {
        let mut drained = Drained {
            shutdown: std::mem::take(&mut session.shutdown_requested),
            ..Default::default()
        };
        while let Some(frame) = session.video.pool_mut().pop_full() {
            drained.video.push(frame.clone());
        }
        while let Some(frame) = session.audio.pool_mut().pop_full() {
            drained.audio.push(frame.clone());
        }
        drained
    }
}
