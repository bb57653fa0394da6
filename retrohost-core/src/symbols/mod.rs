//! The symbol table: every `retro_*` entry point of a loaded core, typed.
//!
//! A [`CoreSymbols`] value only exists when every mandatory entry point resolved, so a
//! partially resolved table is unrepresentable. Optional entry points are `Option`s.
//! [`PluginHandle`] ties the table to the module it came from; dropping the handle drops both,
//! which is the only way entries are ever cleared.

use crate::abi::{self, core_exports as sym};
use crate::loader::CoreModule;
use crate::sram::MemoryRegions;
use std::ffi::{c_uint, c_void};
use std::path::{Path, PathBuf};

/// Mandatory entry points missing from a module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingSymbols(pub Vec<&'static str>);

impl std::fmt::Display for MissingSymbols {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "missing mandatory symbols: {}", self.0.join(", "))
    }
}

/// Resolved entry points.
#[derive(Clone, Copy)]
pub struct CoreSymbols {
    pub api_version: abi::ApiVersionFn,
    pub init: abi::VoidFn,
    pub deinit: abi::VoidFn,
    pub get_system_info: abi::GetSystemInfoFn,
    pub get_system_av_info: abi::GetSystemAvInfoFn,
    pub get_region: abi::GetRegionFn,
    pub load_game: abi::LoadGameFn,
    pub load_game_special: abi::LoadGameSpecialFn,
    pub unload_game: abi::VoidFn,
    pub run: abi::VoidFn,
    pub reset: abi::VoidFn,
    pub serialize_size: abi::SerializeSizeFn,
    pub serialize: abi::SerializeFn,
    pub unserialize: abi::UnserializeFn,
    pub get_memory_data: abi::GetMemoryDataFn,
    pub get_memory_size: abi::GetMemorySizeFn,
    pub cheat_reset: abi::VoidFn,
    pub cheat_set: abi::CheatSetFn,

    pub set_environment: abi::SetEnvironmentFn,
    pub set_video_refresh: abi::SetVideoRefreshFn,
    pub set_audio_sample: abi::SetAudioSampleFn,
    pub set_audio_sample_batch: abi::SetAudioSampleBatchFn,
    pub set_input_poll: abi::SetInputPollFn,
    pub set_input_state: abi::SetInputStateFn,
    pub set_controller_port_device: abi::SetControllerPortDeviceFn,

    pub audio: Option<abi::VoidFn>,
    pub audio_set_state: Option<abi::AudioSetStateFn>,
    pub frame_time: Option<abi::FrameTimeFn>,
    pub keyboard_event: Option<abi::KeyboardEventFn>,
}

/// Look a symbol up and give it the type of the destination slot.
///
/// Missing symbols are recorded in `$missing` and a placeholder is not produced; the caller
/// bails out before any typed value escapes.
macro_rules! resolve {
    ($module:expr, $missing:expr, $name:expr, $ty:ty) => {{
        match $module.symbol($name) {
            // SAFETY: the address comes from the module under the libretro name of this entry
            // point, whose C signature `$ty` mirrors.
            Some(addr) if !addr.is_null() => Some(unsafe { std::mem::transmute::<*const c_void, $ty>(addr) }),
            _ => {
                $missing.push($name);
                None
            }
        }
    }};
}

macro_rules! resolve_optional {
    ($module:expr, $name:expr, $ty:ty) => {{
        match $module.symbol($name) {
            // SAFETY: see `resolve!`.
            Some(addr) if !addr.is_null() => Some(unsafe { std::mem::transmute::<*const c_void, $ty>(addr) }),
            _ => None,
        }
    }};
}

impl CoreSymbols {
    /// Resolve every entry point from `module`.
    ///
    /// Fails listing every missing mandatory symbol; optional ones are simply left out.
    pub fn resolve(module: &dyn CoreModule) -> Result<Self, MissingSymbols> {
        let mut missing = Vec::new();

        let api_version = resolve!(module, missing, sym::API_VERSION, abi::ApiVersionFn);
        let init = resolve!(module, missing, sym::INIT, abi::VoidFn);
        let deinit = resolve!(module, missing, sym::DEINIT, abi::VoidFn);
        let get_system_info = resolve!(module, missing, sym::GET_SYSTEM_INFO, abi::GetSystemInfoFn);
        let get_system_av_info =
            resolve!(module, missing, sym::GET_SYSTEM_AV_INFO, abi::GetSystemAvInfoFn);
        let get_region = resolve!(module, missing, sym::GET_REGION, abi::GetRegionFn);
        let load_game = resolve!(module, missing, sym::LOAD_GAME, abi::LoadGameFn);
        let load_game_special =
            resolve!(module, missing, sym::LOAD_GAME_SPECIAL, abi::LoadGameSpecialFn);
        let unload_game = resolve!(module, missing, sym::UNLOAD_GAME, abi::VoidFn);
        let run = resolve!(module, missing, sym::RUN, abi::VoidFn);
        let reset = resolve!(module, missing, sym::RESET, abi::VoidFn);
        let serialize_size = resolve!(module, missing, sym::SERIALIZE_SIZE, abi::SerializeSizeFn);
        let serialize = resolve!(module, missing, sym::SERIALIZE, abi::SerializeFn);
        let unserialize = resolve!(module, missing, sym::UNSERIALIZE, abi::UnserializeFn);
        let get_memory_data =
            resolve!(module, missing, sym::GET_MEMORY_DATA, abi::GetMemoryDataFn);
        let get_memory_size =
            resolve!(module, missing, sym::GET_MEMORY_SIZE, abi::GetMemorySizeFn);
        let cheat_reset = resolve!(module, missing, sym::CHEAT_RESET, abi::VoidFn);
        let cheat_set = resolve!(module, missing, sym::CHEAT_SET, abi::CheatSetFn);

        let set_environment =
            resolve!(module, missing, sym::SET_ENVIRONMENT, abi::SetEnvironmentFn);
        let set_video_refresh =
            resolve!(module, missing, sym::SET_VIDEO_REFRESH, abi::SetVideoRefreshFn);
        let set_audio_sample =
            resolve!(module, missing, sym::SET_AUDIO_SAMPLE, abi::SetAudioSampleFn);
        let set_audio_sample_batch = resolve!(
            module,
            missing,
            sym::SET_AUDIO_SAMPLE_BATCH,
            abi::SetAudioSampleBatchFn
        );
        let set_input_poll = resolve!(module, missing, sym::SET_INPUT_POLL, abi::SetInputPollFn);
        let set_input_state =
            resolve!(module, missing, sym::SET_INPUT_STATE, abi::SetInputStateFn);
        let set_controller_port_device = resolve!(
            module,
            missing,
            sym::SET_CONTROLLER_PORT_DEVICE,
            abi::SetControllerPortDeviceFn
        );

        let audio = resolve_optional!(module, sym::AUDIO, abi::VoidFn);
        let audio_set_state = resolve_optional!(module, sym::AUDIO_SET_STATE, abi::AudioSetStateFn);
        let frame_time = resolve_optional!(module, sym::FRAME_TIME, abi::FrameTimeFn);
        let keyboard_event = resolve_optional!(module, sym::KEYBOARD_EVENT, abi::KeyboardEventFn);

        // Every `None` below is also in `missing`, so this only succeeds when all are `Some`.
        let resolved = (|| {
            Some(Self {
                api_version: api_version?,
                init: init?,
                deinit: deinit?,
                get_system_info: get_system_info?,
                get_system_av_info: get_system_av_info?,
                get_region: get_region?,
                load_game: load_game?,
                load_game_special: load_game_special?,
                unload_game: unload_game?,
                run: run?,
                reset: reset?,
                serialize_size: serialize_size?,
                serialize: serialize?,
                unserialize: unserialize?,
                get_memory_data: get_memory_data?,
                get_memory_size: get_memory_size?,
                cheat_reset: cheat_reset?,
                cheat_set: cheat_set?,
                set_environment: set_environment?,
                set_video_refresh: set_video_refresh?,
                set_audio_sample: set_audio_sample?,
                set_audio_sample_batch: set_audio_sample_batch?,
                set_input_poll: set_input_poll?,
                set_input_state: set_input_state?,
                set_controller_port_device: set_controller_port_device?,
                audio,
                audio_set_state,
                frame_time,
                keyboard_event,
            })
        })();

        match resolved {
            Some(symbols) if missing.is_empty() => Ok(symbols),
            _ => Err(MissingSymbols(missing)),
        }
    }

    /// Number of optional entry points the core provides.
    pub fn optional_count(&self) -> usize {
        [
            self.audio.is_some(),
            self.audio_set_state.is_some(),
            self.frame_time.is_some(),
            self.keyboard_event.is_some(),
        ]
        .into_iter()
        .filter(|present| *present)
        .count()
    }
}

impl std::fmt::Debug for CoreSymbols {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreSymbols")
            .field("optional", &self.optional_count())
            .finish_non_exhaustive()
    }
}

/// A loaded core: the module plus its resolved symbol table.
///
/// Field order matters: `symbols` are plain copies of addresses inside `module`, and nothing
/// may call through them once `module` is gone. Both drop together with the handle.
pub struct PluginHandle {
    symbols: CoreSymbols,
    path: PathBuf,
    module: Box<dyn CoreModule>,
}

impl PluginHandle {
    /// Resolve `module`'s symbol table. A module missing mandatory symbols is dropped here.
    pub fn new(module: Box<dyn CoreModule>, path: &Path) -> Result<Self, MissingSymbols> {
        let symbols = CoreSymbols::resolve(module.as_ref())?;
        Ok(Self {
            symbols,
            path: path.to_path_buf(),
            module,
        })
    }

    pub fn symbols(&self) -> &CoreSymbols {
        &self.symbols
    }

    /// Path the core was loaded from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Look up an arbitrary export (for cores with private extensions).
    pub fn raw_symbol(&self, name: &str) -> Option<*const c_void> {
        self.module.symbol(name)
    }
}

impl std::fmt::Debug for PluginHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginHandle")
            .field("path", &self.path)
            .field("symbols", &self.symbols)
            .finish()
    }
}

impl MemoryRegions for PluginHandle {
    fn region(&mut self, id: c_uint) -> Option<&mut [u8]> {
        // SAFETY: entry points belong to the live module owned by `self`.
        let (data, size) = unsafe {
            (
                (self.symbols.get_memory_data)(id),
                (self.symbols.get_memory_size)(id),
            )
        };
        if data.is_null() || size == 0 {
            return None;
        }
        // SAFETY: the core reports `size` valid bytes at `data`, owned by the core and stable
        // while content is loaded. The borrow is tied to `&mut self`, so no other call into the
        // core can happen while the slice is alive.
        Some(unsafe { std::slice::from_raw_parts_mut(data.cast::<u8>(), size) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct TableModule(HashMap<&'static str, usize>);

    impl CoreModule for TableModule {
        fn symbol(&self, name: &str) -> Option<*const c_void> {
            self.0.get(name).map(|addr| *addr as *const c_void)
        }
    }

    unsafe extern "C" fn noop() {}

    fn every_mandatory_name() -> Vec<&'static str> {
        vec![
            sym::API_VERSION,
            sym::INIT,
            sym::DEINIT,
            sym::GET_SYSTEM_INFO,
            sym::GET_SYSTEM_AV_INFO,
            sym::GET_REGION,
            sym::LOAD_GAME,
            sym::LOAD_GAME_SPECIAL,
            sym::UNLOAD_GAME,
            sym::RUN,
            sym::RESET,
            sym::SERIALIZE_SIZE,
            sym::SERIALIZE,
            sym::UNSERIALIZE,
            sym::GET_MEMORY_DATA,
            sym::GET_MEMORY_SIZE,
            sym::CHEAT_RESET,
            sym::CHEAT_SET,
            sym::SET_ENVIRONMENT,
            sym::SET_VIDEO_REFRESH,
            sym::SET_AUDIO_SAMPLE,
            sym::SET_AUDIO_SAMPLE_BATCH,
            sym::SET_INPUT_POLL,
            sym::SET_INPUT_STATE,
            sym::SET_CONTROLLER_PORT_DEVICE,
        ]
    }

    // Resolution never calls through the addresses, so one placeholder serves every name.
    fn module_with(names: &[&'static str]) -> TableModule {
        TableModule(names.iter().map(|n| (*n, noop as usize)).collect())
    }

    #[test]
    fn resolves_when_all_mandatory_symbols_exist() {
        let module = module_with(&every_mandatory_name());
        let symbols = CoreSymbols::resolve(&module).expect("all mandatory symbols present");
        assert_eq!(symbols.optional_count(), 0);
    }

    #[test]
    fn optional_symbols_are_picked_up() {
        let mut names = every_mandatory_name();
        names.push(sym::FRAME_TIME);
        names.push(sym::KEYBOARD_EVENT);
        let symbols = CoreSymbols::resolve(&module_with(&names)).unwrap();
        assert_eq!(symbols.optional_count(), 2);
        assert!(symbols.frame_time.is_some());
        assert!(symbols.audio.is_none());
    }

    #[test]
    fn missing_mandatory_symbols_are_all_reported() {
        let names: Vec<_> = every_mandatory_name()
            .into_iter()
            .filter(|n| *n != sym::RUN && *n != sym::SET_INPUT_STATE)
            .collect();

        let err = CoreSymbols::resolve(&module_with(&names)).unwrap_err();
        assert_eq!(err.0, vec![sym::RUN, sym::SET_INPUT_STATE]);
        assert!(err.to_string().contains("retro_run"));
    }

    #[test]
    fn handle_is_not_built_from_a_partial_table() {
        let module = Box::new(module_with(&[sym::API_VERSION, sym::INIT]));
        assert!(PluginHandle::new(module, Path::new("partial.so")).is_err());
    }
}
