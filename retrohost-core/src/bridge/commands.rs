//! Environment command dispatch.

use crate::abi::{InputDescriptor, Message, PixelFormat, Variable, env_cmd};
use crate::input::InputBinding;
use crate::state::Session;
use std::ffi::{CStr, CString, c_char, c_uint, c_void};

/// Answer one environment command against `session`.
///
/// # Safety
/// `data` must be the payload the libretro ABI prescribes for `cmd`.
pub(crate) unsafe fn dispatch(session: &mut Session, cmd: c_uint, data: *mut c_void) -> bool {
    // SAFETY (all arms): payload layout per command is fixed by the ABI; every arm null-checks
    // `data` before touching it.
    unsafe {
        match cmd {
            env_cmd::GET_OVERSCAN => write(data, false),
            env_cmd::GET_CAN_DUPE => write(data, true),
            env_cmd::SET_MESSAGE => set_message(data),
            env_cmd::SHUTDOWN => {
                log::info!("core requested shutdown");
                session.shutdown_requested = true;
                true
            }
            env_cmd::SET_PERFORMANCE_LEVEL => {
                if let Some(level) = read::<c_uint>(data) {
                    log::debug!("core performance level {level}");
                }
                true
            }
            env_cmd::GET_SYSTEM_DIRECTORY => write(data, session.system_directory.as_ptr()),
            env_cmd::GET_SAVE_DIRECTORY => write(data, session.save_directory.as_ptr()),
            env_cmd::GET_LIBRETRO_PATH => write(data, session.core_path.as_ptr()),
            env_cmd::SET_PIXEL_FORMAT => set_pixel_format(session, data),
            env_cmd::SET_INPUT_DESCRIPTORS => set_input_descriptors(session, data),
            // No rendering context is ever created, so the request is only recorded.
            env_cmd::SET_HW_RENDER => {
                session.hw_render_requested = true;
                log::warn!("core requested hardware rendering; refused");
                false
            }
            env_cmd::SET_VARIABLES => set_variables(session, data),
            env_cmd::GET_VARIABLE => get_variable(session, data),
            env_cmd::GET_VARIABLE_UPDATE => write(data, session.variables.take_updated()),
            env_cmd::SET_SUPPORT_NO_GAME => match read::<bool>(data) {
                Some(supported) => {
                    session.support_no_game = supported;
                    true
                }
                None => false,
            },
            env_cmd::GET_LOG_INTERFACE => write(data, super::log_interface()),
            _ => {
                log::debug!("unhandled environment command {cmd}");
                false
            }
        }
    }
}

unsafe fn write<T>(data: *mut c_void, value: T) -> bool {
    if data.is_null() {
        return false;
    }
    unsafe { data.cast::<T>().write(value) };
    true
}

unsafe fn read<T: Copy>(data: *const c_void) -> Option<T> {
    if data.is_null() {
        None
    } else {
        Some(unsafe { data.cast::<T>().read() })
    }
}

unsafe fn c_str(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        None
    } else {
        Some(unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned())
    }
}

unsafe fn set_message(data: *mut c_void) -> bool {
    if data.is_null() {
        return false;
    }
    let message = unsafe { &*data.cast::<Message>() };
    if let Some(text) = unsafe { c_str(message.msg) } {
        log::info!("core message ({} frames): {text}", message.frames);
    }
    true
}

unsafe fn set_pixel_format(session: &mut Session, data: *mut c_void) -> bool {
    let Some(raw) = (unsafe { read::<c_uint>(data) }) else {
        return false;
    };
    match PixelFormat::from_raw(raw) {
        Some(format) => {
            log::debug!("core selected pixel format {format:?}");
            session.video.set_pixel_format(format);
            true
        }
        None => {
            log::warn!("core requested unknown pixel format {raw}");
            false
        }
    }
}

unsafe fn set_input_descriptors(session: &mut Session, data: *mut c_void) -> bool {
    if data.is_null() {
        return false;
    }
    let mut bindings = Vec::new();
    let mut cursor = data.cast::<InputDescriptor>().cast_const();
    loop {
        let descriptor = unsafe { *cursor };
        let Some(description) = (unsafe { c_str(descriptor.description) }) else {
            break;
        };
        bindings.push(InputBinding {
            port: descriptor.port,
            device: descriptor.device,
            index: descriptor.index,
            id: descriptor.id,
            description,
        });
        cursor = unsafe { cursor.add(1) };
    }
    log::debug!("core declared {} input descriptors", bindings.len());
    session.input_bindings = bindings;
    true
}

unsafe fn set_variables(session: &mut Session, data: *mut c_void) -> bool {
    if data.is_null() {
        return false;
    }
    let mut declarations = Vec::new();
    let mut cursor = data.cast::<Variable>().cast_const();
    loop {
        let entry = unsafe { &*cursor };
        let Some(key) = (unsafe { c_str(entry.key) }) else {
            break;
        };
        let descriptor = unsafe { c_str(entry.value) }.unwrap_or_default();
        declarations.push((key, descriptor));
        cursor = unsafe { cursor.add(1) };
    }
    session
        .variables
        .declare(declarations.iter().map(|(k, d)| (k.as_str(), d.as_str())));
    session.handed_out.clear();
    true
}

unsafe fn get_variable(session: &mut Session, data: *mut c_void) -> bool {
    if data.is_null() {
        return false;
    }
    let entry = unsafe { &mut *data.cast::<Variable>() };
    entry.value = std::ptr::null();

    let Some(key) = (unsafe { c_str(entry.key) }) else {
        return false;
    };
    let Some(value) = session
        .variables
        .get(&key)
        .map(|var| var.effective_value())
        .filter(|value| !value.is_empty())
    else {
        log::debug!("core asked for undeclared or unset option {key:?}");
        return false;
    };

    let Ok(value) = CString::new(value) else {
        return false;
    };
    // The previous C string for this key is dropped here; the core must not hold on to it
    // across queries.
    let value = session.handed_out.entry(key).insert_entry(value);
    entry.value = value.get().as_ptr();
    true
}
