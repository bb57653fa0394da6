//! Input plumbing between the controller and the core.
//!
//! Responsibilities:
//! - Define the seam between the bridge's input callbacks and the controller's input mapping
//!   ([`InputProvider`]).
//! - Provide a ready-made RetroPad provider ([`SharedJoypads`]) that the controller updates from
//!   its own thread and the core reads during `retro_run`.
//!
//! Notes / constraints:
//! - `input_state` is called by the core many times per frame from inside `retro_run`, so it
//!   must be answered synchronously and cheaply.
//! - Input is snapshotted once per `input_poll`, so every query within a frame sees the same
//!   state.

use crate::abi::{JoypadButton, device};
use std::ffi::c_uint;
use std::sync::{Arc, Mutex, PoisonError};

/// Number of controller ports tracked by [`SharedJoypads`].
pub const MAX_PORTS: usize = 8;

/// The controller's input-mapping collaborator.
pub trait InputProvider: Send {
    /// Called when the core polls input, once per frame in well-behaved cores.
    fn poll(&mut self) {}

    /// Current value of `id` on `device` at `port`. Digital buttons report 0 or 1.
    fn state(&self, port: c_uint, device: c_uint, index: c_uint, id: c_uint) -> i16;
}

/// Reports nothing pressed.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoInput;

impl InputProvider for NoInput {
    fn state(&self, _port: c_uint, _device: c_uint, _index: c_uint, _id: c_uint) -> i16 {
        0
    }
}

/// RetroPad button bitmasks per port, shared between the controller and the bridge.
///
/// Clone it: the controller keeps one handle to press/release buttons, the adapter gets another
/// through [`Adapter::set_input_provider`](crate::Adapter::set_input_provider).
#[derive(Debug, Default, Clone)]
pub struct SharedJoypads {
    live: Arc<Mutex<[u16; MAX_PORTS]>>,
    /// Snapshot taken at the last poll.
    frame: [u16; MAX_PORTS],
}

impl SharedJoypads {
    pub fn new() -> Self {
        Self::default()
    }

    /// Press or release `button` on `port`. Out-of-range ports are ignored.
    pub fn set_button(&self, port: usize, button: JoypadButton, pressed: bool) {
        if port >= MAX_PORTS {
            return;
        }
        let mut live = self.live.lock().unwrap_or_else(PoisonError::into_inner);
        if pressed {
            live[port] |= button.mask();
        } else {
            live[port] &= !button.mask();
        }
    }

    /// Release everything on every port.
    pub fn clear(&self) {
        let mut live = self.live.lock().unwrap_or_else(PoisonError::into_inner);
        *live = [0; MAX_PORTS];
    }

    /// Button bits for `port` as of the last poll.
    pub fn snapshot(&self, port: usize) -> u16 {
        self.frame.get(port).copied().unwrap_or(0)
    }
}

impl InputProvider for SharedJoypads {
    fn poll(&mut self) {
        self.frame = *self.live.lock().unwrap_or_else(PoisonError::into_inner);
    }

    fn state(&self, port: c_uint, device_id: c_uint, _index: c_uint, id: c_uint) -> i16 {
        if device_id != device::JOYPAD {
            return 0;
        }
        let Some(button) = JoypadButton::from_id(id) else {
            return 0;
        };
        (self.snapshot(port as usize) & button.mask() != 0) as i16
    }
}

/// A core-declared label for one input (`SET_INPUT_DESCRIPTORS`).
///
/// For controller setting UIs: maps a RetroPad id to the name the core gives it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InputBinding {
    pub port: u32,
    pub device: u32,
    pub index: u32,
    pub id: u32,
    pub description: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presses_are_visible_only_after_poll() {
        let controller = SharedJoypads::new();
        let mut provider = controller.clone();

        controller.set_button(0, JoypadButton::A, true);
        assert_eq!(provider.state(0, device::JOYPAD, 0, JoypadButton::A as u32), 0);

        provider.poll();
        assert_eq!(provider.state(0, device::JOYPAD, 0, JoypadButton::A as u32), 1);
        assert_eq!(provider.state(0, device::JOYPAD, 0, JoypadButton::B as u32), 0);
        assert_eq!(provider.state(1, device::JOYPAD, 0, JoypadButton::A as u32), 0);

        controller.set_button(0, JoypadButton::A, false);
        provider.poll();
        assert_eq!(provider.state(0, device::JOYPAD, 0, JoypadButton::A as u32), 0);
    }

    #[test]
    fn other_devices_and_ports_read_zero() {
        let controller = SharedJoypads::new();
        let mut provider = controller.clone();
        controller.set_button(0, JoypadButton::Start, true);
        controller.set_button(MAX_PORTS, JoypadButton::Start, true);
        provider.poll();

        assert_eq!(provider.state(0, device::NONE, 0, JoypadButton::Start as u32), 0);
        assert_eq!(provider.state(0, device::JOYPAD, 0, 99), 0);
        assert_eq!(provider.state(MAX_PORTS as u32, device::JOYPAD, 0, 3), 0);
    }

    #[test]
    fn clear_releases_all_buttons() {
        let controller = SharedJoypads::new();
        let mut provider = controller.clone();
        controller.set_button(2, JoypadButton::L1, true);
        controller.clear();
        provider.poll();
        assert_eq!(provider.snapshot(2), 0);
    }
}
