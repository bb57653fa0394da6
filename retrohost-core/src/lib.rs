//! retrohost-core: a host adapter for dynamically loaded libretro cores.
//!
//! The adapter opens a core (a shared library implementing the libretro C ABI), resolves its
//! `retro_*` entry points and drives it through a strict lifecycle:
//!
//! ```text
//! load_core -> load_content -> run_frame* -> unload
//! ```
//!
//! While a frame runs, the core calls back into the host synchronously (video refresh, audio
//! samples, input, environment queries). Those callbacks land in per-stream frame pools; after
//! `retro_run` returns the adapter drains the pools and sends the frames to the controller as
//! [`Event`]s over a channel.
//!
//! Only one adapter per process can drive a core at a time, because libretro callbacks carry no
//! user data. [`is_occupied`] reports whether some adapter currently holds the callback context.
//!
//! The ABI surface is defined in [`abi`].

pub mod abi;
mod adapter;
pub mod av;
mod bridge;
pub mod config;
pub mod error;
pub mod input;
pub mod loader;
pub mod sram;
mod state;
pub mod symbols;
pub mod variables;

pub use adapter::{Adapter, AdapterState, CoreInfo, DroppedFrames, Event, Region, StateChange};
pub use av::{AudioFrameBuffer, AvInfo, Geometry, Timing, VideoFrameBuffer};
pub use bridge::CORE_LOG_TARGET;
pub use config::AdapterConfig;
pub use error::{AdapterError, LoadError, SramError};
pub use input::{InputBinding, InputProvider, NoInput, SharedJoypads};
pub use loader::{CoreModule, LibraryLoader, ModuleLoader, OpenFailure};
pub use state::{FrameGuard, begin_frame, frame_in_flight, is_occupied};
pub use variables::{Variable, VariableError};
