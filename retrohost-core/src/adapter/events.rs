use crate::av::{AudioFrameBuffer, AvInfo, VideoFrameBuffer};
use crate::error::LoadError;

/// Lifecycle state of an [`Adapter`](crate::Adapter).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum AdapterState {
    #[default]
    Uninitialized,
    Ready,
    Finished,
    Error,
}

/// A lifecycle transition and its payload.
#[derive(Debug, Clone, PartialEq)]
pub enum StateChange {
    Uninitialized,
    /// Content is loaded; timing, geometry and pixel format are final until the next reload.
    Ready(AvInfo),
    Finished,
    Error(LoadError),
}

impl StateChange {
    /// The state this change moves into.
    pub fn state(&self) -> AdapterState {
        match self {
            StateChange::Uninitialized => AdapterState::Uninitialized,
            StateChange::Ready(_) => AdapterState::Ready,
            StateChange::Finished => AdapterState::Finished,
            StateChange::Error(_) => AdapterState::Error,
        }
    }
}

/// Notifications sent to the controller.
///
/// Media events for a frame are sent after `retro_run` returns, video first, then audio, then
/// [`Event::FrameRendered`].
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    StateChanged(StateChange),
    AudioDataReady(AudioFrameBuffer),
    VideoDataReady(VideoFrameBuffer),
    FrameRendered,
}
