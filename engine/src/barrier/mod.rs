//! Barrier Framework: generic polling and event-stream barrier shapes, plus
//! the concrete barriers the Scene Executor waits on between steps.

mod concrete;
mod event_stream;
mod polling;

pub use concrete::{
    AppReadyBarrier, DeviceConnectedBarrier, DeviceReadyBarrier, DualCameraStabilityBarrier,
    HotReloadBarrier, VisualStabilityBarrier, VmServiceReadyBarrier,
};
pub use event_stream::wait_for_event;
pub use polling::poll_until;
