//! Shared data model: value types used across every other engine module.

pub mod barrier;
pub mod device;
pub mod interaction;
pub mod observation;
pub mod scene;
pub mod session;

pub use barrier::{BarrierConfig, BarrierResult, FlexDuration};
pub use device::{Device, DeviceState};
pub use interaction::{is_namespaced_label, resolve_key_code, Interaction};
pub use observation::{
    DiffRegion, ObservationBundle, ObservationMetadata, OverlayDetectionResult, StabilityStatus,
};
pub use scene::{Checkpoint, Scene, SceneSetup, Step};
pub use session::{AppInfo, SessionState};
