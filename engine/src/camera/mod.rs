//! Two-Camera Observation subsystem: a Device Camera (ADB screencap) and a
//! Framework Camera (VM service), captured independently so the Overlay
//! Detector can compare what the compositor shows against what the
//! framework believes it is rendering.

mod device_camera;
mod framework_camera;

pub use device_camera::DeviceCamera;
pub use framework_camera::FrameworkCamera;
