use crate::eye::VREye;
use crate::matrix::{HmdMatrix34, HmdMatrix44};
use thiserror::Error;

/// String properties this layer reads from tracked devices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VRDeviceProperty {
    TrackingSystemName,
    SerialNumber,
    RenderModelName,
}

#[derive(Debug, Clone, Error)]
pub enum VRPropertyError {
    #[error("device {0} is not tracked")]
    UnknownDevice(u32),
    #[error("property read failed with code {0}")]
    Failed(i32),
}

/// The runtime's head/system interface.
///
/// The per-eye queries are constant for the lifetime of the runtime session;
/// callers cache their results at setup.
pub trait VRSystem {
    /// Row-major projection for one eye and the given clip planes.
    fn projection_matrix(&self, eye: VREye, near_z: f32, far_z: f32) -> HmdMatrix44;

    /// Fixed transform from an eye's optical center to the head origin.
    fn eye_to_head_transform(&self, eye: VREye) -> HmdMatrix34;

    /// Recommended per-eye render target size in pixels.
    fn recommended_render_target_size(&self) -> (u32, u32);

    fn string_tracked_device_property(
        &self,
        device: u32,
        prop: VRDeviceProperty,
    ) -> Result<String, VRPropertyError>;
}
