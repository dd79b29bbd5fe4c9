use crate::pose::TrackedDevicePose;
use std::path::Path;
use thiserror::Error;

pub type VRActionHandle = u64;
pub type VRActionSetHandle = u64;

/// State of a boolean action for the current update.
#[derive(Debug, Clone, Copy, Default)]
pub struct VRDigitalActionData {
    pub active: bool,
    pub state: bool,
    /// Whether `state` differs from the previous update. Consumers forward
    /// edge transitions only.
    pub changed: bool,
}

/// State of a two-axis analog action for the current update.
#[derive(Debug, Clone, Copy, Default)]
pub struct VRAnalogActionData {
    pub active: bool,
    pub x: f32,
    pub y: f32,
}

/// Predicted pose of a pose action, plus the physical device it came from.
#[derive(Debug, Clone, Copy, Default)]
pub struct VRPoseActionData {
    pub active: bool,
    pub pose: TrackedDevicePose,
    pub origin_device: Option<u32>,
}

#[derive(Debug, Clone, Error)]
pub enum VRInputError {
    #[error("invalid action manifest: {0}")]
    InvalidManifest(String),
    #[error("no handle for {0:?}")]
    UnknownName(String),
    #[error("input call failed with code {0}")]
    Failed(i32),
}

/// The runtime's action system: logical named actions resolved from a
/// manifest and updated once per frame.
pub trait VRInput {
    fn set_action_manifest_path(&mut self, path: &Path) -> Result<(), VRInputError>;

    fn action_set_handle(&mut self, name: &str) -> Result<VRActionSetHandle, VRInputError>;

    fn action_handle(&mut self, name: &str) -> Result<VRActionHandle, VRInputError>;

    /// Declare the active action set and refresh all action state.
    /// Called once per frame before any `*_action_data` query.
    fn update_action_state(&mut self, active_set: VRActionSetHandle) -> Result<(), VRInputError>;

    fn digital_action_data(
        &mut self,
        action: VRActionHandle,
    ) -> Result<VRDigitalActionData, VRInputError>;

    fn analog_action_data(
        &mut self,
        action: VRActionHandle,
    ) -> Result<VRAnalogActionData, VRInputError>;

    /// Pose predicted for the *next* frame, compensating render latency.
    fn pose_action_data_next_frame(
        &mut self,
        action: VRActionHandle,
    ) -> Result<VRPoseActionData, VRInputError>;
}
