//! Data model and runtime contract for the voxvr HMD integration layer.
//!
//! This crate defines the types exchanged with a room-scale VR runtime and
//! the per-concern traits (`VRSystem`, `VRCompositor`, `VRInput`,
//! `VRRenderModels`) that backends in the `voxvr` crate implement.

#[macro_export]
macro_rules! identity_matrix {
    () => {
        [
            1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0,
        ]
    };
}

pub mod compositor;
pub mod eye;
pub mod input;
pub mod matrix;
pub mod pose;
pub mod render_model;
pub mod system;

pub use crate::compositor::{VRCompositor, VRCompositorError};
pub use crate::eye::VREye;
pub use crate::input::{
    VRActionHandle, VRActionSetHandle, VRAnalogActionData, VRDigitalActionData, VRInput,
    VRInputError, VRPoseActionData,
};
pub use crate::matrix::{HmdMatrix34, HmdMatrix44, Matrix};
pub use crate::pose::{TrackedDevicePose, HMD_DEVICE_INDEX, MAX_TRACKED_DEVICES};
pub use crate::render_model::{VRModelLoad, VRModelMesh, VRModelVertex, VRRenderModels};
pub use crate::system::{VRDeviceProperty, VRPropertyError, VRSystem};
