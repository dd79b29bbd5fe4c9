//! HMD integration layer for a voxel-world game client.
//!
//! Bridges the client's OpenGL renderer to a room-scale VR runtime: per-frame
//! pose acquisition, per-eye projection/view matrices, dual offscreen render
//! targets with multisample resolve, compositor submission, controller
//! actions, and the first/third-person camera model fused with headset
//! orientation.
//!
//! The runtime itself sits behind the trait contract in `voxvr-api`;
//! backends live under [`api`] and are selected with cargo features
//! (`mock` by default, `openvr` for SteamVR).

pub mod api;
pub mod camera;
pub mod controller;
pub mod eyes;
pub mod game_input;
pub mod options;
pub mod pose_tracker;
pub mod session;
pub mod targets;

pub use voxvr_api::*;
pub use voxvr_api::identity_matrix;

pub use crate::camera::{
    AvatarState, CameraCollider, CameraKind, CameraOptions, CameraSystem, OrientationUpdate,
};
pub use crate::controller::{
    Controller, ControllerMeshBuffers, ControllerRig, GlMeshUploader, Hand, MeshUploader,
};
pub use crate::eyes::EyeCameraRig;
pub use crate::game_input::{GameBinding, InputSink};
pub use crate::options::{DefaultOptions, Options};
pub use crate::pose_tracker::PoseTracker;
pub use crate::session::{
    FramePhase, VRRuntimeHandles, VRSession, VRSessionConfig, VRSessionError,
};
pub use crate::targets::{EyeTargets, GlStereoTargets};
