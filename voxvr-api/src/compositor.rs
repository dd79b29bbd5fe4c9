use crate::eye::VREye;
use crate::pose::TrackedDevicePose;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum VRCompositorError {
    /// The compositor is not displaying this application (e.g. the runtime
    /// dashboard is open). Tolerated: the frame loop proceeds.
    #[error("compositor does not have focus")]
    DoNotHaveFocus,
    /// Any other compositor error. Fatal for the session.
    #[error("compositor call failed with code {0}")]
    Failed(i32),
}

/// The runtime's frame-pacing and display-submission interface.
pub trait VRCompositor {
    /// Block until the compositor's pacing point and fetch current poses for
    /// all device slots. Must be called exactly once per rendered frame,
    /// before rendering. Implementations fill `poses` with whatever data is
    /// available even when returning [`VRCompositorError::DoNotHaveFocus`].
    fn wait_get_poses(&mut self, poses: &mut [TrackedDevicePose])
        -> Result<(), VRCompositorError>;

    /// Submit one eye's rendered texture. Called exactly once per eye per
    /// frame, after rendering and any multisample resolve.
    fn submit(&mut self, eye: VREye, texture_id: u32) -> Result<(), VRCompositorError>;
}
