use log::debug;
use voxvr_api::matrix::{self, Matrix};
use voxvr_api::{
    identity_matrix, TrackedDevicePose, VRCompositor, VRCompositorError, HMD_DEVICE_INDEX,
    MAX_TRACKED_DEVICES,
};

/// Per-frame snapshot of all tracked device transforms.
///
/// A device slot keeps its last valid transform when the runtime reports the
/// pose invalid, so a brief tracking drop never snaps a device to identity.
/// The head pose (the inverse of the HMD transform, directly usable as a view
/// matrix) follows the same last-known-good policy.
pub struct PoseTracker {
    device_poses: [Matrix; MAX_TRACKED_DEVICES],
    head_pose: Matrix,
    scratch: [TrackedDevicePose; MAX_TRACKED_DEVICES],
}

impl PoseTracker {
    pub fn new() -> PoseTracker {
        PoseTracker {
            device_poses: [identity_matrix!(); MAX_TRACKED_DEVICES],
            head_pose: identity_matrix!(),
            scratch: [TrackedDevicePose::default(); MAX_TRACKED_DEVICES],
        }
    }

    /// Fetch current poses from the compositor. Blocks at the compositor's
    /// frame pacing point; call exactly once per frame, before rendering.
    pub fn refresh(
        &mut self,
        compositor: &mut dyn VRCompositor,
    ) -> Result<(), VRCompositorError> {
        match compositor.wait_get_poses(&mut self.scratch) {
            Ok(()) => {}
            // Not displaying (dashboard open etc.); keep going with whatever
            // poses the compositor filled in.
            Err(VRCompositorError::DoNotHaveFocus) => debug!("WaitGetPoses: no focus"),
            Err(err) => return Err(err),
        }

        for (cached, sample) in self.device_poses.iter_mut().zip(self.scratch.iter()) {
            if sample.is_valid {
                *cached = matrix::from_hmd34(&sample.device_to_absolute);
            }
        }

        if self.scratch[HMD_DEVICE_INDEX as usize].is_valid {
            if let Some(inv) = matrix::inverse(&self.device_poses[HMD_DEVICE_INDEX as usize]) {
                self.head_pose = inv;
            }
        }

        Ok(())
    }

    /// Inverse of the HMD transform, usable as a view matrix.
    pub fn head_pose(&self) -> &Matrix {
        &self.head_pose
    }

    /// Raw device-to-tracking-origin transform for a device slot.
    pub fn device_pose(&self, device: u32) -> &Matrix {
        &self.device_poses[device as usize % MAX_TRACKED_DEVICES]
    }

    /// The HMD's raw (non-inverted) transform.
    pub fn hmd_pose(&self) -> &Matrix {
        self.device_pose(HMD_DEVICE_INDEX)
    }
}

impl Default for PoseTracker {
    fn default() -> PoseTracker {
        PoseTracker::new()
    }
}
