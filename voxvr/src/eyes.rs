use voxvr_api::matrix::{self, Matrix};
use voxvr_api::{identity_matrix, VREye, VRSystem};

/// Per-eye static projection and eye-to-head transforms.
///
/// Queried from the runtime exactly once at setup and never recomputed; the
/// cached matrices are constant for the session.
pub struct EyeCameraRig {
    composed: [Matrix; 2],
    eye_to_head_inv: [Matrix; 2],
    near_z: f32,
    far_z: f32,
}

impl EyeCameraRig {
    pub fn new(system: &dyn VRSystem, near_z: f32, far_z: f32) -> EyeCameraRig {
        let mut composed = [identity_matrix!(); 2];
        let mut eye_to_head_inv = [identity_matrix!(); 2];

        for eye in VREye::BOTH {
            let i = eye.index();
            let projection = matrix::from_hmd44(&system.projection_matrix(eye, near_z, far_z));
            let eye_to_head = matrix::from_hmd34(&system.eye_to_head_transform(eye));
            eye_to_head_inv[i] =
                matrix::inverse(&eye_to_head).unwrap_or_else(|| identity_matrix!());
            composed[i] = matrix::multiply(&projection, &eye_to_head_inv[i]);
        }

        EyeCameraRig {
            composed,
            eye_to_head_inv,
            near_z,
            far_z,
        }
    }

    /// Projection for one eye, with the inverse eye-to-head transform baked
    /// in so callers only prepend the head-pose view matrix. `None` yields an
    /// identity projection for monoscopic fallback rendering.
    pub fn projection(&self, eye: Option<VREye>) -> Matrix {
        match eye {
            Some(eye) => self.composed[eye.index()],
            None => identity_matrix!(),
        }
    }

    /// Inverse of the fixed eye offset from the head center.
    pub fn eye_to_head_inv(&self, eye: VREye) -> &Matrix {
        &self.eye_to_head_inv[eye.index()]
    }

    pub fn near_z(&self) -> f32 {
        self.near_z
    }

    pub fn far_z(&self) -> f32 {
        self.far_z
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use voxvr_api::{HmdMatrix34, HmdMatrix44, VRDeviceProperty, VRPropertyError};

    struct CountingSystem {
        queries: std::cell::Cell<u32>,
    }

    impl VRSystem for CountingSystem {
        fn projection_matrix(&self, eye: VREye, near_z: f32, _far_z: f32) -> HmdMatrix44 {
            self.queries.set(self.queries.get() + 1);
            let x = if eye == VREye::Left { -0.057 } else { 0.055 };
            [
                [0.756, 0.0, x, 0.0],
                [0.0, 0.68, -0.002, 0.0],
                [0.0, 0.0, -1.0001, -2.0 * near_z],
                [0.0, 0.0, -1.0, 0.0],
            ]
        }

        fn eye_to_head_transform(&self, eye: VREye) -> HmdMatrix34 {
            let x = if eye == VREye::Left { -0.0359 } else { 0.0359 };
            [
                [1.0, 0.0, 0.0, x],
                [0.0, 1.0, 0.0, 0.0],
                [0.0, 0.0, 1.0, 0.0],
            ]
        }

        fn recommended_render_target_size(&self) -> (u32, u32) {
            (1512, 1680)
        }

        fn string_tracked_device_property(
            &self,
            device: u32,
            _prop: VRDeviceProperty,
        ) -> Result<String, VRPropertyError> {
            Err(VRPropertyError::UnknownDevice(device))
        }
    }

    #[test]
    fn projection_is_cached_and_stable() {
        let system = CountingSystem {
            queries: std::cell::Cell::new(0),
        };
        let rig = EyeCameraRig::new(&system, 0.1, 512.0);
        let queried_at_setup = system.queries.get();
        assert_eq!(queried_at_setup, 2);

        let a = rig.projection(Some(VREye::Left));
        let b = rig.projection(Some(VREye::Left));
        assert_eq!(a, b);
        // Repeated queries never go back to the runtime.
        assert_eq!(system.queries.get(), queried_at_setup);
    }

    #[test]
    fn eye_offset_is_baked_into_projection() {
        let system = CountingSystem {
            queries: std::cell::Cell::new(0),
        };
        let rig = EyeCameraRig::new(&system, 0.1, 512.0);
        // The left/right composed projections differ by the mirrored offsets.
        assert_ne!(rig.projection(Some(VREye::Left)), rig.projection(Some(VREye::Right)));
        // Inverse of a +x eye offset translates by -x.
        assert!((rig.eye_to_head_inv(VREye::Right)[12] + 0.0359).abs() < 1e-5);
    }

    #[test]
    fn unknown_eye_yields_identity() {
        let system = CountingSystem {
            queries: std::cell::Cell::new(0),
        };
        let rig = EyeCameraRig::new(&system, 0.1, 512.0);
        let id: Matrix = identity_matrix!();
        assert_eq!(rig.projection(None), id);
    }
}
