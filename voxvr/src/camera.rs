//! The game's camera model on top of the VR session: fuses mouse-accumulated
//! avatar yaw with headset orientation, and drives the first/third-person
//! variants including collision-aware third-person distance.

use voxvr_api::matrix::{self, Matrix};

use crate::options::Options;

/// Degrees of yaw per raw mouse-delta unit at sensitivity 1.
pub const SENSI_FACTOR: f32 = 0.0002 / 3.0 * (180.0 / std::f32::consts::PI);

pub const DEFAULT_ZOOM: f32 = 3.0;
pub const MIN_ZOOM: f32 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraKind {
    FirstPerson,
    ThirdPerson,
    /// Third person mirrored to face the avatar's front.
    ForwardThird,
}

impl CameraKind {
    pub fn is_third_person(self) -> bool {
        self != CameraKind::FirstPerson
    }
}

/// Cycle order for explicit camera switching.
const CYCLE_ORDER: [CameraKind; 3] = [
    CameraKind::FirstPerson,
    CameraKind::ThirdPerson,
    CameraKind::ForwardThird,
];

/// The slice of avatar state the camera reads each frame.
#[derive(Debug, Clone, Copy)]
pub struct AvatarState {
    pub position: [f32; 3],
    /// Previously committed pitch in degrees, used to resolve the clamp.
    pub prev_pitch: f32,
    /// Vertical view-bobbing offset from the movement animation.
    pub bobbing_ver: f32,
    pub third_person_allowed: bool,
    /// Whether the movement mode permits voluntary zoom-out.
    pub can_zoom: bool,
}

impl Default for AvatarState {
    fn default() -> AvatarState {
        AvatarState {
            position: [0.0, 0.0, 0.0],
            prev_pitch: 0.0,
            bobbing_ver: 0.0,
            third_person_allowed: true,
            can_zoom: true,
        }
    }
}

/// Orientation to commit to the avatar's location update, in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrientationUpdate {
    pub yaw: f32,
    pub pitch: f32,
}

/// External collision query used to keep the third-person camera out of
/// world geometry.
pub trait CameraCollider {
    /// Nearest valid camera position along `dir` from `target`, at most
    /// `max_dist` away.
    fn clip_camera_pos(&self, target: [f32; 3], dir: [f32; 3], max_dist: f32) -> [f32; 3];
}

/// Camera options read once at init from the game's options store.
#[derive(Debug, Clone, Copy)]
pub struct CameraOptions {
    pub sensitivity: i32,
    pub invert: bool,
    pub clipping: bool,
    pub fov: i32,
}

impl CameraOptions {
    pub fn load(options: &dyn Options) -> CameraOptions {
        CameraOptions {
            sensitivity: options.get_int("mouse-sensitivity", 1, 200, 30),
            invert: options.get_bool("invert-mouse", false),
            clipping: options.get_bool("camera-clipping", true),
            fov: options.get_int("fov", 1, 179, 70),
        }
    }
}

impl Default for CameraOptions {
    fn default() -> CameraOptions {
        CameraOptions::load(&crate::options::DefaultOptions)
    }
}

/// Wrap an angle into `[0, 360)` degrees.
fn normalize_deg(angle: f32) -> f32 {
    angle.rem_euclid(360.0)
}

/// Keep the committed pitch out of the open `(90, 270)` band, snapping to
/// whichever boundary is nearer the previously committed pitch. The
/// boundaries themselves pass through.
fn clamp_pitch(pitch: f32, prev_pitch: f32) -> f32 {
    if pitch > 90.0 && pitch < 270.0 {
        if normalize_deg(prev_pitch) < 180.0 {
            90.0
        } else {
            270.0
        }
    } else {
        pitch
    }
}

/// The camera registry and its shared orientation state.
pub struct CameraSystem {
    active: usize,
    /// Mouse-accumulated avatar yaw, degrees.
    mouse_yaw: f32,
    /// Orbit offset around the avatar, accumulated while the orbit modifier
    /// is held in third person; frozen on release, cleared on camera switch.
    orbit_yaw: f32,
    orbit_pitch: f32,
    dist_third: f32,
    dist_forward: f32,
    options: CameraOptions,
    projection_dirty: bool,
}

impl CameraSystem {
    pub fn new(options: CameraOptions) -> CameraSystem {
        CameraSystem {
            active: 0,
            mouse_yaw: 0.0,
            orbit_yaw: 0.0,
            orbit_pitch: 0.0,
            dist_third: DEFAULT_ZOOM,
            dist_forward: DEFAULT_ZOOM,
            options,
            projection_dirty: true,
        }
    }

    pub fn active(&self) -> CameraKind {
        CYCLE_ORDER[self.active]
    }

    pub fn options(&self) -> &CameraOptions {
        &self.options
    }

    /// Accumulate a raw mouse delta. While the orbit modifier is held in
    /// third person the delta moves the orbit offset instead of the avatar.
    pub fn on_raw_movement(&mut self, delta_x: f32, delta_y: f32, orbit_held: bool) {
        let sensitivity = SENSI_FACTOR * self.options.sensitivity as f32;
        let dx = delta_x * sensitivity;
        let mut dy = delta_y * sensitivity;
        if self.options.invert {
            dy = -dy;
        }

        if orbit_held && self.active().is_third_person() {
            self.orbit_yaw += dx;
            self.orbit_pitch += dy;
        } else {
            self.mouse_yaw += dx;
        }
    }

    /// Advance to the next camera variant. Lands on first person when the
    /// avatar is not allowed third person.
    pub fn cycle_active(&mut self, avatar: &AvatarState) -> CameraKind {
        self.active = (self.active + 1) % CYCLE_ORDER.len();
        if !avatar.third_person_allowed {
            self.active = 0;
        }
        self.reset_transients();
        self.active()
    }

    /// Permission change: fall back to first person when third person was
    /// revoked while active.
    pub fn on_permissions_changed(&mut self, avatar: &AvatarState) {
        if !avatar.third_person_allowed && self.active().is_third_person() {
            self.active = 0;
            self.reset_transients();
        }
    }

    fn reset_transients(&mut self) {
        self.orbit_yaw = 0.0;
        self.orbit_pitch = 0.0;
        self.projection_dirty = true;
    }

    /// Whether the projection matrix must be re-uploaded, cleared on read.
    pub fn take_projection_dirty(&mut self) -> bool {
        std::mem::replace(&mut self.projection_dirty, false)
    }

    /// Effective look yaw/pitch in radians for the active variant, fusing
    /// the mouse yaw with the headset's fresh orientation.
    pub fn orientation(&self, head_pose: &Matrix) -> (f32, f32) {
        let (hmd_yaw, hmd_pitch, _roll) = matrix::euler_yxz(head_pose);

        let mut yaw = self.mouse_yaw.to_radians();
        let mut pitch = 0.0;
        if self.active().is_third_person() {
            let mut orbit_pitch = self.orbit_pitch.to_radians();
            if self.active() == CameraKind::ForwardThird {
                yaw += std::f32::consts::PI;
                orbit_pitch = -orbit_pitch;
            }
            yaw += self.orbit_yaw.to_radians();
            pitch += orbit_pitch;
        }

        (yaw + hmd_yaw, pitch + hmd_pitch)
    }

    /// Orientation to commit to the avatar this frame: yaw from mouse plus
    /// headset, pitch from the headset alone, clamped away from the vertical
    /// crossover band.
    pub fn update_orientation(&self, head_pose: &Matrix, avatar: &AvatarState) -> OrientationUpdate {
        let (hmd_yaw, hmd_pitch, _roll) = matrix::euler_yxz(head_pose);

        let yaw = normalize_deg(self.mouse_yaw + hmd_yaw.to_degrees());
        let pitch = clamp_pitch(normalize_deg(hmd_pitch.to_degrees()), avatar.prev_pitch);
        OrientationUpdate { yaw, pitch }
    }

    /// Apply a zoom delta to the active third-person variant's stored
    /// distance. Returns false in first person.
    pub fn zoom(&mut self, amount: f32) -> bool {
        let dist = match self.active() {
            CameraKind::FirstPerson => return false,
            CameraKind::ThirdPerson => &mut self.dist_third,
            CameraKind::ForwardThird => &mut self.dist_forward,
        };
        *dist = (*dist - amount).max(MIN_ZOOM);
        true
    }

    /// Distance actually used this frame: the stored zoom, capped back to
    /// the default while the movement mode disallows zooming out. The stored
    /// value is untouched and becomes effective again once allowed.
    pub fn effective_zoom(&self, avatar: &AvatarState) -> f32 {
        let dist = match self.active() {
            CameraKind::ForwardThird => self.dist_forward,
            _ => self.dist_third,
        };
        if dist > DEFAULT_ZOOM && !avatar.can_zoom {
            DEFAULT_ZOOM
        } else {
            dist
        }
    }

    /// Camera position for this frame. Third person walks back along the
    /// negated look direction, clipped against world geometry.
    pub fn position(
        &self,
        head_pose: &Matrix,
        avatar: &AvatarState,
        collider: &dyn CameraCollider,
    ) -> [f32; 3] {
        if !self.active().is_third_person() {
            return avatar.position;
        }

        let mut target = avatar.position;
        target[1] += avatar.bobbing_ver;

        let (yaw, pitch) = self.orientation(head_pose);
        let look = matrix::dir_vector(yaw, pitch);
        let dir = [-look[0], -look[1], -look[2]];
        let dist = self.effective_zoom(avatar);

        if self.options.clipping {
            collider.clip_camera_pos(target, dir, dist)
        } else {
            [
                target[0] + dir[0] * dist,
                target[1] + dir[1] * dist,
                target[2] + dir[2] * dist,
            ]
        }
    }

    /// View matrix: yaw-only look rotation at `camera_pos`, composed with
    /// the headset view. The headset supplies pitch and roll itself.
    pub fn view(&self, head_pose: &Matrix, camera_pos: [f32; 3]) -> Matrix {
        let look = matrix::view_rot(camera_pos, self.mouse_yaw.to_radians(), 0.0);
        matrix::multiply(head_pose, &look)
    }

    /// Ray for block picking: from the right controller when one is tracked,
    /// otherwise from the headset. Returns `(origin, direction)`.
    pub fn pick_ray(
        &self,
        avatar_pos: [f32; 3],
        controller_pose: Option<&Matrix>,
        hmd_pose: &Matrix,
    ) -> ([f32; 3], [f32; 3]) {
        let device = controller_pose.unwrap_or(hmd_pose);
        let base = matrix::multiply(
            &matrix::translation(avatar_pos[0], avatar_pos[1], avatar_pos[2]),
            &matrix::rotation_y(-self.mouse_yaw.to_radians()),
        );
        let m = matrix::multiply(&base, device);
        (matrix::position_of(&m), matrix::forward_of(&m))
    }
}

impl Default for CameraSystem {
    fn default() -> CameraSystem {
        CameraSystem::new(CameraOptions::default())
    }
}
