use gleam::gl::Gl;
use log::{debug, error, info};
use std::path::PathBuf;
use std::rc::Rc;
use thiserror::Error;
use voxvr_api::matrix::Matrix;
use voxvr_api::{
    VRCompositor, VRCompositorError, VRDeviceProperty, VREye, VRInput, VRInputError,
    VRRenderModels, VRSystem, HMD_DEVICE_INDEX,
};

use crate::controller::{ControllerError, ControllerRig, GlMeshUploader, Hand, MeshUploader};
use crate::eyes::EyeCameraRig;
use crate::game_input::InputSink;
use crate::pose_tracker::PoseTracker;
use crate::targets::{EyeTargets, GlStereoTargets, TargetError};

/// Everything a runtime backend hands over once its session is established.
pub struct VRRuntimeHandles {
    pub system: Box<dyn VRSystem>,
    pub compositor: Box<dyn VRCompositor>,
    pub input: Box<dyn VRInput>,
    pub render_models: Box<dyn VRRenderModels>,
}

pub struct VRSessionConfig {
    pub near_clip: f32,
    /// Far clip plane; the game's view distance.
    pub view_distance: f32,
    /// 1 disables multisampling.
    pub msaa_samples: i32,
    pub action_manifest: PathBuf,
}

impl Default for VRSessionConfig {
    fn default() -> VRSessionConfig {
        VRSessionConfig {
            near_clip: 0.1,
            view_distance: 512.0,
            msaa_samples: 4,
            action_manifest: PathBuf::from("voxvr_actions.json"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramePhase {
    Idle,
    Begun,
    Rendered,
}

/// Any error from setup or the frame loop is fatal for the VR session; the
/// host is expected to tear the session down rather than resume mid-frame.
#[derive(Debug, Error)]
pub enum VRSessionError {
    #[error("runtime init failed: {0}")]
    Init(String),
    #[error("{op} failed: {source}")]
    Compositor {
        op: &'static str,
        source: VRCompositorError,
    },
    #[error(transparent)]
    Input(#[from] VRInputError),
    #[error(transparent)]
    Controller(#[from] ControllerError),
    #[error(transparent)]
    Target(#[from] TargetError),
    #[error("{method} called during {phase:?}")]
    OutOfOrder {
        method: &'static str,
        phase: FramePhase,
    },
}

/// A running VR session: runtime interfaces, pose state, eye matrices,
/// render targets, and controllers, driven by one render thread.
///
/// Per-frame contract, in order: [`begin_frame`](VRSession::begin_frame),
/// [`render_stereo`](VRSession::render_stereo),
/// [`end_frame`](VRSession::end_frame).
pub struct VRSession {
    system: Box<dyn VRSystem>,
    compositor: Box<dyn VRCompositor>,
    input: Box<dyn VRInput>,
    render_models: Box<dyn VRRenderModels>,
    poses: PoseTracker,
    rig: EyeCameraRig,
    targets: Box<dyn EyeTargets>,
    uploader: Box<dyn MeshUploader>,
    controllers: ControllerRig,
    phase: FramePhase,
    headset: String,
}

impl VRSession {
    /// Establish a session over explicit target/uploader implementations.
    pub fn new(
        runtime: VRRuntimeHandles,
        targets: Box<dyn EyeTargets>,
        uploader: Box<dyn MeshUploader>,
        config: &VRSessionConfig,
    ) -> Result<VRSession, VRSessionError> {
        let VRRuntimeHandles {
            system,
            compositor,
            mut input,
            render_models,
        } = runtime;

        let rig = EyeCameraRig::new(&*system, config.near_clip, config.view_distance);
        let controllers = ControllerRig::new(&mut *input, &config.action_manifest)?;

        let name = system
            .string_tracked_device_property(HMD_DEVICE_INDEX, VRDeviceProperty::TrackingSystemName)
            .unwrap_or_else(|_| "unknown".into());
        let serial = system
            .string_tracked_device_property(HMD_DEVICE_INDEX, VRDeviceProperty::SerialNumber)
            .unwrap_or_else(|_| "unknown".into());
        let headset = format!("{} ({})", name, serial);
        info!("VR session up: {}", headset);

        Ok(VRSession {
            system,
            compositor,
            input,
            render_models,
            poses: PoseTracker::new(),
            rig,
            targets,
            uploader,
            controllers,
            phase: FramePhase::Idle,
            headset,
        })
    }

    /// Establish a session with GL-backed render targets sized to the
    /// runtime's recommendation.
    pub fn with_gl(
        runtime: VRRuntimeHandles,
        gl: Rc<dyn Gl>,
        config: &VRSessionConfig,
    ) -> Result<VRSession, VRSessionError> {
        let (width, height) = runtime.system.recommended_render_target_size();
        let targets = GlStereoTargets::new(gl.clone(), width, height, config.msaa_samples)?;
        VRSession::new(
            runtime,
            Box::new(targets),
            Box::new(GlMeshUploader::new(gl)),
            config,
        )
    }

    /// Refresh poses (blocking at the compositor's pacing point) and poll
    /// controller input, forwarding events into `sink`.
    pub fn begin_frame(&mut self, sink: &mut dyn InputSink) -> Result<(), VRSessionError> {
        self.expect_phase(FramePhase::Idle, "begin_frame")?;

        self.poses
            .refresh(&mut *self.compositor)
            .map_err(|source| {
                error!("WaitGetPoses failed: {}", source);
                VRSessionError::Compositor {
                    op: "WaitGetPoses",
                    source,
                }
            })?;

        self.controllers.update(
            &mut *self.input,
            &*self.system,
            &mut *self.render_models,
            &mut *self.uploader,
            sink,
        )?;

        self.phase = FramePhase::Begun;
        Ok(())
    }

    /// Invoke `scene` once per eye with that eye's framebuffer bound and
    /// viewport set, resolving multisampled color after each pass.
    pub fn render_stereo(
        &mut self,
        mut scene: impl FnMut(VREye, f64, f32),
        delta: f64,
        t: f32,
    ) -> Result<(), VRSessionError> {
        self.expect_phase(FramePhase::Begun, "render_stereo")?;

        for eye in VREye::BOTH {
            self.targets.bind(eye);
            scene(eye, delta, t);
            self.targets.unbind();
            self.targets.resolve(eye);
        }

        self.phase = FramePhase::Rendered;
        Ok(())
    }

    /// Draw the companion view into the window and submit both eye textures
    /// to the compositor.
    pub fn end_frame(
        &mut self,
        window_width: i32,
        window_height: i32,
    ) -> Result<(), VRSessionError> {
        self.expect_phase(FramePhase::Rendered, "end_frame")?;

        // Companion view first; it is cosmetic and must never block the
        // submission below.
        let half = window_width / 2;
        self.targets
            .blit_to_window(VREye::Left, (0, 0, half, window_height));
        self.targets
            .blit_to_window(VREye::Right, (half, 0, window_width, window_height));

        for eye in VREye::BOTH {
            let texture = self.targets.submit_texture(eye);
            match self.compositor.submit(eye, texture) {
                Ok(()) => {}
                Err(VRCompositorError::DoNotHaveFocus) => debug!("Submit {:?}: no focus", eye),
                Err(source) => {
                    error!("Submit {:?} failed: {}", eye, source);
                    return Err(VRSessionError::Compositor {
                        op: "Submit",
                        source,
                    });
                }
            }
        }

        self.phase = FramePhase::Idle;
        Ok(())
    }

    fn expect_phase(
        &self,
        expected: FramePhase,
        method: &'static str,
    ) -> Result<(), VRSessionError> {
        if self.phase != expected {
            return Err(VRSessionError::OutOfOrder {
                method,
                phase: self.phase,
            });
        }
        Ok(())
    }

    /// Inverse HMD transform, usable directly as a view matrix.
    pub fn head_pose(&self) -> &Matrix {
        self.poses.head_pose()
    }

    /// The HMD's raw device transform (not inverted).
    pub fn hmd_pose(&self) -> &Matrix {
        self.poses.hmd_pose()
    }

    pub fn device_pose(&self, device: u32) -> &Matrix {
        self.poses.device_pose(device)
    }

    /// Projection for one eye (`None` = identity, for monoscopic fallback).
    pub fn projection(&self, eye: Option<VREye>) -> Matrix {
        self.rig.projection(eye)
    }

    pub fn eye_rig(&self) -> &EyeCameraRig {
        &self.rig
    }

    pub fn controller(&self, hand: Hand) -> &crate::controller::Controller {
        self.controllers.controller(hand)
    }

    /// Current locomotion axis from the controllers.
    pub fn walk_axis(&mut self) -> Result<(f32, f32), VRSessionError> {
        Ok(self.controllers.walk_axis(&mut *self.input)?)
    }

    /// Per-eye render resolution.
    pub fn render_size(&self) -> (u32, u32) {
        self.targets.size()
    }

    /// Tracking system name and serial, for window titles and logs.
    pub fn headset_description(&self) -> &str {
        &self.headset
    }
}
