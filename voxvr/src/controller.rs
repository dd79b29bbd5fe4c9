use gleam::gl::{self, Gl};
use log::{error, info};
use std::path::Path;
use std::rc::Rc;
use std::time::{Duration, Instant};
use thiserror::Error;
use voxvr_api::matrix::{self, Matrix};
use voxvr_api::{
    identity_matrix, VRActionHandle, VRActionSetHandle, VRDeviceProperty, VRInput, VRInputError,
    VRModelLoad, VRModelMesh, VRModelVertex, VRPropertyError, VRRenderModels, VRSystem,
};

use crate::game_input::{GameBinding, InputSink};

const ACTION_SET_MAIN: &str = "/actions/main";
const ACTION_HAND_LEFT: &str = "/actions/main/in/hand_left";
const ACTION_HAND_RIGHT: &str = "/actions/main/in/hand_right";
const ACTION_PLACE_BLOCK: &str = "/actions/main/in/place_block";
const ACTION_DELETE_BLOCK: &str = "/actions/main/in/delete_block";
const ACTION_PICK_BLOCK: &str = "/actions/main/in/pick_block";
const ACTION_JUMP: &str = "/actions/main/in/jump";
const ACTION_WALK_2_AXIS: &str = "/actions/main/in/walk_2_axis";
const ACTION_TURN_2_AXIS: &str = "/actions/main/in/turn_2_axis";

/// Analog turn input is forwarded in mouse-delta units.
const TURN_EVENT_SCALE: f32 = 20.0;

/// A newly seen render model polls at this interval while the runtime is
/// still loading it, and gives up at the deadline.
const MODEL_POLL_INTERVAL: Duration = Duration::from_millis(1);
const MODEL_LOAD_DEADLINE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hand {
    Left,
    Right,
}

impl Hand {
    pub const BOTH: [Hand; 2] = [Hand::Left, Hand::Right];

    fn index(self) -> usize {
        match self {
            Hand::Left => 0,
            Hand::Right => 1,
        }
    }
}

/// GPU buffers for one controller's render model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerMeshBuffers {
    pub vertex_array: u32,
    pub vertex_buffer: u32,
    pub index_buffer: u32,
    pub index_count: u32,
}

/// Owner of controller mesh GPU resources. Trait seam so the swap logic is
/// testable without a GL context.
pub trait MeshUploader {
    fn upload(&mut self, mesh: &VRModelMesh) -> ControllerMeshBuffers;
    fn release(&mut self, buffers: ControllerMeshBuffers);
}

/// Uploads controller meshes into GL vertex/index buffers.
pub struct GlMeshUploader {
    gl: Rc<dyn Gl>,
}

impl GlMeshUploader {
    pub fn new(gl: Rc<dyn Gl>) -> GlMeshUploader {
        GlMeshUploader { gl }
    }
}

impl MeshUploader for GlMeshUploader {
    fn upload(&mut self, mesh: &VRModelMesh) -> ControllerMeshBuffers {
        let gl = &*self.gl;
        let stride = std::mem::size_of::<VRModelVertex>() as i32;

        let vertex_array = gl.gen_vertex_arrays(1)[0];
        gl.bind_vertex_array(vertex_array);

        let vertex_buffer = gl.gen_buffers(1)[0];
        gl.bind_buffer(gl::ARRAY_BUFFER, vertex_buffer);
        gl::buffer_data(gl, gl::ARRAY_BUFFER, &mesh.vertices, gl::STATIC_DRAW);

        gl.enable_vertex_attrib_array(0);
        gl.vertex_attrib_pointer(0, 3, gl::FLOAT, false, stride, 0);
        gl.enable_vertex_attrib_array(1);
        gl.vertex_attrib_pointer(1, 3, gl::FLOAT, false, stride, 12);
        gl.enable_vertex_attrib_array(2);
        gl.vertex_attrib_pointer(2, 2, gl::FLOAT, false, stride, 24);

        let index_buffer = gl.gen_buffers(1)[0];
        gl.bind_buffer(gl::ELEMENT_ARRAY_BUFFER, index_buffer);
        gl::buffer_data(gl, gl::ELEMENT_ARRAY_BUFFER, &mesh.indices, gl::STATIC_DRAW);

        gl.bind_vertex_array(0);

        ControllerMeshBuffers {
            vertex_array,
            vertex_buffer,
            index_buffer,
            index_count: mesh.indices.len() as u32,
        }
    }

    fn release(&mut self, buffers: ControllerMeshBuffers) {
        let gl = &*self.gl;
        gl.delete_buffers(&[buffers.vertex_buffer, buffers.index_buffer]);
        gl.delete_vertex_arrays(&[buffers.vertex_array]);
    }
}

#[derive(Debug, Clone, Error)]
pub enum ControllerError {
    #[error(transparent)]
    Input(#[from] VRInputError),
    #[error(transparent)]
    Property(#[from] VRPropertyError),
    #[error("render model {name:?} failed to load: code {code}")]
    ModelLoad { name: String, code: i32 },
    #[error("render model {name:?} still loading after {deadline:?}")]
    ModelLoadTimeout { name: String, deadline: Duration },
}

/// One hand's tracked controller: pose, model identity, and GPU mesh.
///
/// The two hands are independent and never share mesh state.
pub struct Controller {
    hand: Hand,
    action: VRActionHandle,
    model_name: String,
    pose: Matrix,
    mesh: Option<ControllerMeshBuffers>,
}

impl Controller {
    fn new(hand: Hand, action: VRActionHandle) -> Controller {
        Controller {
            hand,
            action,
            model_name: String::new(),
            pose: identity_matrix!(),
            mesh: None,
        }
    }

    pub fn hand(&self) -> Hand {
        self.hand
    }

    /// Latest predicted device-to-tracking-origin transform.
    pub fn pose(&self) -> &Matrix {
        &self.pose
    }

    /// GPU mesh for the current model, once one has been seen and loaded.
    pub fn mesh(&self) -> Option<&ControllerMeshBuffers> {
        self.mesh.as_ref()
    }

    pub fn is_initialized(&self) -> bool {
        self.mesh.is_some()
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }
}

/// Resolves controller actions into engine input and renderable meshes.
pub struct ControllerRig {
    action_set: VRActionSetHandle,
    controllers: [Controller; 2],
    walk_action: VRActionHandle,
    turn_action: VRActionHandle,
    bindings: [(GameBinding, VRActionHandle); 4],
}

impl ControllerRig {
    pub fn new(input: &mut dyn VRInput, manifest_path: &Path) -> Result<ControllerRig, VRInputError> {
        input.set_action_manifest_path(manifest_path)?;
        let action_set = input.action_set_handle(ACTION_SET_MAIN)?;

        let left = Controller::new(Hand::Left, input.action_handle(ACTION_HAND_LEFT)?);
        let right = Controller::new(Hand::Right, input.action_handle(ACTION_HAND_RIGHT)?);

        let bindings = [
            (GameBinding::PlaceBlock, input.action_handle(ACTION_PLACE_BLOCK)?),
            (GameBinding::DeleteBlock, input.action_handle(ACTION_DELETE_BLOCK)?),
            (GameBinding::PickBlock, input.action_handle(ACTION_PICK_BLOCK)?),
            (GameBinding::Jump, input.action_handle(ACTION_JUMP)?),
        ];

        Ok(ControllerRig {
            action_set,
            controllers: [left, right],
            walk_action: input.action_handle(ACTION_WALK_2_AXIS)?,
            turn_action: input.action_handle(ACTION_TURN_2_AXIS)?,
            bindings,
        })
    }

    /// Per-frame update: refresh action state, track hand poses and model
    /// swaps, and forward input edges and turn axes into the game.
    pub fn update(
        &mut self,
        input: &mut dyn VRInput,
        system: &dyn VRSystem,
        models: &mut dyn VRRenderModels,
        uploader: &mut dyn MeshUploader,
        sink: &mut dyn InputSink,
    ) -> Result<(), ControllerError> {
        input.update_action_state(self.action_set)?;

        for controller in self.controllers.iter_mut() {
            Self::update_controller(controller, input, system, models, uploader)?;
        }

        let turn = input.analog_action_data(self.turn_action)?;
        if turn.active {
            sink.raw_turn(turn.x * TURN_EVENT_SCALE, turn.y * TURN_EVENT_SCALE);
        }

        for (binding, action) in self.bindings {
            let data = input.digital_action_data(action)?;
            if data.active && data.changed {
                sink.set_binding(binding, data.state);
            }
        }

        Ok(())
    }

    fn update_controller(
        controller: &mut Controller,
        input: &mut dyn VRInput,
        system: &dyn VRSystem,
        models: &mut dyn VRRenderModels,
        uploader: &mut dyn MeshUploader,
    ) -> Result<(), ControllerError> {
        let data = input.pose_action_data_next_frame(controller.action)?;
        if !data.active || !data.pose.is_valid {
            return Ok(());
        }
        controller.pose = matrix::from_hmd34(&data.pose.device_to_absolute);

        let Some(device) = data.origin_device else {
            return Ok(());
        };
        let name = system.string_tracked_device_property(device, VRDeviceProperty::RenderModelName)?;
        if name == controller.model_name {
            return Ok(());
        }

        // First observation or a device swap: rebuild the mesh for the new
        // model, releasing the old GPU buffers first.
        let mesh = Self::load_model_blocking(models, &name)?;
        if let Some(old) = controller.mesh.take() {
            uploader.release(old);
        }
        controller.mesh = Some(uploader.upload(&mesh));
        info!(
            "{:?} controller model {:?} loaded ({} vertices)",
            controller.hand,
            name,
            mesh.vertices.len()
        );
        controller.model_name = name;
        Ok(())
    }

    fn load_model_blocking(
        models: &mut dyn VRRenderModels,
        name: &str,
    ) -> Result<VRModelMesh, ControllerError> {
        let deadline = Instant::now() + MODEL_LOAD_DEADLINE;
        loop {
            match models.load_render_model(name) {
                VRModelLoad::Ready(mesh) => return Ok(mesh),
                VRModelLoad::Failed(code) => {
                    error!("LoadRenderModel_Async {:?} failed: {}", name, code);
                    return Err(ControllerError::ModelLoad {
                        name: name.into(),
                        code,
                    });
                }
                VRModelLoad::Loading => {
                    if Instant::now() >= deadline {
                        error!("LoadRenderModel_Async {:?} still loading, giving up", name);
                        return Err(ControllerError::ModelLoadTimeout {
                            name: name.into(),
                            deadline: MODEL_LOAD_DEADLINE,
                        });
                    }
                    std::thread::sleep(MODEL_POLL_INTERVAL);
                }
            }
        }
    }

    /// Current movement axis, for the game's locomotion code.
    pub fn walk_axis(&self, input: &mut dyn VRInput) -> Result<(f32, f32), VRInputError> {
        let data = input.analog_action_data(self.walk_action)?;
        if data.active {
            Ok((data.x, data.y))
        } else {
            Ok((0.0, 0.0))
        }
    }

    pub fn controller(&self, hand: Hand) -> &Controller {
        &self.controllers[hand.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ScriptedModels {
        loading_polls: u32,
        result: VRModelLoad,
    }

    impl VRRenderModels for ScriptedModels {
        fn load_render_model(&mut self, _name: &str) -> VRModelLoad {
            if self.loading_polls > 0 {
                self.loading_polls -= 1;
                return VRModelLoad::Loading;
            }
            self.result.clone()
        }
    }

    #[test]
    fn model_load_retries_while_loading() {
        let mesh = VRModelMesh {
            vertices: vec![],
            indices: vec![0, 1, 2],
        };
        let mut models = ScriptedModels {
            loading_polls: 3,
            result: VRModelLoad::Ready(mesh.clone()),
        };
        let loaded = ControllerRig::load_model_blocking(&mut models, "vive_controller").unwrap();
        assert_eq!(loaded, mesh);
    }

    #[test]
    fn model_load_failure_is_fatal() {
        let mut models = ScriptedModels {
            loading_polls: 0,
            result: VRModelLoad::Failed(301),
        };
        let err = ControllerRig::load_model_blocking(&mut models, "oculus_touch").unwrap_err();
        match err {
            ControllerError::ModelLoad { name, code } => {
                assert_eq!(name, "oculus_touch");
                assert_eq!(code, 301);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
