//! In-memory runtime for tests and displayless development. Simulates a
//! virtual HTC-Vive-like headset; every component shares one scriptable
//! state cell, and the handle records the call sequence so tests can assert
//! frame-loop ordering.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::Path;
use std::rc::Rc;

use voxvr_api::matrix::{self, Matrix};
use voxvr_api::{
    HmdMatrix34, HmdMatrix44, TrackedDevicePose, VRActionHandle, VRActionSetHandle,
    VRAnalogActionData, VRCompositor, VRCompositorError, VRDeviceProperty, VRDigitalActionData,
    VREye, VRInput, VRInputError, VRModelLoad, VRModelMesh, VRPoseActionData, VRPropertyError,
    VRRenderModels, VRSystem, HMD_DEVICE_INDEX, MAX_TRACKED_DEVICES,
};

use crate::session::VRRuntimeHandles;

/// One observed call into the mock runtime. `Scene` and `Resolve` are never
/// produced by the mock itself; test doubles push them to interleave their
/// own steps into the same sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockEvent {
    WaitGetPoses,
    UpdateActionState,
    Submit(VREye),
    Scene(VREye),
    Resolve(VREye),
}

struct MockModel {
    loading_polls: u32,
    mesh: Option<VRModelMesh>,
}

struct MockState {
    poses: [TrackedDevicePose; MAX_TRACKED_DEVICES],
    focus: bool,
    wait_error: Option<i32>,
    submit_error: Option<i32>,
    projection: [HmdMatrix44; 2],
    eye_to_head: [HmdMatrix34; 2],
    render_target_size: (u32, u32),
    properties: HashMap<(u32, VRDeviceProperty), String>,
    handles: HashMap<String, u64>,
    next_handle: u64,
    digital_targets: HashMap<VRActionHandle, (bool, bool)>,
    digital: HashMap<VRActionHandle, VRDigitalActionData>,
    analog: HashMap<VRActionHandle, VRAnalogActionData>,
    pose_actions: HashMap<VRActionHandle, VRPoseActionData>,
    models: HashMap<String, MockModel>,
    events: Vec<MockEvent>,
    submitted: Vec<(VREye, u32)>,
}

impl MockState {
    fn new() -> MockState {
        let mut poses = [TrackedDevicePose::default(); MAX_TRACKED_DEVICES];
        poses[HMD_DEVICE_INDEX as usize] = TrackedDevicePose {
            device_to_absolute: matrix::to_hmd34(&identity()),
            is_valid: true,
            is_connected: true,
        };

        let mut properties = HashMap::new();
        properties.insert(
            (HMD_DEVICE_INDEX, VRDeviceProperty::TrackingSystemName),
            "mock".to_string(),
        );
        properties.insert(
            (HMD_DEVICE_INDEX, VRDeviceProperty::SerialNumber),
            "MOCK-0001".to_string(),
        );

        MockState {
            poses,
            focus: true,
            wait_error: None,
            submit_error: None,
            // Simulates HTC Vive projections and eye offsets.
            projection: [
                [
                    [0.75620246, 0.0, -0.05713458, 0.0],
                    [0.0, 0.68050665, -0.0021225351, 0.0],
                    [0.0, 0.0, -1.0000999, -0.10000999],
                    [0.0, 0.0, -1.0, 0.0],
                ],
                [
                    [0.75646526, 0.0, 0.055611316, 0.0],
                    [0.0, 0.68069947, -0.005315368, 0.0],
                    [0.0, 0.0, -1.0000999, -0.10000999],
                    [0.0, 0.0, -1.0, 0.0],
                ],
            ],
            eye_to_head: [
                [
                    [1.0, 0.0, 0.0, -0.035949998],
                    [0.0, 1.0, 0.0, 0.0],
                    [0.0, 0.0, 1.0, 0.0],
                ],
                [
                    [1.0, 0.0, 0.0, 0.035949998],
                    [0.0, 1.0, 0.0, 0.0],
                    [0.0, 0.0, 1.0, 0.0],
                ],
            ],
            render_target_size: (1512, 1680),
            properties,
            handles: HashMap::new(),
            next_handle: 1,
            digital_targets: HashMap::new(),
            digital: HashMap::new(),
            analog: HashMap::new(),
            pose_actions: HashMap::new(),
            models: HashMap::new(),
            events: Vec::new(),
            submitted: Vec::new(),
        }
    }

    fn intern(&mut self, name: &str) -> u64 {
        if let Some(handle) = self.handles.get(name) {
            return *handle;
        }
        let handle = self.next_handle;
        self.next_handle += 1;
        self.handles.insert(name.to_string(), handle);
        handle
    }
}

fn identity() -> Matrix {
    voxvr_api::identity_matrix!()
}

/// Handle for scripting and inspecting the mock runtime. Clones share state.
#[derive(Clone)]
pub struct MockRuntime {
    state: Rc<RefCell<MockState>>,
}

impl MockRuntime {
    pub fn new() -> MockRuntime {
        MockRuntime {
            state: Rc::new(RefCell::new(MockState::new())),
        }
    }

    /// Components for `VRSession::new`, all sharing this handle's state.
    pub fn handles(&self) -> VRRuntimeHandles {
        VRRuntimeHandles {
            system: Box::new(MockSystem {
                state: self.state.clone(),
            }),
            compositor: Box::new(MockCompositor {
                state: self.state.clone(),
            }),
            input: Box::new(MockInput {
                state: self.state.clone(),
            }),
            render_models: Box::new(MockRenderModels {
                state: self.state.clone(),
            }),
        }
    }

    pub fn set_device_pose(&self, device: u32, pose: &Matrix, valid: bool) {
        let mut state = self.state.borrow_mut();
        state.poses[device as usize] = TrackedDevicePose {
            device_to_absolute: matrix::to_hmd34(pose),
            is_valid: valid,
            is_connected: true,
        };
    }

    pub fn set_hmd_pose(&self, pose: &Matrix, valid: bool) {
        self.set_device_pose(HMD_DEVICE_INDEX, pose, valid);
    }

    /// Mark a device's pose invalid without touching its transform.
    pub fn invalidate_device_pose(&self, device: u32) {
        self.state.borrow_mut().poses[device as usize].is_valid = false;
    }

    pub fn set_focus(&self, focus: bool) {
        self.state.borrow_mut().focus = focus;
    }

    pub fn set_wait_error(&self, code: Option<i32>) {
        self.state.borrow_mut().wait_error = code;
    }

    pub fn set_submit_error(&self, code: Option<i32>) {
        self.state.borrow_mut().submit_error = code;
    }

    pub fn set_device_property(&self, device: u32, prop: VRDeviceProperty, value: &str) {
        self.state
            .borrow_mut()
            .properties
            .insert((device, prop), value.to_string());
    }

    /// Set the target state of a boolean action; edges are computed at the
    /// next `update_action_state`.
    pub fn set_digital_action(&self, path: &str, active: bool, pressed: bool) {
        let mut state = self.state.borrow_mut();
        let handle = state.intern(path);
        state.digital_targets.insert(handle, (active, pressed));
    }

    pub fn set_analog_action(&self, path: &str, x: f32, y: f32) {
        let mut state = self.state.borrow_mut();
        let handle = state.intern(path);
        state.analog.insert(
            handle,
            VRAnalogActionData {
                active: true,
                x,
                y,
            },
        );
    }

    pub fn set_pose_action(&self, path: &str, pose: &Matrix, origin_device: Option<u32>) {
        let mut state = self.state.borrow_mut();
        let handle = state.intern(path);
        state.pose_actions.insert(
            handle,
            VRPoseActionData {
                active: true,
                pose: TrackedDevicePose {
                    device_to_absolute: matrix::to_hmd34(pose),
                    is_valid: true,
                    is_connected: true,
                },
                origin_device,
            },
        );
    }

    /// Register a render model, reporting "still loading" for the first
    /// `loading_polls` load attempts.
    pub fn add_render_model(&self, name: &str, mesh: VRModelMesh, loading_polls: u32) {
        self.state.borrow_mut().models.insert(
            name.to_string(),
            MockModel {
                loading_polls,
                mesh: Some(mesh),
            },
        );
    }

    /// Register a render model whose load always fails.
    pub fn add_failing_render_model(&self, name: &str) {
        self.state.borrow_mut().models.insert(
            name.to_string(),
            MockModel {
                loading_polls: 0,
                mesh: None,
            },
        );
    }

    pub fn events(&self) -> Vec<MockEvent> {
        self.state.borrow().events.clone()
    }

    /// Interleave an externally observed step into the call sequence.
    pub fn push_event(&self, event: MockEvent) {
        self.state.borrow_mut().events.push(event);
    }

    pub fn submitted(&self) -> Vec<(VREye, u32)> {
        self.state.borrow().submitted.clone()
    }
}

impl Default for MockRuntime {
    fn default() -> MockRuntime {
        MockRuntime::new()
    }
}

struct MockSystem {
    state: Rc<RefCell<MockState>>,
}

impl VRSystem for MockSystem {
    fn projection_matrix(&self, eye: VREye, _near_z: f32, _far_z: f32) -> HmdMatrix44 {
        self.state.borrow().projection[eye.index()]
    }

    fn eye_to_head_transform(&self, eye: VREye) -> HmdMatrix34 {
        self.state.borrow().eye_to_head[eye.index()]
    }

    fn recommended_render_target_size(&self) -> (u32, u32) {
        self.state.borrow().render_target_size
    }

    fn string_tracked_device_property(
        &self,
        device: u32,
        prop: VRDeviceProperty,
    ) -> Result<String, VRPropertyError> {
        self.state
            .borrow()
            .properties
            .get(&(device, prop))
            .cloned()
            .ok_or(VRPropertyError::UnknownDevice(device))
    }
}

struct MockCompositor {
    state: Rc<RefCell<MockState>>,
}

impl VRCompositor for MockCompositor {
    fn wait_get_poses(
        &mut self,
        poses: &mut [TrackedDevicePose],
    ) -> Result<(), VRCompositorError> {
        let mut state = self.state.borrow_mut();
        state.events.push(MockEvent::WaitGetPoses);
        if let Some(code) = state.wait_error {
            return Err(VRCompositorError::Failed(code));
        }
        for (out, stored) in poses.iter_mut().zip(state.poses.iter()) {
            *out = *stored;
        }
        if !state.focus {
            return Err(VRCompositorError::DoNotHaveFocus);
        }
        Ok(())
    }

    fn submit(&mut self, eye: VREye, texture_id: u32) -> Result<(), VRCompositorError> {
        let mut state = self.state.borrow_mut();
        state.events.push(MockEvent::Submit(eye));
        if let Some(code) = state.submit_error {
            return Err(VRCompositorError::Failed(code));
        }
        if !state.focus {
            return Err(VRCompositorError::DoNotHaveFocus);
        }
        state.submitted.push((eye, texture_id));
        Ok(())
    }
}

struct MockInput {
    state: Rc<RefCell<MockState>>,
}

impl VRInput for MockInput {
    fn set_action_manifest_path(&mut self, _path: &Path) -> Result<(), VRInputError> {
        Ok(())
    }

    fn action_set_handle(&mut self, name: &str) -> Result<VRActionSetHandle, VRInputError> {
        Ok(self.state.borrow_mut().intern(name))
    }

    fn action_handle(&mut self, name: &str) -> Result<VRActionHandle, VRInputError> {
        Ok(self.state.borrow_mut().intern(name))
    }

    fn update_action_state(&mut self, _active_set: VRActionSetHandle) -> Result<(), VRInputError> {
        let mut state = self.state.borrow_mut();
        state.events.push(MockEvent::UpdateActionState);

        let targets: Vec<(VRActionHandle, bool, bool)> = state
            .digital_targets
            .iter()
            .map(|(handle, (active, pressed))| (*handle, *active, *pressed))
            .collect();
        for (handle, active, pressed) in targets {
            let previous = state.digital.get(&handle).copied().unwrap_or_default();
            state.digital.insert(
                handle,
                VRDigitalActionData {
                    active,
                    state: pressed,
                    changed: pressed != previous.state,
                },
            );
        }
        Ok(())
    }

    fn digital_action_data(
        &mut self,
        action: VRActionHandle,
    ) -> Result<VRDigitalActionData, VRInputError> {
        Ok(self
            .state
            .borrow()
            .digital
            .get(&action)
            .copied()
            .unwrap_or_default())
    }

    fn analog_action_data(
        &mut self,
        action: VRActionHandle,
    ) -> Result<VRAnalogActionData, VRInputError> {
        Ok(self
            .state
            .borrow()
            .analog
            .get(&action)
            .copied()
            .unwrap_or_default())
    }

    fn pose_action_data_next_frame(
        &mut self,
        action: VRActionHandle,
    ) -> Result<VRPoseActionData, VRInputError> {
        Ok(self
            .state
            .borrow()
            .pose_actions
            .get(&action)
            .copied()
            .unwrap_or_default())
    }
}

struct MockRenderModels {
    state: Rc<RefCell<MockState>>,
}

impl VRRenderModels for MockRenderModels {
    fn load_render_model(&mut self, name: &str) -> VRModelLoad {
        let mut state = self.state.borrow_mut();
        match state.models.get_mut(name) {
            None => VRModelLoad::Failed(1),
            Some(model) => {
                if model.loading_polls > 0 {
                    model.loading_polls -= 1;
                    return VRModelLoad::Loading;
                }
                match &model.mesh {
                    Some(mesh) => VRModelLoad::Ready(mesh.clone()),
                    None => VRModelLoad::Failed(100),
                }
            }
        }
    }
}
