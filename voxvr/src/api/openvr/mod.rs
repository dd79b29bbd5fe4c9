//! SteamVR backend over the OpenVR runtime, via `openvr_sys2`.
//!
//! One `connect()` call initializes the runtime as a scene application and
//! hands back the four interface components; dropping them all shuts the
//! runtime down.

use log::info;
use std::ffi::CString;
use std::path::Path;
use std::pin::Pin;
use std::rc::Rc;

use voxvr_api::{
    HmdMatrix34, HmdMatrix44, TrackedDevicePose, VRActionHandle, VRActionSetHandle,
    VRAnalogActionData, VRCompositor, VRCompositorError, VRDeviceProperty, VRDigitalActionData,
    VREye, VRInput, VRInputError, VRModelLoad, VRModelMesh, VRModelVertex, VRPoseActionData,
    VRPropertyError, VRRenderModels, VRSystem,
};

use crate::session::{VRRuntimeHandles, VRSessionError};

/// Shuts the runtime down once every component is gone.
struct OpenVRGuard;

impl Drop for OpenVRGuard {
    fn drop(&mut self) {
        info!("OpenVR shutdown");
        unsafe { openvr_sys2::VR_Shutdown() };
    }
}

pub struct OpenVRRuntime;

impl OpenVRRuntime {
    /// Initialize OpenVR as a scene application and return the session
    /// components. Fails when no runtime or HMD is available.
    pub fn connect() -> Result<VRRuntimeHandles, VRSessionError> {
        let mut error = openvr_sys2::EVRInitError::VRInitError_None;
        unsafe {
            openvr_sys2::VR_Init(
                &mut error,
                openvr_sys2::EVRApplicationType::VRApplication_Scene,
                std::ptr::null(),
            );
        }
        if error != openvr_sys2::EVRInitError::VRInitError_None {
            return Err(VRSessionError::Init(format!("VR_Init: {:?}", error)));
        }

        let guard = Rc::new(OpenVRGuard);
        Ok(VRRuntimeHandles {
            system: Box::new(OpenVRSystem {
                _guard: guard.clone(),
            }),
            compositor: Box::new(OpenVRCompositor {
                _guard: guard.clone(),
            }),
            input: Box::new(OpenVRInput {
                _guard: guard.clone(),
            }),
            render_models: Box::new(OpenVRRenderModels { _guard: guard }),
        })
    }
}

fn to_sys_eye(eye: VREye) -> openvr_sys2::EVREye {
    match eye {
        VREye::Left => openvr_sys2::EVREye::Eye_Left,
        VREye::Right => openvr_sys2::EVREye::Eye_Right,
    }
}

fn to_sys_property(prop: VRDeviceProperty) -> openvr_sys2::ETrackedDeviceProperty {
    match prop {
        VRDeviceProperty::TrackingSystemName => {
            openvr_sys2::ETrackedDeviceProperty::Prop_TrackingSystemName_String
        }
        VRDeviceProperty::SerialNumber => {
            openvr_sys2::ETrackedDeviceProperty::Prop_SerialNumber_String
        }
        VRDeviceProperty::RenderModelName => {
            openvr_sys2::ETrackedDeviceProperty::Prop_RenderModelName_String
        }
    }
}

fn from_sys_pose(pose: &openvr_sys2::TrackedDevicePose_t) -> TrackedDevicePose {
    TrackedDevicePose {
        device_to_absolute: pose.mDeviceToAbsoluteTracking.m,
        is_valid: pose.bPoseIsValid,
        is_connected: pose.bDeviceIsConnected,
    }
}

struct OpenVRSystem {
    _guard: Rc<OpenVRGuard>,
}

impl OpenVRSystem {
    fn raw(&self) -> Pin<&mut openvr_sys2::IVRSystem> {
        unsafe { Pin::new_unchecked(&mut *openvr_sys2::VRSystem()) }
    }
}

impl VRSystem for OpenVRSystem {
    fn projection_matrix(&self, eye: VREye, near_z: f32, far_z: f32) -> HmdMatrix44 {
        let m = unsafe { self.raw().GetProjectionMatrix(to_sys_eye(eye), near_z, far_z) };
        m.m
    }

    fn eye_to_head_transform(&self, eye: VREye) -> HmdMatrix34 {
        let m = unsafe { self.raw().GetEyeToHeadTransform(to_sys_eye(eye)) };
        m.m
    }

    fn recommended_render_target_size(&self) -> (u32, u32) {
        let mut width = 0u32;
        let mut height = 0u32;
        unsafe {
            self.raw()
                .GetRecommendedRenderTargetSize(&mut width, &mut height);
        }
        (width, height)
    }

    fn string_tracked_device_property(
        &self,
        device: u32,
        prop: VRDeviceProperty,
    ) -> Result<String, VRPropertyError> {
        let mut buf = [0u8; 256];
        let mut error = openvr_sys2::ETrackedPropertyError::TrackedProp_Success;
        let len = unsafe {
            self.raw().GetStringTrackedDeviceProperty(
                device,
                to_sys_property(prop),
                buf.as_mut_ptr() as *mut _,
                buf.len() as u32,
                &mut error,
            )
        };
        if error != openvr_sys2::ETrackedPropertyError::TrackedProp_Success {
            return Err(VRPropertyError::Failed(error.repr as i32));
        }
        let text = std::str::from_utf8(&buf[..len.saturating_sub(1) as usize])
            .map_err(|_| VRPropertyError::Failed(-1))?;
        Ok(text.to_string())
    }
}

struct OpenVRCompositor {
    _guard: Rc<OpenVRGuard>,
}

impl OpenVRCompositor {
    fn raw(&self) -> Pin<&mut openvr_sys2::IVRCompositor> {
        unsafe { Pin::new_unchecked(&mut *openvr_sys2::VRCompositor()) }
    }
}

fn compositor_result(error: openvr_sys2::EVRCompositorError) -> Result<(), VRCompositorError> {
    use openvr_sys2::EVRCompositorError as E;
    if error == E::VRCompositorError_None {
        Ok(())
    } else if error == E::VRCompositorError_DoNotHaveFocus {
        Err(VRCompositorError::DoNotHaveFocus)
    } else {
        Err(VRCompositorError::Failed(error.repr as i32))
    }
}

impl VRCompositor for OpenVRCompositor {
    fn wait_get_poses(
        &mut self,
        poses: &mut [TrackedDevicePose],
    ) -> Result<(), VRCompositorError> {
        let mut sys_poses: Vec<openvr_sys2::TrackedDevicePose_t> =
            vec![unsafe { std::mem::zeroed() }; poses.len()];
        let error = unsafe {
            self.raw().WaitGetPoses(
                sys_poses.as_mut_ptr(),
                sys_poses.len() as u32,
                std::ptr::null_mut(),
                0,
            )
        };
        let result = compositor_result(error);
        // Poses are usable even when the compositor reports no focus.
        if !matches!(result, Err(VRCompositorError::Failed(_))) {
            for (out, sys) in poses.iter_mut().zip(sys_poses.iter()) {
                *out = from_sys_pose(sys);
            }
        }
        result
    }

    fn submit(&mut self, eye: VREye, texture_id: u32) -> Result<(), VRCompositorError> {
        let mut texture = openvr_sys2::Texture_t {
            handle: texture_id as usize as *mut std::ffi::c_void,
            eType: openvr_sys2::ETextureType::TextureType_OpenGL,
            eColorSpace: openvr_sys2::EColorSpace::ColorSpace_Gamma,
        };
        let error = unsafe {
            self.raw().Submit(
                to_sys_eye(eye),
                &mut texture,
                std::ptr::null_mut(),
                openvr_sys2::EVRSubmitFlags::Submit_Default,
            )
        };
        compositor_result(error)
    }
}

struct OpenVRInput {
    _guard: Rc<OpenVRGuard>,
}

impl OpenVRInput {
    fn raw(&self) -> Pin<&mut openvr_sys2::IVRInput> {
        unsafe { Pin::new_unchecked(&mut *openvr_sys2::VRInput()) }
    }
}

fn input_result(error: openvr_sys2::EVRInputError) -> Result<(), VRInputError> {
    if error == openvr_sys2::EVRInputError::VRInputError_None {
        Ok(())
    } else {
        Err(VRInputError::Failed(error.repr as i32))
    }
}

impl VRInput for OpenVRInput {
    fn set_action_manifest_path(&mut self, path: &Path) -> Result<(), VRInputError> {
        let path = CString::new(path.to_string_lossy().as_bytes())
            .map_err(|_| VRInputError::InvalidManifest(path.display().to_string()))?;
        input_result(unsafe { self.raw().SetActionManifestPath(path.as_ptr()) })
    }

    fn action_set_handle(&mut self, name: &str) -> Result<VRActionSetHandle, VRInputError> {
        let name_c =
            CString::new(name).map_err(|_| VRInputError::UnknownName(name.to_string()))?;
        let mut handle: openvr_sys2::VRActionSetHandle_t = 0;
        input_result(unsafe { self.raw().GetActionSetHandle(name_c.as_ptr(), &mut handle) })?;
        Ok(handle)
    }

    fn action_handle(&mut self, name: &str) -> Result<VRActionHandle, VRInputError> {
        let name_c =
            CString::new(name).map_err(|_| VRInputError::UnknownName(name.to_string()))?;
        let mut handle: openvr_sys2::VRActionHandle_t = 0;
        input_result(unsafe { self.raw().GetActionHandle(name_c.as_ptr(), &mut handle) })?;
        Ok(handle)
    }

    fn update_action_state(&mut self, active_set: VRActionSetHandle) -> Result<(), VRInputError> {
        let mut set: openvr_sys2::VRActiveActionSet_t = unsafe { std::mem::zeroed() };
        set.ulActionSet = active_set;
        input_result(unsafe {
            self.raw().UpdateActionState(
                &mut set,
                std::mem::size_of::<openvr_sys2::VRActiveActionSet_t>() as u32,
                1,
            )
        })
    }

    fn digital_action_data(
        &mut self,
        action: VRActionHandle,
    ) -> Result<VRDigitalActionData, VRInputError> {
        let mut data: openvr_sys2::InputDigitalActionData_t = unsafe { std::mem::zeroed() };
        input_result(unsafe {
            self.raw().GetDigitalActionData(
                action,
                &mut data,
                std::mem::size_of::<openvr_sys2::InputDigitalActionData_t>() as u32,
                openvr_sys2::k_ulInvalidInputValueHandle,
            )
        })?;
        Ok(VRDigitalActionData {
            active: data.bActive,
            state: data.bState,
            changed: data.bChanged,
        })
    }

    fn analog_action_data(
        &mut self,
        action: VRActionHandle,
    ) -> Result<VRAnalogActionData, VRInputError> {
        let mut data: openvr_sys2::InputAnalogActionData_t = unsafe { std::mem::zeroed() };
        input_result(unsafe {
            self.raw().GetAnalogActionData(
                action,
                &mut data,
                std::mem::size_of::<openvr_sys2::InputAnalogActionData_t>() as u32,
                openvr_sys2::k_ulInvalidInputValueHandle,
            )
        })?;
        Ok(VRAnalogActionData {
            active: data.bActive,
            x: data.x,
            y: data.y,
        })
    }

    fn pose_action_data_next_frame(
        &mut self,
        action: VRActionHandle,
    ) -> Result<VRPoseActionData, VRInputError> {
        let mut data: openvr_sys2::InputPoseActionData_t = unsafe { std::mem::zeroed() };
        input_result(unsafe {
            self.raw().GetPoseActionDataForNextFrame(
                action,
                openvr_sys2::ETrackingUniverseOrigin::TrackingUniverseStanding,
                &mut data,
                std::mem::size_of::<openvr_sys2::InputPoseActionData_t>() as u32,
                openvr_sys2::k_ulInvalidInputValueHandle,
            )
        })?;

        let mut origin_device = None;
        if data.bActive {
            let mut info: openvr_sys2::InputOriginInfo_t = unsafe { std::mem::zeroed() };
            let error = unsafe {
                self.raw().GetOriginTrackedDeviceInfo(
                    data.activeOrigin,
                    &mut info,
                    std::mem::size_of::<openvr_sys2::InputOriginInfo_t>() as u32,
                )
            };
            if error == openvr_sys2::EVRInputError::VRInputError_None
                && info.trackedDeviceIndex != openvr_sys2::k_unTrackedDeviceIndexInvalid
            {
                origin_device = Some(info.trackedDeviceIndex);
            }
        }

        Ok(VRPoseActionData {
            active: data.bActive,
            pose: from_sys_pose(&data.pose),
            origin_device,
        })
    }
}

struct OpenVRRenderModels {
    _guard: Rc<OpenVRGuard>,
}

impl OpenVRRenderModels {
    fn raw(&self) -> Pin<&mut openvr_sys2::IVRRenderModels> {
        unsafe { Pin::new_unchecked(&mut *openvr_sys2::VRRenderModels()) }
    }
}

impl VRRenderModels for OpenVRRenderModels {
    fn load_render_model(&mut self, name: &str) -> VRModelLoad {
        let Ok(name_c) = CString::new(name) else {
            return VRModelLoad::Failed(-1);
        };
        let mut model: *mut openvr_sys2::RenderModel_t = std::ptr::null_mut();
        let error = unsafe { self.raw().LoadRenderModel_Async(name_c.as_ptr(), &mut model) };

        use openvr_sys2::EVRRenderModelError as E;
        if error == E::VRRenderModelError_Loading {
            return VRModelLoad::Loading;
        }
        if error != E::VRRenderModelError_None || model.is_null() {
            return VRModelLoad::Failed(error.repr as i32);
        }

        let mesh = unsafe {
            let raw = &*model;
            let vertices = std::slice::from_raw_parts(raw.rVertexData, raw.unVertexCount as usize)
                .iter()
                .map(|v| VRModelVertex {
                    position: v.vPosition.v,
                    normal: v.vNormal.v,
                    tex_coord: v.rfTextureCoord,
                })
                .collect();
            let indices =
                std::slice::from_raw_parts(raw.rIndexData, raw.unTriangleCount as usize * 3)
                    .to_vec();
            VRModelMesh { vertices, indices }
        };
        unsafe { self.raw().FreeRenderModel(model) };
        VRModelLoad::Ready(mesh)
    }
}
