#[cfg(feature = "serde-serialization")]
use serde::{Deserialize, Serialize};

/// One vertex of a controller render model.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde-serialization", derive(Deserialize, Serialize))]
#[repr(C)]
pub struct VRModelVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub tex_coord: [f32; 2],
}

/// Mesh describing a physical controller's visual appearance.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde-serialization", derive(Deserialize, Serialize))]
pub struct VRModelMesh {
    pub vertices: Vec<VRModelVertex>,
    pub indices: Vec<u16>,
}

/// Outcome of one asynchronous render-model load poll.
#[derive(Debug, Clone)]
pub enum VRModelLoad {
    Ready(VRModelMesh),
    /// The runtime is still loading the model; poll again.
    Loading,
    Failed(i32),
}

/// The runtime's render-model loader.
pub trait VRRenderModels {
    fn load_render_model(&mut self, name: &str) -> VRModelLoad;
}
