//! Frame-loop contract tests against the mock runtime: call ordering,
//! focus-loss tolerance, pose retention, controller model swaps, and
//! edge-triggered input.

use voxvr::api::mock::{MockEvent, MockRuntime};
use voxvr::controller::ControllerMeshBuffers;
use voxvr::matrix::{self, Matrix};
use voxvr::{
    identity_matrix, EyeTargets, GameBinding, InputSink, MeshUploader, VRDeviceProperty, VREye,
    VRModelMesh, VRSession, VRSessionConfig, VRSessionError,
};

struct FakeTargets {
    runtime: MockRuntime,
}

impl EyeTargets for FakeTargets {
    fn size(&self) -> (u32, u32) {
        (1512, 1680)
    }

    fn bind(&mut self, _eye: VREye) {}

    fn unbind(&mut self) {}

    fn resolve(&mut self, eye: VREye) {
        self.runtime.push_event(MockEvent::Resolve(eye));
    }

    fn submit_texture(&self, eye: VREye) -> u32 {
        100 + eye.index() as u32
    }

    fn blit_to_window(&mut self, _eye: VREye, _dst: (i32, i32, i32, i32)) {}
}

#[derive(Default)]
struct CountingUploader {
    uploads: u32,
    releases: u32,
}

impl MeshUploader for CountingUploader {
    fn upload(&mut self, mesh: &VRModelMesh) -> ControllerMeshBuffers {
        self.uploads += 1;
        ControllerMeshBuffers {
            vertex_array: self.uploads,
            vertex_buffer: self.uploads,
            index_buffer: self.uploads,
            index_count: mesh.indices.len() as u32,
        }
    }

    fn release(&mut self, _buffers: ControllerMeshBuffers) {
        self.releases += 1;
    }
}

#[derive(Default)]
struct RecordingSink {
    bindings: Vec<(GameBinding, bool)>,
    turns: Vec<(f32, f32)>,
}

impl InputSink for RecordingSink {
    fn set_binding(&mut self, binding: GameBinding, pressed: bool) {
        self.bindings.push((binding, pressed));
    }

    fn raw_turn(&mut self, dx: f32, dy: f32) {
        self.turns.push((dx, dy));
    }
}

fn session_over(runtime: &MockRuntime) -> VRSession {
    VRSession::new(
        runtime.handles(),
        Box::new(FakeTargets {
            runtime: runtime.clone(),
        }),
        Box::<CountingUploader>::default(),
        &VRSessionConfig::default(),
    )
    .expect("mock session setup")
}

fn run_frame(session: &mut VRSession, runtime: &MockRuntime, sink: &mut RecordingSink) {
    session.begin_frame(sink).unwrap();
    let scene_runtime = runtime.clone();
    session
        .render_stereo(|eye, _delta, _t| scene_runtime.push_event(MockEvent::Scene(eye)), 0.016, 1.0)
        .unwrap();
    session.end_frame(1280, 720).unwrap();
}

fn index_of(events: &[MockEvent], event: MockEvent) -> usize {
    events
        .iter()
        .position(|e| *e == event)
        .unwrap_or_else(|| panic!("{event:?} missing from {events:?}"))
}

#[test]
fn single_frame_end_to_end() {
    let runtime = MockRuntime::new();
    let mut session = session_over(&runtime);
    let mut sink = RecordingSink::default();

    run_frame(&mut session, &runtime, &mut sink);

    // Stationary HMD at identity: the inverted head pose is identity too.
    let id: Matrix = identity_matrix!();
    assert_eq!(session.head_pose(), &id);

    // No controller activity: nothing reaches the input bus.
    assert!(sink.bindings.is_empty());
    assert!(sink.turns.is_empty());

    // Exactly one submission per eye, with that eye's texture.
    assert_eq!(
        runtime.submitted(),
        vec![(VREye::Left, 100), (VREye::Right, 101)]
    );

    let events = runtime.events();
    let wait = index_of(&events, MockEvent::WaitGetPoses);
    let scene_l = index_of(&events, MockEvent::Scene(VREye::Left));
    let scene_r = index_of(&events, MockEvent::Scene(VREye::Right));
    let resolve_l = index_of(&events, MockEvent::Resolve(VREye::Left));
    let resolve_r = index_of(&events, MockEvent::Resolve(VREye::Right));
    let submit_l = index_of(&events, MockEvent::Submit(VREye::Left));
    let submit_r = index_of(&events, MockEvent::Submit(VREye::Right));

    // Poses first, then both scene passes, each resolved, then submission.
    assert!(wait < scene_l && scene_l < scene_r);
    assert!(scene_l < resolve_l && scene_r < resolve_r);
    assert!(resolve_r < submit_l && submit_l < submit_r);
    assert_eq!(events.iter().filter(|e| matches!(e, MockEvent::Scene(_))).count(), 2);
    assert_eq!(events.iter().filter(|e| matches!(e, MockEvent::Submit(_))).count(), 2);
}

#[test]
fn frame_methods_reject_out_of_order_calls() {
    let runtime = MockRuntime::new();
    let mut session = session_over(&runtime);

    let err = session.render_stereo(|_, _, _| {}, 0.016, 1.0).unwrap_err();
    assert!(matches!(err, VRSessionError::OutOfOrder { .. }));

    let err = session.end_frame(1280, 720).unwrap_err();
    assert!(matches!(err, VRSessionError::OutOfOrder { .. }));
}

#[test]
fn head_pose_survives_tracking_drop() {
    let runtime = MockRuntime::new();
    let mut session = session_over(&runtime);
    let mut sink = RecordingSink::default();

    let pose = matrix::translation(1.0, 2.0, 3.0);
    runtime.set_hmd_pose(&pose, true);
    run_frame(&mut session, &runtime, &mut sink);
    assert!((session.head_pose()[12] + 1.0).abs() < 1e-5);

    runtime.invalidate_device_pose(0);
    run_frame(&mut session, &runtime, &mut sink);
    assert!((session.head_pose()[12] + 1.0).abs() < 1e-5);
    assert!((session.hmd_pose()[12] - 1.0).abs() < 1e-5);
}

#[test]
fn focus_loss_is_tolerated() {
    let runtime = MockRuntime::new();
    let mut session = session_over(&runtime);
    let mut sink = RecordingSink::default();

    runtime.set_focus(false);
    run_frame(&mut session, &runtime, &mut sink);

    // The loop kept going, but nothing was displayed.
    assert!(runtime.submitted().is_empty());
}

#[test]
fn fatal_compositor_errors_abort_the_frame() {
    let runtime = MockRuntime::new();
    let mut session = session_over(&runtime);
    let mut sink = RecordingSink::default();

    runtime.set_submit_error(Some(108));
    session.begin_frame(&mut sink).unwrap();
    session.render_stereo(|_, _, _| {}, 0.016, 1.0).unwrap();
    let err = session.end_frame(1280, 720).unwrap_err();
    assert!(matches!(
        err,
        VRSessionError::Compositor { op: "Submit", .. }
    ));

    let runtime = MockRuntime::new();
    runtime.set_wait_error(Some(101));
    let mut session = session_over(&runtime);
    let err = session.begin_frame(&mut sink).unwrap_err();
    assert!(matches!(
        err,
        VRSessionError::Compositor {
            op: "WaitGetPoses",
            ..
        }
    ));
}

fn triangle_mesh() -> VRModelMesh {
    VRModelMesh {
        vertices: vec![],
        indices: vec![0, 1, 2],
    }
}

#[test]
fn controller_mesh_rebuilds_once_per_model_change() {
    let runtime = MockRuntime::new();
    let mut sink = RecordingSink::default();

    let hand_pose = matrix::translation(0.1, 1.0, -0.2);
    runtime.set_pose_action("/actions/main/in/hand_right", &hand_pose, Some(3));
    runtime.set_device_property(3, VRDeviceProperty::RenderModelName, "vive_controller");
    runtime.add_render_model("vive_controller", triangle_mesh(), 2);

    let mut session = session_over(&runtime);
    for _ in 0..3 {
        run_frame(&mut session, &runtime, &mut sink);
    }

    {
        let controller = session.controller(voxvr::Hand::Right);
        assert!(controller.is_initialized());
        assert_eq!(controller.model_name(), "vive_controller");
        // First upload got id 1; repeating the same name rebuilt nothing.
        assert_eq!(controller.mesh().unwrap().vertex_array, 1);
        assert!((controller.pose()[12] - 0.1).abs() < 1e-5);
    }

    // Swap the physical controller: one release, one new upload.
    runtime.set_device_property(3, VRDeviceProperty::RenderModelName, "index_controller");
    runtime.add_render_model("index_controller", triangle_mesh(), 0);
    run_frame(&mut session, &runtime, &mut sink);
    run_frame(&mut session, &runtime, &mut sink);

    let controller = session.controller(voxvr::Hand::Right);
    assert_eq!(controller.model_name(), "index_controller");
    assert_eq!(controller.mesh().unwrap().vertex_array, 2);
}

#[test]
fn digital_actions_forward_edges_only() {
    let runtime = MockRuntime::new();
    let mut session = session_over(&runtime);
    let mut sink = RecordingSink::default();

    runtime.set_digital_action("/actions/main/in/jump", true, true);
    run_frame(&mut session, &runtime, &mut sink);
    assert_eq!(sink.bindings, vec![(GameBinding::Jump, true)]);

    // Held down: no redundant event.
    run_frame(&mut session, &runtime, &mut sink);
    assert_eq!(sink.bindings.len(), 1);

    runtime.set_digital_action("/actions/main/in/jump", true, false);
    run_frame(&mut session, &runtime, &mut sink);
    assert_eq!(
        sink.bindings,
        vec![(GameBinding::Jump, true), (GameBinding::Jump, false)]
    );
}

#[test]
fn analog_turn_is_scaled_into_the_input_bus() {
    let runtime = MockRuntime::new();
    let mut session = session_over(&runtime);
    let mut sink = RecordingSink::default();

    runtime.set_analog_action("/actions/main/in/turn_2_axis", 0.1, 0.2);
    run_frame(&mut session, &runtime, &mut sink);

    assert_eq!(sink.turns.len(), 1);
    let (dx, dy) = sink.turns[0];
    assert!((dx - 2.0).abs() < 1e-5);
    assert!((dy - 4.0).abs() < 1e-5);
}

#[test]
fn walk_axis_reads_current_analog_state() {
    let runtime = MockRuntime::new();
    let mut session = session_over(&runtime);

    assert_eq!(session.walk_axis().unwrap(), (0.0, 0.0));
    runtime.set_analog_action("/actions/main/in/walk_2_axis", 0.5, -0.25);
    assert_eq!(session.walk_axis().unwrap(), (0.5, -0.25));
}

#[test]
fn projection_stays_bitwise_stable_across_frames() {
    let runtime = MockRuntime::new();
    let mut session = session_over(&runtime);
    let mut sink = RecordingSink::default();

    let before = session.projection(Some(VREye::Left));
    run_frame(&mut session, &runtime, &mut sink);
    run_frame(&mut session, &runtime, &mut sink);
    assert_eq!(session.projection(Some(VREye::Left)), before);

    let id: Matrix = identity_matrix!();
    assert_eq!(session.projection(None), id);
}
