/// Game keybindings a controller action can drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GameBinding {
    PlaceBlock,
    DeleteBlock,
    PickBlock,
    Jump,
}

/// The game's generic input-event bus.
///
/// `set_binding` is edge-triggered: it is only called when a controller
/// action's boolean state changed this frame.
pub trait InputSink {
    fn set_binding(&mut self, binding: GameBinding, pressed: bool);

    /// Raw two-axis turn input, pre-scaled to match mouse-delta units.
    fn raw_turn(&mut self, dx: f32, dy: f32);
}
