#[cfg(feature = "serde-serialization")]
use serde::{Deserialize, Serialize};

/// One of the two eyes of the HMD.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-serialization", derive(Deserialize, Serialize))]
pub enum VREye {
    Left,
    Right,
}

impl VREye {
    /// Both eyes in render order.
    pub const BOTH: [VREye; 2] = [VREye::Left, VREye::Right];

    pub fn index(self) -> usize {
        match self {
            VREye::Left => 0,
            VREye::Right => 1,
        }
    }
}
