use crate::matrix::HmdMatrix34;
#[cfg(feature = "serde-serialization")]
use serde::{Deserialize, Serialize};

/// Number of device slots the runtime tracks.
pub const MAX_TRACKED_DEVICES: usize = 64;

/// Device slot reserved for the HMD itself.
pub const HMD_DEVICE_INDEX: u32 = 0;

/// Snapshot of one tracked device's pose for the current frame.
///
/// `is_valid` distinguishes a fresh reading from a device that lost tracking;
/// consumers are expected to keep their previous transform when it is false.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde-serialization", derive(Deserialize, Serialize))]
pub struct TrackedDevicePose {
    /// Row-major device-to-tracking-origin transform.
    pub device_to_absolute: HmdMatrix34,
    pub is_valid: bool,
    pub is_connected: bool,
}

impl Default for TrackedDevicePose {
    fn default() -> TrackedDevicePose {
        TrackedDevicePose {
            device_to_absolute: [
                [1.0, 0.0, 0.0, 0.0],
                [0.0, 1.0, 0.0, 0.0],
                [0.0, 0.0, 1.0, 0.0],
            ],
            is_valid: false,
            is_connected: false,
        }
    }
}
