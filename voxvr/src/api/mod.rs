//! Runtime backends. Which ones are compiled in is selected with cargo
//! features, `mock` being the default for tests and displayless development.

#[cfg(feature = "mock")]
pub mod mock;

#[cfg(feature = "openvr")]
pub mod openvr;
