//! Philips Hue REST (v1) support
//!
//! Only the two write endpoints used for animation are covered:
//! per-light state and per-group action.

pub mod models;
pub mod protocol;

pub use models::BridgeEndpoint;
pub use protocol::{brightness, transition_deciseconds, LightState};
