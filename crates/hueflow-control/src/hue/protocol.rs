//! Hue v1 light/group state bodies and endpoint URLs

use hueflow_core::FixtureId;
use serde::Serialize;

/// Largest brightness the bridge accepts
pub const MAX_BRI: u8 = 254;
/// Largest saturation the bridge accepts
pub const MAX_SAT: u8 = 254;

/// `http://{address}/api/{username}/lights/{id}/state`
pub fn light_state_url(address: &str, username: &str, light: FixtureId) -> String {
    format!("http://{}/api/{}/lights/{}/state", address, username, light)
}

/// `http://{address}/api/{username}/groups/{id}/action`
pub fn group_action_url(address: &str, username: &str, group: u32) -> String {
    format!("http://{}/api/{}/groups/{}/action", address, username, group)
}

/// Transition time in deciseconds, rounded to the nearest one
pub fn transition_deciseconds(seconds: f64) -> u16 {
    (seconds * 10.0).round().clamp(0.0, u16::MAX as f64) as u16
}

/// Map a channel value in [0, 1] to a `bri` level (truncating)
pub fn brightness(value: f32) -> u8 {
    (value.clamp(0.0, 1.0) * MAX_BRI as f32) as u8
}

/// JSON body of a state/action `PUT`. Unset fields are omitted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LightState {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bri: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hue: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sat: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transitiontime: Option<u16>,
}

impl LightState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bri(mut self, bri: u8) -> Self {
        self.bri = Some(bri);
        self
    }

    pub fn with_hue(mut self, hue: u16) -> Self {
        self.hue = Some(hue);
        self
    }

    /// Saturation, clamped to what the bridge accepts
    pub fn with_sat(mut self, sat: u8) -> Self {
        self.sat = Some(sat.min(MAX_SAT));
        self
    }

    /// Transition in seconds
    pub fn with_transition(mut self, seconds: f64) -> Self {
        self.transitiontime = Some(transition_deciseconds(seconds));
        self
    }
}
