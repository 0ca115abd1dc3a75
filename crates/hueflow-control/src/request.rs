//! Device requests
//!
//! Built fresh every dispatch cycle and never retried as the same object.

use crate::hue::{BridgeEndpoint, LightState};
use hueflow_core::FixtureId;
use reqwest::Method;
use std::fmt;

/// What a request addresses on its bridge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Light(FixtureId),
    Group(u32),
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Light(id) => write!(f, "light {}", id),
            Target::Group(id) => write!(f, "group {}", id),
        }
    }
}

/// One HTTP call to one bridge
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceRequest {
    /// Cluster (bridge) name
    pub cluster: String,
    pub target: Target,
    pub method: Method,
    pub url: String,
    pub body: LightState,
}

impl DeviceRequest {
    /// `PUT .../lights/{id}/state`
    pub fn light(endpoint: &BridgeEndpoint, light: FixtureId, body: LightState) -> Self {
        Self {
            cluster: endpoint.name.clone(),
            target: Target::Light(light),
            method: Method::PUT,
            url: endpoint.light_url(light),
            body,
        }
    }

    /// `PUT .../groups/{id}/action`
    pub fn group(endpoint: &BridgeEndpoint, group: u32, body: LightState) -> Self {
        Self {
            cluster: endpoint.name.clone(),
            target: Target::Group(group),
            method: Method::PUT,
            url: endpoint.group_url(group),
            body,
        }
    }
}

impl fmt::Display for DeviceRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} on {}", self.method, self.target, self.cluster)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_light_request() {
        let endpoint = BridgeEndpoint::new("Bridge-01", "10.0.0.2:8080", "user");
        let request = DeviceRequest::light(&endpoint, FixtureId(3), LightState::new().with_bri(9));
        assert_eq!(request.method, Method::PUT);
        assert_eq!(request.url, "http://10.0.0.2:8080/api/user/lights/3/state");
        assert_eq!(request.target, Target::Light(FixtureId(3)));
        assert_eq!(request.to_string(), "PUT light 3 on Bridge-01");
    }

    #[test]
    fn test_group_request() {
        let endpoint = BridgeEndpoint::new("Bridge-02", "10.0.0.3", "user");
        let request = DeviceRequest::group(&endpoint, 0, LightState::new().with_hue(1000));
        assert_eq!(request.url, "http://10.0.0.3/api/user/groups/0/action");
        assert_eq!(request.cluster, "Bridge-02");
    }
}
