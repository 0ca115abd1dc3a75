use super::protocol;
use hueflow_core::{BridgeSettings, FixtureId};

/// Address and credential of one bridge, immutable after startup
#[derive(Clone, PartialEq, Eq)]
pub struct BridgeEndpoint {
    /// Cluster name from the configuration
    pub name: String,
    /// Host or host:port
    pub address: String,
    /// API username, sent as part of every URL
    pub username: String,
}

impl BridgeEndpoint {
    pub fn new(
        name: impl Into<String>,
        address: impl Into<String>,
        username: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            username: username.into(),
        }
    }

    /// Endpoint for a configured bridge
    pub fn from_settings(name: &str, settings: &BridgeSettings) -> Self {
        Self::new(name, settings.ip.as_str(), settings.username.as_str())
    }

    /// `PUT` target for a single light
    pub fn light_url(&self, light: FixtureId) -> String {
        protocol::light_state_url(&self.address, &self.username, light)
    }

    /// `PUT` target for a group
    pub fn group_url(&self, group: u32) -> String {
        protocol::group_action_url(&self.address, &self.username, group)
    }
}

impl std::fmt::Debug for BridgeEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgeEndpoint")
            .field("name", &self.name)
            .field("address", &self.address)
            .field("username", &"***REDACTED***")
            .finish()
    }
}
