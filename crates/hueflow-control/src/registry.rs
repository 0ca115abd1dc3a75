//! Static cluster registry
//!
//! Bridge discovery happens elsewhere; at startup the process is handed a
//! fixed `cluster name -> address` mapping and resolves names through it.

use crate::error::{ControlError, Result};
use crate::hue::BridgeEndpoint;
use hueflow_core::HueflowConfig;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default)]
pub struct ClusterRegistry {
    endpoints: BTreeMap<String, BridgeEndpoint>,
}

impl ClusterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every configured bridge
    pub fn from_config(config: &HueflowConfig) -> Self {
        let endpoints = config
            .bridges
            .iter()
            .map(|(name, settings)| (name.clone(), BridgeEndpoint::from_settings(name, settings)))
            .collect();
        Self { endpoints }
    }

    pub fn insert(&mut self, endpoint: BridgeEndpoint) {
        self.endpoints.insert(endpoint.name.clone(), endpoint);
    }

    /// Resolve a cluster name
    pub fn resolve(&self, name: &str) -> Result<&BridgeEndpoint> {
        self.endpoints
            .get(name)
            .ok_or_else(|| ControlError::Configuration(format!("Unknown bridge '{}'", name)))
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    /// Endpoints in name order
    pub fn endpoints(&self) -> impl Iterator<Item = &BridgeEndpoint> {
        self.endpoints.values()
    }
}
