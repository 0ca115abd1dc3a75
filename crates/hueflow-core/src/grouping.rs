//! Fixture grouping
//!
//! Splits the global fixture list into ordered, disjoint groups. Groups carry a
//! membership mask over the full fixture index space so that pipeline stages
//! (e.g. Range) can select "their" fixtures without a lookup.

use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Documented ceiling of simultaneous connections a Hue bridge accepts.
pub const HUE_BRIDGE_CONNECTION_LIMIT: usize = 6;

/// Identifier of one controllable light, as known to its bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FixtureId(pub u32);

impl fmt::Display for FixtureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for FixtureId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

/// An ordered subset of fixtures plus a membership mask over the global index space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixtureGroup {
    indices: Vec<usize>,
    fixtures: Vec<FixtureId>,
    mask: Vec<bool>,
}

impl FixtureGroup {
    /// Build a group from `(global index, fixture)` pairs.
    ///
    /// Indices at or beyond `index_space` are ignored by the mask but kept in
    /// the member list; callers are expected to stay in range.
    pub fn from_members(
        members: impl IntoIterator<Item = (usize, FixtureId)>,
        index_space: usize,
    ) -> Self {
        let mut group = Self::empty(index_space);
        for (index, fixture) in members {
            group.push(index, fixture);
        }
        group
    }

    fn empty(index_space: usize) -> Self {
        Self {
            indices: Vec::new(),
            fixtures: Vec::new(),
            mask: vec![false; index_space],
        }
    }

    fn push(&mut self, index: usize, fixture: FixtureId) {
        if let Some(slot) = self.mask.get_mut(index) {
            *slot = true;
        }
        self.indices.push(index);
        self.fixtures.push(fixture);
    }

    /// Number of fixtures in the group
    pub fn len(&self) -> usize {
        self.fixtures.len()
    }

    /// Whether the group has no fixtures
    pub fn is_empty(&self) -> bool {
        self.fixtures.is_empty()
    }

    /// Fixture ids, in group order
    pub fn fixtures(&self) -> &[FixtureId] {
        &self.fixtures
    }

    /// Global pipeline indices, in group order
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    /// Membership mask over the full fixture index space
    pub fn mask(&self) -> &[bool] {
        &self.mask
    }

    /// `(global index, fixture)` pairs in group order
    pub fn members(&self) -> impl Iterator<Item = (usize, FixtureId)> + '_ {
        self.indices.iter().copied().zip(self.fixtures.iter().copied())
    }

    /// Whether the global index belongs to this group
    pub fn contains_index(&self, index: usize) -> bool {
        self.mask.get(index).copied().unwrap_or(false)
    }
}

/// Partition fixtures into `group_count` groups, round-robin in input order.
///
/// Fixture `i` lands in group `i % group_count`; its position in `fixtures`
/// is its global index.
pub fn partition(fixtures: &[FixtureId], group_count: usize) -> Result<Vec<FixtureGroup>> {
    let whole = FixtureGroup::from_members(fixtures.iter().copied().enumerate(), fixtures.len());
    partition_group(&whole, group_count)
}

/// Partition an existing group round-robin, keeping its global indices.
pub fn partition_group(group: &FixtureGroup, group_count: usize) -> Result<Vec<FixtureGroup>> {
    validate_counts(group.len(), group_count)?;

    let index_space = group.mask().len();
    let mut groups: Vec<FixtureGroup> = (0..group_count)
        .map(|_| FixtureGroup::empty(index_space))
        .collect();

    for (position, (index, fixture)) in group.members().enumerate() {
        groups[position % group_count].push(index, fixture);
    }

    Ok(groups)
}

/// There must be at least one fixture for every worker.
pub fn validate_counts(fixture_count: usize, workers: usize) -> Result<()> {
    if workers == 0 {
        return Err(CoreError::config("At least one worker is required"));
    }
    if workers > fixture_count {
        return Err(CoreError::config(format!(
            "Must have at least one light for every thread! {} lights, {} threads",
            fixture_count, workers
        )));
    }
    Ok(())
}

/// `max_connects * workers` must not exceed the hardware connection ceiling.
///
/// Violations are rejected, never clamped.
pub fn validate_connection_budget(max_connects: usize, workers: usize, limit: usize) -> Result<()> {
    if max_connects == 0 {
        return Err(CoreError::config("max_connects must be at least 1"));
    }
    let total = max_connects.saturating_mul(workers);
    if total > limit {
        return Err(CoreError::config(format!(
            "No more than {} connections are allowed by the bridge at once! You asked for {} ({} x {} threads)",
            limit, total, max_connects, workers
        )));
    }
    Ok(())
}

/// The fixtures one cluster owns and how they are split between its workers.
#[derive(Debug, Clone)]
pub struct ClusterAssignment {
    /// Cluster (bridge) name
    pub name: String,
    /// All fixtures of this cluster, masked over the global index space
    pub group: FixtureGroup,
    /// One group per dispatch worker
    pub workers: Vec<FixtureGroup>,
}

/// Build per-cluster groups from the global fixture list.
///
/// Clusters are ordered by their first appearance in `main_lights`.
/// `workers` gives the worker count for each known cluster.
pub fn assign_clusters(
    main_lights: &[(String, FixtureId)],
    workers: &BTreeMap<String, usize>,
) -> Result<Vec<ClusterAssignment>> {
    let index_space = main_lights.len();
    let mut order: Vec<&str> = Vec::new();
    let mut members: BTreeMap<&str, Vec<(usize, FixtureId)>> = BTreeMap::new();

    for (index, (cluster, fixture)) in main_lights.iter().enumerate() {
        if !workers.contains_key(cluster) {
            return Err(CoreError::config(format!(
                "Light {} refers to unknown bridge '{}'",
                fixture, cluster
            )));
        }
        let entry = members.entry(cluster.as_str()).or_insert_with(|| {
            order.push(cluster.as_str());
            Vec::new()
        });
        entry.push((index, *fixture));
    }

    order
        .into_iter()
        .map(|name| -> Result<ClusterAssignment> {
            let group = FixtureGroup::from_members(members.remove(name).unwrap_or_default(), index_space);
            let count = workers.get(name).copied().unwrap_or(1);
            let split = partition_group(&group, count)
                .map_err(|e| CoreError::config(format!("Bridge '{}': {}", name, e)))?;
            Ok(ClusterAssignment {
                name: name.to_string(),
                group,
                workers: split,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(n: u32) -> Vec<FixtureId> {
        (1..=n).map(FixtureId).collect()
    }

    #[test]
    fn test_partition_29_into_6() {
        let groups = partition(&ids(29), 6).unwrap();
        let sizes: Vec<usize> = groups.iter().map(FixtureGroup::len).collect();
        assert_eq!(sizes, vec![5, 5, 5, 5, 5, 4]);

        // Round-robin: group 0 holds positions 0, 6, 12, ...
        assert_eq!(groups[0].indices(), &[0, 6, 12, 18, 24]);
        assert_eq!(
            groups[5].fixtures(),
            &[FixtureId(6), FixtureId(12), FixtureId(18), FixtureId(24)]
        );
    }

    #[test]
    fn test_mask_matches_members() {
        let groups = partition(&ids(7), 3).unwrap();
        for group in &groups {
            assert_eq!(group.mask().len(), 7);
            for (index, _) in group.members() {
                assert!(group.contains_index(index));
            }
            assert_eq!(group.mask().iter().filter(|m| **m).count(), group.len());
        }
        assert!(!groups[0].contains_index(99));
    }

    #[test]
    fn test_too_many_groups_rejected() {
        let err = partition(&ids(3), 4).unwrap_err();
        assert!(matches!(err, CoreError::Configuration(_)));
        assert!(partition(&ids(3), 0).is_err());
    }

    #[test]
    fn test_connection_budget() {
        assert!(validate_connection_budget(2, 4, 6).is_err());
        assert!(validate_connection_budget(1, 6, 6).is_ok());
        assert!(validate_connection_budget(3, 2, HUE_BRIDGE_CONNECTION_LIMIT).is_ok());
        assert!(validate_connection_budget(0, 1, 6).is_err());
    }

    #[test]
    fn test_assign_clusters() {
        let main_lights = vec![
            ("Bridge-01".to_string(), FixtureId(1)),
            ("Bridge-02".to_string(), FixtureId(7)),
            ("Bridge-01".to_string(), FixtureId(2)),
            ("Bridge-01".to_string(), FixtureId(6)),
        ];
        let mut workers = BTreeMap::new();
        workers.insert("Bridge-01".to_string(), 2);
        workers.insert("Bridge-02".to_string(), 1);

        let clusters = assign_clusters(&main_lights, &workers).unwrap();
        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0].name, "Bridge-01");
        assert_eq!(clusters[0].group.indices(), &[0, 2, 3]);
        assert_eq!(clusters[0].workers.len(), 2);
        assert_eq!(clusters[0].workers[0].indices(), &[0, 3]);
        assert_eq!(clusters[0].workers[1].indices(), &[2]);
        assert_eq!(clusters[1].group.fixtures(), &[FixtureId(7)]);
        assert_eq!(clusters[1].group.mask(), &[false, true, false, false]);
    }

    #[test]
    fn test_assign_clusters_unknown_bridge() {
        let main_lights = vec![("Nope".to_string(), FixtureId(1))];
        let workers = BTreeMap::new();
        assert!(assign_clusters(&main_lights, &workers).is_err());
    }
}
