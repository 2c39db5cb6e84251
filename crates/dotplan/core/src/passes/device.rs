// Dotlanth
// Copyright (C) 2025 Synerthink

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

use serde::Serialize;
use tracing::debug;

use crate::device::{DeviceRegistry, DeviceSupport};
use crate::error::PlanError;
use crate::plan::{DeviceAssignment, PlanNode};
use crate::visitor::{PlanVisitor, traverse};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeviceStats {
    pub nodes_visited: usize,
    pub supported_nodes: usize,
    /// Device checks that failed with a non-fatal error.
    pub degraded_checks: usize,
    /// Whether any device annotation differs from what the tree carried before.
    pub changed: bool,
}

/// Whether a finished subtree's annotations differ from the ones it had
/// before the pass, both as left and once a claiming ancestor has cleared
/// every device field in it.
#[derive(Clone, Copy)]
struct SubtreeChange {
    kept: bool,
    collapsed: bool,
}

/// Post-order pass that decides which subtrees a device can take over.
///
/// Leaves are offered to every device. An inner node is offered to every
/// device only when all of its children are device-supported, together with
/// the children's assignments; a single unsupported child keeps the node in
/// process without any device being asked. When a device claims a node, the
/// device fields of everything below it are cleared so that only the topmost
/// node of a pushed-down subtree carries an assignment.
///
/// The pass also tracks, per node, every device that claimed it. That set is
/// what [`DeviceDeterminer::support_set`] reports.
pub struct DeviceDeterminer<'a> {
    registry: &'a DeviceRegistry,
    support: Vec<Vec<usize>>,
    changes: Vec<SubtreeChange>,
    stats: DeviceStats,
}

impl<'a> DeviceDeterminer<'a> {
    pub fn new(registry: &'a DeviceRegistry) -> Self {
        Self { registry, support: Vec::new(), changes: Vec::new(), stats: DeviceStats::default() }
    }

    pub fn stats(&self) -> &DeviceStats {
        &self.stats
    }

    pub fn into_stats(self) -> DeviceStats {
        self.stats
    }

    /// Registry positions of the devices supporting all of `node`, leaving
    /// `node` itself unannotated.
    pub fn support_set(registry: &DeviceRegistry, node: &PlanNode) -> Result<Vec<usize>, PlanError> {
        if registry.is_empty() {
            return Ok(Vec::new());
        }
        let mut scratch = node.clone();
        let mut determiner = DeviceDeterminer::new(registry);
        traverse(&mut scratch, &mut determiner)?;
        Ok(determiner.support.pop().unwrap_or_default())
    }
}

impl PlanVisitor for DeviceDeterminer<'_> {
    fn pre_order(&mut self, node: &mut PlanNode) -> Result<(), PlanError> {
        node.validate_shape()
    }

    fn post_order(&mut self, node: &mut PlanNode) -> Result<(), PlanError> {
        self.stats.nodes_visited += 1;
        let arity = node.children().len();
        if self.support.len() < arity {
            return Err(PlanError::MalformedTree(format!(
                "{} has {} children but only {} support sets are available",
                node.kind().name(),
                arity,
                self.support.len()
            )));
        }
        let child_sets = self.support.split_off(self.support.len() - arity);
        let child_changes = self.changes.split_off(self.changes.len().saturating_sub(arity));
        let previous = (node.device().cloned(), node.device_supported());
        let candidates = if child_sets.iter().all(|set| !set.is_empty()) { self.registry.len() } else { 0 };
        let child_devices: Vec<Option<String>> = node.children().iter().map(|c| c.device().map(|d| d.device.clone())).collect();

        let mut supported = Vec::with_capacity(candidates);
        let mut assignment = None;
        for (index, (name, device)) in self.registry.entries().iter().enumerate().take(candidates) {
            match device.supports(node, &child_devices) {
                Ok(DeviceSupport::Supported { translation }) => {
                    if assignment.is_none() {
                        assignment = Some(DeviceAssignment { device: name.clone(), translation });
                    }
                    supported.push(index);
                }
                Ok(DeviceSupport::Unsupported) => {}
                Err(err) if err.is_fatal() => return Err(PlanError::Device(err)),
                Err(err) => {
                    debug!(device = %name, node = node.kind().name(), error = %err, "Device check failed, keeping node in process");
                    self.stats.degraded_checks += 1;
                }
            }
        }

        match assignment {
            Some(assignment) => {
                node.set_device(assignment);
                node.set_device_supported(true);
                node.clear_descendant_devices();
                self.stats.supported_nodes += 1;
            }
            None => {
                node.clear_device();
                node.set_device_supported(false);
            }
        }

        let support_changed = previous.1 != node.device_supported();
        let children_changed = if node.device_supported() {
            child_changes.iter().any(|c| c.collapsed)
        } else {
            child_changes.iter().any(|c| c.kept)
        };
        let change = SubtreeChange {
            kept: previous.0.as_ref() != node.device() || support_changed || children_changed,
            collapsed: previous.0.is_some() || support_changed || child_changes.iter().any(|c| c.collapsed),
        };
        // The root finishes last, so its verdict is the one left standing.
        self.stats.changed = change.kept;
        self.changes.push(change);
        self.support.push(supported);
        Ok(())
    }
}
