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

//! Plan preparation pipeline

use dotplan_common::PlannerConfig;
use metrics::counter;
use rayon::prelude::*;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{Span, debug, info, instrument};
use uuid::Uuid;

use crate::catalog::Catalog;
use crate::device::DeviceRegistry;
use crate::error::PlanError;
use crate::passes::{AccessPathDeterminer, AccessPathStats, DeviceDeterminer, DeviceStats, NormalizationStats, RestrictionNormalizer};
use crate::plan::PlanNode;
use crate::visitor::traverse;

/// Timing and outcome of a single pass run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PassMetrics {
    /// Name of the pass
    pub pass_name: String,
    /// Duration of the pass in microseconds
    pub duration_us: u128,
    /// Whether the pass changed the tree
    pub changed: bool,
}

/// Everything recorded while preparing one plan
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanReport {
    /// Identifier used to correlate log lines for this plan
    pub plan_id: String,
    /// Per-pass metrics, in execution order
    pub passes: Vec<PassMetrics>,
    /// Present when normalization ran
    pub normalization: Option<NormalizationStats>,
    pub devices: DeviceStats,
    pub access_paths: AccessPathStats,
    /// Relational nodes evaluated by a device, counting only subtree roots
    pub device_roots: usize,
}

/// Runs the planning passes over compiled plan trees.
///
/// A planner holds no per-plan state, so one instance can prepare any number
/// of trees, concurrently if need be.
pub struct Planner {
    catalog: Arc<dyn Catalog>,
    devices: DeviceRegistry,
    config: PlannerConfig,
}

impl Planner {
    pub fn new(catalog: Arc<dyn Catalog>, devices: DeviceRegistry, config: PlannerConfig) -> Self {
        Self { catalog, devices, config }
    }

    pub fn with_defaults(catalog: Arc<dyn Catalog>) -> Self {
        Self::new(catalog, DeviceRegistry::new(), PlannerConfig::default())
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    pub fn devices(&self) -> &DeviceRegistry {
        &self.devices
    }

    pub fn catalog(&self) -> &Arc<dyn Catalog> {
        &self.catalog
    }

    /// Rewrites every unnormalized restriction in the tree.
    pub fn normalize_restrictions(&self, tree: &mut PlanNode) -> Result<(), PlanError> {
        self.run_normalization(tree).map(|_| ())
    }

    /// Annotates the tree with device assignments.
    pub fn determine_devices(&self, tree: &mut PlanNode) -> Result<(), PlanError> {
        self.run_device_determination(tree).map(|_| ())
    }

    /// Annotates every in-process relational node with an access path.
    pub fn determine_access_paths(&self, tree: &mut PlanNode) -> Result<(), PlanError> {
        self.run_access_path_determination(tree).map(|_| ())
    }

    #[instrument(skip_all)]
    fn run_normalization(&self, tree: &mut PlanNode) -> Result<NormalizationStats, PlanError> {
        let mut normalizer = RestrictionNormalizer::new(self.catalog.as_ref(), &self.devices, self.config.max_disjuncts);
        traverse(tree, &mut normalizer)?;
        let stats = normalizer.into_stats();
        counter!("dotplan_restrictions_rewritten", stats.restrictions_rewritten as u64);
        counter!("dotplan_dnf_fallbacks", stats.dnf_fallbacks as u64);
        debug!(visited = stats.restrictions_visited, rewritten = stats.restrictions_rewritten, "Normalized restrictions");
        Ok(stats)
    }

    #[instrument(skip_all)]
    fn run_device_determination(&self, tree: &mut PlanNode) -> Result<DeviceStats, PlanError> {
        let mut determiner = DeviceDeterminer::new(&self.devices);
        traverse(tree, &mut determiner)?;
        let stats = determiner.into_stats();
        debug!(supported = stats.supported_nodes, degraded = stats.degraded_checks, "Determined devices");
        Ok(stats)
    }

    #[instrument(skip_all)]
    fn run_access_path_determination(&self, tree: &mut PlanNode) -> Result<AccessPathStats, PlanError> {
        let mut determiner = AccessPathDeterminer::new(self.catalog.as_ref(), &self.config.cost);
        traverse(tree, &mut determiner)?;
        let stats = determiner.into_stats();
        counter!("dotplan_index_paths", stats.index_lookups as u64);
        debug!(paths = stats.paths_assigned, index_lookups = stats.index_lookups, "Determined access paths");
        Ok(stats)
    }

    /// Validates the tree and runs all passes over it.
    ///
    /// On error the tree may be partly rewritten and should be discarded.
    #[instrument(skip_all, fields(plan_id = tracing::field::Empty))]
    pub fn prepare(&self, tree: &mut PlanNode) -> Result<PlanReport, PlanError> {
        let plan_id = format!("plan_{}", Uuid::new_v4());
        Span::current().record("plan_id", plan_id.as_str());
        tree.validate()?;

        let mut passes = Vec::with_capacity(3);
        let normalization = if self.config.normalize_restrictions {
            let (stats, metrics) = timed("restriction_normalization", || self.run_normalization(tree), |s| s.changed)?;
            passes.push(metrics);
            Some(stats)
        } else {
            None
        };
        let (devices, metrics) = timed("device_determination", || self.run_device_determination(tree), |s| s.changed)?;
        passes.push(metrics);
        let (access_paths, metrics) = timed("access_path_determination", || self.run_access_path_determination(tree), |s| s.changed)?;
        passes.push(metrics);

        let device_roots = tree.iter().filter(|n| n.is_relational() && n.device().is_some()).count();
        counter!("dotplan_device_roots", device_roots as u64);
        info!(%plan_id, nodes = tree.node_count(), device_roots, "Prepared plan");

        Ok(PlanReport { plan_id, passes, normalization, devices, access_paths, device_roots })
    }

    /// Prepares independent trees in parallel. Results line up with `trees`.
    pub fn prepare_all(&self, trees: &mut [PlanNode]) -> Vec<Result<PlanReport, PlanError>> {
        trees.par_iter_mut().map(|tree| self.prepare(tree)).collect()
    }
}

/// Runs one pass and reads its change flag from the stats it returns.
fn timed<T>(
    pass_name: &str,
    pass: impl FnOnce() -> Result<T, PlanError>,
    changed: impl FnOnce(&T) -> bool,
) -> Result<(T, PassMetrics), PlanError> {
    let start = Instant::now();
    let stats = pass()?;
    let metrics = PassMetrics { pass_name: pass_name.to_string(), duration_us: start.elapsed().as_micros(), changed: changed(&stats) };
    Ok((stats, metrics))
}
