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

use dotplan_common::CostConfig;
use serde::Serialize;
use tracing::{debug, trace};

use crate::access::{CostEstimate, CostModel, IndexSelector, OperationCost};
use crate::catalog::{Catalog, source_tables};
use crate::error::PlanError;
use crate::plan::{AccessPath, AccessStrategy, BinaryOperator, JoinAlgorithm, JoinType, NodeKind, PlanNode, RestrictRole};
use crate::predicate::{SargableComparison, conjuncts};
use crate::visitor::PlanVisitor;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AccessPathStats {
    pub paths_assigned: usize,
    pub index_lookups: usize,
    pub table_scans: usize,
    pub device_paths: usize,
    /// Whether any node ended up with a path different from the one it had.
    pub changed: bool,
}

/// Post-order pass that picks a physical strategy for every relational node
/// evaluated in process.
///
/// The topmost node of a device-supported subtree gets a `Device` path and
/// nothing below it gets one, since the device decides how to run it.
pub struct AccessPathDeterminer<'a> {
    catalog: &'a dyn Catalog,
    config: &'a CostConfig,
    cost_model: CostModel,
    device_depth: usize,
    stats: AccessPathStats,
}

impl<'a> AccessPathDeterminer<'a> {
    pub fn new(catalog: &'a dyn Catalog, config: &'a CostConfig) -> Self {
        Self { catalog, config, cost_model: CostModel::new(config), device_depth: 0, stats: AccessPathStats::default() }
    }

    pub fn stats(&self) -> &AccessPathStats {
        &self.stats
    }

    pub fn into_stats(self) -> AccessPathStats {
        self.stats
    }

    fn choose(&mut self, node: &PlanNode) -> Result<AccessPath, PlanError> {
        match node.kind() {
            NodeKind::TableSpecifier { table } => Ok(self.table_path(table)),
            NodeKind::Restrict { role } => self.restrict_path(node, *role),
            NodeKind::Project { .. } => {
                let source = child_path(node, 0)?;
                let cost = source.estimated_cost.add(&self.cost(OperationCost::Derive { rows: source.estimated_rows }));
                let strategy = AccessStrategy::Derived { source: Box::new(source.strategy.clone()) };
                Ok(AccessPath::new(strategy, source.estimated_rows, cost).ordered(source.ordered))
            }
            NodeKind::Join { join_type } => self.join_path(node, *join_type),
            NodeKind::Union { distinct } => {
                let rows = (0..node.children().len())
                    .map(|i| child_path(node, i).map(|p| p.estimated_rows))
                    .try_fold(0u64, |total, rows| rows.map(|r| total.saturating_add(r)))?;
                self.set_operation_path(node, rows, *distinct)
            }
            NodeKind::Intersect => {
                let rows = child_path(node, 0)?.estimated_rows.min(child_path(node, 1)?.estimated_rows);
                self.set_operation_path(node, rows, true)
            }
            NodeKind::Difference => {
                let rows = child_path(node, 0)?.estimated_rows;
                self.set_operation_path(node, rows, true)
            }
            other => Err(PlanError::MalformedTree(format!("{} has no access path", other.name()))),
        }
    }

    fn cost(&self, operation: OperationCost) -> CostEstimate {
        self.cost_model.estimate_operation_cost(&operation)
    }

    fn table_path(&mut self, table: &str) -> AccessPath {
        self.stats.table_scans += 1;
        let Some(metadata) = self.catalog.table(table) else {
            debug!(table, "Table missing from catalog, assuming an unordered scan");
            let rows = self.config.default_row_count;
            return AccessPath::new(AccessStrategy::UnorderedScan { table: table.to_string() }, rows, self.cost(OperationCost::TableScan { rows }));
        };
        let rows = metadata.row_count.unwrap_or(self.config.default_row_count);
        let cost = self.cost(OperationCost::TableScan { rows });
        match metadata.clustered_index() {
            Some(index) => {
                let strategy = AccessStrategy::OrderedIndexScan { table: table.to_string(), index: index.name.clone() };
                AccessPath::new(strategy, rows, cost).ordered(true)
            }
            None => AccessPath::new(AccessStrategy::UnorderedScan { table: table.to_string() }, rows, cost),
        }
    }

    fn restrict_path(&mut self, node: &PlanNode, role: RestrictRole) -> Result<AccessPath, PlanError> {
        let source = child_path(node, 0)?;
        let predicate = node
            .predicate()
            .ok_or_else(|| PlanError::MalformedTree("Restrict without a predicate".to_string()))?;
        let terms = conjuncts(predicate.clone());

        if role != RestrictRole::Residual {
            if let Some(NodeKind::TableSpecifier { table }) = node.source().map(PlanNode::kind) {
                if let Some(metadata) = self.catalog.table(table) {
                    let comparisons: Vec<_> = terms.iter().filter_map(SargableComparison::classify).collect();
                    let recommendation = IndexSelector::new(&self.cost_model, self.config).select_best_index(&metadata, &comparisons);
                    trace!(table = %table, reasoning = %recommendation.reasoning, "Index selection");
                    if recommendation.uses_index() {
                        self.stats.index_lookups += 1;
                        let rows = recommendation.estimated_rows;
                        let cost = recommendation.estimated_cost.add(&self.cost(OperationCost::Filter { rows }));
                        return Ok(AccessPath::new(recommendation.strategy(table), rows, cost).ordered(true));
                    }
                }
            }
        }

        let rows = self.filtered_rows(source.estimated_rows, &terms);
        let cost = source.estimated_cost.add(&self.cost(OperationCost::Filter { rows: source.estimated_rows }));
        let strategy = AccessStrategy::Filter { source: Box::new(source.strategy.clone()) };
        Ok(AccessPath::new(strategy, rows, cost).ordered(source.ordered))
    }

    fn filtered_rows(&self, rows: u64, terms: &[PlanNode]) -> u64 {
        let selectivity: f64 = terms
            .iter()
            .map(|term| match SargableComparison::classify(term) {
                Some(comparison) if comparison.is_equality() => self.config.equality_selectivity,
                _ => self.config.range_selectivity,
            })
            .product();
        ((rows as f64 * selectivity).ceil() as u64).clamp(rows.min(1), rows)
    }

    fn join_path(&mut self, node: &PlanNode, join_type: JoinType) -> Result<AccessPath, PlanError> {
        let left = child_path(node, 0)?;
        let right = child_path(node, 1)?;
        let pairs = node.predicate().map(equi_join_columns).unwrap_or_default();
        let algorithm = self.join_algorithm(node, &pairs, left, right);

        let (l, r) = (left.estimated_rows, right.estimated_rows);
        let rows = match join_type {
            JoinType::Inner if pairs.is_empty() => l.saturating_mul(r),
            JoinType::Inner => l.max(r),
            JoinType::LeftOuter | JoinType::Semi | JoinType::Anti => l,
            JoinType::RightOuter => r,
            JoinType::FullOuter => l.saturating_add(r),
        };
        let cost = left
            .estimated_cost
            .add(&right.estimated_cost)
            .add(&self.cost(OperationCost::Join { left_rows: l, right_rows: r, algorithm }));
        let ordered = match algorithm {
            JoinAlgorithm::SortMerge => true,
            JoinAlgorithm::IndexNestedLoop | JoinAlgorithm::NestedLoop => left.ordered,
            JoinAlgorithm::HashJoin => false,
        };
        Ok(AccessPath::new(AccessStrategy::Join { algorithm }, rows, cost).ordered(ordered))
    }

    fn join_algorithm(&self, node: &PlanNode, pairs: &[(String, String)], left: &AccessPath, right: &AccessPath) -> JoinAlgorithm {
        if pairs.is_empty() {
            return JoinAlgorithm::NestedLoop;
        }
        let on_join_column = |column: &str| pairs.iter().any(|(a, b)| a == column || b == column);

        if let Some(NodeKind::TableSpecifier { table }) = node.child(1).map(PlanNode::kind) {
            let indexed = self.catalog.table(table).is_some_and(|metadata| {
                metadata.indexes.iter().filter_map(|index| index.leading_column()).any(on_join_column)
            });
            if indexed {
                return JoinAlgorithm::IndexNestedLoop;
            }
        }

        let left_order = self.ordering_column(&left.strategy);
        let right_order = self.ordering_column(&right.strategy);
        match (left_order, right_order) {
            (Some(l), Some(r)) if on_join_column(&l) && on_join_column(&r) => JoinAlgorithm::SortMerge,
            _ => JoinAlgorithm::HashJoin,
        }
    }

    /// The column a strategy's output is sorted on, when it is known.
    fn ordering_column(&self, strategy: &AccessStrategy) -> Option<String> {
        match strategy {
            AccessStrategy::OrderedIndexScan { table, index } => {
                let metadata = self.catalog.table(table)?;
                let index = metadata.indexes.iter().find(|i| &i.name == index)?;
                index.leading_column().map(str::to_string)
            }
            AccessStrategy::Filter { source } | AccessStrategy::Derived { source } => self.ordering_column(source),
            _ => None,
        }
    }

    fn set_operation_path(&mut self, node: &PlanNode, rows: u64, deduplicate: bool) -> Result<AccessPath, PlanError> {
        let mut cost = self.cost(OperationCost::SetOperation { rows, deduplicate });
        for i in 0..node.children().len() {
            cost = cost.add(&child_path(node, i)?.estimated_cost);
        }
        Ok(AccessPath::new(AccessStrategy::SetOperation { deduplicate }, rows, cost))
    }

    fn device_path(&self, node: &PlanNode, device: &str) -> AccessPath {
        let default = self.config.default_row_count;
        let rows = source_tables(self.catalog, node).iter().map(|t| t.row_count.unwrap_or(default)).max().unwrap_or(default);
        AccessPath::new(AccessStrategy::Device { device: device.to_string() }, rows, CostEstimate::zero())
    }
}

fn child_path(node: &PlanNode, index: usize) -> Result<&AccessPath, PlanError> {
    node.child(index).and_then(PlanNode::access_path).ok_or_else(|| {
        PlanError::MalformedTree(format!("{} child {} has no access path", node.kind().name(), index))
    })
}

/// `a = b` terms of a join condition where both sides are columns.
fn equi_join_columns(condition: &PlanNode) -> Vec<(String, String)> {
    conjuncts(condition.clone())
        .iter()
        .filter_map(|term| match (term.kind(), term.children()) {
            (NodeKind::BinaryOp(BinaryOperator::Equal), [left, right]) => match (left.kind(), right.kind()) {
                (NodeKind::ColumnReference { column: a, .. }, NodeKind::ColumnReference { column: b, .. }) => Some((a.clone(), b.clone())),
                _ => None,
            },
            _ => None,
        })
        .collect()
}

impl PlanVisitor for AccessPathDeterminer<'_> {
    fn pre_order(&mut self, node: &mut PlanNode) -> Result<(), PlanError> {
        node.validate_shape()?;
        if self.device_depth > 0 || (node.device_supported() && node.device().is_some()) {
            self.device_depth += 1;
        }
        Ok(())
    }

    fn post_order(&mut self, node: &mut PlanNode) -> Result<(), PlanError> {
        let path = if self.device_depth > 0 {
            self.device_depth -= 1;
            match node.device() {
                Some(assignment) if self.device_depth == 0 && node.is_relational() => {
                    self.stats.device_paths += 1;
                    Some(self.device_path(node, &assignment.device))
                }
                _ => None,
            }
        } else if node.is_scalar() {
            None
        } else {
            let path = self.choose(node)?;
            trace!(node = node.kind().name(), strategy = %path.strategy, rows = path.estimated_rows, "Chose access path");
            Some(path)
        };

        self.stats.changed |= node.access_path() != path.as_ref();
        match path {
            Some(path) => {
                node.set_access_path(path);
                self.stats.paths_assigned += 1;
            }
            None => node.clear_access_path(),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{InMemoryCatalog, IndexMetadata, TableMetadata};
    use crate::plan::{DeviceAssignment, RowFetch};
    use crate::visitor::traverse;
    use dotplan_common::DataType;

    fn catalog() -> InMemoryCatalog {
        InMemoryCatalog::new()
            .with_table(
                TableMetadata::new("Employee")
                    .with_column("ID", DataType::Integer)
                    .with_column("Name", DataType::String)
                    .with_column("DeptID", DataType::Integer)
                    .with_index(IndexMetadata::new("PK_Employee", ["ID"]).unique().clustered())
                    .with_row_count(10_000),
            )
            .with_table(
                TableMetadata::new("Department")
                    .with_column("DeptID", DataType::Integer)
                    .with_column("Title", DataType::String)
                    .with_index(IndexMetadata::new("PK_Department", ["DeptID"]).unique().clustered())
                    .with_row_count(50),
            )
            .with_table(TableMetadata::new("Log").with_column("Message", DataType::String).with_row_count(200))
    }

    fn id(op: BinaryOperator, value: i64) -> PlanNode {
        PlanNode::binary(op, PlanNode::column("ID", DataType::Integer), PlanNode::literal(value))
    }

    fn plan_paths(plan: &mut PlanNode) -> AccessPathStats {
        let catalog = catalog();
        let config = CostConfig::default();
        let mut determiner = AccessPathDeterminer::new(&catalog, &config);
        traverse(plan, &mut determiner).unwrap();
        determiner.into_stats()
    }

    fn strategy(node: &PlanNode) -> &AccessStrategy {
        &node.access_path().unwrap().strategy
    }

    #[test]
    fn test_sargable_equality_seeks_index() {
        let mut plan = PlanNode::restrict_with_role(RestrictRole::Sargable, PlanNode::table("Employee"), id(BinaryOperator::Equal, 5));
        let stats = plan_paths(&mut plan);

        assert_eq!(
            strategy(&plan),
            &AccessStrategy::IndexSeek {
                table: "Employee".to_string(),
                index: "PK_Employee".to_string(),
                columns: vec!["ID".to_string()],
                fetch: RowFetch::Direct,
            }
        );
        assert_eq!(plan.access_path().unwrap().estimated_rows, 1);
        assert_eq!(stats.index_lookups, 1);
        assert!(plan.predicate().unwrap().access_path().is_none());
    }

    #[test]
    fn test_residual_restriction_filters() {
        let upper = PlanNode::call("Upper", DataType::String, vec![PlanNode::column("Name", DataType::String)]);
        let mut plan = PlanNode::restrict_with_role(
            RestrictRole::Residual,
            PlanNode::restrict_with_role(RestrictRole::Sargable, PlanNode::table("Employee"), id(BinaryOperator::Greater, 5)),
            PlanNode::eq(upper, PlanNode::literal("JOE")),
        );
        plan_paths(&mut plan);

        let inner = plan.source().unwrap();
        assert!(matches!(strategy(inner), AccessStrategy::IndexRange { range_column, .. } if range_column == "ID"));
        assert!(matches!(strategy(&plan), AccessStrategy::Filter { source } if source.is_index_lookup()));
        assert!(plan.access_path().unwrap().estimated_rows <= inner.access_path().unwrap().estimated_rows);
    }

    #[test]
    fn test_table_without_clustered_index_is_unordered() {
        let mut plan = PlanNode::table("Log");
        plan_paths(&mut plan);
        assert_eq!(strategy(&plan), &AccessStrategy::UnorderedScan { table: "Log".to_string() });
        assert!(!plan.access_path().unwrap().ordered);

        let mut clustered = PlanNode::table("Employee");
        plan_paths(&mut clustered);
        assert!(clustered.access_path().unwrap().ordered);
    }

    #[test]
    fn test_device_subtree_gets_single_device_path() {
        let mut plan = PlanNode::project(
            PlanNode::restrict_with_role(RestrictRole::Sargable, PlanNode::table("Employee"), id(BinaryOperator::Equal, 5)),
            ["Name"],
        );
        for node in plan.children_mut() {
            node.set_device(DeviceAssignment::new("store"));
            node.set_device_supported(true);
            for grandchild in node.children_mut() {
                grandchild.set_device_supported(true);
            }
        }
        let stats = plan_paths(&mut plan);

        let restrict = plan.source().unwrap();
        assert_eq!(strategy(restrict), &AccessStrategy::Device { device: "store".to_string() });
        assert!(restrict.source().unwrap().access_path().is_none());
        assert!(matches!(strategy(&plan), AccessStrategy::Derived { .. }));
        assert_eq!(stats.device_paths, 1);
        assert_eq!(stats.paths_assigned, 2);
    }

    #[test]
    fn test_join_into_indexed_table_uses_index_nested_loop() {
        let condition = PlanNode::eq(PlanNode::column("DeptID", DataType::Integer), PlanNode::column("DeptID", DataType::Integer));
        let mut plan = PlanNode::join(JoinType::Inner, PlanNode::table("Employee"), PlanNode::table("Department"), condition);
        plan_paths(&mut plan);
        assert_eq!(strategy(&plan), &AccessStrategy::Join { algorithm: JoinAlgorithm::IndexNestedLoop });
    }

    #[test]
    fn test_join_without_equality_is_nested_loop() {
        let condition = PlanNode::binary(
            BinaryOperator::Less,
            PlanNode::column("ID", DataType::Integer),
            PlanNode::column("DeptID", DataType::Integer),
        );
        let mut plan = PlanNode::join(JoinType::Inner, PlanNode::table("Employee"), PlanNode::table("Department"), condition);
        plan_paths(&mut plan);
        assert_eq!(strategy(&plan), &AccessStrategy::Join { algorithm: JoinAlgorithm::NestedLoop });
        assert_eq!(plan.access_path().unwrap().estimated_rows, 500_000);
    }

    #[test]
    fn test_join_on_unindexed_right_side_hashes() {
        let condition = PlanNode::eq(PlanNode::column("Name", DataType::String), PlanNode::column("Message", DataType::String));
        let mut plan = PlanNode::join(JoinType::LeftOuter, PlanNode::table("Employee"), PlanNode::table("Log"), condition);
        plan_paths(&mut plan);
        assert_eq!(strategy(&plan), &AccessStrategy::Join { algorithm: JoinAlgorithm::HashJoin });
        assert_eq!(plan.access_path().unwrap().estimated_rows, 10_000);
    }

    #[test]
    fn test_union_paths() {
        let mut plan = PlanNode::union(
            true,
            vec![
                PlanNode::restrict_with_role(RestrictRole::Sargable, PlanNode::table("Employee"), id(BinaryOperator::Equal, 1)),
                PlanNode::table("Log"),
            ],
        );
        plan_paths(&mut plan);
        assert_eq!(strategy(&plan), &AccessStrategy::SetOperation { deduplicate: true });
        assert_eq!(plan.access_path().unwrap().estimated_rows, 201);
    }

    #[test]
    fn test_rerun_is_stable() {
        let mut plan = PlanNode::restrict_with_role(RestrictRole::Sargable, PlanNode::table("Employee"), id(BinaryOperator::Equal, 5));
        plan_paths(&mut plan);
        let once = plan.clone();
        plan_paths(&mut plan);
        assert_eq!(plan, once);
    }

    #[test]
    fn test_changed_only_when_a_path_moves() {
        let mut plan = PlanNode::restrict_with_role(RestrictRole::Sargable, PlanNode::table("Employee"), id(BinaryOperator::Equal, 5));
        assert!(plan_paths(&mut plan).changed);
        assert!(!plan_paths(&mut plan).changed);

        plan.set_device(DeviceAssignment::new("store"));
        plan.set_device_supported(true);
        assert!(plan_paths(&mut plan).changed);
    }

    #[test]
    fn test_malformed_restrict_is_rejected() {
        let mut plan = PlanNode::new(NodeKind::Restrict { role: RestrictRole::Sargable }, vec![PlanNode::table("Employee")]);
        let catalog = catalog();
        let config = CostConfig::default();
        let result = traverse(&mut plan, &mut AccessPathDeterminer::new(&catalog, &config));
        assert!(matches!(result, Err(PlanError::InvalidArity { kind: "Restrict", found: 1, .. })));
        assert!(plan.iter().all(|n| n.access_path().is_none()));
    }
}
