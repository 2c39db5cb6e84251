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
use std::sync::Arc;
use tracing::{debug, warn};

use super::device::DeviceDeterminer;
use crate::catalog::{Catalog, TableMetadata, source_tables};
use crate::device::DeviceRegistry;
use crate::error::PlanError;
use crate::plan::{PlanNode, RestrictRole};
use crate::predicate::{
    Dnf, Partition, SargableComparison, conjoin, conjuncts, contains_or, disjuncts_are_disjoint, partition_terms,
    push_negations, to_dnf,
};
use crate::visitor::PlanVisitor;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NormalizationStats {
    pub restrictions_visited: usize,
    pub restrictions_rewritten: usize,
    pub residual_splits: usize,
    pub unions_introduced: usize,
    pub dnf_fallbacks: usize,
    /// Set once any restriction loses its `Unnormalized` role.
    pub changed: bool,
}

/// Pre-order pass that rewrites compiler-emitted restrictions into a form the
/// later passes can exploit.
///
/// Each `Unnormalized` restriction has its predicate put in negation normal
/// form. Disjunctions are expanded into a union with one branch per disjunct,
/// and every conjunction is split into a `Sargable` restriction holding the
/// terms an index or device can answer, topped by a `Residual` restriction
/// holding the rest.
pub struct RestrictionNormalizer<'a> {
    catalog: &'a dyn Catalog,
    devices: &'a DeviceRegistry,
    max_disjuncts: usize,
    stats: NormalizationStats,
}

enum Rewrite {
    Whole(PlanNode),
    Branches { partitions: Vec<Partition>, distinct: bool },
}

impl<'a> RestrictionNormalizer<'a> {
    pub fn new(catalog: &'a dyn Catalog, devices: &'a DeviceRegistry, max_disjuncts: usize) -> Self {
        Self { catalog, devices, max_disjuncts, stats: NormalizationStats::default() }
    }

    pub fn stats(&self) -> &NormalizationStats {
        &self.stats
    }

    pub fn into_stats(self) -> NormalizationStats {
        self.stats
    }

    fn plan_rewrite(&mut self, restrict: &PlanNode) -> Result<Rewrite, PlanError> {
        let (Some(source), Some(predicate)) = (restrict.source(), restrict.predicate()) else {
            return Err(PlanError::MalformedTree("Restrict without source or predicate".to_string()));
        };
        let predicate = push_negations(predicate.clone());

        let disjuncts = if contains_or(&predicate) {
            match to_dnf(&predicate, self.max_disjuncts) {
                Dnf::Disjuncts(disjuncts) => disjuncts,
                Dnf::TooComplex { estimated } => {
                    warn!(estimated, max = self.max_disjuncts, "Restriction too complex to expand, keeping it residual");
                    self.stats.dnf_fallbacks += 1;
                    return Ok(Rewrite::Whole(predicate));
                }
            }
        } else {
            vec![conjuncts(predicate)]
        };

        let distinct = disjuncts.len() > 1 && !disjuncts_are_disjoint(&disjuncts);
        let tables = source_tables(self.catalog, source);
        let source_devices = DeviceDeterminer::support_set(self.devices, source)?;
        let partitions = disjuncts
            .into_iter()
            .map(|terms| partition_terms(terms, |term| self.is_sargable(term, &tables, &source_devices)))
            .collect::<Result<Vec<_>, _>>()?;
        debug!(branches = partitions.len(), distinct, "Planned restriction rewrite");
        Ok(Rewrite::Branches { partitions, distinct })
    }

    /// A term is sargable when an index of a source table can answer it, or
    /// when a device able to evaluate the source can also evaluate the term.
    fn is_sargable(&self, term: &PlanNode, tables: &[Arc<TableMetadata>], source_devices: &[usize]) -> Result<bool, PlanError> {
        if let Some(comparison) = SargableComparison::classify(term) {
            if comparison.is_index_usable() && tables.iter().any(|t| t.is_indexed(&comparison.column)) {
                return Ok(true);
            }
        }
        if source_devices.is_empty() {
            return Ok(false);
        }
        let term_devices = DeviceDeterminer::support_set(self.devices, term)?;
        Ok(term_devices.iter().any(|d| source_devices.contains(d)))
    }

    fn apply(&mut self, restrict: PlanNode, rewrite: Rewrite) -> PlanNode {
        let (source, original) = match restrict.into_operands() {
            Ok(operands) => operands,
            Err(node) => return node,
        };

        match rewrite {
            Rewrite::Whole(predicate) => {
                self.stats.restrictions_rewritten += 1;
                PlanNode::restrict_with_role(RestrictRole::Residual, source, predicate)
            }
            Rewrite::Branches { mut partitions, distinct } => {
                if partitions.len() == 1 {
                    let partition = partitions.pop().unwrap_or_default();
                    let branch = self.build_branch(source, partition);
                    let unchanged = branch.restrict_role() == Some(RestrictRole::Sargable)
                        && branch.predicate().is_some_and(|p| p.same_expression(&original));
                    if !unchanged {
                        self.stats.restrictions_rewritten += 1;
                    }
                    return branch;
                }

                self.stats.restrictions_rewritten += 1;
                self.stats.unions_introduced += 1;
                let count = partitions.len();
                let sources = std::iter::repeat_n(source.clone(), count - 1).chain(std::iter::once(source));
                let branches = sources.zip(partitions).map(|(source, partition)| self.build_branch(source, partition)).collect();
                PlanNode::union(distinct, branches)
            }
        }
    }

    fn build_branch(&mut self, source: PlanNode, partition: Partition) -> PlanNode {
        if partition.is_mixed() {
            self.stats.residual_splits += 1;
        }
        let Partition { sargable, residual } = partition;
        match (conjoin(sargable), conjoin(residual)) {
            (Some(sargable), None) => PlanNode::restrict_with_role(RestrictRole::Sargable, source, sargable),
            (Some(sargable), Some(residual)) => PlanNode::restrict_with_role(
                RestrictRole::Residual,
                PlanNode::restrict_with_role(RestrictRole::Sargable, source, sargable),
                residual,
            ),
            (None, Some(residual)) => PlanNode::restrict_with_role(RestrictRole::Residual, source, residual),
            (None, None) => PlanNode::restrict_with_role(RestrictRole::Residual, source, PlanNode::literal(true)),
        }
    }
}

impl PlanVisitor for RestrictionNormalizer<'_> {
    fn pre_order(&mut self, node: &mut PlanNode) -> Result<(), PlanError> {
        node.validate_shape()?;
        if node.restrict_role() != Some(RestrictRole::Unnormalized) {
            return Ok(());
        }
        self.stats.restrictions_visited += 1;
        self.stats.changed = true;

        let rewrite = self.plan_rewrite(node)?;
        let restrict = std::mem::replace(node, PlanNode::literal(true));
        *node = self.apply(restrict, rewrite);
        Ok(())
    }
}
