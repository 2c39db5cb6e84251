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
use tracing::trace;

use super::cost_model::{CostEstimate, CostModel, OperationCost};
use crate::catalog::{IndexMetadata, TableMetadata};
use crate::plan::{AccessStrategy, RowFetch};
use crate::predicate::SargableComparison;

#[derive(Debug, Clone, PartialEq)]
pub enum IndexUsageHint {
    FullScan,
    IndexSeek { index_name: String, columns: Vec<String> },
    IndexRange { index_name: String, columns: Vec<String>, range_column: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexRecommendation {
    pub usage_hint: IndexUsageHint,
    pub fetch: RowFetch,
    pub estimated_rows: u64,
    pub estimated_cost: CostEstimate,
    pub reasoning: String,
}

impl IndexRecommendation {
    pub fn uses_index(&self) -> bool {
        !matches!(self.usage_hint, IndexUsageHint::FullScan)
    }

    pub fn strategy(&self, table: &str) -> AccessStrategy {
        match &self.usage_hint {
            IndexUsageHint::FullScan => AccessStrategy::UnorderedScan { table: table.to_string() },
            IndexUsageHint::IndexSeek { index_name, columns } => AccessStrategy::IndexSeek {
                table: table.to_string(),
                index: index_name.clone(),
                columns: columns.clone(),
                fetch: self.fetch,
            },
            IndexUsageHint::IndexRange { index_name, columns, range_column } => AccessStrategy::IndexRange {
                table: table.to_string(),
                index: index_name.clone(),
                columns: columns.clone(),
                range_column: range_column.clone(),
                fetch: self.fetch,
            },
        }
    }
}

/// Picks the index that best answers a set of `column op literal` terms.
///
/// An index is usable when its leading columns are pinned by equality terms,
/// optionally followed by one column bounded by range terms. Usable indexes
/// always win over a full scan; among them the cheapest is chosen, and ties
/// go to the index declared first.
pub struct IndexSelector<'a> {
    cost_model: &'a CostModel,
    config: &'a CostConfig,
}

struct IndexCandidate<'i> {
    index: &'i IndexMetadata,
    seek_columns: Vec<String>,
    range_column: Option<String>,
    fetch: RowFetch,
    estimated_rows: u64,
    cost: CostEstimate,
}

impl<'a> IndexSelector<'a> {
    pub fn new(cost_model: &'a CostModel, config: &'a CostConfig) -> Self {
        Self { cost_model, config }
    }

    pub fn select_best_index(&self, table: &TableMetadata, comparisons: &[SargableComparison]) -> IndexRecommendation {
        let table_rows = table.row_count.unwrap_or(self.config.default_row_count);
        let usable: Vec<&SargableComparison> = comparisons.iter().filter(|c| c.is_index_usable()).collect();
        if usable.is_empty() {
            return self.full_scan(table_rows, "No index-usable predicates, full scan required");
        }

        let mut best: Option<IndexCandidate<'_>> = None;
        for index in &table.indexes {
            let Some(candidate) = self.evaluate_index(index, &usable, table_rows) else {
                continue;
            };
            trace!(index = %index.name, cost = candidate.cost.total_cost, rows = candidate.estimated_rows, "Evaluated index");
            if best.as_ref().is_none_or(|b| candidate.cost.total_cost < b.cost.total_cost) {
                best = Some(candidate);
            }
        }

        let Some(best) = best else {
            return self.full_scan(table_rows, "No suitable indexes found");
        };
        let reasoning = match &best.range_column {
            Some(range) => format!("Index {} bounds {} after {} equality columns", best.index.name, range, best.seek_columns.len()),
            None => format!("Index {} pins {} columns by equality", best.index.name, best.seek_columns.len()),
        };
        let usage_hint = match best.range_column {
            Some(range_column) => IndexUsageHint::IndexRange {
                index_name: best.index.name.clone(),
                columns: best.seek_columns,
                range_column,
            },
            None => IndexUsageHint::IndexSeek { index_name: best.index.name.clone(), columns: best.seek_columns },
        };
        IndexRecommendation {
            usage_hint,
            fetch: best.fetch,
            estimated_rows: best.estimated_rows,
            estimated_cost: best.cost,
            reasoning,
        }
    }

    fn full_scan(&self, table_rows: u64, reasoning: &str) -> IndexRecommendation {
        IndexRecommendation {
            usage_hint: IndexUsageHint::FullScan,
            fetch: RowFetch::Direct,
            estimated_rows: table_rows,
            estimated_cost: self.cost_model.estimate_operation_cost(&OperationCost::TableScan { rows: table_rows }),
            reasoning: reasoning.to_string(),
        }
    }

    fn evaluate_index<'i>(
        &self,
        index: &'i IndexMetadata,
        comparisons: &[&SargableComparison],
        table_rows: u64,
    ) -> Option<IndexCandidate<'i>> {
        let mut seek_columns = Vec::new();
        let mut range_column = None;
        let mut selectivity = 1.0;

        for column in &index.columns {
            let on_column = || comparisons.iter().filter(|c| &c.column == column);
            if on_column().any(|c| c.is_equality()) {
                seek_columns.push(column.clone());
                selectivity *= self.config.equality_selectivity;
                continue;
            }
            let bounds = on_column().filter(|c| c.is_range()).count();
            if bounds > 0 {
                // A second bound on the same column narrows the range again, further bounds add nothing.
                selectivity *= self.config.range_selectivity.powi(bounds.min(2) as i32);
                range_column = Some(column.clone());
            }
            break;
        }

        if seek_columns.is_empty() && range_column.is_none() {
            return None;
        }

        let fully_pinned = range_column.is_none() && seek_columns.len() == index.columns.len();
        let estimated_rows = if index.unique && fully_pinned {
            1
        } else {
            ((table_rows as f64 * selectivity).ceil() as u64).max(1)
        };
        let fetch = if index.clustered { RowFetch::Direct } else { RowFetch::Bookmark };
        let cost = self.cost_model.estimate_operation_cost(&OperationCost::IndexScan { matched_rows: estimated_rows, fetch });
        Some(IndexCandidate { index, seek_columns, range_column, fetch, estimated_rows, cost })
    }
}
