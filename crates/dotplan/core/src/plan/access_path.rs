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

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::access::CostEstimate;

/// How rows are fetched once an index has located them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RowFetch {
    /// The index is the table's storage order, rows come straight out of it.
    Direct,
    /// The index holds row locators and each hit costs a lookup into the table.
    Bookmark,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JoinAlgorithm {
    NestedLoop,
    HashJoin,
    SortMerge,
    IndexNestedLoop,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AccessStrategy {
    UnorderedScan { table: String },
    OrderedIndexScan { table: String, index: String },
    IndexSeek { table: String, index: String, columns: Vec<String>, fetch: RowFetch },
    IndexRange { table: String, index: String, columns: Vec<String>, range_column: String, fetch: RowFetch },
    Filter { source: Box<AccessStrategy> },
    Derived { source: Box<AccessStrategy> },
    Join { algorithm: JoinAlgorithm },
    SetOperation { deduplicate: bool },
    Device { device: String },
}

impl AccessStrategy {
    pub fn index(&self) -> Option<&str> {
        match self {
            AccessStrategy::OrderedIndexScan { index, .. }
            | AccessStrategy::IndexSeek { index, .. }
            | AccessStrategy::IndexRange { index, .. } => Some(index),
            _ => None,
        }
    }

    pub fn is_index_lookup(&self) -> bool {
        matches!(self, AccessStrategy::IndexSeek { .. } | AccessStrategy::IndexRange { .. })
    }
}

impl fmt::Display for AccessStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessStrategy::UnorderedScan { table } => write!(f, "UnorderedScan {table}"),
            AccessStrategy::OrderedIndexScan { table, index } => write!(f, "OrderedIndexScan {table}.{index}"),
            AccessStrategy::IndexSeek { table, index, columns, fetch } => {
                write!(f, "IndexSeek {table}.{index}({}) {fetch:?}", columns.join(", "))
            }
            AccessStrategy::IndexRange { table, index, columns, range_column, fetch } => {
                if columns.is_empty() {
                    write!(f, "IndexRange {table}.{index}[{range_column}] {fetch:?}")
                } else {
                    write!(f, "IndexRange {table}.{index}({})[{range_column}] {fetch:?}", columns.join(", "))
                }
            }
            AccessStrategy::Filter { source } => write!(f, "Filter over {source}"),
            AccessStrategy::Derived { source } => write!(f, "Derived over {source}"),
            AccessStrategy::Join { algorithm } => write!(f, "{algorithm:?}"),
            AccessStrategy::SetOperation { deduplicate: true } => write!(f, "SetOperation distinct"),
            AccessStrategy::SetOperation { deduplicate: false } => write!(f, "SetOperation all"),
            AccessStrategy::Device { device } => write!(f, "Device {device}"),
        }
    }
}

/// The physical strategy chosen for one relational node, with the estimates
/// that justified it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessPath {
    pub strategy: AccessStrategy,
    pub ordered: bool,
    pub estimated_rows: u64,
    pub estimated_cost: CostEstimate,
}

impl AccessPath {
    pub fn new(strategy: AccessStrategy, estimated_rows: u64, estimated_cost: CostEstimate) -> Self {
        Self { strategy, ordered: false, estimated_rows, estimated_cost }
    }

    pub fn ordered(mut self, ordered: bool) -> Self {
        self.ordered = ordered;
        self
    }
}
