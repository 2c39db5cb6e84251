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
use serde::{Deserialize, Serialize};

use crate::plan::{JoinAlgorithm, RowFetch};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CostEstimate {
    pub cpu_cost: f64,
    pub io_cost: f64,
    pub memory_cost: f64,
    pub total_cost: f64,
}

impl CostEstimate {
    pub fn new(cpu: f64, io: f64, memory: f64) -> Self {
        Self { cpu_cost: cpu, io_cost: io, memory_cost: memory, total_cost: cpu + io + memory }
    }

    pub fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    pub fn add(&self, other: &CostEstimate) -> CostEstimate {
        CostEstimate::new(self.cpu_cost + other.cpu_cost, self.io_cost + other.io_cost, self.memory_cost + other.memory_cost)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OperationCost {
    TableScan { rows: u64 },
    IndexScan { matched_rows: u64, fetch: RowFetch },
    Filter { rows: u64 },
    Derive { rows: u64 },
    Join { left_rows: u64, right_rows: u64, algorithm: JoinAlgorithm },
    SetOperation { rows: u64, deduplicate: bool },
}

pub struct CostModel {
    cpu_cost_per_row: f64,
    io_cost_per_page: f64,
    rows_per_page: u64,
    memory_cost_per_mb: f64,
    sort_factor: f64,
    join_factor: f64,
}

impl CostModel {
    pub fn new(config: &CostConfig) -> Self {
        Self {
            cpu_cost_per_row: config.cpu_cost_per_row,
            io_cost_per_page: config.io_cost_per_page,
            rows_per_page: config.rows_per_page.max(1),
            memory_cost_per_mb: 0.1,
            sort_factor: 1.5,
            join_factor: 2.0,
        }
    }

    fn pages(&self, rows: u64) -> f64 {
        rows.div_ceil(self.rows_per_page).max(1) as f64
    }

    fn memory(&self, rows: u64, bytes_per_row: f64) -> f64 {
        (rows as f64 * bytes_per_row) / (1024.0 * 1024.0) * self.memory_cost_per_mb
    }

    pub fn estimate_operation_cost(&self, operation: &OperationCost) -> CostEstimate {
        match operation {
            OperationCost::TableScan { rows } => {
                let io_cost = self.pages(*rows) * self.io_cost_per_page;
                let cpu_cost = *rows as f64 * self.cpu_cost_per_row;
                CostEstimate::new(cpu_cost, io_cost, 0.0)
            }
            OperationCost::IndexScan { matched_rows, fetch } => {
                // One page for the descent plus the leaf pages holding the matches.
                let mut io_cost = (1.0 + self.pages(*matched_rows)) * self.io_cost_per_page;
                if *fetch == RowFetch::Bookmark {
                    io_cost += *matched_rows as f64 * self.io_cost_per_page;
                }
                let cpu_cost = *matched_rows as f64 * self.cpu_cost_per_row * 0.5; // Index scan is more efficient
                CostEstimate::new(cpu_cost, io_cost, 0.0)
            }
            OperationCost::Filter { rows } => CostEstimate::new(*rows as f64 * self.cpu_cost_per_row, 0.0, 0.0),
            OperationCost::Derive { rows } => CostEstimate::new(*rows as f64 * self.cpu_cost_per_row * 0.1, 0.0, 0.0),
            OperationCost::Join { left_rows, right_rows, algorithm } => {
                let (left, right) = (*left_rows as f64, *right_rows as f64);
                let (cpu_cost, memory_cost) = match algorithm {
                    JoinAlgorithm::NestedLoop => (left * right * self.cpu_cost_per_row, 0.0),
                    JoinAlgorithm::HashJoin => {
                        ((left + right) * self.cpu_cost_per_row * self.join_factor, self.memory(*right_rows, 64.0))
                    }
                    JoinAlgorithm::SortMerge => ((left + right) * self.cpu_cost_per_row, 0.0),
                    JoinAlgorithm::IndexNestedLoop => (left * (right.max(1.0).log2() + 1.0) * self.cpu_cost_per_row, 0.0),
                };
                CostEstimate::new(cpu_cost, 0.0, memory_cost)
            }
            OperationCost::SetOperation { rows, deduplicate } => {
                if *deduplicate {
                    let rows_f = *rows as f64;
                    let cpu_cost = rows_f.max(2.0).log2() * rows_f * self.cpu_cost_per_row * self.sort_factor;
                    CostEstimate::new(cpu_cost, 0.0, self.memory(*rows, 8.0))
                } else {
                    CostEstimate::new(*rows as f64 * self.cpu_cost_per_row, 0.0, 0.0)
                }
            }
        }
    }
}

impl Default for CostModel {
    fn default() -> Self {
        Self::new(&CostConfig::default())
    }
}
