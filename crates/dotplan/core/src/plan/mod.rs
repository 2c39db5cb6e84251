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

//! # Plan Trees
//!
//! The compiled form of a query: a tree of relational operators whose
//! predicates and expressions are themselves scalar subtrees.
//!
//! ## Layout
//!
//! - `Restrict`: `[source, predicate]`
//! - `Project`: `[source]`
//! - `Join`: `[left, right, condition]`
//! - `Union`: two or more branches
//! - `Intersect` / `Difference`: `[left, right]`
//! - scalar operators: their operands in order
//!
//! ## Annotations
//!
//! Nodes carry three fields that the planning passes fill in: the device
//! assignment, whether the assigned device supports the whole subtree, and the
//! chosen access path. None of them change what the tree computes.

pub mod access_path;
mod explain;
pub mod node;
mod validate;

pub use access_path::{AccessPath, AccessStrategy, JoinAlgorithm, RowFetch};
pub use node::{BinaryOperator, DeviceAssignment, JoinType, NodeKind, PlanNode, PreOrder, RestrictRole, UnaryOperator};
