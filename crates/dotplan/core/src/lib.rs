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

//! # DotPlan Core
//!
//! Plan preparation for compiled relational queries. The compiler hands over
//! a tree of relational and scalar operators; this crate annotates it for
//! execution without changing what it computes.
//!
//! ## Passes
//!
//! - **Restriction normalization**: predicates are put in negation normal
//!   form, disjunctions become unions, and conjunctions are split into a
//!   sargable part and a residual part.
//! - **Device determination**: subtrees that an external device can evaluate
//!   entirely are marked, topmost node only.
//! - **Access path determination**: the remaining relational nodes get a
//!   physical strategy, with index lookups chosen by a cost model.
//!
//! [`Planner`] runs the passes in that order. Each one is also usable on its
//! own through the [`visitor`] framework.

pub mod access;
pub mod catalog;
pub mod device;
pub mod error;
pub mod passes;
pub mod pipeline;
pub mod plan;
pub mod predicate;
pub mod visitor;

pub use catalog::{Catalog, InMemoryCatalog, IndexMetadata, TableMetadata};
pub use device::{Device, DeviceError, DeviceRegistry, DeviceSupport, SqlDevice};
pub use error::PlanError;
pub use pipeline::{PassMetrics, PlanReport, Planner};
pub use plan::{AccessPath, AccessStrategy, DeviceAssignment, NodeKind, PlanNode, RestrictRole};
pub use visitor::{PlanVisitor, traverse};

pub use dotplan_common::{DataType, PlannerConfig, Value};
