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

use thiserror::Error;

use crate::device::DeviceError;

/// Hard failures of plan preparation.
///
/// Anything that can be planned less efficiently is not an error; these
/// variants all describe a tree the compiler should never have produced.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlanError {
    #[error("{kind} expects {expected} children, found {found}")]
    InvalidArity { kind: &'static str, expected: String, found: usize },
    #[error("{kind} requires a Boolean predicate, found {found}")]
    NonBooleanPredicate { kind: &'static str, found: String },
    #[error("{kind} expects a {expected} operand at position {position}")]
    UnexpectedOperand { kind: &'static str, position: usize, expected: &'static str },
    #[error("Expected a restriction, found {0}")]
    NotARestriction(&'static str),
    #[error("Malformed plan tree: {0}")]
    MalformedTree(String),
    #[error("Device reported a malformed tree: {0}")]
    Device(#[from] DeviceError),
}
