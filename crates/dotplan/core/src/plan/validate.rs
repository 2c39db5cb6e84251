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

use super::node::{BinaryOperator, NodeKind, PlanNode, UnaryOperator};
use crate::error::PlanError;

enum Arity {
    Exact(usize),
    AtLeast(usize),
    Any,
}

impl Arity {
    fn accepts(&self, found: usize) -> bool {
        match self {
            Arity::Exact(n) => found == *n,
            Arity::AtLeast(n) => found >= *n,
            Arity::Any => true,
        }
    }

    fn describe(&self) -> String {
        match self {
            Arity::Exact(n) => n.to_string(),
            Arity::AtLeast(n) => format!("at least {n}"),
            Arity::Any => "any number of".to_string(),
        }
    }
}

#[derive(Clone, Copy)]
enum Operand {
    Relational,
    Scalar,
    Boolean,
}

impl PlanNode {
    /// Checks the shape of every node in the tree.
    ///
    /// Child counts, relational versus scalar operands, and Boolean
    /// predicates and logical operands are enforced. Types of non-logical
    /// scalar operands are the compiler's business and are not re-checked.
    pub fn validate(&self) -> Result<(), PlanError> {
        self.iter().try_for_each(PlanNode::validate_shape)
    }

    /// Checks this node only, assuming nothing about its children's subtrees.
    pub(crate) fn validate_shape(&self) -> Result<(), PlanError> {
        let kind = self.kind().name();
        let arity = arity_of(self.kind());
        let found = self.children().len();
        if !arity.accepts(found) {
            return Err(PlanError::InvalidArity { kind, expected: arity.describe(), found });
        }
        for (position, child) in self.children().iter().enumerate() {
            let expected = operand_of(self.kind(), position);
            match expected {
                Operand::Relational if !child.is_relational() => {
                    return Err(PlanError::UnexpectedOperand { kind, position, expected: "relational" });
                }
                Operand::Scalar | Operand::Boolean if child.is_relational() => {
                    return Err(PlanError::UnexpectedOperand { kind, position, expected: "scalar" });
                }
                Operand::Boolean if !child.is_boolean() => {
                    return Err(PlanError::NonBooleanPredicate { kind, found: child.type_label() });
                }
                _ => {}
            }
        }
        Ok(())
    }
}

fn arity_of(kind: &NodeKind) -> Arity {
    match kind {
        NodeKind::TableSpecifier { .. } | NodeKind::Literal(_) | NodeKind::ColumnReference { .. } => Arity::Exact(0),
        NodeKind::Project { .. } | NodeKind::UnaryOp(_) => Arity::Exact(1),
        NodeKind::Restrict { .. } | NodeKind::Intersect | NodeKind::Difference | NodeKind::BinaryOp(_) => Arity::Exact(2),
        NodeKind::Join { .. } => Arity::Exact(3),
        NodeKind::Union { .. } => Arity::AtLeast(2),
        NodeKind::FunctionCall { .. } => Arity::Any,
    }
}

fn operand_of(kind: &NodeKind, position: usize) -> Operand {
    match kind {
        NodeKind::Restrict { .. } if position == 0 => Operand::Relational,
        NodeKind::Restrict { .. } => Operand::Boolean,
        NodeKind::Join { .. } if position < 2 => Operand::Relational,
        NodeKind::Join { .. } => Operand::Boolean,
        NodeKind::Project { .. } | NodeKind::Union { .. } | NodeKind::Intersect | NodeKind::Difference => Operand::Relational,
        NodeKind::BinaryOp(BinaryOperator::And | BinaryOperator::Or) | NodeKind::UnaryOp(UnaryOperator::Not) => Operand::Boolean,
        _ => Operand::Scalar,
    }
}
