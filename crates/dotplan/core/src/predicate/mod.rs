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

//! # Predicate Algebra
//!
//! Boolean rewrites used by restriction normalization. Everything here works
//! on the And/Or/Not spine of a predicate and treats any other scalar subtree
//! as an opaque term.
//!
//! All rewrites preserve meaning under three-valued logic: a comparison with
//! nil is unknown both before and after the rewrite.

pub mod dnf;
pub mod sargable;

pub use dnf::{Dnf, disjuncts_are_disjoint, estimate_disjuncts, to_dnf};
pub use sargable::{Partition, SargableComparison, partition_terms};

use dotplan_common::Value;

use crate::plan::{BinaryOperator, NodeKind, PlanNode, UnaryOperator};

/// Flattens nested `And`s into their terms, left to right.
pub fn conjuncts(predicate: PlanNode) -> Vec<PlanNode> {
    let mut terms = Vec::new();
    flatten(predicate, BinaryOperator::And, &mut terms);
    terms
}

/// Flattens nested `Or`s into their terms, left to right.
pub fn disjuncts(predicate: PlanNode) -> Vec<PlanNode> {
    let mut terms = Vec::new();
    flatten(predicate, BinaryOperator::Or, &mut terms);
    terms
}

fn flatten(node: PlanNode, op: BinaryOperator, out: &mut Vec<PlanNode>) {
    if *node.kind() == NodeKind::BinaryOp(op) && node.children().len() == 2 {
        for child in node.into_children() {
            flatten(child, op, out);
        }
    } else {
        out.push(node);
    }
}

/// Left-deep `And` of the terms; `None` for an empty list.
pub fn conjoin(terms: Vec<PlanNode>) -> Option<PlanNode> {
    terms.into_iter().reduce(PlanNode::and)
}

/// Left-deep `Or` of the terms; `None` for an empty list.
pub fn disjoin(terms: Vec<PlanNode>) -> Option<PlanNode> {
    terms.into_iter().reduce(PlanNode::or)
}

/// Whether an `Or` appears on the Boolean spine. Disjunctions buried inside
/// function arguments or comparisons do not count.
pub fn contains_or(predicate: &PlanNode) -> bool {
    match predicate.kind() {
        NodeKind::BinaryOp(BinaryOperator::Or) => true,
        NodeKind::BinaryOp(BinaryOperator::And) | NodeKind::UnaryOp(UnaryOperator::Not) => {
            predicate.children().iter().any(contains_or)
        }
        _ => false,
    }
}

enum Spine {
    Not,
    Logical(BinaryOperator),
    Comparison(BinaryOperator),
    Constant(bool),
    Term,
}

fn spine(node: &PlanNode) -> Spine {
    match node.kind() {
        NodeKind::UnaryOp(UnaryOperator::Not) => Spine::Not,
        NodeKind::BinaryOp(op) if op.is_logical() => Spine::Logical(*op),
        NodeKind::BinaryOp(op) if op.is_comparison() => Spine::Comparison(*op),
        NodeKind::Literal(Value::Boolean(value)) => Spine::Constant(*value),
        _ => Spine::Term,
    }
}

/// Negation normal form: pushes every `Not` down to the terms using
/// De Morgan's laws, cancels double negation and complements comparisons.
pub fn push_negations(predicate: PlanNode) -> PlanNode {
    match spine(&predicate) {
        Spine::Not => match predicate.into_operand() {
            Ok(operand) => negate(operand),
            Err(node) => node,
        },
        Spine::Logical(op) => match predicate.into_operands() {
            Ok((left, right)) => PlanNode::binary(op, push_negations(left), push_negations(right)),
            Err(node) => node,
        },
        _ => predicate,
    }
}

fn negate(node: PlanNode) -> PlanNode {
    match spine(&node) {
        Spine::Not => match node.into_operand() {
            Ok(operand) => push_negations(operand),
            Err(node) => PlanNode::not(node),
        },
        Spine::Logical(op) => {
            let dual = if op == BinaryOperator::And { BinaryOperator::Or } else { BinaryOperator::And };
            match node.into_operands() {
                Ok((left, right)) => PlanNode::binary(dual, negate(left), negate(right)),
                Err(node) => PlanNode::not(node),
            }
        }
        Spine::Comparison(op) => match (op.negate(), node.into_operands()) {
            (Some(complement), Ok((left, right))) => PlanNode::binary(complement, left, right),
            (Some(_), Err(node)) => PlanNode::not(node),
            (None, Ok((left, right))) => PlanNode::not(PlanNode::binary(op, left, right)),
            (None, Err(node)) => PlanNode::not(node),
        },
        Spine::Constant(value) => PlanNode::literal(!value),
        Spine::Term => PlanNode::not(node),
    }
}
