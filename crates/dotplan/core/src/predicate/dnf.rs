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

use super::sargable::SargableComparison;
use crate::plan::{BinaryOperator, NodeKind, PlanNode};

/// Outcome of expanding a predicate into disjunctive normal form.
#[derive(Debug, Clone, PartialEq)]
pub enum Dnf {
    /// One entry per disjunct, each a list of terms to be conjoined.
    Disjuncts(Vec<Vec<PlanNode>>),
    /// The expansion would exceed the configured bound.
    TooComplex { estimated: usize },
}

/// Number of disjuncts the expansion of `predicate` produces, before any
/// deduplication. Saturates instead of overflowing.
pub fn estimate_disjuncts(predicate: &PlanNode) -> usize {
    match (predicate.kind(), predicate.children()) {
        (NodeKind::BinaryOp(BinaryOperator::Or), [left, right]) => {
            estimate_disjuncts(left).saturating_add(estimate_disjuncts(right))
        }
        (NodeKind::BinaryOp(BinaryOperator::And), [left, right]) => {
            estimate_disjuncts(left).saturating_mul(estimate_disjuncts(right))
        }
        _ => 1,
    }
}

/// Expands a predicate in negation normal form into a disjunction of
/// conjunctions.
///
/// The size is checked before anything is built, so a predicate over the
/// bound costs one walk of its spine. Repeated terms inside a disjunct and
/// repeated disjuncts are dropped.
pub fn to_dnf(predicate: &PlanNode, max_disjuncts: usize) -> Dnf {
    let estimated = estimate_disjuncts(predicate);
    if estimated > max_disjuncts {
        return Dnf::TooComplex { estimated };
    }

    let mut result: Vec<Vec<PlanNode>> = Vec::with_capacity(estimated);
    for disjunct in expand(predicate) {
        let disjunct = dedup_terms(disjunct);
        if !result.iter().any(|seen| same_terms(seen, &disjunct)) {
            result.push(disjunct);
        }
    }
    Dnf::Disjuncts(result)
}

fn expand(node: &PlanNode) -> Vec<Vec<PlanNode>> {
    let (op, left, right) = match (node.kind(), node.children()) {
        (NodeKind::BinaryOp(op @ (BinaryOperator::And | BinaryOperator::Or)), [left, right]) => (*op, left, right),
        _ => return vec![vec![node.clone()]],
    };

    let mut left = expand(left);
    let right = expand(right);
    if op == BinaryOperator::Or {
        left.extend(right);
        return left;
    }

    let mut product = Vec::with_capacity(left.len() * right.len());
    for l in &left {
        for r in &right {
            let mut terms = Vec::with_capacity(l.len() + r.len());
            terms.extend(l.iter().cloned());
            terms.extend(r.iter().cloned());
            product.push(terms);
        }
    }
    product
}

fn dedup_terms(terms: Vec<PlanNode>) -> Vec<PlanNode> {
    let mut unique: Vec<PlanNode> = Vec::with_capacity(terms.len());
    for term in terms {
        if !unique.iter().any(|u| u.same_expression(&term)) {
            unique.push(term);
        }
    }
    unique
}

fn same_terms(a: &[PlanNode], b: &[PlanNode]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.same_expression(y))
}

/// True when no row can satisfy two different disjuncts.
///
/// Only the obvious case is recognized: both disjuncts pin the same column to
/// different values by equality. Anything else is assumed to overlap.
pub fn disjuncts_are_disjoint(disjuncts: &[Vec<PlanNode>]) -> bool {
    let pins: Vec<Vec<SargableComparison>> = disjuncts
        .iter()
        .map(|terms| terms.iter().filter_map(SargableComparison::classify).filter(|c| c.is_equality()).collect())
        .collect();

    pins.iter().enumerate().all(|(i, left)| {
        pins[i + 1..]
            .iter()
            .all(|right| left.iter().any(|l| right.iter().any(|r| l.column == r.column && l.value != r.value)))
    })
}
