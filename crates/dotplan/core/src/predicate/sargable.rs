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

use dotplan_common::Value;

use crate::error::PlanError;
use crate::plan::{BinaryOperator, NodeKind, PlanNode};

/// A `column op literal` comparison, normalized so the column is on the left.
#[derive(Debug, Clone, PartialEq)]
pub struct SargableComparison {
    pub column: String,
    pub op: BinaryOperator,
    pub value: Value,
}

impl SargableComparison {
    /// Recognizes `column op literal` and `literal op column`. Nil literals
    /// and literals whose type differs from the column's are not recognized.
    pub fn classify(term: &PlanNode) -> Option<Self> {
        let op = match term.kind() {
            NodeKind::BinaryOp(op) if op.is_comparison() => *op,
            _ => return None,
        };
        let (column, data_type, value, op) = match term.children() {
            [column, literal] => match (column.kind(), literal.kind()) {
                (NodeKind::ColumnReference { column, data_type }, NodeKind::Literal(value)) => (column, data_type, value, op),
                (NodeKind::Literal(value), NodeKind::ColumnReference { column, data_type }) => {
                    (column, data_type, value, op.flip()?)
                }
                _ => return None,
            },
            _ => return None,
        };
        if value.data_type() != Some(*data_type) {
            return None;
        }
        Some(Self { column: column.clone(), op, value: value.clone() })
    }

    pub fn is_equality(&self) -> bool {
        self.op == BinaryOperator::Equal
    }

    pub fn is_range(&self) -> bool {
        matches!(
            self.op,
            BinaryOperator::Less | BinaryOperator::LessEqual | BinaryOperator::Greater | BinaryOperator::GreaterEqual
        )
    }

    /// Whether an ordered index on the column can answer this comparison.
    pub fn is_index_usable(&self) -> bool {
        self.is_equality() || self.is_range()
    }
}

/// Conjunction terms split by whether they can be answered by an access
/// path or a device. Both lists keep the original term order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Partition {
    pub sargable: Vec<PlanNode>,
    pub residual: Vec<PlanNode>,
}

impl Partition {
    pub fn is_mixed(&self) -> bool {
        !self.sargable.is_empty() && !self.residual.is_empty()
    }
}

pub fn partition_terms<F>(terms: Vec<PlanNode>, mut is_sargable: F) -> Result<Partition, PlanError>
where
    F: FnMut(&PlanNode) -> Result<bool, PlanError>,
{
    let mut partition = Partition::default();
    for term in terms {
        if is_sargable(&term)? {
            partition.sargable.push(term);
        } else {
            partition.residual.push(term);
        }
    }
    Ok(partition)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dotplan_common::DataType;

    fn id() -> PlanNode {
        PlanNode::column("ID", DataType::Integer)
    }

    #[test]
    fn test_classify_column_on_left() {
        let term = PlanNode::binary(BinaryOperator::Greater, id(), PlanNode::literal(5));
        let comparison = SargableComparison::classify(&term).unwrap();
        assert_eq!(comparison.column, "ID");
        assert_eq!(comparison.op, BinaryOperator::Greater);
        assert_eq!(comparison.value, Value::Integer(5));
        assert!(comparison.is_range());
    }

    #[test]
    fn test_classify_flips_literal_on_left() {
        let term = PlanNode::binary(BinaryOperator::Less, PlanNode::literal(5), id());
        let comparison = SargableComparison::classify(&term).unwrap();
        assert_eq!(comparison.op, BinaryOperator::Greater);
    }

    #[test]
    fn test_classify_rejects_non_comparisons() {
        let upper = PlanNode::call("Upper", DataType::String, vec![PlanNode::column("Name", DataType::String)]);
        assert!(SargableComparison::classify(&PlanNode::eq(upper, PlanNode::literal("JOE"))).is_none());
        assert!(SargableComparison::classify(&PlanNode::eq(id(), PlanNode::null())).is_none());
        assert!(SargableComparison::classify(&PlanNode::eq(id(), PlanNode::literal("5"))).is_none());
        assert!(SargableComparison::classify(&PlanNode::eq(id(), id())).is_none());
    }

    #[test]
    fn test_not_equal_is_not_index_usable() {
        let term = PlanNode::binary(BinaryOperator::NotEqual, id(), PlanNode::literal(5));
        let comparison = SargableComparison::classify(&term).unwrap();
        assert!(!comparison.is_index_usable());
    }

    #[test]
    fn test_partition_keeps_order() {
        let terms: Vec<_> = (0..4).map(|i| PlanNode::eq(id(), PlanNode::literal(i))).collect();
        let partition = partition_terms(terms.clone(), |term| {
            let comparison = SargableComparison::classify(term);
            Ok(comparison.is_some_and(|c| c.value == Value::Integer(0) || c.value == Value::Integer(2)))
        })
        .unwrap();
        assert_eq!(partition.sargable, vec![terms[0].clone(), terms[2].clone()]);
        assert_eq!(partition.residual, vec![terms[1].clone(), terms[3].clone()]);
        assert!(partition.is_mixed());
    }

    #[test]
    fn test_partition_propagates_errors() {
        let result = partition_terms(vec![PlanNode::literal(true)], |_| Err(PlanError::MalformedTree("boom".to_string())));
        assert_eq!(result, Err(PlanError::MalformedTree("boom".to_string())));
    }
}
