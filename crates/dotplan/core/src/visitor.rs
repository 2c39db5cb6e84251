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

//! # Plan Visitors
//!
//! A visitor receives every node of a plan tree twice: once before its
//! children are visited (`pre_order`) and once after (`post_order`).
//!
//! Both hooks get a mutable node, so a visitor may annotate the node or
//! replace it outright. A node replaced in `pre_order` is the one whose
//! children get walked, which lets a rewrite be followed by further
//! processing of its result. An error from either hook aborts the traversal
//! and is returned unchanged.

use crate::error::PlanError;
use crate::plan::PlanNode;

pub trait PlanVisitor {
    fn pre_order(&mut self, _node: &mut PlanNode) -> Result<(), PlanError> {
        Ok(())
    }

    fn post_order(&mut self, _node: &mut PlanNode) -> Result<(), PlanError> {
        Ok(())
    }
}

/// Walks `root` depth first, children in order.
pub fn traverse<V: PlanVisitor + ?Sized>(root: &mut PlanNode, visitor: &mut V) -> Result<(), PlanError> {
    visitor.pre_order(root)?;
    for child in root.children_mut() {
        traverse(child, visitor)?;
    }
    visitor.post_order(root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::{NodeKind, RestrictRole};
    use dotplan_common::DataType;

    #[derive(Default)]
    struct Recorder {
        events: Vec<String>,
    }

    impl PlanVisitor for Recorder {
        fn pre_order(&mut self, node: &mut PlanNode) -> Result<(), PlanError> {
            self.events.push(format!("pre {}", node.kind().name()));
            Ok(())
        }

        fn post_order(&mut self, node: &mut PlanNode) -> Result<(), PlanError> {
            self.events.push(format!("post {}", node.kind().name()));
            Ok(())
        }
    }

    fn sample() -> PlanNode {
        PlanNode::restrict(
            PlanNode::table("Employee"),
            PlanNode::eq(PlanNode::column("ID", DataType::Integer), PlanNode::literal(5)),
        )
    }

    #[test]
    fn test_hook_order() {
        let mut recorder = Recorder::default();
        traverse(&mut sample(), &mut recorder).unwrap();
        assert_eq!(
            recorder.events,
            vec![
                "pre Restrict",
                "pre TableSpecifier",
                "post TableSpecifier",
                "pre BinaryOp",
                "pre ColumnReference",
                "post ColumnReference",
                "pre Literal",
                "post Literal",
                "post BinaryOp",
                "post Restrict",
            ]
        );
    }

    struct FailOnLiteral;

    impl PlanVisitor for FailOnLiteral {
        fn post_order(&mut self, node: &mut PlanNode) -> Result<(), PlanError> {
            match node.kind() {
                NodeKind::Literal(_) => Err(PlanError::MalformedTree("literal".to_string())),
                _ => Ok(()),
            }
        }
    }

    #[test]
    fn test_error_aborts_traversal() {
        let result = traverse(&mut sample(), &mut FailOnLiteral);
        assert_eq!(result, Err(PlanError::MalformedTree("literal".to_string())));
    }

    struct WrapTables {
        wrapped: bool,
        seen_tables: usize,
    }

    impl PlanVisitor for WrapTables {
        fn pre_order(&mut self, node: &mut PlanNode) -> Result<(), PlanError> {
            if !self.wrapped && matches!(node.kind(), NodeKind::TableSpecifier { .. }) {
                self.wrapped = true;
                let table = std::mem::replace(node, PlanNode::literal(true));
                *node = PlanNode::restrict_with_role(RestrictRole::Residual, table, PlanNode::literal(true));
            }
            Ok(())
        }

        fn post_order(&mut self, node: &mut PlanNode) -> Result<(), PlanError> {
            if matches!(node.kind(), NodeKind::TableSpecifier { .. }) {
                self.seen_tables += 1;
            }
            Ok(())
        }
    }

    #[test]
    fn test_replacement_in_pre_order_is_walked() {
        let mut plan = sample();
        let mut visitor = WrapTables { wrapped: false, seen_tables: 0 };
        traverse(&mut plan, &mut visitor).unwrap();
        // The replacement's children are walked, so the original table is still reached.
        assert_eq!(visitor.seen_tables, 1);
        assert_eq!(plan.source().and_then(PlanNode::restrict_role), Some(RestrictRole::Residual));
    }
}
