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

//! Shared fixtures for the integration tests: a small catalog, stand-in
//! devices and a naive evaluator used to compare row sets before and after
//! planning.

#![allow(dead_code)]

use dotplan_core::catalog::{InMemoryCatalog, IndexMetadata, TableMetadata};
use dotplan_core::device::{Device, DeviceError, DeviceRegistry, DeviceSupport};
use dotplan_core::plan::{BinaryOperator, JoinType, NodeKind, PlanNode, UnaryOperator};
use dotplan_core::{DataType, Value};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

pub type Row = BTreeMap<String, Value>;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

pub fn employee_table() -> TableMetadata {
    TableMetadata::new("Employee")
        .with_column("ID", DataType::Integer)
        .with_column("Name", DataType::String)
        .with_column("DeptID", DataType::Integer)
        .with_index(IndexMetadata::new("PK_Employee", ["ID"]).unique().clustered())
        .with_row_count(1_000)
}

pub fn catalog() -> Arc<InMemoryCatalog> {
    Arc::new(InMemoryCatalog::new().with_table(employee_table()))
}

pub fn id() -> PlanNode {
    PlanNode::column("ID", DataType::Integer)
}

pub fn name() -> PlanNode {
    PlanNode::column("Name", DataType::String)
}

pub fn id_cmp(op: BinaryOperator, value: i64) -> PlanNode {
    PlanNode::binary(op, id(), PlanNode::literal(value))
}

pub fn name_is(value: &str) -> PlanNode {
    PlanNode::eq(name(), PlanNode::literal(value))
}

pub fn upper_name_is(value: &str) -> PlanNode {
    PlanNode::eq(PlanNode::call("Upper", DataType::String, vec![name()]), PlanNode::literal(value))
}

pub fn employees(predicate: PlanNode) -> PlanNode {
    PlanNode::restrict(PlanNode::table("Employee"), predicate)
}

pub fn row(id: i64, name: &str) -> Row {
    let mut row = Row::new();
    row.insert("ID".to_string(), Value::Integer(id));
    row.insert("Name".to_string(), if name.is_empty() { Value::Null } else { Value::from(name) });
    row
}

/// Claims every node it is asked about.
pub struct AcceptAll;

impl Device for AcceptAll {
    fn supports(&self, _node: &PlanNode, _child_devices: &[Option<String>]) -> Result<DeviceSupport, DeviceError> {
        Ok(DeviceSupport::translated("remote"))
    }
}

/// Claims only nodes whose kind name is listed.
pub struct AcceptKinds(pub Vec<&'static str>);

impl Device for AcceptKinds {
    fn supports(&self, node: &PlanNode, _child_devices: &[Option<String>]) -> Result<DeviceSupport, DeviceError> {
        if self.0.contains(&node.kind().name()) {
            Ok(DeviceSupport::supported())
        } else {
            Ok(DeviceSupport::Unsupported)
        }
    }
}

/// Fails every query with a non-fatal error.
pub struct Offline;

impl Device for Offline {
    fn supports(&self, _node: &PlanNode, _child_devices: &[Option<String>]) -> Result<DeviceSupport, DeviceError> {
        Err(DeviceError::Unavailable("offline".to_string()))
    }
}

pub fn registry(devices: Vec<(&str, Arc<dyn Device>)>) -> DeviceRegistry {
    let mut registry = DeviceRegistry::new();
    for (name, device) in devices {
        registry.register(name, device).expect("unique device names");
    }
    registry
}

/// Evaluates a relational tree against in-memory tables, ignoring every
/// planning annotation.
pub fn evaluate(node: &PlanNode, tables: &HashMap<String, Vec<Row>>) -> Vec<Row> {
    match (node.kind(), node.children()) {
        (NodeKind::TableSpecifier { table }, _) => tables.get(table).cloned().unwrap_or_default(),
        (NodeKind::Restrict { .. }, [source, predicate]) => evaluate(source, tables)
            .into_iter()
            .filter(|row| eval_scalar(predicate, row) == Value::Boolean(true))
            .collect(),
        (NodeKind::Project { columns }, [source]) => {
            let projected: BTreeSet<Row> = evaluate(source, tables)
                .into_iter()
                .map(|row| row.into_iter().filter(|(column, _)| columns.contains(column)).collect())
                .collect();
            projected.into_iter().collect()
        }
        (NodeKind::Join { join_type: JoinType::Inner }, [left, right, condition]) => {
            let right_rows = evaluate(right, tables);
            let mut joined = Vec::new();
            for l in evaluate(left, tables) {
                for r in &right_rows {
                    let mut merged = l.clone();
                    merged.extend(r.clone());
                    if eval_scalar(condition, &merged) == Value::Boolean(true) {
                        joined.push(merged);
                    }
                }
            }
            joined
        }
        (NodeKind::Union { distinct }, branches) => {
            let rows: Vec<Row> = branches.iter().flat_map(|b| evaluate(b, tables)).collect();
            if *distinct { rows.into_iter().collect::<BTreeSet<_>>().into_iter().collect() } else { rows }
        }
        (NodeKind::Intersect, [left, right]) => {
            let right: BTreeSet<Row> = evaluate(right, tables).into_iter().collect();
            evaluate(left, tables).into_iter().filter(|row| right.contains(row)).collect()
        }
        (NodeKind::Difference, [left, right]) => {
            let right: BTreeSet<Row> = evaluate(right, tables).into_iter().collect();
            evaluate(left, tables).into_iter().filter(|row| !right.contains(row)).collect()
        }
        (kind, _) => panic!("evaluator does not support {kind:?}"),
    }
}

/// Three-valued scalar evaluation; `Value::Null` stands for unknown.
pub fn eval_scalar(node: &PlanNode, row: &Row) -> Value {
    match (node.kind(), node.children()) {
        (NodeKind::Literal(value), _) => value.clone(),
        (NodeKind::ColumnReference { column, .. }, _) => row.get(column).cloned().unwrap_or(Value::Null),
        (NodeKind::BinaryOp(BinaryOperator::And), [left, right]) => {
            match (eval_scalar(left, row).as_bool(), eval_scalar(right, row).as_bool()) {
                (Some(false), _) | (_, Some(false)) => Value::Boolean(false),
                (Some(true), Some(true)) => Value::Boolean(true),
                _ => Value::Null,
            }
        }
        (NodeKind::BinaryOp(BinaryOperator::Or), [left, right]) => {
            match (eval_scalar(left, row).as_bool(), eval_scalar(right, row).as_bool()) {
                (Some(true), _) | (_, Some(true)) => Value::Boolean(true),
                (Some(false), Some(false)) => Value::Boolean(false),
                _ => Value::Null,
            }
        }
        (NodeKind::BinaryOp(op), [left, right]) if op.is_comparison() => {
            let ordering = eval_scalar(left, row).compare(&eval_scalar(right, row));
            match ordering {
                None => Value::Null,
                Some(ordering) => Value::Boolean(match op {
                    BinaryOperator::Equal => ordering == Ordering::Equal,
                    BinaryOperator::NotEqual => ordering != Ordering::Equal,
                    BinaryOperator::Less => ordering == Ordering::Less,
                    BinaryOperator::LessEqual => ordering != Ordering::Greater,
                    BinaryOperator::Greater => ordering == Ordering::Greater,
                    _ => ordering != Ordering::Less,
                }),
            }
        }
        (NodeKind::UnaryOp(UnaryOperator::Not), [operand]) => match eval_scalar(operand, row).as_bool() {
            Some(value) => Value::Boolean(!value),
            None => Value::Null,
        },
        (NodeKind::UnaryOp(UnaryOperator::IsNull), [operand]) => Value::Boolean(eval_scalar(operand, row).is_null()),
        (NodeKind::FunctionCall { name, .. }, [argument]) if name == "Upper" => match eval_scalar(argument, row) {
            Value::String(s) => Value::String(s.to_uppercase()),
            _ => Value::Null,
        },
        (kind, _) => panic!("evaluator does not support {kind:?}"),
    }
}

/// Rows as a set, for order-insensitive comparison.
pub fn row_set(rows: Vec<Row>) -> BTreeSet<Row> {
    rows.into_iter().collect()
}
