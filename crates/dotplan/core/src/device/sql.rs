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
use std::collections::{HashMap, HashSet};
use tracing::trace;

use super::{Device, DeviceError, DeviceSupport};
use crate::plan::{BinaryOperator, JoinType, NodeKind, PlanNode, UnaryOperator};

// Sorted, searched with binary_search.
const RESERVED_WORDS: &[&str] = &[
    "all", "and", "as", "by", "except", "from", "group", "in", "intersect", "is", "join", "key", "not", "null", "on",
    "or", "order", "select", "table", "union", "user", "where",
];

/// A device backed by a SQL store that owns a fixed set of tables.
///
/// Support is decided by attempting a translation of the whole subtree, so
/// children assigned to other devices are accepted only if this store can
/// run them too. The generated text rides along on the assignment.
#[derive(Debug, Clone, Default)]
pub struct SqlDevice {
    tables: HashSet<String>,
    functions: HashMap<String, String>,
}

impl SqlDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.tables.insert(table.into());
        self
    }

    /// Maps a plan function onto the store's own function name.
    pub fn with_function(mut self, name: impl Into<String>, sql_name: impl Into<String>) -> Self {
        self.functions.insert(name.into(), sql_name.into());
        self
    }

    /// SQL text for a whole subtree, or `None` if any part of it has no
    /// equivalent in the store.
    pub fn translate(&self, node: &PlanNode) -> Option<String> {
        let mut aliases = 0;
        self.render(node, &mut aliases)
    }

    /// `aliases` counts the derived tables emitted so far, so every alias in
    /// one statement is distinct.
    fn render(&self, node: &PlanNode, aliases: &mut usize) -> Option<String> {
        match (node.kind(), node.children()) {
            (NodeKind::TableSpecifier { table }, _) => {
                self.tables.contains(table).then(|| format!("select * from {}", quote_identifier(table)))
            }
            (NodeKind::Restrict { .. }, [source, predicate]) => {
                let from = self.derived_table(source, aliases)?;
                Some(format!("select * from {from} where {}", self.render(predicate, aliases)?))
            }
            (NodeKind::Project { columns }, [source]) => {
                let list: Vec<_> = columns.iter().map(|c| quote_identifier(c)).collect();
                Some(format!("select distinct {} from {}", list.join(", "), self.derived_table(source, aliases)?))
            }
            (NodeKind::Join { join_type }, [left, right, condition]) => {
                let keyword = match join_type {
                    JoinType::Inner => "join",
                    JoinType::LeftOuter => "left join",
                    JoinType::RightOuter => "right join",
                    JoinType::FullOuter => "full join",
                    JoinType::Semi | JoinType::Anti => return None,
                };
                let left = self.derived_table(left, aliases)?;
                let right = self.derived_table(right, aliases)?;
                Some(format!("select * from {left} {keyword} {right} on {}", self.render(condition, aliases)?))
            }
            (NodeKind::Union { distinct }, branches) => {
                let separator = if *distinct { " union " } else { " union all " };
                let parts = branches.iter().map(|b| self.set_operand(b, aliases)).collect::<Option<Vec<_>>>()?;
                Some(parts.join(separator))
            }
            (NodeKind::Intersect, [left, right]) => {
                let left = self.set_operand(left, aliases)?;
                Some(format!("{left} intersect {}", self.set_operand(right, aliases)?))
            }
            (NodeKind::Difference, [left, right]) => {
                let left = self.set_operand(left, aliases)?;
                Some(format!("{left} except {}", self.set_operand(right, aliases)?))
            }
            (NodeKind::Literal(value), _) => Some(literal(value)),
            (NodeKind::ColumnReference { column, .. }, _) => Some(quote_identifier(column)),
            (NodeKind::BinaryOp(op), [left, right]) => {
                let symbol = match op {
                    BinaryOperator::Concat => "||",
                    other => other.symbol(),
                };
                let left = self.render(left, aliases)?;
                Some(format!("({left} {symbol} {})", self.render(right, aliases)?))
            }
            (NodeKind::UnaryOp(UnaryOperator::Not), [operand]) => Some(format!("not {}", self.render(operand, aliases)?)),
            (NodeKind::UnaryOp(UnaryOperator::Negate), [operand]) => Some(format!("-{}", self.render(operand, aliases)?)),
            (NodeKind::UnaryOp(UnaryOperator::IsNull), [operand]) => Some(format!("({} is null)", self.render(operand, aliases)?)),
            (NodeKind::FunctionCall { name, .. }, arguments) => {
                let sql_name = self.functions.get(name)?;
                let arguments = arguments.iter().map(|a| self.render(a, aliases)).collect::<Option<Vec<_>>>()?;
                Some(format!("{sql_name}({})", arguments.join(", ")))
            }
            _ => None,
        }
    }

    /// SQL gives `intersect` precedence over `union` and `except`, so nested
    /// set operations are parenthesized to keep the tree's grouping.
    fn set_operand(&self, node: &PlanNode, aliases: &mut usize) -> Option<String> {
        let sql = self.render(node, aliases)?;
        match node.kind() {
            NodeKind::Union { .. } | NodeKind::Intersect | NodeKind::Difference => Some(format!("({sql})")),
            _ => Some(sql),
        }
    }

    fn derived_table(&self, source: &PlanNode, aliases: &mut usize) -> Option<String> {
        match source.kind() {
            NodeKind::TableSpecifier { table } if self.tables.contains(table) => Some(quote_identifier(table)),
            _ => {
                *aliases += 1;
                let alias = *aliases;
                Some(format!("({}) as t{alias}", self.render(source, aliases)?))
            }
        }
    }
}

impl Device for SqlDevice {
    fn supports(&self, node: &PlanNode, _child_devices: &[Option<String>]) -> Result<DeviceSupport, DeviceError> {
        let support = match self.translate(node) {
            Some(sql) => DeviceSupport::translated(sql),
            None => DeviceSupport::Unsupported,
        };
        trace!(node = node.kind().name(), supported = support.is_supported(), "SQL device support check");
        Ok(support)
    }
}

fn literal(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

fn quote_identifier(name: &str) -> String {
    let plain = name.chars().next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    let reserved = RESERVED_WORDS.binary_search(&name.to_ascii_lowercase().as_str()).is_ok();
    if plain && !reserved {
        name.to_string()
    } else {
        format!("\"{}\"", name.replace('"', "\"\""))
    }
}
