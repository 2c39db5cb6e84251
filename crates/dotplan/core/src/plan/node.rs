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

use dotplan_common::{DataType, Value};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::access_path::AccessPath;
use crate::error::PlanError;

/// Binary scalar operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOperator {
    And,
    Or,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Add,
    Subtract,
    Multiply,
    Divide,
    Concat,
}

impl BinaryOperator {
    pub fn is_logical(self) -> bool {
        matches!(self, BinaryOperator::And | BinaryOperator::Or)
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOperator::Equal
                | BinaryOperator::NotEqual
                | BinaryOperator::Less
                | BinaryOperator::LessEqual
                | BinaryOperator::Greater
                | BinaryOperator::GreaterEqual
        )
    }

    /// The comparison obtained by swapping the operands: `a < b` is `b > a`.
    pub fn flip(self) -> Option<Self> {
        use BinaryOperator::*;
        match self {
            Equal => Some(Equal),
            NotEqual => Some(NotEqual),
            Less => Some(Greater),
            LessEqual => Some(GreaterEqual),
            Greater => Some(Less),
            GreaterEqual => Some(LessEqual),
            _ => None,
        }
    }

    /// The complement of a comparison. A nil operand makes both the original
    /// and the complement unknown, so the rewrite holds in three-valued logic.
    pub fn negate(self) -> Option<Self> {
        use BinaryOperator::*;
        match self {
            Equal => Some(NotEqual),
            NotEqual => Some(Equal),
            Less => Some(GreaterEqual),
            LessEqual => Some(Greater),
            Greater => Some(LessEqual),
            GreaterEqual => Some(Less),
            _ => None,
        }
    }

    pub fn symbol(self) -> &'static str {
        use BinaryOperator::*;
        match self {
            And => "and",
            Or => "or",
            Equal => "=",
            NotEqual => "<>",
            Less => "<",
            LessEqual => "<=",
            Greater => ">",
            GreaterEqual => ">=",
            Add => "+",
            Subtract => "-",
            Multiply => "*",
            Divide => "/",
            Concat => "||",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOperator {
    Not,
    Negate,
    IsNull,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JoinType {
    Inner,
    LeftOuter,
    RightOuter,
    FullOuter,
    Semi,
    Anti,
}

/// Where a restriction stands with respect to normalization.
///
/// The compiler emits `Unnormalized` restrictions. Normalization rewrites them
/// into `Sargable` and `Residual` ones and never touches those again, which
/// makes a second normalization pass a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RestrictRole {
    #[default]
    Unnormalized,
    Sargable,
    Residual,
}

/// The operator carried by a plan node.
///
/// Relational kinds produce rows, scalar kinds produce a single value per row.
/// Children follow a fixed layout per kind: `Restrict` is `[source, predicate]`,
/// `Join` is `[left, right, condition]`, `Union` has two or more relational
/// branches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NodeKind {
    TableSpecifier { table: String },
    Restrict { role: RestrictRole },
    Project { columns: Vec<String> },
    Join { join_type: JoinType },
    Union { distinct: bool },
    Intersect,
    Difference,
    Literal(Value),
    ColumnReference { column: String, data_type: DataType },
    BinaryOp(BinaryOperator),
    UnaryOp(UnaryOperator),
    FunctionCall { name: String, return_type: DataType },
}

impl NodeKind {
    pub fn is_relational(&self) -> bool {
        matches!(
            self,
            NodeKind::TableSpecifier { .. }
                | NodeKind::Restrict { .. }
                | NodeKind::Project { .. }
                | NodeKind::Join { .. }
                | NodeKind::Union { .. }
                | NodeKind::Intersect
                | NodeKind::Difference
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::TableSpecifier { .. } => "TableSpecifier",
            NodeKind::Restrict { .. } => "Restrict",
            NodeKind::Project { .. } => "Project",
            NodeKind::Join { .. } => "Join",
            NodeKind::Union { .. } => "Union",
            NodeKind::Intersect => "Intersect",
            NodeKind::Difference => "Difference",
            NodeKind::Literal(_) => "Literal",
            NodeKind::ColumnReference { .. } => "ColumnReference",
            NodeKind::BinaryOp(_) => "BinaryOp",
            NodeKind::UnaryOp(_) => "UnaryOp",
            NodeKind::FunctionCall { .. } => "FunctionCall",
        }
    }
}

/// A device claim on a node: which device evaluates the subtree and, when the
/// device produced one, the translated text it will run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceAssignment {
    pub device: String,
    pub translation: Option<String>,
}

impl DeviceAssignment {
    pub fn new(device: impl Into<String>) -> Self {
        Self { device: device.into(), translation: None }
    }

    pub fn with_translation(mut self, translation: impl Into<String>) -> Self {
        self.translation = Some(translation.into());
        self
    }
}

/// A node of the compiled plan tree.
///
/// Each node exclusively owns its children. The annotation fields (`device`,
/// `device_supported`, `access_path`) start out empty and are filled in by the
/// planning passes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanNode {
    kind: NodeKind,
    #[serde(default)]
    children: Vec<PlanNode>,
    #[serde(default)]
    device: Option<DeviceAssignment>,
    #[serde(default)]
    device_supported: bool,
    #[serde(default)]
    access_path: Option<AccessPath>,
}

impl PlanNode {
    /// Builds a node without checking its shape. Use [`PlanNode::validate`]
    /// on trees that come from outside the builders below.
    pub fn new(kind: NodeKind, children: Vec<PlanNode>) -> Self {
        Self { kind, children, device: None, device_supported: false, access_path: None }
    }

    pub fn table(name: impl Into<String>) -> Self {
        Self::new(NodeKind::TableSpecifier { table: name.into() }, Vec::new())
    }

    pub fn restrict(source: PlanNode, predicate: PlanNode) -> Self {
        Self::restrict_with_role(RestrictRole::Unnormalized, source, predicate)
    }

    pub fn restrict_with_role(role: RestrictRole, source: PlanNode, predicate: PlanNode) -> Self {
        Self::new(NodeKind::Restrict { role }, vec![source, predicate])
    }

    pub fn project<S: Into<String>>(source: PlanNode, columns: impl IntoIterator<Item = S>) -> Self {
        let columns = columns.into_iter().map(Into::into).collect();
        Self::new(NodeKind::Project { columns }, vec![source])
    }

    pub fn join(join_type: JoinType, left: PlanNode, right: PlanNode, condition: PlanNode) -> Self {
        Self::new(NodeKind::Join { join_type }, vec![left, right, condition])
    }

    pub fn union(distinct: bool, branches: Vec<PlanNode>) -> Self {
        Self::new(NodeKind::Union { distinct }, branches)
    }

    pub fn intersect(left: PlanNode, right: PlanNode) -> Self {
        Self::new(NodeKind::Intersect, vec![left, right])
    }

    pub fn difference(left: PlanNode, right: PlanNode) -> Self {
        Self::new(NodeKind::Difference, vec![left, right])
    }

    pub fn literal(value: impl Into<Value>) -> Self {
        Self::new(NodeKind::Literal(value.into()), Vec::new())
    }

    pub fn null() -> Self {
        Self::new(NodeKind::Literal(Value::Null), Vec::new())
    }

    pub fn column(name: impl Into<String>, data_type: DataType) -> Self {
        Self::new(NodeKind::ColumnReference { column: name.into(), data_type }, Vec::new())
    }

    pub fn binary(op: BinaryOperator, left: PlanNode, right: PlanNode) -> Self {
        Self::new(NodeKind::BinaryOp(op), vec![left, right])
    }

    pub fn unary(op: UnaryOperator, operand: PlanNode) -> Self {
        Self::new(NodeKind::UnaryOp(op), vec![operand])
    }

    pub fn and(left: PlanNode, right: PlanNode) -> Self {
        Self::binary(BinaryOperator::And, left, right)
    }

    pub fn or(left: PlanNode, right: PlanNode) -> Self {
        Self::binary(BinaryOperator::Or, left, right)
    }

    pub fn not(operand: PlanNode) -> Self {
        Self::unary(UnaryOperator::Not, operand)
    }

    pub fn eq(left: PlanNode, right: PlanNode) -> Self {
        Self::binary(BinaryOperator::Equal, left, right)
    }

    pub fn call(name: impl Into<String>, return_type: DataType, arguments: Vec<PlanNode>) -> Self {
        Self::new(NodeKind::FunctionCall { name: name.into(), return_type }, arguments)
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn children(&self) -> &[PlanNode] {
        &self.children
    }

    pub fn child(&self, index: usize) -> Option<&PlanNode> {
        self.children.get(index)
    }

    pub(crate) fn children_mut(&mut self) -> &mut [PlanNode] {
        &mut self.children
    }

    pub(crate) fn into_children(self) -> Vec<PlanNode> {
        self.children
    }

    /// Splits off the single operand, handing the node back untouched if it
    /// does not have exactly one child.
    pub(crate) fn into_operand(self) -> Result<PlanNode, PlanNode> {
        let PlanNode { kind, children, device, device_supported, access_path } = self;
        match <[PlanNode; 1]>::try_from(children) {
            Ok([operand]) => Ok(operand),
            Err(children) => Err(PlanNode { kind, children, device, device_supported, access_path }),
        }
    }

    /// Splits off both children of a two-child node.
    pub(crate) fn into_operands(self) -> Result<(PlanNode, PlanNode), PlanNode> {
        let PlanNode { kind, children, device, device_supported, access_path } = self;
        match <[PlanNode; 2]>::try_from(children) {
            Ok([left, right]) => Ok((left, right)),
            Err(children) => Err(PlanNode { kind, children, device, device_supported, access_path }),
        }
    }

    pub fn is_relational(&self) -> bool {
        self.kind.is_relational()
    }

    pub fn is_scalar(&self) -> bool {
        !self.kind.is_relational()
    }

    pub fn restrict_role(&self) -> Option<RestrictRole> {
        match self.kind {
            NodeKind::Restrict { role } => Some(role),
            _ => None,
        }
    }

    pub fn set_restrict_role(&mut self, new_role: RestrictRole) -> Result<(), PlanError> {
        match &mut self.kind {
            NodeKind::Restrict { role } => {
                *role = new_role;
                Ok(())
            }
            other => Err(PlanError::NotARestriction(other.name())),
        }
    }

    /// The row source of a `Restrict` or `Project`.
    pub fn source(&self) -> Option<&PlanNode> {
        match self.kind {
            NodeKind::Restrict { .. } | NodeKind::Project { .. } => self.children.first(),
            _ => None,
        }
    }

    /// The filter of a `Restrict` or the condition of a `Join`.
    pub fn predicate(&self) -> Option<&PlanNode> {
        match self.kind {
            NodeKind::Restrict { .. } => self.children.get(1),
            NodeKind::Join { .. } => self.children.get(2),
            _ => None,
        }
    }

    /// Static result type of a scalar node. `None` for relational nodes and
    /// for the untyped nil literal.
    pub fn result_type(&self) -> Option<DataType> {
        match &self.kind {
            NodeKind::Literal(value) => value.data_type(),
            NodeKind::ColumnReference { data_type, .. } => Some(*data_type),
            NodeKind::BinaryOp(op) if op.is_logical() || op.is_comparison() => Some(DataType::Boolean),
            NodeKind::BinaryOp(BinaryOperator::Concat) => Some(DataType::String),
            NodeKind::BinaryOp(_) | NodeKind::UnaryOp(UnaryOperator::Negate) => self.arithmetic_type(),
            NodeKind::UnaryOp(UnaryOperator::Not | UnaryOperator::IsNull) => Some(DataType::Boolean),
            NodeKind::FunctionCall { return_type, .. } => Some(*return_type),
            _ => None,
        }
    }

    /// Shared numeric type of the operands, ignoring untyped nils. `None`
    /// when the operands disagree or are not numeric.
    fn arithmetic_type(&self) -> Option<DataType> {
        let mut types = self.children.iter().filter_map(PlanNode::result_type);
        let first = types.next()?;
        (first.is_numeric() && types.all(|t| t == first)).then_some(first)
    }

    pub fn is_boolean(&self) -> bool {
        self.result_type() == Some(DataType::Boolean)
    }

    /// Swaps in a new predicate for a `Restrict` and hands back the old one.
    ///
    /// The restriction role is left alone; callers that change what the
    /// predicate means should also call [`PlanNode::set_restrict_role`].
    pub fn replace_predicate(&mut self, predicate: PlanNode) -> Result<PlanNode, PlanError> {
        let kind = self.kind.name();
        if !matches!(self.kind, NodeKind::Restrict { .. }) {
            return Err(PlanError::NotARestriction(kind));
        }
        if predicate.is_relational() || !predicate.is_boolean() {
            return Err(PlanError::NonBooleanPredicate { kind, found: predicate.type_label() });
        }
        match self.children.get_mut(1) {
            Some(slot) => Ok(std::mem::replace(slot, predicate)),
            None => Err(PlanError::InvalidArity { kind, expected: "2".to_string(), found: self.children.len() }),
        }
    }

    pub fn device(&self) -> Option<&DeviceAssignment> {
        self.device.as_ref()
    }

    pub fn device_supported(&self) -> bool {
        self.device_supported
    }

    pub fn set_device(&mut self, assignment: DeviceAssignment) {
        self.device = Some(assignment);
    }

    pub fn clear_device(&mut self) {
        self.device = None;
    }

    pub(crate) fn set_device_supported(&mut self, supported: bool) {
        self.device_supported = supported;
    }

    /// Clears the device field of every descendant, leaving this node alone.
    pub(crate) fn clear_descendant_devices(&mut self) {
        let mut stack: Vec<&mut PlanNode> = self.children.iter_mut().collect();
        while let Some(node) = stack.pop() {
            node.device = None;
            stack.extend(node.children.iter_mut());
        }
    }

    pub fn access_path(&self) -> Option<&AccessPath> {
        self.access_path.as_ref()
    }

    pub fn set_access_path(&mut self, path: AccessPath) {
        self.access_path = Some(path);
    }

    pub fn clear_access_path(&mut self) {
        self.access_path = None;
    }

    /// Drops every planning annotation in the subtree, returning it to the
    /// state the compiler produced.
    pub fn clear_annotations(&mut self) {
        let mut stack: Vec<&mut PlanNode> = vec![self];
        while let Some(node) = stack.pop() {
            node.device = None;
            node.device_supported = false;
            node.access_path = None;
            stack.extend(node.children.iter_mut());
        }
    }

    /// Pre-order iterator over this node and all of its descendants.
    pub fn iter(&self) -> PreOrder<'_> {
        PreOrder { stack: vec![self] }
    }

    pub fn node_count(&self) -> usize {
        self.iter().count()
    }

    /// Structural equality that ignores planning annotations.
    pub fn same_expression(&self, other: &PlanNode) -> bool {
        self.kind == other.kind
            && self.children.len() == other.children.len()
            && self.children.iter().zip(&other.children).all(|(a, b)| a.same_expression(b))
    }

    pub(crate) fn type_label(&self) -> String {
        if self.is_relational() {
            return "relational expression".to_string();
        }
        match self.result_type() {
            Some(data_type) => data_type.to_string(),
            None => "untyped nil".to_string(),
        }
    }
}

pub struct PreOrder<'a> {
    stack: Vec<&'a PlanNode>,
}

impl<'a> Iterator for PreOrder<'a> {
    type Item = &'a PlanNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}

/// Scalars print as expressions, relational nodes print their header line.
impl fmt::Display for PlanNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.kind, self.children.as_slice()) {
            (NodeKind::Literal(value), _) => write!(f, "{value}"),
            (NodeKind::ColumnReference { column, .. }, _) => write!(f, "{column}"),
            (NodeKind::BinaryOp(op), [left, right]) => write!(f, "({left} {} {right})", op.symbol()),
            (NodeKind::UnaryOp(UnaryOperator::Not), [operand]) => write!(f, "not {operand}"),
            (NodeKind::UnaryOp(UnaryOperator::Negate), [operand]) => write!(f, "-{operand}"),
            (NodeKind::UnaryOp(UnaryOperator::IsNull), [operand]) => write!(f, "IsNil({operand})"),
            (NodeKind::FunctionCall { name, .. }, arguments) => {
                write!(f, "{name}(")?;
                for (i, argument) in arguments.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{argument}")?;
                }
                write!(f, ")")
            }
            (NodeKind::TableSpecifier { table }, _) => write!(f, "TableSpecifier {table}"),
            (NodeKind::Restrict { role }, _) => write!(f, "Restrict ({role:?})"),
            (NodeKind::Project { columns }, _) => write!(f, "Project {{{}}}", columns.join(", ")),
            (NodeKind::Join { join_type }, _) => write!(f, "Join ({join_type:?})"),
            (NodeKind::Union { distinct: true }, _) => write!(f, "Union distinct"),
            (NodeKind::Union { distinct: false }, _) => write!(f, "Union all"),
            (kind, _) => write!(f, "{}", kind.name()),
        }
    }
}
