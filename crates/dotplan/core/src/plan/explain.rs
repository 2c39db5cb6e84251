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

use std::fmt::Write;

use super::node::{NodeKind, PlanNode};

const INDENT: &str = "  ";

impl PlanNode {
    /// Renders the tree one relational node per line, with scalar operands
    /// shown inline as expressions and planning annotations in brackets.
    pub fn explain(&self) -> String {
        let mut out = String::new();
        if self.is_scalar() {
            let _ = writeln!(out, "{self}");
            return out;
        }
        explain_into(self, 0, &mut out);
        out
    }
}

fn explain_into(node: &PlanNode, depth: usize, out: &mut String) {
    let indent = INDENT.repeat(depth);
    let _ = write!(out, "{indent}{node}");
    if let Some(device) = node.device() {
        let _ = write!(out, " [device: {}]", device.device);
    }
    if let Some(path) = node.access_path() {
        let _ = write!(out, " [path: {}, rows: {}]", path.strategy, path.estimated_rows);
    }
    out.push('\n');

    for (position, child) in node.children().iter().enumerate() {
        if child.is_relational() {
            explain_into(child, depth + 1, out);
            continue;
        }
        let label = match node.kind() {
            NodeKind::Join { .. } => "on",
            _ if position == 1 => "where",
            _ => "operand",
        };
        let _ = writeln!(out, "{indent}{INDENT}{label}: {child}");
    }
}
