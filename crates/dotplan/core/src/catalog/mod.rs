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

//! # Catalog
//!
//! Read access to table metadata: columns, indexes and row counts. The
//! planner only ever reads the catalog, so implementations are free to hand
//! out shared snapshots.

mod memory;
mod metadata;

pub use memory::InMemoryCatalog;
pub use metadata::{ColumnMetadata, IndexMetadata, TableMetadata};

use std::sync::Arc;

use crate::plan::{NodeKind, PlanNode};

pub trait Catalog: Send + Sync {
    fn table(&self, name: &str) -> Option<Arc<TableMetadata>>;
}

impl<C: Catalog + ?Sized> Catalog for Arc<C> {
    fn table(&self, name: &str) -> Option<Arc<TableMetadata>> {
        (**self).table(name)
    }
}

/// Metadata for every table read by `node`, in first-seen order. Tables the
/// catalog does not know are skipped.
pub fn source_tables(catalog: &dyn Catalog, node: &PlanNode) -> Vec<Arc<TableMetadata>> {
    let mut tables: Vec<Arc<TableMetadata>> = Vec::new();
    for descendant in node.iter() {
        if let NodeKind::TableSpecifier { table } = descendant.kind() {
            if tables.iter().any(|t| &t.name == table) {
                continue;
            }
            if let Some(metadata) = catalog.table(table) {
                tables.push(metadata);
            }
        }
    }
    tables
}
