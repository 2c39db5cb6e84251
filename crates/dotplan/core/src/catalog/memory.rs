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

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use super::{Catalog, TableMetadata};

/// A catalog held entirely in memory, safe to share across planning threads.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    tables: RwLock<HashMap<String, Arc<TableMetadata>>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(self, table: TableMetadata) -> Self {
        self.register(table);
        self
    }

    /// Adds or replaces a table definition.
    pub fn register(&self, table: TableMetadata) {
        debug!(table = %table.name, indexes = table.indexes.len(), "Registering table metadata");
        self.tables.write().insert(table.name.clone(), Arc::new(table));
    }

    pub fn remove(&self, name: &str) -> Option<Arc<TableMetadata>> {
        self.tables.write().remove(name)
    }

    pub fn len(&self) -> usize {
        self.tables.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.read().is_empty()
    }
}

impl Catalog for InMemoryCatalog {
    fn table(&self, name: &str) -> Option<Arc<TableMetadata>> {
        self.tables.read().get(name).cloned()
    }
}
