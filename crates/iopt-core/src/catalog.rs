//! # Catalog
//!
//! Table metadata the default cost model consults when it estimates a scan.
//! The optimizer only reads from it. Tables the catalog does not know are
//! costed with [`Statistics::unknown`].

use crate::expr::{ColumnRef, TableRef};
use crate::stats::Statistics;
use std::collections::HashMap;

pub trait Catalog: Send + Sync {
    fn table_stats(&self, table: &TableRef) -> Option<Statistics>;
    fn table_columns(&self, table: &TableRef) -> Option<Vec<ColumnRef>>;
}

#[derive(Debug, Clone)]
struct TableEntry {
    columns: Vec<ColumnRef>,
    stats: Statistics,
}

/// Catalog populated programmatically, for tests and embedding.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    tables: HashMap<TableRef, TableEntry>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_table(&mut self, table: TableRef, columns: Vec<ColumnRef>, stats: Statistics) {
        self.tables.insert(table, TableEntry { columns, stats });
    }

    pub fn with_table(mut self, table: TableRef, columns: Vec<ColumnRef>, stats: Statistics) -> Self {
        self.add_table(table, columns, stats);
        self
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

impl Catalog for InMemoryCatalog {
    fn table_stats(&self, table: &TableRef) -> Option<Statistics> {
        self.tables.get(table).map(|t| t.stats.clone())
    }

    fn table_columns(&self, table: &TableRef) -> Option<Vec<ColumnRef>> {
        self.tables.get(table).map(|t| t.columns.clone())
    }
}
