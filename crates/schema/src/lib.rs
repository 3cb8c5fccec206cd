//! Table/column reference identity, keys, foreign keys, and the statistics
//! the cost model reads cardinalities and widths from. This is the
//! contract surface of a "system catalog" collaborator — no XML loader,
//! just the in-memory shape the optimizer and B+-tree crates build on.

use hashbrown::HashMap;
use types::SqlType;

#[derive(Clone, Debug, PartialEq)]
pub struct Column {
    pub name: String,
    pub sql_type: SqlType,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IndexKind {
    BTree,
    Hash,
}

#[derive(Clone, Debug, PartialEq)]
pub struct IndexMeta {
    pub name: String,
    pub columns: Vec<String>,
    pub kind: IndexKind,
    pub unique: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Key {
    pub columns: Vec<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ForeignKey {
    pub columns: Vec<String>,
    pub references_table: String,
    pub references_columns: Vec<String>,
}

impl ForeignKey {
    /// Looks up the referenced table in `catalog`, returning `Some` when
    /// the reference is valid so callers can tell a resolved key apart
    /// from a dangling one instead of treating every lookup as empty.
    pub fn resolve<'a>(&self, catalog: &'a Catalog) -> Option<TableRef<'a>> {
        catalog.table(&self.references_table)
    }
}

/// Per-column and per-table statistics the cost model consumes.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Statistics {
    pub cardinality: u64,
    pub unique_cardinality: HashMap<String, u64>,
    pub width: HashMap<String, usize>,
}

impl Statistics {
    pub fn selectivity_for_equality(&self, column: &str) -> f64 {
        match self.unique_cardinality.get(column) {
            Some(&uc) if uc > 0 => 1.0 / uc as f64,
            _ => 1.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<Column>,
    pub primary_key: Option<Key>,
    pub foreign_keys: Vec<ForeignKey>,
    pub indexes: Vec<IndexMeta>,
    pub stats: Statistics,
}

impl TableSchema {
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn index_on(&self, column: &str) -> Option<&IndexMeta> {
        self.indexes
            .iter()
            .find(|idx| idx.columns.first().map(String::as_str) == Some(column))
    }
}

/// Borrowed view of a resolved table, returned by [`ForeignKey::resolve`]
/// and [`Catalog::table`].
#[derive(Clone, Copy, Debug)]
pub struct TableRef<'a> {
    pub schema: &'a TableSchema,
}

#[derive(Clone, Debug, Default)]
pub struct Catalog {
    tables: HashMap<String, TableSchema>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_table(&mut self, schema: TableSchema) {
        self.tables.insert(schema.name.clone(), schema);
    }

    pub fn table(&self, name: &str) -> Option<TableRef<'_>> {
        self.tables.get(name).map(|schema| TableRef { schema })
    }

    pub fn tables(&self) -> impl Iterator<Item = &TableSchema> {
        self.tables.values()
    }
}
