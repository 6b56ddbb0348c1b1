//! The schema catalog: the table b-tree rooted at page 1, materialized once
//! per database handle.
//!
//! Rows have five columns: `type`, `name`, `tbl_name`, `rootpage`, `sql`.
//! Rows that do not fit that shape (wrong arity, non-text names) are skipped
//! rather than failing the whole catalog, matching how tolerant readers treat
//! auto-indexes and views with NULL `sql`.

use std::str;

use rustc_hash::FxHashMap;

use crate::error::Result;
use crate::pager::{PageId, Pager};
use crate::record::ValueRef;
use crate::table;

/// One row of the schema table.
#[derive(Debug, Clone)]
pub struct SchemaEntry {
    /// `table`, `index`, `view`, or `trigger`.
    pub kind: String,
    pub name: String,
    pub tbl_name: String,
    /// Root page of the object's b-tree; views and triggers have none.
    pub root: Option<PageId>,
    /// The creation SQL; NULL for auto-indexes.
    pub sql: Option<String>,
}

impl SchemaEntry {
    pub fn is_table(&self) -> bool {
        self.kind.eq_ignore_ascii_case("table")
    }

    pub fn is_index(&self) -> bool {
        self.kind.eq_ignore_ascii_case("index")
    }

    /// Internal bookkeeping objects (`sqlite_sequence`, auto-indexes, ...).
    pub fn is_internal(&self) -> bool {
        self.name.len() >= 7 && self.name[..7].eq_ignore_ascii_case("sqlite_")
    }
}

#[derive(Debug)]
pub struct Catalog {
    entries: Vec<SchemaEntry>,
    tables: FxHashMap<String, usize>,
}

impl Catalog {
    pub fn load(pager: &Pager) -> Result<Self> {
        let mut entries = Vec::new();
        table::scan_table(pager, PageId::ROOT, |_, row| {
            if let Some(entry) = decode_entry(&row) {
                entries.push(entry);
            }
            Ok(())
        })?;

        let mut tables = FxHashMap::default();
        for (idx, entry) in entries.iter().enumerate() {
            if entry.is_table() {
                tables.entry(entry.name.to_ascii_lowercase()).or_insert(idx);
            }
        }

        Ok(Self { entries, tables })
    }

    /// All entries, in schema-table order.
    pub fn entries(&self) -> &[SchemaEntry] {
        &self.entries
    }

    /// Case-insensitive lookup of a table entry.
    pub fn table(&self, name: &str) -> Option<&SchemaEntry> {
        self.tables.get(&name.to_ascii_lowercase()).map(|idx| &self.entries[*idx])
    }

    /// Index entries attached to `table`, in catalog order.
    pub fn indexes_on<'a>(&'a self, table: &'a str) -> impl Iterator<Item = &'a SchemaEntry> {
        self.entries
            .iter()
            .filter(move |entry| entry.is_index() && entry.tbl_name.eq_ignore_ascii_case(table))
    }

    /// Names of user tables (excluding `sqlite_*`), in catalog order.
    pub fn user_table_names(&self) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .filter(|entry| entry.is_table() && !entry.is_internal())
            .map(|entry| entry.name.as_str())
    }

    pub fn user_table_count(&self) -> usize {
        self.user_table_names().count()
    }
}

fn decode_entry(row: &crate::record::RowView<'_>) -> Option<SchemaEntry> {
    if row.len() < 5 {
        return None;
    }

    let kind = text_column(row, 0)?;
    let name = text_column(row, 1)?;
    let tbl_name = text_column(row, 2)?;
    let root = match row.get(3)? {
        ValueRef::Integer(value) => u32::try_from(value).ok().and_then(PageId::try_new),
        _ => None,
    };
    let sql = match row.get(4)? {
        ValueRef::Text(bytes) => str::from_utf8(bytes).ok().map(str::to_owned),
        _ => None,
    };

    Some(SchemaEntry { kind, name, tbl_name, root, sql })
}

fn text_column(row: &crate::record::RowView<'_>, idx: usize) -> Option<String> {
    match row.get(idx)? {
        ValueRef::Text(bytes) => str::from_utf8(bytes).ok().map(str::to_owned),
        _ => None,
    }
}
