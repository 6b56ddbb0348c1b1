use std::fs::File;
use std::path::Path;
use std::sync::OnceLock;

use crate::catalog::Catalog;
use crate::error::{Error, Result};
use crate::pager::Pager;
use crate::query;
use crate::record::RowView;
use crate::sql::{self, Command, SelectStmt};

/// Read-only handle to a database file.
#[derive(Debug)]
pub struct Db {
    pager: Pager,
    catalog: OnceLock<Catalog>,
}

/// Header facts reported by `.dbinfo`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DbInfo {
    pub page_size: usize,
    /// User tables only: catalog rows with `type == table` whose name does
    /// not start with `sqlite_`.
    pub table_count: usize,
}

impl Db {
    /// Open a database file read-only.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path).map_err(|err| Error::Pager(crate::pager::Error::Io(err)))?;
        let pager = Pager::new(file)?;
        Ok(Self { pager, catalog: OnceLock::new() })
    }

    pub fn info(&self) -> Result<DbInfo> {
        let catalog = self.catalog()?;
        Ok(DbInfo {
            page_size: self.pager.header().page_size,
            table_count: catalog.user_table_count(),
        })
    }

    /// User table names in catalog order, as listed by `.tables`.
    pub fn table_names(&self) -> Result<Vec<String>> {
        let catalog = self.catalog()?;
        Ok(catalog.user_table_names().map(str::to_owned).collect())
    }

    /// Run a select, invoking `f` once per row.
    pub fn select<F>(&self, stmt: &SelectStmt, f: F) -> Result<()>
    where
        F: FnMut(RowView<'_>) -> Result<()>,
    {
        query::run_select(&self.pager, self.catalog()?, stmt, f)
    }

    /// Parse and run a SQL statement, invoking `f` once per row. Dot-commands
    /// are rejected here; they are dispatched by the shell.
    pub fn execute_sql<F>(&self, input: &str, f: F) -> Result<()>
    where
        F: FnMut(RowView<'_>) -> Result<()>,
    {
        match sql::parse_command(input)? {
            Command::Select(stmt) => self.select(&stmt, f),
            Command::DbInfo | Command::Tables => Err(Error::SqlUnsupported(input.to_owned())),
        }
    }

    pub fn catalog(&self) -> Result<&Catalog> {
        if let Some(catalog) = self.catalog.get() {
            return Ok(catalog);
        }
        let catalog = Catalog::load(&self.pager)?;
        let _ = self.catalog.set(catalog);
        Ok(self.catalog.get().expect("catalog initialized"))
    }

    pub fn pager(&self) -> &Pager {
        &self.pager
    }

    /// Pages touched since this handle was opened.
    pub fn pages_read(&self) -> u64 {
        self.pager.pages_read()
    }
}
