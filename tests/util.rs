#![allow(dead_code)]

use std::path::Path;

use liteql::{Db, ValueRef};
use rusqlite::Connection;
use tempfile::NamedTempFile;

pub fn make_db<F: FnOnce(&Connection)>(f: F) -> NamedTempFile {
    let file = NamedTempFile::new().expect("create temp db file");
    init_db(file.path(), f);
    file
}

fn init_db<F: FnOnce(&Connection)>(path: &Path, f: F) {
    let conn = Connection::open(path).expect("open temp sqlite db");
    conn.execute_batch("PRAGMA journal_mode=DELETE; PRAGMA synchronous=OFF;")
        .expect("set sqlite pragmas");
    f(&conn);
    drop(conn);
}

/// Run a statement and render each row the way the shell does: columns
/// joined by `|`, NULL as the empty string.
pub fn collect_rows(db: &Db, sql: &str) -> Vec<String> {
    let mut rows = Vec::new();
    db.execute_sql(sql, |row| {
        let mut line = String::new();
        for (idx, value) in row.iter().enumerate() {
            if idx > 0 {
                line.push('|');
            }
            match value {
                ValueRef::Null => {}
                ValueRef::Integer(value) => line.push_str(&value.to_string()),
                ValueRef::Real(value) => line.push_str(&value.to_string()),
                ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
                    line.push_str(&String::from_utf8_lossy(bytes));
                }
            }
        }
        rows.push(line);
        Ok(())
    })
    .expect("execute sql");
    rows
}
