mod util;

use std::io::Write;

use liteql::{Db, Error};

fn sample_db() -> tempfile::NamedTempFile {
    util::make_db(|conn| {
        conn.execute_batch(
            "CREATE TABLE apples (id integer primary key, name text, color text);
             INSERT INTO apples (name, color) VALUES ('Fuji', 'Red');",
        )
        .unwrap();
    })
}

fn run(db: &Db, sql: &str) -> Error {
    db.execute_sql(sql, |_| Ok(())).expect_err("statement must fail")
}

#[test]
fn unknown_table_is_reported() {
    let file = sample_db();
    let db = Db::open(file.path()).expect("open db");
    match run(&db, "SELECT name FROM pears") {
        Error::TableNotFound(name) => assert_eq!(name, "pears"),
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(matches!(run(&db, "SELECT COUNT(*) FROM pears"), Error::TableNotFound(_)));
}

#[test]
fn unknown_column_is_reported() {
    let file = sample_db();
    let db = Db::open(file.path()).expect("open db");
    match run(&db, "SELECT taste FROM apples") {
        Error::ColumnNotFound(name) => assert_eq!(name, "taste"),
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(matches!(
        run(&db, "SELECT name FROM apples WHERE taste = 'sweet'"),
        Error::ColumnNotFound(_)
    ));
}

#[test]
fn unsupported_statements_echo_the_input() {
    let file = sample_db();
    let db = Db::open(file.path()).expect("open db");
    match run(&db, "SELECT name FROM apples ORDER BY name") {
        Error::SqlUnsupported(echoed) => assert!(echoed.contains("ORDER BY")),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn dot_commands_are_not_sql() {
    let file = sample_db();
    let db = Db::open(file.path()).expect("open db");
    assert!(matches!(run(&db, ".dbinfo"), Error::SqlUnsupported(_)));
}

#[test]
fn without_rowid_tables_are_unsupported() {
    let file = util::make_db(|conn| {
        conn.execute_batch(
            "CREATE TABLE kv (k TEXT PRIMARY KEY, v TEXT) WITHOUT ROWID;
             INSERT INTO kv VALUES ('a', 'b');",
        )
        .unwrap();
    });
    let db = Db::open(file.path()).expect("open db");
    assert!(matches!(run(&db, "SELECT v FROM kv"), Error::SqlUnsupported(_)));
}

#[test]
fn overflowing_rows_fail_the_query() {
    let file = util::make_db(|conn| {
        conn.execute_batch("CREATE TABLE blobs (id INTEGER PRIMARY KEY, body TEXT);").unwrap();
        conn.execute("INSERT INTO blobs (body) VALUES (?1)", [&"y".repeat(20_000)]).unwrap();
    });
    let db = Db::open(file.path()).expect("open db");
    assert!(matches!(run(&db, "SELECT body FROM blobs"), Error::OverflowNotSupported));
}

#[test]
fn non_database_file_is_rejected() {
    let mut file = tempfile::NamedTempFile::new().expect("create temp file");
    file.write_all(
        b"definitely not a database, padded out to well over one hundred bytes so that the \
          header parser runs to completion before rejecting the file contents",
    )
    .expect("write file");
    file.flush().expect("flush");

    let err = Db::open(file.path()).expect_err("open must fail");
    assert!(matches!(err, Error::Pager(liteql::pager::Error::InvalidMagic)), "{err:?}");
}

#[test]
fn short_file_is_rejected() {
    let mut file = tempfile::NamedTempFile::new().expect("create temp file");
    file.write_all(b"SQLite").expect("write file");
    file.flush().expect("flush");

    let err = Db::open(file.path()).expect_err("open must fail");
    assert!(matches!(err, Error::Pager(liteql::pager::Error::FileTooSmall)), "{err:?}");
}

#[test]
fn corrupt_page_type_is_rejected() {
    let file = sample_db();
    let mut corrupt = std::fs::read(file.path()).expect("read fixture");
    assert!(corrupt.len() > 4096, "fixture has at least two pages");
    // Page 2 is the apples table root; clobber its page-type byte.
    corrupt[4096] = 0x7F;
    let mut out = tempfile::NamedTempFile::new().expect("create temp file");
    out.write_all(&corrupt).expect("write corrupt copy");
    out.flush().expect("flush");

    let db = Db::open(out.path()).expect("open db");
    let err = run(&db, "SELECT name FROM apples");
    assert!(matches!(err, Error::UnsupportedPageType(0x7F)), "{err:?}");
}
