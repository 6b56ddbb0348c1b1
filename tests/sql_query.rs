mod util;

use liteql::{Db, ValueRef};
use rusqlite::params;

fn sample_db() -> tempfile::NamedTempFile {
    util::make_db(|conn| {
        conn.execute_batch(
            "CREATE TABLE apples (id integer primary key, name text, color text);
             CREATE TABLE oranges (id integer primary key, name text, description text);",
        )
        .unwrap();
        let apples = [
            ("Granny Smith", "Light Green"),
            ("Fuji", "Red"),
            ("Honeycrisp", "Blush Red"),
            ("Golden Delicious", "Yellow"),
        ];
        for (name, color) in apples {
            conn.execute("INSERT INTO apples (name, color) VALUES (?1, ?2)", params![name, color])
                .unwrap();
        }
        let oranges = [
            ("Mandarin", "great for snacking"),
            ("Tangelo", "sweet and tart"),
            ("Tangerine", "great for snacking"),
            ("Clementine", "usually seedless"),
            ("Valencia Orange", "best for juicing"),
            ("Navel Orange", "sweet with slight bitterness"),
        ];
        for (name, description) in oranges {
            conn.execute(
                "INSERT INTO oranges (name, description) VALUES (?1, ?2)",
                params![name, description],
            )
            .unwrap();
        }
    })
}

#[test]
fn dbinfo_reports_page_size_and_table_count() {
    let file = sample_db();
    let db = Db::open(file.path()).expect("open db");
    let info = db.info().expect("dbinfo");
    assert_eq!(info.page_size, 4096);
    assert_eq!(info.table_count, 2);
}

#[test]
fn tables_lists_user_tables_in_catalog_order() {
    let file = sample_db();
    let db = Db::open(file.path()).expect("open db");
    assert_eq!(db.table_names().expect("table names"), vec!["apples", "oranges"]);
}

#[test]
fn count_star_counts_rows() {
    let file = sample_db();
    let db = Db::open(file.path()).expect("open db");
    assert_eq!(util::collect_rows(&db, "SELECT COUNT(*) FROM apples"), vec!["4"]);
    assert_eq!(util::collect_rows(&db, "SELECT COUNT(*) FROM oranges"), vec!["6"]);
}

#[test]
fn count_star_with_filter_counts_matching_rows() {
    let file = sample_db();
    let db = Db::open(file.path()).expect("open db");
    assert_eq!(
        util::collect_rows(&db, "SELECT COUNT(*) FROM oranges WHERE description = 'great for snacking'"),
        vec!["2"]
    );
    assert_eq!(
        util::collect_rows(&db, "SELECT COUNT(*) FROM apples WHERE color = 'Mauve'"),
        vec!["0"]
    );
}

#[test]
fn single_column_projection_scans_in_rowid_order() {
    let file = sample_db();
    let db = Db::open(file.path()).expect("open db");
    assert_eq!(
        util::collect_rows(&db, "SELECT name FROM apples"),
        vec!["Granny Smith", "Fuji", "Honeycrisp", "Golden Delicious"]
    );
}

#[test]
fn equality_filter_projects_selected_columns() {
    let file = sample_db();
    let db = Db::open(file.path()).expect("open db");
    assert_eq!(
        util::collect_rows(&db, "SELECT name, color FROM apples WHERE color = 'Yellow'"),
        vec!["Golden Delicious|Yellow"]
    );
}

#[test]
fn filter_literals_are_not_case_folded() {
    let file = sample_db();
    let db = Db::open(file.path()).expect("open db");
    assert!(util::collect_rows(&db, "SELECT name FROM apples WHERE color = 'yellow'").is_empty());
}

#[test]
fn projection_follows_request_order_not_schema_order() {
    let file = sample_db();
    let db = Db::open(file.path()).expect("open db");
    assert_eq!(
        util::collect_rows(&db, "SELECT color, name FROM apples WHERE name = 'Fuji'"),
        vec!["Red|Fuji"]
    );
    assert_eq!(
        util::collect_rows(&db, "SELECT name, name FROM apples WHERE name = 'Fuji'"),
        vec!["Fuji|Fuji"]
    );
}

#[test]
fn rowid_alias_column_emits_the_rowid() {
    let file = sample_db();
    let db = Db::open(file.path()).expect("open db");
    assert_eq!(
        util::collect_rows(&db, "SELECT id, name FROM apples"),
        vec!["1|Granny Smith", "2|Fuji", "3|Honeycrisp", "4|Golden Delicious"]
    );
}

#[test]
fn integer_filter_on_rowid_alias_is_a_point_lookup() {
    let file = sample_db();
    let db = Db::open(file.path()).expect("open db");
    assert_eq!(util::collect_rows(&db, "SELECT name FROM apples WHERE id = 2"), vec!["Fuji"]);
    assert!(util::collect_rows(&db, "SELECT name FROM apples WHERE id = 99").is_empty());
    assert!(util::collect_rows(&db, "SELECT name FROM apples WHERE id = 'Fuji'").is_empty());
}

#[test]
fn wildcard_projects_all_columns_with_alias_substituted() {
    let file = sample_db();
    let db = Db::open(file.path()).expect("open db");
    assert_eq!(
        util::collect_rows(&db, "SELECT * FROM apples WHERE id = 3"),
        vec!["3|Honeycrisp|Blush Red"]
    );
}

#[test]
fn limit_caps_emitted_rows() {
    let file = sample_db();
    let db = Db::open(file.path()).expect("open db");
    assert_eq!(
        util::collect_rows(&db, "SELECT name FROM apples LIMIT 2"),
        vec!["Granny Smith", "Fuji"]
    );
    assert!(util::collect_rows(&db, "SELECT name FROM apples LIMIT 0").is_empty());
    assert_eq!(util::collect_rows(&db, "SELECT name FROM apples LIMIT 10").len(), 4);
}

#[test]
fn identifiers_are_case_insensitive() {
    let file = sample_db();
    let db = Db::open(file.path()).expect("open db");
    assert_eq!(
        util::collect_rows(&db, "SELECT NAME FROM Apples WHERE COLOR = 'Red'"),
        vec!["Fuji"]
    );
}

#[test]
fn schema_table_is_queryable() {
    let file = sample_db();
    let db = Db::open(file.path()).expect("open db");
    assert_eq!(
        util::collect_rows(&db, "SELECT name FROM sqlite_schema"),
        vec!["apples", "oranges"]
    );
    assert_eq!(
        util::collect_rows(&db, "SELECT type, tbl_name FROM sqlite_master WHERE name = 'oranges'"),
        vec!["table|oranges"]
    );
}

#[test]
fn null_columns_render_empty() {
    let file = util::make_db(|conn| {
        conn.execute_batch(
            "CREATE TABLE t (id INTEGER PRIMARY KEY, a TEXT, b TEXT);
             INSERT INTO t (a, b) VALUES (NULL, 'x');",
        )
        .unwrap();
    });
    let db = Db::open(file.path()).expect("open db");
    assert_eq!(util::collect_rows(&db, "SELECT a, b FROM t"), vec!["|x"]);
}

#[test]
fn non_utf8_text_passes_through() {
    let file = util::make_db(|conn| {
        conn.execute_batch(
            "CREATE TABLE t (id INTEGER PRIMARY KEY, v TEXT);
             INSERT INTO t (v) VALUES (CAST(X'66806F' AS TEXT));",
        )
        .unwrap();
    });
    let db = Db::open(file.path()).expect("open db");

    let mut bytes = Vec::new();
    db.execute_sql("SELECT v FROM t", |row| {
        if let Some(ValueRef::Text(value)) = row.get(0) {
            bytes.extend_from_slice(value);
        }
        Ok(())
    })
    .expect("select non-utf8 text");
    assert_eq!(bytes, vec![0x66, 0x80, 0x6F]);
    assert!(String::from_utf8(bytes).is_err(), "bytes must pass through unmodified");
}

#[test]
fn output_matches_rusqlite() {
    let file = sample_db();
    let db = Db::open(file.path()).expect("open db");

    let conn = rusqlite::Connection::open(file.path()).expect("open with rusqlite");
    let mut stmt = conn.prepare("SELECT name, color FROM apples").expect("prepare");
    let expected: Vec<String> = stmt
        .query_map([], |row| {
            Ok(format!("{}|{}", row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })
        .expect("query")
        .map(|r| r.expect("row"))
        .collect();

    assert_eq!(util::collect_rows(&db, "SELECT name, color FROM apples"), expected);
}
