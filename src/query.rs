//! Query execution: plan selection, filtering, projection, and row emission.
//!
//! A select resolves its columns against the table's creation SQL, then runs
//! one of four access paths: a full table scan with a residual filter, a
//! direct row-id lookup (equality filter on the row-id alias column), an
//! index-assisted fetch (equality filter on the leading column of an index),
//! or nothing at all when the filter can never match.

use smallvec::SmallVec;

use crate::catalog::Catalog;
use crate::error::{Error, Result};
use crate::index;
use crate::pager::{PageId, Pager};
use crate::record::{self, RowView, ValueRef};
use crate::schema;
use crate::sql::{Filter, Literal, Projection, SelectStmt};
use crate::table;

/// Column names of the schema table itself.
const SCHEMA_TABLE_COLUMNS: [&str; 5] = ["type", "name", "tbl_name", "rootpage", "sql"];

type Cols = SmallVec<[u16; 8]>;

struct Target {
    root: PageId,
    /// Column names in declaration order, lowercased.
    columns: Vec<String>,
    /// Column aliasing the row-id; its emitted value is the cell's row-id.
    rowid_alias: Option<usize>,
}

enum Plan {
    FullScan,
    RowidLookup(i64),
    IndexLookup(PageId),
    /// The filter can never match (e.g. a text literal against the row-id).
    Empty,
}

/// Run a select, invoking `f` once per emitted row with the projected values
/// in request order.
pub fn run_select<F>(pager: &Pager, catalog: &Catalog, stmt: &SelectStmt, mut f: F) -> Result<()>
where
    F: FnMut(RowView<'_>) -> Result<()>,
{
    let target = resolve_target(catalog, &stmt.table)?;

    let out_cols: Cols = match &stmt.projection {
        Projection::All => (0..target.columns.len() as u16).collect(),
        Projection::Columns(names) => {
            let mut cols = Cols::new();
            for name in names {
                cols.push(resolve_column(&target, name)?);
            }
            cols
        }
        Projection::CountStar => Cols::new(),
    };

    let filter = stmt.filter.as_ref();
    let filter_col = match filter {
        Some(filter) => Some(resolve_column(&target, &filter.column)?),
        None => None,
    };

    if stmt.limit == Some(0) {
        return Ok(());
    }

    let plan = choose_plan(catalog, &target, stmt, filter_col);

    if matches!(stmt.projection, Projection::CountStar) {
        let count = count_matching(pager, &target, &plan, filter, filter_col)?;
        return f(RowView::new(&[ValueRef::Integer(count)]));
    }

    // Columns that must be decoded from each record: the projection plus the
    // filter column, ascending and deduplicated.
    let mut needed: Cols = out_cols.clone();
    if let Some(col) = filter_col {
        needed.push(col);
    }
    needed.sort_unstable();
    needed.dedup();

    let out_pos: SmallVec<[usize; 8]> = out_cols
        .iter()
        .map(|col| needed.binary_search(col).expect("projection column is in the needed set"))
        .collect();
    let filter_pos =
        filter_col.map(|col| needed.binary_search(&col).expect("filter column is in the needed set"));

    let alias = target.rowid_alias;
    let mut remaining = stmt.limit.unwrap_or(usize::MAX);

    match plan {
        Plan::Empty => Ok(()),
        Plan::FullScan => table::scan_table_project_until(pager, target.root, &needed, |rowid, row| {
            if let (Some(pos), Some(filter)) = (filter_pos, filter) {
                let is_alias = alias == filter_col.map(usize::from);
                let value = row.get(pos).unwrap_or(ValueRef::Null);
                if !filter_matches(&filter.value, is_alias, rowid, value) {
                    return Ok(None);
                }
            }
            emit_row(&out_cols, &out_pos, alias, rowid, row, &mut f)?;
            remaining -= 1;
            Ok(if remaining == 0 { Some(()) } else { None })
        })
        .map(|_| ()),
        Plan::RowidLookup(rowid) => {
            let Some(payload) = table::find_cell_payload(pager, target.root, rowid)? else {
                return Ok(());
            };
            let mut values = Vec::new();
            record::decode_record_project_into(payload, &needed, &mut values)?;
            emit_row(&out_cols, &out_pos, alias, rowid, RowView::new(&values), &mut f)
        }
        Plan::IndexLookup(index_root) => {
            let filter = filter.expect("index plans only exist for filtered queries");
            let mut rowids = Vec::new();
            index::scan_index(pager, index_root, literal_value_ref(&filter.value), &mut rowids)?;

            let mut values = Vec::new();
            for rowid in rowids {
                let Some(payload) = table::find_cell_payload(pager, target.root, rowid)? else {
                    return Err(Error::Corrupted("index references a missing row"));
                };
                record::decode_record_project_into(payload, &needed, &mut values)?;
                emit_row(&out_cols, &out_pos, alias, rowid, RowView::new(&values), &mut f)?;
                remaining -= 1;
                if remaining == 0 {
                    break;
                }
            }
            Ok(())
        }
    }
}

fn emit_row<F>(
    out_cols: &[u16],
    out_pos: &[usize],
    alias: Option<usize>,
    rowid: i64,
    row: RowView<'_>,
    f: &mut F,
) -> Result<()>
where
    F: FnMut(RowView<'_>) -> Result<()>,
{
    let mut out: SmallVec<[ValueRef<'_>; 8]> = SmallVec::with_capacity(out_cols.len());
    for (i, &col) in out_cols.iter().enumerate() {
        let value = if alias == Some(col as usize) {
            ValueRef::Integer(rowid)
        } else {
            row.get(out_pos[i]).unwrap_or(ValueRef::Null)
        };
        out.push(value);
    }
    f(RowView::new(&out))
}

fn count_matching(
    pager: &Pager,
    target: &Target,
    plan: &Plan,
    filter: Option<&Filter>,
    filter_col: Option<u16>,
) -> Result<i64> {
    let Some(filter) = filter else {
        let count = table::count_rows(pager, target.root)?;
        return i64::try_from(count).map_err(|_| Error::Corrupted("row count overflows i64"));
    };

    match plan {
        Plan::Empty => Ok(0),
        Plan::RowidLookup(rowid) => {
            Ok(i64::from(table::find_cell_payload(pager, target.root, *rowid)?.is_some()))
        }
        Plan::IndexLookup(index_root) => {
            let mut rowids = Vec::new();
            index::scan_index(pager, *index_root, literal_value_ref(&filter.value), &mut rowids)?;
            i64::try_from(rowids.len()).map_err(|_| Error::Corrupted("row count overflows i64"))
        }
        Plan::FullScan => {
            let col = filter_col.expect("filtered count resolves its column");
            let needed = [col];
            let is_alias = target.rowid_alias == Some(col as usize);
            let mut count = 0i64;
            table::scan_table_project_until::<_, ()>(pager, target.root, &needed, |rowid, row| {
                let value = row.get(0).unwrap_or(ValueRef::Null);
                if filter_matches(&filter.value, is_alias, rowid, value) {
                    count += 1;
                }
                Ok(None)
            })?;
            Ok(count)
        }
    }
}

fn choose_plan(
    catalog: &Catalog,
    target: &Target,
    stmt: &SelectStmt,
    filter_col: Option<u16>,
) -> Plan {
    let Some(filter) = &stmt.filter else {
        return Plan::FullScan;
    };
    let Some(col) = filter_col else {
        return Plan::FullScan;
    };

    if target.rowid_alias == Some(col as usize) {
        return match &filter.value {
            Literal::Integer(rowid) => Plan::RowidLookup(*rowid),
            Literal::Text(_) => Plan::Empty,
        };
    }

    let column_name = target.columns[col as usize].as_str();
    for entry in catalog.indexes_on(&stmt.table) {
        let Some(sql) = &entry.sql else { continue };
        let Some(cols) = schema::parse_index_columns(sql) else { continue };
        if cols.first().map(String::as_str) == Some(column_name)
            && let Some(root) = entry.root
        {
            return Plan::IndexLookup(root);
        }
    }

    Plan::FullScan
}

fn filter_matches(literal: &Literal, is_alias: bool, rowid: i64, value: ValueRef<'_>) -> bool {
    if is_alias {
        return matches!(literal, Literal::Integer(expected) if *expected == rowid);
    }
    match (literal, value) {
        (Literal::Text(expected), ValueRef::Text(bytes)) => expected.as_slice() == bytes,
        (Literal::Integer(expected), ValueRef::Integer(actual)) => *expected == actual,
        _ => false,
    }
}

fn literal_value_ref(literal: &Literal) -> ValueRef<'_> {
    match literal {
        Literal::Integer(value) => ValueRef::Integer(*value),
        Literal::Text(bytes) => ValueRef::Text(bytes.as_slice()),
    }
}

fn resolve_target(catalog: &Catalog, name: &str) -> Result<Target> {
    if name.eq_ignore_ascii_case("sqlite_schema") || name.eq_ignore_ascii_case("sqlite_master") {
        return Ok(Target {
            root: PageId::ROOT,
            columns: SCHEMA_TABLE_COLUMNS.iter().map(|s| s.to_string()).collect(),
            rowid_alias: None,
        });
    }

    let entry = catalog.table(name).ok_or_else(|| Error::TableNotFound(name.to_owned()))?;
    let root = entry.root.ok_or(Error::Corrupted("table entry has no root page"))?;
    let sql = entry.sql.as_deref().ok_or(Error::Corrupted("table entry has no creation sql"))?;

    let table_schema = schema::parse_table_schema(sql);
    if table_schema.columns.is_empty() {
        return Err(Error::Corrupted("table creation sql has no parsable columns"));
    }
    if table_schema.without_rowid {
        return Err(Error::SqlUnsupported(format!("{name} is a WITHOUT ROWID table")));
    }

    Ok(Target {
        root,
        columns: table_schema.columns,
        rowid_alias: table_schema.rowid_alias,
    })
}

fn resolve_column(target: &Target, name: &str) -> Result<u16> {
    let idx = target
        .columns
        .iter()
        .position(|col| col.eq_ignore_ascii_case(name))
        .ok_or_else(|| Error::ColumnNotFound(name.to_owned()))?;
    u16::try_from(idx).map_err(|_| Error::ColumnNotFound(name.to_owned()))
}
