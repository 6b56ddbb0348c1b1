use std::io::{self, Write};
use std::process;

use liteql::{Command, Db, RowView, ValueRef, parse_command};

fn main() {
    let mut args = std::env::args().skip(1);
    let (Some(path), Some(command)) = (args.next(), args.next()) else {
        usage();
    };
    if args.next().is_some() {
        usage();
    }

    if let Err(err) = run(&path, &command) {
        eprintln!("Error: {err}");
        process::exit(1);
    }
}

fn run(path: &str, input: &str) -> liteql::Result<()> {
    let db = Db::open(path)?;
    let stdout = io::stdout();
    let mut out = stdout.lock();

    match parse_command(input)? {
        Command::DbInfo => {
            let info = db.info()?;
            writeln!(out, "database page size: {}", info.page_size)?;
            writeln!(out, "number of tables: {}", info.table_count)?;
        }
        Command::Tables => {
            writeln!(out, "{}", db.table_names()?.join(" "))?;
        }
        Command::Select(stmt) => {
            db.select(&stmt, |row| {
                write_row(&mut out, row)?;
                Ok(())
            })?;
        }
    }

    out.flush()?;
    Ok(())
}

/// Columns joined by `|`, one line per row. Text and blob values pass
/// through byte-for-byte; NULL renders as the empty string.
fn write_row(out: &mut impl Write, row: RowView<'_>) -> io::Result<()> {
    for (idx, value) in row.iter().enumerate() {
        if idx > 0 {
            out.write_all(b"|")?;
        }
        match value {
            ValueRef::Null => {}
            ValueRef::Integer(value) => write!(out, "{value}")?,
            ValueRef::Real(value) => write!(out, "{value}")?,
            ValueRef::Text(bytes) | ValueRef::Blob(bytes) => out.write_all(bytes)?,
        }
    }
    out.write_all(b"\n")
}

fn usage() -> ! {
    eprintln!("Usage: liteql <database_path> <command>");
    eprintln!("  <command> is .dbinfo, .tables, or a SELECT statement");
    process::exit(1);
}
