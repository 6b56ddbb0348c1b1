//! Parsing of the creation SQL stored in the schema table.
//!
//! Column lists are recovered textually: the parenthesised body is split on
//! top-level commas and the first identifier of each part is the column name.
//! Quoting (`'`, `"`, `` ` ``, `[]`) and nested parentheses are honored.

#[derive(Clone, Debug)]
pub(crate) struct TableSchema {
    /// Column names in declaration order, lowercased.
    pub(crate) columns: Vec<String>,
    /// Index of the `INTEGER PRIMARY KEY` column, which aliases the row-id.
    pub(crate) rowid_alias: Option<usize>,
    pub(crate) without_rowid: bool,
}

pub(crate) fn parse_table_schema(sql: &str) -> TableSchema {
    let without_rowid = contains_token_sequence(sql, &["WITHOUT", "ROWID"]);
    let Some(inner) = extract_parenthesized(sql) else {
        return TableSchema { columns: Vec::new(), rowid_alias: None, without_rowid };
    };

    let mut columns = Vec::new();
    let mut rowid_alias = None;
    for part in split_top_level(inner) {
        if is_table_constraint(part) {
            continue;
        }
        if let Some((name, integer_primary)) = parse_column_def(part) {
            if integer_primary && rowid_alias.is_none() {
                rowid_alias = Some(columns.len());
            }
            columns.push(name);
        }
    }
    TableSchema { columns, rowid_alias, without_rowid }
}

/// Indexed column names (lowercased) from `CREATE INDEX ... ON t (cols)`.
/// Partial indexes return `None`: their entries cover only a subset of rows.
pub(crate) fn parse_index_columns(sql: &str) -> Option<Vec<String>> {
    if contains_token(sql, "WHERE") {
        return None;
    }

    let paren_start = find_on_paren(sql)?;
    let inner = extract_parenthesized_at(sql, paren_start)?;
    let mut cols = Vec::new();
    for part in split_top_level(inner) {
        let (name, _) = parse_identifier_span(part)?;
        cols.push(name.to_ascii_lowercase());
    }
    Some(cols)
}

fn parse_column_def(part: &str) -> Option<(String, bool)> {
    let (name, end) = parse_identifier_span(part)?;
    let name = name.to_ascii_lowercase();
    let rest = part[end..].trim_start();
    let (type_name, rest) = parse_optional_type(rest);
    let integer_primary = type_name.as_deref() == Some("INTEGER")
        && contains_token_sequence(rest, &["PRIMARY", "KEY"]);
    Some((name, integer_primary))
}

fn parse_optional_type(rest: &str) -> (Option<String>, &str) {
    let Some((token, end)) = parse_identifier_span(rest) else {
        return (None, rest);
    };
    let upper = token.to_ascii_uppercase();
    if is_constraint_keyword(&upper) {
        return (None, rest);
    }
    (Some(upper), rest[end..].trim_start())
}

fn is_table_constraint(part: &str) -> bool {
    let word = first_word(part);
    matches!(
        word.as_deref(),
        Some("CONSTRAINT") | Some("PRIMARY") | Some("UNIQUE") | Some("CHECK") | Some("FOREIGN")
    )
}

fn is_constraint_keyword(token: &str) -> bool {
    matches!(
        token,
        "CONSTRAINT"
            | "PRIMARY"
            | "UNIQUE"
            | "NOT"
            | "NULL"
            | "CHECK"
            | "DEFAULT"
            | "COLLATE"
            | "REFERENCES"
            | "GENERATED"
            | "AS"
            | "STORED"
            | "VIRTUAL"
            | "ON"
            | "AUTOINCREMENT"
    )
}

fn first_word(part: &str) -> Option<String> {
    let bytes = part.as_bytes();
    let mut i = 0usize;
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    if i >= bytes.len() || !is_ident_start(bytes[i]) {
        return None;
    }
    let start = i;
    while i < bytes.len() && is_ident_char(bytes[i]) {
        i += 1;
    }
    Some(part[start..i].to_ascii_uppercase())
}

/// First identifier of `part` (possibly quoted, possibly `db.`-qualified) and
/// the byte offset just past it.
fn parse_identifier_span(part: &str) -> Option<(String, usize)> {
    let bytes = part.as_bytes();
    let mut i = 0usize;
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    if i >= bytes.len() || bytes[i] == b'(' {
        return None;
    }

    if matches!(bytes[i], b'"' | b'`' | b'[') {
        let end = skip_quoted(bytes, i)?;
        let inner = unquote(&part[i..end]);
        return Some((strip_qualifier(&inner), end));
    }

    let start = i;
    while i < bytes.len()
        && !bytes[i].is_ascii_whitespace()
        && !matches!(bytes[i], b'(' | b',' | b')')
    {
        i += 1;
    }
    if start == i {
        return None;
    }
    Some((strip_qualifier(&part[start..i]), i))
}

fn unquote(quoted: &str) -> String {
    let inner = &quoted[1..quoted.len().saturating_sub(1).max(1)];
    match quoted.as_bytes()[0] {
        b'"' => inner.replace("\"\"", "\""),
        b'\'' => inner.replace("''", "'"),
        _ => inner.to_owned(),
    }
}

fn strip_qualifier(name: &str) -> String {
    match name.rsplit_once('.') {
        Some((_prefix, suffix)) => suffix.to_owned(),
        None => name.to_owned(),
    }
}

/// Split on commas that sit outside every quote and parenthesis.
fn split_top_level(input: &str) -> Vec<&str> {
    let bytes = input.as_bytes();
    let mut parts = Vec::new();
    let mut start = 0usize;
    let mut depth = 0u32;
    let mut i = 0usize;

    while i < bytes.len() {
        if let Some(next) = skip_quoted(bytes, i) {
            i = next;
            continue;
        }
        match bytes[i] {
            b'(' => depth += 1,
            b')' => depth = depth.saturating_sub(1),
            b',' if depth == 0 => {
                parts.push(input[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
        i += 1;
    }
    if start < input.len() {
        parts.push(input[start..].trim());
    }
    parts
}

fn extract_parenthesized(sql: &str) -> Option<&str> {
    let bytes = sql.as_bytes();
    let mut i = 0usize;
    while i < bytes.len() {
        if let Some(next) = skip_quoted(bytes, i) {
            i = next;
            continue;
        }
        if bytes[i] == b'(' {
            return extract_parenthesized_at(sql, i);
        }
        i += 1;
    }
    None
}

fn extract_parenthesized_at(sql: &str, start: usize) -> Option<&str> {
    let bytes = sql.as_bytes();
    if start >= bytes.len() || bytes[start] != b'(' {
        return None;
    }

    let mut depth = 0u32;
    let mut i = start;
    while i < bytes.len() {
        if let Some(next) = skip_quoted(bytes, i) {
            i = next;
            continue;
        }
        match bytes[i] {
            b'(' => depth += 1,
            b')' => {
                if depth == 1 {
                    return Some(&sql[start + 1..i]);
                }
                depth = depth.saturating_sub(1);
            }
            _ => {}
        }
        i += 1;
    }
    None
}

/// Position of the column-list `(` following the `ON` keyword of a
/// `CREATE INDEX` statement.
fn find_on_paren(sql: &str) -> Option<usize> {
    let bytes = sql.as_bytes();
    let mut i = 0usize;
    let mut seen_on = false;

    while i < bytes.len() {
        if let Some(next) = skip_quoted(bytes, i) {
            i = next;
            continue;
        }
        if bytes[i] == b'(' && seen_on {
            return Some(i);
        }
        if !seen_on && is_ident_start(bytes[i]) {
            let start = i;
            i += 1;
            while i < bytes.len() && is_ident_char(bytes[i]) {
                i += 1;
            }
            if sql[start..i].eq_ignore_ascii_case("ON") {
                seen_on = true;
            }
            continue;
        }
        i += 1;
    }
    None
}

/// If `bytes[start]` opens a quote, the index just past the closing quote;
/// doubled `'`/`"` inside count as escapes. Unterminated quotes swallow the
/// rest of the input.
fn skip_quoted(bytes: &[u8], start: usize) -> Option<usize> {
    let close = match bytes[start] {
        b'\'' => b'\'',
        b'"' => b'"',
        b'`' => b'`',
        b'[' => b']',
        _ => return None,
    };
    let mut i = start + 1;
    while i < bytes.len() {
        if bytes[i] == close {
            if matches!(close, b'\'' | b'"') && bytes.get(i + 1) == Some(&close) {
                i += 2;
                continue;
            }
            return Some(i + 1);
        }
        i += 1;
    }
    Some(bytes.len())
}

fn contains_token(input: &str, token: &str) -> bool {
    contains_token_sequence(input, &[token])
}

fn contains_token_sequence(input: &str, seq: &[&str]) -> bool {
    let tokens = tokens_upper(input);
    if tokens.len() < seq.len() {
        return false;
    }
    for i in 0..=tokens.len() - seq.len() {
        if seq.iter().enumerate().all(|(j, s)| tokens[i + j] == *s) {
            return true;
        }
    }
    false
}

fn tokens_upper(input: &str) -> Vec<String> {
    let bytes = input.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0usize;
    while i < bytes.len() {
        if let Some(next) = skip_quoted(bytes, i) {
            i = next;
            continue;
        }
        if is_ident_start(bytes[i]) {
            let start = i;
            i += 1;
            while i < bytes.len() && is_ident_char(bytes[i]) {
                i += 1;
            }
            tokens.push(input[start..i].to_ascii_uppercase());
            continue;
        }
        i += 1;
    }
    tokens
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

fn is_ident_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}
