//! Command parsing: the two dot-commands plus a small SELECT subset.
//!
//! SELECT statements go through `sqlparser` and are then lowered onto
//! [`Command`]; any statement that parses but reaches outside the subset is
//! reported as unsupported with the offending input echoed.

use sqlparser::ast::{
    BinaryOperator as SqlBinaryOperator, Expr as SqlExpr, Function, FunctionArg, FunctionArgExpr,
    FunctionArguments, GroupByExpr, LimitClause, ObjectName, ObjectNamePart, Query as SqlQuery,
    Select, SelectItem, SetExpr, Statement, TableFactor, Value as SqlValue,
    WildcardAdditionalOptions,
};
use sqlparser::dialect::{GenericDialect, SQLiteDialect};
use sqlparser::parser::Parser;

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    DbInfo,
    Tables,
    Select(SelectStmt),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectStmt {
    pub table: String,
    pub projection: Projection,
    pub filter: Option<Filter>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    /// `SELECT *`
    All,
    /// Named columns, in request order.
    Columns(Vec<String>),
    /// `SELECT COUNT(*)`
    CountStar,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub column: String,
    pub value: Literal,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Integer(i64),
    /// A single-quoted byte string, compared byte-wise.
    Text(Vec<u8>),
}

pub fn parse_command(input: &str) -> Result<Command> {
    let trimmed = input.trim();

    if trimmed.starts_with('.') {
        if trimmed.eq_ignore_ascii_case(".dbinfo") {
            return Ok(Command::DbInfo);
        }
        if trimmed.eq_ignore_ascii_case(".tables") {
            return Ok(Command::Tables);
        }
        return Err(unsupported(trimmed));
    }

    let statement = parse_statement(trimmed)?;
    let Statement::Query(query) = statement else {
        return Err(unsupported(trimmed));
    };
    lower_query(*query, trimmed).map(Command::Select)
}

fn parse_statement(sql: &str) -> Result<Statement> {
    let sqlite = SQLiteDialect {};
    let statements = Parser::parse_sql(&sqlite, sql).or_else(|_| {
        let generic = GenericDialect {};
        Parser::parse_sql(&generic, sql)
    });
    let mut statements = statements.map_err(|_| Error::SqlParse(sql.to_owned()))?;
    if statements.len() != 1 {
        return Err(unsupported(sql));
    }
    Ok(statements.remove(0))
}

fn lower_query(query: SqlQuery, sql: &str) -> Result<SelectStmt> {
    if query.with.is_some()
        || query.order_by.is_some()
        || query.fetch.is_some()
        || !query.locks.is_empty()
        || query.for_clause.is_some()
        || query.settings.is_some()
        || query.format_clause.is_some()
    {
        return Err(unsupported(sql));
    }

    let limit = lower_limit(query.limit_clause.as_ref(), sql)?;

    let SetExpr::Select(select) = *query.body else {
        return Err(unsupported(sql));
    };
    validate_select_shape(&select, sql)?;

    let table = lower_from(&select, sql)?;
    let projection = lower_projection(&select.projection, sql)?;
    let filter = select.selection.as_ref().map(|expr| lower_filter(expr, sql)).transpose()?;

    Ok(SelectStmt { table, projection, filter, limit })
}

fn validate_select_shape(select: &Select, sql: &str) -> Result<()> {
    if select.distinct.is_some()
        || select.top.is_some()
        || select.into.is_some()
        || !select.lateral_views.is_empty()
        || select.prewhere.is_some()
        || !select.cluster_by.is_empty()
        || !select.distribute_by.is_empty()
        || !select.sort_by.is_empty()
        || select.having.is_some()
        || !select.named_window.is_empty()
        || select.qualify.is_some()
        || select.value_table_mode.is_some()
        || !group_by_is_empty(&select.group_by)
    {
        return Err(unsupported(sql));
    }
    Ok(())
}

fn group_by_is_empty(group_by: &GroupByExpr) -> bool {
    matches!(group_by, GroupByExpr::Expressions(exprs, modifiers) if exprs.is_empty() && modifiers.is_empty())
}

fn lower_from(select: &Select, sql: &str) -> Result<String> {
    let [table_with_joins] = select.from.as_slice() else {
        return Err(unsupported(sql));
    };
    if !table_with_joins.joins.is_empty() {
        return Err(unsupported(sql));
    }

    let TableFactor::Table { name, alias, args, with_hints, .. } = &table_with_joins.relation
    else {
        return Err(unsupported(sql));
    };
    if alias.is_some() || args.is_some() || !with_hints.is_empty() {
        return Err(unsupported(sql));
    }

    object_name_last_ident(name).ok_or_else(|| unsupported(sql))
}

fn lower_projection(items: &[SelectItem], sql: &str) -> Result<Projection> {
    if let [SelectItem::UnnamedExpr(SqlExpr::Function(fun))] = items {
        return if is_count_star(fun) {
            Ok(Projection::CountStar)
        } else {
            Err(unsupported(sql))
        };
    }

    if let [SelectItem::Wildcard(options)] = items {
        validate_wildcard_options(options, sql)?;
        return Ok(Projection::All);
    }

    let mut columns = Vec::with_capacity(items.len());
    for item in items {
        match item {
            SelectItem::UnnamedExpr(SqlExpr::Identifier(ident)) => {
                columns.push(ident.value.clone());
            }
            _ => return Err(unsupported(sql)),
        }
    }
    if columns.is_empty() {
        return Err(unsupported(sql));
    }
    Ok(Projection::Columns(columns))
}

fn validate_wildcard_options(options: &WildcardAdditionalOptions, sql: &str) -> Result<()> {
    if options.opt_ilike.is_some()
        || options.opt_exclude.is_some()
        || options.opt_except.is_some()
        || options.opt_replace.is_some()
        || options.opt_rename.is_some()
    {
        return Err(unsupported(sql));
    }
    Ok(())
}

fn is_count_star(fun: &Function) -> bool {
    let is_count = object_name_last_ident(&fun.name)
        .is_some_and(|name| name.eq_ignore_ascii_case("count"));
    if !is_count
        || fun.over.is_some()
        || fun.filter.is_some()
        || fun.null_treatment.is_some()
        || !fun.within_group.is_empty()
    {
        return false;
    }

    let FunctionArguments::List(list) = &fun.args else {
        return false;
    };
    list.duplicate_treatment.is_none()
        && list.clauses.is_empty()
        && matches!(list.args.as_slice(), [FunctionArg::Unnamed(FunctionArgExpr::Wildcard)])
}

fn lower_filter(expr: &SqlExpr, sql: &str) -> Result<Filter> {
    match expr {
        SqlExpr::Nested(inner) => lower_filter(inner, sql),
        SqlExpr::BinaryOp { left, op: SqlBinaryOperator::Eq, right } => {
            let SqlExpr::Identifier(ident) = left.as_ref() else {
                return Err(unsupported(sql));
            };
            let value = lower_literal(right, sql)?;
            Ok(Filter { column: ident.value.clone(), value })
        }
        _ => Err(unsupported(sql)),
    }
}

fn lower_literal(expr: &SqlExpr, sql: &str) -> Result<Literal> {
    let SqlExpr::Value(value) = expr else {
        return Err(unsupported(sql));
    };
    match &value.value {
        SqlValue::SingleQuotedString(text) => Ok(Literal::Text(text.clone().into_bytes())),
        SqlValue::Number(raw, _) if !raw.contains(['.', 'e', 'E']) => {
            raw.parse::<i64>().map(Literal::Integer).map_err(|_| unsupported(sql))
        }
        _ => Err(unsupported(sql)),
    }
}

fn lower_limit(limit_clause: Option<&LimitClause>, sql: &str) -> Result<Option<usize>> {
    let Some(clause) = limit_clause else {
        return Ok(None);
    };

    match clause {
        LimitClause::LimitOffset { limit, offset, limit_by } => {
            if offset.is_some() || !limit_by.is_empty() {
                return Err(unsupported(sql));
            }
            let Some(expr) = limit else {
                return Ok(None);
            };
            let SqlExpr::Value(value) = expr else {
                return Err(unsupported(sql));
            };
            let SqlValue::Number(raw, _) = &value.value else {
                return Err(unsupported(sql));
            };
            raw.parse::<usize>().map(Some).map_err(|_| unsupported(sql))
        }
        _ => Err(unsupported(sql)),
    }
}

fn object_name_last_ident(name: &ObjectName) -> Option<String> {
    match name.0.last()? {
        ObjectNamePart::Identifier(ident) => Some(ident.value.clone()),
        _ => None,
    }
}

fn unsupported(sql: &str) -> Error {
    Error::SqlUnsupported(sql.to_owned())
}
