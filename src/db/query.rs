//! Filtered, paginated selects shared by every repository.

use super::Tx;
use crate::error::Error;
use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::{FromRow, Row, Sqlite};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    Asc,
    Desc,
}

impl Order {
    fn as_sql(&self) -> &'static str {
        match self {
            Order::Asc => "ASC",
            Order::Desc => "DESC",
        }
    }
}

/// Static description of an entity table.
#[derive(Debug)]
pub struct Table {
    pub name: &'static str,
    pub columns: &'static [&'static str],
    pub order: Order,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Text(String),
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

/// WHERE clauses and their positional arguments. Only [`Conditions::eq`]
/// touches either list, so the two never drift apart.
#[derive(Debug, Clone)]
pub struct Conditions {
    clauses: Vec<String>,
    args: Vec<Value>,
}

impl Conditions {
    pub fn new() -> Self {
        Self {
            clauses: vec!["1 = 1".to_string()],
            args: Vec::new(),
        }
    }

    pub fn eq(&mut self, column: &str, value: impl Into<Value>) -> &mut Self {
        self.clauses.push(format!("{column} = ?"));
        self.args.push(value.into());
        self
    }

    pub fn eq_opt<V: Into<Value>>(&mut self, column: &str, value: Option<V>) -> &mut Self {
        if let Some(value) = value {
            self.eq(column, value);
        }
        self
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }
}

impl Default for Conditions {
    fn default() -> Self {
        Self::new()
    }
}

/// LIMIT/OFFSET suffix. Non-positive values are left out; an offset alone
/// needs `LIMIT -1` because SQLite only accepts OFFSET after a LIMIT.
pub fn format_limit_offset(limit: i64, offset: i64) -> String {
    match (limit > 0, offset > 0) {
        (true, true) => format!("LIMIT {limit} OFFSET {offset}"),
        (true, false) => format!("LIMIT {limit}"),
        (false, true) => format!("LIMIT -1 OFFSET {offset}"),
        (false, false) => String::new(),
    }
}

fn bind_all<'q>(
    mut query: sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>,
    args: &'q [Value],
) -> sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>> {
    for arg in args {
        query = match arg {
            Value::Int(v) => query.bind(*v),
            Value::Text(v) => query.bind(v.as_str()),
        };
    }
    query
}

pub fn count_sql(table: &Table, conds: &Conditions) -> String {
    format!(
        "SELECT COUNT(*) FROM {} WHERE {}",
        table.name,
        conds.clauses.join(" AND ")
    )
}

pub fn select_sql(table: &Table, conds: &Conditions, limit: i64, offset: i64) -> String {
    let mut sql = format!(
        "SELECT {}, COUNT(*) OVER() AS total FROM {} WHERE {} ORDER BY id {}",
        table.columns.join(", "),
        table.name,
        conds.clauses.join(" AND "),
        table.order.as_sql(),
    );
    let window = format_limit_offset(limit, offset);
    if !window.is_empty() {
        sql.push(' ');
        sql.push_str(&window);
    }
    sql
}

/// Runs the select inside `tx` and returns the decoded rows together with
/// the total number of matching rows. The total comes from the window count;
/// a page past the last match carries no rows, so it is counted separately.
pub async fn find<T>(
    tx: &mut Tx,
    table: &Table,
    conds: &Conditions,
    limit: i64,
    offset: i64,
) -> Result<(Vec<T>, i64)>
where
    T: for<'r> FromRow<'r, SqliteRow> + Send + Unpin,
{
    let sql = select_sql(table, conds, limit, offset);
    let rows = bind_all(sqlx::query(&sql), conds.args())
        .fetch_all(tx.conn()?)
        .await
        .with_context(|| format!("could not query {}", table.name))?;

    let mut total = 0;
    let mut items = Vec::with_capacity(rows.len());
    for row in &rows {
        let item =
            T::from_row(row).with_context(|| format!("could not decode {} row", table.name))?;
        items.push(item);
        total = row.try_get::<i64, _>("total")?;
    }

    if rows.is_empty() && offset > 0 {
        let sql = count_sql(table, conds);
        total = bind_all(sqlx::query(&sql), conds.args())
            .fetch_one(tx.conn()?)
            .await
            .with_context(|| format!("could not count {}", table.name))?
            .try_get::<i64, _>(0)?;
    }
    Ok((items, total))
}

/// First row of a lookup, or a `not_found` error carrying `message`.
pub fn first<T>(items: Vec<T>, total: i64, message: &str) -> Result<T> {
    if total == 0 {
        return Err(Error::not_found(message).into());
    }
    items
        .into_iter()
        .next()
        .ok_or_else(|| Error::not_found(message).into())
}
