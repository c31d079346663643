// SQL building helpers: trusted identifiers, bound values, LIKE patterns and
// the generic insert/update writers used by the importer and the handlers.

use sqlx::{Executor, QueryBuilder, Sqlite};

use crate::error::AdminError;

/// A validated table, view or column name.
///
/// Only `[A-Za-z_][A-Za-z0-9_]*` is accepted, so the quoted form can be
/// pushed into a statement verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ident<'a>(&'a str);

impl<'a> Ident<'a> {
    pub fn new(name: &'a str) -> Result<Self, AdminError> {
        let mut chars = name.chars();
        let valid = match chars.next() {
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {
                chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
            }
            _ => false,
        };
        if valid {
            Ok(Self(name))
        } else {
            Err(AdminError::InvalidIdentifier(name.to_string()))
        }
    }

    pub fn as_str(&self) -> &'a str {
        self.0
    }

    pub fn quoted(&self) -> String {
        format!("\"{}\"", self.0)
    }
}

/// A value that is always sent as a bound statement parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::Integer(v)
    }
}

impl From<i32> for SqlValue {
    fn from(v: i32) -> Self {
        SqlValue::Integer(v as i64)
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        SqlValue::Real(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

pub fn push_value(builder: &mut QueryBuilder<'_, Sqlite>, value: &SqlValue) {
    match value {
        SqlValue::Null => builder.push_bind(None::<i64>),
        SqlValue::Integer(v) => builder.push_bind(*v),
        SqlValue::Real(v) => builder.push_bind(*v),
        SqlValue::Text(v) => builder.push_bind(v.clone()),
    };
}

/// Trailing clause for every LIKE built from [`like_contains`].
pub const LIKE_ESCAPE: &str = " ESCAPE '\\'";

/// Turn free text into a substring LIKE pattern, escaping `%`, `_` and `\`
/// so the text only ever matches literally.
pub fn like_contains(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// `INSERT INTO table (fields...) VALUES (?...)`, returning the new rowid.
pub async fn insert_row<'c, E>(
    executor: E,
    table: &str,
    fields: &[(&str, SqlValue)],
) -> Result<i64, AdminError>
where
    E: Executor<'c, Database = Sqlite>,
{
    if fields.is_empty() {
        return Err(AdminError::validation("insert requires at least one field"));
    }
    let table = Ident::new(table)?;

    let mut builder = QueryBuilder::<Sqlite>::new("INSERT INTO ");
    builder.push(table.quoted()).push(" (");
    for (i, (column, _)) in fields.iter().enumerate() {
        if i > 0 {
            builder.push(", ");
        }
        builder.push(Ident::new(column)?.quoted());
    }
    builder.push(") VALUES (");
    for (i, (_, value)) in fields.iter().enumerate() {
        if i > 0 {
            builder.push(", ");
        }
        push_value(&mut builder, value);
    }
    builder.push(")");

    let statement = builder.sql().to_string();
    let result = builder
        .build()
        .execute(executor)
        .await
        .map_err(|e| AdminError::query(statement, e))?;
    Ok(result.last_insert_rowid())
}

/// `UPDATE table SET fields... WHERE where_equals...`, returning the number
/// of affected rows.
pub async fn update_rows<'c, E>(
    executor: E,
    table: &str,
    fields: &[(&str, SqlValue)],
    where_equals: &[(&str, SqlValue)],
) -> Result<u64, AdminError>
where
    E: Executor<'c, Database = Sqlite>,
{
    if fields.is_empty() {
        return Err(AdminError::validation("update requires at least one field"));
    }
    if where_equals.is_empty() {
        return Err(AdminError::validation("update requires a WHERE condition"));
    }
    let table = Ident::new(table)?;

    let mut builder = QueryBuilder::<Sqlite>::new("UPDATE ");
    builder.push(table.quoted()).push(" SET ");
    for (i, (column, value)) in fields.iter().enumerate() {
        if i > 0 {
            builder.push(", ");
        }
        builder.push(Ident::new(column)?.quoted()).push(" = ");
        push_value(&mut builder, value);
    }
    builder.push(" WHERE ");
    for (i, (column, value)) in where_equals.iter().enumerate() {
        if i > 0 {
            builder.push(" AND ");
        }
        builder.push(Ident::new(column)?.quoted()).push(" = ");
        push_value(&mut builder, value);
    }

    let statement = builder.sql().to_string();
    let result = builder
        .build()
        .execute(executor)
        .await
        .map_err(|e| AdminError::query(statement, e))?;
    Ok(result.rows_affected())
}
