// Server-side processing for paginated, searchable, sortable tables.
//
// A handler describes the columns it wants (source column, output key,
// optional formatter), hands over the parsed `DataRequest` and gets back the
// `{draw, recordsTotal, recordsFiltered, data}` envelope the table widget
// expects. Every user supplied string is bound as a parameter; only the
// validated identifiers in `ColumnSpec`, the table and the primary key are
// written into the statement text.

pub mod format;
pub mod request;

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::time::Instant;

use serde::Serialize;
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::{QueryBuilder, Row, Sqlite, TypeInfo, ValueRef};
use thiserror::Error;

use crate::error::AdminError;
use crate::metrics;
use crate::sql::{like_contains, push_value, Ident, SqlValue, LIKE_ESCAPE};

pub use request::{DataRequest, OrderDirection};

// ── Cell values ──────────────────────────────────────────────────────

/// A single raw value as decoded from the driver.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl CellValue {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            CellValue::Null => None,
            CellValue::Integer(v) => Some(*v),
            CellValue::Real(v) => Some(*v as i64),
            CellValue::Text(s) => s.trim().parse().ok(),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Null => None,
            CellValue::Integer(v) => Some(*v as f64),
            CellValue::Real(v) => Some(*v),
            CellValue::Text(s) => s.trim().parse().ok(),
        }
    }

    fn decode(row: &SqliteRow, index: usize) -> Result<Self, sqlx::Error> {
        let type_name = {
            let raw = row.try_get_raw(index)?;
            if raw.is_null() {
                return Ok(CellValue::Null);
            }
            raw.type_info().name().to_string()
        };
        let value = match type_name.as_str() {
            "INTEGER" | "BOOLEAN" => CellValue::Integer(row.try_get_unchecked(index)?),
            "REAL" => CellValue::Real(row.try_get_unchecked(index)?),
            _ => CellValue::Text(row.try_get_unchecked(index)?),
        };
        Ok(value)
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Null => Ok(()),
            CellValue::Integer(v) => write!(f, "{v}"),
            CellValue::Real(v) => write!(f, "{v}"),
            CellValue::Text(s) => f.write_str(s),
        }
    }
}

/// All selected values of one fetched row, keyed by source column.
#[derive(Debug, Clone, Default)]
pub struct RowValues {
    cells: HashMap<String, CellValue>,
}

impl RowValues {
    pub fn get(&self, column: &str) -> Option<&CellValue> {
        self.cells.get(column)
    }

    pub fn integer(&self, column: &str) -> Option<i64> {
        self.get(column).and_then(CellValue::as_i64)
    }

    pub fn insert(&mut self, column: impl Into<String>, value: CellValue) {
        self.cells.insert(column.into(), value);
    }
}

// ── Column specs ─────────────────────────────────────────────────────

/// Formatter failure for one cell.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct FormatError(pub String);

/// Renders one raw cell, with the whole row available for cross-column cells.
pub type Formatter = fn(&CellValue, &RowValues) -> Result<String, FormatError>;

/// One output column: where it comes from, what it is called in the
/// response, and how it is rendered.
#[derive(Clone, Copy)]
pub struct ColumnSpec<'a> {
    pub source: &'a str,
    pub output_key: &'a str,
    pub searchable: bool,
    pub formatter: Option<Formatter>,
}

impl<'a> ColumnSpec<'a> {
    pub fn new(source: &'a str, output_key: &'a str) -> Self {
        Self {
            source,
            output_key,
            searchable: true,
            formatter: None,
        }
    }

    pub fn formatted(mut self, formatter: Formatter) -> Self {
        self.formatter = Some(formatter);
        self
    }

    pub fn not_searchable(mut self) -> Self {
        self.searchable = false;
        self
    }

    fn render(&self, row: &RowValues) -> Result<String, FormatError> {
        let raw = row.get(self.source).unwrap_or(&CellValue::Null);
        match self.formatter {
            Some(formatter) => formatter(raw, row),
            None => Ok(raw.to_string()),
        }
    }
}

impl fmt::Debug for ColumnSpec<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColumnSpec")
            .field("source", &self.source)
            .field("output_key", &self.output_key)
            .field("searchable", &self.searchable)
            .field("formatted", &self.formatter.is_some())
            .finish()
    }
}

// ── Base filter ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
}

impl CompareOp {
    fn as_sql(self) -> &'static str {
        match self {
            CompareOp::Eq => " = ",
            CompareOp::Ne => " != ",
        }
    }
}

/// A caller-side predicate applied before any user search.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition<'a> {
    pub column: &'a str,
    pub op: CompareOp,
    pub value: SqlValue,
}

impl<'a> Condition<'a> {
    pub fn eq(column: &'a str, value: impl Into<SqlValue>) -> Self {
        Self {
            column,
            op: CompareOp::Eq,
            value: value.into(),
        }
    }

    pub fn ne(column: &'a str, value: impl Into<SqlValue>) -> Self {
        Self {
            column,
            op: CompareOp::Ne,
            value: value.into(),
        }
    }
}

// ── Response ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DataResponse {
    pub draw: i64,
    pub records_total: u64,
    pub records_filtered: u64,
    pub data: Vec<BTreeMap<String, String>>,
}

// ── Filter building ──────────────────────────────────────────────────

#[derive(Debug, Clone)]
enum Clause {
    Compare {
        column: String,
        op: CompareOp,
        value: SqlValue,
    },
    AnyLike {
        columns: Vec<String>,
        pattern: String,
    },
    Like {
        column: String,
        pattern: String,
    },
}

#[derive(Debug, Clone, Default)]
struct FilterSet {
    clauses: Vec<Clause>,
}

impl FilterSet {
    fn base(conditions: &[Condition<'_>]) -> Result<Self, AdminError> {
        let clauses = conditions
            .iter()
            .map(|c| {
                Ok(Clause::Compare {
                    column: Ident::new(c.column)?.quoted(),
                    op: c.op,
                    value: c.value.clone(),
                })
            })
            .collect::<Result<Vec<_>, AdminError>>()?;
        Ok(Self { clauses })
    }

    /// Extend the base filter with the global search group and the
    /// per-column searches of `request`. Empty terms add nothing.
    fn with_search(mut self, request: &DataRequest, columns: &[ColumnSpec<'_>]) -> Self {
        let searchable = |i: usize| {
            columns[i].searchable && request.column_searchable.get(i).copied().unwrap_or(true)
        };

        if !request.search_term.is_empty() {
            let columns = (0..columns.len())
                .filter(|&i| searchable(i))
                .map(|i| quote(columns[i].source))
                .collect();
            self.clauses.push(Clause::AnyLike {
                columns,
                pattern: like_contains(&request.search_term),
            });
        }

        for (i, term) in request.column_search.iter().enumerate() {
            if term.is_empty() || i >= columns.len() || !searchable(i) {
                continue;
            }
            self.clauses.push(Clause::Like {
                column: quote(columns[i].source),
                pattern: like_contains(term),
            });
        }
        self
    }

    fn push_where(&self, builder: &mut QueryBuilder<'_, Sqlite>) {
        for (i, clause) in self.clauses.iter().enumerate() {
            builder.push(if i == 0 { " WHERE " } else { " AND " });
            match clause {
                Clause::Compare { column, op, value } => {
                    builder.push(column).push(op.as_sql());
                    push_value(builder, value);
                }
                Clause::AnyLike { columns, pattern } => {
                    if columns.is_empty() {
                        builder.push("0");
                        continue;
                    }
                    builder.push("(");
                    for (j, column) in columns.iter().enumerate() {
                        if j > 0 {
                            builder.push(" OR ");
                        }
                        builder.push(column).push(" LIKE ");
                        builder.push_bind(pattern.clone()).push(LIKE_ESCAPE);
                    }
                    builder.push(")");
                }
                Clause::Like { column, pattern } => {
                    builder.push(column).push(" LIKE ");
                    builder.push_bind(pattern.clone()).push(LIKE_ESCAPE);
                }
            }
        }
    }
}

// Sources are validated once in `fetch_data` before any clause is built.
fn quote(source: &str) -> String {
    format!("\"{source}\"")
}

fn validate_columns(columns: &[ColumnSpec<'_>]) -> Result<(), AdminError> {
    let mut keys = std::collections::HashSet::new();
    for column in columns {
        Ident::new(column.source)?;
        if !keys.insert(column.output_key) {
            return Err(AdminError::validation(format!(
                "duplicate output key `{}`",
                column.output_key
            )));
        }
    }
    Ok(())
}

fn count_query<'a>(table: Ident<'_>, filter: &FilterSet) -> QueryBuilder<'a, Sqlite> {
    let mut builder = QueryBuilder::new("SELECT COUNT(*) FROM ");
    builder.push(table.quoted());
    filter.push_where(&mut builder);
    builder
}

fn select_query<'a>(
    request: &DataRequest,
    table: Ident<'_>,
    primary_key: Ident<'_>,
    columns: &[ColumnSpec<'_>],
    filter: &FilterSet,
) -> QueryBuilder<'a, Sqlite> {
    let mut selected: Vec<&str> = Vec::with_capacity(columns.len() + 1);
    for source in columns
        .iter()
        .map(|c| c.source)
        .chain(std::iter::once(primary_key.as_str()))
    {
        if !selected.contains(&source) {
            selected.push(source);
        }
    }

    let mut builder = QueryBuilder::new("SELECT ");
    for (i, source) in selected.iter().enumerate() {
        if i > 0 {
            builder.push(", ");
        }
        builder.push(quote(source));
    }
    builder.push(" FROM ").push(table.quoted());
    filter.push_where(&mut builder);

    // Out-of-range sort index falls back to the primary key.
    let order_source = usize::try_from(request.order_column)
        .ok()
        .and_then(|i| columns.get(i))
        .map(|c| c.source)
        .unwrap_or(primary_key.as_str());
    builder
        .push(" ORDER BY ")
        .push(quote(order_source))
        .push(request.order_direction.as_sql());
    if order_source != primary_key.as_str() {
        builder.push(", ").push(primary_key.quoted()).push(" ASC");
    }

    let offset = i64::try_from(request.start).unwrap_or(i64::MAX);
    if request.length >= 0 {
        builder.push(" LIMIT ").push_bind(request.length);
        builder.push(" OFFSET ").push_bind(offset);
    } else if offset > 0 {
        // SQLite only accepts OFFSET after a LIMIT; -1 means no limit.
        builder.push(" LIMIT -1 OFFSET ").push_bind(offset);
    }
    builder
}

async fn run_count(pool: &SqlitePool, mut builder: QueryBuilder<'_, Sqlite>) -> Result<u64, AdminError> {
    let statement = builder.sql().to_string();
    let count: i64 = builder
        .build_query_scalar()
        .fetch_one(pool)
        .await
        .map_err(|e| AdminError::query(statement, e))?;
    Ok(count.max(0) as u64)
}

fn render_row(
    row: &SqliteRow,
    columns: &[ColumnSpec<'_>],
    statement: &str,
) -> Result<BTreeMap<String, String>, AdminError> {
    let mut values = RowValues::default();
    for (index, column) in row.columns().iter().enumerate() {
        let cell = CellValue::decode(row, index).map_err(|e| AdminError::query(statement, e))?;
        values.insert(sqlx::Column::name(column), cell);
    }

    let mut out = BTreeMap::new();
    for column in columns {
        let rendered = column.render(&values).map_err(|e| AdminError::Query {
            statement: statement.to_string(),
            message: format!("formatter for `{}` failed: {e}", column.output_key),
            source: None,
        })?;
        out.insert(column.output_key.to_string(), rendered);
    }
    Ok(out)
}

/// Run the count, filtered count and page fetch for one table request.
pub async fn fetch_data(
    pool: &SqlitePool,
    request: &DataRequest,
    table: &str,
    primary_key: &str,
    columns: &[ColumnSpec<'_>],
    base_filter: &[Condition<'_>],
) -> Result<DataResponse, AdminError> {
    let started = Instant::now();
    let table = Ident::new(table)?;
    let primary_key = Ident::new(primary_key)?;
    validate_columns(columns)?;

    let base = FilterSet::base(base_filter)?;
    let effective = base.clone().with_search(request, columns);

    let records_total = run_count(pool, count_query(table, &base)).await?;
    // Counts run outside a shared snapshot; never report more filtered than total.
    let records_filtered = run_count(pool, count_query(table, &effective))
        .await?
        .min(records_total);

    let mut builder = select_query(request, table, primary_key, columns, &effective);
    let statement = builder.sql().to_string();
    let rows = builder
        .build()
        .fetch_all(pool)
        .await
        .map_err(|e| AdminError::query(statement.as_str(), e))?;

    let data = rows
        .iter()
        .map(|row| render_row(row, columns, &statement))
        .collect::<Result<Vec<_>, _>>()?;

    metrics::TABLE_QUERIES_TOTAL
        .with_label_values(&[table.as_str()])
        .inc();
    metrics::TABLE_QUERY_DURATION_SECONDS
        .with_label_values(&[table.as_str()])
        .observe(started.elapsed().as_secs_f64());
    tracing::debug!(
        table = table.as_str(),
        records_total,
        records_filtered,
        rows = data.len(),
        "table query served"
    );

    Ok(DataResponse {
        draw: request.draw,
        records_total,
        records_filtered,
        data,
    })
}
