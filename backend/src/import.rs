// Bulk import of bot names from an uploaded AI settings file.
//
// Lines of the form `aiSettings.addBotName <name>` are extracted, checked
// against the target table and inserted inside a single transaction. A row
// that cannot be inserted is counted as skipped; only a failed begin or
// commit fails the batch. Concurrent imports run one after the other.

use std::path::{Path, PathBuf};

use regex::Regex;
use serde::Serialize;
use sqlx::sqlite::SqlitePool;
use uuid::Uuid;

use crate::error::AdminError;
use crate::metrics;
use crate::player::NAME_CHARSET;
use crate::sql::{insert_row, Ident, SqlValue};

pub const DEFAULT_KEYWORD: &str = "aiSettings.addBotName";

/// Anchored, case-insensitive `<keyword> <name>` matcher.
#[derive(Debug, Clone)]
pub struct NamePattern {
    regex: Regex,
}

impl NamePattern {
    pub fn new(keyword: &str) -> Result<Self, regex::Error> {
        let pattern = format!(
            r"(?i)^{}\s+(?P<name>[{}]+)$",
            regex::escape(keyword),
            NAME_CHARSET
        );
        Ok(Self {
            regex: Regex::new(&pattern)?,
        })
    }

    pub fn extract<'a>(&self, line: &'a str) -> Option<&'a str> {
        self.regex
            .captures(line)
            .and_then(|c| c.name("name"))
            .map(|m| m.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportCandidate {
    pub raw_line: String,
    pub extracted_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportResult {
    pub imported_count: u64,
    pub skipped_count: u64,
    pub errors: Vec<String>,
}

pub fn parse_candidates<S: AsRef<str>>(lines: &[S], pattern: &NamePattern) -> Vec<ImportCandidate> {
    lines
        .iter()
        .map(|line| {
            let line = line.as_ref();
            ImportCandidate {
                raw_line: line.to_string(),
                extracted_name: pattern.extract(line).map(str::to_string),
            }
        })
        .collect()
}

/// Insert every matched name that is not yet present in `table`.
///
/// Names are not deduplicated up front; a repeated name is skipped by the
/// existence check. Nothing is durable unless the final commit succeeds.
pub async fn import_names<S: AsRef<str>>(
    pool: &SqlitePool,
    lines: &[S],
    pattern: &NamePattern,
    table: &str,
    duplicate_column: &str,
    static_fields: &[(&str, SqlValue)],
) -> Result<ImportResult, AdminError> {
    let names: Vec<String> = parse_candidates(lines, pattern)
        .into_iter()
        .filter_map(|c| c.extracted_name)
        .collect();

    let mut result = ImportResult::default();
    if names.is_empty() {
        return Ok(result);
    }

    let table_ident = Ident::new(table)?;
    let column_ident = Ident::new(duplicate_column)?;
    for (column, _) in static_fields {
        Ident::new(column)?;
    }
    let exists_sql = format!(
        "SELECT 1 FROM {} WHERE {} = ? LIMIT 1",
        table_ident.quoted(),
        column_ident.quoted()
    );

    // Holds the write lock for the whole batch; a concurrent import waits on
    // the busy timeout here instead of failing row by row.
    let mut tx = pool
        .begin_with("BEGIN IMMEDIATE")
        .await
        .map_err(|e| AdminError::query("BEGIN IMMEDIATE", e))?;

    for name in &names {
        let exists = sqlx::query_scalar::<_, i64>(&exists_sql)
            .bind(name)
            .fetch_optional(&mut *tx)
            .await;
        match exists {
            Ok(Some(_)) => {
                result.skipped_count += 1;
                continue;
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(name = %name, "existence check failed: {e}");
                result.errors.push(format!("{name}: {e}"));
                result.skipped_count += 1;
                continue;
            }
        }

        let mut fields = Vec::with_capacity(static_fields.len() + 1);
        fields.push((duplicate_column, SqlValue::from(name.as_str())));
        fields.extend(static_fields.iter().cloned());

        match insert_row(&mut *tx, table, &fields).await {
            Ok(_) => result.imported_count += 1,
            Err(e) if e.is_unique_violation() => {
                tracing::debug!(name = %name, "name inserted concurrently, skipping");
                result.skipped_count += 1;
            }
            Err(e) => {
                tracing::warn!(name = %name, "insert failed, skipping: {e}");
                result.errors.push(format!("{name}: {e}"));
                result.skipped_count += 1;
            }
        }
    }

    tx.commit().await.map_err(|e| {
        tracing::error!("import commit failed: {e}");
        AdminError::Import(e.to_string())
    })?;

    metrics::IMPORTED_NAMES_TOTAL.inc_by(result.imported_count);
    metrics::SKIPPED_NAMES_TOTAL.inc_by(result.skipped_count);
    tracing::info!(
        table,
        imported = result.imported_count,
        skipped = result.skipped_count,
        "bulk import committed"
    );
    Ok(result)
}

/// Persist an uploaded file under a unique name in `dir`.
pub async fn save_upload(dir: &Path, bytes: &[u8]) -> Result<PathBuf, AdminError> {
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(format!("botNames-{}.ai", Uuid::new_v4()));
    tokio::fs::write(&path, bytes).await?;
    Ok(path)
}

/// Read a text file as lines, tolerating CRLF endings, a UTF-8 BOM and
/// invalid UTF-8 sequences.
pub async fn read_all_lines(path: &Path) -> Result<Vec<String>, AdminError> {
    let bytes = tokio::fs::read(path).await?;
    let text = String::from_utf8_lossy(&bytes);
    let text = text.strip_prefix('\u{feff}').unwrap_or(&text);
    Ok(text.lines().map(str::to_string).collect())
}
