// Parsing of the table widget's form-encoded request parameters:
// `draw`, `start`, `length`, `search[value]`, `columns[i][searchable]`,
// `columns[i][search][value]`, `order[0][column]`, `order[0][dir]`.

use std::collections::{BTreeSet, HashMap};

use crate::error::AdminError;

pub const DEFAULT_PAGE_LENGTH: i64 = 10;

/// Column indices at or above this are ignored.
pub const MAX_COLUMNS: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrderDirection {
    #[default]
    Asc,
    Desc,
}

impl OrderDirection {
    pub fn parse(s: &str) -> Self {
        if s.eq_ignore_ascii_case("desc") {
            OrderDirection::Desc
        } else {
            OrderDirection::Asc
        }
    }

    pub(crate) fn as_sql(self) -> &'static str {
        match self {
            OrderDirection::Asc => " ASC",
            OrderDirection::Desc => " DESC",
        }
    }
}

/// One page request from the table widget.
#[derive(Debug, Clone, PartialEq)]
pub struct DataRequest {
    /// Echoed back so the client can discard stale responses.
    pub draw: i64,
    pub start: u64,
    /// Page size; negative means "all rows".
    pub length: i64,
    pub search_term: String,
    pub column_search: Vec<String>,
    pub column_searchable: Vec<bool>,
    pub order_column: u64,
    pub order_direction: OrderDirection,
}

impl Default for DataRequest {
    fn default() -> Self {
        Self {
            draw: 0,
            start: 0,
            length: DEFAULT_PAGE_LENGTH,
            search_term: String::new(),
            column_search: Vec::new(),
            column_searchable: Vec::new(),
            order_column: 0,
            order_direction: OrderDirection::Asc,
        }
    }
}

impl DataRequest {
    /// Build a request from decoded form fields. Missing fields take their
    /// defaults; present but malformed numbers are rejected.
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self, AdminError> {
        let draw = parse_number(params, "draw")?.unwrap_or(0);
        let start = parse_number(params, "start")?.unwrap_or(0);
        let length = parse_number(params, "length")?.unwrap_or(DEFAULT_PAGE_LENGTH);
        let order_column = parse_number(params, "order[0][column]")?.unwrap_or(0);
        let order_direction = params
            .get("order[0][dir]")
            .map(|d| OrderDirection::parse(d))
            .unwrap_or_default();
        let search_term = params.get("search[value]").cloned().unwrap_or_default();

        let mut column_search = Vec::new();
        let mut column_searchable = Vec::new();
        for i in column_indices(params) {
            if column_search.len() <= i {
                column_search.resize(i + 1, String::new());
                column_searchable.resize(i + 1, true);
            }
            if let Some(term) = params.get(&format!("columns[{i}][search][value]")) {
                column_search[i] = term.clone();
            }
            if let Some(flag) = params.get(&format!("columns[{i}][searchable]")) {
                column_searchable[i] = flag != "false";
            }
        }

        Ok(Self {
            draw,
            start,
            length,
            search_term,
            column_search,
            column_searchable,
            order_column,
            order_direction,
        })
    }
}

fn parse_number<T: std::str::FromStr>(
    params: &HashMap<String, String>,
    key: &str,
) -> Result<Option<T>, AdminError> {
    match params.get(key).map(|v| v.trim()) {
        None | Some("") => Ok(None),
        Some(v) => v
            .parse()
            .map(Some)
            .map_err(|_| AdminError::validation(format!("Invalid value for {key}: {v}"))),
    }
}

/// Distinct `columns[i]...` indices below [`MAX_COLUMNS`], ascending.
fn column_indices(params: &HashMap<String, String>) -> BTreeSet<usize> {
    params
        .keys()
        .filter_map(|k| {
            let rest = k.strip_prefix("columns[")?;
            let end = rest.find(']')?;
            rest[..end].parse::<usize>().ok()
        })
        .filter(|&i| i < MAX_COLUMNS)
        .collect()
}
