//! Validation of generated read-only queries.
//!
//! Every rule must hold; any violation discards the query for the turn.

use std::sync::LazyLock;

use regex::Regex;

/// Longest accepted query, in characters.
pub const MAX_QUERY_LENGTH: usize = 1000;

/// Keywords that must never appear as a whole word in a generated query.
const DENY_LIST: &[&str] = &[
    // Mutation
    "insert",
    "update",
    "delete",
    "replace",
    "truncate",
    // Schema
    "drop",
    "alter",
    "create",
    "attach",
    "detach",
    "pragma",
    "vacuum",
    "reindex",
    // Privileges
    "grant",
    "revoke",
    // System and introspection tables
    "sqlite_master",
    "sqlite_schema",
    "sqlite_temp_master",
    "information_schema",
    "pg_catalog",
    // Timing and side channels
    "sleep",
    "pg_sleep",
    "benchmark",
    "randomblob",
    // File I/O and execution
    "load_extension",
    "load_file",
    "readfile",
    "writefile",
    "outfile",
    "dumpfile",
    "exec",
    "execute",
];

static STARTS_WITH_SELECT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*select\b").expect("Invalid select regex"));

static DENIED_KEYWORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i)\b(?:{})\b", DENY_LIST.join("|"))).expect("Invalid deny-list regex")
});

static HAS_LIMIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\blimit\b").expect("Invalid limit regex"));

/// Why a generated query was discarded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryRejection {
    #[error("query is empty")]
    Empty,
    #[error("query exceeds {MAX_QUERY_LENGTH} characters")]
    TooLong,
    #[error("query does not start with SELECT")]
    NotSelect,
    #[error("query contains a statement separator")]
    StatementSeparator,
    #[error("query contains a comment marker")]
    Comment,
    #[error("query uses forbidden keyword '{0}'")]
    ForbiddenKeyword(String),
}

/// Check `sql` against every rule, returning the first violation.
pub fn validate_query(sql: &str) -> Result<(), QueryRejection> {
    let trimmed = sql.trim();
    if trimmed.is_empty() {
        return Err(QueryRejection::Empty);
    }
    if trimmed.chars().count() > MAX_QUERY_LENGTH {
        return Err(QueryRejection::TooLong);
    }
    if !STARTS_WITH_SELECT.is_match(trimmed) {
        return Err(QueryRejection::NotSelect);
    }
    if trimmed.contains(';') {
        return Err(QueryRejection::StatementSeparator);
    }
    if ["--", "/*", "*/"].iter().any(|m| trimmed.contains(m)) {
        return Err(QueryRejection::Comment);
    }
    if let Some(m) = DENIED_KEYWORD.find(trimmed) {
        return Err(QueryRejection::ForbiddenKeyword(m.as_str().to_lowercase()));
    }
    Ok(())
}

/// Append `LIMIT n` unless the outer query already has a row cap.
///
/// A `LIMIT` inside a subquery or a string literal does not count.
pub fn ensure_limit(sql: &str, limit: u32) -> String {
    let trimmed = sql.trim();
    if HAS_LIMIT.is_match(&outer_query(trimmed)) {
        trimmed.to_string()
    } else {
        format!("{} LIMIT {}", trimmed, limit)
    }
}

/// `sql` with quoted and parenthesised text blanked out.
///
/// Byte offsets are preserved. Quotes and parentheses are ASCII, so every
/// multi-byte character is either kept or blanked whole.
fn outer_query(sql: &str) -> String {
    let mut depth = 0usize;
    let mut quote: Option<u8> = None;
    let masked: Vec<u8> = sql
        .bytes()
        .map(|b| {
            let keep = match quote {
                Some(q) => {
                    if b == q {
                        quote = None;
                    }
                    false
                }
                None => match b {
                    b'\'' | b'"' => {
                        quote = Some(b);
                        false
                    }
                    b'(' => {
                        depth += 1;
                        false
                    }
                    b')' => {
                        depth = depth.saturating_sub(1);
                        false
                    }
                    _ => depth == 0,
                },
            };
            if keep {
                b
            } else {
                b' '
            }
        })
        .collect();
    String::from_utf8(masked).unwrap_or_default()
}
