//! SQL guard
//!
//! Only single read-only SELECT statements reach the database. Keyword
//! matching is a plain substring test on the upper-cased text, so a column
//! named `created_at` is rejected too.

use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

/// Keywords that may never appear in a query
pub const FORBIDDEN_KEYWORDS: [&str; 9] = [
    "DROP", "DELETE", "INSERT", "UPDATE", "ALTER", "CREATE", "EXEC", "ATTACH", "DETACH",
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SqlGuardError {
    #[error("Seules les requêtes SELECT sont autorisées.")]
    NotSelect,

    #[error("Opération interdite: {0}")]
    Forbidden(&'static str),

    #[error("Une seule instruction SQL est autorisée.")]
    MultipleStatements,

    #[error("Identifiant invalide: {0:?}")]
    InvalidIdentifier(String),
}

/// Validate a SELECT statement; returns it without a trailing `;`
pub fn check_select(sql: &str) -> Result<&str, SqlGuardError> {
    let trimmed = sql.trim();
    let upper = trimmed.to_uppercase();

    if !upper.starts_with("SELECT") {
        return Err(SqlGuardError::NotSelect);
    }

    check_keywords(&upper)?;

    let statement = trimmed.trim_end_matches(|c: char| c == ';' || c.is_whitespace());
    if has_unquoted_semicolon(statement) {
        return Err(SqlGuardError::MultipleStatements);
    }

    Ok(statement)
}

/// `;` outside string literals and quoted identifiers
///
/// Doubled quotes (`'l''usine'`) close and reopen, which leaves the state right.
fn has_unquoted_semicolon(sql: &str) -> bool {
    let mut quote: Option<char> = None;
    for c in sql.chars() {
        match (quote, c) {
            (None, '\'' | '"') => quote = Some(c),
            (Some(open), _) if c == open => quote = None,
            (None, ';') => return true,
            _ => {}
        }
    }
    false
}

/// Validate a WHERE fragment supplied from outside
pub fn check_fragment(fragment: &str) -> Result<(), SqlGuardError> {
    check_keywords(&fragment.to_uppercase())?;
    if fragment.contains(';') {
        return Err(SqlGuardError::MultipleStatements);
    }
    Ok(())
}

fn check_keywords(upper: &str) -> Result<(), SqlGuardError> {
    match FORBIDDEN_KEYWORDS.iter().find(|k| upper.contains(*k)) {
        Some(keyword) => Err(SqlGuardError::Forbidden(keyword)),
        None => Ok(()),
    }
}

fn identifier_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid identifier regex"))
}

/// Table and column names interpolated into SQL
pub fn check_identifier(name: &str) -> Result<&str, SqlGuardError> {
    if identifier_re().is_match(name) {
        Ok(name)
    } else {
        Err(SqlGuardError::InvalidIdentifier(name.to_string()))
    }
}

// ============================================================================
// Tests
// ============================================================================
