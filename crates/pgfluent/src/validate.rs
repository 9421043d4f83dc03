//! Identifier and expression validation.
//!
//! Table and column names cannot be sent as bind parameters, so every name a
//! caller hands to a builder is checked here before it is allowed into SQL
//! text. Values never come through this module; they always travel as
//! positional arguments.
//!
//! - [`validate_identifier`]: a single bare name (`user_id`).
//! - [`validate_field_expression`]: a select/order/group term
//!   (`u.name`, `COUNT(o.id) AS order_count`).
//! - [`validate_table_expression`]: a table with an optional alias
//!   (`users`, `users u`, `public.users AS u`).
//!
//! Expression checks are a defense-in-depth filter, not a SQL parser. JOIN
//! `ON` predicates and condition templates are caller SQL and are not checked
//! here; never build them from untrusted input.

use crate::error::{SqlError, SqlResult};
use regex::Regex;
use std::sync::LazyLock;

/// PostgreSQL truncates identifiers longer than this (NAMEDATALEN - 1).
pub const MAX_IDENTIFIER_LEN: usize = 63;

static IDENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("invalid built-in identifier regex")
});

static QUALIFIED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*\.([A-Za-z_][A-Za-z0-9_]*|\*)$")
        .expect("invalid built-in qualified identifier regex")
});

static PERMISSIVE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_.()*,\s]+$").expect("invalid built-in expression regex")
});

/// Reserved words that may never be used as a bare identifier.
const RESERVED_WORDS: &[&str] = &[
    "all", "alter", "analyse", "analyze", "and", "any", "array", "as", "asc",
    "asymmetric", "both", "case", "cast", "check", "collate", "column",
    "constraint", "create", "current_catalog", "current_date", "current_role",
    "current_time", "current_timestamp", "current_user", "default", "deferrable",
    "delete", "desc", "distinct", "do", "drop", "else", "end", "except", "exec",
    "execute", "false", "fetch", "for", "foreign", "from", "grant", "group",
    "having", "in", "initially", "insert", "intersect", "into", "join", "lateral",
    "leading", "limit", "localtime", "localtimestamp", "not", "null", "offset",
    "on", "only", "or", "order", "placing", "primary", "references", "returning",
    "revoke", "select", "session_user", "some", "symmetric", "table", "then", "to",
    "trailing", "true", "truncate", "union", "unique", "update", "user", "using",
    "variadic", "when", "where", "window", "with",
];

/// Substrings that never belong in a field or table expression.
const DANGEROUS_PATTERNS: &[&str] = &[
    ";", "--", "/*", "*/", "'", "\"", "\\", "pg_sleep",
];

/// Statement keywords, matched as whole words so `last_update` stays legal.
static DANGEROUS_KEYWORD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(drop|delete|insert|update|truncate|alter|create|exec|execute|union|grant|revoke)\s|\bxp_",
    )
    .expect("invalid built-in keyword regex")
});

/// Returns true if `word` is a reserved keyword (case-insensitive).
pub fn is_reserved_word(word: &str) -> bool {
    let lower = word.to_ascii_lowercase();
    RESERVED_WORDS.contains(&lower.as_str())
}

/// Validate a bare SQL identifier such as a table or column name.
pub fn validate_identifier(name: &str) -> SqlResult<()> {
    if name.is_empty() {
        return Err(SqlError::invalid_identifier(name, "identifier is empty"));
    }
    if name.len() > MAX_IDENTIFIER_LEN {
        return Err(SqlError::invalid_identifier(
            name,
            format!("identifier exceeds {MAX_IDENTIFIER_LEN} characters"),
        ));
    }
    if !IDENT_RE.is_match(name) {
        return Err(SqlError::invalid_identifier(
            name,
            "identifier must match [A-Za-z_][A-Za-z0-9_]*",
        ));
    }
    if is_reserved_word(name) {
        return Err(SqlError::invalid_identifier(name, "identifier is a reserved word"));
    }
    Ok(())
}

fn check_dangerous(expr: &str) -> SqlResult<()> {
    let lower = expr.to_ascii_lowercase();
    if let Some(pattern) = DANGEROUS_PATTERNS.iter().find(|p| lower.contains(**p)) {
        return Err(SqlError::invalid_expression(
            expr,
            format!("contains forbidden token {pattern:?}"),
        ));
    }
    if let Some(m) = DANGEROUS_KEYWORD_RE.find(&lower) {
        return Err(SqlError::invalid_expression(
            expr,
            format!("contains forbidden keyword {:?}", m.as_str().trim_end()),
        ));
    }
    Ok(())
}

fn parens_balanced(expr: &str) -> bool {
    let mut depth: i32 = 0;
    for c in expr.chars() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth < 0 {
                    return false;
                }
            }
            _ => {}
        }
    }
    depth == 0
}

fn validate_qualified(expr: &str) -> SqlResult<()> {
    for part in expr.split('.') {
        if part != "*" {
            validate_identifier(part)?;
        }
    }
    Ok(())
}

/// Validate a select, order-by or group-by term.
///
/// Accepts `*`, `column`, `table.column`, `table.*`, and function calls with
/// optional aliases built from letters, digits, `_`, `.`, `(`, `)`, `*`, `,`
/// and whitespace.
pub fn validate_field_expression(expr: &str) -> SqlResult<()> {
    let trimmed = expr.trim();
    if trimmed.is_empty() {
        return Err(SqlError::invalid_expression(expr, "expression is empty"));
    }
    check_dangerous(expr)?;

    if trimmed == "*" {
        return Ok(());
    }
    if IDENT_RE.is_match(trimmed) {
        return validate_identifier(trimmed)
            .map_err(|_| SqlError::invalid_expression(expr, "bare reserved word"));
    }
    if QUALIFIED_RE.is_match(trimmed) {
        return validate_qualified(trimmed)
            .map_err(|e| SqlError::invalid_expression(expr, e.to_string()));
    }
    if !PERMISSIVE_RE.is_match(trimmed) {
        return Err(SqlError::invalid_expression(
            expr,
            "expression contains characters outside [A-Za-z0-9_.()*,] and whitespace",
        ));
    }
    if !parens_balanced(trimmed) {
        return Err(SqlError::invalid_expression(expr, "unbalanced parentheses"));
    }
    Ok(())
}

/// Validate a table reference with an optional alias.
///
/// Accepted shapes: `table`, `schema.table`, `table alias`, `table AS alias`.
pub fn validate_table_expression(expr: &str) -> SqlResult<()> {
    if expr.trim().is_empty() {
        return Err(SqlError::invalid_expression(expr, "table expression is empty"));
    }
    check_dangerous(expr)?;

    let tokens: Vec<&str> = expr.split_whitespace().collect();
    let (table, alias) = match tokens.as_slice() {
        [table] => (*table, None),
        [table, alias] => (*table, Some(*alias)),
        [table, kw, alias] if kw.eq_ignore_ascii_case("as") => (*table, Some(*alias)),
        _ => {
            return Err(SqlError::invalid_expression(
                expr,
                "expected `table`, `table alias` or `table AS alias`",
            ));
        }
    };

    let parts: Vec<&str> = table.split('.').collect();
    if parts.len() > 2 {
        return Err(SqlError::invalid_expression(expr, "too many qualifiers in table name"));
    }
    for part in parts {
        validate_identifier(part)?;
    }
    if let Some(alias) = alias {
        validate_identifier(alias)?;
    }
    Ok(())
}

/// Validate a table name without an alias, optionally schema-qualified.
pub fn validate_table_name(name: &str) -> SqlResult<()> {
    let trimmed = name.trim();
    if trimmed.split_whitespace().count() != 1 {
        return Err(SqlError::invalid_expression(name, "expected a table name without alias"));
    }
    validate_table_expression(trimmed)
}
