//! SQL identifier hygiene.
//!
//! Identifiers are always emitted double-quoted; validation additionally
//! rejects names that would be confusing or unusable even when quoted
//! (reserved words, uppercase, leading digits).

use regex::Regex;

/// Reserved keywords that cannot be used as table or schema names.
const RESERVED_WORDS: &[&str] = &[
    "all", "and", "any", "array", "as", "asc", "between", "case", "cast", "check", "collate",
    "column", "constraint", "create", "cross", "current_date", "current_time",
    "current_timestamp", "current_user", "default", "desc", "distinct", "do", "else", "end",
    "except", "false", "fetch", "for", "foreign", "from", "grant", "group", "having", "in",
    "intersect", "into", "join", "lateral", "leading", "limit", "not", "null", "offset", "on",
    "only", "or", "order", "primary", "references", "returning", "select", "session_user",
    "some", "table", "then", "to", "trailing", "true", "union", "unique", "user", "using",
    "when", "where", "window", "with",
];

/// Quote an identifier, escaping any embedded double quotes.
pub fn quote_identifier(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

/// Quote a schema-qualified two-part name: `"schema"."name"`.
pub fn qualify(schema: &str, name: &str) -> String {
    format!("{}.{}", quote_identifier(schema), quote_identifier(name))
}

/// Validate a schema or table name.
///
/// Must start with a lowercase letter, contain only lowercase letters,
/// digits and underscores, and not be a reserved keyword.
pub fn validate_identifier(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("identifier cannot be empty".to_string());
    }

    let shape = Regex::new(r"^[a-z][a-z0-9_]*$").unwrap();
    if !shape.is_match(name) {
        return Err(format!(
            "identifier '{name}' must start with a lowercase letter and contain only lowercase letters, digits and underscores"
        ));
    }

    if RESERVED_WORDS.contains(&name) {
        return Err(format!("identifier '{name}' is a reserved keyword"));
    }

    Ok(())
}
