//! Error taxonomy and driver error classification.
//!
//! Driver-level errors are translated through a static SQLSTATE table:
//! exact 5-character code first, then the 2-character class, else an
//! unmapped classification. Zero rows affected on a single-record write
//! targeting one primary key is `NoResult`, kept distinct from failures.

use thiserror::Error;

/// Which constraint a violation came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViolationKind {
    Unique,
    NotNull,
    ForeignKey,
    Check,
    Other,
}

impl std::fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ViolationKind::Unique => "unique",
            ViolationKind::NotNull => "not-null",
            ViolationKind::ForeignKey => "foreign-key",
            ViolationKind::Check => "check",
            ViolationKind::Other => "other",
        };
        f.write_str(name)
    }
}

/// Errors produced by the store, builders and migrator.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("authorization failed: {0}")]
    Authorization(String),

    #[error("{kind} constraint violated: {message}")]
    ConstraintViolation { kind: ViolationKind, message: String },

    #[error("transaction error: {0}")]
    Transaction(String),

    #[error("invalid filter: {0}")]
    FilterFormat(String),

    #[error("invalid field-set: {0}")]
    Fieldset(String),

    #[error("no records in scope: {0}")]
    NoRecords(String),

    /// Nothing matched a write that targeted exactly one primary key.
    #[error("no result")]
    NoResult,

    #[error("internal error: {0}")]
    Internal(String),

    #[error("unmapped database error {code}: {message}")]
    Unmapped { code: String, message: String },
}

impl StoreError {
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn filter(msg: impl Into<String>) -> Self {
        Self::FilterFormat(msg.into())
    }

    pub fn fieldset(msg: impl Into<String>) -> Self {
        Self::Fieldset(msg.into())
    }

    pub fn transaction(msg: impl Into<String>) -> Self {
        Self::Transaction(msg.into())
    }

    pub fn violation(kind: ViolationKind, msg: impl Into<String>) -> Self {
        Self::ConstraintViolation {
            kind,
            message: msg.into(),
        }
    }

    /// Prefix the error with operation context, e.g. `"inserting failed"`.
    pub fn during(self, op: &str) -> Self {
        match self {
            Self::Connection(m) => Self::Connection(format!("{op}: {m}")),
            Self::Authorization(m) => Self::Authorization(format!("{op}: {m}")),
            Self::ConstraintViolation { kind, message } => Self::ConstraintViolation {
                kind,
                message: format!("{op}: {message}"),
            },
            Self::Transaction(m) => Self::Transaction(format!("{op}: {m}")),
            Self::Internal(m) => Self::Internal(format!("{op}: {m}")),
            Self::Unmapped { code, message } => Self::Unmapped {
                code,
                message: format!("{op}: {message}"),
            },
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Classify a PostgreSQL SQLSTATE code into the domain taxonomy.
///
/// Exact 5-character codes win over their 2-character class; codes matching
/// neither degrade to `Unmapped` rather than being swallowed.
pub fn classify_sqlstate(code: &str, message: &str) -> StoreError {
    match code {
        "23505" => StoreError::violation(ViolationKind::Unique, message),
        "23502" => StoreError::violation(ViolationKind::NotNull, message),
        "23503" => StoreError::violation(ViolationKind::ForeignKey, message),
        "23514" => StoreError::violation(ViolationKind::Check, message),
        "40001" | "40P01" => StoreError::transaction(message),
        "28P01" => StoreError::Authorization(message.to_string()),
        "3D000" | "57014" => StoreError::Connection(message.to_string()),
        "42601" | "42703" | "42P01" => StoreError::internal(message),
        _ => match code.get(..2) {
            Some("08") | Some("53") | Some("57") => StoreError::Connection(message.to_string()),
            Some("28") => StoreError::Authorization(message.to_string()),
            Some("23") => StoreError::violation(ViolationKind::Other, message),
            Some("25") | Some("2D") | Some("40") => StoreError::transaction(message),
            Some("42") => StoreError::internal(message),
            _ => StoreError::Unmapped {
                code: code.to_string(),
                message: message.to_string(),
            },
        },
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) => {
                let message = db.message().to_string();
                match db.code() {
                    Some(code) => classify_sqlstate(&code, &message),
                    None => StoreError::Unmapped {
                        code: String::new(),
                        message,
                    },
                }
            }
            sqlx::Error::RowNotFound => StoreError::NoResult,
            sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::Io(_)
            | sqlx::Error::Tls(_) => StoreError::Connection(err.to_string()),
            _ => StoreError::Internal(err.to_string()),
        }
    }
}
