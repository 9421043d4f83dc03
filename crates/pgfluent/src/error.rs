//! Error types for pgfluent

use std::time::Duration;
use thiserror::Error;

/// Result type alias for pgfluent operations
pub type SqlResult<T> = Result<T, SqlError>;

/// Error types for statement construction and execution
#[derive(Debug, Error)]
pub enum SqlError {
    /// A table or column name failed identifier validation
    #[error("Invalid identifier {value:?}: {reason}")]
    InvalidIdentifier { value: String, reason: String },

    /// A field, order or table expression failed validation
    #[error("Invalid expression {value:?}: {reason}")]
    InvalidExpression { value: String, reason: String },

    /// The statement has no target table
    #[error("Build error: table is not set")]
    MissingTable,

    /// INSERT without columns
    #[error("Build error: no columns specified for insert")]
    MissingColumns,

    /// INSERT without a value row
    #[error("Build error: no values specified for insert")]
    MissingValues,

    /// INSERT value row does not line up with the column list
    #[error("Build error: {columns} columns but {values} values")]
    ColumnValueMismatch { columns: usize, values: usize },

    /// UPDATE without any SET column
    #[error("Build error: no fields to update")]
    NoFieldsToUpdate,

    /// A condition template's `?` count does not match its arguments
    #[error("Build error: {template:?} has {placeholders} placeholders but {args} arguments")]
    ArgumentCountMismatch {
        template: String,
        placeholders: usize,
        args: usize,
    },

    /// Statement execution failed on the server or the wire
    #[error("Exec error after {elapsed:?} running {sql:?}: {source}")]
    Exec {
        sql: String,
        elapsed: Duration,
        #[source]
        source: tokio_postgres::Error,
    },

    /// Transaction control statement failed
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// Database connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Invalid connection configuration
    #[error("Config error: {0}")]
    Config(String),

    /// Pool could not be built
    #[error("Pool error: {0}")]
    Pool(String),

    /// No pooled session could be checked out for a statement
    #[error("Acquire error after {elapsed:?} for {sql:?}: {message}")]
    Acquire {
        sql: String,
        elapsed: Duration,
        message: String,
    },

    /// The connection was closed
    #[error("Connection is closed")]
    ClosedConnection,

    /// A single-row read found nothing
    #[error("No rows in result set")]
    NoRows,

    /// A record's scan callback rejected a column
    #[error("Scan failed on column '{column}': {source}")]
    Scan {
        column: String,
        #[source]
        source: ScanError,
    },

    /// A server value could not be decoded
    #[error("Decode error on column '{column}': {message}")]
    Decode { column: String, message: String },
}

impl SqlError {
    pub(crate) fn invalid_identifier(value: &str, reason: impl Into<String>) -> Self {
        Self::InvalidIdentifier {
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_expression(value: &str, reason: impl Into<String>) -> Self {
        Self::InvalidExpression {
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    /// Create a decode error for a specific column
    pub fn decode(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Check if this is the single-row not-found sentinel
    pub fn is_no_rows(&self) -> bool {
        matches!(self, Self::NoRows)
    }

    /// Check if a setter rejected caller input
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidIdentifier { .. } | Self::InvalidExpression { .. }
        )
    }

    /// Check if the statement could not be assembled
    pub fn is_build(&self) -> bool {
        matches!(
            self,
            Self::MissingTable
                | Self::MissingColumns
                | Self::MissingValues
                | Self::ColumnValueMismatch { .. }
                | Self::NoFieldsToUpdate
                | Self::ArgumentCountMismatch { .. }
        )
    }

    /// Check if the connection was closed
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::ClosedConnection)
    }

    /// SQLSTATE code reported by the server, if any
    pub fn sqlstate(&self) -> Option<&str> {
        match self {
            Self::Exec { source, .. } => source.as_db_error().map(|e| e.code().code()),
            _ => None,
        }
    }

    /// Check if this is a unique violation error
    pub fn is_unique_violation(&self) -> bool {
        self.sqlstate() == Some("23505")
    }

    /// Check if this is a foreign key violation error
    pub fn is_foreign_key_violation(&self) -> bool {
        self.sqlstate() == Some("23503")
    }

    /// Check if this is a check constraint violation error
    pub fn is_check_violation(&self) -> bool {
        self.sqlstate() == Some("23514")
    }
}

/// Failure reported by a [`Record`](crate::record::Record) while assigning a column.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScanError {
    /// The value has a different type than the field expects
    #[error("expected {expected}, got {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    /// The value does not fit the target type
    #[error("value out of range for {0}")]
    OutOfRange(&'static str),

    /// The record does not know this column
    #[error("unknown column")]
    UnknownColumn,

    /// Anything else the record wants to report
    #[error("{0}")]
    Custom(String),
}

impl ScanError {
    /// Create a custom scan error
    pub fn custom(message: impl Into<String>) -> Self {
        Self::Custom(message.into())
    }
}
