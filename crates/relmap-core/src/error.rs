//! Error types for relmap operations.

use std::fmt;

/// The primary error type for every relmap operation.
#[derive(Debug)]
pub enum Error {
    /// A model descriptor could not be built, or a registered table does
    /// not match its model.
    Configuration(ConfigurationError),
    /// A single-row select matched zero rows.
    NotFound { sql: String },
    /// A result value could not be converted into the destination field.
    Scan(ScanError),
    /// An exec affected a different number of rows than required.
    RowAffectMismatch(RowAffectMismatchError),
    /// A named parameter or field name does not exist on the source.
    MissingField(String),
    /// The backend rejected a statement.
    Query(QueryError),
    /// The backend connection failed.
    Connection(String),
    /// Anything else.
    Custom(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigurationError {
    /// Model type or table the problem belongs to.
    pub model: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanError {
    /// Result column being converted, when known.
    pub column: Option<String>,
    pub message: String,
}

impl ScanError {
    /// Attach the column name if the error does not carry one yet.
    #[must_use]
    pub fn with_column(mut self, column: &str) -> Self {
        if self.column.is_none() {
            self.column = Some(column.to_string());
        }
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowAffectMismatchError {
    pub sql: String,
    pub expected: u64,
    pub actual: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryError {
    pub sql: Option<String>,
    pub message: String,
}

impl Error {
    pub fn configuration(model: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Configuration(ConfigurationError {
            model: model.into(),
            message: message.into(),
        })
    }

    pub fn scan(message: impl Into<String>) -> Self {
        Error::Scan(ScanError {
            column: None,
            message: message.into(),
        })
    }

    pub fn query(sql: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Query(QueryError {
            sql: Some(sql.into()),
            message: message.into(),
        })
    }

    /// Attach a column name to scan errors; other variants pass through.
    #[must_use]
    pub fn in_column(self, column: &str) -> Self {
        match self {
            Error::Scan(e) => Error::Scan(e.with_column(column)),
            other => other,
        }
    }

    /// True when a single-row select found nothing.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }

    /// True when a row-affect-checked exec touched the wrong number of rows.
    pub fn is_row_affect_mismatch(&self) -> bool {
        matches!(self, Error::RowAffectMismatch(_))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Configuration(e) => write!(f, "Configuration error: {e}"),
            Error::NotFound { sql } => write!(f, "No rows in result set: {sql}"),
            Error::Scan(e) => write!(f, "Scan error: {e}"),
            Error::RowAffectMismatch(e) => write!(f, "{e}"),
            Error::MissingField(name) => write!(f, "missing field {name}"),
            Error::Query(e) => write!(f, "Query error: {e}"),
            Error::Connection(msg) => write!(f, "Connection error: {msg}"),
            Error::Custom(msg) => write!(f, "{msg}"),
        }
    }
}

impl fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.model, self.message)
    }
}

impl fmt::Display for ScanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.column {
            Some(column) => write!(f, "column '{column}': {}", self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

impl fmt::Display for RowAffectMismatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[RowAffectCheckError] expected {} affected rows, got {}: {}",
            self.expected, self.actual, self.sql
        )
    }
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.sql {
            Some(sql) => write!(f, "{} (sql: {sql})", self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for Error {}
impl std::error::Error for ConfigurationError {}
impl std::error::Error for ScanError {}
impl std::error::Error for RowAffectMismatchError {}
impl std::error::Error for QueryError {}

/// Result type alias for relmap operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_column_fills_only_missing_name() {
        let err = Error::scan("bad int").in_column("age");
        assert_eq!(err.to_string(), "Scan error: column 'age': bad int");

        let err = err.in_column("other");
        assert_eq!(err.to_string(), "Scan error: column 'age': bad int");
    }

    #[test]
    fn test_predicates() {
        let err = Error::RowAffectMismatch(RowAffectMismatchError {
            sql: "update t set a = 1".to_string(),
            expected: 1,
            actual: 0,
        });
        assert!(err.is_row_affect_mismatch());
        assert!(!err.is_not_found());
        assert!(err.to_string().starts_with("[RowAffectCheckError]"));

        let err = Error::NotFound {
            sql: "SELECT 1".to_string(),
        };
        assert!(err.is_not_found());
    }
}
