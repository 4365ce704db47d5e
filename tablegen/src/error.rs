//! Error types for tablegen

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for tablegen operations
pub type Result<T> = std::result::Result<T, GenerateError>;

/// Errors that can occur while generating sources
#[derive(Error, Debug)]
pub enum GenerateError {
    /// Bad credentials or URL, or the database is unreachable
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Columns of one table could not be enumerated
    #[error("Failed to read columns of table {table}: {message}")]
    SchemaReadError { table: String, message: String },

    /// A name normalized to nothing
    #[error("Identifier {0:?} is empty after normalization")]
    EmptyIdentifierError(String),

    #[error("Template not found: {0}")]
    TemplateNotFoundError(String),

    #[error("Failed to render template {template}: {message}")]
    TemplateRenderError { template: String, message: String },

    /// Rendered output carries no `package` declaration
    #[error("No package declared in generated source for {0}")]
    MissingNamespaceError(String),

    /// Rendered output declares no class, interface, enum or record
    #[error("No type declared in generated source: {0}")]
    MissingTypeError(String),

    #[error("Cannot parse existing source {}: {message}", path.display())]
    UnparsableExistingSourceError { path: PathBuf, message: String },

    #[error("Failed to parse SQL schema: {0}")]
    ParseError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Invalid pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<sqlparser::parser::ParserError> for GenerateError {
    fn from(err: sqlparser::parser::ParserError) -> Self {
        GenerateError::ParseError(err.to_string())
    }
}

impl From<config::ConfigError> for GenerateError {
    fn from(err: config::ConfigError) -> Self {
        GenerateError::ConfigError(err.to_string())
    }
}

impl From<mysql_async::Error> for GenerateError {
    fn from(err: mysql_async::Error) -> Self {
        GenerateError::ConnectionError(err.to_string())
    }
}

impl From<mysql_async::UrlError> for GenerateError {
    fn from(err: mysql_async::UrlError) -> Self {
        GenerateError::ConnectionError(err.to_string())
    }
}
