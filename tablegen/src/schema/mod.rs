//! Schema introspection
//!
//! A [`SchemaSource`] lists physical tables and their columns; the
//! [`introspect`] function applies table selection, groups shards and binds
//! names, producing the [`SchemaModel`] handed to rendering.

mod ddl;
mod introspect;
mod model;
mod mysql;

pub use ddl::DdlSource;
pub use introspect::{introspect, TableSelector};
pub use model::*;
pub use mysql::{normalize_url, MySqlSource};

use std::path::Path;

use crate::error::Result;

/// A physical table as listed by a source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableInfo {
    pub name: String,
    pub database: String,
    pub comment: Option<String>,
}

/// Where table and column metadata come from
///
/// Implementations hold at most one live connection; `close` releases it
/// and is safe to call more than once.
pub trait SchemaSource {
    /// Physical tables visible to the connection, in name order
    fn list_tables(&mut self) -> Result<Vec<TableInfo>>;

    /// Columns of one table, in ordinal order
    fn list_columns(&mut self, table: &TableInfo) -> Result<Vec<Column>>;

    fn close(&mut self) -> Result<()>;
}

/// Resolved connection parameters of one datasource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionParams {
    /// Logical datasource name, blank for the default database
    pub datasource: String,
    pub url: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Open the source behind `params.url`: `file:` URLs name a DDL file,
/// anything else is a MySQL URL
pub fn open_source(params: &ConnectionParams) -> Result<Box<dyn SchemaSource>> {
    match params.url.trim().strip_prefix("file:") {
        Some(path) => {
            let path = path.strip_prefix("//").unwrap_or(path);
            Ok(Box::new(DdlSource::open(Path::new(path), &params.datasource)?))
        }
        None => Ok(Box::new(MySqlSource::connect(params)?)),
    }
}
