//! Offline schema source reading MySQL DDL with sqlparser-rs

use std::path::Path;

use sqlparser::ast::{
    ColumnOption, Expr, Ident, IndexColumn, IndexConstraint, ObjectName, PrimaryKeyConstraint,
    Statement, TableConstraint, UniqueConstraint,
};
use sqlparser::dialect::MySqlDialect;
use sqlparser::parser::Parser;
use tracing::debug;

use super::model::{Column, ColumnKey};
use super::{SchemaSource, TableInfo};
use crate::error::{GenerateError, Result};

/// Tables parsed from `CREATE TABLE` statements
#[derive(Debug, Clone)]
pub struct DdlSource {
    tables: Vec<(TableInfo, Vec<Column>)>,
}

impl DdlSource {
    /// Read and parse a DDL file. The database name defaults to the file stem.
    pub fn open(path: &Path, database: &str) -> Result<Self> {
        let sql = std::fs::read_to_string(path).map_err(|e| {
            GenerateError::ConnectionError(format!(
                "cannot read schema file {}: {}",
                path.display(),
                e
            ))
        })?;
        let database = if database.trim().is_empty() {
            path.file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default()
        } else {
            database.to_string()
        };
        debug!("Parsing schema file {} as database {:?}", path.display(), database);
        Self::parse(&sql, &database)
    }

    /// Parse a SQL schema string
    pub fn parse(sql: &str, database: &str) -> Result<Self> {
        let dialect = MySqlDialect {};
        let statements = Parser::parse_sql(&dialect, sql)?;

        let mut tables = Vec::new();
        for stmt in statements {
            if let Statement::CreateTable(create_table) = stmt {
                tables.push(extract_table(&create_table, database));
            }
        }
        tables.sort_by(|a, b| a.0.name.cmp(&b.0.name));

        Ok(Self { tables })
    }
}

impl SchemaSource for DdlSource {
    fn list_tables(&mut self) -> Result<Vec<TableInfo>> {
        Ok(self.tables.iter().map(|(info, _)| info.clone()).collect())
    }

    fn list_columns(&mut self, table: &TableInfo) -> Result<Vec<Column>> {
        self.tables
            .iter()
            .find(|(info, _)| info.name == table.name && info.database == table.database)
            .map(|(_, columns)| columns.clone())
            .ok_or_else(|| GenerateError::SchemaReadError {
                table: table.name.clone(),
                message: "no such table in schema file".into(),
            })
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Extract table metadata from a CREATE TABLE statement
fn extract_table(create: &sqlparser::ast::CreateTable, database: &str) -> (TableInfo, Vec<Column>) {
    let info = TableInfo {
        name: extract_table_name(&create.name),
        database: database.to_string(),
        comment: None,
    };

    let mut columns: Vec<Column> = create.columns.iter().map(extract_column).collect();

    let mut mark = |names: Vec<String>, key: ColumnKey| {
        for name in names {
            if let Some(col) = columns.iter_mut().find(|c| c.name == name) {
                // PRI beats UNI beats MUL, as information_schema reports it
                let rank = |k: ColumnKey| match k {
                    ColumnKey::Primary => 3,
                    ColumnKey::Unique => 2,
                    ColumnKey::Multiple => 1,
                    ColumnKey::None => 0,
                };
                if rank(key) > rank(col.key) {
                    col.key = key;
                }
                if key == ColumnKey::Primary {
                    col.nullable = false;
                }
            }
        }
    };

    for constraint in &create.constraints {
        match constraint {
            TableConstraint::PrimaryKey(PrimaryKeyConstraint { columns: pk_cols, .. }) => {
                mark(
                    pk_cols.iter().map(extract_ident_from_index_column).collect(),
                    ColumnKey::Primary,
                );
            }
            TableConstraint::Unique(UniqueConstraint {
                columns: uniq_cols, ..
            }) => {
                // Only the first column of a composite unique key is flagged
                let first = uniq_cols.iter().take(1);
                let key = if uniq_cols.len() == 1 {
                    ColumnKey::Unique
                } else {
                    ColumnKey::Multiple
                };
                mark(first.map(extract_ident_from_index_column).collect(), key);
            }
            TableConstraint::Index(IndexConstraint {
                columns: idx_cols, ..
            }) => {
                mark(
                    idx_cols
                        .iter()
                        .take(1)
                        .map(extract_ident_from_index_column)
                        .collect(),
                    ColumnKey::Multiple,
                );
            }
            _ => {}
        }
    }

    (info, columns)
}

fn extract_column(col_def: &sqlparser::ast::ColumnDef) -> Column {
    let mut column = Column::new(
        extract_ident(&col_def.name),
        format!("{}", col_def.data_type),
        true,
    );

    for option in &col_def.options {
        match &option.option {
            ColumnOption::NotNull => column.nullable = false,
            ColumnOption::Null => column.nullable = true,
            ColumnOption::Default(expr) => column.default_value = Some(format!("{}", expr)),
            ColumnOption::PrimaryKey(_) => {
                column.key = ColumnKey::Primary;
                column.nullable = false;
            }
            ColumnOption::Unique(_) => {
                if column.key != ColumnKey::Primary {
                    column.key = ColumnKey::Unique;
                }
            }
            ColumnOption::Comment(c) => column.comment = Some(c.clone()),
            ColumnOption::DialectSpecific(tokens) => {
                let token_str = tokens
                    .iter()
                    .map(|t| t.to_string())
                    .collect::<Vec<_>>()
                    .join(" ")
                    .to_uppercase();
                if token_str.contains("AUTO_INCREMENT") {
                    column.is_auto_increment = true;
                }
            }
            _ => {}
        }
    }

    column
}

/// Extract a simple string from an ObjectName
fn extract_table_name(name: &ObjectName) -> String {
    name.0
        .last()
        .and_then(|part| part.as_ident())
        .map(|ident| ident.value.clone())
        .unwrap_or_default()
}

fn extract_ident(ident: &Ident) -> String {
    ident.value.clone()
}

fn extract_ident_from_index_column(ic: &IndexColumn) -> String {
    match &ic.column.expr {
        Expr::Identifier(ident) => ident.value.clone(),
        other => format!("{}", other),
    }
}
