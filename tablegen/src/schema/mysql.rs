//! MySQL schema source over `information_schema`

use mysql_async::prelude::*;
use mysql_async::{Conn, Opts, OptsBuilder};
use tokio::runtime::{Builder, Runtime};
use tracing::{debug, warn};

use super::model::{Column, ColumnKey};
use super::{ConnectionParams, SchemaSource, TableInfo};
use crate::error::{GenerateError, Result};

const LIST_TABLES: &str = "SELECT TABLE_SCHEMA, TABLE_NAME, TABLE_COMMENT \
     FROM information_schema.TABLES \
     WHERE TABLE_SCHEMA = COALESCE(?, DATABASE()) AND TABLE_TYPE = 'BASE TABLE' \
     ORDER BY TABLE_NAME";

const LIST_COLUMNS: &str = "SELECT COLUMN_NAME, COLUMN_TYPE, IS_NULLABLE, COLUMN_KEY, EXTRA, \
     COLUMN_DEFAULT, COLUMN_COMMENT \
     FROM information_schema.COLUMNS \
     WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ? \
     ORDER BY ORDINAL_POSITION";

type ColumnRow = (
    String,
    String,
    String,
    String,
    String,
    Option<String>,
    String,
);

/// Turn a JDBC-style URL into one mysql_async accepts
///
/// `jdbc:mysql://host:3306/db?useSSL=false` becomes `mysql://host:3306/db`.
pub fn normalize_url(url: &str) -> Result<String> {
    let url = url.trim();
    let url = url.strip_prefix("jdbc:").unwrap_or(url);
    if !url.starts_with("mysql://") {
        return Err(GenerateError::ConnectionError(format!(
            "unsupported database url {:?}, expected jdbc:mysql:// or mysql://",
            url
        )));
    }
    let url = url.split('?').next().unwrap_or(url);
    Ok(url.to_string())
}

/// One connection to a MySQL server, used synchronously
///
/// The connection is driven by a private single-threaded runtime, so this
/// type must not be used from inside another async runtime.
pub struct MySqlSource {
    runtime: Runtime,
    conn: Option<Conn>,
    database: Option<String>,
}

impl MySqlSource {
    pub fn connect(params: &ConnectionParams) -> Result<Self> {
        let url = normalize_url(&params.url)?;
        let opts = Opts::from_url(&url)?;
        let mut builder = OptsBuilder::from_opts(opts);
        if let Some(user) = &params.username {
            builder = builder.user(Some(user.clone()));
        }
        if let Some(pass) = &params.password {
            builder = builder.pass(Some(pass.clone()));
        }
        let opts = Opts::from(builder);
        let database = opts.db_name().map(str::to_string);

        let runtime = Builder::new_current_thread().enable_all().build()?;
        debug!(
            "Connecting to {}:{} (database {:?})",
            opts.ip_or_hostname(),
            opts.tcp_port(),
            database
        );
        let conn = runtime.block_on(Conn::new(opts))?;

        Ok(Self {
            runtime,
            conn: Some(conn),
            database,
        })
    }

    fn closed() -> GenerateError {
        GenerateError::ConnectionError("connection already closed".into())
    }
}

impl SchemaSource for MySqlSource {
    fn list_tables(&mut self) -> Result<Vec<TableInfo>> {
        let Self {
            runtime,
            conn,
            database,
        } = self;
        let conn = conn.as_mut().ok_or_else(Self::closed)?;

        let rows: Vec<(String, String, Option<String>)> =
            runtime.block_on(conn.exec(LIST_TABLES, (database.clone(),)))?;
        if rows.is_empty() && database.is_none() {
            warn!("No database selected by the connection url; no tables listed");
        }

        Ok(rows
            .into_iter()
            .map(|(database, name, comment)| TableInfo {
                name,
                database,
                comment: comment.filter(|c| !c.is_empty()),
            })
            .collect())
    }

    fn list_columns(&mut self, table: &TableInfo) -> Result<Vec<Column>> {
        let Self { runtime, conn, .. } = self;
        let conn = conn.as_mut().ok_or_else(Self::closed)?;

        let rows: Vec<ColumnRow> = runtime
            .block_on(conn.exec(LIST_COLUMNS, (table.database.as_str(), table.name.as_str())))
            .map_err(|e| GenerateError::SchemaReadError {
                table: table.name.clone(),
                message: e.to_string(),
            })?;

        Ok(rows
            .into_iter()
            .map(|(name, column_type, nullable, key, extra, default, comment)| {
                let mut column = Column::new(name, column_type, nullable.eq_ignore_ascii_case("YES"))
                    .with_key(ColumnKey::from_mysql(&key));
                column.is_auto_increment = extra.to_ascii_lowercase().contains("auto_increment");
                column.default_value = default;
                column.comment = Some(comment).filter(|c| !c.is_empty());
                column
            })
            .collect())
    }

    fn close(&mut self) -> Result<()> {
        if let Some(conn) = self.conn.take() {
            self.runtime.block_on(conn.disconnect())?;
            debug!("Connection closed");
        }
        Ok(())
    }
}

impl Drop for MySqlSource {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("Failed to close connection: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_jdbc_url() {
        assert_eq!(
            normalize_url("jdbc:mysql://db.local:3306/shop?useUnicode=true&characterEncoding=utf8").unwrap(),
            "mysql://db.local:3306/shop"
        );
        assert_eq!(
            normalize_url(" mysql://root@localhost/shop ").unwrap(),
            "mysql://root@localhost/shop"
        );
    }

    #[test]
    fn test_normalize_rejects_other_drivers() {
        let err = normalize_url("jdbc:postgresql://localhost/shop").unwrap_err();
        assert!(matches!(err, GenerateError::ConnectionError(_)));
        assert!(normalize_url("").is_err());
    }

    #[test]
    fn test_connect_bad_url() {
        let params = ConnectionParams {
            datasource: "shop".into(),
            url: "jdbc:oracle:thin:@localhost".into(),
            username: None,
            password: None,
        };
        assert!(matches!(
            MySqlSource::connect(&params),
            Err(GenerateError::ConnectionError(_))
        ));
    }
}
