//! MySQL/MariaDB implementation of [`LiveDatabase`].
//!
//! Holds a single connection: batches are committed one at a time on it, so
//! a pool would add nothing.

use async_trait::async_trait;
use mysql_async::prelude::*;
use mysql_async::{Conn, Opts, OptsBuilder, SslOpts};
use tracing::{debug, info, warn};

use super::{DbWarning, LiveDatabase};
use crate::config::DatabaseConfig;
use crate::error::{RemapError, Result};
use crate::identifier::quote;
use crate::schema::{KeyRole, LiveColumn};

/// Row of `SHOW COLUMNS`: Field, Type, Null, Key, Default, Extra.
type ShowColumnsRow = (String, String, String, String, Option<String>, String);

pub struct MysqlDatabase {
    conn: Conn,
}

impl MysqlDatabase {
    /// Connect using the `database` section of the configuration.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let ssl_opts = match config.ssl_mode.to_lowercase().as_str() {
            "disable" => {
                warn!("MySQL TLS is disabled. Credentials will be transmitted in plaintext.");
                None
            }
            "prefer" | "require" => Some(SslOpts::default().with_danger_accept_invalid_certs(true)),
            "verify-ca" | "verify_ca" | "verify-full" | "verify_identity" => Some(SslOpts::default()),
            other => {
                warn!("Unknown ssl_mode '{}', defaulting to Preferred", other);
                Some(SslOpts::default().with_danger_accept_invalid_certs(true))
            }
        };

        let mut builder = OptsBuilder::default()
            .ip_or_hostname(&config.host)
            .tcp_port(config.port)
            .db_name(Some(&config.database))
            .user(Some(&config.user))
            .pass(Some(&config.password))
            .init(vec!["SET NAMES utf8mb4"]);

        if let Some(ssl) = ssl_opts {
            builder = builder.ssl_opts(ssl);
        }

        let opts: Opts = builder.into();
        let conn = Conn::new(opts)
            .await
            .map_err(|e| RemapError::database("connecting to MySQL", e))?;

        info!(
            "Connected to MySQL: {}:{}/{}",
            config.host, config.port, config.database
        );

        Ok(Self { conn })
    }

    pub async fn disconnect(self) -> Result<()> {
        self.conn
            .disconnect()
            .await
            .map_err(|e| RemapError::database("disconnecting from MySQL", e))
    }
}

#[async_trait]
impl LiveDatabase for MysqlDatabase {
    async fn list_tables(&mut self) -> Result<Vec<String>> {
        self.conn
            .query::<String, _>("SHOW TABLES")
            .await
            .map_err(|e| RemapError::database("listing tables", e))
    }

    async fn describe_columns(&mut self, table: &str) -> Result<Vec<LiveColumn>> {
        let sql = format!("SHOW COLUMNS FROM {}", quote(table)?);
        let rows: Vec<ShowColumnsRow> = self
            .conn
            .query(sql.as_str())
            .await
            .map_err(|e| RemapError::database(format!("describing table {}", table), e))?;

        Ok(rows
            .into_iter()
            .map(|(name, data_type, null, key, default, extra)| LiveColumn {
                name,
                data_type,
                nullable: null.eq_ignore_ascii_case("YES"),
                key: KeyRole::from_mysql(&key),
                default,
                extra,
            })
            .collect())
    }

    async fn execute(&mut self, sql: &str) -> Result<u64> {
        debug!("Executing: {}", sql);
        self.conn.query_drop(sql).await?;
        Ok(self.conn.affected_rows())
    }

    async fn count(&mut self, sql: &str) -> Result<i64> {
        let count: Option<i64> = self.conn.query_first(sql).await?;
        Ok(count.unwrap_or(0))
    }

    async fn begin(&mut self) -> Result<()> {
        self.conn
            .query_drop("START TRANSACTION")
            .await
            .map_err(|e| RemapError::database("starting transaction", e))
    }

    async fn commit(&mut self) -> Result<()> {
        self.conn
            .query_drop("COMMIT")
            .await
            .map_err(|e| RemapError::database("committing", e))
    }

    async fn rollback(&mut self) -> Result<()> {
        self.conn
            .query_drop("ROLLBACK")
            .await
            .map_err(|e| RemapError::database("rolling back", e))
    }

    async fn warnings(&mut self) -> Result<Vec<DbWarning>> {
        if self.conn.get_warnings() == 0 {
            return Ok(Vec::new());
        }
        let rows: Vec<(String, u32, String)> = self.conn.query("SHOW WARNINGS").await?;
        Ok(rows
            .into_iter()
            .map(|(level, code, message)| DbWarning {
                level,
                code,
                message,
            })
            .collect())
    }
}
