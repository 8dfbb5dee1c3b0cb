//! Relational-server transport speaking the Postgres dialect.
//!
//! Accepts either a full connection string or discrete server fields;
//! exactly the same write path as the MySQL sibling otherwise, with
//! Postgres DDL and `$n` placeholders.

use super::ready::{self, Readiness};
use super::{Transport, TransportFuture};
use crate::diagnostics::{DiagnosticEvent, Diagnostics, TracingDiagnostics};
use crate::domain::{Entry, Level};
use crate::error::TransportError;
use crate::port::{IndexKind, IndexSpec, SqlClient, SqlConnection, SqlConnector, SqlStatement, SqlValue};
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Debug, Clone, Default)]
pub struct PostgresOptions {
    /// Full connection URL; alternative to the discrete server fields.
    pub connection_string: Option<String>,
    pub host: Option<String>,
    /// Defaults to 5432 when the discrete fields are used.
    pub port: Option<u16>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub database: Option<String>,
    pub ssl: bool,
    /// Target table, created on readiness when missing. Defaults to "logs".
    pub table: Option<String>,
    /// Indexes ensured in addition to the timestamp/level defaults.
    pub extra_indexes: Vec<IndexSpec>,
    /// Minimum severity accepted by this transport.
    pub level: Option<Level>,
}

impl PostgresOptions {
    pub fn with_connection_string(connection_string: impl Into<String>) -> Self {
        Self {
            connection_string: Some(connection_string.into()),
            ..Self::default()
        }
    }

    pub fn with_server(
        host: impl Into<String>,
        user: impl Into<String>,
        database: impl Into<String>,
    ) -> Self {
        Self {
            host: Some(host.into()),
            user: Some(user.into()),
            database: Some(database.into()),
            ..Self::default()
        }
    }

    fn connection(&self) -> Result<SqlConnection, TransportError> {
        if let Some(url) = &self.connection_string {
            return Ok(SqlConnection::Url {
                url: url.clone(),
                auth_token: None,
            });
        }
        match (&self.host, &self.user, &self.database) {
            (Some(host), Some(user), Some(database)) => Ok(SqlConnection::Server {
                host: host.clone(),
                port: self.port.unwrap_or(5432),
                user: user.clone(),
                password: self.password.clone(),
                database: database.clone(),
                ssl: self.ssl,
            }),
            _ => Err(TransportError::InvalidOption {
                transport: "postgres",
                reason: "either 'connection_string' or 'host'/'user'/'database' is required"
                    .to_string(),
            }),
        }
    }
}

pub struct PostgresTransport {
    min_level: Level,
    table: String,
    readiness: Readiness<Arc<dyn SqlClient>>,
    closed: Mutex<bool>,
    diagnostics: Arc<dyn Diagnostics>,
}

impl std::fmt::Debug for PostgresTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresTransport")
            .field("min_level", &self.min_level)
            .field("table", &self.table)
            .finish_non_exhaustive()
    }
}

impl PostgresTransport {
    pub fn new(
        options: PostgresOptions,
        connector: Arc<dyn SqlConnector>,
    ) -> Result<Self, TransportError> {
        Self::with_diagnostics(options, connector, Arc::new(TracingDiagnostics))
    }

    pub fn with_diagnostics(
        options: PostgresOptions,
        connector: Arc<dyn SqlConnector>,
        diagnostics: Arc<dyn Diagnostics>,
    ) -> Result<Self, TransportError> {
        let config = options.connection()?;
        let table = options.table.unwrap_or_else(|| "logs".to_string());
        let target = match &config {
            SqlConnection::Url { url, .. } => format!("{url}, table: {table}"),
            SqlConnection::Server {
                host,
                port,
                database,
                ..
            } => format!("{host}:{port}/{database}, table: {table}"),
        };
        let diag = diagnostics.clone();
        let schema_table = table.clone();
        let extra_indexes = options.extra_indexes.clone();

        let readiness = ready::arm(async move {
            let client = connector
                .connect(config)
                .await
                .map_err(TransportError::Backend)?;
            let mut statements = schema_statements(&schema_table);
            statements.extend(
                extra_indexes
                    .iter()
                    .map(|index| index_statement(&schema_table, index)),
            );
            for statement in statements {
                client
                    .execute(statement)
                    .await
                    .map_err(TransportError::Backend)?;
            }
            diag.report(DiagnosticEvent::Connected {
                transport: "postgres".to_string(),
                target,
            });
            Ok(client)
        });

        Ok(Self {
            min_level: options.level.unwrap_or_default(),
            table,
            readiness,
            closed: Mutex::new(false),
            diagnostics,
        })
    }
}

impl Transport for PostgresTransport {
    fn name(&self) -> &str {
        "postgres"
    }

    fn min_level(&self) -> Level {
        self.min_level
    }

    fn write(&self, entry: Entry) -> TransportFuture<'_> {
        Box::pin(async move {
            let client = ready::wait(&self.readiness).await?;

            if !self.min_level.permits(entry.level) {
                return Ok(());
            }
            if *self.closed.lock().await {
                return Err(TransportError::Closed("postgres"));
            }

            if let Err(err) = client.execute(insert_statement(&self.table, &entry)).await {
                self.diagnostics.report(DiagnosticEvent::WriteFailed {
                    transport: "postgres".to_string(),
                    error: err.to_string(),
                });
            }
            Ok(())
        })
    }

    fn close(&self) -> TransportFuture<'_> {
        Box::pin(async move {
            let mut closed = self.closed.lock().await;
            if *closed {
                return Ok(());
            }
            *closed = true;

            if let Ok(client) = self.readiness.clone().await {
                if let Err(err) = client.close().await {
                    self.diagnostics.report(DiagnosticEvent::CloseFailed {
                        transport: "postgres".to_string(),
                        error: err.to_string(),
                    });
                    return Err(TransportError::Backend(err));
                }
            }
            Ok(())
        })
    }
}

fn schema_statements(table: &str) -> Vec<SqlStatement> {
    vec![
        SqlStatement::new(format!(
            "CREATE TABLE IF NOT EXISTS {table} (\
             id SERIAL PRIMARY KEY, \
             timestamp TIMESTAMPTZ NOT NULL, \
             level TEXT NOT NULL, \
             message TEXT NOT NULL, \
             meta JSONB)"
        )),
        SqlStatement::new(format!(
            "CREATE INDEX IF NOT EXISTS idx_{table}_timestamp ON {table}(timestamp DESC)"
        )),
        SqlStatement::new(format!(
            "CREATE INDEX IF NOT EXISTS idx_{table}_level ON {table}(level)"
        )),
    ]
}

fn index_statement(table: &str, index: &IndexSpec) -> SqlStatement {
    let name: Vec<&str> = index.keys.iter().map(|(field, _)| field.as_str()).collect();
    let columns: Vec<String> = index
        .keys
        .iter()
        .map(|(field, kind)| match kind {
            IndexKind::Descending => format!("{field} DESC"),
            _ => field.clone(),
        })
        .collect();
    SqlStatement::new(format!(
        "CREATE INDEX IF NOT EXISTS idx_{table}_{} ON {table}({})",
        name.join("_"),
        columns.join(", ")
    ))
}

fn insert_statement(table: &str, entry: &Entry) -> SqlStatement {
    let meta = match &entry.meta {
        Some(meta) => SqlValue::Text(meta.to_string()),
        None => SqlValue::Null,
    };
    SqlStatement::new(format!(
        "INSERT INTO {table} (timestamp, level, message, meta) VALUES ($1, $2, $3, $4)"
    ))
    .bind(SqlValue::Text(entry.timestamp.clone()))
    .bind(SqlValue::Text(entry.level.as_str().to_string()))
    .bind(SqlValue::Text(entry.message.clone()))
    .bind(meta)
}
