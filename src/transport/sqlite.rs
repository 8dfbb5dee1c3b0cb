//! Embedded-SQL transport (libsql-style URL addressing).
//!
//! Readiness work: resolve a client through the injected connector, then
//! idempotently create the log table and its indexes. The driver cost is
//! paid on first use, never at construction.

use super::ready::{self, Readiness};
use super::{Transport, TransportFuture};
use crate::diagnostics::{DiagnosticEvent, Diagnostics, TracingDiagnostics};
use crate::domain::{Entry, Level};
use crate::error::TransportError;
use crate::port::{IndexKind, IndexSpec, SqlClient, SqlConnection, SqlConnector, SqlStatement, SqlValue};
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Debug, Clone)]
pub struct SqliteOptions {
    /// Store location, e.g. `file:./logs.db` or a remote URL. Required.
    pub url: String,
    /// Token for URL-addressed remote stores.
    pub auth_token: Option<String>,
    /// Target table, created on readiness when missing.
    pub table: String,
    /// Indexes ensured in addition to the timestamp/level defaults.
    pub extra_indexes: Vec<IndexSpec>,
    /// Minimum severity accepted by this transport.
    pub level: Level,
}

impl SqliteOptions {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            auth_token: None,
            table: "logs".to_string(),
            extra_indexes: Vec::new(),
            level: Level::default(),
        }
    }
}

pub struct SqliteTransport {
    min_level: Level,
    table: String,
    readiness: Readiness<Arc<dyn SqlClient>>,
    closed: Mutex<bool>,
    diagnostics: Arc<dyn Diagnostics>,
}

impl std::fmt::Debug for SqliteTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteTransport")
            .field("min_level", &self.min_level)
            .field("table", &self.table)
            .finish_non_exhaustive()
    }
}

impl SqliteTransport {
    pub fn new(
        options: SqliteOptions,
        connector: Arc<dyn SqlConnector>,
    ) -> Result<Self, TransportError> {
        Self::with_diagnostics(options, connector, Arc::new(TracingDiagnostics))
    }

    pub fn with_diagnostics(
        options: SqliteOptions,
        connector: Arc<dyn SqlConnector>,
        diagnostics: Arc<dyn Diagnostics>,
    ) -> Result<Self, TransportError> {
        if options.url.trim().is_empty() {
            return Err(TransportError::MissingOption {
                transport: "sqlite",
                option: "url",
            });
        }

        let table = options.table.clone();
        let config = SqlConnection::Url {
            url: options.url.clone(),
            auth_token: options.auth_token.clone(),
        };
        let target = format!("{}, table: {}", options.url, options.table);
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
                transport: "sqlite".to_string(),
                target,
            });
            Ok(client)
        });

        Ok(Self {
            min_level: options.level,
            table,
            readiness,
            closed: Mutex::new(false),
            diagnostics,
        })
    }
}

impl Transport for SqliteTransport {
    fn name(&self) -> &str {
        "sqlite"
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
                return Err(TransportError::Closed("sqlite"));
            }

            // A failed insert is reported, never raised; siblings and the
            // caller are unaffected.
            if let Err(err) = client.execute(insert_statement(&self.table, &entry)).await {
                self.diagnostics.report(DiagnosticEvent::WriteFailed {
                    transport: "sqlite".to_string(),
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

            // A connection only exists when initialization succeeded.
            if let Ok(client) = self.readiness.clone().await {
                if let Err(err) = client.close().await {
                    self.diagnostics.report(DiagnosticEvent::CloseFailed {
                        transport: "sqlite".to_string(),
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
             id INTEGER PRIMARY KEY AUTOINCREMENT, \
             timestamp TEXT NOT NULL, \
             level TEXT NOT NULL, \
             message TEXT NOT NULL, \
             meta TEXT)"
        )),
        SqlStatement::new(format!(
            "CREATE INDEX IF NOT EXISTS idx_{table}_timestamp ON {table}(timestamp DESC)"
        )),
        SqlStatement::new(format!(
            "CREATE INDEX IF NOT EXISTS idx_{table}_level ON {table}(level)"
        )),
    ]
}

// Text indexes have no portable SQL rendering; such keys fall back to a
// plain ascending column.
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
        "INSERT INTO {table} (timestamp, level, message, meta) VALUES (?, ?, ?, ?)"
    ))
    .bind(SqlValue::Text(entry.timestamp.clone()))
    .bind(SqlValue::Text(entry.level.as_str().to_string()))
    .bind(SqlValue::Text(entry.message.clone()))
    .bind(meta)
}
