//! Relational-server transport speaking the MySQL dialect.

use super::ready::{self, Readiness};
use super::{Transport, TransportFuture};
use crate::diagnostics::{DiagnosticEvent, Diagnostics, TracingDiagnostics};
use crate::domain::{Entry, Level};
use crate::error::TransportError;
use crate::port::{IndexKind, IndexSpec, SqlClient, SqlConnection, SqlConnector, SqlStatement, SqlValue};
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Debug, Clone)]
pub struct MySqlOptions {
    /// Server hostname or IP. Required.
    pub host: String,
    /// Database user. Required.
    pub user: String,
    pub password: Option<String>,
    /// Database name. Required.
    pub database: String,
    pub port: u16,
    /// Target table, created on readiness when missing.
    pub table: String,
    /// Indexes ensured in addition to the timestamp/level defaults.
    pub extra_indexes: Vec<IndexSpec>,
    /// Minimum severity accepted by this transport.
    pub level: Level,
}

impl MySqlOptions {
    pub fn new(
        host: impl Into<String>,
        user: impl Into<String>,
        database: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            user: user.into(),
            password: None,
            database: database.into(),
            port: 3306,
            table: "logs".to_string(),
            extra_indexes: Vec::new(),
            level: Level::default(),
        }
    }

    fn validate(&self) -> Result<(), TransportError> {
        for (option, value) in [
            ("host", &self.host),
            ("user", &self.user),
            ("database", &self.database),
        ] {
            if value.trim().is_empty() {
                return Err(TransportError::MissingOption {
                    transport: "mysql",
                    option,
                });
            }
        }
        Ok(())
    }
}

pub struct MySqlTransport {
    min_level: Level,
    table: String,
    readiness: Readiness<Arc<dyn SqlClient>>,
    closed: Mutex<bool>,
    diagnostics: Arc<dyn Diagnostics>,
}

impl std::fmt::Debug for MySqlTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MySqlTransport")
            .field("min_level", &self.min_level)
            .field("table", &self.table)
            .finish_non_exhaustive()
    }
}

impl MySqlTransport {
    pub fn new(
        options: MySqlOptions,
        connector: Arc<dyn SqlConnector>,
    ) -> Result<Self, TransportError> {
        Self::with_diagnostics(options, connector, Arc::new(TracingDiagnostics))
    }

    pub fn with_diagnostics(
        options: MySqlOptions,
        connector: Arc<dyn SqlConnector>,
        diagnostics: Arc<dyn Diagnostics>,
    ) -> Result<Self, TransportError> {
        options.validate()?;

        let table = options.table.clone();
        let config = SqlConnection::Server {
            host: options.host.clone(),
            port: options.port,
            user: options.user.clone(),
            password: options.password.clone(),
            database: options.database.clone(),
            ssl: false,
        };
        let target = format!(
            "{}:{}/{}, table: {}",
            options.host, options.port, options.database, options.table
        );
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
                transport: "mysql".to_string(),
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

impl Transport for MySqlTransport {
    fn name(&self) -> &str {
        "mysql"
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
                return Err(TransportError::Closed("mysql"));
            }

            if let Err(err) = client.execute(insert_statement(&self.table, &entry)).await {
                self.diagnostics.report(DiagnosticEvent::WriteFailed {
                    transport: "mysql".to_string(),
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
                        transport: "mysql".to_string(),
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
            "CREATE TABLE IF NOT EXISTS `{table}` (\
             id BIGINT AUTO_INCREMENT PRIMARY KEY, \
             timestamp DATETIME(6) NOT NULL, \
             level VARCHAR(16) NOT NULL, \
             message TEXT NOT NULL, \
             meta JSON NULL)"
        )),
        SqlStatement::new(format!(
            "CREATE INDEX IF NOT EXISTS idx_{table}_timestamp ON `{table}` (timestamp DESC)"
        )),
        SqlStatement::new(format!(
            "CREATE INDEX IF NOT EXISTS idx_{table}_level ON `{table}` (level)"
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
        "CREATE INDEX IF NOT EXISTS idx_{table}_{} ON `{table}` ({})",
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
        "INSERT INTO `{table}` (timestamp, level, message, meta) VALUES (?, ?, ?, ?)"
    ))
    .bind(SqlValue::Text(entry.timestamp.clone()))
    .bind(SqlValue::Text(entry.level.as_str().to_string()))
    .bind(SqlValue::Text(entry.message.clone()))
    .bind(meta)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakeSqlClient, FakeSqlConnector, RecordingDiagnostics};

    fn fakes() -> (Arc<FakeSqlClient>, Arc<FakeSqlConnector>) {
        let client = Arc::new(FakeSqlClient::new());
        let connector = Arc::new(FakeSqlConnector::new(client.clone()));
        (client, connector)
    }

    #[test]
    fn test_required_options_are_validated_individually() {
        let (_, connector) = fakes();
        for (options, option) in [
            (MySqlOptions::new("", "app", "prod"), "host"),
            (MySqlOptions::new("db.local", "", "prod"), "user"),
            (MySqlOptions::new("db.local", "app", ""), "database"),
        ] {
            let err = MySqlTransport::new(options, connector.clone()).unwrap_err();
            assert_eq!(
                err.to_string(),
                format!("mysql transport: '{option}' option is required")
            );
        }
    }

    #[tokio::test]
    async fn test_connector_receives_server_parameters() {
        let (_, connector) = fakes();
        let mut options = MySqlOptions::new("db.local", "app", "prod");
        options.password = Some("hunter2".to_string());
        let transport = MySqlTransport::new(options, connector.clone()).unwrap();
        transport
            .write(Entry::new(Level::Info, "up", None))
            .await
            .unwrap();

        assert_eq!(
            connector.connections(),
            vec![SqlConnection::Server {
                host: "db.local".to_string(),
                port: 3306,
                user: "app".to_string(),
                password: Some("hunter2".to_string()),
                database: "prod".to_string(),
                ssl: false,
            }]
        );
    }

    #[tokio::test]
    async fn test_schema_uses_mysql_dialect() {
        let (client, connector) = fakes();
        let transport =
            MySqlTransport::new(MySqlOptions::new("db.local", "app", "prod"), connector).unwrap();
        transport
            .write(Entry::new(Level::Info, "up", None))
            .await
            .unwrap();

        let statements = client.statements();
        assert!(statements[0].sql.contains("CREATE TABLE IF NOT EXISTS `logs`"));
        assert!(statements[0].sql.contains("BIGINT AUTO_INCREMENT"));
        assert!(statements[0].sql.contains("meta JSON NULL"));
        assert!(statements[1].sql.contains("timestamp DESC"));
    }

    #[tokio::test]
    async fn test_insert_binds_question_mark_placeholders() {
        let (client, connector) = fakes();
        let transport =
            MySqlTransport::new(MySqlOptions::new("db.local", "app", "prod"), connector).unwrap();
        let entry = Entry::new(Level::Error, "deadlock", None);
        transport.write(entry.clone()).await.unwrap();

        let insert = client.statements().pop().unwrap();
        assert!(insert.sql.contains("VALUES (?, ?, ?, ?)"));
        assert_eq!(insert.params[0], SqlValue::Text(entry.timestamp));
        assert_eq!(insert.params[3], SqlValue::Null);
    }

    #[tokio::test]
    async fn test_failed_insert_reports_and_returns_ok() {
        let (client, connector) = fakes();
        let diagnostics = Arc::new(RecordingDiagnostics::default());
        let transport = MySqlTransport::with_diagnostics(
            MySqlOptions::new("db.local", "app", "prod"),
            connector,
            diagnostics.clone(),
        )
        .unwrap();
        transport
            .write(Entry::new(Level::Info, "first", None))
            .await
            .unwrap();

        client.set_should_fail(true);
        transport
            .write(Entry::new(Level::Info, "second", None))
            .await
            .unwrap();

        assert!(diagnostics.events().iter().any(|event| matches!(
            event,
            DiagnosticEvent::WriteFailed { transport, .. } if transport == "mysql"
        )));
    }

    #[tokio::test]
    async fn test_close_before_any_write_still_releases_cleanly() {
        let (client, connector) = fakes();
        let transport =
            MySqlTransport::new(MySqlOptions::new("db.local", "app", "prod"), connector).unwrap();

        transport.close().await.unwrap();
        transport.close().await.unwrap();
        assert_eq!(client.close_count(), 1);
    }
}
