//! Document-store transport.
//!
//! Readiness work: resolve a client for the target collection, then ensure
//! the default indexes (timestamp descending, level ascending, message
//! text) plus any caller-specified ones. All index creation is idempotent
//! on the client side.

use super::ready::{self, Readiness};
use super::{Transport, TransportFuture};
use crate::diagnostics::{DiagnosticEvent, Diagnostics, TracingDiagnostics};
use crate::domain::{Entry, Level};
use crate::error::TransportError;
use crate::port::{DocumentClient, DocumentConnection, DocumentConnector, IndexSpec};
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Debug, Clone)]
pub struct MongoDbOptions {
    /// Connection string. Required.
    pub uri: String,
    /// Database name. Required.
    pub db_name: String,
    /// Collection name. Required.
    pub collection: String,
    /// Indexes ensured in addition to the defaults.
    pub indexes: Vec<IndexSpec>,
    /// Minimum severity accepted by this transport.
    pub level: Level,
}

impl MongoDbOptions {
    pub fn new(
        uri: impl Into<String>,
        db_name: impl Into<String>,
        collection: impl Into<String>,
    ) -> Self {
        Self {
            uri: uri.into(),
            db_name: db_name.into(),
            collection: collection.into(),
            indexes: Vec::new(),
            level: Level::default(),
        }
    }

    fn validate(&self) -> Result<(), TransportError> {
        for (option, value) in [
            ("uri", &self.uri),
            ("db_name", &self.db_name),
            ("collection", &self.collection),
        ] {
            if value.trim().is_empty() {
                return Err(TransportError::MissingOption {
                    transport: "mongodb",
                    option,
                });
            }
        }
        Ok(())
    }
}

pub struct MongoDbTransport {
    min_level: Level,
    readiness: Readiness<Arc<dyn DocumentClient>>,
    closed: Mutex<bool>,
    diagnostics: Arc<dyn Diagnostics>,
}

impl std::fmt::Debug for MongoDbTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MongoDbTransport")
            .field("min_level", &self.min_level)
            .finish_non_exhaustive()
    }
}

impl MongoDbTransport {
    pub fn new(
        options: MongoDbOptions,
        connector: Arc<dyn DocumentConnector>,
    ) -> Result<Self, TransportError> {
        Self::with_diagnostics(options, connector, Arc::new(TracingDiagnostics))
    }

    pub fn with_diagnostics(
        options: MongoDbOptions,
        connector: Arc<dyn DocumentConnector>,
        diagnostics: Arc<dyn Diagnostics>,
    ) -> Result<Self, TransportError> {
        options.validate()?;

        let config = DocumentConnection {
            uri: options.uri.clone(),
            db_name: options.db_name.clone(),
            collection: options.collection.clone(),
        };
        let target = format!("{}.{}", options.db_name, options.collection);
        let extra_indexes = options.indexes.clone();
        let diag = diagnostics.clone();

        let readiness = ready::arm(async move {
            let client = connector
                .connect(config)
                .await
                .map_err(TransportError::Backend)?;

            let mut indexes = vec![
                IndexSpec::descending("timestamp"),
                IndexSpec::ascending("level"),
                IndexSpec::text("message"),
            ];
            indexes.extend(extra_indexes);
            for index in indexes {
                client
                    .create_index(index)
                    .await
                    .map_err(TransportError::Backend)?;
            }

            diag.report(DiagnosticEvent::Connected {
                transport: "mongodb".to_string(),
                target,
            });
            Ok(client)
        });

        Ok(Self {
            min_level: options.level,
            readiness,
            closed: Mutex::new(false),
            diagnostics,
        })
    }
}

impl Transport for MongoDbTransport {
    fn name(&self) -> &str {
        "mongodb"
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
                return Err(TransportError::Closed("mongodb"));
            }

            if let Err(err) = client.insert_document(document(&entry)).await {
                self.diagnostics.report(DiagnosticEvent::WriteFailed {
                    transport: "mongodb".to_string(),
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
                        transport: "mongodb".to_string(),
                        error: err.to_string(),
                    });
                    return Err(TransportError::Backend(err));
                }
            }
            Ok(())
        })
    }
}

fn document(entry: &Entry) -> Value {
    json!({
        "timestamp": entry.timestamp,
        "level": entry.level.as_str(),
        "message": entry.message,
        "meta": entry.meta.clone().unwrap_or(Value::Null),
    })
}
