//! Shared test support utilities
//!
//! Fake transports, backing-store clients, and a recording diagnostic
//! channel for use in unit and integration tests.

use crate::diagnostics::{DiagnosticEvent, Diagnostics};
use crate::domain::{Entry, Level};
use crate::error::TransportError;
use crate::port::{
    DocumentClient, DocumentConnection, DocumentConnector, IndexSpec, SqlClient, SqlConnection,
    SqlConnector, SqlStatement, SqlValue,
};
use crate::transport::{Transport, TransportFuture};
use anyhow::{Result, anyhow};
use futures::future::BoxFuture;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// In-memory transport that captures accepted entries.
pub struct RecordingTransport {
    name: String,
    min_level: Level,
    entries: Mutex<Vec<Entry>>,
    should_fail: AtomicBool,
    closes: AtomicUsize,
}

impl RecordingTransport {
    pub fn new(name: &str, min_level: Level) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            min_level,
            entries: Mutex::new(Vec::new()),
            should_fail: AtomicBool::new(false),
            closes: AtomicUsize::new(0),
        })
    }

    pub fn set_should_fail(&self, fail: bool) {
        self.should_fail.store(fail, Ordering::SeqCst);
    }

    pub fn entries(&self) -> Vec<Entry> {
        self.entries.lock().unwrap().clone()
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

impl Transport for RecordingTransport {
    fn name(&self) -> &str {
        &self.name
    }

    fn min_level(&self) -> Level {
        self.min_level
    }

    fn write(&self, entry: Entry) -> TransportFuture<'_> {
        Box::pin(async move {
            if self.should_fail.load(Ordering::SeqCst) {
                return Err(TransportError::Backend(anyhow!("simulated write failure")));
            }
            if self.min_level.permits(entry.level) {
                self.entries.lock().unwrap().push(entry);
            }
            Ok(())
        })
    }

    fn close(&self) -> TransportFuture<'_> {
        Box::pin(async move {
            self.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }
}

/// Diagnostic channel that captures reported events for assertions.
#[derive(Default)]
pub struct RecordingDiagnostics {
    events: Mutex<Vec<DiagnosticEvent>>,
}

impl RecordingDiagnostics {
    pub fn events(&self) -> Vec<DiagnosticEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl Diagnostics for RecordingDiagnostics {
    fn report(&self, event: DiagnosticEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// SQL client that records every executed statement.
pub struct FakeSqlClient {
    statements: Mutex<Vec<SqlStatement>>,
    should_fail: AtomicBool,
    closes: AtomicUsize,
}

impl FakeSqlClient {
    pub fn new() -> Self {
        Self {
            statements: Mutex::new(Vec::new()),
            should_fail: AtomicBool::new(false),
            closes: AtomicUsize::new(0),
        }
    }

    pub fn set_should_fail(&self, fail: bool) {
        self.should_fail.store(fail, Ordering::SeqCst);
    }

    pub fn statements(&self) -> Vec<SqlStatement> {
        self.statements.lock().unwrap().clone()
    }

    /// Parameter rows of the recorded INSERT statements (DDL carries no
    /// parameters and is filtered out).
    pub fn inserted_rows(&self) -> Vec<Vec<SqlValue>> {
        self.statements
            .lock()
            .unwrap()
            .iter()
            .filter(|statement| !statement.params.is_empty())
            .map(|statement| statement.params.clone())
            .collect()
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

impl Default for FakeSqlClient {
    fn default() -> Self {
        Self::new()
    }
}

impl SqlClient for FakeSqlClient {
    fn execute(&self, statement: SqlStatement) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            if self.should_fail.load(Ordering::SeqCst) {
                return Err(anyhow!("simulated backend failure"));
            }
            self.statements.lock().unwrap().push(statement);
            Ok(())
        })
    }

    fn close(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            self.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }
}

/// Connector handing out one shared [`FakeSqlClient`], recording the
/// connection parameters it was asked for.
pub struct FakeSqlConnector {
    client: Arc<FakeSqlClient>,
    connections: Mutex<Vec<SqlConnection>>,
    should_fail: AtomicBool,
}

impl FakeSqlConnector {
    pub fn new(client: Arc<FakeSqlClient>) -> Self {
        Self {
            client,
            connections: Mutex::new(Vec::new()),
            should_fail: AtomicBool::new(false),
        }
    }

    pub fn set_should_fail(&self, fail: bool) {
        self.should_fail.store(fail, Ordering::SeqCst);
    }

    pub fn connections(&self) -> Vec<SqlConnection> {
        self.connections.lock().unwrap().clone()
    }
}

impl SqlConnector for FakeSqlConnector {
    fn connect(&self, config: SqlConnection) -> BoxFuture<'_, Result<Arc<dyn SqlClient>>> {
        Box::pin(async move {
            if self.should_fail.load(Ordering::SeqCst) {
                return Err(anyhow!("connection refused"));
            }
            self.connections.lock().unwrap().push(config);
            Ok(self.client.clone() as Arc<dyn SqlClient>)
        })
    }
}

/// Document client that records inserted documents and ensured indexes.
pub struct FakeDocumentClient {
    documents: Mutex<Vec<Value>>,
    indexes: Mutex<Vec<IndexSpec>>,
    should_fail: AtomicBool,
    closes: AtomicUsize,
}

impl FakeDocumentClient {
    pub fn new() -> Self {
        Self {
            documents: Mutex::new(Vec::new()),
            indexes: Mutex::new(Vec::new()),
            should_fail: AtomicBool::new(false),
            closes: AtomicUsize::new(0),
        }
    }

    pub fn set_should_fail(&self, fail: bool) {
        self.should_fail.store(fail, Ordering::SeqCst);
    }

    pub fn documents(&self) -> Vec<Value> {
        self.documents.lock().unwrap().clone()
    }

    pub fn indexes(&self) -> Vec<IndexSpec> {
        self.indexes.lock().unwrap().clone()
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

impl Default for FakeDocumentClient {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentClient for FakeDocumentClient {
    fn insert_document(&self, document: Value) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            if self.should_fail.load(Ordering::SeqCst) {
                return Err(anyhow!("simulated backend failure"));
            }
            self.documents.lock().unwrap().push(document);
            Ok(())
        })
    }

    fn create_index(&self, index: IndexSpec) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            self.indexes.lock().unwrap().push(index);
            Ok(())
        })
    }

    fn close(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            self.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }
}

pub struct FakeDocumentConnector {
    client: Arc<FakeDocumentClient>,
    connections: Mutex<Vec<DocumentConnection>>,
}

impl FakeDocumentConnector {
    pub fn new(client: Arc<FakeDocumentClient>) -> Self {
        Self {
            client,
            connections: Mutex::new(Vec::new()),
        }
    }

    pub fn connections(&self) -> Vec<DocumentConnection> {
        self.connections.lock().unwrap().clone()
    }
}

impl DocumentConnector for FakeDocumentConnector {
    fn connect(&self, config: DocumentConnection) -> BoxFuture<'_, Result<Arc<dyn DocumentClient>>> {
        Box::pin(async move {
            self.connections.lock().unwrap().push(config);
            Ok(self.client.clone() as Arc<dyn DocumentClient>)
        })
    }
}
