//! Seams to the backing stores of the database transports.
//!
//! Each transport is written against a minimal "execute a write" client
//! trait plus a connector that models lazy client acquisition: the driver
//! cost is paid inside the transport's readiness gate, on first use, never
//! at construction. Production driver bindings live in the embedding
//! application; tests substitute fakes.

use anyhow::Result;
use futures::future::BoxFuture;
use std::sync::Arc;

/// Minimal surface of a SQL-speaking backend: execute one statement.
///
/// This trait is dyn-compatible by using boxed futures instead of
/// `impl Future`.
pub trait SqlClient: Send + Sync {
    fn execute(&self, statement: SqlStatement) -> BoxFuture<'_, Result<()>>;
    fn close(&self) -> BoxFuture<'_, Result<()>>;
}

/// Resolves a [`SqlClient`] for the given connection parameters,
/// establishing the connection in the process.
pub trait SqlConnector: Send + Sync {
    fn connect(&self, config: SqlConnection) -> BoxFuture<'_, Result<Arc<dyn SqlClient>>>;
}

/// Connection parameters handed to a [`SqlConnector`].
#[derive(Debug, Clone, PartialEq)]
pub enum SqlConnection {
    /// Embedded or URL-addressed store, e.g. `file:./logs.db`.
    Url {
        url: String,
        auth_token: Option<String>,
    },
    /// Networked relational server.
    Server {
        host: String,
        port: u16,
        user: String,
        password: Option<String>,
        database: String,
        ssl: bool,
    },
}

/// One parameterized SQL statement.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlStatement {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

impl SqlStatement {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    #[must_use]
    pub fn bind(mut self, value: SqlValue) -> Self {
        self.params.push(value);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Text(String),
    Null,
}

/// Minimal surface of a document store: insert one document, ensure one
/// index.
pub trait DocumentClient: Send + Sync {
    fn insert_document(&self, document: serde_json::Value) -> BoxFuture<'_, Result<()>>;
    fn create_index(&self, index: IndexSpec) -> BoxFuture<'_, Result<()>>;
    fn close(&self) -> BoxFuture<'_, Result<()>>;
}

pub trait DocumentConnector: Send + Sync {
    fn connect(&self, config: DocumentConnection) -> BoxFuture<'_, Result<Arc<dyn DocumentClient>>>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentConnection {
    pub uri: String,
    pub db_name: String,
    pub collection: String,
}

/// Index description, technology-neutral.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexSpec {
    pub keys: Vec<(String, IndexKind)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
    Ascending,
    Descending,
    Text,
}

impl IndexSpec {
    pub fn new(keys: Vec<(String, IndexKind)>) -> Self {
        Self { keys }
    }

    pub fn ascending(field: impl Into<String>) -> Self {
        Self::new(vec![(field.into(), IndexKind::Ascending)])
    }

    pub fn descending(field: impl Into<String>) -> Self {
        Self::new(vec![(field.into(), IndexKind::Descending)])
    }

    pub fn text(field: impl Into<String>) -> Self {
        Self::new(vec![(field.into(), IndexKind::Text)])
    }
}
