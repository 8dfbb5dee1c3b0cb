//! Pluggable sinks the dispatcher fans entries out to.

pub mod console;
pub mod file;
pub mod mongodb;
pub mod mysql;
pub mod postgres;
pub mod sqlite;

pub(crate) mod ready;

use crate::domain::{Entry, Level};
use crate::error::TransportError;
use std::future::Future;
use std::pin::Pin;

pub use console::{ConsoleOptions, ConsoleTransport};
pub use file::{FileOptions, FileTransport};
pub use mongodb::{MongoDbOptions, MongoDbTransport};
pub use mysql::{MySqlOptions, MySqlTransport};
pub use postgres::{PostgresOptions, PostgresTransport};
pub use sqlite::{SqliteOptions, SqliteTransport};

pub type TransportFuture<'a> = Pin<Box<dyn Future<Output = Result<(), TransportError>> + Send + 'a>>;

/// Contract every sink satisfies.
///
/// Dyn-compatible by using boxed futures instead of `impl Future`. A write
/// awaits the transport's readiness gate, discards entries less severe than
/// the configured minimum, then performs the backing write. A failed
/// backing write never stops fan-out to sibling transports: the dispatcher
/// reports any returned error to the diagnostic channel and carries on, and
/// the database sinks additionally swallow insert failures locally after
/// reporting them.
pub trait Transport: Send + Sync {
    /// Stable identifier used by [`crate::Log::remove_transport_by_name`].
    fn name(&self) -> &str;

    /// Least-severe rank this transport accepts.
    fn min_level(&self) -> Level;

    fn write(&self, entry: Entry) -> TransportFuture<'_>;

    /// Releases owned resources. Idempotent: closing twice must not error
    /// and must not release twice.
    fn close(&self) -> TransportFuture<'_>;
}
