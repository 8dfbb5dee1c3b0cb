#![warn(rust_2018_idioms)]

pub mod diagnostics;
pub mod domain;
pub mod error;
pub mod log;
pub mod port;
pub mod test_support;
pub mod transport;

pub use crate::log::Log;
pub use diagnostics::{DiagnosticEvent, Diagnostics, TracingDiagnostics};
pub use domain::{Entry, Level};
pub use error::{LogError, TransportError};
pub use transport::{
    ConsoleOptions, ConsoleTransport, FileOptions, FileTransport, MongoDbOptions, MongoDbTransport,
    MySqlOptions, MySqlTransport, PostgresOptions, PostgresTransport, SqliteOptions,
    SqliteTransport, Transport,
};
