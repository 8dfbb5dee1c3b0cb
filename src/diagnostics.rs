//! Operator-visible side channel for transport lifecycle and failure
//! notices.
//!
//! The caller of [`crate::Log::log`] never observes transport failures;
//! they are reported here instead. The channel is an injected collaborator
//! rather than a hardcoded console reference so tests can assert on
//! reported events without capturing process-wide output.

use std::fmt;
use tracing::{error, info};

pub trait Diagnostics: Send + Sync {
    fn report(&self, event: DiagnosticEvent);
}

#[derive(Debug, Clone, PartialEq)]
pub enum DiagnosticEvent {
    /// A transport finished its readiness work and is accepting writes.
    Connected { transport: String, target: String },
    /// A transport's backing write failed; the entry was dropped for that
    /// transport only.
    WriteFailed { transport: String, error: String },
    /// Releasing a transport's underlying resource failed.
    CloseFailed { transport: String, error: String },
}

impl fmt::Display for DiagnosticEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosticEvent::Connected { transport, target } => {
                write!(f, "{transport} transport connected to {target}")
            }
            DiagnosticEvent::WriteFailed { transport, error } => {
                write!(f, "{transport} transport failed to write entry: {error}")
            }
            DiagnosticEvent::CloseFailed { transport, error } => {
                write!(f, "{transport} transport failed to close: {error}")
            }
        }
    }
}

/// Default channel: forwards every event to the `tracing` infrastructure.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingDiagnostics;

impl Diagnostics for TracingDiagnostics {
    fn report(&self, event: DiagnosticEvent) {
        match &event {
            DiagnosticEvent::Connected { transport, target } => {
                info!(transport = %transport, target = %target, "log transport connected");
            }
            DiagnosticEvent::WriteFailed { transport, error } => {
                error!(transport = %transport, error = %error, "log transport write failed");
            }
            DiagnosticEvent::CloseFailed { transport, error } => {
                error!(transport = %transport, error = %error, "log transport close failed");
            }
        }
    }
}
