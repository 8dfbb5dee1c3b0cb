use super::{Transport, TransportFuture};
use crate::domain::{Entry, Level};

#[derive(Debug, Clone)]
pub struct ConsoleOptions {
    /// Minimum severity accepted by this transport.
    pub level: Level,
}

impl Default for ConsoleOptions {
    fn default() -> Self {
        Self {
            level: Level::default(),
        }
    }
}

/// Writes one formatted line per entry to the process's standard streams:
/// `error` and `warn` go to stderr, everything else to stdout. There is no
/// external connection, so readiness is immediate and close is a no-op.
pub struct ConsoleTransport {
    min_level: Level,
    sink: ConsoleSink,
}

enum ConsoleSink {
    Process,
    #[cfg(test)]
    Capture(std::sync::Arc<std::sync::Mutex<Vec<String>>>),
}

impl ConsoleTransport {
    #[must_use]
    pub fn new(options: ConsoleOptions) -> Self {
        Self {
            min_level: options.level,
            sink: ConsoleSink::Process,
        }
    }

    /// Redirects emitted lines into a buffer instead of the real streams.
    #[cfg(test)]
    pub(crate) fn captured(
        options: ConsoleOptions,
    ) -> (Self, std::sync::Arc<std::sync::Mutex<Vec<String>>>) {
        let lines = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let transport = Self {
            min_level: options.level,
            sink: ConsoleSink::Capture(lines.clone()),
        };
        (transport, lines)
    }

    fn format(entry: &Entry) -> String {
        let text = format!(
            "{} [{}] {}",
            entry.timestamp,
            entry.level.as_str().to_uppercase(),
            entry.message
        );
        match &entry.meta {
            Some(meta) => format!("{text} {meta}"),
            None => text,
        }
    }

    fn use_stderr(level: Level) -> bool {
        matches!(level, Level::Error | Level::Warn)
    }

    fn emit(&self, level: Level, line: String) {
        match &self.sink {
            ConsoleSink::Process => {
                if Self::use_stderr(level) {
                    eprintln!("{line}");
                } else {
                    println!("{line}");
                }
            }
            #[cfg(test)]
            ConsoleSink::Capture(lines) => {
                lines.lock().unwrap().push(line);
            }
        }
    }
}

impl Transport for ConsoleTransport {
    fn name(&self) -> &str {
        "console"
    }

    fn min_level(&self) -> Level {
        self.min_level
    }

    fn write(&self, entry: Entry) -> TransportFuture<'_> {
        Box::pin(async move {
            if !self.min_level.permits(entry.level) {
                return Ok(());
            }
            self.emit(entry.level, Self::format(&entry));
            Ok(())
        })
    }

    fn close(&self) -> TransportFuture<'_> {
        Box::pin(async { Ok(()) })
    }
}
