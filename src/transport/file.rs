//! Append-only daily-rotating file transport.
//!
//! One file per UTC date, named `YYYY-MM-DD.log`, each accepted entry
//! appended as one self-delimited JSON line. The rotation date comes from
//! the entry's own timestamp, so entries landing just after midnight open
//! the next day's file even when the process clock lags.

use super::ready::{self, Readiness};
use super::{Transport, TransportFuture};
use crate::diagnostics::{DiagnosticEvent, Diagnostics, TracingDiagnostics};
use crate::domain::{Entry, Level};
use crate::error::TransportError;
use chrono::{DateTime, NaiveDate, Utc};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

#[derive(Debug, Clone)]
pub struct FileOptions {
    /// Directory where daily log files are stored. Required.
    pub folder_path: PathBuf,
    /// Minimum severity accepted by this transport.
    pub level: Level,
}

impl FileOptions {
    pub fn new(folder_path: impl Into<PathBuf>) -> Self {
        Self {
            folder_path: folder_path.into(),
            level: Level::default(),
        }
    }
}

struct FileState {
    file: Option<File>,
    current_date: Option<NaiveDate>,
    closed: bool,
}

pub struct FileTransport {
    min_level: Level,
    folder_path: PathBuf,
    state: Arc<Mutex<FileState>>,
    readiness: Readiness<()>,
    diagnostics: Arc<dyn Diagnostics>,
}

impl std::fmt::Debug for FileTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileTransport")
            .field("min_level", &self.min_level)
            .field("folder_path", &self.folder_path)
            .finish_non_exhaustive()
    }
}

impl FileTransport {
    pub fn new(options: FileOptions) -> Result<Self, TransportError> {
        Self::with_diagnostics(options, Arc::new(TracingDiagnostics))
    }

    pub fn with_diagnostics(
        options: FileOptions,
        diagnostics: Arc<dyn Diagnostics>,
    ) -> Result<Self, TransportError> {
        if options.folder_path.as_os_str().is_empty() {
            return Err(TransportError::MissingOption {
                transport: "file",
                option: "folder_path",
            });
        }

        let state = Arc::new(Mutex::new(FileState {
            file: None,
            current_date: None,
            closed: false,
        }));
        let readiness = ready::arm(Self::init(options.folder_path.clone(), state.clone()));

        Ok(Self {
            min_level: options.level,
            folder_path: options.folder_path,
            state,
            readiness,
            diagnostics,
        })
    }

    /// Readiness work: ensure the directory exists, then open today's file
    /// in append mode.
    async fn init(folder_path: PathBuf, state: Arc<Mutex<FileState>>) -> Result<(), TransportError> {
        tokio::fs::create_dir_all(&folder_path).await?;
        let today = Utc::now().date_naive();
        let mut file = open_for_date(&folder_path, today).await?;

        let mut state = state.lock().await;
        if state.closed {
            // close() won the race with initialization
            let _ = file.shutdown().await;
            return Ok(());
        }
        state.file = Some(file);
        state.current_date = Some(today);
        Ok(())
    }
}

impl Transport for FileTransport {
    fn name(&self) -> &str {
        "file"
    }

    fn min_level(&self) -> Level {
        self.min_level
    }

    fn write(&self, entry: Entry) -> TransportFuture<'_> {
        Box::pin(async move {
            ready::wait(&self.readiness).await?;

            if !self.min_level.permits(entry.level) {
                return Ok(());
            }

            // The lock covers the whole rotate-then-append sequence, so two
            // entries on a date boundary cannot race to open two handles
            // for the new date.
            let mut state = self.state.lock().await;
            if state.closed {
                return Err(TransportError::Closed("file"));
            }

            let entry_date = entry_date(&entry);
            if state.current_date != Some(entry_date) {
                // The old date's handle is fully closed before the new
                // date's file is opened; never both at once.
                if let Some(mut old) = state.file.take() {
                    old.flush().await?;
                    old.shutdown().await?;
                }
                state.file = Some(open_for_date(&self.folder_path, entry_date).await?);
                state.current_date = Some(entry_date);
            }

            let file = state.file.as_mut().ok_or(TransportError::Closed("file"))?;
            let mut line = serde_json::to_string(&entry)?;
            line.push('\n');
            // One write per record. write_all suspends while the OS buffer
            // is full; returning means the bytes were handed to the OS,
            // not that they reached disk.
            file.write_all(line.as_bytes()).await?;
            file.flush().await?;
            Ok(())
        })
    }

    fn close(&self) -> TransportFuture<'_> {
        Box::pin(async move {
            // Let in-flight initialization settle so its handle is not
            // leaked; a failed initialization leaves nothing to release.
            let _ = ready::wait(&self.readiness).await;

            let mut state = self.state.lock().await;
            if state.closed {
                return Ok(());
            }
            state.closed = true;
            state.current_date = None;

            if let Some(mut file) = state.file.take() {
                let ended = async {
                    file.flush().await?;
                    file.shutdown().await
                }
                .await;
                if let Err(err) = ended {
                    self.diagnostics.report(DiagnosticEvent::CloseFailed {
                        transport: "file".to_string(),
                        error: err.to_string(),
                    });
                    return Err(TransportError::Io(err));
                }
            }
            Ok(())
        })
    }
}

fn entry_date(entry: &Entry) -> NaiveDate {
    DateTime::parse_from_rfc3339(&entry.timestamp)
        .map(|ts| ts.with_timezone(&Utc).date_naive())
        .unwrap_or_else(|_| Utc::now().date_naive())
}

async fn open_for_date(folder_path: &Path, date: NaiveDate) -> Result<File, TransportError> {
    let path = folder_path.join(format!("{date}.log"));
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    Ok(file)
}
