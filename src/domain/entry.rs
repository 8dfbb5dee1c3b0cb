use super::level::Level;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// A single log record, immutable once constructed.
///
/// This is the canonical representation throughout the pipeline, from the
/// dispatcher through to every transport's backing write. `meta` always
/// serializes (as `null` when absent) because the persisted record shape
/// carries the key unconditionally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    /// ISO-8601 instant, stamped by the dispatcher at log-call time.
    pub timestamp: String,
    pub level: Level,
    pub message: String,
    #[serde(default)]
    pub meta: Option<serde_json::Value>,
}

impl Entry {
    /// Builds an entry stamped with the current UTC time.
    pub fn new(level: Level, message: impl Into<String>, meta: Option<serde_json::Value>) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            level,
            message: message.into(),
            meta,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_stamps_iso8601_utc() {
        let entry = Entry::new(Level::Info, "hello", None);
        assert!(entry.timestamp.ends_with('Z'));
        assert!(chrono::DateTime::parse_from_rfc3339(&entry.timestamp).is_ok());
    }

    #[test]
    fn test_meta_serializes_as_null_when_absent() {
        let entry = Entry {
            timestamp: "2025-01-10T12:00:00.000Z".to_string(),
            level: Level::Warn,
            message: "disk almost full".to_string(),
            meta: None,
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(
            json,
            json!({
                "timestamp": "2025-01-10T12:00:00.000Z",
                "level": "warn",
                "message": "disk almost full",
                "meta": null,
            })
        );
    }

    #[test]
    fn test_meta_round_trips_structured_payload() {
        let entry = Entry::new(Level::Debug, "ctx", Some(json!({"user": 42})));
        let line = serde_json::to_string(&entry).unwrap();
        let back: Entry = serde_json::from_str(&line).unwrap();
        assert_eq!(back, entry);
    }
}
