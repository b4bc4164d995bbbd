use chrono::{DateTime, Local, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// A barred client address. `ip` is the key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlacklistEntry {
    pub ip: String,
    #[serde(default)]
    pub reason: String,
    /// Either RFC 3339 or SQLite's `YYYY-MM-DD HH:MM:SS` (UTC).
    #[serde(default)]
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewBlacklistEntry<'a> {
    pub ip: &'a str,
    pub reason: &'a str,
}

impl BlacklistEntry {
    pub fn created_display(&self) -> String {
        let raw = self.created_at.trim();
        if let Ok(t) = DateTime::parse_from_rfc3339(raw) {
            return t.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string();
        }
        if let Ok(t) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
            return t.and_utc().with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string();
        }
        raw.to_string()
    }
}
