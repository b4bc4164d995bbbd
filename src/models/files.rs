use std::fmt;

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};

/// One entry in a remote directory listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileEntry {
    pub name: String,
    #[serde(default)]
    pub is_dir: bool,
    /// Only meaningful for files.
    #[serde(default)]
    pub size: u64,
    pub mod_time: DateTime<Utc>,
}

/// A `/`-delimited remote path. Root is the empty sequence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct DirectoryPath {
    segments: Vec<String>,
}

impl DirectoryPath {
    pub fn root() -> Self {
        Self::default()
    }

    /// Empty segments from leading, trailing or doubled slashes are dropped.
    /// Segments are otherwise kept byte for byte.
    pub fn parse(raw: &str) -> Self {
        Self {
            segments: split_segments(raw).collect(),
        }
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// `a/b` → `a`, `a` → root, root → `None`.
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        let mut segments = self.segments.clone();
        segments.pop();
        Some(Self { segments })
    }

    pub fn join(&self, name: &str) -> Self {
        let mut segments = self.segments.clone();
        segments.extend(split_segments(name));
        Self { segments }
    }

    pub fn file_name(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }
}

fn split_segments(raw: &str) -> impl Iterator<Item = String> + '_ {
    raw.split('/').filter(|s| !s.is_empty()).map(String::from)
}

impl fmt::Display for DirectoryPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("/"))
    }
}

const SIZE_UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

/// Human-readable size: largest unit keeping the value under 1024, rounded
/// to two decimals with trailing zeros dropped.
pub fn format_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 B".to_string();
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < SIZE_UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    let rounded = (value * 100.0).round() / 100.0;
    format!("{} {}", rounded, SIZE_UNITS[unit])
}

pub fn format_time(t: &DateTime<Utc>) -> String {
    t.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string()
}
