//! Operator-facing messages.
//!
//! Each controller owns a named region. A notice posted to a region is
//! visible for [`NOTICE_TTL`] and then disappears on its own; expiry is
//! checked lazily on read. Posting to a region that was never registered
//! degrades to a blocking alert for errors.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::errors::ConsoleError;

pub const NOTICE_TTL: Duration = Duration::from_secs(5);

pub const LOGIN: &str = "login";
pub const CONFIG: &str = "config";
pub const FILES: &str = "files";
pub const BLACKLIST: &str = "blacklist";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Success,
    Error,
}

#[derive(Debug, Clone)]
pub struct Notice {
    pub kind: NoticeKind,
    pub text: String,
    expires_at: Instant,
}

/// Blocking fallback used when a region is missing.
pub type AlertFn = Arc<dyn Fn(&str) + Send + Sync>;

#[derive(Clone)]
pub struct Notifier {
    regions: Arc<Mutex<HashMap<String, Option<Notice>>>>,
    alert: AlertFn,
    ttl: Duration,
}

impl Notifier {
    pub fn new(alert: AlertFn) -> Self {
        Self {
            regions: Arc::new(Mutex::new(HashMap::new())),
            alert,
            ttl: NOTICE_TTL,
        }
    }

    /// Notifier with the four console regions registered and alerts written
    /// to stderr.
    pub fn console() -> Self {
        let notifier = Self::new(Arc::new(|text: &str| eprintln!("!! {}", text)));
        for region in [LOGIN, CONFIG, FILES, BLACKLIST] {
            notifier.register(region);
        }
        notifier
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn register(&self, region: &str) {
        if let Ok(mut regions) = self.regions.lock() {
            regions.entry(region.to_string()).or_insert(None);
        }
    }

    pub fn unregister(&self, region: &str) {
        if let Ok(mut regions) = self.regions.lock() {
            regions.remove(region);
        }
    }

    /// Post a notice. Never fails the caller: a missing region is logged and,
    /// for errors, raised as an alert instead.
    pub fn show(&self, region: &str, kind: NoticeKind, text: impl Into<String>) {
        let text = text.into();
        if let Err(e) = self.try_show(region, kind, &text) {
            tracing::warn!("{}", e);
            if kind == NoticeKind::Error {
                (self.alert)(&text);
            }
        }
    }

    pub fn success(&self, region: &str, text: impl Into<String>) {
        self.show(region, NoticeKind::Success, text);
    }

    pub fn error(&self, region: &str, text: impl Into<String>) {
        self.show(region, NoticeKind::Error, text);
    }

    pub fn try_show(&self, region: &str, kind: NoticeKind, text: &str) -> Result<(), ConsoleError> {
        let mut regions = self
            .regions
            .lock()
            .map_err(|_| ConsoleError::RenderTargetMissing(region.to_string()))?;
        let slot = regions
            .get_mut(region)
            .ok_or_else(|| ConsoleError::RenderTargetMissing(region.to_string()))?;
        *slot = Some(Notice {
            kind,
            text: text.to_string(),
            expires_at: Instant::now() + self.ttl,
        });
        Ok(())
    }

    /// The live notice for a region, if any.
    pub fn current(&self, region: &str) -> Option<Notice> {
        let mut regions = self.regions.lock().ok()?;
        let slot = regions.get_mut(region)?;
        if matches!(slot, Some(n) if Instant::now() >= n.expires_at) {
            *slot = None;
        }
        slot.clone()
    }

    pub fn clear_all(&self) {
        if let Ok(mut regions) = self.regions.lock() {
            for slot in regions.values_mut() {
                *slot = None;
            }
        }
    }
}
