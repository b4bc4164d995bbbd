//! One-shot token delivery from the OAuth callback.
//!
//! The callback leaves an `admin_token` cookie behind. It is read once,
//! moved into durable storage by the session store, and erased.

use std::path::PathBuf;
use std::sync::Mutex;

use super::DeliveryChannel;

pub const TOKEN_COOKIE: &str = "admin_token";

/// Cookie jar file holding `name=value` pairs separated by `;` or newlines.
pub struct CookieFileChannel {
    path: PathBuf,
}

impl CookieFileChannel {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl DeliveryChannel for CookieFileChannel {
    fn take(&self) -> std::io::Result<Option<String>> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };

        let (token, rest) = split_cookie(&raw, TOKEN_COOKIE);
        if token.is_some() {
            // Erase before handing the token out so it can never be read twice.
            if rest.is_empty() {
                std::fs::remove_file(&self.path)?;
            } else {
                std::fs::write(&self.path, rest.join("\n") + "\n")?;
            }
        }
        Ok(token)
    }
}

/// Extract `name` from a cookie string. Returns its value (if any) and the
/// remaining cookies in their original order.
pub fn split_cookie(raw: &str, name: &str) -> (Option<String>, Vec<String>) {
    let mut found = None;
    let mut rest = Vec::new();

    for pair in raw.split(|c| c == ';' || c == '\n').map(str::trim) {
        if pair.is_empty() {
            continue;
        }
        match pair.split_once('=') {
            Some((k, v)) if k.trim() == name && found.is_none() => {
                found = Some(v.trim().to_string());
            }
            _ => rest.push(pair.to_string()),
        }
    }
    (found, rest)
}

/// In-memory channel for tests and embedders.
#[derive(Default)]
pub struct MemoryChannel {
    cookie: Mutex<Option<String>>,
}

impl MemoryChannel {
    pub fn with_token(token: &str) -> Self {
        Self {
            cookie: Mutex::new(Some(token.to_string())),
        }
    }
}

impl DeliveryChannel for MemoryChannel {
    fn take(&self) -> std::io::Result<Option<String>> {
        Ok(self.cookie.lock().ok().and_then(|mut g| g.take()))
    }
}
