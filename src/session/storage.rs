use std::path::PathBuf;
use std::sync::Mutex;

use super::TokenStorage;

/// Token persisted to a single file, the CLI counterpart of browser local storage.
pub struct FileTokenStorage {
    path: PathBuf,
}

impl FileTokenStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl TokenStorage for FileTokenStorage {
    fn load(&self) -> std::io::Result<Option<String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(s) => Ok(Some(s.trim().to_string())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn store(&self, token: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(&self.path, token)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600))?;
        }
        Ok(())
    }

    fn remove(&self) -> std::io::Result<()> {
        match std::fs::remove_file(&self.path) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}

/// Process-local storage, used by tests and embedders without a filesystem.
#[derive(Default)]
pub struct MemoryTokenStorage {
    slot: Mutex<Option<String>>,
}

impl MemoryTokenStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: &str) -> Self {
        Self {
            slot: Mutex::new(Some(token.to_string())),
        }
    }
}

impl TokenStorage for MemoryTokenStorage {
    fn load(&self) -> std::io::Result<Option<String>> {
        Ok(self.slot.lock().map(|g| g.clone()).unwrap_or(None))
    }

    fn store(&self, token: &str) -> std::io::Result<()> {
        if let Ok(mut guard) = self.slot.lock() {
            *guard = Some(token.to_string());
        }
        Ok(())
    }

    fn remove(&self) -> std::io::Result<()> {
        if let Ok(mut guard) = self.slot.lock() {
            *guard = None;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_storage_roundtrip_and_idempotent_remove() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileTokenStorage::new(dir.path().join("nested").join("session"));

        assert_eq!(storage.load().unwrap(), None);
        storage.store("abc123").unwrap();
        assert_eq!(storage.load().unwrap().as_deref(), Some("abc123"));

        storage.remove().unwrap();
        storage.remove().unwrap();
        assert_eq!(storage.load().unwrap(), None);
    }
}
