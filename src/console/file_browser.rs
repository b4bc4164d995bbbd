//! Remote file store browser.
//!
//! A listing is a flat table of rows, each carrying the path it acts on and
//! the actions it offers. Resolving a `(row, action)` pair goes through
//! [`Listing::command`], so the browser never stores per-row closures.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Method};
use tokio::io::AsyncWriteExt;

use crate::api::{self, AuthenticatedClient, RequestBody};
use crate::errors::{ConsoleError, Result};
use crate::models::files::{format_size, format_time, DirectoryPath, FileEntry};
use crate::notification::{self, Notifier};

use super::{report_failure, Confirm};

pub const PARENT_ROW: &str = "..";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Open,
    Download,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Navigate(DirectoryPath),
    Download(DirectoryPath),
    Delete(DirectoryPath),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowKind {
    Parent,
    Directory,
    File,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRow {
    pub kind: RowKind,
    pub name: String,
    pub target: DirectoryPath,
    pub size: String,
    pub modified: String,
}

impl FileRow {
    pub fn actions(&self) -> &'static [ActionKind] {
        match self.kind {
            RowKind::Parent => &[ActionKind::Open],
            RowKind::Directory => &[ActionKind::Open, ActionKind::Delete],
            RowKind::File => &[ActionKind::Download, ActionKind::Delete],
        }
    }

    fn from_entry(dir: &DirectoryPath, entry: &FileEntry) -> Self {
        Self {
            kind: if entry.is_dir { RowKind::Directory } else { RowKind::File },
            name: entry.name.clone(),
            target: dir.join(&entry.name),
            size: if entry.is_dir {
                "-".to_string()
            } else {
                format_size(entry.size)
            },
            modified: format_time(&entry.mod_time),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Listing {
    pub path: DirectoryPath,
    pub rows: Vec<FileRow>,
}

impl Listing {
    fn build(path: DirectoryPath, entries: &[FileEntry]) -> Self {
        let mut rows = Vec::with_capacity(entries.len() + 1);
        if let Some(parent) = path.parent() {
            rows.push(FileRow {
                kind: RowKind::Parent,
                name: PARENT_ROW.to_string(),
                target: parent,
                size: String::new(),
                modified: String::new(),
            });
        }
        rows.extend(entries.iter().map(|e| FileRow::from_entry(&path, e)));
        Self { path, rows }
    }

    /// The command a row performs for `action`, or `None` when the row does
    /// not offer it.
    pub fn command(&self, row: usize, action: ActionKind) -> Option<Command> {
        let row = self.rows.get(row)?;
        if !row.actions().contains(&action) {
            return None;
        }
        let target = row.target.clone();
        Some(match action {
            ActionKind::Open => Command::Navigate(target),
            ActionKind::Download => Command::Download(target),
            ActionKind::Delete => Command::Delete(target),
        })
    }
}

pub struct FileBrowser {
    client: AuthenticatedClient,
    notifier: Notifier,
    confirm: Arc<dyn Confirm>,
    download_dir: PathBuf,
    listing: Listing,
    upload_selection: Option<PathBuf>,
}

impl FileBrowser {
    pub fn new(
        client: AuthenticatedClient,
        notifier: Notifier,
        confirm: Arc<dyn Confirm>,
        download_dir: PathBuf,
    ) -> Self {
        Self {
            client,
            notifier,
            confirm,
            download_dir,
            listing: Listing::default(),
            upload_selection: None,
        }
    }

    pub fn listing(&self) -> &Listing {
        &self.listing
    }

    pub fn current(&self) -> &DirectoryPath {
        &self.listing.path
    }

    /// Fetch and display `path`. The displayed listing only changes once the
    /// fetch succeeds.
    pub async fn navigate(&mut self, path: DirectoryPath) -> Result<()> {
        let target = path.to_string();
        tracing::debug!(path = %target, "listing directory");

        let entries = match self
            .client
            .get_json::<Option<Vec<FileEntry>>>(api::ADMIN_FILES, &[("path", target.as_str())])
            .await
        {
            Ok(entries) => entries.unwrap_or_default(),
            Err(e) => {
                report_failure(&self.notifier, notification::FILES, "listing files", &e);
                return Err(e);
            }
        };

        self.listing = Listing::build(path, &entries);
        Ok(())
    }

    pub async fn refresh(&mut self) -> Result<()> {
        self.navigate(self.listing.path.clone()).await
    }

    pub async fn dispatch(&mut self, command: Command) -> Result<()> {
        match command {
            Command::Navigate(path) => self.navigate(path).await,
            Command::Download(path) => self.download(&path).await.map(|_| ()),
            Command::Delete(path) => self.delete(&path).await.map(|_| ()),
        }
    }

    /// Fetch a file through the authenticated client and save it under the
    /// download directory, named after its last segment.
    pub async fn download(&self, path: &DirectoryPath) -> Result<PathBuf> {
        let result = self.fetch_to_disk(path).await;
        match &result {
            Ok(saved) => {
                tracing::info!(remote = %path, local = %saved.display(), "downloaded");
                self.notifier
                    .success(notification::FILES, format!("saved {}", saved.display()));
            }
            Err(e) => report_failure(&self.notifier, notification::FILES, "download", e),
        }
        result
    }

    async fn fetch_to_disk(&self, path: &DirectoryPath) -> Result<PathBuf> {
        let name = match path.file_name() {
            Some(name) if name != "." && name != PARENT_ROW => name,
            _ => return Err(ConsoleError::Invalid(format!("cannot download '{}'", path))),
        };

        let remote = path.to_string();
        let stream = self
            .client
            .get_stream(api::ADMIN_FILES_DOWNLOAD, &[("path", remote.as_str())])
            .await?;

        tokio::fs::create_dir_all(&self.download_dir).await?;
        let dest = self.download_dir.join(name);
        let partial = self.download_dir.join(format!("{}.part", name));
        let written = match write_stream(&partial, stream).await {
            Ok(written) => written,
            Err(e) => {
                let _ = tokio::fs::remove_file(&partial).await;
                return Err(e);
            }
        };
        tokio::fs::rename(&partial, &dest).await?;
        tracing::debug!(bytes = written, "download complete");
        Ok(dest)
    }

    /// Delete a file or directory after confirmation. Returns `false` when
    /// the operator declined, in which case nothing is sent.
    pub async fn delete(&mut self, path: &DirectoryPath) -> Result<bool> {
        if !self.confirm.confirm(&format!("Delete '{}'?", path)) {
            tracing::debug!(path = %path, "delete cancelled");
            return Ok(false);
        }

        let target = path.to_string();
        if let Err(e) = self.client.delete(api::ADMIN_FILES, &[("path", target.as_str())]).await {
            report_failure(&self.notifier, notification::FILES, "delete", &e);
            return Err(e);
        }

        tracing::info!(path = %target, "deleted");
        self.notifier.success(notification::FILES, format!("deleted {}", target));
        self.refresh().await?;
        Ok(true)
    }

    pub fn select_upload(&mut self, file: impl Into<PathBuf>) {
        self.upload_selection = Some(file.into());
    }

    pub fn selected_upload(&self) -> Option<&Path> {
        self.upload_selection.as_deref()
    }

    /// Upload the selected local file into the current directory. The
    /// selection is consumed whether or not the upload succeeds.
    pub async fn upload(&mut self) -> Result<DirectoryPath> {
        let file = self
            .upload_selection
            .take()
            .ok_or_else(|| ConsoleError::Invalid("no file selected".into()))?;

        let result = self.send_file(&file).await;
        match result {
            Ok(target) => {
                tracing::info!(path = %target, "uploaded");
                self.notifier
                    .success(notification::FILES, format!("uploaded {}", target));
                self.refresh().await?;
                Ok(target)
            }
            Err(e) => {
                report_failure(&self.notifier, notification::FILES, "upload", &e);
                Err(e)
            }
        }
    }

    async fn send_file(&self, file: &Path) -> Result<DirectoryPath> {
        let name = file
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| ConsoleError::Invalid(format!("'{}' has no file name", file.display())))?
            .to_string();
        let handle = tokio::fs::File::open(file).await?;
        let len = handle.metadata().await?.len();

        let target = self.listing.path.join(&name);
        let part = Part::stream_with_length(Body::from(handle), len).file_name(name);
        let form = Form::new().part("file", part);
        let remote = target.to_string();
        self.client
            .request(
                Method::POST,
                api::ADMIN_FILES,
                &[("path", remote.as_str())],
                RequestBody::Multipart(form),
            )
            .await?;
        Ok(target)
    }

    pub fn reset(&mut self) {
        self.listing = Listing::default();
        self.upload_selection = None;
    }
}

/// Copy a response body into `dest` chunk by chunk. Returns bytes written.
async fn write_stream<S>(dest: &Path, stream: S) -> Result<u64>
where
    S: Stream<Item = reqwest::Result<Bytes>>,
{
    futures::pin_mut!(stream);
    let mut file = tokio::fs::File::create(dest).await?;
    let mut written = 0u64;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;
    Ok(written)
}
