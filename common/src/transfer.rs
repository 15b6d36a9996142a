//! Transfer units: one upload or one download, bracketed by a limiter permit.
//!
//! The permit covers the whole I/O section of a unit. For uploads from disk that includes reading
//! the file, so local reads count against the same budget as network calls; for
//! download-and-save it includes creating parent directories and writing the file.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use reqwest::StatusCode;
use tracing::instrument;

use crate::error::{Error, Result};
use crate::path::RemoteLocation;
use crate::transport::{Request, Response, Transport};

/// Outcome of a single unit inside a batch.
pub type TransferResult<T> = Result<T>;

/// Transport and limiter shared by every unit a client schedules. Cloning is cheap.
#[derive(Clone)]
pub struct Session {
    transport: Arc<dyn Transport>,
    limiter: throttle::Limiter,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("limiter", &self.limiter)
            .finish_non_exhaustive()
    }
}

impl Session {
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>, limiter: throttle::Limiter) -> Self {
        Self { transport, limiter }
    }

    #[must_use]
    pub fn limiter(&self) -> &throttle::Limiter {
        &self.limiter
    }

    pub(crate) async fn send(&self, request: Request) -> Result<Response> {
        self.transport.send(request).await
    }
}

/// Input shape accepted at the API boundary.
#[derive(Debug, Clone)]
pub enum Payload {
    Bytes(Bytes),
    Path(PathBuf),
}

impl Payload {
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Payload::Bytes(_) => "bytes",
            Payload::Path(_) => "path",
        }
    }
}

impl From<Bytes> for Payload {
    fn from(data: Bytes) -> Self {
        Payload::Bytes(data)
    }
}

impl From<Vec<u8>> for Payload {
    fn from(data: Vec<u8>) -> Self {
        Payload::Bytes(data.into())
    }
}

impl From<&'static [u8]> for Payload {
    fn from(data: &'static [u8]) -> Self {
        Payload::Bytes(Bytes::from_static(data))
    }
}

impl From<PathBuf> for Payload {
    fn from(path: PathBuf) -> Self {
        Payload::Path(path)
    }
}

impl From<&Path> for Payload {
    fn from(path: &Path) -> Self {
        Payload::Path(path.to_path_buf())
    }
}

/// A validated upload: an in-memory payload with its target name, or a local file whose name is
/// derived from its last path component.
#[derive(Debug, Clone)]
pub enum TransferItem {
    Memory { data: Bytes, name: String },
    File { path: PathBuf },
}

impl TransferItem {
    /// An in-memory payload stored as `name`, which must be a single path segment other than
    /// `..`. Separators are rejected so an upload never lands outside the checked destination.
    pub fn memory(data: impl Into<Bytes>, name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let location = RemoteLocation::parse(&name);
        if location.segments().len() != 1 || location.has_parent_segments() {
            return Err(Error::invalid_input(format!(
                "'{name}' is not a usable file name"
            )));
        }
        Ok(TransferItem::Memory {
            data: data.into(),
            name,
        })
    }

    pub fn file(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        file_name_of(&path)?;
        Ok(TransferItem::File { path })
    }

    /// Name the item is stored under on the filer.
    pub fn target_name(&self) -> Result<String> {
        match self {
            TransferItem::Memory { name, .. } => Ok(name.clone()),
            TransferItem::File { path } => file_name_of(path),
        }
    }
}

pub(crate) fn file_name_of(path: &Path) -> Result<String> {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| Error::invalid_input(format!("path {path:?} does not have a file name")))
}

/// Upload one item into the `destination` directory. Non-2xx statuses are returned, not raised.
pub async fn upload(
    session: &Session,
    item: TransferItem,
    destination: &RemoteLocation,
) -> Result<StatusCode> {
    upload_sized(session, item, destination)
        .await
        .map(|(status, _)| status)
}

/// Like [`upload`], also returning the payload size in bytes.
#[instrument(skip(session, item))]
pub async fn upload_sized(
    session: &Session,
    item: TransferItem,
    destination: &RemoteLocation,
) -> Result<(StatusCode, u64)> {
    let _permit = session.limiter.acquire().await;
    let (name, payload) = match item {
        TransferItem::Memory { data, name } => (name, data),
        TransferItem::File { path } => {
            let name = file_name_of(&path)?;
            tracing::debug!("reading {:?}", &path);
            let data = tokio::fs::read(&path)
                .await
                .map_err(|err| Error::io("reading", &path, err))?;
            (name, Bytes::from(data))
        }
    };
    let location = destination.as_directory().join(&name).as_file();
    let file_name = location.file_name().unwrap_or(name.as_str()).to_string();
    let size = payload.len();
    let response = session
        .send(Request::Upload {
            location: location.clone(),
            file_name,
            payload,
        })
        .await?;
    if response.status.is_success() {
        tracing::debug!("uploaded {} bytes to {}", size, &location);
    } else {
        tracing::warn!("upload to {} answered {}", &location, response.status);
    }
    Ok((response.status, size as u64))
}

async fn fetch(
    session: &Session,
    location: &RemoteLocation,
    raise_on_non_success: bool,
) -> Result<Bytes> {
    let response = session
        .send(Request::Get {
            location: location.clone(),
            query: vec![],
            accept_json: false,
        })
        .await?;
    if !response.status.is_success() {
        if raise_on_non_success {
            return Err(Error::RemoteOperationFailed {
                operation: "download",
                location: location.to_string(),
                status: response.status,
            });
        }
        tracing::warn!("download of {} answered {}", location, response.status);
    }
    Ok(response.body)
}

/// Download one location into memory.
#[instrument(skip(session))]
pub async fn download(
    session: &Session,
    location: &RemoteLocation,
    raise_on_non_success: bool,
) -> Result<Bytes> {
    let _permit = session.limiter.acquire().await;
    let body = fetch(session, location, raise_on_non_success).await?;
    tracing::debug!("downloaded {} bytes from {}", body.len(), location);
    Ok(body)
}

/// Download one location and write it to `destination`, creating parent directories first.
/// Returns the number of bytes written.
#[instrument(skip(session))]
pub async fn download_and_save(
    session: &Session,
    location: &RemoteLocation,
    destination: &Path,
    raise_on_non_success: bool,
) -> Result<u64> {
    let _permit = session.limiter.acquire().await;
    let body = fetch(session, location, raise_on_non_success).await?;
    if let Some(parent) = destination.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|err| Error::io("creating directory", parent, err))?;
        }
    }
    tokio::fs::write(destination, &body)
        .await
        .map_err(|err| Error::io("writing", destination, err))?;
    tracing::debug!("saved {} bytes to {:?}", body.len(), destination);
    Ok(body.len() as u64)
}
