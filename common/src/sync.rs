//! Transfers between the caller and the filer: single items, batches and whole folders.
//!
//! Folder operations walk the whole tree first, then process one directory group at a time in
//! walk order. Files within a group are transferred concurrently under the client's limiter;
//! groups never overlap.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use reqwest::StatusCode;
use tracing::instrument;

use crate::batch;
use crate::client::FilerClient;
use crate::error::{Error, Result};
use crate::path::RemoteLocation;
use crate::transfer::{self, Payload, TransferItem, TransferResult};
use crate::walk;

/// What to upload.
#[derive(Debug, Clone)]
pub enum PushRequest {
    One {
        payload: Payload,
        name: Option<String>,
    },
    Many {
        payloads: Vec<Payload>,
        names: Option<Vec<String>>,
    },
}

impl PushRequest {
    /// In-memory bytes stored as `name`.
    pub fn bytes(data: impl Into<Bytes>, name: impl Into<String>) -> Self {
        PushRequest::One {
            payload: Payload::Bytes(data.into()),
            name: Some(name.into()),
        }
    }

    /// A local file stored under its own name.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        PushRequest::One {
            payload: Payload::Path(path.into()),
            name: None,
        }
    }

    /// Several local files, each stored under its own name.
    pub fn files<P: Into<PathBuf>>(paths: impl IntoIterator<Item = P>) -> Self {
        PushRequest::Many {
            payloads: paths
                .into_iter()
                .map(|path| Payload::Path(path.into()))
                .collect(),
            names: None,
        }
    }

    /// A batch of payloads; byte payloads need one name each.
    #[must_use]
    pub fn batch(payloads: Vec<Payload>, names: Option<Vec<String>>) -> Self {
        PushRequest::Many { payloads, names }
    }
}

#[derive(Debug)]
pub enum PushOutcome {
    One(StatusCode),
    Many(Vec<TransferResult<StatusCode>>),
}

/// What to download, as root-relative paths.
#[derive(Debug, Clone)]
pub enum PullRequest {
    One(String),
    Many(Vec<String>),
}

#[derive(Debug)]
pub enum PullOutcome {
    One(Bytes),
    Many(Vec<TransferResult<Bytes>>),
}

/// Outcomes for the files of one directory group, keyed by file name.
#[derive(Debug)]
pub struct GroupOutcome<T> {
    /// Directory of the group relative to the client root.
    pub relative_path: String,
    pub results: Vec<(String, TransferResult<T>)>,
    /// Payload bytes moved by the successful transfers of the group.
    pub bytes: u64,
}

/// Per-group outcomes of a folder transfer, in walk order.
#[derive(Debug)]
pub struct FolderOutcome<T> {
    pub groups: Vec<GroupOutcome<T>>,
}

impl<T> Default for FolderOutcome<T> {
    fn default() -> Self {
        Self { groups: vec![] }
    }
}

impl<T> FolderOutcome<T> {
    #[must_use]
    pub fn group(&self, relative_path: &str) -> Option<&GroupOutcome<T>> {
        self.groups
            .iter()
            .find(|group| group.relative_path == relative_path)
    }

    pub fn results(&self) -> impl Iterator<Item = &TransferResult<T>> {
        self.groups
            .iter()
            .flat_map(|group| group.results.iter().map(|(_, result)| result))
    }

    #[must_use]
    pub fn file_count(&self) -> usize {
        self.groups.iter().map(|group| group.results.len()).sum()
    }

    #[must_use]
    pub fn bytes(&self) -> u64 {
        self.groups.iter().map(|group| group.bytes).sum()
    }
}

fn relative_components(path: &Path) -> String {
    path.components()
        .map(|component| component.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

impl FilerClient {
    /// Upload into the existing directory `destination`.
    ///
    /// Input is validated before any request is made. A missing destination is
    /// [`Error::NotFound`]; it is never created implicitly.
    #[instrument(skip(self, request))]
    pub async fn push(&self, request: PushRequest, destination: &str) -> Result<PushOutcome> {
        let destination = self.resolver().resolve(destination).as_directory();
        match request {
            PushRequest::One { payload, name } => {
                let item = batch::classify_one(payload, name)?;
                self.require_directory(&destination).await?;
                let status = transfer::upload(self.session(), item, &destination).await?;
                Ok(PushOutcome::One(status))
            }
            PushRequest::Many { payloads, names } => {
                let items = batch::classify(payloads, names)?;
                self.require_directory(&destination).await?;
                let results = batch::upload_batch(
                    self.session(),
                    items,
                    &destination,
                    &self.batch_settings(),
                )
                .await?;
                Ok(PushOutcome::Many(results))
            }
        }
    }

    async fn require_directory(&self, location: &RemoteLocation) -> Result<()> {
        if !crate::listing::directory_exists(self.session(), location).await? {
            return Err(Error::NotFound(location.as_directory().to_string()));
        }
        Ok(())
    }

    /// Download into memory. With `raise_on_non_success` a non-2xx answer is an error for the
    /// affected item; otherwise the body is returned whatever the status.
    #[instrument(skip(self, request))]
    pub async fn pull(
        &self,
        request: PullRequest,
        raise_on_non_success: bool,
    ) -> Result<PullOutcome> {
        match request {
            PullRequest::One(path) => {
                let location = self.resolver().resolve(&path);
                let body =
                    transfer::download(self.session(), &location, raise_on_non_success).await?;
                Ok(PullOutcome::One(body))
            }
            PullRequest::Many(paths) => {
                let locations = paths
                    .iter()
                    .map(|path| self.resolver().resolve(path))
                    .collect();
                let results = batch::download_batch(
                    self.session(),
                    locations,
                    raise_on_non_success,
                    &self.batch_settings(),
                )
                .await?;
                Ok(PullOutcome::Many(results))
            }
        }
    }

    /// Download files into the local directory `out_dir`, each under its own name.
    /// Two paths sharing a file name are rejected before anything is fetched.
    #[instrument(skip(self, paths))]
    pub async fn pull_to_dir(
        &self,
        paths: &[String],
        out_dir: &Path,
        raise_on_non_success: bool,
    ) -> Result<Vec<TransferResult<u64>>> {
        let mut pairs = Vec::with_capacity(paths.len());
        let mut names = HashSet::with_capacity(paths.len());
        for path in paths {
            let location = self.resolver().resolve(path);
            let name = location
                .file_name()
                .ok_or_else(|| Error::invalid_input(format!("'{path}' does not name a file")))?
                .to_string();
            if name == ".." {
                return Err(Error::invalid_input(format!("'{path}' does not name a file")));
            }
            if !names.insert(name.clone()) {
                return Err(Error::invalid_input(format!(
                    "'{path}' would overwrite another download named '{name}' in {out_dir:?}"
                )));
            }
            pairs.push((location, out_dir.join(name)));
        }
        batch::download_and_save_batch(
            self.session(),
            pairs,
            raise_on_non_success,
            &self.batch_settings(),
        )
        .await
    }

    /// Upload the tree under `local_folder`, mirroring its structure under
    /// `<root>/<remote_name>`. `remote_name` defaults to the local folder's own name.
    #[instrument(skip(self))]
    pub async fn push_folder(
        &self,
        local_folder: &Path,
        remote_name: Option<&str>,
    ) -> Result<FolderOutcome<StatusCode>> {
        let groups = walk::walk_local(local_folder).await?;
        let remote_name = match remote_name {
            Some(name) => name.to_string(),
            None => {
                let canonical = tokio::fs::canonicalize(local_folder)
                    .await
                    .map_err(|err| Error::io("resolving", local_folder, err))?;
                transfer::file_name_of(&canonical)?
            }
        };
        let remote_base = self.resolver().resolve(&remote_name).as_directory();
        tracing::info!(
            "pushing {} directories from {:?} to {}",
            groups.len(),
            local_folder,
            &remote_base
        );
        let mut outcome = FolderOutcome::default();
        for group in groups {
            let relative = group
                .parent
                .strip_prefix(local_folder)
                .map(relative_components)
                .unwrap_or_default();
            let destination = remote_base.join(&relative).as_directory();
            self.create_directory(&destination).await?;
            let names = group
                .files
                .iter()
                .map(|file| transfer::file_name_of(file))
                .collect::<Result<Vec<_>>>()?;
            let items = group
                .files
                .into_iter()
                .map(TransferItem::file)
                .collect::<Result<Vec<_>>>()?;
            let results = batch::upload_batch_sized(
                self.session(),
                items,
                &destination,
                &self.batch_settings(),
            )
            .await?;
            let bytes = results
                .iter()
                .filter_map(|result| match result {
                    Ok((status, size)) if status.is_success() => Some(*size),
                    _ => None,
                })
                .sum();
            let results = results
                .into_iter()
                .map(|result| result.map(|(status, _)| status));
            outcome.groups.push(GroupOutcome {
                relative_path: self.resolver().relative(&destination).unwrap_or_default(),
                results: names.into_iter().zip(results).collect(),
                bytes,
            });
        }
        Ok(outcome)
    }

    /// Download the tree under `remote_folder` into `local_folder`, recreating its structure.
    /// Every non-2xx answer is an error for the affected file.
    #[instrument(skip(self))]
    pub async fn pull_folder(
        &self,
        remote_folder: &str,
        local_folder: &Path,
    ) -> Result<FolderOutcome<u64>> {
        let remote_root = self.resolver().resolve(remote_folder).as_directory();
        let groups =
            walk::walk_remote(self.session(), &remote_root, self.config().page_size).await?;
        tokio::fs::create_dir_all(local_folder)
            .await
            .map_err(|err| Error::io("creating directory", local_folder, err))?;
        tracing::info!(
            "pulling {} directories from {} to {:?}",
            groups.len(),
            &remote_root,
            local_folder
        );
        let mut outcome = FolderOutcome::default();
        for group in groups {
            if group.parent.has_parent_segments() {
                tracing::warn!("skipping {}: '..' cannot be mirrored locally", &group.parent);
                continue;
            }
            let mut local_dir = local_folder.to_path_buf();
            if let Some(relative) = group.parent.relative_to(&remote_root) {
                local_dir.extend(relative.split('/').filter(|segment| !segment.is_empty()));
            }
            tokio::fs::create_dir_all(&local_dir)
                .await
                .map_err(|err| Error::io("creating directory", &local_dir, err))?;
            let mut names = Vec::with_capacity(group.files.len());
            let mut pairs = Vec::with_capacity(group.files.len());
            for file in group.files {
                if file.has_parent_segments() {
                    tracing::warn!("skipping {}: '..' cannot be mirrored locally", &file);
                    continue;
                }
                let name = file.file_name().unwrap_or_default().to_string();
                pairs.push((file, local_dir.join(&name)));
                names.push(name);
            }
            let results = batch::download_and_save_batch(
                self.session(),
                pairs,
                true,
                &self.batch_settings(),
            )
            .await?;
            let bytes = results.iter().filter_map(|result| result.as_ref().ok()).sum();
            outcome.groups.push(GroupOutcome {
                relative_path: self.resolver().relative(&group.parent).unwrap_or_default(),
                results: names.into_iter().zip(results).collect(),
                bytes,
            });
        }
        Ok(outcome)
    }
}
