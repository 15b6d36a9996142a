//! Remote directory enumeration.
//!
//! The filer lists a directory one page at a time. Each page carries an `Entries` array and a
//! `LastFileName` cursor; the next page is requested with `lastFileName=<cursor>`. There is no
//! total count and no "has more" flag: an empty (or null) `Entries` array ends the listing.
//!
//! Entries do not carry a type tag. A non-empty `Md5` digest marks a file, a missing or empty one
//! marks a directory. This is a convention of the filer, not something the payload describes.

use chrono::{DateTime, FixedOffset};
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::instrument;

use crate::error::{Error, Result};
use crate::path::RemoteLocation;
use crate::transfer::Session;
use crate::transport::Request;

#[derive(Debug, Clone, PartialEq)]
pub struct DirectoryEntry {
    /// `FullPath` exactly as reported by the filer.
    pub full_path: String,
    /// Parsed location, directory-addressed for subdirectories.
    pub location: RemoteLocation,
    pub is_file: bool,
    pub last_modified: Option<DateTime<FixedOffset>>,
    pub size: Option<u64>,
}

impl DirectoryEntry {
    #[must_use]
    pub fn name(&self) -> &str {
        self.location.file_name().unwrap_or_default()
    }
}

#[derive(Debug, Deserialize)]
struct ListingPage {
    #[serde(rename = "Entries", default)]
    entries: Option<Vec<RawEntry>>,
    #[serde(rename = "LastFileName", default)]
    last_file_name: String,
}

#[derive(Debug, Deserialize)]
struct RawEntry {
    #[serde(rename = "FullPath")]
    full_path: String,
    #[serde(rename = "Md5", default)]
    md5: Option<String>,
    #[serde(rename = "Mtime", default)]
    mtime: Option<String>,
    #[serde(rename = "FileSize", default)]
    file_size: Option<u64>,
}

impl From<RawEntry> for DirectoryEntry {
    fn from(raw: RawEntry) -> Self {
        let is_file = raw.md5.as_deref().is_some_and(|digest| !digest.is_empty());
        let location = RemoteLocation::parse(&raw.full_path);
        let location = if is_file {
            location.as_file()
        } else {
            location.as_directory()
        };
        let last_modified = raw
            .mtime
            .as_deref()
            .and_then(|mtime| DateTime::parse_from_rfc3339(mtime).ok());
        Self {
            full_path: raw.full_path,
            location,
            is_file,
            last_modified,
            size: raw.file_size,
        }
    }
}

/// Probe a directory: 200 or 201 means it exists.
#[instrument(skip(session))]
pub async fn directory_exists(session: &Session, location: &RemoteLocation) -> Result<bool> {
    let response = session
        .send(Request::Get {
            location: location.as_directory(),
            query: vec![],
            accept_json: true,
        })
        .await?;
    let exists = matches!(response.status, StatusCode::OK | StatusCode::CREATED);
    tracing::debug!("{} exists: {}", location, exists);
    Ok(exists)
}

/// Fetch every page of `location` without checking that it exists first.
#[instrument(skip(session))]
pub(crate) async fn list_pages(
    session: &Session,
    location: &RemoteLocation,
    page_size: Option<usize>,
) -> Result<Vec<DirectoryEntry>> {
    let location = location.as_directory();
    let mut entries = vec![];
    let mut cursor: Option<String> = None;
    loop {
        let mut query = vec![];
        if let Some(limit) = page_size {
            query.push(("limit".to_string(), limit.to_string()));
        }
        if let Some(cursor) = &cursor {
            query.push(("lastFileName".to_string(), cursor.clone()));
        }
        let response = session
            .send(Request::Get {
                location: location.clone(),
                query,
                accept_json: true,
            })
            .await?;
        if !response.status.is_success() {
            return Err(Error::RemoteOperationFailed {
                operation: "list",
                location: location.to_string(),
                status: response.status,
            });
        }
        let page: ListingPage =
            serde_json::from_slice(&response.body).map_err(|source| Error::Decode {
                location: location.to_string(),
                source,
            })?;
        let page_entries = page.entries.unwrap_or_default();
        if page_entries.is_empty() {
            break;
        }
        tracing::trace!(
            "{}: page of {} entries after {:?}",
            &location,
            page_entries.len(),
            &cursor
        );
        let mut next = page.last_file_name;
        if next.is_empty() {
            // older filers leave the cursor out; the last entry's name is equivalent
            next = page_entries
                .last()
                .map(|entry| {
                    RemoteLocation::parse(&entry.full_path)
                        .file_name()
                        .unwrap_or_default()
                        .to_string()
                })
                .unwrap_or_default();
        }
        entries.extend(page_entries.into_iter().map(DirectoryEntry::from));
        if cursor.as_deref() == Some(next.as_str()) {
            tracing::warn!("{}: listing cursor did not advance past {:?}", &location, &next);
            break;
        }
        cursor = Some(next);
    }
    tracing::debug!("{}: {} entries", &location, entries.len());
    Ok(entries)
}

/// List a directory that must exist, returning full entries in the order the filer reports them.
pub async fn list_entries(
    session: &Session,
    location: &RemoteLocation,
    page_size: Option<usize>,
) -> Result<Vec<DirectoryEntry>> {
    if !directory_exists(session, location).await? {
        return Err(Error::NotFound(location.as_directory().to_string()));
    }
    list_pages(session, location, page_size).await
}

/// Like [`list_entries`] but keeps only the final path segment of each entry.
pub async fn list_names(
    session: &Session,
    location: &RemoteLocation,
    page_size: Option<usize>,
) -> Result<Vec<String>> {
    Ok(list_entries(session, location, page_size)
        .await?
        .iter()
        .map(|entry| entry.name().to_string())
        .collect())
}
