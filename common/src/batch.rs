//! Batch orchestration: classify a batch, fan it out as one task per item, join them all.
//!
//! Every task shares the client's [`Session`] (one transport, one limiter). Results come back in
//! input order. By default every task runs to completion and each item's outcome is reported
//! individually; with [`Settings::fail_early`] the first failed item aborts the remaining tasks.

use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;

use bytes::Bytes;
use reqwest::StatusCode;
use tracing::instrument;

use crate::error::{Error, Result};
use crate::path::RemoteLocation;
use crate::transfer::{self, Payload, Session, TransferItem, TransferResult};

#[derive(Debug, Copy, Clone, Default)]
pub struct Settings {
    pub fail_early: bool,
}

/// Turn a batch of payloads into transfer items.
///
/// Every payload must be of the same kind. Byte payloads need exactly one name each; path
/// payloads take their names from the paths, and any supplied names are ignored.
pub fn classify(payloads: Vec<Payload>, names: Option<Vec<String>>) -> Result<Vec<TransferItem>> {
    let Some(first) = payloads.first() else {
        return Ok(vec![]);
    };
    let kind = first.kind();
    if let Some(other) = payloads.iter().find(|payload| payload.kind() != kind) {
        return Err(Error::invalid_input(format!(
            "all items of a batch must have the same type, found both {} and {}",
            kind,
            other.kind()
        )));
    }
    match first {
        Payload::Bytes(_) => {
            let names = names.ok_or_else(|| {
                Error::invalid_input("a file name must be assigned to every in-memory payload")
            })?;
            if names.len() != payloads.len() {
                return Err(Error::invalid_input(format!(
                    "a file name must be assigned to every in-memory payload: got {} payloads and {} names",
                    payloads.len(),
                    names.len()
                )));
            }
            payloads
                .into_iter()
                .zip(names)
                .map(|(payload, name)| match payload {
                    Payload::Bytes(data) => TransferItem::memory(data, name),
                    Payload::Path(path) => TransferItem::file(path),
                })
                .collect()
        }
        Payload::Path(_) => {
            if let Some(names) = names {
                tracing::warn!(
                    "file names are derived from paths, ignoring {} supplied names",
                    names.len()
                );
            }
            payloads
                .into_iter()
                .map(|payload| match payload {
                    Payload::Path(path) => TransferItem::file(path),
                    Payload::Bytes(data) => TransferItem::memory(data, String::new()),
                })
                .collect()
        }
    }
}

/// Classify a single payload; the scalar counterpart of [`classify`].
pub fn classify_one(payload: Payload, name: Option<String>) -> Result<TransferItem> {
    match payload {
        Payload::Bytes(data) => {
            let name = name.ok_or_else(|| {
                Error::invalid_input("a file name must be assigned to an in-memory payload")
            })?;
            TransferItem::memory(data, name)
        }
        Payload::Path(path) => {
            if name.is_some() {
                tracing::warn!("file name is derived from {:?}, ignoring supplied name", &path);
            }
            TransferItem::file(path)
        }
    }
}

/// Spawn every unit, wait for all of them and return their outcomes in submission order.
async fn run_ordered<T, F>(units: Vec<F>, settings: &Settings) -> Result<Vec<TransferResult<T>>>
where
    T: Send + 'static,
    F: Future<Output = TransferResult<T>> + Send + 'static,
{
    let total = units.len();
    let mut join_set = tokio::task::JoinSet::new();
    let mut indices = HashMap::with_capacity(total);
    for (index, unit) in units.into_iter().enumerate() {
        let handle = join_set.spawn(unit);
        indices.insert(handle.id(), index);
    }
    let mut outcomes = Vec::with_capacity(total);
    let mut failed = 0;
    while let Some(res) = join_set.join_next_with_id().await {
        // a panicked or cancelled task is that item's failure, not the batch's
        let (id, result) = match res {
            Ok((id, result)) => (id, result),
            Err(error) => (error.id(), Err(Error::Task(error))),
        };
        let Some(&index) = indices.get(&id) else {
            continue;
        };
        match result {
            Err(error) if settings.fail_early => {
                tracing::error!("item {} failed, aborting batch: {:#}", index, &error);
                join_set.abort_all();
                return Err(error);
            }
            Err(error) => {
                tracing::error!("item {} failed: {:#}", index, &error);
                failed += 1;
                outcomes.push((index, Err(error)));
            }
            Ok(value) => outcomes.push((index, Ok(value))),
        }
    }
    if failed > 0 {
        tracing::info!("batch finished: {} of {} items failed", failed, total);
    } else {
        tracing::debug!("batch finished: {} items", total);
    }
    outcomes.sort_unstable_by_key(|(index, _)| *index);
    Ok(outcomes.into_iter().map(|(_, result)| result).collect())
}

/// Upload every item into `destination`. One status per item, in input order.
#[instrument(skip(session, items), fields(items = items.len()))]
pub async fn upload_batch(
    session: &Session,
    items: Vec<TransferItem>,
    destination: &RemoteLocation,
    settings: &Settings,
) -> Result<Vec<TransferResult<StatusCode>>> {
    let units = items
        .into_iter()
        .map(|item| {
            let session = session.clone();
            let destination = destination.clone();
            async move { transfer::upload(&session, item, &destination).await }
        })
        .collect();
    run_ordered(units, settings).await
}

/// Like [`upload_batch`], each outcome also carrying the payload size in bytes.
#[instrument(skip(session, items), fields(items = items.len()))]
pub async fn upload_batch_sized(
    session: &Session,
    items: Vec<TransferItem>,
    destination: &RemoteLocation,
    settings: &Settings,
) -> Result<Vec<TransferResult<(StatusCode, u64)>>> {
    let units = items
        .into_iter()
        .map(|item| {
            let session = session.clone();
            let destination = destination.clone();
            async move { transfer::upload_sized(&session, item, &destination).await }
        })
        .collect();
    run_ordered(units, settings).await
}

/// Download every location into memory, in input order.
#[instrument(skip(session, locations), fields(locations = locations.len()))]
pub async fn download_batch(
    session: &Session,
    locations: Vec<RemoteLocation>,
    raise_on_non_success: bool,
    settings: &Settings,
) -> Result<Vec<TransferResult<Bytes>>> {
    let units = locations
        .into_iter()
        .map(|location| {
            let session = session.clone();
            async move { transfer::download(&session, &location, raise_on_non_success).await }
        })
        .collect();
    run_ordered(units, settings).await
}

/// Download every `(location, local path)` pair to disk, in input order.
#[instrument(skip(session, pairs), fields(pairs = pairs.len()))]
pub async fn download_and_save_batch(
    session: &Session,
    pairs: Vec<(RemoteLocation, PathBuf)>,
    raise_on_non_success: bool,
    settings: &Settings,
) -> Result<Vec<TransferResult<u64>>> {
    let units = pairs
        .into_iter()
        .map(|(location, destination)| {
            let session = session.clone();
            async move {
                transfer::download_and_save(
                    &session,
                    &location,
                    &destination,
                    raise_on_non_success,
                )
                .await
            }
        })
        .collect();
    run_ordered(units, settings).await
}
