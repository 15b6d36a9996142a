//! The filer client: configuration, path resolution and the shared transfer session.
//!
//! Directory maintenance operations live here; transfers and folder sync are in
//! [`crate::sync`].

use std::sync::Arc;

use reqwest::StatusCode;
use tracing::instrument;

use crate::batch;
use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::listing::{self, DirectoryEntry};
use crate::path::{PathResolver, RemoteLocation};
use crate::transfer::Session;
use crate::transport::{HttpTransport, Request, Transport};

#[derive(Debug, Clone)]
pub struct FilerClient {
    config: ClientConfig,
    resolver: PathResolver,
    session: Session,
}

impl FilerClient {
    /// Build a client talking HTTP to `config.filer_url`.
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;
        let base_url = config.parse_filer_url()?;
        let transport = HttpTransport::new(base_url, config.request_timeout)?;
        Self::with_transport(config, Arc::new(transport))
    }

    /// Build a client on top of an arbitrary transport.
    pub fn with_transport(config: ClientConfig, transport: Arc<dyn Transport>) -> Result<Self> {
        config.validate()?;
        let limiter = throttle::Limiter::new(config.max_concurrent_transfers);
        tracing::debug!(
            "filer client for {} rooted at {}, {} concurrent transfers",
            &config.filer_url,
            &config.root,
            config.max_concurrent_transfers
        );
        Ok(Self {
            resolver: PathResolver::new(&config.root),
            session: Session::new(transport, limiter),
            config,
        })
    }

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    #[must_use]
    pub fn resolver(&self) -> &PathResolver {
        &self.resolver
    }

    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    pub(crate) fn batch_settings(&self) -> batch::Settings {
        batch::Settings {
            fail_early: self.config.fail_early,
        }
    }

    /// Whether `path` exists as a directory under the root.
    pub async fn exists(&self, path: &str) -> Result<bool> {
        listing::directory_exists(&self.session, &self.resolver.resolve(path)).await
    }

    /// Create `path` and any missing parents. Creating an existing directory succeeds.
    pub async fn mkdirs(&self, path: &str) -> Result<StatusCode> {
        self.create_directory(&self.resolver.resolve(path)).await
    }

    #[instrument(skip(self))]
    pub(crate) async fn create_directory(&self, location: &RemoteLocation) -> Result<StatusCode> {
        let location = location.as_directory();
        let response = self
            .session
            .send(Request::CreateDirectory {
                location: location.clone(),
            })
            .await?;
        if !response.status.is_success() {
            return Err(Error::RemoteOperationFailed {
                operation: "mkdirs",
                location: location.to_string(),
                status: response.status,
            });
        }
        tracing::debug!("created {}", &location);
        Ok(response.status)
    }

    /// Delete a file or directory. Non-empty directories need `recursive`.
    #[instrument(skip(self))]
    pub async fn remove(&self, path: &str, recursive: bool) -> Result<StatusCode> {
        let location = self.resolver.resolve(path);
        let response = self
            .session
            .send(Request::Delete {
                location: location.clone(),
                recursive,
            })
            .await?;
        match response.status {
            StatusCode::INTERNAL_SERVER_ERROR => Err(Error::RemoteDeleteConflict {
                location: location.to_string(),
            }),
            status if !status.is_success() => Err(Error::RemoteOperationFailed {
                operation: "remove",
                location: location.to_string(),
                status,
            }),
            status => {
                tracing::info!("removed {}", &location);
                Ok(status)
            }
        }
    }

    /// Entries of the directory `path`, across every page.
    pub async fn list_entries(&self, path: &str) -> Result<Vec<DirectoryEntry>> {
        listing::list_entries(
            &self.session,
            &self.resolver.resolve(path),
            self.config.page_size,
        )
        .await
    }

    /// Names of the entries of the directory `path`.
    pub async fn listdir(&self, path: &str) -> Result<Vec<String>> {
        listing::list_names(
            &self.session,
            &self.resolver.resolve(path),
            self.config.page_size,
        )
        .await
    }
}
