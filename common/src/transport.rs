//! The seam through which every remote call is issued.
//!
//! [`Transport`] speaks in [`RemoteLocation`]s rather than URLs; the HTTP implementation renders
//! them under the filer base URL. Non-2xx statuses are *not* errors at this layer: callers decide
//! per operation whether a status is tolerated.

use anyhow::Context;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::StatusCode;
use tracing::instrument;

use crate::error::{Error, Result};
use crate::path::RemoteLocation;

#[derive(Debug, Clone)]
pub enum Request {
    /// Fetch a file body or, with `accept_json`, one page of a directory listing.
    Get {
        location: RemoteLocation,
        query: Vec<(String, String)>,
        accept_json: bool,
    },
    /// Multipart upload, form field `file`.
    Upload {
        location: RemoteLocation,
        file_name: String,
        payload: Bytes,
    },
    /// Empty-body POST to a directory-addressed location.
    CreateDirectory { location: RemoteLocation },
    Delete {
        location: RemoteLocation,
        recursive: bool,
    },
}

impl Request {
    #[must_use]
    pub fn location(&self) -> &RemoteLocation {
        match self {
            Request::Get { location, .. }
            | Request::Upload { location, .. }
            | Request::CreateDirectory { location }
            | Request::Delete { location, .. } => location,
        }
    }

    #[must_use]
    pub fn method(&self) -> &'static str {
        match self {
            Request::Get { .. } => "GET",
            Request::Upload { .. } | Request::CreateDirectory { .. } => "POST",
            Request::Delete { .. } => "DELETE",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Response {
    pub status: StatusCode,
    pub body: Bytes,
}

impl Response {
    #[must_use]
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    #[must_use]
    pub fn empty(status: StatusCode) -> Self {
        Self::new(status, Bytes::new())
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: Request) -> Result<Response>;
}

/// [`Transport`] over HTTP. One `reqwest::Client` (and its connection pool) is shared by every
/// request issued through a clone of this value.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: reqwest::Url,
}

impl HttpTransport {
    pub fn new(base_url: reqwest::Url, timeout: Option<std::time::Duration>) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .context("failed to build HTTP client")
            .map_err(Error::Transport)?;
        Ok(Self { client, base_url })
    }

    #[must_use]
    pub fn base_url(&self) -> &reqwest::Url {
        &self.base_url
    }
}

#[async_trait]
impl Transport for HttpTransport {
    #[instrument(skip(self, request), fields(method = request.method(), location = %request.location()))]
    async fn send(&self, request: Request) -> Result<Response> {
        let method = request.method();
        let url = request.location().to_url(&self.base_url)?;
        let builder = match request {
            Request::Get {
                query, accept_json, ..
            } => {
                let mut builder = self.client.get(url.clone());
                if !query.is_empty() {
                    builder = builder.query(&query);
                }
                if accept_json {
                    builder = builder.header(reqwest::header::ACCEPT, "application/json");
                }
                builder
            }
            Request::Upload {
                file_name, payload, ..
            } => {
                let part = reqwest::multipart::Part::bytes(payload.to_vec()).file_name(file_name);
                let form = reqwest::multipart::Form::new().part("file", part);
                self.client.post(url.clone()).multipart(form)
            }
            Request::CreateDirectory { .. } => self.client.post(url.clone()),
            Request::Delete { recursive, .. } => {
                let builder = self.client.delete(url.clone());
                if recursive {
                    builder.query(&[("recursive", "true")])
                } else {
                    builder
                }
            }
        };
        let response = builder
            .send()
            .await
            .with_context(|| format!("{method} {url}"))
            .map_err(Error::Transport)?;
        let status = response.status();
        tracing::trace!("response status: {}", status);
        let body = response
            .bytes()
            .await
            .with_context(|| format!("failed reading response body of {method} {url}"))
            .map_err(Error::Transport)?;
        Ok(Response { status, body })
    }
}
