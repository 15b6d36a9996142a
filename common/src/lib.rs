//! Client library for a path-addressed filer (SeaweedFS-style) REST service.
//!
//! The core is a bounded-concurrency transfer engine: batches of uploads and downloads fan out as
//! one task per item, every task gated by the client's [`throttle::Limiter`], and results come
//! back in input order with per-item outcomes. On top of it sit paginated directory listings,
//! remote and local tree walks and folder synchronisation.
//!
//! # Example
//!
//! ```no_run
//! # async fn example() -> common::Result<()> {
//! use common::{ClientConfig, FilerClient, PushRequest};
//!
//! let client = FilerClient::new(ClientConfig::new("http://localhost:8888"))?;
//! client.mkdirs("reports").await?;
//! client
//!     .push(PushRequest::bytes(&b"hello"[..], "greeting.txt"), "reports")
//!     .await?;
//! let names = client.listdir("reports").await?;
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod client;
pub mod config;
pub mod error;
pub mod listing;
pub mod path;
pub mod summary;
pub mod sync;
pub mod transfer;
pub mod transport;
pub mod walk;

#[cfg(test)]
mod testutils;

pub use client::FilerClient;
pub use config::{ClientConfig, OutputConfig, RuntimeConfig};
pub use error::{Error, Result};
pub use listing::DirectoryEntry;
pub use path::{PathResolver, RemoteLocation};
pub use summary::Summary;
pub use sync::{FolderOutcome, GroupOutcome, PullOutcome, PullRequest, PushOutcome, PushRequest};
pub use transfer::{Payload, TransferItem, TransferResult};
pub use transport::{HttpTransport, Transport};
pub use walk::DirectoryGroup;

/// Run `func` on a fresh tokio runtime with logging configured from `output`.
///
/// Returns `None` when the runtime cannot be built or `func` fails; the error is logged (unless
/// quiet) so callers only need to pick an exit status.
pub fn run<Fut, S>(
    output: OutputConfig,
    runtime: RuntimeConfig,
    func: impl FnOnce() -> Fut,
) -> Option<S>
where
    S: std::fmt::Display,
    Fut: std::future::Future<Output = anyhow::Result<S>>,
{
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(output.log_level()));
    if let Err(error) = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
    {
        eprintln!("failed to initialize logging: {error}");
    }
    let mut builder = tokio::runtime::Builder::new_multi_thread();
    builder.enable_all();
    if runtime.max_workers > 0 {
        builder.worker_threads(runtime.max_workers);
    }
    if runtime.max_blocking_threads > 0 {
        builder.max_blocking_threads(runtime.max_blocking_threads);
    }
    let runtime = match builder.build() {
        Ok(runtime) => runtime,
        Err(error) => {
            tracing::error!("failed to build tokio runtime: {:#}", &error);
            return None;
        }
    };
    match runtime.block_on(func()) {
        Ok(summary) => {
            if output.print_summary || output.verbose > 0 {
                println!("{summary}");
            }
            Some(summary)
        }
        Err(error) => {
            tracing::error!("{:#}", &error);
            None
        }
    }
}
