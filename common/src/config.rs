//! Configuration types for the filer client, runtime and output settings

use crate::error::{Error, Result};

pub use throttle::DEFAULT_MAX_CONCURRENT_TRANSFERS;

/// Root directory used when none is configured.
pub const DEFAULT_ROOT: &str = "data/datasets";

/// Immutable client configuration, fixed at construction
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Filer base URL, e.g. `http://localhost:8888`
    pub filer_url: String,
    /// Remote directory every relative path is resolved under
    pub root: String,
    /// Maximum number of transfers in flight (0 = no limit)
    pub max_concurrent_transfers: usize,
    /// Abort a batch on the first failed item instead of running every item to completion
    pub fail_early: bool,
    /// Per-request deadline (None = wait indefinitely)
    pub request_timeout: Option<std::time::Duration>,
    /// `limit` hint sent with listing requests (None = server default)
    pub page_size: Option<usize>,
}

impl ClientConfig {
    #[must_use]
    pub fn new(filer_url: impl Into<String>) -> Self {
        Self {
            filer_url: filer_url.into(),
            root: DEFAULT_ROOT.to_string(),
            max_concurrent_transfers: throttle::DEFAULT_MAX_CONCURRENT_TRANSFERS,
            fail_early: false,
            request_timeout: None,
            page_size: None,
        }
    }

    #[must_use]
    pub fn with_root(mut self, root: impl Into<String>) -> Self {
        self.root = root.into();
        self
    }

    #[must_use]
    pub fn with_max_concurrent_transfers(mut self, max_concurrent_transfers: usize) -> Self {
        self.max_concurrent_transfers = max_concurrent_transfers;
        self
    }

    #[must_use]
    pub fn with_fail_early(mut self, fail_early: bool) -> Self {
        self.fail_early = fail_early;
        self
    }

    #[must_use]
    pub fn with_request_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = Some(page_size);
        self
    }

    /// Validate configuration and return errors if invalid
    pub fn validate(&self) -> Result<()> {
        if self.filer_url.trim().is_empty() {
            return Err(Error::invalid_input("filer URL must not be empty"));
        }
        if self.page_size == Some(0) {
            return Err(Error::invalid_input("page size must be greater than 0"));
        }
        if self.request_timeout == Some(std::time::Duration::ZERO) {
            return Err(Error::invalid_input("request timeout must be greater than 0"));
        }
        Ok(())
    }

    /// Parse the filer URL, adding a scheme when one is missing.
    pub fn parse_filer_url(&self) -> Result<reqwest::Url> {
        let raw = self.filer_url.trim();
        let raw = if raw.contains("://") {
            raw.to_string()
        } else {
            format!("http://{raw}")
        };
        reqwest::Url::parse(&raw)
            .map_err(|err| Error::invalid_input(format!("invalid filer URL '{raw}': {err}")))
    }
}

/// Runtime configuration for tokio and thread pools
#[derive(Debug, Clone, Copy, Default)]
pub struct RuntimeConfig {
    /// Number of worker threads (0 = number of CPU cores)
    pub max_workers: usize,
    /// Number of blocking threads (0 = tokio default of 512)
    pub max_blocking_threads: usize,
}

/// Output and logging configuration
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputConfig {
    /// Suppress error output
    pub quiet: bool,
    /// Verbosity level: 0=ERROR, 1=INFO, 2=DEBUG, 3=TRACE
    pub verbose: u8,
    /// Print summary statistics at the end
    pub print_summary: bool,
}

impl OutputConfig {
    #[must_use]
    pub fn log_level(&self) -> &'static str {
        if self.quiet {
            return "off";
        }
        match self.verbose {
            0 => "error",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_filer_conventions() {
        let config = ClientConfig::new("http://localhost:8888");
        assert_eq!(config.root, "data/datasets");
        assert_eq!(config.max_concurrent_transfers, 100);
        assert!(!config.fail_early);
        assert!(config.request_timeout.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_zero_page_size() {
        let config = ClientConfig::new("http://localhost:8888").with_page_size(0);
        assert!(matches!(config.validate(), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn rejects_empty_url() {
        assert!(ClientConfig::new("  ").validate().is_err());
    }

    #[test]
    fn parse_filer_url_adds_scheme() {
        let url = ClientConfig::new("filer:8888").parse_filer_url().unwrap();
        assert_eq!(url.as_str(), "http://filer:8888/");
        let url = ClientConfig::new("https://filer.example")
            .parse_filer_url()
            .unwrap();
        assert_eq!(url.scheme(), "https");
    }

    #[test]
    fn log_levels() {
        let mut output = OutputConfig::default();
        assert_eq!(output.log_level(), "error");
        output.verbose = 2;
        assert_eq!(output.log_level(), "debug");
        output.verbose = 7;
        assert_eq!(output.log_level(), "trace");
        output.quiet = true;
        assert_eq!(output.log_level(), "off");
    }
}
