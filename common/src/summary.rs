use reqwest::StatusCode;

use crate::sync::FolderOutcome;
use crate::transfer::TransferResult;

/// Counters accumulated over one CLI run.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Summary {
    pub files_pushed: usize,
    pub bytes_pushed: u64,
    pub files_pulled: usize,
    pub bytes_pulled: u64,
    pub directories_created: usize,
    pub entries_removed: usize,
    pub failures: usize,
}

impl Summary {
    /// Count upload outcomes; a non-2xx status is a failure.
    #[must_use]
    pub fn from_uploads<'a>(
        results: impl IntoIterator<Item = &'a TransferResult<StatusCode>>,
    ) -> Self {
        let mut summary = Self::default();
        for result in results {
            match result {
                Ok(status) if status.is_success() => summary.files_pushed += 1,
                _ => summary.failures += 1,
            }
        }
        summary
    }

    /// Count a folder upload. Only files the filer accepted add to the bytes pushed.
    #[must_use]
    pub fn from_folder_upload(outcome: &FolderOutcome<StatusCode>) -> Self {
        Self {
            bytes_pushed: outcome.bytes(),
            directories_created: outcome.groups.len(),
            ..Self::from_uploads(outcome.results())
        }
    }

    #[must_use]
    pub fn from_folder_download(outcome: &FolderOutcome<u64>) -> Self {
        Self {
            directories_created: outcome.groups.len(),
            ..Self::from_downloads(outcome.results())
        }
    }

    /// Count download outcomes given as bytes received or written.
    #[must_use]
    pub fn from_downloads<'a>(results: impl IntoIterator<Item = &'a TransferResult<u64>>) -> Self {
        let mut summary = Self::default();
        for result in results {
            match result {
                Ok(bytes) => {
                    summary.files_pulled += 1;
                    summary.bytes_pulled += bytes;
                }
                Err(_) => summary.failures += 1,
            }
        }
        summary
    }
}

impl std::ops::Add for Summary {
    type Output = Self;
    fn add(self, other: Self) -> Self {
        Self {
            files_pushed: self.files_pushed + other.files_pushed,
            bytes_pushed: self.bytes_pushed + other.bytes_pushed,
            files_pulled: self.files_pulled + other.files_pulled,
            bytes_pulled: self.bytes_pulled + other.bytes_pulled,
            directories_created: self.directories_created + other.directories_created,
            entries_removed: self.entries_removed + other.entries_removed,
            failures: self.failures + other.failures,
        }
    }
}

impl std::fmt::Display for Summary {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "files pushed: {}\n\
            bytes pushed: {}\n\
            files pulled: {}\n\
            bytes pulled: {}\n\
            directories created: {}\n\
            entries removed: {}\n\
            failures: {}",
            self.files_pushed,
            bytesize::ByteSize(self.bytes_pushed),
            self.files_pulled,
            bytesize::ByteSize(self.bytes_pulled),
            self.directories_created,
            self.entries_removed,
            self.failures,
        )
    }
}
