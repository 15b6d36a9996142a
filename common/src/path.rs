//! Remote location handling.
//!
//! Locations are absolute filer paths kept as a list of segments plus a flag recording whether the
//! location is addressed as a directory (trailing `/`) or as a file. The flag is part of identity:
//! `/a/b` and `/a/b/` are different locations, mirroring how the filer treats `POST /a/b/`
//! (create directory) and `POST /a/b` (upload file).

use std::fmt;

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RemoteLocation {
    segments: Vec<String>,
    directory: bool,
}

fn normalize(path: &str) -> (Vec<String>, bool) {
    let path = path.replace('\\', "/");
    let trailing_slash = path.ends_with('/');
    let segments = path
        .split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .map(str::to_string)
        .collect();
    (segments, trailing_slash)
}

impl RemoteLocation {
    #[must_use]
    pub fn root() -> Self {
        Self {
            segments: vec![],
            directory: true,
        }
    }

    /// Parse an absolute filer path such as the `FullPath` of a listing entry.
    ///
    /// Backslashes are treated as separators; empty and `.` segments are dropped.
    #[must_use]
    pub fn parse(path: &str) -> Self {
        let (segments, trailing_slash) = normalize(path);
        let directory = trailing_slash || segments.is_empty();
        Self {
            segments,
            directory,
        }
    }

    /// Append `relative` segment-wise. A leading `/` on `relative` does not escape `self`.
    #[must_use]
    pub fn join(&self, relative: &str) -> Self {
        let (extra, trailing_slash) = normalize(relative);
        if extra.is_empty() {
            return Self {
                segments: self.segments.clone(),
                directory: self.directory || trailing_slash,
            };
        }
        let mut segments = self.segments.clone();
        segments.extend(extra);
        Self {
            segments,
            directory: trailing_slash,
        }
    }

    #[must_use]
    pub fn as_directory(&self) -> Self {
        Self {
            segments: self.segments.clone(),
            directory: true,
        }
    }

    #[must_use]
    pub fn as_file(&self) -> Self {
        Self {
            segments: self.segments.clone(),
            directory: self.segments.is_empty(),
        }
    }

    #[must_use]
    pub fn is_directory(&self) -> bool {
        self.directory
    }

    #[must_use]
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Whether any segment is `..`. Such segments are kept verbatim and would be collapsed by
    /// URL and local path handling.
    #[must_use]
    pub fn has_parent_segments(&self) -> bool {
        self.segments.iter().any(|segment| segment == "..")
    }

    /// Final segment, `None` for the root.
    #[must_use]
    pub fn file_name(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// Containing directory, addressed as a directory. `None` for the root.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        let (_, parent) = self.segments.split_last()?;
        Some(Self {
            segments: parent.to_vec(),
            directory: true,
        })
    }

    /// Segments of `self` below `base`, joined with `/`; `None` if `base` is not a prefix.
    #[must_use]
    pub fn relative_to(&self, base: &RemoteLocation) -> Option<String> {
        self.segments
            .strip_prefix(base.segments.as_slice())
            .map(|rest| rest.join("/"))
    }

    /// Render under the filer base URL, percent-encoding every segment.
    pub fn to_url(&self, base: &reqwest::Url) -> Result<reqwest::Url> {
        let mut url = base.clone();
        {
            let mut path = url.path_segments_mut().map_err(|()| {
                Error::invalid_input(format!("filer URL {base} cannot carry a path"))
            })?;
            path.pop_if_empty();
            path.extend(self.segments.iter());
            if self.directory {
                path.push("");
            }
        }
        Ok(url)
    }
}

impl fmt::Display for RemoteLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.segments.join("/"))?;
        if self.directory && !self.segments.is_empty() {
            write!(f, "/")?;
        }
        Ok(())
    }
}

/// Maps root-relative paths onto the configured filer root.
#[derive(Debug, Clone)]
pub struct PathResolver {
    root: RemoteLocation,
}

impl PathResolver {
    #[must_use]
    pub fn new(root: &str) -> Self {
        Self {
            root: RemoteLocation::parse(root).as_directory(),
        }
    }

    #[must_use]
    pub fn root(&self) -> &RemoteLocation {
        &self.root
    }

    #[must_use]
    pub fn resolve(&self, relative: impl AsRef<str>) -> RemoteLocation {
        self.root.join(relative.as_ref())
    }

    #[must_use]
    pub fn resolve_path(&self, relative: &std::path::Path) -> RemoteLocation {
        self.resolve(relative.to_string_lossy())
    }

    /// Path of `location` relative to the root, if it lives under it.
    #[must_use]
    pub fn relative(&self, location: &RemoteLocation) -> Option<String> {
        location.relative_to(&self.root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_normalizes_separators() {
        let location = RemoteLocation::parse("data\\datasets//mnist/./train.csv");
        assert_eq!(location.to_string(), "/data/datasets/mnist/train.csv");
        assert!(!location.is_directory());
        assert_eq!(location.file_name(), Some("train.csv"));
    }

    #[test]
    fn test_trailing_slash_is_part_of_identity() {
        let file = RemoteLocation::parse("/a/b");
        let dir = RemoteLocation::parse("/a/b/");
        assert_ne!(file, dir);
        assert_eq!(file.as_directory(), dir);
        assert_eq!(dir.as_file(), file);
        assert_eq!(dir.to_string(), "/a/b/");
    }

    #[test]
    fn test_root_is_a_directory() {
        let root = RemoteLocation::parse("/");
        assert!(root.is_root());
        assert!(root.is_directory());
        assert_eq!(root.to_string(), "/");
        assert_eq!(root.parent(), None);
        assert_eq!(root.file_name(), None);
    }

    #[test]
    fn test_join_stays_under_base() {
        let base = RemoteLocation::parse("/data/datasets/");
        assert_eq!(
            base.join("/images/cat.png").to_string(),
            "/data/datasets/images/cat.png"
        );
        assert_eq!(base.join("images/").to_string(), "/data/datasets/images/");
        assert_eq!(base.join(""), base);
        assert_eq!(base.join("."), base);
    }

    #[test]
    fn test_parent_and_relative() {
        let base = RemoteLocation::parse("/data/datasets/");
        let file = base.join("a/b/c.txt");
        assert_eq!(file.parent().unwrap().to_string(), "/data/datasets/a/b/");
        assert_eq!(file.relative_to(&base).unwrap(), "a/b/c.txt");
        assert_eq!(base.relative_to(&base).unwrap(), "");
        assert_eq!(RemoteLocation::parse("/other/x").relative_to(&base), None);
    }

    #[test]
    fn test_resolver_rewrites_backslashes() {
        let resolver = PathResolver::new("data/datasets");
        assert_eq!(resolver.root().to_string(), "/data/datasets/");
        let location = resolver.resolve("train\\part-0.parquet");
        assert_eq!(location.to_string(), "/data/datasets/train/part-0.parquet");
        assert_eq!(resolver.relative(&location).unwrap(), "train/part-0.parquet");
    }

    #[test]
    fn test_parent_segments_are_detected() {
        assert!(RemoteLocation::parse("/d/../x").has_parent_segments());
        assert!(RemoteLocation::parse("/D/").join("..").has_parent_segments());
        assert!(!RemoteLocation::parse("/d/..x/x..").has_parent_segments());
    }

    #[test]
    fn test_resolve_path() {
        let resolver = PathResolver::new("/data");
        let location = resolver.resolve_path(std::path::Path::new("x/y"));
        assert_eq!(location.to_string(), "/data/x/y");
    }

    #[test]
    fn test_to_url() {
        let base = reqwest::Url::parse("http://localhost:8888").unwrap();
        let file = RemoteLocation::parse("/data/my file.txt");
        assert_eq!(
            file.to_url(&base).unwrap().as_str(),
            "http://localhost:8888/data/my%20file.txt"
        );
        let dir = RemoteLocation::parse("/data/sub/");
        assert_eq!(
            dir.to_url(&base).unwrap().as_str(),
            "http://localhost:8888/data/sub/"
        );
        assert_eq!(
            RemoteLocation::root().to_url(&base).unwrap().as_str(),
            "http://localhost:8888/"
        );
    }

    #[test]
    fn test_to_url_keeps_base_prefix() {
        let base = reqwest::Url::parse("http://filer:8888/prefix/").unwrap();
        let file = RemoteLocation::parse("/a/b.bin");
        assert_eq!(
            file.to_url(&base).unwrap().as_str(),
            "http://filer:8888/prefix/a/b.bin"
        );
    }

    #[test]
    fn test_to_url_rejects_opaque_base() {
        let base = reqwest::Url::parse("mailto:someone@example.com").unwrap();
        let result = RemoteLocation::parse("/a").to_url(&base);
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }
}
