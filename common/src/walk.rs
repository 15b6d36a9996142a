//! Tree walks producing leaf files grouped by their immediate parent directory.
//!
//! Both walks are sequential: the whole tree is enumerated and grouped before any transfer is
//! dispatched. Groups appear in the order their parent was first encountered; files keep their
//! encounter order within a group.

use std::collections::{HashMap, VecDeque};
use std::hash::Hash;
use std::path::{Path, PathBuf};

use tracing::instrument;

use crate::error::{Error, Result};
use crate::listing;
use crate::path::RemoteLocation;
use crate::transfer::Session;

/// Files sharing one immediate parent directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryGroup<P> {
    pub parent: P,
    pub files: Vec<P>,
}

/// Group `files` by the key `parent_of` returns for each of them.
pub fn group_by_parent<P, F>(files: Vec<P>, parent_of: F) -> Vec<DirectoryGroup<P>>
where
    P: Clone + Eq + Hash,
    F: Fn(&P) -> P,
{
    let mut groups: Vec<DirectoryGroup<P>> = vec![];
    let mut index: HashMap<P, usize> = HashMap::new();
    for file in files {
        let parent = parent_of(&file);
        let slot = *index.entry(parent.clone()).or_insert_with(|| {
            groups.push(DirectoryGroup {
                parent,
                files: vec![],
            });
            groups.len() - 1
        });
        groups[slot].files.push(file);
    }
    groups
}

/// Breadth-first walk of a remote directory.
///
/// Only the root is probed for existence; subdirectories come from listings and are listed
/// without a probe. There is no cycle detection, the filer namespace is a tree.
#[instrument(skip(session))]
pub async fn walk_remote(
    session: &Session,
    root: &RemoteLocation,
    page_size: Option<usize>,
) -> Result<Vec<DirectoryGroup<RemoteLocation>>> {
    let root = root.as_directory();
    if !listing::directory_exists(session, &root).await? {
        return Err(Error::NotFound(root.to_string()));
    }
    let mut queue = VecDeque::from([root]);
    let mut files = vec![];
    let mut directories = 0;
    while let Some(directory) = queue.pop_front() {
        directories += 1;
        for entry in listing::list_pages(session, &directory, page_size).await? {
            if entry.is_file {
                files.push(entry.location);
            } else {
                queue.push_back(entry.location);
            }
        }
    }
    tracing::debug!("walked {} directories, {} files", directories, files.len());
    Ok(group_by_parent(files, |file: &RemoteLocation| {
        file.parent().unwrap_or_else(RemoteLocation::root)
    }))
}

/// Walk a local directory, collecting regular files.
///
/// Entries are visited in name order. Symbolic links are skipped, neither followed nor uploaded.
#[instrument]
pub async fn walk_local(root: &Path) -> Result<Vec<DirectoryGroup<PathBuf>>> {
    let metadata = tokio::fs::symlink_metadata(root)
        .await
        .map_err(|err| Error::io("reading metadata of", root, err))?;
    if !metadata.is_dir() {
        return Err(Error::local(root, "not a directory"));
    }
    let mut queue = VecDeque::from([root.to_path_buf()]);
    let mut files = vec![];
    while let Some(directory) = queue.pop_front() {
        let mut read_dir = tokio::fs::read_dir(&directory)
            .await
            .map_err(|err| Error::io("opening directory", &directory, err))?;
        let mut entries = vec![];
        while let Some(entry) = read_dir
            .next_entry()
            .await
            .map_err(|err| Error::io("traversing directory", &directory, err))?
        {
            entries.push(entry);
        }
        entries.sort_by_key(tokio::fs::DirEntry::file_name);
        for entry in entries {
            let path = entry.path();
            let file_type = entry
                .file_type()
                .await
                .map_err(|err| Error::io("reading file type of", &path, err))?;
            if file_type.is_symlink() {
                tracing::debug!("skipping symlink {:?}", &path);
            } else if file_type.is_dir() {
                queue.push_back(path);
            } else if file_type.is_file() {
                files.push(path);
            } else {
                tracing::debug!("skipping special file {:?}", &path);
            }
        }
    }
    tracing::debug!("found {} files under {:?}", files.len(), root);
    let root = root.to_path_buf();
    Ok(group_by_parent(files, |file: &PathBuf| {
        file.parent().map_or_else(|| root.clone(), Path::to_path_buf)
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutils::MemoryFiler;
    use std::sync::Arc;

    fn names(files: &[RemoteLocation]) -> Vec<&str> {
        files.iter().filter_map(RemoteLocation::file_name).collect()
    }

    #[test]
    fn grouping_keeps_first_encounter_order() {
        let groups = group_by_parent(vec!["b/1", "a/1", "b/2", "a/2"], |file: &&str| {
            file.split_once('/').map_or("", |(parent, _)| parent)
        });
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].parent, "b");
        assert_eq!(groups[0].files, ["b/1", "b/2"]);
        assert_eq!(groups[1].parent, "a");
    }

    #[tokio::test]
    async fn remote_tree_groups_by_parent() {
        let filer = Arc::new(
            MemoryFiler::new()
                .with_file("/a/x.txt", "x")
                .with_file("/a/b/y.txt", "y")
                .with_file("/a/b/z.txt", "z"),
        );
        let session = Session::new(filer.clone(), throttle::Limiter::new(1));
        let groups = walk_remote(&session, &RemoteLocation::parse("/a"), None)
            .await
            .unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].parent.to_string(), "/a/");
        assert_eq!(names(&groups[0].files), ["x.txt"]);
        assert_eq!(groups[1].parent.to_string(), "/a/b/");
        assert_eq!(names(&groups[1].files), ["y.txt", "z.txt"]);
    }

    #[tokio::test]
    async fn remote_walk_follows_pagination() {
        let mut filer = MemoryFiler::new().with_page_size(2);
        for i in 0..5 {
            filer = filer.with_file(&format!("/p/sub/{i}.bin"), "data");
        }
        let filer = Arc::new(filer);
        let session = Session::new(filer.clone(), throttle::Limiter::new(1));
        let groups = walk_remote(&session, &RemoteLocation::parse("/p/"), None)
            .await
            .unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].files.len(), 5);
    }

    #[tokio::test]
    async fn remote_walk_of_missing_root() {
        let filer = Arc::new(MemoryFiler::new());
        let session = Session::new(filer.clone(), throttle::Limiter::new(1));
        let result = walk_remote(&session, &RemoteLocation::parse("/missing"), None).await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn local_tree_groups_by_parent() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("foo");
        // foo
        // |- 0.txt
        // |- bar
        //    |- 1.txt
        //    |- 2.txt
        // |- baz
        //    |- 3.txt
        //    |- 4.txt -> ../bar/2.txt
        // |- empty
        tokio::fs::create_dir_all(root.join("bar")).await.unwrap();
        tokio::fs::create_dir_all(root.join("baz")).await.unwrap();
        tokio::fs::create_dir_all(root.join("empty")).await.unwrap();
        tokio::fs::write(root.join("0.txt"), "0").await.unwrap();
        tokio::fs::write(root.join("bar").join("2.txt"), "2")
            .await
            .unwrap();
        tokio::fs::write(root.join("bar").join("1.txt"), "1")
            .await
            .unwrap();
        tokio::fs::write(root.join("baz").join("3.txt"), "3")
            .await
            .unwrap();
        tokio::fs::symlink("../bar/2.txt", root.join("baz").join("4.txt"))
            .await
            .unwrap();
        let groups = walk_local(&root).await.unwrap();
        assert_eq!(groups.len(), 3);
        assert_eq!(groups[0].parent, root);
        assert_eq!(groups[0].files, [root.join("0.txt")]);
        assert_eq!(groups[1].parent, root.join("bar"));
        assert_eq!(
            groups[1].files,
            [root.join("bar").join("1.txt"), root.join("bar").join("2.txt")]
        );
        assert_eq!(groups[2].parent, root.join("baz"));
        assert_eq!(groups[2].files, [root.join("baz").join("3.txt")]);
    }

    #[tokio::test]
    async fn local_walk_rejects_files() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("plain.txt");
        tokio::fs::write(&file, "x").await.unwrap();
        let result = walk_local(&file).await;
        assert!(matches!(result, Err(Error::LocalFilesystem { .. })));
    }
}
