// Local filesystem mirror.
// Optional substitute data source: reads come straight from a local checkout
// of the content repository, bypassing every cache tier. Produces the same
// descriptor shape as the network path so consumers cannot tell the sources
// apart. The mirror is expected to be incomplete during development, so
// missing paths are a logged warning, never an error.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tokio::fs;
use tracing::warn;

use crate::github::{ContentEntry, EntryType};

#[derive(Debug, Clone)]
pub struct LocalMirror {
    root: PathBuf,
}

impl LocalMirror {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// List the entries of a directory, sorted by name. Missing or unreadable
    /// paths yield an empty listing.
    pub async fn list_dir(&self, path: &str) -> Vec<ContentEntry> {
        let Some(dir) = self.resolve(path) else {
            return Vec::new();
        };

        let mut read_dir = match fs::read_dir(&dir).await {
            Ok(read_dir) => read_dir,
            Err(e) => {
                warn!(path, error = %e, "mirror directory missing or unreadable");
                return Vec::new();
            }
        };

        let mut entries = Vec::new();
        while let Ok(Some(dir_entry)) = read_dir.next_entry().await {
            let name = dir_entry.file_name().to_string_lossy().into_owned();
            let rel_path = join_rel(path, &name);
            let Ok(meta) = dir_entry.metadata().await else {
                continue;
            };
            entries.push(self.describe(&name, &rel_path, meta.is_dir(), meta.len()));
        }

        entries.sort_by(|a, b| a.name.cmp(&b.name));
        entries
    }

    /// Descriptor for a single file, or `None` when it is absent.
    pub async fn get_file(&self, path: &str) -> Option<ContentEntry> {
        let full = self.resolve(path)?;

        let meta = match fs::metadata(&full).await {
            Ok(meta) => meta,
            Err(e) => {
                warn!(path, error = %e, "mirror file missing");
                return None;
            }
        };
        if meta.is_dir() {
            warn!(path, "mirror path is a directory, not a file");
            return None;
        }

        let name = Path::new(path)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string());
        Some(self.describe(&name, path, false, meta.len()))
    }

    fn describe(&self, name: &str, rel_path: &str, is_dir: bool, size: u64) -> ContentEntry {
        // No git object id exists locally; a digest of the path and size
        // gives consumers a stable identifier to diff against.
        let digest = Sha256::digest(format!("{}:{}", rel_path, size).as_bytes());
        let download_url = if is_dir {
            None
        } else {
            Some(format!("file://{}", self.root.join(rel_path).display()))
        };

        ContentEntry {
            name: name.to_string(),
            path: rel_path.to_string(),
            sha: format!("{:x}", digest),
            size: if is_dir { 0 } else { size },
            url: None,
            html_url: None,
            download_url,
            entry_type: if is_dir { EntryType::Dir } else { EntryType::File },
        }
    }

    /// Join a repository-relative path under the mirror root, refusing
    /// anything that could escape it.
    fn resolve(&self, path: &str) -> Option<PathBuf> {
        if Path::new(path)
            .components()
            .any(|c| matches!(c, std::path::Component::ParentDir))
        {
            warn!(path, "rejecting mirror path escaping the root");
            return None;
        }
        Some(self.root.join(path))
    }
}

fn join_rel(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", dir.trim_end_matches('/'), name)
    }
}
