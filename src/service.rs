// Content service.
// Composes the cache tiers behind one read API: memory hit (fresh or stale
// with background revalidation) → disk hit → network fetch, written back
// through both tiers. When the local mirror is enabled, reads bypass the
// caches entirely and go straight to local disk.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::{CacheStats, DiskCache, SwrCache, batch};
use crate::config::{CacheConfig, ResourceKind};
use crate::error::{HubError, Result};
use crate::github::{CommitInfo, ContentEntry, GitHubClient, RateLimit, TreeEntry};
use crate::mirror::LocalMirror;

/// Commits fetched per history request.
const COMMITS_PER_PAGE: u32 = 30;

pub(crate) fn listing_key(path: &str) -> String {
    format!("listing:{}", path)
}

pub(crate) fn file_key(path: &str) -> String {
    format!("file:{}", path)
}

pub(crate) fn commits_key(path: &str) -> String {
    format!("commits:{}", path)
}

/// The cache and revalidation layer for one content repository.
///
/// Constructed from an injected [`CacheConfig`]; tests build as many
/// independent instances as they like, and a deployment typically keeps one
/// per process.
pub struct ContentService {
    config: CacheConfig,
    client: Option<Arc<GitHubClient>>,
    mirror: Option<LocalMirror>,
    disk: DiskCache,
    listings: SwrCache<Vec<ContentEntry>>,
    files: SwrCache<Option<ContentEntry>>,
    commits: SwrCache<Vec<CommitInfo>>,
}

impl ContentService {
    pub fn new(config: CacheConfig) -> Result<Self> {
        let mirror = if config.use_local_mirror {
            let root = config.mirror_root.clone().ok_or_else(|| {
                HubError::Other("local mirror enabled but mirror_root is not set".to_string())
            })?;
            Some(LocalMirror::new(root))
        } else {
            None
        };

        let client = if mirror.is_none() {
            Some(Arc::new(GitHubClient::new(
                config.auth_token.as_deref(),
                config.request_timeout,
            )?))
        } else {
            None
        };

        let disk = DiskCache::new(&config.cache_dir, config.max_cache_size_bytes());

        Ok(Self {
            listings: SwrCache::new(config.refresh_timeout),
            files: SwrCache::new(config.refresh_timeout),
            commits: SwrCache::new(config.refresh_timeout),
            config,
            client,
            mirror,
            disk,
        })
    }

    /// List the contents of a directory.
    ///
    /// Served stale-while-revalidate: a fresh memory hit returns directly, a
    /// stale one returns the old listing and refreshes in the background, and
    /// only a cold miss with a failed fetch surfaces an error. A path absent
    /// upstream is an empty listing, not an error.
    pub async fn get_contents(&self, path: &str) -> Result<Vec<ContentEntry>> {
        if let Some(mirror) = &self.mirror {
            return Ok(mirror.list_dir(path).await);
        }

        let key = listing_key(path);
        let fetch = self.listing_fetch(path.to_string(), key.clone())?;
        self.listings.read(&key, move || fetch).await
    }

    /// Descriptor for a single file, `None` when it does not exist. Served
    /// through the same SWR path as listings, under the listing TTL; "does
    /// not exist yet" is cached like any other answer.
    pub async fn get_file(&self, path: &str) -> Result<Option<ContentEntry>> {
        if let Some(mirror) = &self.mirror {
            return Ok(mirror.get_file(path).await);
        }

        let key = file_key(path);
        let fetch = self.file_fetch(path.to_string(), key.clone())?;
        self.files.read(&key, move || fetch).await
    }

    /// Commit history touching a path, newest first. Same SWR semantics as
    /// [`get_contents`](Self::get_contents), with the longer commits TTL.
    pub async fn get_commits(&self, path: &str) -> Result<Vec<CommitInfo>> {
        if self.mirror.is_some() {
            // A local checkout carries no usable history.
            return Ok(Vec::new());
        }

        let key = commits_key(path);
        let fetch = self.commits_fetch(path.to_string(), key.clone())?;
        self.commits.read(&key, move || fetch).await
    }

    /// Warm and return directory trees for many paths at once.
    ///
    /// Disk-cached trees cost no network calls; the rest are fetched with
    /// bounded concurrency. A path whose fetch failed is omitted from the map:
    /// callers must treat a missing key as "unknown", not "empty".
    pub async fn fetch_trees(&self, paths: &[String]) -> HashMap<String, Vec<TreeEntry>> {
        if let Some(mirror) = &self.mirror {
            let mut results = HashMap::new();
            for path in paths {
                let entries = mirror.list_dir(path).await;
                results.insert(path.clone(), entries.iter().map(to_tree_entry).collect());
            }
            return results;
        }

        let Ok(client) = self.client() else {
            return HashMap::new();
        };
        let client = Arc::clone(client);
        let owner = self.config.owner.clone();
        let repo = self.config.repo.clone();
        let branch = self.config.branch.clone();

        batch::fetch_trees(
            &self.disk,
            paths,
            self.config.ttl.for_kind(ResourceKind::Tree),
            self.config.batch_concurrency,
            move |path| {
                let client = Arc::clone(&client);
                let owner = owner.clone();
                let repo = repo.clone();
                let branch = branch.clone();
                async move { client.get_tree(&owner, &repo, &path, &branch).await }
            },
        )
        .await
    }

    /// Latest rate limit snapshot observed on upstream responses.
    pub fn rate_limit(&self) -> RateLimit {
        self.client
            .as_ref()
            .map(|client| client.rate_limit())
            .unwrap_or_default()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.disk.stats()
    }

    /// Drop every cached variant of `path` from both tiers, so the next read
    /// goes upstream.
    pub fn invalidate(&self, path: &str) {
        self.listings.invalidate(&listing_key(path));
        self.files.invalidate(&file_key(path));
        self.commits.invalidate(&commits_key(path));
        self.disk.delete(&listing_key(path));
        self.disk.delete(&file_key(path));
        self.disk.delete(&commits_key(path));
        self.disk.delete(&batch::tree_key(path));
    }

    pub fn clear_cache(&self) {
        self.listings.clear();
        self.files.clear();
        self.commits.clear();
        self.disk.clear();
    }

    fn client(&self) -> Result<&Arc<GitHubClient>> {
        self.client
            .as_ref()
            .ok_or_else(|| HubError::Other("no upstream client configured".to_string()))
    }

    /// Build the disk-then-network loader for a directory listing. The
    /// future is self-contained so the memory tier can run it either
    /// synchronously (cold miss) or as a detached background refresh.
    ///
    /// A disk hit reports the entry's residual life so the memory tier goes
    /// stale when the entry does, not a full TTL later; a network fetch
    /// starts a fresh clock.
    fn listing_fetch(
        &self,
        path: String,
        key: String,
    ) -> Result<impl Future<Output = Result<(Vec<ContentEntry>, Duration)>> + Send + 'static> {
        let client = Arc::clone(self.client()?);
        let disk = self.disk.clone();
        let ttl = self.config.ttl.for_kind(ResourceKind::Listing);
        let owner = self.config.owner.clone();
        let repo = self.config.repo.clone();
        let branch = self.config.branch.clone();

        Ok(async move {
            if let Some(hit) = disk.get_with_remaining::<Vec<ContentEntry>>(&key, None) {
                return Ok(hit);
            }
            let entries = match client.get_contents(&owner, &repo, &path, &branch).await {
                Ok(entries) => entries,
                // Not-yet-published categories are expected; cache the
                // emptiness like any other listing.
                Err(e) if e.is_not_found() => Vec::new(),
                Err(e) => return Err(e),
            };
            disk.set(&key, &entries, ttl);
            Ok((entries, ttl))
        })
    }

    fn file_fetch(
        &self,
        path: String,
        key: String,
    ) -> Result<impl Future<Output = Result<(Option<ContentEntry>, Duration)>> + Send + 'static>
    {
        let client = Arc::clone(self.client()?);
        let disk = self.disk.clone();
        let ttl = self.config.ttl.for_kind(ResourceKind::Listing);
        let owner = self.config.owner.clone();
        let repo = self.config.repo.clone();
        let branch = self.config.branch.clone();

        Ok(async move {
            if let Some(hit) = disk.get_with_remaining::<Option<ContentEntry>>(&key, None) {
                return Ok(hit);
            }
            let entry = match client.get_file(&owner, &repo, &path, &branch).await {
                Ok(entry) => Some(entry),
                Err(e) if e.is_not_found() => None,
                Err(e) => return Err(e),
            };
            disk.set(&key, &entry, ttl);
            Ok((entry, ttl))
        })
    }

    fn commits_fetch(
        &self,
        path: String,
        key: String,
    ) -> Result<impl Future<Output = Result<(Vec<CommitInfo>, Duration)>> + Send + 'static> {
        let client = Arc::clone(self.client()?);
        let disk = self.disk.clone();
        let ttl = self.config.ttl.for_kind(ResourceKind::Commits);
        let owner = self.config.owner.clone();
        let repo = self.config.repo.clone();
        let branch = self.config.branch.clone();

        Ok(async move {
            if let Some(hit) = disk.get_with_remaining::<Vec<CommitInfo>>(&key, None) {
                return Ok(hit);
            }
            let commits = match client
                .get_commits(&owner, &repo, &path, &branch, COMMITS_PER_PAGE)
                .await
            {
                Ok(commits) => commits,
                Err(e) if e.is_not_found() => Vec::new(),
                Err(e) => return Err(e),
            };
            disk.set(&key, &commits, ttl);
            Ok((commits, ttl))
        })
    }
}

fn to_tree_entry(entry: &ContentEntry) -> TreeEntry {
    TreeEntry {
        name: entry.name.clone(),
        path: Some(entry.path.clone()),
        entry_type: match entry.entry_type {
            crate::github::EntryType::Dir => "tree".to_string(),
            _ => "blob".to_string(),
        },
        oid: entry.sha.clone(),
        size: (entry.size > 0).then_some(entry.size),
    }
}
