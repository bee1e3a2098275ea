// Configuration for the cache service.
// All knobs are injected at construction so tests can build independent
// instances; nothing in the crate reads global state after startup.

use std::path::PathBuf;
use std::time::Duration;

use directories::ProjectDirs;

/// Default TTL for directory listings, which change whenever content lands.
pub const LISTING_TTL: Duration = Duration::from_secs(30);

/// Default TTL for commit history, which only grows.
pub const COMMITS_TTL: Duration = Duration::from_secs(10 * 60);

/// Default TTL for bulk directory trees.
pub const TREE_TTL: Duration = Duration::from_secs(5 * 60);

/// The kind of upstream resource a cache key refers to.
/// TTLs are configured per kind, not globally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// A directory listing (contents API).
    Listing,
    /// Commit history touching a path.
    Commits,
    /// A bulk directory tree snapshot (GraphQL).
    Tree,
}

/// Per-resource-kind TTL table.
#[derive(Debug, Clone)]
pub struct TtlConfig {
    pub listing: Duration,
    pub commits: Duration,
    pub tree: Duration,
}

impl Default for TtlConfig {
    fn default() -> Self {
        Self {
            listing: LISTING_TTL,
            commits: COMMITS_TTL,
            tree: TREE_TTL,
        }
    }
}

impl TtlConfig {
    pub fn for_kind(&self, kind: ResourceKind) -> Duration {
        match kind {
            ResourceKind::Listing => self.listing,
            ResourceKind::Commits => self.commits,
            ResourceKind::Tree => self.tree,
        }
    }
}

/// Configuration for a [`ContentService`](crate::ContentService).
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Upstream repository owner (user or organization).
    pub owner: String,
    /// Upstream repository name.
    pub repo: String,
    /// Branch the content lives on.
    pub branch: String,
    /// Bearer token for the GitHub API. `None` sends unauthenticated requests.
    pub auth_token: Option<String>,
    /// Serve reads from a local directory tree instead of the network.
    pub use_local_mirror: bool,
    /// Root of the local mirror. Ignored unless `use_local_mirror` is set.
    pub mirror_root: Option<PathBuf>,
    /// Directory for the persistent disk cache.
    pub cache_dir: PathBuf,
    /// Ceiling on total disk-cache size before eviction kicks in.
    pub max_cache_size_mb: u64,
    /// Per-resource-kind TTLs.
    pub ttl: TtlConfig,
    /// Hard timeout applied to every upstream request.
    pub request_timeout: Duration,
    /// Timeout for a background refresh, so a hung upstream call cannot
    /// permanently occupy a key's in-flight slot.
    pub refresh_timeout: Duration,
    /// Number of tree fetches in flight at once during a batch.
    pub batch_concurrency: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            owner: String::new(),
            repo: String::new(),
            branch: "main".to_string(),
            auth_token: None,
            use_local_mirror: false,
            mirror_root: None,
            cache_dir: default_cache_dir(),
            max_cache_size_mb: 100,
            ttl: TtlConfig::default(),
            request_timeout: Duration::from_secs(30),
            refresh_timeout: Duration::from_secs(60),
            batch_concurrency: 5,
        }
    }
}

impl CacheConfig {
    /// Config for a repository, with the token taken from `GITHUB_TOKEN`
    /// when present.
    pub fn for_repo(owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
            auth_token: std::env::var("GITHUB_TOKEN").ok(),
            ..Self::default()
        }
    }

    pub fn max_cache_size_bytes(&self) -> u64 {
        self.max_cache_size_mb * 1024 * 1024
    }
}

/// Default persistent cache directory (~/.cache/hubcache on Linux).
fn default_cache_dir() -> PathBuf {
    ProjectDirs::from("", "", "hubcache")
        .map(|dirs| dirs.cache_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".hubcache"))
}
