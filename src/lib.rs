//! Caching and revalidation layer for GitHub-hosted community content.
//!
//! The site this crate serves browses community-authored content (character
//! cards, chat presets, world books, extensions) stored in a GitHub
//! repository. Upstream is slow and rate-limited, so every read goes through
//! a two-tier cache:
//!
//! - an in-memory stale-while-revalidate tier ([`cache::SwrCache`]) that
//!   answers instantly and refreshes stale keys in the background, with at
//!   most one refresh in flight per key;
//! - a persistent, size-bounded disk tier ([`cache::DiskCache`]) that
//!   survives restarts and evicts its oldest entries past a configured
//!   ceiling.
//!
//! [`ContentService`] composes the tiers behind one read API and adds a
//! bounded-concurrency batch tree fetcher for warming many directories at
//! once. A [`mirror::LocalMirror`] can substitute a local checkout for the
//! network entirely during development.
//!
//! Callers prefer stale-but-present data over errors: only a cold start with
//! a failed fetch ever surfaces an error from a read.

pub mod cache;
pub mod config;
pub mod error;
pub mod github;
pub mod mirror;
pub mod service;

pub use cache::{CacheStats, DiskCache, Freshness, SwrCache};
pub use config::{CacheConfig, ResourceKind, TtlConfig};
pub use error::{HubError, Result};
pub use github::{CommitInfo, ContentEntry, EntryType, GitHubClient, RateLimit, TreeEntry};
pub use mirror::LocalMirror;
pub use service::ContentService;
