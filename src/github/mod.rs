// GitHub API module.
// Provides the authenticated client and types for the REST contents/commits
// endpoints and the GraphQL tree endpoint.

pub mod client;
pub mod endpoints;
pub mod types;

pub use client::GitHubClient;
pub use types::{CommitInfo, ContentEntry, EntryType, RateLimit, TreeEntry};
