// GitHub API response types.
// Defines structs for deserializing REST contents/commits responses and
// GraphQL tree query responses.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Entry type discriminator for repository contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    File,
    Dir,
    Symlink,
    Submodule,
    #[serde(other)]
    Unknown,
}

/// A file or directory descriptor from the contents API.
/// This is the shape consumers receive regardless of data source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentEntry {
    pub name: String,
    pub path: String,
    pub sha: String,
    pub size: u64,
    pub url: Option<String>,
    pub html_url: Option<String>,
    pub download_url: Option<String>,
    #[serde(rename = "type")]
    pub entry_type: EntryType,
}

/// A commit touching a path, from the commits API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitInfo {
    pub sha: String,
    pub html_url: Option<String>,
    pub commit: CommitDetail,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitDetail {
    pub message: String,
    pub author: Option<CommitActor>,
    pub committer: Option<CommitActor>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitActor {
    pub name: Option<String>,
    pub date: Option<DateTime<Utc>>,
}

/// One entry of a bulk directory tree snapshot, flattened from GraphQL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeEntry {
    pub name: String,
    pub path: Option<String>,
    /// "blob" for files, "tree" for directories.
    #[serde(rename = "type")]
    pub entry_type: String,
    pub oid: String,
    pub size: Option<u64>,
}

/// Rate limit snapshot, updated from REST response headers and the GraphQL
/// `rateLimit` block. Informational only; the client never throttles on it.
#[derive(Debug, Clone, Copy, Default)]
pub struct RateLimit {
    pub limit: u64,
    pub remaining: u64,
    /// Epoch seconds when the window resets.
    pub reset: u64,
    pub used: u64,
}

// ---- GraphQL envelope ----

#[derive(Debug, Serialize)]
pub(crate) struct GraphQlRequest<'a> {
    pub query: &'a str,
    pub variables: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GraphQlResponse<T> {
    pub data: Option<T>,
    #[serde(default)]
    pub errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GraphQlError {
    pub message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TreeQueryData {
    pub repository: Option<TreeRepository>,
    pub rate_limit: Option<GraphQlRateLimit>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TreeRepository {
    pub object: Option<TreeObject>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TreeObject {
    #[serde(default)]
    pub entries: Vec<RawTreeEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawTreeEntry {
    pub name: String,
    pub path: Option<String>,
    #[serde(rename = "type")]
    pub entry_type: String,
    pub oid: String,
    pub object: Option<RawBlobInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawBlobInfo {
    pub byte_size: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GraphQlRateLimit {
    pub limit: u64,
    pub remaining: u64,
    pub used: u64,
    pub reset_at: DateTime<Utc>,
}

impl From<RawTreeEntry> for TreeEntry {
    fn from(raw: RawTreeEntry) -> Self {
        Self {
            name: raw.name,
            path: raw.path,
            entry_type: raw.entry_type,
            oid: raw.oid,
            size: raw.object.and_then(|o| o.byte_size),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn content_entry_deserializes_rest_shape() {
        let value = json!({
            "name": "aria.png",
            "path": "cards/aria.png",
            "sha": "3f786850e387550fdab836ed7e6dc881de23001b",
            "size": 48213,
            "url": "https://api.github.com/repos/o/r/contents/cards/aria.png",
            "html_url": "https://github.com/o/r/blob/main/cards/aria.png",
            "download_url": "https://raw.githubusercontent.com/o/r/main/cards/aria.png",
            "type": "file"
        });

        let entry: ContentEntry = serde_json::from_value(value).unwrap();
        assert_eq!(entry.name, "aria.png");
        assert_eq!(entry.entry_type, EntryType::File);
        assert_eq!(entry.size, 48213);
    }

    #[test]
    fn unknown_entry_type_falls_back() {
        let value = json!({
            "name": "x",
            "path": "x",
            "sha": "abc",
            "size": 0,
            "url": null,
            "html_url": null,
            "download_url": null,
            "type": "something_new"
        });

        let entry: ContentEntry = serde_json::from_value(value).unwrap();
        assert_eq!(entry.entry_type, EntryType::Unknown);
    }

    #[test]
    fn tree_entry_flattens_blob_size() {
        let raw: RawTreeEntry = serde_json::from_value(json!({
            "name": "card.png",
            "path": "cards/card.png",
            "type": "blob",
            "oid": "deadbeef",
            "object": { "byteSize": 1024 }
        }))
        .unwrap();

        let entry = TreeEntry::from(raw);
        assert_eq!(entry.size, Some(1024));
        assert_eq!(entry.entry_type, "blob");
    }

    #[test]
    fn graphql_response_carries_rate_limit() {
        let response: GraphQlResponse<TreeQueryData> = serde_json::from_value(json!({
            "data": {
                "repository": { "object": { "entries": [] } },
                "rateLimit": {
                    "limit": 5000,
                    "remaining": 4987,
                    "used": 13,
                    "resetAt": "2026-08-29T12:00:00Z"
                }
            }
        }))
        .unwrap();

        let data = response.data.unwrap();
        let rate = data.rate_limit.unwrap();
        assert_eq!(rate.remaining, 4987);
        assert_eq!(rate.used, 13);
    }

    #[test]
    fn commit_info_deserializes() {
        let value = json!({
            "sha": "a1b2c3",
            "html_url": "https://github.com/o/r/commit/a1b2c3",
            "commit": {
                "message": "Add new preset pack",
                "author": { "name": "maintainer", "date": "2026-08-01T00:00:00Z" },
                "committer": { "name": "web-flow", "date": "2026-08-01T00:00:00Z" }
            }
        });

        let commit: CommitInfo = serde_json::from_value(value).unwrap();
        assert_eq!(commit.commit.message, "Add new preset pack");
        assert_eq!(commit.commit.author.unwrap().name.as_deref(), Some("maintainer"));
    }
}
