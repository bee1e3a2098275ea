// GitHub API endpoint functions.
// Provides typed methods for fetching repository content, commit history,
// and bulk directory trees.

use serde::Deserialize;

use crate::error::{HubError, Result};

use super::client::GitHubClient;
use super::types::{CommitInfo, ContentEntry, TreeEntry, TreeQueryData};

/// The contents API returns an array for a directory and a bare object for
/// a file; both shapes are accepted.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ContentsResponse {
    Dir(Vec<ContentEntry>),
    File(Box<ContentEntry>),
}

const TREE_QUERY: &str = r#"
query($owner: String!, $name: String!, $expression: String!) {
  repository(owner: $owner, name: $name) {
    object(expression: $expression) {
      ... on Tree {
        entries {
          name
          path
          type
          oid
          object {
            ... on Blob {
              byteSize
            }
          }
        }
      }
    }
  }
  rateLimit {
    limit
    remaining
    used
    resetAt
  }
}
"#;

impl GitHubClient {
    /// List the contents of a directory at `path` on `branch`.
    pub async fn get_contents(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
        branch: &str,
    ) -> Result<Vec<ContentEntry>> {
        let params = [("ref", branch)];
        let response = self
            .get_with_params(&format!("/repos/{}/{}/contents/{}", owner, repo, path), &params)
            .await?;
        let contents: ContentsResponse = response.json().await?;
        Ok(match contents {
            ContentsResponse::Dir(entries) => entries,
            ContentsResponse::File(entry) => vec![*entry],
        })
    }

    /// Get the descriptor for a single file at `path` on `branch`.
    pub async fn get_file(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
        branch: &str,
    ) -> Result<ContentEntry> {
        let params = [("ref", branch)];
        let response = self
            .get_with_params(&format!("/repos/{}/{}/contents/{}", owner, repo, path), &params)
            .await?;
        let contents: ContentsResponse = response.json().await?;
        match contents {
            ContentsResponse::File(entry) => Ok(*entry),
            ContentsResponse::Dir(_) => Err(HubError::Other(format!(
                "expected a file at {}, found a directory",
                path
            ))),
        }
    }

    /// List commits touching `path` on `branch`, newest first.
    pub async fn get_commits(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
        branch: &str,
        per_page: u32,
    ) -> Result<Vec<CommitInfo>> {
        let per_page = per_page.to_string();
        let params = [("path", path), ("sha", branch), ("per_page", &per_page)];
        let response = self
            .get_with_params(&format!("/repos/{}/{}/commits", owner, repo), &params)
            .await?;
        let commits: Vec<CommitInfo> = response.json().await?;
        Ok(commits)
    }

    /// Fetch an entire directory tree in one GraphQL round trip.
    /// Returns an empty vec when the path does not exist on the branch.
    pub async fn get_tree(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
        branch: &str,
    ) -> Result<Vec<TreeEntry>> {
        let expression = format!("{}:{}", branch, path);
        let variables = serde_json::json!({
            "owner": owner,
            "name": repo,
            "expression": expression,
        });

        let data: TreeQueryData = self.graphql(TREE_QUERY, variables).await?;

        if let Some(rate) = &data.rate_limit {
            self.record_graphql_rate_limit(rate);
        }

        let entries = data
            .repository
            .and_then(|repo| repo.object)
            .map(|object| object.entries)
            .unwrap_or_default();

        Ok(entries.into_iter().map(TreeEntry::from).collect())
    }
}
