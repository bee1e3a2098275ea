// GitHub API HTTP client.
// Handles authentication, rate limit tracking, and request/response processing
// for both the REST contents/commits endpoints and the GraphQL tree endpoint.

use std::time::Duration;

use parking_lot::Mutex;
use reqwest::{
    Client, Response, StatusCode,
    header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT},
};
use serde::de::DeserializeOwned;

use crate::error::{HubError, Result};

use super::types::{GraphQlRateLimit, GraphQlRequest, GraphQlResponse, RateLimit};

const GITHUB_API_BASE: &str = "https://api.github.com";
const GITHUB_GRAPHQL_URL: &str = "https://api.github.com/graphql";
const GITHUB_API_VERSION: &str = "2022-11-28";

/// GitHub API client with authentication and rate limit tracking.
///
/// The rate limit snapshot lives behind a mutex so the client can be shared
/// by reference across concurrent fetches.
pub struct GitHubClient {
    client: Client,
    rate_limit: Mutex<RateLimit>,
}

impl GitHubClient {
    /// Create a new client. `token` of `None` sends unauthenticated requests,
    /// which GitHub serves with a much smaller rate allowance.
    pub fn new(token: Option<&str>, timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();

        if let Some(token) = token {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {}", token))
                    .map_err(|e| HubError::Other(e.to_string()))?,
            );
        }
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "X-GitHub-Api-Version",
            HeaderValue::from_static(GITHUB_API_VERSION),
        );
        headers.insert(USER_AGENT, HeaderValue::from_static("hubcache"));

        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(HubError::Api)?;

        Ok(Self {
            client,
            rate_limit: Mutex::new(RateLimit::default()),
        })
    }

    /// Create a client from the GITHUB_TOKEN environment variable.
    pub fn from_env(timeout: Duration) -> Result<Self> {
        let token = std::env::var("GITHUB_TOKEN").map_err(|_| HubError::MissingToken)?;
        Self::new(Some(&token), timeout)
    }

    /// Get the current rate limit snapshot.
    pub fn rate_limit(&self) -> RateLimit {
        *self.rate_limit.lock()
    }

    /// Make a GET request to the GitHub REST API.
    pub async fn get(&self, endpoint: &str) -> Result<Response> {
        let url = format!("{}{}", GITHUB_API_BASE, endpoint);
        let response = self.client.get(&url).send().await.map_err(HubError::Api)?;

        self.update_rate_limit(&response);
        self.check_response(response).await
    }

    /// Make a GET request with query parameters.
    pub async fn get_with_params<T: serde::Serialize + ?Sized>(
        &self,
        endpoint: &str,
        params: &T,
    ) -> Result<Response> {
        let url = format!("{}{}", GITHUB_API_BASE, endpoint);
        let response = self
            .client
            .get(&url)
            .query(params)
            .send()
            .await
            .map_err(HubError::Api)?;

        self.update_rate_limit(&response);
        self.check_response(response).await
    }

    /// Execute a GraphQL query and deserialize the `data` block.
    /// GraphQL errors come back as 200s with an `errors` array, so both the
    /// HTTP status and that array are checked.
    pub async fn graphql<T: DeserializeOwned>(
        &self,
        query: &str,
        variables: serde_json::Value,
    ) -> Result<T> {
        let request = GraphQlRequest { query, variables };
        let response = self
            .client
            .post(GITHUB_GRAPHQL_URL)
            .json(&request)
            .send()
            .await
            .map_err(HubError::Api)?;

        self.update_rate_limit(&response);
        let response = self.check_response(response).await?;
        let envelope: GraphQlResponse<T> = response.json().await?;

        if let Some(error) = envelope.errors.first() {
            return Err(HubError::Other(format!("GraphQL: {}", error.message)));
        }
        envelope
            .data
            .ok_or_else(|| HubError::Other("GraphQL response missing data".to_string()))
    }

    /// Merge the `rateLimit` block of a GraphQL response into the snapshot.
    pub(crate) fn record_graphql_rate_limit(&self, rate: &GraphQlRateLimit) {
        let mut snapshot = self.rate_limit.lock();
        snapshot.limit = rate.limit;
        snapshot.remaining = rate.remaining;
        snapshot.used = rate.used;
        snapshot.reset = rate.reset_at.timestamp().max(0) as u64;
    }

    /// Update rate limit from response headers.
    fn update_rate_limit(&self, response: &Response) {
        let mut snapshot = self.rate_limit.lock();

        if let Some(limit) = header_u64(response, "x-ratelimit-limit") {
            snapshot.limit = limit;
        }
        if let Some(remaining) = header_u64(response, "x-ratelimit-remaining") {
            snapshot.remaining = remaining;
        }
        if let Some(reset) = header_u64(response, "x-ratelimit-reset") {
            snapshot.reset = reset;
        }
        if let Some(used) = header_u64(response, "x-ratelimit-used") {
            snapshot.used = used;
        }
    }

    /// Check response status and convert errors.
    async fn check_response(&self, response: Response) -> Result<Response> {
        match response.status() {
            StatusCode::OK | StatusCode::CREATED | StatusCode::ACCEPTED => Ok(response),
            StatusCode::UNAUTHORIZED => Err(HubError::Unauthorized),
            StatusCode::NOT_FOUND => {
                let url = response.url().to_string();
                Err(HubError::NotFound(url))
            }
            StatusCode::FORBIDDEN => {
                // Check if rate limited
                let rate = self.rate_limit();
                if rate.remaining == 0 {
                    let reset_at = chrono::DateTime::from_timestamp(rate.reset as i64, 0)
                        .map(|dt| dt.format("%H:%M:%S").to_string())
                        .unwrap_or_else(|| "unknown".to_string());
                    Err(HubError::RateLimited { reset_at })
                } else {
                    Err(HubError::Network {
                        status: 403,
                        body: response.text().await.unwrap_or_default(),
                    })
                }
            }
            status => Err(HubError::Network {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            }),
        }
    }
}

fn header_u64(response: &Response, name: &str) -> Option<u64> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_builds_with_and_without_token() {
        let timeout = Duration::from_secs(5);
        assert!(GitHubClient::new(Some("ghp_example"), timeout).is_ok());
        assert!(GitHubClient::new(None, timeout).is_ok());
    }

    #[test]
    fn rejects_unencodable_token() {
        let result = GitHubClient::new(Some("bad\ntoken"), Duration::from_secs(5));
        assert!(result.is_err());
    }

    #[test]
    fn graphql_rate_limit_updates_snapshot() {
        let client = GitHubClient::new(None, Duration::from_secs(5)).unwrap();
        let rate: GraphQlRateLimit = serde_json::from_value(serde_json::json!({
            "limit": 5000,
            "remaining": 4000,
            "used": 1000,
            "resetAt": "2026-08-29T12:00:00Z"
        }))
        .unwrap();

        client.record_graphql_rate_limit(&rate);
        let snapshot = client.rate_limit();
        assert_eq!(snapshot.remaining, 4000);
        assert_eq!(snapshot.used, 1000);
        assert!(snapshot.reset > 0);
    }
}
