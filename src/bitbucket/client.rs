use crate::config::BitbucketConfig;
use crate::errors::{ApiErrorDetail, ApiFailure, BbsError, Result};
use base64::Engine;
use reqwest::{
    header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    Client, StatusCode,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, trace};

/// Root of the core REST API (pull requests, branch listing, repository info)
pub const CORE_API: &str = "rest/api/1.0";

/// Root of the branch-utils API (branch creation and deletion)
pub const BRANCH_UTILS_API: &str = "rest/branch-utils/1.0";

/// Bitbucket Server API client, scoped to a single project/repository pair
#[derive(Clone)]
pub struct BitbucketClient {
    client: Client,
    base_url: String,
    project_key: String,
    repo_slug: String,
    username: Option<String>,
}

impl BitbucketClient {
    /// Create a new Bitbucket client
    pub fn new(config: &BitbucketConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();

        let auth_header = match (&config.username, &config.token) {
            (Some(username), Some(token)) => {
                let auth_string = format!("{}:{}", username, token);
                let auth_encoded = base64::engine::general_purpose::STANDARD.encode(auth_string);
                format!("Basic {}", auth_encoded)
            }
            (None, Some(token)) => {
                format!("Bearer {}", token)
            }
            _ => {
                return Err(BbsError::config(
                    "Bitbucket credentials not configured. Run 'bbsctl setup' or set BBSCTL_TOKEN.",
                ))
            }
        };

        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth_header)
                .map_err(|e| BbsError::config(format!("Invalid auth header: {}", e)))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .default_headers(headers)
            .build()
            .map_err(|e| BbsError::config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.url.clone(),
            project_key: config.project.clone(),
            repo_slug: config.repo.clone(),
            username: config.username.clone(),
        })
    }

    /// The username requests authenticate as, when basic auth is in use
    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    /// The project key this client is scoped to
    pub fn project_key(&self) -> &str {
        &self.project_key
    }

    /// The repository slug this client is scoped to
    pub fn repo_slug(&self) -> &str {
        &self.repo_slug
    }

    /// Build a repository-scoped URL under the given API root
    fn repo_url(&self, api_root: &str, path: &str) -> String {
        let mut url = format!(
            "{}/{}/projects/{}/repos/{}",
            self.base_url.trim_end_matches('/'),
            api_root,
            self.project_key,
            self.repo_slug,
        );
        let path = path.trim_start_matches('/');
        if !path.is_empty() {
            url.push('/');
            url.push_str(path);
        }
        url
    }

    /// Make a GET request under the core API root
    pub async fn get<T>(&self, path: &str) -> Result<T>
    where
        T: for<'de> Deserialize<'de>,
    {
        self.get_with_query(path, &[]).await
    }

    /// Make a GET request under the core API root with query parameters
    pub async fn get_with_query<T>(&self, path: &str, query: &[(&str, &str)]) -> Result<T>
    where
        T: for<'de> Deserialize<'de>,
    {
        let url = self.repo_url(CORE_API, path);
        debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(|e| BbsError::network(format!("GET {} failed: {}", url, e)))?;

        self.parse_response(response).await
    }

    /// Make a POST request under the given API root
    pub async fn post_at<T, U>(&self, api_root: &str, path: &str, body: &T) -> Result<U>
    where
        T: Serialize,
        U: for<'de> Deserialize<'de>,
    {
        let url = self.repo_url(api_root, path);
        debug!("POST {}", url);

        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| BbsError::network(format!("POST {} failed: {}", url, e)))?;

        self.parse_response(response).await
    }

    /// Make a POST request under the core API root
    pub async fn post<T, U>(&self, path: &str, body: &T) -> Result<U>
    where
        T: Serialize,
        U: for<'de> Deserialize<'de>,
    {
        self.post_at(CORE_API, path, body).await
    }

    /// Make a DELETE request with a JSON body under the given API root.
    ///
    /// Bitbucket's delete endpoints take payloads (branch name, PR version)
    /// and answer 204 with an empty body on success.
    pub async fn delete_at<T>(&self, api_root: &str, path: &str, body: &T) -> Result<()>
    where
        T: Serialize,
    {
        let url = self.repo_url(api_root, path);
        debug!("DELETE {}", url);

        let response = self
            .client
            .delete(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| BbsError::network(format!("DELETE {} failed: {}", url, e)))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(self.error_from_response(status, response).await)
        }
    }

    /// Make a DELETE request with a JSON body under the core API root
    pub async fn delete<T>(&self, path: &str, body: &T) -> Result<()>
    where
        T: Serialize,
    {
        self.delete_at(CORE_API, path, body).await
    }

    /// Deserialize a successful response, or map the failure
    async fn parse_response<T>(&self, response: reqwest::Response) -> Result<T>
    where
        T: for<'de> Deserialize<'de>,
    {
        let status = response.status();

        if status.is_success() {
            let text = response
                .text()
                .await
                .map_err(|e| BbsError::network(format!("Failed to read response body: {}", e)))?;

            trace!("Response body: {}", text);

            serde_json::from_str(&text)
                .map_err(|e| BbsError::network(format!("Failed to parse JSON response: {}", e)))
        } else {
            Err(self.error_from_response(status, response).await)
        }
    }

    /// Map a non-success response to an error, parsing the server's error
    /// payload when present
    async fn error_from_response(&self, status: StatusCode, response: reqwest::Response) -> BbsError {
        let user = self.username.as_deref().unwrap_or("<token>");
        match status {
            StatusCode::UNAUTHORIZED => BbsError::auth(format!(
                "Access denied for user {}, verify username and password",
                user
            )),
            StatusCode::FORBIDDEN => BbsError::auth(format!("Access denied for user {}", user)),
            _ => {
                let text = response.text().await.unwrap_or_default();
                let details = parse_error_payload(&text);
                BbsError::Api(ApiFailure::new(status.as_u16(), details))
            }
        }
    }

    /// Test the connection to Bitbucket Server by fetching repository info
    pub async fn test_connection(&self) -> Result<()> {
        let _: RepositoryInfo = self.get("").await?;
        debug!("Connection test successful");
        Ok(())
    }
}

/// Parse a Bitbucket error body (`{"errors": [...]}`); tolerate bodies that
/// are not JSON by carrying the raw text as the message
fn parse_error_payload(body: &str) -> Vec<ApiErrorDetail> {
    #[derive(Deserialize)]
    struct ErrorPayload {
        errors: Vec<ApiErrorDetail>,
    }

    match serde_json::from_str::<ErrorPayload>(body) {
        Ok(payload) => payload.errors,
        Err(_) if body.trim().is_empty() => Vec::new(),
        Err(_) => vec![ApiErrorDetail {
            message: Some(body.trim().to_string()),
            exception_name: None,
            existing_pull_request: None,
        }],
    }
}

/// One page of a paged Bitbucket listing endpoint
#[derive(Debug, Deserialize)]
pub struct Page<T> {
    pub size: u32,
    pub limit: u32,
    #[serde(rename = "isLastPage")]
    pub is_last_page: bool,
    pub values: Vec<T>,
    pub start: u32,
    #[serde(rename = "nextPageStart")]
    pub next_page_start: Option<u32>,
}

/// Repository information from Bitbucket
#[derive(Debug, Clone, Deserialize)]
pub struct RepositoryInfo {
    pub id: u64,
    pub name: String,
    pub slug: String,
    pub project: ProjectInfo,
}

/// Project information
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectInfo {
    pub id: u64,
    pub key: String,
    pub name: String,
}
