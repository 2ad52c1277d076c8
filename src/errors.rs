use serde::Deserialize;

/// bbsctl error types
#[derive(Debug, thiserror::Error)]
pub enum BbsError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Authentication / authorization errors
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Network errors
    #[error("Network error: {0}")]
    Network(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Bitbucket Server rejected a request
    #[error("{0}")]
    Api(ApiFailure),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP client errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// URL parsing errors
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// Manifest parsing errors
    #[error("Manifest error: {0}")]
    Manifest(String),
}

impl BbsError {
    pub fn config<S: Into<String>>(msg: S) -> Self {
        BbsError::Config(msg.into())
    }

    pub fn auth<S: Into<String>>(msg: S) -> Self {
        BbsError::Auth(msg.into())
    }

    pub fn network<S: Into<String>>(msg: S) -> Self {
        BbsError::Network(msg.into())
    }

    pub fn validation<S: Into<String>>(msg: S) -> Self {
        BbsError::Validation(msg.into())
    }

    pub fn manifest<S: Into<String>>(msg: S) -> Self {
        BbsError::Manifest(msg.into())
    }
}

/// A non-success response from the Bitbucket Server REST API, with the
/// error payload parsed when the server provided one.
#[derive(Debug, Clone)]
pub struct ApiFailure {
    pub status: u16,
    pub details: Vec<ApiErrorDetail>,
}

/// One entry of the `errors` array Bitbucket Server returns on failure.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorDetail {
    pub message: Option<String>,
    #[serde(rename = "exceptionName")]
    pub exception_name: Option<String>,
    /// Present on duplicate pull request conflicts (409)
    #[serde(rename = "existingPullRequest")]
    pub existing_pull_request: Option<ExistingPullRequest>,
}

/// The conflicting pull request reported inside a duplicate-PR error
#[derive(Debug, Clone, Deserialize)]
pub struct ExistingPullRequest {
    pub id: u64,
    pub version: u64,
}

impl ApiFailure {
    pub fn new(status: u16, details: Vec<ApiErrorDetail>) -> Self {
        Self { status, details }
    }

    /// First server-provided message, if any
    pub fn first_message(&self) -> Option<&str> {
        self.details.iter().find_map(|d| d.message.as_deref())
    }

    /// The existing pull request reported on a duplicate-PR 409, if any
    pub fn existing_pull_request(&self) -> Option<&ExistingPullRequest> {
        self.details
            .iter()
            .find_map(|d| d.existing_pull_request.as_ref())
    }
}

impl std::fmt::Display for ApiFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.first_message() {
            Some(message) => write!(f, "Bitbucket API error ({}): {}", self.status, message),
            None => write!(f, "Bitbucket API error ({})", self.status),
        }
    }
}

pub type Result<T> = std::result::Result<T, BbsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_failure_display_with_message() {
        let failure = ApiFailure::new(
            409,
            vec![ApiErrorDetail {
                message: Some(
                    "Only one pull request may be open for a given source and target branch"
                        .to_string(),
                ),
                exception_name: Some(
                    "com.atlassian.bitbucket.pull.DuplicatePullRequestException".to_string(),
                ),
                existing_pull_request: Some(ExistingPullRequest { id: 42, version: 3 }),
            }],
        );

        let rendered = failure.to_string();
        assert!(rendered.contains("409"));
        assert!(rendered.contains("Only one pull request"));
        assert_eq!(failure.existing_pull_request().unwrap().id, 42);
        assert_eq!(failure.existing_pull_request().unwrap().version, 3);
    }

    #[test]
    fn test_api_failure_display_without_payload() {
        let failure = ApiFailure::new(502, Vec::new());
        assert_eq!(failure.to_string(), "Bitbucket API error (502)");
        assert!(failure.first_message().is_none());
        assert!(failure.existing_pull_request().is_none());
    }

    #[test]
    fn test_duplicate_pr_payload_parsing() {
        let body = serde_json::json!({
            "errors": [{
                "context": null,
                "message": "Only one pull request may be open for a given source and target branch",
                "exceptionName": "com.atlassian.bitbucket.pull.DuplicatePullRequestException",
                "existingPullRequest": {
                    "id": 17,
                    "version": 5,
                    "title": "Release 2024.06",
                    "state": "OPEN"
                }
            }]
        });

        #[derive(Deserialize)]
        struct Payload {
            errors: Vec<ApiErrorDetail>,
        }

        let payload: Payload = serde_json::from_value(body).unwrap();
        let existing = payload.errors[0].existing_pull_request.as_ref().unwrap();
        assert_eq!(existing.id, 17);
        assert_eq!(existing.version, 5);
    }
}
