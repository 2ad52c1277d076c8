use crate::bitbucket::client::{BitbucketClient, Page};
use crate::errors::{BbsError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Pull request manager for Bitbucket operations
pub struct PullRequestManager {
    client: BitbucketClient,
}

impl PullRequestManager {
    pub fn new(client: BitbucketClient) -> Self {
        Self { client }
    }

    /// The project key this manager's client is scoped to
    pub fn project_key(&self) -> &str {
        self.client.project_key()
    }

    /// The repository slug this manager's client is scoped to
    pub fn repo_slug(&self) -> &str {
        self.client.repo_slug()
    }

    /// Create a new pull request.
    ///
    /// When `replace_existing` is set and the server answers 409 because a
    /// pull request for the same source and target already exists, that pull
    /// request is deleted and the create is retried once.
    pub async fn create_pull_request(
        &self,
        request: &CreatePullRequestRequest,
        replace_existing: bool,
    ) -> Result<PullRequest> {
        debug!(
            "Creating pull request '{}': {} -> {}",
            request.title, request.from_ref.id, request.to_ref.id
        );

        let attempt: Result<PullRequest> = self.client.post("pull-requests", request).await;
        match attempt {
            Ok(pr) => {
                info!("Created pull request #{}", pr.id);
                Ok(pr)
            }
            Err(BbsError::Api(failure)) if failure.status == 409 && replace_existing => {
                let existing = failure
                    .existing_pull_request()
                    .cloned()
                    .ok_or(BbsError::Api(failure.clone()))?;

                warn!(
                    "Pull request #{} already open for these refs, deleting it as requested",
                    existing.id
                );
                self.delete_pull_request(existing.id, existing.version)
                    .await?;

                let pr: PullRequest = self.client.post("pull-requests", request).await?;
                info!("Created pull request #{}", pr.id);
                Ok(pr)
            }
            Err(e) => Err(e),
        }
    }

    /// Get a pull request by ID
    pub async fn get_pull_request(&self, pr_id: u64) -> Result<PullRequest> {
        self.client.get(&format!("pull-requests/{pr_id}")).await
    }

    /// Find the open pull request matching title, source and target branch.
    ///
    /// The server's `filterText` match is fuzzy, so results are paged
    /// through and compared exactly.
    pub async fn find_pull_request(
        &self,
        title: &str,
        from_branch: &str,
        to_branch: &str,
    ) -> Result<Option<PullRequest>> {
        let mut start = 0u32;
        loop {
            let page: Page<PullRequest> = self
                .client
                .get_with_query(
                    "pull-requests",
                    &[("filterText", title), ("start", &start.to_string())],
                )
                .await?;

            if let Some(pr) = page
                .values
                .into_iter()
                .find(|pr| matches_selector(pr, title, from_branch, to_branch))
            {
                return Ok(Some(pr));
            }

            match (page.is_last_page, page.next_page_start) {
                (false, Some(next)) => start = next,
                _ => return Ok(None),
            }
        }
    }

    /// List pull requests with an optional state filter
    pub async fn list_pull_requests(
        &self,
        state: Option<PullRequestState>,
    ) -> Result<Vec<PullRequest>> {
        let mut pull_requests = Vec::new();
        let mut start = 0u32;
        loop {
            let start_text = start.to_string();
            let mut query: Vec<(&str, &str)> = vec![("start", &start_text)];
            if let Some(state) = state {
                query.push(("state", state.as_str()));
            }

            let page: Page<PullRequest> =
                self.client.get_with_query("pull-requests", &query).await?;
            pull_requests.extend(page.values);

            match (page.is_last_page, page.next_page_start) {
                (false, Some(next)) => start = next,
                _ => return Ok(pull_requests),
            }
        }
    }

    /// Approve a pull request as the authenticated user
    pub async fn approve_pull_request(&self, pr_id: u64) -> Result<()> {
        #[derive(Serialize)]
        struct ApproveRequest {
            #[serde(skip_serializing_if = "Option::is_none")]
            user: Option<UserName>,
            approved: bool,
            status: &'static str,
        }

        let body = ApproveRequest {
            user: self.client.username().map(|name| UserName {
                name: name.to_string(),
            }),
            approved: true,
            status: "APPROVED",
        };

        let _: serde_json::Value = self
            .client
            .post(&format!("pull-requests/{pr_id}/approve"), &body)
            .await?;

        info!("Approved pull request #{}", pr_id);
        Ok(())
    }

    /// Merge a pull request at its current version.
    ///
    /// Re-reads the pull request first so the version sent is the server's,
    /// then posts the merge. A 409 surfaces the server's veto message.
    pub async fn merge_pull_request(
        &self,
        pr_id: u64,
        strategy: Option<MergeStrategy>,
    ) -> Result<PullRequest> {
        let pr = self.get_pull_request(pr_id).await?;

        let request = MergePullRequestRequest {
            version: pr.version,
            message: strategy
                .as_ref()
                .and_then(|s| s.commit_message(&pr)),
            strategy,
        };

        let merged: PullRequest = self
            .client
            .post(&format!("pull-requests/{pr_id}/merge"), &request)
            .await?;

        info!("Merged pull request #{}", pr_id);
        Ok(merged)
    }

    /// Delete a pull request at a known version
    pub async fn delete_pull_request(&self, pr_id: u64, version: u64) -> Result<()> {
        #[derive(Serialize)]
        struct DeleteRequest {
            version: u64,
        }

        self.client
            .delete(&format!("pull-requests/{pr_id}"), &DeleteRequest { version })
            .await?;

        info!("Deleted pull request #{}", pr_id);
        Ok(())
    }
}

/// Exact-match selector used when locating a pull request for approve/merge
fn matches_selector(pr: &PullRequest, title: &str, from_branch: &str, to_branch: &str) -> bool {
    pr.state == PullRequestState::Open
        && pr.title == title
        && pr.from_ref.display_id == from_branch
        && pr.to_ref.display_id == to_branch
}

/// Request to create a new pull request
#[derive(Debug, Clone, Serialize)]
pub struct CreatePullRequestRequest {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "fromRef")]
    pub from_ref: CreateRef,
    #[serde(rename = "toRef")]
    pub to_ref: CreateRef,
    pub reviewers: Vec<Reviewer>,
    pub locked: bool,
}

impl CreatePullRequestRequest {
    pub fn new(
        title: impl Into<String>,
        description: Option<String>,
        from_branch: &str,
        to_branch: &str,
        project_key: &str,
        repo_slug: &str,
    ) -> Self {
        Self {
            title: title.into(),
            description,
            from_ref: CreateRef::branch(from_branch, project_key, repo_slug),
            to_ref: CreateRef::branch(to_branch, project_key, repo_slug),
            reviewers: Vec::new(),
            locked: false,
        }
    }

    pub fn with_reviewers<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.reviewers = names
            .into_iter()
            .map(|name| Reviewer {
                user: UserName { name: name.into() },
            })
            .collect();
        self
    }
}

/// Branch reference in a create payload
#[derive(Debug, Clone, Serialize)]
pub struct CreateRef {
    pub id: String,
    pub repository: CreateRepositoryRef,
}

impl CreateRef {
    fn branch(name: &str, project_key: &str, repo_slug: &str) -> Self {
        let id = if name.starts_with("refs/") {
            name.to_string()
        } else {
            format!("refs/heads/{name}")
        };
        Self {
            id,
            repository: CreateRepositoryRef {
                slug: repo_slug.to_string(),
                project: CreateProjectRef {
                    key: project_key.to_string(),
                },
            },
        }
    }
}

/// Repository reference in a create payload
#[derive(Debug, Clone, Serialize)]
pub struct CreateRepositoryRef {
    pub slug: String,
    pub project: CreateProjectRef,
}

/// Project reference in a create payload
#[derive(Debug, Clone, Serialize)]
pub struct CreateProjectRef {
    pub key: String,
}

/// Reviewer entry in a create payload
#[derive(Debug, Clone, Serialize)]
pub struct Reviewer {
    pub user: UserName,
}

/// Minimal user reference
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserName {
    pub name: String,
}

/// Pull request data structure
#[derive(Debug, Clone, Deserialize)]
pub struct PullRequest {
    pub id: u64,
    pub version: u64,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub state: PullRequestState,
    pub open: bool,
    pub closed: bool,
    #[serde(rename = "createdDate")]
    pub created_date: u64,
    #[serde(rename = "updatedDate")]
    pub updated_date: u64,
    #[serde(rename = "fromRef")]
    pub from_ref: PullRequestRef,
    #[serde(rename = "toRef")]
    pub to_ref: PullRequestRef,
    #[serde(default)]
    pub author: Option<Participant>,
    #[serde(default)]
    pub links: Option<PullRequestLinks>,
}

impl PullRequest {
    /// Get the pull request URL
    pub fn web_url(&self) -> Option<String> {
        self.links
            .as_ref()?
            .self_link
            .first()
            .map(|link| link.href.clone())
    }

    /// Check if the pull request is still open
    pub fn is_open(&self) -> bool {
        self.state == PullRequestState::Open && self.open && !self.closed
    }

    /// Get the created date as a DateTime
    pub fn created_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.created_date as i64 / 1000, 0).unwrap_or_else(Utc::now)
    }

    /// Get the updated date as a DateTime
    pub fn updated_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.updated_date as i64 / 1000, 0).unwrap_or_else(Utc::now)
    }
}

/// Pull request reference (branch information)
#[derive(Debug, Clone, Deserialize)]
pub struct PullRequestRef {
    pub id: String,
    #[serde(rename = "displayId")]
    pub display_id: String,
    #[serde(rename = "latestCommit", default)]
    pub latest_commit: Option<String>,
}

/// Pull request participant
#[derive(Debug, Clone, Deserialize)]
pub struct Participant {
    pub user: User,
    #[serde(default)]
    pub approved: bool,
}

/// User information
#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub name: String,
    #[serde(rename = "displayName", default)]
    pub display_name: Option<String>,
}

/// Pull request links
#[derive(Debug, Clone, Deserialize)]
pub struct PullRequestLinks {
    #[serde(rename = "self")]
    pub self_link: Vec<SelfLink>,
}

/// Self link
#[derive(Debug, Clone, Deserialize)]
pub struct SelfLink {
    pub href: String,
}

/// Pull request state
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum PullRequestState {
    Open,
    Merged,
    Declined,
}

impl PullRequestState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "OPEN",
            Self::Merged => "MERGED",
            Self::Declined => "DECLINED",
        }
    }
}

/// Merge strategy for pull requests
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum MergeStrategy {
    #[serde(rename = "merge-commit")]
    Merge,
    #[serde(rename = "squash")]
    Squash,
    #[serde(rename = "fast-forward")]
    FastForward,
}

impl MergeStrategy {
    /// Commit message for strategies that write a new commit
    fn commit_message(&self, pr: &PullRequest) -> Option<String> {
        match self {
            MergeStrategy::Squash => Some(format!(
                "{}\n\n{}",
                pr.title,
                pr.description.as_deref().unwrap_or("")
            )),
            _ => None, // server default
        }
    }
}

/// Merge request payload
#[derive(Debug, Serialize)]
struct MergePullRequestRequest {
    version: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    strategy: Option<MergeStrategy>,
}
