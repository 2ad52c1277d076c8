use crate::bitbucket::client::{BitbucketClient, Page, BRANCH_UTILS_API};
use crate::bitbucket::Outcome;
use crate::errors::Result;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Branch manager for desired-state branch operations
pub struct BranchManager {
    client: BitbucketClient,
}

impl BranchManager {
    pub fn new(client: BitbucketClient) -> Self {
        Self { client }
    }

    /// Ensure the branch exists, creating it from `start_point` if needed.
    ///
    /// Reports `Unchanged` when the branch is already present; the
    /// start point of an existing branch is not inspected.
    pub async fn ensure_present(&self, name: &str, start_point: &str) -> Result<Outcome> {
        if self.find_branch(name).await?.is_some() {
            debug!("Branch {} already exists", name);
            return Ok(Outcome::Unchanged);
        }

        let request = CreateBranchRequest {
            name: name.to_string(),
            start_point: start_point.to_string(),
        };

        let branch: Branch = self
            .client
            .post_at(BRANCH_UTILS_API, "branches", &request)
            .await?;

        info!("Created branch {} from {}", branch.display_id, start_point);
        Ok(Outcome::Changed)
    }

    /// Ensure the branch does not exist, deleting it if needed
    pub async fn ensure_absent(&self, name: &str) -> Result<Outcome> {
        if self.find_branch(name).await?.is_none() {
            debug!("Branch {} already absent", name);
            return Ok(Outcome::Unchanged);
        }

        let request = DeleteBranchRequest {
            name: name.to_string(),
        };

        self.client
            .delete_at(BRANCH_UTILS_API, "branches", &request)
            .await?;

        info!("Deleted branch {}", name);
        Ok(Outcome::Changed)
    }

    /// Find a branch by its exact display name.
    ///
    /// `filterText` is a substring match on the server side, so the results
    /// are paged through and compared exactly.
    pub async fn find_branch(&self, name: &str) -> Result<Option<Branch>> {
        let mut start = 0u32;
        loop {
            let page: Page<Branch> = self
                .client
                .get_with_query(
                    "branches",
                    &[("filterText", name), ("start", &start.to_string())],
                )
                .await?;

            if let Some(branch) = page.values.into_iter().find(|b| b.display_id == name) {
                return Ok(Some(branch));
            }

            match (page.is_last_page, page.next_page_start) {
                (false, Some(next)) => start = next,
                _ => return Ok(None),
            }
        }
    }

    /// List branches, optionally filtered by a server-side substring match
    pub async fn list_branches(&self, filter: Option<&str>) -> Result<Vec<Branch>> {
        let mut branches = Vec::new();
        let mut start = 0u32;
        loop {
            let start_text = start.to_string();
            let mut query: Vec<(&str, &str)> = vec![("start", &start_text)];
            if let Some(filter) = filter {
                query.push(("filterText", filter));
            }

            let page: Page<Branch> = self.client.get_with_query("branches", &query).await?;
            branches.extend(page.values);

            match (page.is_last_page, page.next_page_start) {
                (false, Some(next)) => start = next,
                _ => return Ok(branches),
            }
        }
    }
}

/// Branch as returned by the listing endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct Branch {
    pub id: String,
    #[serde(rename = "displayId")]
    pub display_id: String,
    #[serde(rename = "latestCommit")]
    pub latest_commit: Option<String>,
    #[serde(rename = "isDefault", default)]
    pub is_default: bool,
}

/// Payload for branch creation (branch-utils API)
#[derive(Debug, Serialize)]
struct CreateBranchRequest {
    name: String,
    #[serde(rename = "startPoint")]
    start_point: String,
}

/// Payload for branch deletion (branch-utils API)
#[derive(Debug, Serialize)]
struct DeleteBranchRequest {
    name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_branch_request_payload() {
        let request = CreateBranchRequest {
            name: "feature/login".to_string(),
            start_point: "develop".to_string(),
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["name"], "feature/login");
        assert_eq!(json["startPoint"], "develop");
    }

    #[test]
    fn test_branch_deserialization() {
        let branch: Branch = serde_json::from_value(serde_json::json!({
            "id": "refs/heads/release/2024.06",
            "displayId": "release/2024.06",
            "type": "BRANCH",
            "latestCommit": "8d51122def5632836d1cb1026e879069e10a1e13",
            "isDefault": false
        }))
        .unwrap();

        assert_eq!(branch.display_id, "release/2024.06");
        assert_eq!(branch.id, "refs/heads/release/2024.06");
        assert!(!branch.is_default);
    }

    #[test]
    fn test_branch_deserialization_without_optional_fields() {
        let branch: Branch = serde_json::from_value(serde_json::json!({
            "id": "refs/heads/main",
            "displayId": "main"
        }))
        .unwrap();

        assert!(branch.latest_commit.is_none());
        assert!(!branch.is_default);
    }
}
