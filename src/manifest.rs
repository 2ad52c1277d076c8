//! Declarative manifest for `bbsctl apply`.
//!
//! A TOML file lists desired branch states and pull requests; `apply` walks
//! the items in order (branches first, then pull requests) and reconciles
//! the server against them.

use crate::errors::{BbsError, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Parsed apply manifest
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Manifest {
    #[serde(default)]
    pub branches: Vec<BranchSpec>,
    #[serde(default)]
    pub pull_requests: Vec<PullRequestSpec>,
}

/// Desired state for one branch
#[derive(Debug, Clone, Deserialize)]
pub struct BranchSpec {
    pub name: String,
    /// Start point used when the branch has to be created
    #[serde(default = "default_start_point")]
    pub from: String,
    #[serde(default)]
    pub state: DesiredState,
}

/// Desired pull request and the actions to run against it
#[derive(Debug, Clone, Deserialize)]
pub struct PullRequestSpec {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub from: String,
    #[serde(default = "default_start_point")]
    pub to: String,
    #[serde(default = "default_actions")]
    pub actions: Vec<PrAction>,
    /// Delete a conflicting open pull request before creating
    #[serde(default)]
    pub replace_existing: bool,
    #[serde(default)]
    pub reviewers: Vec<String>,
}

/// present/absent toggle for branches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DesiredState {
    #[default]
    Present,
    Absent,
}

/// Actions for a pull request item, executed in create/approve/merge order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrAction {
    Create,
    Approve,
    Merge,
}

fn default_start_point() -> String {
    "master".to_string()
}

fn default_actions() -> Vec<PrAction> {
    vec![PrAction::Create]
}

impl Manifest {
    /// Load and validate a manifest file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            BbsError::manifest(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let manifest: Manifest = toml::from_str(&content)
            .map_err(|e| BbsError::manifest(format!("Failed to parse {}: {}", path.display(), e)))?;

        manifest.validate()?;
        Ok(manifest)
    }

    /// Reject items that cannot be applied
    pub fn validate(&self) -> Result<()> {
        for branch in &self.branches {
            if branch.name.is_empty() {
                return Err(BbsError::manifest("Branch item with empty name"));
            }
            if branch.state == DesiredState::Present && branch.from.is_empty() {
                return Err(BbsError::manifest(format!(
                    "Branch '{}' has an empty start point",
                    branch.name
                )));
            }
        }

        for pr in &self.pull_requests {
            if pr.title.is_empty() {
                return Err(BbsError::manifest("Pull request item with empty title"));
            }
            if pr.from.is_empty() || pr.to.is_empty() {
                return Err(BbsError::manifest(format!(
                    "Pull request '{}' must name both source and target branches",
                    pr.title
                )));
            }
            if pr.from == pr.to {
                return Err(BbsError::manifest(format!(
                    "Pull request '{}' has identical source and target branches",
                    pr.title
                )));
            }
            if pr.actions.is_empty() {
                return Err(BbsError::manifest(format!(
                    "Pull request '{}' has no actions",
                    pr.title
                )));
            }
        }

        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.branches.is_empty() && self.pull_requests.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_manifest() {
        let manifest: Manifest = toml::from_str(
            r#"
            [[branches]]
            name = "release/2024.06"
            from = "develop"

            [[branches]]
            name = "feature/stale"
            state = "absent"

            [[pull_requests]]
            title = "Release 2024.06"
            description = "Cut from develop"
            from = "release/2024.06"
            to = "master"
            actions = ["create", "merge"]
            replace_existing = true
            reviewers = ["alice", "bob"]
            "#,
        )
        .unwrap();

        manifest.validate().unwrap();

        assert_eq!(manifest.branches.len(), 2);
        assert_eq!(manifest.branches[0].from, "develop");
        assert_eq!(manifest.branches[0].state, DesiredState::Present);
        assert_eq!(manifest.branches[1].state, DesiredState::Absent);

        let pr = &manifest.pull_requests[0];
        assert_eq!(pr.actions, vec![PrAction::Create, PrAction::Merge]);
        assert!(pr.replace_existing);
        assert_eq!(pr.reviewers, vec!["alice", "bob"]);
    }

    #[test]
    fn test_defaults() {
        let manifest: Manifest = toml::from_str(
            r#"
            [[branches]]
            name = "feature/login"

            [[pull_requests]]
            title = "Add login"
            from = "feature/login"
            "#,
        )
        .unwrap();

        assert_eq!(manifest.branches[0].from, "master");
        let pr = &manifest.pull_requests[0];
        assert_eq!(pr.to, "master");
        assert_eq!(pr.actions, vec![PrAction::Create]);
        assert!(!pr.replace_existing);
        assert!(pr.reviewers.is_empty());
    }

    #[test]
    fn test_validation_rejects_same_refs() {
        let manifest: Manifest = toml::from_str(
            r#"
            [[pull_requests]]
            title = "Broken"
            from = "master"
            to = "master"
            "#,
        )
        .unwrap();

        assert!(manifest.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_empty_branch_name() {
        let manifest: Manifest = toml::from_str(
            r#"
            [[branches]]
            name = ""
            "#,
        )
        .unwrap();

        assert!(manifest.validate().is_err());
    }

    #[test]
    fn test_empty_manifest() {
        let manifest: Manifest = toml::from_str("").unwrap();
        assert!(manifest.is_empty());
        manifest.validate().unwrap();
    }
}
