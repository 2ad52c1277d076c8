use crate::bitbucket::{
    BranchManager, CreatePullRequestRequest, Outcome, PullRequestManager,
};
use crate::cli::output::Output;
use crate::errors::Result;
use crate::manifest::{BranchSpec, DesiredState, Manifest, PrAction, PullRequestSpec};
use crate::utils::Spinner;
use std::path::Path;
use tracing::debug;

/// Apply a declarative manifest: branches first, then pull requests,
/// stopping at the first failure.
pub async fn run(manifest_path: &Path, dry_run: bool) -> Result<()> {
    let manifest = Manifest::load(manifest_path)?;
    if manifest.is_empty() {
        Output::warning("Manifest has no branches or pull requests");
        return Ok(());
    }

    if dry_run {
        plan(&manifest);
        return Ok(());
    }

    let settings = super::load_validated_settings()?;
    let client = super::client_for(&settings)?;
    let branches = BranchManager::new(client.clone());
    let pull_requests = PullRequestManager::new(client);

    let mut changed = 0usize;
    let mut unchanged = 0usize;

    if !manifest.branches.is_empty() {
        Output::section("Branches");
        for spec in &manifest.branches {
            let outcome = apply_branch(&branches, spec).await?;
            tally(outcome, &mut changed, &mut unchanged);
        }
    }

    if !manifest.pull_requests.is_empty() {
        Output::section("Pull requests");
        for spec in &manifest.pull_requests {
            let outcomes =
                apply_pull_request(&pull_requests, &settings.bitbucket.default_reviewers, spec)
                    .await?;
            for outcome in outcomes {
                tally(outcome, &mut changed, &mut unchanged);
            }
        }
    }

    Output::section("Summary");
    Output::sub_item(format!("{changed} changed, {unchanged} unchanged"));
    Ok(())
}

fn tally(outcome: Outcome, changed: &mut usize, unchanged: &mut usize) {
    match outcome {
        Outcome::Changed => *changed += 1,
        Outcome::Unchanged => *unchanged += 1,
    }
}

/// Print what would be done, without calling the server
fn plan(manifest: &Manifest) {
    Output::section("Plan (dry run)");
    for spec in &manifest.branches {
        match spec.state {
            DesiredState::Present => {
                Output::bullet(format!("branch '{}': ensure present (from '{}')", spec.name, spec.from))
            }
            DesiredState::Absent => {
                Output::bullet(format!("branch '{}': ensure absent", spec.name))
            }
        }
    }
    for spec in &manifest.pull_requests {
        let actions: Vec<&str> = ordered_actions(spec)
            .iter()
            .map(|a| match a {
                PrAction::Create => "create",
                PrAction::Approve => "approve",
                PrAction::Merge => "merge",
            })
            .collect();
        Output::bullet(format!(
            "pull request '{}' ({} -> {}): {}",
            spec.title,
            spec.from,
            spec.to,
            actions.join(", ")
        ));
    }
}

async fn apply_branch(manager: &BranchManager, spec: &BranchSpec) -> Result<Outcome> {
    let spinner = Spinner::new(format!("Reconciling branch '{}'...", spec.name));
    let outcome = match spec.state {
        DesiredState::Present => manager.ensure_present(&spec.name, &spec.from).await?,
        DesiredState::Absent => manager.ensure_absent(&spec.name).await?,
    };
    spinner.stop();

    match (spec.state, outcome) {
        (DesiredState::Present, Outcome::Changed) => {
            Output::success(format!("Created branch '{}' from '{}'", spec.name, spec.from))
        }
        (DesiredState::Absent, Outcome::Changed) => {
            Output::success(format!("Deleted branch '{}'", spec.name))
        }
        (_, Outcome::Unchanged) => {
            Output::sub_item(format!("branch '{}' already in desired state", spec.name))
        }
    }

    Ok(outcome)
}

/// Run a pull request item's actions in create/approve/merge order
async fn apply_pull_request(
    manager: &PullRequestManager,
    default_reviewers: &[String],
    spec: &PullRequestSpec,
) -> Result<Vec<Outcome>> {
    let mut outcomes = Vec::new();
    let mut pr_id: Option<u64> = None;

    for action in ordered_actions(spec) {
        match action {
            PrAction::Create => {
                // Desired-state semantics: an open PR with the same title
                // and refs satisfies the item.
                if let Some(existing) = manager
                    .find_pull_request(&spec.title, &spec.from, &spec.to)
                    .await?
                {
                    debug!("Pull request #{} already open", existing.id);
                    Output::sub_item(format!(
                        "pull request '{}' already open as #{}",
                        spec.title, existing.id
                    ));
                    pr_id = Some(existing.id);
                    outcomes.push(Outcome::Unchanged);
                    continue;
                }

                let reviewers = if spec.reviewers.is_empty() {
                    default_reviewers.to_vec()
                } else {
                    spec.reviewers.clone()
                };

                let request = CreatePullRequestRequest::new(
                    &spec.title,
                    spec.description.clone(),
                    &spec.from,
                    &spec.to,
                    manager.project_key(),
                    manager.repo_slug(),
                )
                .with_reviewers(reviewers);

                let spinner = Spinner::new(format!("Creating pull request '{}'...", spec.title));
                let pr = manager
                    .create_pull_request(&request, spec.replace_existing)
                    .await?;
                spinner.stop();

                Output::success(format!("Created pull request #{}: {}", pr.id, pr.title));
                pr_id = Some(pr.id);
                outcomes.push(Outcome::Changed);
            }

            PrAction::Approve => {
                let id = match pr_id {
                    Some(id) => id,
                    None => locate(manager, spec).await?,
                };
                manager.approve_pull_request(id).await?;
                Output::success(format!("Approved pull request #{id}"));
                pr_id = Some(id);
                outcomes.push(Outcome::Changed);
            }

            PrAction::Merge => {
                let id = match pr_id {
                    Some(id) => id,
                    None => locate(manager, spec).await?,
                };
                let spinner = Spinner::new(format!("Merging pull request #{id}..."));
                manager.merge_pull_request(id, None).await?;
                spinner.stop();
                Output::success(format!("Merged pull request #{id}"));
                outcomes.push(Outcome::Changed);
            }
        }
    }

    Ok(outcomes)
}

async fn locate(manager: &PullRequestManager, spec: &PullRequestSpec) -> Result<u64> {
    manager
        .find_pull_request(&spec.title, &spec.from, &spec.to)
        .await?
        .map(|pr| pr.id)
        .ok_or_else(|| {
            crate::errors::BbsError::validation(format!(
                "Unable to find an open pull request matching title '{}' ({} -> {})",
                spec.title, spec.from, spec.to
            ))
        })
}

/// Actions always run in create/approve/merge order regardless of how the
/// manifest lists them
fn ordered_actions(spec: &PullRequestSpec) -> Vec<PrAction> {
    [PrAction::Create, PrAction::Approve, PrAction::Merge]
        .into_iter()
        .filter(|action| spec.actions.contains(action))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_actions_are_normalized_to_canonical_order() {
        let manifest: Manifest = toml::from_str(
            r#"
            [[pull_requests]]
            title = "Release"
            from = "release/1"
            to = "master"
            actions = ["merge", "create"]
            "#,
        )
        .unwrap();

        assert_eq!(
            ordered_actions(&manifest.pull_requests[0]),
            vec![PrAction::Create, PrAction::Merge]
        );
    }
}
