use crate::bitbucket::{
    CreatePullRequestRequest, MergeStrategy, PullRequest, PullRequestManager, PullRequestState,
};
use crate::cli::output::Output;
use crate::errors::{BbsError, Result};
use crate::utils::Spinner;
use clap::{Subcommand, ValueEnum};

#[derive(Debug, Subcommand)]
pub enum PrCommand {
    /// Create a pull request
    Create {
        /// Pull request title
        #[arg(long)]
        title: String,

        /// Pull request description
        #[arg(long)]
        description: Option<String>,

        /// Source branch
        #[arg(long)]
        from: String,

        /// Target branch
        #[arg(long, default_value = "master")]
        to: String,

        /// Reviewer username (repeatable); defaults come from configuration
        #[arg(long = "reviewer")]
        reviewers: Vec<String>,

        /// Delete a conflicting open pull request before creating
        #[arg(long)]
        replace_existing: bool,

        /// Approve the pull request after creating it
        #[arg(long)]
        approve: bool,

        /// Merge the pull request after creating it
        #[arg(long)]
        merge: bool,

        /// Merge strategy when --merge is given
        #[arg(long, value_enum)]
        strategy: Option<MergeStrategyArg>,
    },

    /// Approve the open pull request matching title and branches
    Approve {
        /// Pull request title
        #[arg(long)]
        title: String,

        /// Source branch
        #[arg(long)]
        from: String,

        /// Target branch
        #[arg(long, default_value = "master")]
        to: String,
    },

    /// Merge a pull request, located by id or by title and branches
    Merge {
        /// Pull request id
        #[arg(long, conflicts_with_all = ["title", "from"])]
        id: Option<u64>,

        /// Pull request title
        #[arg(long, requires = "from")]
        title: Option<String>,

        /// Source branch
        #[arg(long)]
        from: Option<String>,

        /// Target branch
        #[arg(long, default_value = "master")]
        to: String,

        /// Merge strategy (server default when omitted)
        #[arg(long, value_enum)]
        strategy: Option<MergeStrategyArg>,
    },

    /// List pull requests
    List {
        /// Filter by state
        #[arg(long, value_enum)]
        state: Option<StateArg>,
    },
}

/// Merge strategy CLI argument
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum MergeStrategyArg {
    MergeCommit,
    Squash,
    FastForward,
}

impl From<MergeStrategyArg> for MergeStrategy {
    fn from(arg: MergeStrategyArg) -> Self {
        match arg {
            MergeStrategyArg::MergeCommit => MergeStrategy::Merge,
            MergeStrategyArg::Squash => MergeStrategy::Squash,
            MergeStrategyArg::FastForward => MergeStrategy::FastForward,
        }
    }
}

/// Pull request state CLI argument
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum StateArg {
    Open,
    Merged,
    Declined,
}

impl From<StateArg> for PullRequestState {
    fn from(arg: StateArg) -> Self {
        match arg {
            StateArg::Open => PullRequestState::Open,
            StateArg::Merged => PullRequestState::Merged,
            StateArg::Declined => PullRequestState::Declined,
        }
    }
}

pub async fn run(command: PrCommand) -> Result<()> {
    let settings = super::load_validated_settings()?;
    let manager = PullRequestManager::new(super::client_for(&settings)?);

    match command {
        PrCommand::Create {
            title,
            description,
            from,
            to,
            reviewers,
            replace_existing,
            approve,
            merge,
            strategy,
        } => {
            let reviewers = if reviewers.is_empty() {
                settings.bitbucket.default_reviewers.clone()
            } else {
                reviewers
            };

            let request = CreatePullRequestRequest::new(
                &title,
                description,
                &from,
                &to,
                manager.project_key(),
                manager.repo_slug(),
            )
            .with_reviewers(reviewers);

            let spinner = Spinner::new(format!("Creating pull request '{title}'..."));
            let pr = manager.create_pull_request(&request, replace_existing).await?;
            spinner.stop();

            Output::success(format!("Created pull request #{}: {}", pr.id, pr.title));
            Output::sub_item(format!("{} -> {}", pr.from_ref.display_id, pr.to_ref.display_id));
            if let Some(url) = pr.web_url() {
                Output::sub_item(url);
            }

            if approve {
                manager.approve_pull_request(pr.id).await?;
                Output::success(format!("Approved pull request #{}", pr.id));
            }

            if merge {
                let spinner = Spinner::new(format!("Merging pull request #{}...", pr.id));
                let merged = manager
                    .merge_pull_request(pr.id, strategy.map(Into::into))
                    .await?;
                spinner.stop();
                Output::success(format!("Merged pull request #{}", merged.id));
            }
        }

        PrCommand::Approve { title, from, to } => {
            let pr = find_required(&manager, &title, &from, &to).await?;
            manager.approve_pull_request(pr.id).await?;
            Output::success(format!("Approved pull request #{}: {}", pr.id, pr.title));
        }

        PrCommand::Merge {
            id,
            title,
            from,
            to,
            strategy,
        } => {
            let pr_id = match (id, title, from) {
                (Some(id), _, _) => id,
                (None, Some(title), Some(from)) => {
                    find_required(&manager, &title, &from, &to).await?.id
                }
                _ => {
                    return Err(BbsError::validation(
                        "Identify the pull request with --id, or with --title and --from",
                    ))
                }
            };

            let spinner = Spinner::new(format!("Merging pull request #{pr_id}..."));
            let merged = manager
                .merge_pull_request(pr_id, strategy.map(Into::into))
                .await?;
            spinner.stop();

            Output::success(format!("Merged pull request #{}: {}", merged.id, merged.title));
        }

        PrCommand::List { state } => {
            let spinner = Spinner::new("Fetching pull requests...".to_string());
            let pull_requests = manager.list_pull_requests(state.map(Into::into)).await?;
            spinner.stop();

            if pull_requests.is_empty() {
                Output::info("No pull requests found");
                return Ok(());
            }

            for pr in &pull_requests {
                print_pull_request(pr);
            }
        }
    }

    Ok(())
}

/// Locate the open PR matching the selector, or fail with the lookup error
/// automation callers expect
async fn find_required(
    manager: &PullRequestManager,
    title: &str,
    from: &str,
    to: &str,
) -> Result<PullRequest> {
    manager
        .find_pull_request(title, from, to)
        .await?
        .ok_or_else(|| {
            BbsError::validation(format!(
                "Unable to find an open pull request matching title '{title}' ({from} -> {to})"
            ))
        })
}

fn print_pull_request(pr: &PullRequest) {
    Output::bullet(format!(
        "#{} [{}] {} ({} -> {}, updated {})",
        pr.id,
        pr.state.as_str(),
        pr.title,
        pr.from_ref.display_id,
        pr.to_ref.display_id,
        pr.updated_at().format("%Y-%m-%d %H:%M"),
    ));
}
