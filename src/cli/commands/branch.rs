use crate::bitbucket::{BranchManager, Outcome};
use crate::cli::output::Output;
use crate::errors::Result;
use crate::utils::Spinner;
use clap::Subcommand;

#[derive(Debug, Subcommand)]
pub enum BranchAction {
    /// Ensure a branch exists, creating it from a start point if needed
    Create {
        /// Branch name
        name: String,

        /// Start point branch the new branch is cut from
        #[arg(long, default_value = "master")]
        from: String,
    },

    /// Ensure a branch does not exist
    Delete {
        /// Branch name
        name: String,
    },

    /// List branches
    List {
        /// Server-side substring filter
        #[arg(long)]
        filter: Option<String>,
    },
}

pub async fn run(action: BranchAction) -> Result<()> {
    let manager = BranchManager::new(super::build_client()?);

    match action {
        BranchAction::Create { name, from } => {
            let spinner = Spinner::new(format!("Ensuring branch '{name}' exists..."));
            let outcome = manager.ensure_present(&name, &from).await?;
            spinner.stop();

            match outcome {
                Outcome::Changed => {
                    Output::success(format!("Created branch '{name}' from '{from}'"))
                }
                Outcome::Unchanged => Output::info(format!("Branch '{name}' already exists")),
            }
        }

        BranchAction::Delete { name } => {
            let spinner = Spinner::new(format!("Ensuring branch '{name}' is absent..."));
            let outcome = manager.ensure_absent(&name).await?;
            spinner.stop();

            match outcome {
                Outcome::Changed => Output::success(format!("Deleted branch '{name}'")),
                Outcome::Unchanged => Output::info(format!("Branch '{name}' does not exist")),
            }
        }

        BranchAction::List { filter } => {
            let spinner = Spinner::new("Fetching branches...".to_string());
            let branches = manager.list_branches(filter.as_deref()).await?;
            spinner.stop();

            if branches.is_empty() {
                Output::info("No branches found");
                return Ok(());
            }

            for branch in &branches {
                let default_marker = if branch.is_default { " (default)" } else { "" };
                match &branch.latest_commit {
                    Some(commit) => Output::bullet(format!(
                        "{}{} @ {}",
                        branch.display_id,
                        default_marker,
                        &commit[..commit.len().min(10)]
                    )),
                    None => Output::bullet(format!("{}{}", branch.display_id, default_marker)),
                }
            }
        }
    }

    Ok(())
}
