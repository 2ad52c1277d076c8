use crate::cli::output::Output;
use crate::config::{settings_path, Settings};
use crate::errors::Result;
use clap::Subcommand;

#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Set a configuration value
    Set {
        /// Configuration key (e.g., bitbucket.url)
        key: String,
        /// Configuration value
        value: String,
    },

    /// Get a configuration value
    Get {
        /// Configuration key
        key: String,
    },

    /// List all configuration values
    List,

    /// Clear a configuration value
    Unset {
        /// Configuration key
        key: String,
    },
}

pub async fn run(action: ConfigAction) -> Result<()> {
    let path = settings_path()?;
    let mut settings = Settings::load_from_file(&path)?;

    match action {
        ConfigAction::Set { key, value } => {
            settings.set_value(&key, &value)?;
            settings.save_to_file(&path)?;
            Output::success(format!("Set {}", key));
        }

        ConfigAction::Get { key } => {
            println!("{}", settings.get_value(&key)?);
        }

        ConfigAction::List => {
            for key in Settings::KEYS {
                let mut value = settings.get_value(key)?;
                // Never echo secrets
                if key.ends_with("token") && !value.is_empty() {
                    value = "********".to_string();
                }
                println!("{} = {}", key, value);
            }
        }

        ConfigAction::Unset { key } => {
            settings.unset_value(&key)?;
            settings.save_to_file(&path)?;
            Output::success(format!("Unset {}", key));
        }
    }

    Ok(())
}
