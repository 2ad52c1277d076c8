use crate::cli::output::Output;
use crate::config::{self, CredentialStore, Credentials, Settings};
use crate::errors::{BbsError, Result};
use crate::utils::Spinner;
use dialoguer::{theme::ColorfulTheme, Confirm, Input, Password};
use tracing::warn;

/// Run the interactive setup wizard
pub async fn run(force: bool) -> Result<()> {
    println!("🔧 Welcome to bbsctl setup!");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("This wizard configures the Bitbucket Server connection.\n");

    let settings_path = config::settings_path()?;
    if settings_path.exists() && !force {
        let reconfigure = Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt("bbsctl is already configured. Do you want to reconfigure?")
            .default(false)
            .interact()
            .map_err(|e| BbsError::config(format!("Input error: {}", e)))?;

        if !reconfigure {
            Output::success("Setup cancelled. Run with --force to reconfigure.");
            return Ok(());
        }
    }

    let mut settings = Settings::load_from_file(&settings_path).unwrap_or_default();

    println!("\n⚙️  Step 1: Server connection...");
    let theme = ColorfulTheme::default();

    let url: String = Input::with_theme(&theme)
        .with_prompt("Bitbucket Server URL (https://...)")
        .with_initial_text(settings.bitbucket.url.clone())
        .validate_with(|input: &String| {
            if input.starts_with("http://") || input.starts_with("https://") {
                Ok(())
            } else {
                Err("URL must start with http:// or https://")
            }
        })
        .interact_text()
        .map_err(|e| BbsError::config(format!("Input error: {}", e)))?;

    let project: String = Input::with_theme(&theme)
        .with_prompt("Project key")
        .with_initial_text(settings.bitbucket.project.clone())
        .interact_text()
        .map_err(|e| BbsError::config(format!("Input error: {}", e)))?;

    let repo: String = Input::with_theme(&theme)
        .with_prompt("Repository slug")
        .with_initial_text(settings.bitbucket.repo.clone())
        .interact_text()
        .map_err(|e| BbsError::config(format!("Input error: {}", e)))?;

    println!("\n🔑 Step 2: Credentials...");
    let username: String = Input::with_theme(&theme)
        .with_prompt("Username (blank for bearer-token auth)")
        .allow_empty(true)
        .with_initial_text(settings.bitbucket.username.clone().unwrap_or_default())
        .interact_text()
        .map_err(|e| BbsError::config(format!("Input error: {}", e)))?;

    let token: String = Password::with_theme(&theme)
        .with_prompt("Token or password")
        .allow_empty_password(true)
        .interact()
        .map_err(|e| BbsError::config(format!("Input error: {}", e)))?;

    settings.bitbucket.url = url.trim_end_matches('/').to_string();
    settings.bitbucket.project = project;
    settings.bitbucket.repo = repo;
    settings.bitbucket.username = if username.is_empty() {
        None
    } else {
        Some(username)
    };

    if !token.is_empty() {
        let store_credentials = Confirm::with_theme(&theme)
            .with_prompt("Store the token in the credential store (~/.bbsctl/auth.json)?")
            .default(true)
            .interact()
            .map_err(|e| BbsError::config(format!("Input error: {}", e)))?;

        if store_credentials {
            let mut store = CredentialStore::open(&config::ensure_config_dir()?)?;
            store.store(
                &settings.bitbucket.url,
                Credentials {
                    username: settings.bitbucket.username.clone(),
                    token: token.clone(),
                },
            )?;
            store.set_default_server(&settings.bitbucket.url)?;
            settings.bitbucket.token = None;
        } else {
            settings.bitbucket.token = Some(token.clone());
        }
    }

    println!("\n💾 Step 3: Saving configuration...");
    settings.save_to_file(&settings_path)?;
    Output::success(format!("Configuration written to {}", settings_path.display()));

    println!("\n🔌 Step 4: Testing connection...");
    if token.is_empty() && settings.bitbucket.token.is_none() {
        Output::warning("No token provided, skipping connection test");
    } else {
        match super::client_for(&settings) {
            Ok(client) => {
                let spinner = Spinner::new("Contacting Bitbucket Server...".to_string());
                let result = client.test_connection().await;
                spinner.stop();

                match result {
                    Ok(()) => Output::success("Connection successful!"),
                    Err(e) => {
                        warn!("Connection test failed: {}", e);
                        Output::warning(format!("Connection test failed: {}", e));
                        Output::tip("You can test the connection later with: bbsctl doctor");
                    }
                }
            }
            Err(e) => Output::warning(format!("Could not build API client: {}", e)),
        }
    }

    Output::next_steps(&[
        "Verify the setup: bbsctl doctor",
        "Create a branch: bbsctl branch create feature/example --from develop",
        "Open a pull request: bbsctl pr create --title \"Example\" --from feature/example",
    ]);

    Ok(())
}
