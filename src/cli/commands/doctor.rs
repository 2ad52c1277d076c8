use crate::cli::output::Output;
use crate::config::auth::ENV_TOKEN;
use crate::config::{self, CredentialStore, Settings};
use crate::errors::Result;
use crate::utils::Spinner;

/// Check configuration and server connectivity
pub async fn run() -> Result<()> {
    println!("🩺 bbsctl Doctor");
    println!("━━━━━━━━━━━━━━━━");
    println!("Diagnosing configuration and server connectivity...");

    let mut issues_found = 0;
    let mut warnings_found = 0;

    let settings = check_configuration(&mut issues_found)?;

    if let Some(settings) = &settings {
        warnings_found += check_credentials(settings)?;

        if issues_found == 0 {
            issues_found += check_connection(settings).await?;
        }
    }

    print_summary(issues_found, warnings_found);
    Ok(())
}

fn check_configuration(issues: &mut u32) -> Result<Option<Settings>> {
    Output::check_start("Checking configuration...");

    let path = config::settings_path()?;
    if !path.exists() {
        Output::error(format!("No configuration file at {}", path.display()));
        Output::solution("Run 'bbsctl setup' to configure");
        *issues += 1;
        return Ok(None);
    }

    let settings = match Settings::load_from_file(&path) {
        Ok(settings) => settings,
        Err(e) => {
            Output::error(format!("Configuration file is invalid: {}", e));
            Output::solution("Fix the file or rerun 'bbsctl setup'");
            *issues += 1;
            return Ok(None);
        }
    };

    match settings.validate() {
        Ok(()) => {
            Output::success(format!("Configuration valid ({})", path.display()));
            Output::sub_item(format!("Server: {}", settings.bitbucket.url));
            Output::sub_item(format!(
                "Repository: {}/{}",
                settings.bitbucket.project, settings.bitbucket.repo
            ));
            Ok(Some(settings))
        }
        Err(e) => {
            Output::error(format!("Configuration incomplete: {}", e));
            *issues += 1;
            Ok(None)
        }
    }
}

fn check_credentials(settings: &Settings) -> Result<u32> {
    Output::check_start("Checking credentials...");

    if std::env::var(ENV_TOKEN).is_ok() {
        Output::success(format!("Using credentials from {}", ENV_TOKEN));
        return Ok(0);
    }

    if settings.bitbucket.token.is_some() {
        Output::success("Using token from configuration file");
        return Ok(0);
    }

    let store = CredentialStore::open(&config::get_config_dir()?)?;
    if store.get(&settings.bitbucket.url).is_some() {
        Output::success("Using credentials from the credential store");
        return Ok(0);
    }

    Output::warning("No credentials found for the configured server");
    Output::solution(format!(
        "Run 'bbsctl setup', set bitbucket.token, or export {}",
        ENV_TOKEN
    ));
    Ok(1)
}

async fn check_connection(settings: &Settings) -> Result<u32> {
    Output::check_start("Checking server connectivity...");

    let client = match super::client_for(settings) {
        Ok(client) => client,
        Err(e) => {
            Output::error(format!("Could not build API client: {}", e));
            return Ok(1);
        }
    };

    let spinner = Spinner::new("Contacting Bitbucket Server...".to_string());
    let result = client.test_connection().await;
    spinner.stop();

    match result {
        Ok(()) => {
            Output::success("Server reachable, repository accessible");
            Ok(0)
        }
        Err(e) => {
            Output::error(format!("Connection test failed: {}", e));
            Output::solution("Verify server URL, project, repository and credentials");
            Ok(1)
        }
    }
}

fn print_summary(issues: u32, warnings: u32) {
    Output::section("Summary");
    if issues == 0 && warnings == 0 {
        Output::success("Everything looks good");
    } else {
        if issues > 0 {
            Output::error(format!("{} issue(s) found", issues));
        }
        if warnings > 0 {
            Output::warning(format!("{} warning(s) found", warnings));
        }
    }
}
