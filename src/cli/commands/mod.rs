pub mod apply;
pub mod branch;
pub mod completions;
pub mod config;
pub mod doctor;
pub mod pr;
pub mod setup;
pub mod version;

use crate::bitbucket::BitbucketClient;
use crate::config::auth::{ENV_TOKEN, ENV_USERNAME};
use crate::config::{CredentialStore, Settings};
use crate::errors::Result;

/// Load settings from disk and fail early when incomplete
pub(crate) fn load_validated_settings() -> Result<Settings> {
    let settings = crate::config::load_settings()?;
    settings.validate()?;
    Ok(settings)
}

/// Build an API client for the configured server.
///
/// Credential precedence: `BBSCTL_TOKEN`/`BBSCTL_USERNAME` environment
/// variables, then the settings file, then the credential store.
pub(crate) fn client_for(settings: &Settings) -> Result<BitbucketClient> {
    let mut bitbucket = settings.bitbucket.clone();

    if let Ok(token) = std::env::var(ENV_TOKEN) {
        bitbucket.token = Some(token);
        if let Ok(username) = std::env::var(ENV_USERNAME) {
            bitbucket.username = Some(username);
        }
    } else if bitbucket.token.is_none() {
        let store = CredentialStore::open(&crate::config::get_config_dir()?)?;
        if let Some(credentials) = store.get(&bitbucket.url) {
            bitbucket.username = credentials.username.clone().or(bitbucket.username);
            bitbucket.token = Some(credentials.token.clone());
        }
    }

    BitbucketClient::new(&bitbucket)
}

/// Load settings and build a client in one step
pub(crate) fn build_client() -> Result<BitbucketClient> {
    let settings = load_validated_settings()?;
    client_for(&settings)
}
