use crate::errors::{BbsError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variables that override stored credentials; checked by the
/// CLI before the settings file and this store
pub const ENV_USERNAME: &str = "BBSCTL_USERNAME";
pub const ENV_TOKEN: &str = "BBSCTL_TOKEN";

/// Credentials for one Bitbucket server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub username: Option<String>,
    pub token: String,
}

/// On-disk credential file (`auth.json`), keyed by server URL
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CredentialsFile {
    pub servers: HashMap<String, Credentials>,
    pub default_server: Option<String>,
}

/// Per-server credential store
pub struct CredentialStore {
    file: CredentialsFile,
    path: PathBuf,
}

impl CredentialStore {
    /// Open the store backed by `auth.json` in the given config directory
    pub fn open(config_dir: &Path) -> Result<Self> {
        let path = config_dir.join("auth.json");
        let file = if path.exists() {
            CredentialsFile::load_from_file(&path)?
        } else {
            CredentialsFile::default()
        };

        Ok(Self { file, path })
    }

    /// Store credentials for a server
    pub fn store(&mut self, server_url: &str, credentials: Credentials) -> Result<()> {
        self.file
            .servers
            .insert(server_url.to_string(), credentials);
        self.save()?;
        tracing::info!("Stored credentials for {}", server_url);
        Ok(())
    }

    /// Credentials stored for a server, if any
    pub fn get(&self, server_url: &str) -> Option<&Credentials> {
        self.file.servers.get(server_url)
    }

    /// Remove credentials for a server; returns whether anything was removed
    pub fn remove(&mut self, server_url: &str) -> Result<bool> {
        let removed = self.file.servers.remove(server_url).is_some();
        if removed {
            if self.file.default_server.as_deref() == Some(server_url) {
                self.file.default_server = None;
            }
            self.save()?;
            tracing::info!("Removed credentials for {}", server_url);
        }
        Ok(removed)
    }

    /// List all servers with stored credentials
    pub fn list_servers(&self) -> Vec<&String> {
        self.file.servers.keys().collect()
    }

    /// Set the default server
    pub fn set_default_server(&mut self, server_url: &str) -> Result<()> {
        if !self.file.servers.contains_key(server_url) {
            return Err(BbsError::auth(format!(
                "No credentials stored for server: {}",
                server_url
            )));
        }

        self.file.default_server = Some(server_url.to_string());
        self.save()
    }

    /// The default server, if one is set
    pub fn default_server(&self) -> Option<&String> {
        self.file.default_server.as_ref()
    }

    fn save(&self) -> Result<()> {
        self.file.save_to_file(&self.path)
    }
}

impl CredentialsFile {
    /// Load the credential file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .map_err(|e| BbsError::config(format!("Failed to read credential file: {}", e)))?;

        let file: CredentialsFile = serde_json::from_str(&content)
            .map_err(|e| BbsError::config(format!("Failed to parse credential file: {}", e)))?;

        Ok(file)
    }

    /// Save the credential file, atomically via a temp file rename
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                BbsError::config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| BbsError::config(format!("Failed to serialize credentials: {}", e)))?;

        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, content)
            .map_err(|e| BbsError::config(format!("Failed to write credential file: {}", e)))?;

        fs::rename(&temp_path, path)
            .map_err(|e| BbsError::config(format!("Failed to finalize credential file: {}", e)))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_store_and_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = CredentialStore::open(temp_dir.path()).unwrap();

        store
            .store(
                "https://bitbucket.company.com",
                Credentials {
                    username: Some("svc-automation".to_string()),
                    token: "secret".to_string(),
                },
            )
            .unwrap();

        let creds = store.get("https://bitbucket.company.com").unwrap();
        assert_eq!(creds.username.as_deref(), Some("svc-automation"));
        assert_eq!(creds.token, "secret");

        // Reopen from disk
        let reopened = CredentialStore::open(temp_dir.path()).unwrap();
        assert!(reopened.get("https://bitbucket.company.com").is_some());
        assert!(reopened.get("https://unknown.server.com").is_none());
    }

    #[test]
    fn test_default_server() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = CredentialStore::open(temp_dir.path()).unwrap();

        assert!(store.set_default_server("https://nowhere").is_err());

        store
            .store(
                "https://bitbucket.company.com",
                Credentials {
                    username: None,
                    token: "secret".to_string(),
                },
            )
            .unwrap();
        store
            .set_default_server("https://bitbucket.company.com")
            .unwrap();
        assert_eq!(
            store.default_server().unwrap(),
            "https://bitbucket.company.com"
        );

        // Removing the server clears the default
        assert!(store.remove("https://bitbucket.company.com").unwrap());
        assert!(store.default_server().is_none());
        assert!(!store.remove("https://bitbucket.company.com").unwrap());
    }
}
