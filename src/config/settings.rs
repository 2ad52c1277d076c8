use crate::errors::{BbsError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use url::Url;

/// Top-level bbsctl settings, persisted as JSON
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    pub bitbucket: BitbucketConfig,
}

/// Connection settings for a Bitbucket Server repository
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BitbucketConfig {
    pub url: String,
    pub project: String,
    pub repo: String,
    pub username: Option<String>,
    pub token: Option<String>,
    #[serde(default)]
    pub default_reviewers: Vec<String>,
}

impl Default for BitbucketConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            project: String::new(),
            repo: String::new(),
            username: None,
            token: None,
            default_reviewers: Vec::new(),
        }
    }
}

impl Settings {
    /// Load settings from a file, falling back to defaults when missing
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .map_err(|e| BbsError::config(format!("Failed to read config file: {}", e)))?;

        let settings: Settings = serde_json::from_str(&content)
            .map_err(|e| BbsError::config(format!("Failed to parse config file: {}", e)))?;

        Ok(settings)
    }

    /// Save settings to a file
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                BbsError::config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| BbsError::config(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, content)
            .map_err(|e| BbsError::config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// Keys understood by `set_value`/`get_value`, in display order
    pub const KEYS: &'static [&'static str] = &[
        "bitbucket.url",
        "bitbucket.project",
        "bitbucket.repo",
        "bitbucket.username",
        "bitbucket.token",
        "bitbucket.default_reviewers",
    ];

    /// Update a configuration value by dotted key
    pub fn set_value(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "bitbucket.url" => self.bitbucket.url = value.to_string(),
            "bitbucket.project" => self.bitbucket.project = value.to_string(),
            "bitbucket.repo" => self.bitbucket.repo = value.to_string(),
            "bitbucket.username" => self.bitbucket.username = Some(value.to_string()),
            "bitbucket.token" => self.bitbucket.token = Some(value.to_string()),
            "bitbucket.default_reviewers" => {
                self.bitbucket.default_reviewers = value
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect();
            }
            _ => return Err(BbsError::config(format!("Unknown config key: {}", key))),
        }

        Ok(())
    }

    /// Get a configuration value by dotted key
    pub fn get_value(&self, key: &str) -> Result<String> {
        let value = match key {
            "bitbucket.url" => self.bitbucket.url.clone(),
            "bitbucket.project" => self.bitbucket.project.clone(),
            "bitbucket.repo" => self.bitbucket.repo.clone(),
            "bitbucket.username" => self.bitbucket.username.clone().unwrap_or_default(),
            "bitbucket.token" => self.bitbucket.token.clone().unwrap_or_default(),
            "bitbucket.default_reviewers" => self.bitbucket.default_reviewers.join(","),
            _ => return Err(BbsError::config(format!("Unknown config key: {}", key))),
        };

        Ok(value)
    }

    /// Clear a configuration value by dotted key
    pub fn unset_value(&mut self, key: &str) -> Result<()> {
        match key {
            "bitbucket.url" => self.bitbucket.url.clear(),
            "bitbucket.project" => self.bitbucket.project.clear(),
            "bitbucket.repo" => self.bitbucket.repo.clear(),
            "bitbucket.username" => self.bitbucket.username = None,
            "bitbucket.token" => self.bitbucket.token = None,
            "bitbucket.default_reviewers" => self.bitbucket.default_reviewers.clear(),
            _ => return Err(BbsError::config(format!("Unknown config key: {}", key))),
        }

        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.bitbucket.url.is_empty() {
            return Err(BbsError::config(
                "Bitbucket URL not configured. Run 'bbsctl setup' or 'bbsctl config set bitbucket.url <url>'.",
            ));
        }

        let url = Url::parse(&self.bitbucket.url)?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(BbsError::config(
                "Bitbucket URL must start with http:// or https://",
            ));
        }

        if self.bitbucket.project.is_empty() {
            return Err(BbsError::config("Bitbucket project key not configured"));
        }

        if self.bitbucket.repo.is_empty() {
            return Err(BbsError::config("Bitbucket repository not configured"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn configured_settings() -> Settings {
        let mut settings = Settings::default();
        settings.bitbucket.url = "https://bitbucket.example.com".to_string();
        settings.bitbucket.project = "INFRA".to_string();
        settings.bitbucket.repo = "deploy-scripts".to_string();
        settings
    }

    #[test]
    fn test_set_and_get_values() {
        let mut settings = Settings::default();

        settings
            .set_value("bitbucket.url", "https://bitbucket.example.com")
            .unwrap();
        settings.set_value("bitbucket.project", "INFRA").unwrap();
        settings
            .set_value("bitbucket.default_reviewers", "alice, bob")
            .unwrap();

        assert_eq!(
            settings.get_value("bitbucket.url").unwrap(),
            "https://bitbucket.example.com"
        );
        assert_eq!(settings.get_value("bitbucket.project").unwrap(), "INFRA");
        assert_eq!(
            settings.bitbucket.default_reviewers,
            vec!["alice".to_string(), "bob".to_string()]
        );

        assert!(settings.set_value("bitbucket.unknown", "x").is_err());
        assert!(settings.get_value("nope").is_err());
    }

    #[test]
    fn test_unset_value() {
        let mut settings = configured_settings();
        settings.set_value("bitbucket.token", "secret").unwrap();

        settings.unset_value("bitbucket.token").unwrap();
        assert!(settings.bitbucket.token.is_none());

        settings.unset_value("bitbucket.url").unwrap();
        assert!(settings.bitbucket.url.is_empty());
    }

    #[test]
    fn test_validate() {
        assert!(configured_settings().validate().is_ok());

        let mut missing_url = configured_settings();
        missing_url.bitbucket.url.clear();
        assert!(missing_url.validate().is_err());

        let mut bad_scheme = configured_settings();
        bad_scheme.bitbucket.url = "ftp://bitbucket.example.com".to_string();
        assert!(bad_scheme.validate().is_err());

        let mut missing_repo = configured_settings();
        missing_repo.bitbucket.repo.clear();
        assert!(missing_repo.validate().is_err());
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.json");

        let mut settings = configured_settings();
        settings.bitbucket.username = Some("svc-automation".to_string());
        settings.save_to_file(&path).unwrap();

        let loaded = Settings::load_from_file(&path).unwrap();
        assert_eq!(loaded.bitbucket.url, settings.bitbucket.url);
        assert_eq!(
            loaded.bitbucket.username.as_deref(),
            Some("svc-automation")
        );
    }

    #[test]
    fn test_load_missing_file_yields_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let settings = Settings::load_from_file(&temp_dir.path().join("absent.json")).unwrap();
        assert!(settings.bitbucket.url.is_empty());
    }
}
