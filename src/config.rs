use std::env;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};
use crate::utils::mask_token;

pub const URL_VAR: &str = "TIMESHEET_API_URL";
pub const TOKEN_VAR: &str = "TIMESHEET_API_TOKEN";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Config {
    pub api_url: String,
    pub api_token: String,
}

impl Config {
    pub fn new(api_url: String, api_token: String) -> Self {
        Config { api_url, api_token }
    }

    pub fn get_config_path() -> Option<PathBuf> {
        ProjectDirs::from("com", "timesheet", "timesheet")
            .map(|proj_dirs| proj_dirs.config_dir().join("config.json"))
    }

    /// Loads the saved configuration and applies the environment overrides
    pub fn load() -> Result<Self> {
        let config_path = Self::get_config_path().ok_or(ConfigError::NoDirectory("config"))?;
        let saved = if config_path.exists() {
            Some(Self::load_from(&config_path)?)
        } else {
            None
        };
        Self::resolve(saved, env::var(URL_VAR).ok(), env::var(TOKEN_VAR).ok())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let config_data = fs::read_to_string(path)
            .map_err(|e| ConfigError::LoadFailed(format!("{}: {}", path.display(), e)))?;
        let config: Config = serde_json::from_str(&config_data)
            .map_err(|e| ConfigError::LoadFailed(format!("{}: {}", path.display(), e)))?;
        Ok(config)
    }

    /// Environment values win over the saved ones, field by field
    fn resolve(
        saved: Option<Config>,
        url_override: Option<String>,
        token_override: Option<String>,
    ) -> Result<Self> {
        let non_empty = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
        let (saved_url, saved_token) = match saved {
            Some(c) => (Some(c.api_url), Some(c.api_token)),
            None => (None, None),
        };

        let api_token = non_empty(token_override)
            .or(non_empty(saved_token))
            .ok_or(ConfigError::TokenNotFound)?;
        let api_url = non_empty(url_override)
            .or(non_empty(saved_url))
            .ok_or_else(|| ConfigError::InvalidUrl("no API URL configured".to_string()))?;

        tracing::debug!(api_url = %api_url, token = %mask_token(&api_token), "configuration loaded");
        Ok(Config { api_url, api_token })
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::get_config_path().ok_or(ConfigError::NoDirectory("config"))?;
        self.save_to(&config_path)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::SaveFailed(e.to_string()))?;
        }
        let config_data = serde_json::to_string_pretty(self)?;
        fs::write(config_path, config_data).map_err(|e| ConfigError::SaveFailed(e.to_string()))?;
        tracing::info!(path = %config_path.display(), "configuration saved");
        Ok(())
    }

    /// Asks for the backend URL and token on stdin
    pub fn prompt() -> Result<Self> {
        let api_url = prompt_line("Please enter the timesheet API URL (e.g. https://timesheet.example.com/api):")?;
        println!("Note: your token will be stored in your system's config directory.");
        let api_token = prompt_line("Please enter your API token:")?;

        if api_token.is_empty() {
            return Err(ConfigError::InvalidToken.into());
        }
        Ok(Config::new(api_url, api_token))
    }
}

fn prompt_line(question: &str) -> Result<String> {
    println!("{}", question);
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().read_line(&mut answer)?;
    Ok(answer.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TimesheetError;
    use tempfile::TempDir;

    fn saved() -> Option<Config> {
        Some(Config::new(
            "https://saved.example.com".to_string(),
            "saved-token".to_string(),
        ))
    }

    #[test]
    fn test_environment_overrides_win() {
        let config = Config::resolve(
            saved(),
            Some("http://localhost:3000".to_string()),
            None,
        )
        .unwrap();
        assert_eq!(config.api_url, "http://localhost:3000");
        assert_eq!(config.api_token, "saved-token");

        let config = Config::resolve(saved(), Some("  ".to_string()), Some("env".to_string())).unwrap();
        assert_eq!(config.api_url, "https://saved.example.com");
        assert_eq!(config.api_token, "env");
    }

    #[test]
    fn test_missing_token_is_reported() {
        assert!(matches!(
            Config::resolve(None, Some("http://localhost".to_string()), None),
            Err(TimesheetError::Config(ConfigError::TokenNotFound))
        ));
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("timesheet").join("config.json");
        let config = Config::new("https://api.example.com".to_string(), "abc123".to_string());

        config.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_corrupt_file_fails_to_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "not json").unwrap();
        assert!(matches!(
            Config::load_from(&path),
            Err(TimesheetError::Config(ConfigError::LoadFailed(_)))
        ));
    }
}
