use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::util::{env_value, is_local_endpoint_url};

pub const DEFAULT_API_URL: &str = "http://localhost:8080/completion";
pub const DEFAULT_MODEL: &str = "mixtral.gguf";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub api_key: Option<String>,
    pub model: String,
    pub api_url: String,
    /// Directory suggested shell commands run in.
    pub working_dir: PathBuf,
}

impl Config {
    pub fn load() -> Result<Self> {
        let api_url = env_value("AIM_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let api_key = env_value("AIM_API_KEY");
        let model = env_value("AIM_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let working_dir = match env_value("AIM_WORKING_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => std::env::current_dir().context("cannot resolve current directory")?,
        };

        Ok(Self {
            api_key,
            model,
            api_url,
            working_dir,
        })
    }

    pub fn validate(&self) -> Result<()> {
        if !self.api_url.starts_with("http://") && !self.api_url.starts_with("https://") {
            bail!(
                "Invalid AIM_API_URL '{}': expected http:// or https:// URL",
                self.api_url
            );
        }

        if !self.is_local_endpoint() && self.api_key.is_none() {
            bail!(
                "AIM_API_KEY must be set for non-local endpoints (url: '{}')",
                self.api_url
            );
        }

        if self.model.trim().is_empty() {
            bail!("AIM_MODEL must not be empty");
        }

        Ok(())
    }

    pub fn is_local_endpoint(&self) -> bool {
        is_local_endpoint_url(&self.api_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{ScopedEnv, ENV_LOCK};

    const VARS: [&str; 4] = ["AIM_API_URL", "AIM_API_KEY", "AIM_MODEL", "AIM_WORKING_DIR"];

    #[test]
    fn test_load_uses_defaults() {
        let _lock = ENV_LOCK.blocking_lock();
        let _env = ScopedEnv::unset(&VARS);

        let config = Config::load().expect("config loads");
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.model, DEFAULT_MODEL);
        assert!(config.api_key.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_blank_values_fall_back() {
        let _lock = ENV_LOCK.blocking_lock();
        let _env = ScopedEnv::set(&[
            ("AIM_API_KEY", "   "),
            ("AIM_MODEL", ""),
            ("AIM_WORKING_DIR", "/srv/aim"),
        ]);
        let config = Config::load().expect("config loads");
        assert!(config.api_key.is_none());
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.working_dir, PathBuf::from("/srv/aim"));
    }

    #[test]
    fn test_remote_endpoint_requires_key() {
        let _lock = ENV_LOCK.blocking_lock();
        let _env = ScopedEnv::unset(&VARS);
        let _url = ScopedEnv::set(&[("AIM_API_URL", "https://llm.example.com/completion")]);

        let config = Config::load().expect("config loads");
        let error = config.validate().expect_err("key required");
        assert!(error.to_string().contains("AIM_API_KEY"));

        let _key = ScopedEnv::set(&[("AIM_API_KEY", "sk-test")]);
        let config = Config::load().expect("config loads");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_non_http_url() {
        let config = Config {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            api_url: "ftp://localhost/completion".to_string(),
            working_dir: PathBuf::from("."),
        };
        assert!(config.validate().is_err());
    }
}
