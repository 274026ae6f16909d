use crate::{
    error::CrawlerError,
    identity::{ProxyPoolConfig, SelectionPolicy},
};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub session: SessionConfig,
    pub proxy: Option<ProxyPoolConfig>,
    pub proxy_policy: SelectionPolicy,
    pub captcha: CaptchaConfig,
    pub portal: PortalConfig,
    /// Directory for saved pages; nothing is saved when unset.
    pub save_dir: Option<PathBuf>,
    pub user_agent: Option<String>,
}

impl Config {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, CrawlerError> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config = serde_json::from_str::<Config>(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), CrawlerError> {
        if self.session.max_captcha_retry == 0 {
            return Err(CrawlerError::Config(
                "session.max_captcha_retry must be at least 1".to_string(),
            ));
        }
        if let Some(ProxyPoolConfig::Generated { size: 0, .. }) = self.proxy {
            return Err(CrawlerError::Config(
                "proxy.size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub max_restarts: u32,
    pub max_captcha_retry: u32,
    pub request_timeout_secs: u64,
    pub session_timeout_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            max_restarts: 10,
            max_captcha_retry: 3,
            request_timeout_secs: 30,
            session_timeout_secs: 600,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CaptchaConfig {
    pub api_key: String,
    pub base_url: String,
    pub poll_interval_ms: u64,
    pub max_polls: u32,
}

impl Default for CaptchaConfig {
    fn default() -> Self {
        CaptchaConfig {
            api_key: String::new(),
            base_url: "https://api.anti-captcha.com".to_string(),
            poll_interval_ms: 2000,
            max_polls: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PortalConfig {
    pub base_url: String,
}

impl Default for PortalConfig {
    fn default() -> Self {
        PortalConfig {
            base_url: "https://tracking.example.com".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn missing_sections_fall_back_to_defaults() {
        let config = serde_json::from_str::<Config>(
            r#"{
                "session": {"max_restarts": 4},
                "proxy": {
                    "kind": "static",
                    "credentials": [{"domain": "isp.example.com:9989", "username": "u", "password": "p"}]
                },
                "proxy_policy": "random"
            }"#,
        )
        .unwrap();

        assert_eq!(config.session.max_restarts, 4);
        assert_eq!(config.session.max_captcha_retry, 3);
        assert_eq!(config.session.request_timeout_secs, 30);
        assert_eq!(config.proxy_policy, SelectionPolicy::Random);
        assert_eq!(config.captcha.base_url, "https://api.anti-captcha.com");
        assert_eq!(config.save_dir, None);
        assert!(matches!(config.proxy, Some(ProxyPoolConfig::Static { .. })));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_zero_captcha_budget() {
        let config =
            serde_json::from_str::<Config>(r#"{"session": {"max_captcha_retry": 0}}"#).unwrap();
        assert!(matches!(config.validate(), Err(CrawlerError::Config(_))));
    }
}
