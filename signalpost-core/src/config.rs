use crate::{ConfigError, EngagementConfig, PlatformCredentials};
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, info};

pub const CONFIG_PATH_ENV: &str = "SIGNALPOST_CONFIG";
pub const ACCESS_TOKEN_ENV: &str = "SIGNALPOST_ACCESS_TOKEN";
pub const PRIMARY_API_KEY_ENV: &str = "SIGNALPOST_PRIMARY_API_KEY";
pub const SECONDARY_API_KEY_ENV: &str = "SIGNALPOST_SECONDARY_API_KEY";
pub const DEFAULT_CONFIG_PATH: &str = "signalpost.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub engagement: EngagementConfig,
    pub account: AccountConfig,
    #[serde(default)]
    pub platform: PlatformConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub market: MarketConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub content: ContentConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccountConfig {
    pub id: String,
    pub platform_user_id: String,
    #[serde(default)]
    pub access_token: Option<String>,
}

impl AccountConfig {
    pub fn credentials(&self) -> Option<PlatformCredentials> {
        self.access_token
            .as_ref()
            .filter(|token| !token.is_empty())
            .map(|token| PlatformCredentials {
                user_id: self.platform_user_id.clone(),
                access_token: token.clone(),
            })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PlatformConfig {
    pub api_base: String,
    pub user_agent: String,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.twitter.com".to_string(),
            user_agent: concat!("signalpost/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    pub base_url: String,
    pub model: String,
    #[serde(default)]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenerationConfig {
    pub primary: Option<ProviderConfig>,
    pub secondary: Option<ProviderConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MarketConfig {
    pub base_url: String,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.coingecko.com/api/v3".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub database_url: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://signalpost.db?mode=rwc".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ContentConfig {
    pub proactive_topics: Vec<String>,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            proactive_topics: [
                "Bitcoin",
                "Ethereum",
                "DeFi",
                "market trends",
                "Web3",
                "blockchain technology",
            ]
            .iter()
            .map(|topic| topic.to_string())
            .collect(),
        }
    }
}

impl AppConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
            path: path.display().to_string(),
        })?;
        info!("Loading configuration from {}", path.display());
        let mut config = Self::from_toml(&raw)?;
        config.apply_env_overrides(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        let mut config: AppConfig = toml::from_str(raw)?;
        config.engagement = config.engagement.normalized();
        Ok(config)
    }

    /// Secrets may be kept out of the file; non-empty variables win over file values.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |name: &str| lookup(name).filter(|value| !value.is_empty());

        if let Some(token) = lookup(ACCESS_TOKEN_ENV) {
            debug!("Using access token from {}", ACCESS_TOKEN_ENV);
            self.account.access_token = Some(token);
        }
        if let (Some(key), Some(primary)) = (lookup(PRIMARY_API_KEY_ENV), &mut self.generation.primary)
        {
            primary.api_key = Some(key);
        }
        if let (Some(key), Some(secondary)) =
            (lookup(SECONDARY_API_KEY_ENV), &mut self.generation.secondary)
        {
            secondary.api_key = Some(key);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.account.id.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "account.id".to_string(),
            });
        }
        if self.engagement.check_interval_minutes == 0 {
            return Err(ConfigError::InvalidValue {
                field: "engagement.check_interval_minutes".to_string(),
                value: "0".to_string(),
            });
        }
        if self.engagement.max_actions_per_hour == 0 {
            return Err(ConfigError::InvalidValue {
                field: "engagement.max_actions_per_hour".to_string(),
                value: "0".to_string(),
            });
        }
        if self.content.proactive_topics.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "content.proactive_topics".to_string(),
                value: "[]".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        [account]
        id = "acct-1"
        platform_user_id = "12345"
    "#;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = AppConfig::from_toml(MINIMAL).unwrap();
        assert_eq!(config.engagement, EngagementConfig::default());
        assert!(config.generation.primary.is_none());
        assert!(config.account.credentials().is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_full_engagement_section() {
        let raw = r#"
            [engagement]
            enabled = false
            check_interval_minutes = 5
            max_actions_per_hour = 3
            auto_reply_to_mentions = false
            engagement_threshold = 50
            keywords = ["Alpha", "alpha", "Beta"]

            [account]
            id = "acct-1"
            platform_user_id = "12345"
            access_token = "tok"

            [generation.primary]
            base_url = "https://inference.example.com"
            model = "gpt2"
        "#;
        let config = AppConfig::from_toml(raw).unwrap();
        assert!(!config.engagement.enabled);
        assert_eq!(config.engagement.check_interval_minutes, 5);
        assert_eq!(config.engagement.max_actions_per_hour, 3);
        assert!(!config.engagement.auto_reply_to_mentions);
        assert!(config.engagement.auto_engage_with_timeline);
        assert_eq!(config.engagement.keywords, vec!["alpha", "beta"]);
        assert_eq!(config.account.credentials().unwrap().access_token, "tok");
        assert_eq!(config.generation.primary.unwrap().model, "gpt2");
    }

    #[test]
    fn test_env_overrides() {
        let raw = r#"
            [account]
            id = "acct-1"
            platform_user_id = "12345"

            [generation.secondary]
            base_url = "https://llm.example.com/v1"
            model = "small"
        "#;
        let mut config = AppConfig::from_toml(raw).unwrap();
        config.apply_env_overrides(|name| match name {
            ACCESS_TOKEN_ENV => Some("env-token".to_string()),
            SECONDARY_API_KEY_ENV => Some("sk-env".to_string()),
            PRIMARY_API_KEY_ENV => Some("ignored".to_string()),
            _ => None,
        });
        assert_eq!(config.account.access_token.as_deref(), Some("env-token"));
        assert_eq!(
            config.generation.secondary.unwrap().api_key.as_deref(),
            Some("sk-env")
        );
        assert!(config.generation.primary.is_none());
    }

    #[test]
    fn test_validation_rejects_zero_cap() {
        let mut config = AppConfig::from_toml(MINIMAL).unwrap();
        config.engagement.max_actions_per_hour = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { field, .. }) if field == "engagement.max_actions_per_hour"
        ));
    }

    #[test]
    fn test_parse_error_and_missing_file() {
        assert!(matches!(
            AppConfig::from_toml("account = ["),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            AppConfig::load("/definitely/not/here.toml"),
            Err(ConfigError::FileNotFound { .. })
        ));
    }
}
