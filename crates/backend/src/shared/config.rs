use contracts::enums::SyncMode;
use contracts::usecases::u601_sync_catalog::{SentosCredentials, ShopifyCredentials};
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub shopify: ShopifyConfig,
    pub sentos: SentosConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ShopifyConfig {
    #[serde(default)]
    pub store_url: String,
    #[serde(default)]
    pub access_token: String,
    /// Vendor для создаваемых товаров
    #[serde(default)]
    pub vendor: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct SentosConfig {
    #[serde(default)]
    pub api_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub api_secret: String,
    #[serde(default)]
    pub cookie: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SyncConfig {
    #[serde(default)]
    pub mode: SyncMode,
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_batch_pause_ms")]
    pub batch_pause_ms: u64,
    #[serde(default = "default_product_timeout_secs")]
    pub product_timeout_secs: u64,
    #[serde(default)]
    pub test_mode: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            mode: SyncMode::default(),
            max_workers: default_max_workers(),
            batch_size: default_batch_size(),
            batch_pause_ms: default_batch_pause_ms(),
            product_timeout_secs: default_product_timeout_secs(),
            test_mode: false,
        }
    }
}

impl SyncConfig {
    pub fn batch_pause(&self) -> Duration {
        Duration::from_millis(self.batch_pause_ms)
    }

    pub fn product_timeout(&self) -> Duration {
        Duration::from_secs(self.product_timeout_secs.max(1))
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct LoggingConfig {
    /// Писать сырые запросы/ответы API в отдельные файлы
    #[serde(default)]
    pub request_log: bool,
}

fn default_max_workers() -> usize {
    2
}

fn default_batch_size() -> usize {
    10
}

fn default_batch_pause_ms() -> u64 {
    1000
}

fn default_product_timeout_secs() -> u64 {
    60
}

/// Default configuration embedded in the binary
const DEFAULT_CONFIG: &str = r#"
[shopify]
store_url = ""
access_token = ""

[sentos]
api_url = ""
api_key = ""
api_secret = ""

[sync]
mode = "full"
max_workers = 2
batch_size = 10
batch_pause_ms = 1000
product_timeout_secs = 60
test_mode = false

[logging]
request_log = false
"#;

/// Load configuration from config.toml file
///
/// Search order:
/// 1. Explicit path (from CLI)
/// 2. Next to the executable (for production)
/// 3. Falls back to embedded default config
///
/// Credentials from the environment override the file.
pub fn load_config(explicit_path: Option<&std::path::Path>) -> anyhow::Result<Config> {
    let mut config = read_config_file(explicit_path)?;
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    Ok(config)
}

fn read_config_file(explicit_path: Option<&std::path::Path>) -> anyhow::Result<Config> {
    if let Some(path) = explicit_path {
        tracing::info!("Loading config from: {}", path.display());
        let contents = std::fs::read_to_string(path)?;
        return Ok(toml::from_str(&contents)?);
    }

    // Try to find config.toml next to the executable
    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            let config_path = exe_dir.join("config.toml");

            if config_path.exists() {
                tracing::info!("Loading config from: {}", config_path.display());
                let contents = std::fs::read_to_string(&config_path)?;
                let config: Config = toml::from_str(&contents)?;
                return Ok(config);
            } else {
                tracing::warn!("config.toml not found at: {}", config_path.display());
            }
        }
    }

    // Fall back to default config
    tracing::info!("Using default embedded configuration");
    let config: Config = toml::from_str(DEFAULT_CONFIG)?;
    Ok(config)
}

/// Подставить секреты из переменных окружения
fn apply_env_overrides(config: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(token) = non_empty("SHOPIFY_ACCESS_TOKEN") {
        config.shopify.access_token = token;
    }
    if let Some(key) = non_empty("SENTOS_API_KEY") {
        config.sentos.api_key = key;
    }
    if let Some(secret) = non_empty("SENTOS_API_SECRET") {
        config.sentos.api_secret = secret;
    }
    if let Some(cookie) = non_empty("SENTOS_COOKIE") {
        config.sentos.cookie = Some(cookie);
    }
}

impl Config {
    pub fn shopify_credentials(&self) -> ShopifyCredentials {
        ShopifyCredentials {
            store_url: self.shopify.store_url.clone(),
            access_token: self.shopify.access_token.clone(),
        }
    }

    pub fn sentos_credentials(&self) -> SentosCredentials {
        SentosCredentials {
            api_url: self.sentos.api_url.clone(),
            api_key: self.sentos.api_key.clone(),
            api_secret: self.sentos.api_secret.clone(),
            cookie: self.sentos.cookie.clone().filter(|c| !c.trim().is_empty()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use maplit::hashmap;

    #[test]
    fn test_default_config_loads() {
        let config: Result<Config, _> = toml::from_str(DEFAULT_CONFIG);
        assert!(config.is_ok());
        let config = config.unwrap();
        assert_eq!(config.sync.mode, SyncMode::Full);
        assert_eq!(config.sync.max_workers, 2);
        assert_eq!(config.sync.product_timeout(), Duration::from_secs(60));
        assert!(!config.logging.request_log);
    }

    #[test]
    fn test_sync_section_is_optional() {
        let config: Config = toml::from_str(
            r#"
            [shopify]
            store_url = "demo.myshopify.com"
            access_token = "shpat_x"

            [sentos]
            api_url = "https://demo.sentos.com.tr/api"
            api_key = "k"
            api_secret = "s"
            "#,
        )
        .unwrap();
        assert_eq!(config.sync.batch_size, 10);
        assert_eq!(config.sync.batch_pause(), Duration::from_secs(1));
        assert!(config.sentos_credentials().cookie.is_none());
    }

    #[test]
    fn test_mode_parses_snake_case() {
        let config: Config = toml::from_str(
            r#"
            [shopify]
            [sentos]
            [sync]
            mode = "images_with_alt_text"
            "#,
        )
        .unwrap();
        assert_eq!(config.sync.mode, SyncMode::ImagesWithAltText);
    }

    #[test]
    fn test_env_overrides_credentials() {
        let mut config: Config = toml::from_str(DEFAULT_CONFIG).unwrap();
        let env = hashmap! {
            "SHOPIFY_ACCESS_TOKEN" => "shpat_env".to_string(),
            "SENTOS_COOKIE" => "PHPSESSID=abc".to_string(),
            "SENTOS_API_KEY" => "   ".to_string(),
        };
        apply_env_overrides(&mut config, |key| env.get(key).cloned());

        assert_eq!(config.shopify.access_token, "shpat_env");
        assert_eq!(config.sentos.cookie.as_deref(), Some("PHPSESSID=abc"));
        assert_eq!(config.sentos.api_key, "");
    }
}
