use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub media: MediaConfig,
    #[serde(default)]
    pub spam: SpamConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_path")]
    pub path: String,
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            pool_size: default_pool_size(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
    /// Prefix for links rendered into responses, e.g. `https://example.com/api`.
    #[serde(default)]
    pub base_url: String,
    #[serde(default = "default_page_size")]
    pub default_page_size: usize,
    #[serde(default = "default_max_page_size")]
    pub max_page_size: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MediaConfig {
    #[serde(default = "default_upload_dir")]
    pub upload_dir: String,
    #[serde(default = "default_max_upload")]
    pub max_upload_size: String,
    #[serde(default = "default_allowed_types")]
    pub allowed_types: Vec<String>,
    #[serde(default = "default_max_title_length")]
    pub max_title_length: usize,
    #[serde(default = "default_max_description_length")]
    pub max_description_length: usize,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            upload_dir: default_upload_dir(),
            max_upload_size: default_max_upload(),
            allowed_types: default_allowed_types(),
            max_title_length: default_max_title_length(),
            max_description_length: default_max_description_length(),
        }
    }
}

impl MediaConfig {
    pub fn max_upload_bytes(&self) -> Result<usize> {
        parse_size(&self.max_upload_size)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SpamConfig {
    /// Submissions containing any of these phrases are rejected outright.
    #[serde(default)]
    pub blocked_phrases: Vec<String>,
    /// Submissions containing any of these phrases are held for moderation.
    #[serde(default)]
    pub moderated_phrases: Vec<String>,
    /// More links than this sends the item to moderation (0 = unlimited)
    #[serde(default = "default_max_links")]
    pub max_links: usize,
}

impl Default for SpamConfig {
    fn default() -> Self {
        Self {
            blocked_phrases: Vec::new(),
            moderated_phrases: Vec::new(),
            max_links: default_max_links(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_database_path() -> String {
    "data/gallery.db".to_string()
}

fn default_pool_size() -> u32 {
    10
}

fn default_page_size() -> usize {
    20
}

fn default_max_page_size() -> usize {
    100
}

fn default_upload_dir() -> String {
    "data/attachments".to_string()
}

fn default_max_upload() -> String {
    "10MB".to_string()
}

fn default_allowed_types() -> Vec<String> {
    [
        "image/jpeg",
        "image/png",
        "image/gif",
        "image/webp",
        "video/mp4",
        "video/webm",
        "audio/mpeg",
        "audio/ogg",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_max_title_length() -> usize {
    100
}

fn default_max_description_length() -> usize {
    10_000
}

fn default_max_links() -> usize {
    3
}

/// Parse a human size such as `"10MB"`, `"512 KB"` or `"1048576"` into bytes.
pub fn parse_size(raw: &str) -> Result<usize> {
    let trimmed = raw.trim();
    let split = trimmed
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(trimmed.len());
    let (number, unit) = trimmed.split_at(split);

    let number: usize = number
        .parse()
        .map_err(|_| anyhow::anyhow!("Invalid size '{}'", raw))?;

    let multiplier = match unit.trim().to_ascii_uppercase().as_str() {
        "" | "B" => 1,
        "KB" | "K" => 1024,
        "MB" | "M" => 1024 * 1024,
        "GB" | "G" => 1024 * 1024 * 1024,
        other => anyhow::bail!("Unknown size unit '{}' in '{}'", other, raw),
    };

    number
        .checked_mul(multiplier)
        .ok_or_else(|| anyhow::anyhow!("Size '{}' is too large", raw))
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            anyhow::anyhow!(
                "Could not read config file '{}': {}. Run `gallery` from the directory holding gallery.toml or pass --config.",
                path.display(),
                e
            )
        })?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.api.default_page_size == 0 {
            anyhow::bail!("api.default_page_size must be greater than 0");
        }
        if self.api.max_page_size < self.api.default_page_size {
            anyhow::bail!("api.max_page_size must be at least api.default_page_size");
        }
        if self.media.max_title_length == 0 {
            anyhow::bail!("media.max_title_length must be greater than 0");
        }
        if self.media.allowed_types.is_empty() {
            anyhow::bail!("media.allowed_types must list at least one MIME type");
        }
        if self.media.max_upload_bytes()? == 0 {
            anyhow::bail!("media.max_upload_size must be greater than 0");
        }
        if self.database.pool_size == 0 {
            anyhow::bail!("database.pool_size must be greater than 0");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sizes_with_units() {
        assert_eq!(parse_size("10MB").unwrap(), 10 * 1024 * 1024);
        assert_eq!(parse_size("512 KB").unwrap(), 512 * 1024);
        assert_eq!(parse_size("42").unwrap(), 42);
        assert_eq!(parse_size("1g").unwrap(), 1024 * 1024 * 1024);
    }

    #[test]
    fn rejects_unknown_units() {
        assert!(parse_size("10 parsecs").is_err());
        assert!(parse_size("MB").is_err());
    }

    #[test]
    fn empty_file_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.api.default_page_size, 20);
        assert_eq!(config.media.max_title_length, 100);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_inverted_page_sizes() {
        let mut config = Config::default();
        config.api.default_page_size = 50;
        config.api.max_page_size = 10;
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config: Config = toml::from_str(
            r#"
            [media]
            max_upload_size = "2MB"

            [spam]
            blocked_phrases = ["cheap pills"]
            "#,
        )
        .unwrap();
        assert_eq!(config.media.max_upload_bytes().unwrap(), 2 * 1024 * 1024);
        assert_eq!(config.media.max_title_length, 100);
        assert_eq!(config.spam.blocked_phrases, vec!["cheap pills".to_string()]);
        assert_eq!(config.spam.max_links, 3);
    }
}
