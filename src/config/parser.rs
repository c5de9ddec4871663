use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Loads and parses a configuration file from the given path
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use marksync::config::load_config;
///
/// let config = load_config(Path::new("marksync.toml")).unwrap();
/// println!("Fetch timeout: {}s", config.crawler.request_timeout_secs);
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parses and validates configuration text
pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(content)?;
    validate(&config)?;
    Ok(config)
}

/// Hex-encoded SHA-256 of the configuration text
///
/// Logged at startup so that a run can be matched to the configuration it
/// used.
fn hash_content(content: &str) -> String {
    hex::encode(Sha256::digest(content.as_bytes()))
}

/// Loads a configuration and returns both the config and its hash
///
/// The file is read once, so the hash always describes the text that was
/// parsed.
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config = parse_config(&content)?;
    Ok((config, hash_content(&content)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ConfigError;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const VALID_CONFIG: &str = r#"
[crawler]
request-timeout-secs = 10
max-concurrent-fetches = 8

[user-agent]
crawler-name = "Marksync"
crawler-version = "0.1"
contact-url = "https://example.com/about"
contact-email = "admin@example.com"

[storage]
database-path = "./marksync.db"

[body-store]
root = "./bodies"
bucket = "response-bodies"

[bus]
database-path = "./bus.db"
topic = "crawls"
"#;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_load_valid_config() {
        let file = create_temp_config(VALID_CONFIG);
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.crawler.request_timeout_secs, 10);
        assert_eq!(config.crawler.max_concurrent_fetches, 8);
        assert_eq!(config.crawler.poll_interval_ms, 1000);
        assert_eq!(config.user_agent.crawler_name, "Marksync");
        assert_eq!(config.body_store.bucket, "response-bodies");
        assert_eq!(config.bus.topic, "crawls");
        assert_eq!(config.bus.lease_secs, 300);
    }

    #[test]
    fn test_crawler_section_defaults() {
        let content = VALID_CONFIG.replace(
            "[crawler]\nrequest-timeout-secs = 10\nmax-concurrent-fetches = 8\n",
            "",
        );
        let file = create_temp_config(&content);
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.crawler.request_timeout_secs, 30);
        assert_eq!(config.crawler.max_concurrent_fetches, 4);
        assert_eq!(config.crawler.max_body_bytes, 50 * 1024 * 1024);
    }

    #[test]
    fn test_max_body_bytes_override() {
        let content = VALID_CONFIG.replace(
            "max-concurrent-fetches = 8\n",
            "max-concurrent-fetches = 8\nmax-body-bytes = 4096\n",
        );
        let config = parse_config(&content).unwrap();
        assert_eq!(config.crawler.max_body_bytes, 4096);
    }

    #[test]
    fn test_load_config_with_invalid_path() {
        let result = load_config(Path::new("/nonexistent/config.toml"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_load_config_with_invalid_toml() {
        let file = create_temp_config("this is not valid TOML {{{");
        let result = load_config(file.path());
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_config_with_validation_error() {
        let content = VALID_CONFIG.replace("max-concurrent-fetches = 8", "max-concurrent-fetches = 0");
        let file = create_temp_config(&content);
        let result = load_config(file.path());
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_bucket_with_separator_rejected() {
        let content = VALID_CONFIG.replace("response-bodies", "../bodies");
        let file = create_temp_config(&content);
        assert!(load_config(file.path()).is_err());
    }

    #[test]
    fn test_load_config_with_hash() {
        let file = create_temp_config(VALID_CONFIG);
        let (config, hash) = load_config_with_hash(file.path()).unwrap();

        assert_eq!(config.storage.database_path, "./marksync.db");
        assert_eq!(hash, hash_content(VALID_CONFIG));
        // SHA-256 produces 64 hex characters
        assert_eq!(hash.len(), 64);
    }

    #[test]
    fn test_different_content_different_hash() {
        assert_ne!(hash_content("content 1"), hash_content("content 2"));
    }
}
