use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Result, TirageError};
use crate::types::GameKind;

/// Top-level configuration for the Tirage service.
///
/// Loaded from `~/.tirage/config.toml` by default. Each section corresponds
/// to one component of the chat core or the surrounding service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TirageConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub breaker: BreakerConfig,
    #[serde(default)]
    pub sql: SqlConfig,
    #[serde(default)]
    pub game: GameConfig,
}

impl TirageConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: TirageConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| TirageError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Apply `TIRAGE_*` environment overrides on top of the file values.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary lookup (the environment in production).
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup("TIRAGE_API_KEY") {
            let key = key.trim().to_string();
            self.llm.api_key = (!key.is_empty()).then_some(key);
        }
        if let Some(v) = lookup("TIRAGE_SQL_MAX_ATTEMPTS") {
            match v.parse() {
                Ok(n) => self.sql.max_attempts_per_session = n,
                Err(_) => warn!(value = %v, "Ignoring invalid TIRAGE_SQL_MAX_ATTEMPTS"),
            }
        }
        if let Some(v) = lookup("TIRAGE_BREAKER_THRESHOLD") {
            match v.parse::<u32>() {
                Ok(n) if n > 0 => self.breaker.failure_threshold = n,
                _ => warn!(value = %v, "Ignoring invalid TIRAGE_BREAKER_THRESHOLD"),
            }
        }
        if let Some(v) = lookup("TIRAGE_BREAKER_TIMEOUT_SECS") {
            match v.parse() {
                Ok(n) => self.breaker.open_timeout_secs = n,
                Err(_) => warn!(value = %v, "Ignoring invalid TIRAGE_BREAKER_TIMEOUT_SECS"),
            }
        }
    }
}

/// General service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Data directory holding the draw-history database.
    pub data_dir: String,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
    /// HTTP port (bound on 127.0.0.1).
    pub port: u16,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: "~/.tirage/data".to_string(),
            log_level: "info".to_string(),
            port: 3040,
        }
    }
}

/// Conversation handling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Language used when the request names an unknown one.
    pub default_language: String,
    /// Directory holding `<language>.txt` system prompts. Empty = none.
    pub system_prompt_dir: String,
    /// Maximum accepted message length in characters.
    pub max_message_length: usize,
    /// Append a sponsor line every N assistant turns (0 disables).
    pub sponsor_every: usize,
    /// History turns forwarded to the model.
    pub history_turns: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            default_language: "fr".to_string(),
            system_prompt_dir: String::new(),
            max_message_length: 2000,
            sponsor_every: 0,
            history_turns: 10,
        }
    }
}

/// External generative service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// OpenAI-compatible chat completions endpoint.
    pub endpoint: String,
    pub model: String,
    /// Service credential. `None` disables the external path entirely.
    pub api_key: Option<String>,
    pub temperature: f32,
    pub max_output_tokens: u32,
    /// Timeout for the main generation call.
    pub generation_timeout_secs: u64,
    /// Timeout for the query-translation call.
    pub translation_timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key: None,
            temperature: 0.7,
            max_output_tokens: 800,
            generation_timeout_secs: 20,
            translation_timeout_secs: 8,
        }
    }
}

/// Failure-detecting call guard settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerConfig {
    /// Consecutive failures before the breaker opens.
    pub failure_threshold: u32,
    /// Seconds the breaker stays open before allowing a trial call.
    pub open_timeout_secs: u64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            open_timeout_secs: 60,
        }
    }
}

/// Dynamic query settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SqlConfig {
    /// Whether the dynamic query path is attempted at all.
    pub enabled: bool,
    /// Dynamic query attempts allowed per chat session.
    pub max_attempts_per_session: u32,
    /// LIMIT appended to generated queries that have none.
    pub default_row_limit: u32,
    /// Rows formatted into the model context.
    pub max_context_rows: usize,
    /// Idle minutes after which a session's attempt count is forgotten.
    pub session_timeout_minutes: u32,
}

impl Default for SqlConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts_per_session: 10,
            default_row_limit: 50,
            max_context_rows: 20,
            session_timeout_minutes: 30,
        }
    }
}

/// Game selection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub kind: GameKind,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn create_temp_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_default_values() {
        let config = TirageConfig::default();
        assert_eq!(config.general.port, 3040);
        assert_eq!(config.chat.default_language, "fr");
        assert!(config.llm.api_key.is_none());
        assert_eq!(config.llm.generation_timeout_secs, 20);
        assert_eq!(config.llm.translation_timeout_secs, 8);
        assert_eq!(config.breaker.failure_threshold, 3);
        assert_eq!(config.breaker.open_timeout_secs, 60);
        assert_eq!(config.sql.default_row_limit, 50);
        assert_eq!(config.sql.max_context_rows, 20);
        assert_eq!(config.game.kind, GameKind::Loto);
    }

    #[test]
    fn test_load_partial_config_uses_defaults() {
        let content = r#"
[breaker]
failure_threshold = 5

[game]
kind = "euromillions"
"#;
        let file = create_temp_config(content);
        let config = TirageConfig::load(file.path()).unwrap();
        assert_eq!(config.breaker.failure_threshold, 5);
        assert_eq!(config.breaker.open_timeout_secs, 60);
        assert_eq!(config.game.kind, GameKind::Euromillions);
        assert_eq!(config.sql.default_row_limit, 50);
    }

    #[test]
    fn test_load_invalid_toml() {
        let file = create_temp_config("this is {{ not valid TOML");
        assert!(TirageConfig::load(file.path()).is_err());
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = TirageConfig::load_or_default(Path::new("/does/not/exist/config.toml"));
        assert_eq!(config.general.data_dir, "~/.tirage/data");
    }

    #[test]
    fn test_save_creates_parent_dirs_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sub").join("config.toml");

        let mut config = TirageConfig::default();
        config.sql.max_attempts_per_session = 4;
        config.save(&path).unwrap();

        let reloaded = TirageConfig::load(&path).unwrap();
        assert_eq!(reloaded.sql.max_attempts_per_session, 4);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("TIRAGE_API_KEY", "sk-test"),
            ("TIRAGE_SQL_MAX_ATTEMPTS", "2"),
            ("TIRAGE_BREAKER_THRESHOLD", "7"),
            ("TIRAGE_BREAKER_TIMEOUT_SECS", "15"),
        ]
        .into_iter()
        .collect();

        let mut config = TirageConfig::default();
        config.apply_overrides(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.llm.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.sql.max_attempts_per_session, 2);
        assert_eq!(config.breaker.failure_threshold, 7);
        assert_eq!(config.breaker.open_timeout_secs, 15);
    }

    #[test]
    fn test_env_overrides_ignore_garbage() {
        let mut config = TirageConfig::default();
        config.apply_overrides(|k| match k {
            "TIRAGE_BREAKER_THRESHOLD" => Some("zero".to_string()),
            "TIRAGE_API_KEY" => Some("   ".to_string()),
            _ => None,
        });
        assert_eq!(config.breaker.failure_threshold, 3);
        assert!(config.llm.api_key.is_none());
    }
}
