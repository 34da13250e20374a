use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Runtime configuration.
///
/// Sources, later ones winning:
/// - built-in defaults
/// - `config.toml` in the working directory (optional)
/// - `OPENGMAO_*` environment variables, `__` separating sections
///   (e.g. `OPENGMAO_LLM__API_KEY`)
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub basic: BasicConfig,
    pub llm: LlmConfig,
    pub limits: LimitsConfig,
    pub cache: CacheConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BasicConfig {
    pub listen_addr: String,
    pub database_url: String,
    pub gmao_key: String,
    pub loglevel: String,
}

impl Default for BasicConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8000".to_string(),
            database_url: "sqlite://data/opengmao.sqlite".to_string(),
            gmao_key: "opengmao".to_string(),
            loglevel: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LlmConfig {
    pub base_url: Url,
    pub api_key: String,
    pub chat_model: String,
    pub extraction_model: String,
    pub transcription_model: String,
    pub proxy: Option<Url>,
    pub timeout_secs: u64,
    pub max_retries: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: Url::parse("https://generativelanguage.googleapis.com/")
                .expect("static default url"),
            api_key: String::new(),
            chat_model: "gemini-2.5-flash".to_string(),
            extraction_model: "gemini-2.5-pro".to_string(),
            transcription_model: "gemini-2.5-flash".to_string(),
            proxy: None,
            timeout_secs: 120,
            max_retries: 3,
        }
    }
}

impl LlmConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub max_upload_bytes: usize,
    pub max_audio_bytes: usize,
    pub max_json_bytes: usize,
    pub max_dependency_text_chars: usize,
    pub ai_requests_per_minute: u32,
    pub chat_history_messages: u32,
    pub retrieval_top_k: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_upload_bytes: 20 * 1024 * 1024,
            max_audio_bytes: 10 * 1024 * 1024,
            max_json_bytes: 1024 * 1024,
            max_dependency_text_chars: 4000,
            ai_requests_per_minute: 30,
            chat_history_messages: 10,
            retrieval_top_k: 4,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    pub answer_ttl_secs: u64,
    pub metadata_ttl_secs: u64,
    pub suggestion_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            answer_ttl_secs: 300,
            metadata_ttl_secs: 86_400,
            suggestion_ttl_secs: 600,
        }
    }
}

impl CacheConfig {
    pub fn answer_ttl(&self) -> Duration {
        Duration::from_secs(self.answer_ttl_secs)
    }

    pub fn metadata_ttl(&self) -> Duration {
        Duration::from_secs(self.metadata_ttl_secs)
    }

    pub fn suggestion_ttl(&self) -> Duration {
        Duration::from_secs(self.suggestion_ttl_secs)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    pub upload_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from("data/uploads"),
        }
    }
}

impl Config {
    pub fn figment() -> Figment {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file("config.toml"))
            .merge(Env::prefixed("OPENGMAO_").split("__"))
    }

    pub fn load() -> Result<Self, figment::Error> {
        Self::figment().extract()
    }
}
