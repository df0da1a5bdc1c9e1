use serde::Deserialize;
use std::path::PathBuf;

/// Application configuration loaded from environment variables
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// JSON file holding the recent ratings of every user
    #[serde(default = "default_ratings_file")]
    pub ratings_file: PathBuf,

    /// Pre-trained model artifact
    #[serde(default = "default_model_path")]
    pub model_path: PathBuf,

    /// Remote model server; takes precedence over `model_path` when set
    #[serde(default)]
    pub model_url: Option<String>,

    /// Request timeout for the remote model server
    #[serde(default = "default_model_timeout_ms")]
    pub model_timeout_ms: u64,

    /// Joke catalog (`joke_id,joke_text` CSV)
    #[serde(default = "default_jokes_file")]
    pub jokes_file: PathBuf,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5017
}

fn default_ratings_file() -> PathBuf {
    PathBuf::from("user_ratings.json")
}

fn default_model_path() -> PathBuf {
    PathBuf::from("svd_model.json")
}

fn default_model_timeout_ms() -> u64 {
    5000
}

fn default_jokes_file() -> PathBuf {
    PathBuf::from("jokes.csv")
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        envy::from_env::<Config>().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))
    }

    /// Address the HTTP listener binds to
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
