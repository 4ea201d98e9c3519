use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Clone, Deserialize, Debug)]
pub struct AppConfig {
    pub openai_api_key: String,
    #[serde(default = "default_base_url")]
    pub openai_base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
    #[serde(default = "default_embedding_dimensions")]
    pub embedding_dimensions: u32,
    #[serde(default = "default_persist_dir")]
    pub persist_dir: String,
    #[serde(default = "default_db_file")]
    pub db_file: String,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_http_port")]
    pub http_port: u16,
}

impl AppConfig {
    /// Filesystem location of the persisted vector store.
    pub fn store_path(&self) -> std::path::PathBuf {
        std::path::Path::new(&self.persist_dir).join(&self.db_file)
    }
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4.1-mini".to_string()
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_embedding_dimensions() -> u32 {
    1536
}

fn default_persist_dir() -> String {
    "./persist".to_string()
}

fn default_db_file() -> String {
    "policies.db".to_string()
}

fn default_data_dir() -> String {
    "./policies".to_string()
}

fn default_http_port() -> u16 {
    8000
}

pub fn get_config() -> Result<AppConfig, ConfigError> {
    let config = Config::builder()
        .add_source(File::with_name("config").required(false))
        .add_source(Environment::default())
        .build()?;

    config.try_deserialize()
}
