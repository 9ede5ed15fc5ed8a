// src/settings.rs

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use clap::Parser;
use config::{builder::DefaultState, ConfigBuilder, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

use crate::search::SearchMode;

/// Legacy variable naming the Elasticsearch base URL.
const ELASTIC_URL_VAR: &str = "ELASTIC_URL";
/// Legacy variable holding the OpenAI API key.
const OPENAI_API_KEY_VAR: &str = "OPENAI_API_KEY";
const ENV_PREFIX: &str = "NUTRICHAT";

#[derive(Parser, Debug)]
#[command(version, about = "Answer nutrition questions from the nutrition-facts index")]
pub struct Args {
    /// Path to an optional configuration TOML file.
    #[arg(short, long, value_name = "CONFIG_PATH")]
    pub config: Option<PathBuf>,

    /// Food category to restrict retrieval to, e.g. "Fruits".
    #[arg(long)]
    pub category: String,

    /// Provider-qualified model identifier used to answer.
    #[arg(long, default_value = "openai/gpt-4o-mini")]
    pub model: String,

    /// Retrieval strategy: `text` (keyword) or `vector` (kNN).
    #[arg(long, default_value = "text")]
    pub search: SearchMode,

    /// The question to answer.
    pub question: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SearchSettings {
    pub url: String,
    pub index: String,
    pub vector_field: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OpenAiSettings {
    pub url: String,
    pub api_key: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OllamaSettings {
    pub url: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EncoderSettings {
    pub model_dir: PathBuf,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Settings {
    pub search: SearchSettings,
    pub openai: OpenAiSettings,
    pub ollama: OllamaSettings,
    pub encoder: EncoderSettings,
    pub judge_model: String,
    pub log_level: String,
}

impl Settings {
    /// Loads settings from defaults, an optional TOML file and the environment.
    ///
    /// `ELASTIC_URL` and `OPENAI_API_KEY` take precedence over every other source.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with(path, std::env::vars().collect())
    }

    fn load_with(path: Option<&Path>, vars: HashMap<String, String>) -> Result<Self, ConfigError> {
        let elastic_url = vars.get(ELASTIC_URL_VAR).cloned();
        let openai_api_key = vars.get(OPENAI_API_KEY_VAR).cloned();

        let mut builder = ConfigBuilder::<DefaultState>::default()
            .set_default("search.url", "http://elasticsearch:9200")?
            .set_default("search.index", crate::search::DEFAULT_INDEX)?
            .set_default("search.vector_field", crate::search::DEFAULT_VECTOR_FIELD)?
            .set_default("openai.url", "https://api.openai.com/v1")?
            .set_default("openai.api_key", "your-api-key-here")?
            .set_default("ollama.url", "http://127.0.0.1:11434")?
            .set_default("encoder.model_dir", "./models/multi-qa-MiniLM-L6-cos-v1")?
            .set_default("judge_model", crate::evaluation::DEFAULT_JUDGE_MODEL)?
            .set_default("log_level", "info")?;

        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }

        let cfg = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .source(Some(vars)),
            )
            .set_override_option("search.url", elastic_url)?
            .set_override_option("openai.api_key", openai_api_key)?
            .build()?;

        cfg.try_deserialize()
    }
}
