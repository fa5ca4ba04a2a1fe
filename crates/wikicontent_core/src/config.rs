use std::env;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use crate::model::ModelTag;

pub const DEFAULT_CONTENT_LANGUAGE: &str = "en";
pub const DEFAULT_MAX_REDIRECTS: usize = 1;
pub const DEFAULT_PARSER_CACHE_EXPIRE_SECS: u64 = 86_400;

/// Policy deciding which pages count as articles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ArticleCountMethod {
    Any,
    Comma,
    #[default]
    Link,
}

impl ArticleCountMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Any => "any",
            Self::Comma => "comma",
            Self::Link => "link",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "any" => Ok(Self::Any),
            "comma" => Ok(Self::Comma),
            "link" => Ok(Self::Link),
            other => bail!("unknown article count method: {other}"),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct ConfigFile {
    #[serde(default)]
    pub content: ContentConfig,
}

/// Settings injected into the content services at construction.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct ContentConfig {
    pub article_count_method: ArticleCountMethod,
    pub content_language: String,
    pub max_redirects: usize,
    pub text_models_to_parse: Vec<ModelTag>,
    pub parser_cache_expire_secs: u64,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            article_count_method: ArticleCountMethod::default(),
            content_language: DEFAULT_CONTENT_LANGUAGE.to_string(),
            max_redirects: DEFAULT_MAX_REDIRECTS,
            text_models_to_parse: vec![
                ModelTag::wikitext(),
                ModelTag::javascript(),
                ModelTag::css(),
            ],
            parser_cache_expire_secs: DEFAULT_PARSER_CACHE_EXPIRE_SECS,
        }
    }
}

impl ContentConfig {
    pub fn with_count_method(mut self, method: ArticleCountMethod) -> Self {
        self.article_count_method = method;
        self
    }

    /// Applies `WIKICONTENT_ARTICLE_COUNT_METHOD` and `WIKICONTENT_LANGUAGE`.
    pub fn apply_env_overrides(mut self) -> Result<Self> {
        if let Some(value) = non_empty_env("WIKICONTENT_ARTICLE_COUNT_METHOD") {
            self.article_count_method = ArticleCountMethod::parse(&value)
                .context("invalid WIKICONTENT_ARTICLE_COUNT_METHOD")?;
        }
        if let Some(value) = non_empty_env("WIKICONTENT_LANGUAGE") {
            self.content_language = value;
        }
        Ok(self)
    }

    pub fn parses_text_model(&self, model: &ModelTag) -> bool {
        self.text_models_to_parse.contains(model)
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Load a `[content]` table from a TOML file. Returns defaults if the file doesn't exist.
pub fn load_config(config_path: &Path) -> Result<ContentConfig> {
    if !config_path.exists() {
        return Ok(ContentConfig::default());
    }
    let content = fs::read_to_string(config_path)
        .with_context(|| format!("failed to read {}", config_path.display()))?;
    let parsed: ConfigFile = toml::from_str(&content)
        .with_context(|| format!("failed to parse {}", config_path.display()))?;
    if parsed.content.content_language.trim().is_empty() {
        bail!(
            "content_language cannot be empty in {}",
            config_path.display()
        );
    }
    Ok(parsed.content)
}
