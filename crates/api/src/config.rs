use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use hakach_agents::DEFAULT_PROVIDER_BASE_URL;
use hakach_core::{Language, LanguageSet, WidgetConfig};
use hakach_knowledge::KnowledgeSource;
use hakach_llm::GeminiConfig;

const DEFAULT_KB_PATH: &str = "data/knowledge_base.json";
const DEFAULT_LANGUAGES: &str = "fr,en,es,de,ar";

/// Server settings, read once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind: String,
    pub database_url: Option<String>,
    pub knowledge: KnowledgeSource,
    pub gemini: GeminiConfig,
    pub provider_base_url: String,
    pub languages: LanguageSet,
    pub keywords_path: Option<PathBuf>,
    pub countries_path: Option<PathBuf>,
    pub session_ttl: Duration,
    pub chat_rate_limit_max: usize,
    pub chat_rate_limit_window: Duration,
    pub widget_title: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".to_string(),
            database_url: None,
            knowledge: KnowledgeSource::File(PathBuf::from(DEFAULT_KB_PATH)),
            gemini: GeminiConfig::default(),
            provider_base_url: DEFAULT_PROVIDER_BASE_URL.to_string(),
            languages: LanguageSet::parse_list(DEFAULT_LANGUAGES, Language::Fr),
            keywords_path: None,
            countries_path: None,
            session_ttl: Duration::from_secs(60 * 60 * 24),
            chat_rate_limit_max: 30,
            chat_rate_limit_window: Duration::from_secs(60),
            widget_title: None,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let default_language = env_string("HAKACH_DEFAULT_LANGUAGE")
            .and_then(|code| Language::from_code(&code))
            .unwrap_or(Language::Fr);
        let languages = LanguageSet::parse_list(
            &env_string("HAKACH_LANGUAGES").unwrap_or_else(|| DEFAULT_LANGUAGES.to_string()),
            default_language,
        );

        // a remote knowledge base wins over a local one
        let knowledge = env_string("HAKACH_KB_URL")
            .or_else(|| env_string("HAKACH_KB_PATH"))
            .map(|location| KnowledgeSource::from_location(&location))
            .unwrap_or(defaults.knowledge);

        Self {
            bind: env_string("HAKACH_BIND").unwrap_or(defaults.bind),
            database_url: env_string("HAKACH_DATABASE_URL"),
            knowledge,
            gemini: GeminiConfig::from_env(),
            provider_base_url: env_string("HAKACH_PROVIDER_BASE_URL")
                .unwrap_or(defaults.provider_base_url),
            languages,
            keywords_path: env_string("HAKACH_KEYWORDS_PATH").map(PathBuf::from),
            countries_path: env_string("HAKACH_COUNTRIES_PATH").map(PathBuf::from),
            session_ttl: Duration::from_secs(env_parse(
                "HAKACH_SESSION_TTL_SECONDS",
                defaults.session_ttl.as_secs(),
            )),
            chat_rate_limit_max: env_parse("HAKACH_CHAT_RATE_LIMIT_MAX", defaults.chat_rate_limit_max),
            chat_rate_limit_window: Duration::from_secs(env_parse(
                "HAKACH_CHAT_RATE_LIMIT_WINDOW_SECONDS",
                defaults.chat_rate_limit_window.as_secs(),
            )),
            widget_title: env_string("HAKACH_WIDGET_TITLE"),
        }
    }

    /// The widget options served to embedding pages.
    pub fn widget_config(&self) -> WidgetConfig {
        let defaults = WidgetConfig::default();
        WidgetConfig {
            api_key: self.gemini.api_key.clone(),
            knowledge_base_url: match &self.knowledge {
                KnowledgeSource::Url(url) => url.clone(),
                _ => defaults.knowledge_base_url.clone(),
            },
            widget_title: self
                .widget_title
                .clone()
                .unwrap_or_else(|| defaults.widget_title.clone()),
            default_language: self.languages.default_language().as_code().to_string(),
            supported_languages: self
                .languages
                .languages()
                .iter()
                .map(|language| (language.as_code().to_string(), language.display_name().to_string()))
                .collect(),
            ..defaults
        }
    }
}

fn env_string(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn env_parse<T: FromStr>(name: &str, default: T) -> T {
    env_string(name)
        .and_then(|value| value.parse::<T>().ok())
        .unwrap_or(default)
}
