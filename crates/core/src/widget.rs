use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::language::{Language, LanguageSet};

/// Options accepted by the embeddable chat widget.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WidgetConfig {
    pub api_key: String,
    pub knowledge_base_url: String,
    pub position: WidgetPosition,
    pub primary_color: String,
    pub background_color: String,
    pub widget_title: String,
    pub default_language: String,
    pub supported_languages: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WidgetPosition {
    #[default]
    BottomRight,
    BottomLeft,
    TopRight,
    TopLeft,
}

impl Default for WidgetConfig {
    fn default() -> Self {
        let supported_languages = [
            Language::Fr,
            Language::En,
            Language::Es,
            Language::De,
            Language::Ar,
        ]
        .into_iter()
        .map(|language| (language.as_code().to_string(), language.display_name().to_string()))
        .collect();

        Self {
            api_key: String::new(),
            knowledge_base_url: "/data/knowledge_base.json".to_string(),
            position: WidgetPosition::BottomRight,
            primary_color: "#f59e0b".to_string(),
            background_color: "#000000".to_string(),
            widget_title: "Assistant Hakach Transfert".to_string(),
            default_language: "fr".to_string(),
            supported_languages,
        }
    }
}

impl WidgetConfig {
    /// Languages named in the config that the assistant knows; unknown codes are ignored.
    pub fn language_set(&self) -> LanguageSet {
        let default = Language::from_code(&self.default_language).unwrap_or(Language::Fr);
        LanguageSet::new(
            self.supported_languages
                .keys()
                .filter_map(|code| Language::from_code(code)),
            default,
        )
    }

    /// The config as served to browsers: no credentials.
    pub fn public_view(&self) -> Self {
        Self {
            api_key: String::new(),
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_keeps_defaults() {
        let config: WidgetConfig = serde_json::from_str(
            r##"{ "widgetTitle": "Support", "position": "bottom-left", "primaryColor": "#123456" }"##,
        )
        .unwrap();
        assert_eq!(config.widget_title, "Support");
        assert_eq!(config.position, WidgetPosition::BottomLeft);
        assert_eq!(config.primary_color, "#123456");
        assert_eq!(config.default_language, "fr");
        assert_eq!(config.supported_languages.len(), 5);
    }

    #[test]
    fn language_set_skips_unknown_codes() {
        let config: WidgetConfig = serde_json::from_str(
            r#"{ "defaultLanguage": "en", "supportedLanguages": { "en": "English", "xx": "??" } }"#,
        )
        .unwrap();
        let set = config.language_set();
        assert!(set.is_single());
        assert_eq!(set.default_language(), Language::En);
    }

    #[test]
    fn public_view_hides_api_key() {
        let config = WidgetConfig {
            api_key: "secret".to_string(),
            ..WidgetConfig::default()
        };
        assert!(config.public_view().api_key.is_empty());
    }
}
