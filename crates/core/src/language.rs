use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    Fr,
    En,
    Es,
    De,
    Ar,
    Pt,
}

impl Language {
    pub const ALL: [Language; 6] = [
        Language::Fr,
        Language::En,
        Language::Es,
        Language::De,
        Language::Ar,
        Language::Pt,
    ];

    /// Accepts bare codes, regional tags (`fr-FR`, `pt_BR`) and English names.
    pub fn from_code(value: &str) -> Option<Self> {
        let lowered = value.trim().to_lowercase();
        let primary = lowered
            .split(|ch| ch == '-' || ch == '_')
            .next()
            .unwrap_or_default();

        match primary {
            "fr" | "french" | "français" => Some(Self::Fr),
            "en" | "english" => Some(Self::En),
            "es" | "spanish" | "español" => Some(Self::Es),
            "de" | "german" | "deutsch" => Some(Self::De),
            "ar" | "arabic" | "العربية" => Some(Self::Ar),
            "pt" | "portuguese" | "português" => Some(Self::Pt),
            _ => None,
        }
    }

    pub fn as_code(self) -> &'static str {
        match self {
            Self::Fr => "fr",
            Self::En => "en",
            Self::Es => "es",
            Self::De => "de",
            Self::Ar => "ar",
            Self::Pt => "pt",
        }
    }

    /// Name of the language written in that language.
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Fr => "Français",
            Self::En => "English",
            Self::Es => "Español",
            Self::De => "Deutsch",
            Self::Ar => "العربية",
            Self::Pt => "Português",
        }
    }

    pub fn is_right_to_left(self) -> bool {
        matches!(self, Self::Ar)
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_code())
    }
}

/// The languages a deployment answers in. Never empty; the default is always a member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageSet {
    languages: Vec<Language>,
    default: Language,
}

impl LanguageSet {
    pub fn new(languages: impl IntoIterator<Item = Language>, default: Language) -> Self {
        let mut members = Vec::new();
        for language in languages {
            if !members.contains(&language) {
                members.push(language);
            }
        }
        if !members.contains(&default) {
            members.insert(0, default);
        }

        Self {
            languages: members,
            default,
        }
    }

    pub fn single(language: Language) -> Self {
        Self::new([language], language)
    }

    pub fn all(default: Language) -> Self {
        Self::new(Language::ALL, default)
    }

    /// Parses a comma separated code list such as `fr,en,ar`. Unknown codes are skipped.
    pub fn parse_list(list: &str, default: Language) -> Self {
        Self::new(list.split(',').filter_map(Language::from_code), default)
    }

    pub fn default_language(&self) -> Language {
        self.default
    }

    pub fn languages(&self) -> &[Language] {
        &self.languages
    }

    pub fn contains(&self, language: Language) -> bool {
        self.languages.contains(&language)
    }

    pub fn is_single(&self) -> bool {
        self.languages.len() == 1
    }

    pub fn parse_code(&self, value: &str) -> Option<Language> {
        Language::from_code(value).filter(|language| self.contains(*language))
    }

    /// `requested` when supported, the default otherwise.
    pub fn resolve(&self, requested: Option<Language>) -> Language {
        requested
            .filter(|language| self.contains(*language))
            .unwrap_or(self.default)
    }
}

impl Default for LanguageSet {
    fn default() -> Self {
        Self::new(
            [
                Language::Fr,
                Language::En,
                Language::Es,
                Language::De,
                Language::Ar,
            ],
            Language::Fr,
        )
    }
}
