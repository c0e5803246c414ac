use std::collections::HashMap;
use std::path::Path;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::error::CatalogError;
use crate::language::Language;
use crate::models::Intent;

static BUILTIN_KEYWORDS: Lazy<KeywordTable> = Lazy::new(|| {
    KeywordTable::from_json(include_str!("../resources/keywords.json"))
        .expect("bundled keyword table is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentCategory {
    Corridor,
    Order,
    Rate,
}

impl IntentCategory {
    /// Fixed check order. The first category with a hit wins.
    pub const CHECK_ORDER: [IntentCategory; 3] = [
        IntentCategory::Corridor,
        IntentCategory::Order,
        IntentCategory::Rate,
    ];

    pub fn intent(self) -> Intent {
        match self {
            Self::Corridor => Intent::Corridor,
            Self::Order => Intent::Order,
            Self::Rate => Intent::Rate,
        }
    }
}

/// Keyword lists indexed by language and category.
#[derive(Debug, Clone, Default)]
pub struct KeywordTable {
    entries: HashMap<Language, HashMap<IntentCategory, Vec<String>>>,
}

impl KeywordTable {
    pub fn builtin() -> Self {
        BUILTIN_KEYWORDS.clone()
    }

    pub fn from_json(raw: &str) -> Result<Self, CatalogError> {
        let parsed: HashMap<Language, HashMap<IntentCategory, Vec<String>>> =
            serde_json::from_str(raw)?;

        let entries = parsed
            .into_iter()
            .map(|(language, categories)| {
                let categories = categories
                    .into_iter()
                    .map(|(category, keywords)| {
                        let keywords = keywords
                            .into_iter()
                            .map(|keyword| keyword.trim().to_lowercase())
                            .filter(|keyword| !keyword.is_empty())
                            .collect::<Vec<_>>();
                        (category, keywords)
                    })
                    .collect();
                (language, categories)
            })
            .collect::<HashMap<_, _>>();

        if entries.is_empty() {
            return Err(CatalogError::Empty);
        }

        Ok(Self { entries })
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&raw)
    }

    pub fn keywords(&self, language: Language, category: IntentCategory) -> &[String] {
        self.entries
            .get(&language)
            .and_then(|categories| categories.get(&category))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn languages(&self) -> impl Iterator<Item = Language> + '_ {
        self.entries.keys().copied()
    }
}

pub fn normalize_text(input: &str) -> String {
    input
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_string()
}

pub fn classify_intent(text: &str, language: Language, table: &KeywordTable) -> Intent {
    let lower = normalize_text(text).to_lowercase();

    IntentCategory::CHECK_ORDER
        .into_iter()
        .find(|category| contains_any(&lower, table.keywords(language, *category)))
        .map(IntentCategory::intent)
        .unwrap_or(Intent::None)
}

fn contains_any(input: &str, needles: &[String]) -> bool {
    needles.iter().any(|needle| input.contains(needle.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_keyword_classifies_to_its_own_category() {
        let table = KeywordTable::builtin();
        for language in Language::ALL {
            for category in IntentCategory::CHECK_ORDER {
                for keyword in table.keywords(language, category) {
                    assert_eq!(
                        classify_intent(keyword, language, &table),
                        category.intent(),
                        "{language}: {keyword}"
                    );
                }
            }
        }
    }

    #[test]
    fn corridor_beats_order_beats_rate() {
        let table = KeywordTable::builtin();
        assert_eq!(
            classify_intent("Which countries and what exchange rate?", Language::En, &table),
            Intent::Corridor
        );
        assert_eq!(
            classify_intent("My order and the exchange rate please", Language::En, &table),
            Intent::Order
        );
    }

    #[test]
    fn matching_is_case_insensitive() {
        let table = KeywordTable::builtin();
        assert_eq!(
            classify_intent("Quel est le TAUX aujourd'hui ?", Language::Fr, &table),
            Intent::Rate
        );
    }

    #[test]
    fn language_without_entries_never_matches() {
        let table = KeywordTable::from_json(r#"{"en": {"rate": ["rate"]}}"#).unwrap();
        assert_eq!(classify_intent("rate", Language::Fr, &table), Intent::None);
        assert!(table.keywords(Language::En, IntentCategory::Order).is_empty());
    }

    #[test]
    fn unrelated_text_falls_through() {
        let table = KeywordTable::builtin();
        assert_eq!(
            classify_intent("How do I create an account?", Language::En, &table),
            Intent::None
        );
    }

    #[test]
    fn empty_table_is_rejected() {
        assert!(matches!(
            KeywordTable::from_json("{}"),
            Err(CatalogError::Empty)
        ));
    }

    #[test]
    fn normalizes_whitespace() {
        assert_eq!(normalize_text("  what   is\n the rate "), "what is the rate");
    }

    #[test]
    fn multi_word_keywords_survive_irregular_spacing() {
        let table = KeywordTable::builtin();
        assert_eq!(
            classify_intent("Which\n  COUNTRIES do you serve?", Language::En, &table),
            Intent::Corridor
        );
        assert_eq!(
            classify_intent("track   my transfer", Language::En, &table),
            Intent::Order
        );
    }
}
