use std::path::Path;

use once_cell::sync::Lazy;
use serde::Deserialize;

use crate::error::CatalogError;
use crate::models::CountryMatch;

static BUILTIN_COUNTRIES: Lazy<CountryTable> = Lazy::new(|| {
    CountryTable::from_json(include_str!("../resources/countries.json"))
        .expect("bundled country table is valid")
});

#[derive(Debug, Clone, Deserialize)]
pub struct CountryEntry {
    pub currency: String,
    pub aliases: Vec<String>,
}

/// Country names (several languages, lowercase) to currency codes. Order matters for partial matches.
#[derive(Debug, Clone, Default)]
pub struct CountryTable {
    entries: Vec<CountryEntry>,
}

impl CountryTable {
    pub fn builtin() -> Self {
        BUILTIN_COUNTRIES.clone()
    }

    pub fn from_json(raw: &str) -> Result<Self, CatalogError> {
        let mut entries: Vec<CountryEntry> = serde_json::from_str(raw)?;
        for entry in &mut entries {
            entry.currency = entry.currency.trim().to_uppercase();
            entry.aliases = entry
                .aliases
                .iter()
                .map(|alias| alias.trim().to_lowercase())
                .filter(|alias| !alias.is_empty())
                .collect();
        }
        entries.retain(|entry| !entry.aliases.is_empty() && !entry.currency.is_empty());

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

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Exact alias first, then the first entry where alias and input contain one another.
    pub fn resolve(&self, input: &str) -> Option<CountryMatch> {
        let needle = input.trim().to_lowercase();
        if needle.is_empty() {
            return None;
        }

        let exact = self.entries.iter().find_map(|entry| {
            entry
                .aliases
                .iter()
                .find(|alias| **alias == needle)
                .map(|alias| (entry, alias))
        });

        let found = exact.or_else(|| {
            self.entries.iter().find_map(|entry| {
                entry
                    .aliases
                    .iter()
                    .find(|alias| alias.contains(needle.as_str()) || needle.contains(alias.as_str()))
                    .map(|alias| (entry, alias))
            })
        });

        found.map(|(entry, alias)| CountryMatch {
            name: title_case(alias),
            currency: entry.currency.clone(),
        })
    }
}

fn title_case(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut at_word_start = true;
    for ch in value.chars() {
        if at_word_start {
            out.extend(ch.to_uppercase());
        } else {
            out.push(ch);
        }
        at_word_start = ch.is_whitespace() || ch == '-';
    }
    out
}
