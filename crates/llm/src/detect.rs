use std::sync::Arc;

use hakach_core::{detection_prompt, Language, LanguageSet};
use tracing::warn;

use crate::LanguageModel;

/// Picks the reply language for a message.
#[derive(Clone)]
pub enum LanguageDetector {
    /// Single-locale deployments never ask the model.
    Fixed(Language),
    Model {
        model: Arc<dyn LanguageModel>,
        languages: LanguageSet,
    },
}

impl LanguageDetector {
    pub fn for_set(languages: LanguageSet, model: Arc<dyn LanguageModel>) -> Self {
        if languages.is_single() {
            Self::Fixed(languages.default_language())
        } else {
            Self::Model { model, languages }
        }
    }

    pub fn is_fixed(&self) -> bool {
        matches!(self, Self::Fixed(_))
    }

    /// Never fails: backend errors and unsupported answers yield the default language.
    pub async fn detect(&self, text: &str) -> Language {
        match self {
            Self::Fixed(language) => *language,
            Self::Model { model, languages } => {
                let prompt = detection_prompt(text, languages);
                match model.generate(&prompt).await {
                    Ok(reply) => match parse_reply(&reply, languages) {
                        Some(language) => language,
                        None => {
                            warn!(reply = %reply.trim(), "language detector answered outside the supported set");
                            languages.default_language()
                        }
                    },
                    Err(err) => {
                        warn!(error = %err, model = model.name(), "language detection failed");
                        languages.default_language()
                    }
                }
            }
        }
    }
}

fn parse_reply(reply: &str, languages: &LanguageSet) -> Option<Language> {
    let mut cleaned = reply.trim().to_lowercase();
    loop {
        let next = cleaned
            .trim()
            .trim_end_matches('.')
            .trim_matches(|ch: char| ch == '"' || ch == '\'' || ch == '`');
        if next == cleaned {
            break;
        }
        cleaned = next.to_string();
    }
    languages.parse_code(&cleaned)
}
