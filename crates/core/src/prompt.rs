use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::catalog::Catalog;
use crate::language::{Language, LanguageSet};
use crate::models::KnowledgeBase;

static EXCESS_BLANK_LINES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n{3,}").expect("valid blank line regex"));
static LIST_MARKERS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^(- |\d+\. )").expect("valid list marker regex"));

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Persona {
    pub assistant_name: String,
    pub company: String,
}

impl Default for Persona {
    fn default() -> Self {
        Self {
            assistant_name: "Sarah".to_string(),
            company: "Hakach Transfert".to_string(),
        }
    }
}

pub fn detection_prompt(text: &str, languages: &LanguageSet) -> String {
    let codes = languages
        .languages()
        .iter()
        .map(|language| language.as_code())
        .collect::<Vec<_>>();
    let quoted = codes
        .iter()
        .map(|code| format!("\"{code}\""))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "Detect the language of the following text and answer only with its ISO 639-1 code ({}) without any explanation.\n\nText: \"{}\"\n\nAnswer only with one of: {}.",
        codes.join(", "),
        text.replace('"', "'"),
        quoted
    )
}

pub fn fallback_prompt(
    question: &str,
    knowledge: &KnowledgeBase,
    language: Language,
    persona: &Persona,
    catalog: &Catalog,
    in_conversation: bool,
) -> String {
    let context = knowledge
        .items()
        .iter()
        .map(|item| format!("Q: {}\nA: {}", item.question, item.answer))
        .collect::<Vec<_>>()
        .join("\n\n");
    let context = if context.is_empty() {
        "(no knowledge base entries available)".to_string()
    } else {
        context
    };
    let language_name = catalog.get(language).prompt_language_name;
    let greeting_rule = if in_conversation {
        "1. The conversation is already under way: NEVER greet the user again and answer the question directly."
    } else {
        "1. Greet the user briefly only if it feels natural, then answer the question."
    };

    format!(
        "You are {name}, the professional virtual advisor of {company}, a money-transfer service. Give precise, useful and empathetic answers based on this knowledge base:\n\n\
{context}\n\n\
Guidelines for your answer:\n\
{greeting_rule}\n\
2. Use a natural, caring tone, like a real customer advisor.\n\
3. Use the knowledge base smoothly; if it does not cover the question, say so and suggest contacting support.\n\
4. Add relevant emoji sparingly.\n\
5. VERY IMPORTANT: answer ONLY in the user's language ({language_name}).\n\
6. NEVER mix languages in your answer.\n\n\
User question: {question}\n\n\
Answer like a real professional advisor, naturally and authentically, using ONLY {language_name}.",
        name = persona.assistant_name,
        company = persona.company,
    )
}

/// Trims, collapses runs of blank lines and turns list markers into bullets.
pub fn tidy_model_reply(text: &str) -> String {
    let trimmed = text.trim();
    let collapsed = EXCESS_BLANK_LINES.replace_all(trimmed, "\n\n");
    LIST_MARKERS.replace_all(&collapsed, "• ").into_owned()
}
