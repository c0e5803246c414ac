pub mod catalog;
pub mod countries;
pub mod dialogue;
pub mod error;
pub mod formatter;
pub mod intent;
pub mod language;
pub mod models;
pub mod prompt;
pub mod typing;
pub mod widget;

pub use catalog::{Catalog, LocaleStrings};
pub use countries::CountryTable;
pub use dialogue::{FlowOutput, RateQuery, Transition};
pub use error::CatalogError;
pub use formatter::{format_corridors, format_orders, format_rate_value, format_rates};
pub use intent::{classify_intent, normalize_text, IntentCategory, KeywordTable};
pub use language::{Language, LanguageSet};
pub use models::*;
pub use prompt::{detection_prompt, fallback_prompt, tidy_model_reply, Persona};
pub use typing::{typing_duration, TypingAnimation};
pub use widget::{WidgetConfig, WidgetPosition};
