use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::language::Language;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Corridor,
    Order,
    Rate,
    None,
}

impl Intent {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Corridor => "corridor",
            Self::Order => "order",
            Self::Rate => "rate",
            Self::None => "none",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeItem {
    pub question: String,
    pub answer: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KnowledgeBase {
    items: Vec<KnowledgeItem>,
}

impl KnowledgeBase {
    pub fn new(items: Vec<KnowledgeItem>) -> Self {
        Self { items }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[KnowledgeItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: u64,
    pub text: String,
    pub is_user: bool,
    pub is_typing: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountryMatch {
    pub name: String,
    pub currency: String,
}

/// Cross-turn state of the exchange-rate dialogue. Steps only move forward.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum RateFlow {
    #[default]
    Idle,
    AwaitingOrigin {
        language: Language,
    },
    AwaitingDestination {
        language: Language,
        origin: CountryMatch,
    },
}

impl RateFlow {
    pub fn is_active(&self) -> bool {
        !matches!(self, Self::Idle)
    }

    pub fn language(&self) -> Option<Language> {
        match self {
            Self::Idle => None,
            Self::AwaitingOrigin { language } | Self::AwaitingDestination { language, .. } => {
                Some(*language)
            }
        }
    }

    pub fn step_name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::AwaitingOrigin { .. } => "awaiting_origin",
            Self::AwaitingDestination { .. } => "awaiting_destination",
        }
    }
}

/// Uniform result of every data-provider call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderEnvelope {
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProviderEnvelope {
    pub fn ok(data: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }

    /// The payload as a list, when the call succeeded and returned one.
    pub fn items(&self) -> Option<&Vec<Value>> {
        if !self.success {
            return None;
        }
        self.data.as_ref().and_then(Value::as_array)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSession {
    pub session_id: String,
    pub language: Language,
    pub messages: Vec<Message>,
    pub rate_flow: RateFlow,
    pub is_loading: bool,
    pub next_message_id: u64,
    pub expires_at: DateTime<Utc>,
}

impl ChatSession {
    pub fn new(session_id: impl Into<String>, language: Language, expires_at: DateTime<Utc>) -> Self {
        Self {
            session_id: session_id.into(),
            language,
            messages: Vec::new(),
            rate_flow: RateFlow::Idle,
            is_loading: false,
            next_message_id: 1,
            expires_at,
        }
    }

    pub fn push_message(&mut self, text: impl Into<String>, is_user: bool) -> &Message {
        let id = self.next_message_id;
        self.next_message_id += 1;
        self.messages.push(Message {
            id,
            text: text.into(),
            is_user,
            is_typing: false,
            created_at: Utc::now(),
        });
        &self.messages[self.messages.len() - 1]
    }

    /// A shown welcome message already counts as the start of the conversation.
    pub fn in_conversation(&self) -> bool {
        !self.messages.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatReply {
    pub session_id: String,
    pub language: Language,
    /// Set when `language` is written right to left.
    pub right_to_left: bool,
    pub intent: Intent,
    pub messages: Vec<Message>,
    pub rate_flow_step: String,
}
