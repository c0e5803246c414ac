pub mod providers;
mod widget;

use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, Result};
use chrono::{Duration, Utc};
use hakach_core::dialogue::{self, FlowOutput, Transition};
use hakach_core::{
    classify_intent, fallback_prompt, format_corridors, format_orders, format_rates,
    tidy_model_reply, Catalog, ChatReply, ChatSession, CountryTable, Intent, KeywordTable,
    KnowledgeBase, Language, LanguageSet, Persona,
};
use hakach_llm::{LanguageDetector, LanguageModel};
use hakach_observability::{AppMetrics, TurnKind};
use hakach_storage::SessionRepository;
use tracing::{info, instrument, warn};
use uuid::Uuid;

pub use providers::{
    Endpoint, FixtureProvider, HttpDataProvider, ProviderError, TransferDataProvider,
    DEFAULT_PROVIDER_BASE_URL,
};
pub use widget::ChatWidget;

/// Static configuration of a [`SupportAssistant`].
#[derive(Debug, Clone)]
pub struct AssistantSettings {
    pub languages: LanguageSet,
    pub persona: Persona,
    pub session_ttl: Duration,
    pub catalog: Catalog,
    pub keywords: KeywordTable,
    pub countries: CountryTable,
}

impl Default for AssistantSettings {
    fn default() -> Self {
        Self {
            languages: LanguageSet::new(
                [Language::Fr, Language::En, Language::Es, Language::De, Language::Ar],
                Language::Fr,
            ),
            persona: Persona::default(),
            session_ttl: Duration::hours(24),
            catalog: Catalog::builtin(),
            keywords: KeywordTable::builtin(),
            countries: CountryTable::builtin(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum TurnOutcome {
    /// A previous turn of the same session is still in flight; nothing happened.
    Busy,
    /// Blank input; nothing happened.
    Ignored,
    Replied(ChatReply),
}

struct TurnResult {
    language: Language,
    intent: Intent,
    kind: TurnKind,
    text: String,
}

#[derive(Clone)]
pub struct SupportAssistant<S>
where
    S: SessionRepository,
{
    catalog: Arc<Catalog>,
    keywords: Arc<KeywordTable>,
    countries: Arc<CountryTable>,
    knowledge: Arc<KnowledgeBase>,
    persona: Persona,
    languages: LanguageSet,
    session_ttl: Duration,
    detector: LanguageDetector,
    model: Arc<dyn LanguageModel>,
    provider: Arc<dyn TransferDataProvider>,
    store: Arc<S>,
    metrics: Arc<AppMetrics>,
}

impl<S> SupportAssistant<S>
where
    S: SessionRepository,
{
    pub fn new(
        settings: AssistantSettings,
        knowledge: KnowledgeBase,
        model: Arc<dyn LanguageModel>,
        provider: Arc<dyn TransferDataProvider>,
        store: Arc<S>,
        metrics: Arc<AppMetrics>,
    ) -> Self {
        let detector = LanguageDetector::for_set(settings.languages.clone(), model.clone());
        Self {
            catalog: Arc::new(settings.catalog),
            keywords: Arc::new(settings.keywords),
            countries: Arc::new(settings.countries),
            knowledge: Arc::new(knowledge),
            persona: settings.persona,
            languages: settings.languages,
            session_ttl: settings.session_ttl,
            detector,
            model,
            provider,
            store,
            metrics,
        }
    }

    pub fn languages(&self) -> &LanguageSet {
        &self.languages
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn knowledge(&self) -> &KnowledgeBase {
        &self.knowledge
    }

    pub fn provider(&self) -> &Arc<dyn TransferDataProvider> {
        &self.provider
    }

    pub fn metrics(&self) -> &Arc<AppMetrics> {
        &self.metrics
    }

    /// Starts a session showing the welcome message in the requested (or default) language.
    pub async fn open_session(&self, language: Option<Language>) -> Result<ChatSession> {
        let language = self.languages.resolve(language);
        let session = self.fresh_session(Uuid::new_v4().to_string(), language);
        self.store.upsert_session(&session).await?;
        info!(session_id = %session.session_id, language = %language, "session opened");
        Ok(session)
    }

    pub async fn load_session(&self, session_id: &str) -> Result<Option<ChatSession>> {
        self.store.load_session(session_id).await
    }

    #[instrument(skip(self, text))]
    pub async fn handle_message(&self, session_id: Option<&str>, text: &str) -> Result<TurnOutcome> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(TurnOutcome::Ignored);
        }

        let started = Instant::now();
        self.metrics.inc_request();

        let session_id = match session_id.map(str::trim) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => Uuid::new_v4().to_string(),
        };
        let fresh = self.fresh_session(session_id.clone(), self.languages.default_language());
        self.store.insert_session_if_absent(&fresh).await?;

        if !self.store.try_begin_turn(&session_id).await? {
            self.metrics.inc_busy_rejection();
            info!(session_id = %session_id, "turn rejected, session busy");
            return Ok(TurnOutcome::Busy);
        }

        let reply = self.run_turn(&session_id, text).await;
        if reply.is_err() {
            if let Err(err) = self.store.end_turn(&session_id).await {
                warn!(session_id = %session_id, error = %err, "failed releasing turn guard");
            }
        }
        let reply = reply?;

        self.metrics.observe_latency(started.elapsed());
        info!(
            session_id = %reply.session_id,
            language = %reply.language,
            intent = reply.intent.as_str(),
            rate_flow = %reply.rate_flow_step,
            "chat handled"
        );

        Ok(TurnOutcome::Replied(reply))
    }

    /// Forgets the session, its history and any running rate flow.
    pub async fn close_session(&self, session_id: &str) -> Result<bool> {
        let removed = self.store.delete_session(session_id).await?;
        info!(session_id, removed, "session closed");
        Ok(removed)
    }

    pub async fn rate_overview(&self, language: Option<Language>) -> String {
        let language = self.languages.resolve(language);
        let envelope = self.provider.rates().await;
        if !envelope.success {
            self.metrics.inc_provider_failure("rates");
        }
        format_rates(&envelope, language, &self.catalog)
    }

    pub async fn purge_expired_sessions(&self) -> Result<u64> {
        self.store.purge_expired(Utc::now()).await
    }

    fn fresh_session(&self, session_id: String, language: Language) -> ChatSession {
        let mut session = ChatSession::new(session_id, language, Utc::now() + self.session_ttl);
        session.push_message(self.catalog.get(language).welcome, false);
        session
    }

    async fn run_turn(&self, session_id: &str, text: &str) -> Result<ChatReply> {
        let mut session = self
            .store
            .load_session(session_id)
            .await?
            .ok_or_else(|| anyhow!("session {session_id} disappeared during its turn"))?;

        let in_conversation = session.in_conversation();
        let first_new = session.messages.len();
        session.push_message(text, true);

        let turn = match dialogue::advance(&session.rate_flow, text, &self.countries, &self.catalog) {
            Some(transition) => self.continue_rate_flow(&mut session, transition).await,
            None => self.dispatch(&mut session, text, in_conversation).await,
        };

        session.language = turn.language;
        session.push_message(turn.text, false);
        session.is_loading = false;
        session.expires_at = Utc::now() + self.session_ttl;
        self.store.upsert_session(&session).await?;
        self.metrics.record_turn(turn.kind);

        Ok(ChatReply {
            session_id: session.session_id.clone(),
            language: turn.language,
            right_to_left: turn.language.is_right_to_left(),
            intent: turn.intent,
            messages: session.messages[first_new..].to_vec(),
            rate_flow_step: session.rate_flow.step_name().to_string(),
        })
    }

    /// Answers inside a running rate flow; detection and classification are skipped.
    async fn continue_rate_flow(&self, session: &mut ChatSession, transition: Transition) -> TurnResult {
        let language = session.rate_flow.language().unwrap_or(session.language);
        let text = match transition.output {
            FlowOutput::Say(text) => text,
            FlowOutput::LookupRate(query) => {
                let envelope = self.provider.rate(query.primary(), query.secondary()).await;
                if !envelope.success {
                    self.metrics.inc_provider_failure("rates");
                }
                dialogue::complete_lookup(&query, &envelope, &self.catalog)
            }
        };
        session.rate_flow = transition.next;

        TurnResult {
            language,
            intent: Intent::Rate,
            kind: TurnKind::RateFlow,
            text,
        }
    }

    async fn dispatch(&self, session: &mut ChatSession, text: &str, in_conversation: bool) -> TurnResult {
        let language = self.detector.detect(text).await;
        let intent = classify_intent(text, language, &self.keywords);

        let (kind, reply) = match intent {
            Intent::Rate => {
                let (flow, prompt) = dialogue::start(language, &self.catalog);
                session.rate_flow = flow;
                (TurnKind::RateFlow, prompt)
            }
            Intent::Corridor => {
                let envelope = self.provider.corridors().await;
                if !envelope.success {
                    self.metrics.inc_provider_failure("corridors");
                }
                (TurnKind::Corridor, format_corridors(&envelope, language, &self.catalog))
            }
            Intent::Order => {
                let envelope = self.provider.orders().await;
                if !envelope.success {
                    self.metrics.inc_provider_failure("orders");
                }
                (TurnKind::Order, format_orders(&envelope, language, &self.catalog))
            }
            Intent::None => (
                TurnKind::Fallback,
                self.fallback(text, language, in_conversation).await,
            ),
        };

        TurnResult {
            language,
            intent,
            kind,
            text: reply,
        }
    }

    async fn fallback(&self, question: &str, language: Language, in_conversation: bool) -> String {
        let prompt = fallback_prompt(
            question,
            &self.knowledge,
            language,
            &self.persona,
            &self.catalog,
            in_conversation,
        );

        match self.model.generate(&prompt).await {
            Ok(raw) => {
                let tidy = tidy_model_reply(&raw);
                if tidy.is_empty() {
                    self.catalog.get(language).fallback_apology.to_string()
                } else {
                    tidy
                }
            }
            Err(err) => {
                self.metrics.inc_model_failure();
                warn!(error = %err, model = self.model.name(), "fallback generation failed");
                self.catalog.get(language).fallback_apology.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use hakach_core::ProviderEnvelope;
    use hakach_llm::ScriptedModel;
    use hakach_storage::Store;
    use serde_json::json;

    use super::*;

    struct Harness {
        assistant: SupportAssistant<Store>,
        model: Arc<ScriptedModel>,
        provider: Arc<FixtureProvider>,
    }

    fn harness(languages: LanguageSet, model: ScriptedModel, provider: FixtureProvider) -> Harness {
        let model = Arc::new(model);
        let provider = Arc::new(provider);
        let settings = AssistantSettings {
            languages,
            ..AssistantSettings::default()
        };
        let assistant = SupportAssistant::new(
            settings,
            KnowledgeBase::empty(),
            model.clone(),
            provider.clone(),
            Arc::new(Store::memory()),
            AppMetrics::shared(),
        );
        Harness {
            assistant,
            model,
            provider,
        }
    }

    fn english_only(model: ScriptedModel, provider: FixtureProvider) -> Harness {
        harness(LanguageSet::single(Language::En), model, provider)
    }

    fn replied(outcome: TurnOutcome) -> ChatReply {
        match outcome {
            TurnOutcome::Replied(reply) => reply,
            other => panic!("expected a reply, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn open_session_shows_welcome() {
        let h = english_only(ScriptedModel::offline(), FixtureProvider::new());
        let session = h.assistant.open_session(None).await.unwrap();

        assert_eq!(session.language, Language::En);
        assert_eq!(session.messages.len(), 1);
        assert!(!session.messages[0].is_user);
        assert_eq!(session.messages[0].text, h.assistant.catalog().get(Language::En).welcome);
    }

    #[tokio::test]
    async fn rate_flow_makes_exactly_one_provider_call() {
        let provider = FixtureProvider::new()
            .with_rate(ProviderEnvelope::ok(json!({ "exchange_rate": 1650.25 })));
        let h = english_only(ScriptedModel::offline(), provider);
        let session = h.assistant.open_session(None).await.unwrap();
        let id = Some(session.session_id.as_str());

        let first = replied(h.assistant.handle_message(id, "What is the exchange rate?").await.unwrap());
        assert_eq!(first.intent, Intent::Rate);
        assert_eq!(first.rate_flow_step, "awaiting_origin");
        assert_eq!(h.provider.call_count(), 0);

        let second = replied(h.assistant.handle_message(id, "France").await.unwrap());
        assert_eq!(second.rate_flow_step, "awaiting_destination");
        assert!(second.messages[1].text.contains("France"));
        assert_eq!(h.provider.call_count(), 0);

        let third = replied(h.assistant.handle_message(id, "Nigeria").await.unwrap());
        assert_eq!(third.rate_flow_step, "idle");
        assert!(third.messages[1].text.contains("1 EUR = 1650.25 NGN"));
        assert_eq!(h.provider.call_count(), 1);
        assert_eq!(h.provider.rate_requests(), vec![("EUR".to_string(), "NGN".to_string())]);

        assert_eq!(h.model.call_count(), 0);
    }

    #[tokio::test]
    async fn unknown_country_reprompts_without_provider_call() {
        let h = english_only(ScriptedModel::offline(), FixtureProvider::new());
        let session = h.assistant.open_session(None).await.unwrap();
        let id = Some(session.session_id.as_str());

        replied(h.assistant.handle_message(id, "exchange rate please").await.unwrap());
        let reply = replied(h.assistant.handle_message(id, "Atlantis").await.unwrap());

        assert_eq!(reply.rate_flow_step, "awaiting_origin");
        assert_eq!(
            reply.messages[1].text,
            h.assistant.catalog().get(Language::En).country_not_recognized
        );
        assert_eq!(h.provider.call_count(), 0);
    }

    #[tokio::test]
    async fn failed_lookup_still_ends_the_flow() {
        let h = english_only(ScriptedModel::offline(), FixtureProvider::new());
        let session = h.assistant.open_session(None).await.unwrap();
        let id = Some(session.session_id.as_str());

        replied(h.assistant.handle_message(id, "rate").await.unwrap());
        replied(h.assistant.handle_message(id, "France").await.unwrap());
        let reply = replied(h.assistant.handle_message(id, "Senegal").await.unwrap());

        assert_eq!(reply.rate_flow_step, "idle");
        assert_eq!(reply.messages[1].text, h.assistant.catalog().get(Language::En).rate_error);
        assert_eq!(h.assistant.metrics().snapshot().provider_failures_total, 1);
    }

    #[tokio::test]
    async fn active_flow_skips_language_detection() {
        let model = ScriptedModel::new(["en"]);
        let h = harness(LanguageSet::all(Language::Fr), model, FixtureProvider::new());
        let session = h.assistant.open_session(None).await.unwrap();
        let id = Some(session.session_id.as_str());

        let started = replied(h.assistant.handle_message(id, "exchange rate").await.unwrap());
        assert_eq!(started.language, Language::En);
        assert_eq!(h.model.call_count(), 1);

        let next = replied(h.assistant.handle_message(id, "Allemagne").await.unwrap());
        assert_eq!(next.language, Language::En);
        assert_eq!(next.rate_flow_step, "awaiting_destination");
        assert_eq!(h.model.call_count(), 1);
    }

    #[tokio::test]
    async fn corridor_turn_formats_provider_data() {
        let provider = FixtureProvider::new().with_corridors(ProviderEnvelope::ok(json!([
            { "from": "France", "to": "Senegal", "link": "https://hakach.net/fr-sn" },
            { "from": "Belgium", "to": "Cameroon" }
        ])));
        let h = english_only(ScriptedModel::offline(), provider);

        let reply = replied(h.assistant.handle_message(None, "Which corridors do you support?").await.unwrap());

        assert_eq!(reply.intent, Intent::Corridor);
        let text = &reply.messages[1].text;
        assert!(text.contains("France → Senegal"));
        assert!(text.contains("Belgium → Cameroon"));
        assert_eq!(h.provider.call_count(), 1);
        assert_eq!(h.model.call_count(), 0);
    }

    #[tokio::test]
    async fn fallback_uses_model_and_tidies_reply() {
        let model = ScriptedModel::new(["Sure!\n\n\n\n- first step\n2. second step"]);
        let h = english_only(model, FixtureProvider::new());
        let session = h.assistant.open_session(None).await.unwrap();

        let reply = replied(
            h.assistant
                .handle_message(Some(&session.session_id), "How do I create an account?")
                .await
                .unwrap(),
        );

        assert_eq!(reply.intent, Intent::None);
        assert_eq!(reply.messages[1].text, "Sure!\n\n• first step\n• second step");
        let prompts = h.model.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("How do I create an account?"));
        assert!(prompts[0].contains("NEVER greet"));
    }

    #[tokio::test]
    async fn fallback_failure_returns_localized_apology() {
        let model = ScriptedModel::new(["de"]);
        model.push_failure("backend down");
        let h = harness(LanguageSet::all(Language::Fr), model, FixtureProvider::new());

        let reply = replied(h.assistant.handle_message(None, "Wie funktioniert das?").await.unwrap());

        assert_eq!(reply.language, Language::De);
        assert_eq!(
            reply.messages[1].text,
            h.assistant.catalog().get(Language::De).fallback_apology
        );
        assert_eq!(h.assistant.metrics().snapshot().model_failures_total, 1);
    }

    #[tokio::test]
    async fn busy_session_is_a_no_op() {
        let h = english_only(ScriptedModel::offline(), FixtureProvider::new());
        let session = h.assistant.open_session(None).await.unwrap();
        let id = session.session_id.clone();

        let store = h.assistant.store.clone();
        assert!(store.try_begin_turn(&id).await.unwrap());

        let outcome = h.assistant.handle_message(Some(&id), "corridors").await.unwrap();
        assert!(matches!(outcome, TurnOutcome::Busy));

        let stored = h.assistant.load_session(&id).await.unwrap().unwrap();
        assert_eq!(stored.messages.len(), 1);
        assert_eq!(h.provider.call_count(), 0);
        assert_eq!(h.assistant.metrics().snapshot().busy_rejections_total, 1);
    }

    #[tokio::test]
    async fn first_message_does_not_reset_a_running_turn() {
        let h = english_only(ScriptedModel::offline(), FixtureProvider::new());
        let store = h.assistant.store.clone();
        let first = h.assistant.fresh_session("shared-id".to_string(), Language::En);
        assert!(store.insert_session_if_absent(&first).await.unwrap());
        assert!(store.try_begin_turn("shared-id").await.unwrap());

        let outcome = h.assistant.handle_message(Some("shared-id"), "orders").await.unwrap();
        assert!(matches!(outcome, TurnOutcome::Busy));

        let stored = h.assistant.load_session("shared-id").await.unwrap().unwrap();
        assert!(stored.is_loading);
        assert_eq!(stored.messages.len(), 1);
        assert_eq!(h.provider.call_count(), 0);
    }

    #[tokio::test]
    async fn arabic_replies_are_flagged_right_to_left() {
        let h = harness(
            LanguageSet::single(Language::Ar),
            ScriptedModel::offline(),
            FixtureProvider::new(),
        );
        let reply = replied(h.assistant.handle_message(None, "مرحبا").await.unwrap());
        assert_eq!(reply.language, Language::Ar);
        assert!(reply.right_to_left);
    }

    #[tokio::test]
    async fn blank_input_is_ignored() {
        let h = english_only(ScriptedModel::offline(), FixtureProvider::new());
        let outcome = h.assistant.handle_message(None, "   \n").await.unwrap();
        assert!(matches!(outcome, TurnOutcome::Ignored));
        assert_eq!(h.assistant.metrics().snapshot().requests_total, 0);
    }

    #[tokio::test]
    async fn unknown_session_id_starts_a_new_session() {
        let h = english_only(ScriptedModel::offline(), FixtureProvider::new());
        let reply = replied(h.assistant.handle_message(Some("from-elsewhere"), "orders").await.unwrap());

        assert_eq!(reply.session_id, "from-elsewhere");
        let stored = h.assistant.load_session("from-elsewhere").await.unwrap().unwrap();
        assert_eq!(stored.messages.len(), 3);
        assert!(!stored.is_loading);
    }

    #[tokio::test]
    async fn close_session_discards_flow_and_history() {
        let h = english_only(ScriptedModel::offline(), FixtureProvider::new());
        let session = h.assistant.open_session(None).await.unwrap();
        let id = session.session_id.clone();
        replied(h.assistant.handle_message(Some(&id), "rate").await.unwrap());

        assert!(h.assistant.close_session(&id).await.unwrap());
        assert!(h.assistant.load_session(&id).await.unwrap().is_none());
        assert!(!h.assistant.close_session(&id).await.unwrap());
    }

    #[tokio::test]
    async fn rate_overview_groups_by_primary() {
        let provider = FixtureProvider::new().with_rates(ProviderEnvelope::ok(json!([
            { "primary": "EUR", "secondary": "XOF", "exchange_rate": 655.957 },
            { "primary": "EUR", "secondary": "MAD", "exchange_rate": 10.8 }
        ])));
        let h = english_only(ScriptedModel::offline(), provider);

        let text = h.assistant.rate_overview(Some(Language::En)).await;
        assert!(text.contains("EUR:\n  → XOF: 655.957\n  → MAD: 10.8"));
    }
}
