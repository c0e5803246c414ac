pub mod config;
mod rate_limit;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::extract::{Json, Path, Query, State};
use axum::http::{header, HeaderValue, Method, Request, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{body::Body, Router};
use chrono::{DateTime, Utc};
use hakach_agents::{
    AssistantSettings, Endpoint, HttpDataProvider, SupportAssistant, TransferDataProvider, TurnOutcome,
};
use hakach_core::{
    Catalog, CountryTable, KeywordTable, KnowledgeBase, Language, Message, Persona,
    WidgetConfig,
};
use hakach_llm::{GeminiModel, LanguageModel};
use hakach_observability::{AppMetrics, MetricsSnapshot};
use hakach_storage::Store;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

pub use crate::config::AppConfig;
use crate::rate_limit::IpRateLimiter;

const CHAT_PATH: &str = "/v1/chat";

#[derive(Clone)]
pub struct ApiState {
    pub assistant: Arc<SupportAssistant<Store>>,
    pub metrics: Arc<AppMetrics>,
    pub widget: Arc<WidgetConfig>,
    pub store_backend: &'static str,
    limiter: IpRateLimiter,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp_utc: String,
    metrics: MetricsSnapshot,
    capabilities: HealthCapabilities,
}

#[derive(Debug, Serialize)]
struct HealthCapabilities {
    languages: Vec<&'static str>,
    language_detection: bool,
    knowledge_items: usize,
    store: &'static str,
}

#[derive(Debug, Default, Deserialize)]
struct OpenSessionRequest {
    language: Option<String>,
}

#[derive(Debug, Serialize)]
struct SessionView {
    session_id: String,
    language: Language,
    right_to_left: bool,
    messages: Vec<Message>,
    rate_flow_step: &'static str,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct ChatRequest {
    session_id: Option<String>,
    text: String,
}

#[derive(Debug, Deserialize)]
struct LanguageQuery {
    lang: Option<String>,
}

#[derive(Debug, Serialize)]
struct RateOverviewResponse {
    language: Language,
    text: String,
}

#[derive(Debug, Deserialize)]
struct RatePairQuery {
    primary: Option<String>,
    secondary: Option<String>,
}

/// Builds the whole service from configuration, talking to the real backends.
pub async fn build_app(config: AppConfig) -> Result<Router> {
    let state = build_state(config).await?;
    Ok(build_router(state))
}

pub async fn build_state(config: AppConfig) -> Result<ApiState> {
    let http_client = Client::builder()
        .connect_timeout(Duration::from_secs(6))
        .timeout(Duration::from_secs(10))
        .build()
        .context("failed to build HTTP client")?;

    if !config.gemini.has_api_key() {
        warn!("HAKACH_GEMINI_API_KEY is not set, language model calls will fail");
    }
    let model: Arc<dyn LanguageModel> = Arc::new(
        GeminiModel::new(config.gemini.clone()).context("failed to build language model client")?,
    );
    let provider: Arc<dyn TransferDataProvider> = Arc::new(
        HttpDataProvider::with_client(http_client.clone(), &config.provider_base_url)
            .context("invalid HAKACH_PROVIDER_BASE_URL")?,
    );
    let knowledge = config.knowledge.load_or_empty(&http_client).await;

    build_state_with(config, model, provider, knowledge).await
}

/// Same as [`build_state`] with the backends supplied by the caller.
pub async fn build_state_with(
    config: AppConfig,
    model: Arc<dyn LanguageModel>,
    provider: Arc<dyn TransferDataProvider>,
    knowledge: KnowledgeBase,
) -> Result<ApiState> {
    let metrics = AppMetrics::shared();

    let store = match config.database_url.as_deref() {
        Some(database_url) => Store::sqlite(database_url).await?,
        None => Store::memory(),
    };
    let store_backend = store.backend_name();

    let keywords = match config.keywords_path.as_ref() {
        Some(path) => KeywordTable::from_file(path)
            .with_context(|| format!("failed loading keyword table {}", path.display()))?,
        None => KeywordTable::builtin(),
    };
    let countries = match config.countries_path.as_ref() {
        Some(path) => CountryTable::from_file(path)
            .with_context(|| format!("failed loading country table {}", path.display()))?,
        None => CountryTable::builtin(),
    };

    let settings = AssistantSettings {
        languages: config.languages.clone(),
        persona: Persona::default(),
        session_ttl: chrono::Duration::from_std(config.session_ttl)
            .context("HAKACH_SESSION_TTL_SECONDS is out of range")?,
        catalog: Catalog::builtin(),
        keywords,
        countries,
    };

    let assistant = Arc::new(SupportAssistant::new(
        settings,
        knowledge,
        model,
        provider,
        Arc::new(store),
        metrics.clone(),
    ));

    info!(
        store = store_backend,
        languages = ?config.languages.languages(),
        knowledge_items = assistant.knowledge().len(),
        "assistant ready"
    );

    Ok(ApiState {
        assistant,
        metrics,
        widget: Arc::new(config.widget_config()),
        store_backend,
        limiter: IpRateLimiter::new(config.chat_rate_limit_window, config.chat_rate_limit_max),
    })
}

/// Convenience for tests and embedders that bring their own backends.
pub async fn build_app_with(
    config: AppConfig,
    model: Arc<dyn LanguageModel>,
    provider: Arc<dyn TransferDataProvider>,
    knowledge: KnowledgeBase,
) -> Result<Router> {
    let state = build_state_with(config, model, provider, knowledge).await?;
    Ok(build_router(state))
}

pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/v1/widget/config", get(widget_config))
        .route("/v1/session", post(open_session))
        .route("/v1/session/:session_id", delete(close_session))
        .route(CHAT_PATH, post(chat))
        .route("/v1/rates/overview", get(rates_overview))
        .route("/api/rates", get(proxy_rates))
        .route("/api/corridors", get(proxy_corridors))
        .route("/api/orders", get(proxy_orders))
        .layer(build_cors_layer())
        .layer(middleware::from_fn(security_headers_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(RequestBodyLimitLayer::new(16 * 1024))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .with_state(state)
}

async fn health(State(state): State<ApiState>) -> impl IntoResponse {
    let languages = state.assistant.languages();
    let payload = HealthResponse {
        status: "ok",
        timestamp_utc: Utc::now().to_rfc3339(),
        metrics: state.metrics.snapshot(),
        capabilities: HealthCapabilities {
            languages: languages
                .languages()
                .iter()
                .map(|language| language.as_code())
                .collect(),
            language_detection: !languages.is_single(),
            knowledge_items: state.assistant.knowledge().len(),
            store: state.store_backend,
        },
    };
    (StatusCode::OK, Json(payload))
}

async fn widget_config(State(state): State<ApiState>) -> impl IntoResponse {
    (StatusCode::OK, Json(state.widget.public_view()))
}

async fn open_session(
    State(state): State<ApiState>,
    body: Option<Json<OpenSessionRequest>>,
) -> Response {
    let request = body.map(|Json(request)| request).unwrap_or_default();
    let language = request
        .language
        .as_deref()
        .and_then(|code| state.assistant.languages().parse_code(code));

    match state.assistant.open_session(language).await {
        Ok(session) => (
            StatusCode::CREATED,
            Json(SessionView {
                rate_flow_step: session.rate_flow.step_name(),
                session_id: session.session_id,
                right_to_left: session.language.is_right_to_left(),
                language: session.language,
                messages: session.messages,
                expires_at: session.expires_at,
            }),
        )
            .into_response(),
        Err(err) => internal_error("session_failed", err),
    }
}

async fn close_session(
    State(state): State<ApiState>,
    Path(session_id): Path<String>,
) -> Response {
    match state.assistant.close_session(&session_id).await {
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => internal_error("session_close_failed", err),
    }
}

async fn chat(State(state): State<ApiState>, Json(request): Json<ChatRequest>) -> Response {
    let outcome = state
        .assistant
        .handle_message(request.session_id.as_deref(), &request.text)
        .await;

    match outcome {
        Ok(TurnOutcome::Replied(reply)) => (StatusCode::OK, Json(reply)).into_response(),
        Ok(TurnOutcome::Busy) => (
            StatusCode::CONFLICT,
            Json(serde_json::json!({
                "error": "session_busy",
                "message": "a previous message of this session is still being answered"
            })),
        )
            .into_response(),
        Ok(TurnOutcome::Ignored) => (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({
                "error": "empty_message",
                "message": "text must not be blank"
            })),
        )
            .into_response(),
        Err(err) => internal_error("chat_failed", err),
    }
}

async fn rates_overview(
    State(state): State<ApiState>,
    Query(query): Query<LanguageQuery>,
) -> impl IntoResponse {
    let languages = state.assistant.languages();
    let language = languages.resolve(query.lang.as_deref().and_then(|code| languages.parse_code(code)));
    let text = state.assistant.rate_overview(Some(language)).await;
    (StatusCode::OK, Json(RateOverviewResponse { language, text }))
}

async fn proxy_rates(
    State(state): State<ApiState>,
    Query(query): Query<RatePairQuery>,
) -> Response {
    let pair = query
        .primary
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .zip(
            query
                .secondary
                .as_deref()
                .map(str::trim)
                .filter(|value| !value.is_empty()),
        );

    match pair {
        Some((primary, secondary)) => {
            proxy(&state, Endpoint::Rates, &[("primary", primary), ("secondary", secondary)]).await
        }
        None => proxy(&state, Endpoint::Rates, &[]).await,
    }
}

async fn proxy_corridors(State(state): State<ApiState>) -> Response {
    proxy(&state, Endpoint::Corridors, &[]).await
}

async fn proxy_orders(State(state): State<ApiState>) -> Response {
    proxy(&state, Endpoint::Orders, &[]).await
}

/// Mirrors the upstream body; only transport, status or decode failures become a 500.
async fn proxy(state: &ApiState, endpoint: Endpoint, query: &[(&str, &str)]) -> Response {
    let what = endpoint.label();
    match state.assistant.provider().raw(endpoint, query).await {
        Ok(body) => (StatusCode::OK, Json(body)).into_response(),
        Err(err) => {
            state.metrics.inc_provider_failure(what);
            warn!(endpoint = what, error = %err, "proxied provider call failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": format!("failed to fetch {what}") })),
            )
                .into_response()
        }
    }
}

fn internal_error(code: &'static str, err: anyhow::Error) -> Response {
    error!(error = ?err, code, "request failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({
            "error": code,
            "message": "internal error, please retry"
        })),
    )
        .into_response()
}

fn build_cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

async fn rate_limit_middleware(
    State(state): State<ApiState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if request.method() == Method::OPTIONS || request.uri().path() != CHAT_PATH {
        return next.run(request).await;
    }

    let ip = request_ip(&request);
    if !state.limiter.allow(&ip) {
        let retry_after = state.limiter.retry_after(&ip).as_secs().max(1);
        let mut response = (
            StatusCode::TOO_MANY_REQUESTS,
            Json(serde_json::json!({
                "error": "rate_limited",
                "message": "rate limit exceeded for this IP"
            })),
        )
            .into_response();
        if let Ok(value) = HeaderValue::from_str(&retry_after.to_string()) {
            response.headers_mut().insert(header::RETRY_AFTER, value);
        }
        return response;
    }

    next.run(request).await
}

fn request_ip(request: &Request<Body>) -> String {
    request
        .headers()
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .map(|value| {
            value
                .split(',')
                .next()
                .unwrap_or("unknown")
                .trim()
                .to_string()
        })
        .unwrap_or_else(|| "local".to_string())
}

async fn security_headers_middleware(request: Request<Body>, next: Next) -> Response {
    let mut response = next.run(request).await;

    response.headers_mut().insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    response.headers_mut().insert(
        header::HeaderName::from_static("x-frame-options"),
        HeaderValue::from_static("DENY"),
    );
    response.headers_mut().insert(
        header::HeaderName::from_static("referrer-policy"),
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );
    response.headers_mut().insert(
        header::HeaderName::from_static("content-security-policy"),
        HeaderValue::from_static("default-src 'none'; frame-ancestors 'none'; base-uri 'none'"),
    );

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forwarded_ip_takes_first_hop() {
        let request = Request::builder()
            .uri(CHAT_PATH)
            .header("x-forwarded-for", "203.0.113.7, 10.0.0.1")
            .body(Body::empty())
            .unwrap();
        assert_eq!(request_ip(&request), "203.0.113.7");

        let direct = Request::builder().uri(CHAT_PATH).body(Body::empty()).unwrap();
        assert_eq!(request_ip(&direct), "local");
    }
}
