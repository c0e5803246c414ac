use std::collections::HashMap;
use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::extract::Query;
use axum::http::{Request, StatusCode};
use axum::{routing, Json, Router};
use hakach_agents::{Endpoint, FixtureProvider, HttpDataProvider};
use hakach_api::{build_app_with, AppConfig};
use hakach_core::{KnowledgeBase, KnowledgeItem, Language, LanguageSet, ProviderEnvelope};
use hakach_llm::ScriptedModel;
use serde_json::{json, Value};
use tower::ServiceExt;

fn english_config() -> AppConfig {
    AppConfig {
        languages: LanguageSet::single(Language::En),
        ..AppConfig::default()
    }
}

fn knowledge() -> KnowledgeBase {
    KnowledgeBase::new(vec![KnowledgeItem {
        question: "How long does a transfer take?".to_string(),
        answer: "Most transfers arrive within minutes.".to_string(),
    }])
}

async fn app_with(config: AppConfig, model: ScriptedModel, provider: FixtureProvider) -> Router {
    build_app_with(config, Arc::new(model), Arc::new(provider), knowledge())
        .await
        .expect("app should build")
}

async fn app() -> Router {
    app_with(english_config(), ScriptedModel::offline(), FixtureProvider::new()).await
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}

async fn open_session(app: &Router) -> String {
    let response = app
        .clone()
        .oneshot(post_json("/v1/session", json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    json_body(response).await["session_id"].as_str().unwrap().to_string()
}

async fn chat(app: &Router, session_id: &str, text: &str) -> Value {
    let response = app
        .clone()
        .oneshot(post_json(
            "/v1/chat",
            json!({ "session_id": session_id, "text": text }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    json_body(response).await
}

#[tokio::test]
async fn health_reports_capabilities() {
    let response = app().await.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("x-content-type-options").unwrap(),
        "nosniff"
    );

    let parsed = json_body(response).await;
    assert_eq!(parsed["status"], "ok");
    assert_eq!(parsed["capabilities"]["languages"], json!(["en"]));
    assert_eq!(parsed["capabilities"]["language_detection"], false);
    assert_eq!(parsed["capabilities"]["knowledge_items"], 1);
    assert_eq!(parsed["capabilities"]["store"], "memory");
}

#[tokio::test]
async fn widget_config_never_exposes_api_key() {
    let mut config = english_config();
    config.gemini.api_key = "secret-key".to_string();
    config.widget_title = Some("Help".to_string());
    let app = app_with(config, ScriptedModel::offline(), FixtureProvider::new()).await;

    let response = app.oneshot(get("/v1/widget/config")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let parsed = json_body(response).await;
    assert_eq!(parsed["apiKey"], "");
    assert_eq!(parsed["widgetTitle"], "Help");
    assert_eq!(parsed["defaultLanguage"], "en");
    assert_eq!(parsed["position"], "bottom-right");
    assert!(!parsed.to_string().contains("secret-key"));
}

#[tokio::test]
async fn open_session_returns_welcome() {
    let response = app()
        .await
        .oneshot(post_json("/v1/session", json!({ "language": "en" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let parsed = json_body(response).await;
    assert_eq!(parsed["language"], "en");
    assert_eq!(parsed["right_to_left"], false);
    assert_eq!(parsed["rate_flow_step"], "idle");
    assert_eq!(parsed["messages"].as_array().unwrap().len(), 1);
    assert_eq!(parsed["messages"][0]["is_user"], false);
}

#[tokio::test]
async fn chat_walks_the_rate_flow() {
    let provider = FixtureProvider::new()
        .with_rate(ProviderEnvelope::ok(json!({ "exchange_rate": 1650.25 })));
    let app = app_with(english_config(), ScriptedModel::offline(), provider).await;
    let session_id = open_session(&app).await;

    let first = chat(&app, &session_id, "what is your exchange rate").await;
    assert_eq!(first["intent"], "rate");
    assert_eq!(first["rate_flow_step"], "awaiting_origin");
    assert_eq!(first["messages"][0]["is_user"], true);

    let second = chat(&app, &session_id, "France").await;
    assert_eq!(second["rate_flow_step"], "awaiting_destination");

    let third = chat(&app, &session_id, "Nigeria").await;
    assert_eq!(third["rate_flow_step"], "idle");
    assert!(third["messages"][1]["text"]
        .as_str()
        .unwrap()
        .contains("1 EUR = 1650.25 NGN"));
}

#[tokio::test]
async fn chat_falls_back_to_language_model() {
    let model = ScriptedModel::new(["  Sure, sign up from the app.\n"]);
    let app = app_with(english_config(), model, FixtureProvider::new()).await;
    let session_id = open_session(&app).await;

    let reply = chat(&app, &session_id, "How do I create an account?").await;
    assert_eq!(reply["intent"], "none");
    assert_eq!(reply["messages"][1]["text"], "Sure, sign up from the app.");
}

#[tokio::test]
async fn blank_message_is_rejected() {
    let app = app().await;
    let session_id = open_session(&app).await;

    let response = app
        .oneshot(post_json(
            "/v1/chat",
            json!({ "session_id": session_id, "text": "   " }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"], "empty_message");
}

#[tokio::test]
async fn chat_without_session_starts_one() {
    let response = app()
        .await
        .oneshot(post_json("/v1/chat", json!({ "text": "show me your corridors" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let parsed = json_body(response).await;
    assert!(!parsed["session_id"].as_str().unwrap().is_empty());
    assert_eq!(parsed["intent"], "corridor");
}

#[tokio::test]
async fn closing_a_session_returns_no_content() {
    let app = app().await;
    let session_id = open_session(&app).await;

    let response = app
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/v1/session/{session_id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

/// Serves fixed bodies at the upstream php paths on an ephemeral port.
async fn spawn_upstream() -> String {
    let upstream = Router::new()
        .route(
            "/corridors.php",
            routing::get(|| async { Json(json!({ "success": false, "error": "maintenance" })) }),
        )
        .route(
            "/orders.php",
            routing::get(|| async { Json(json!([{ "id": 1 }])) }),
        )
        .route(
            "/rates.php",
            routing::get(|Query(params): Query<HashMap<String, String>>| async move {
                match (params.get("primary"), params.get("secondary")) {
                    (Some(primary), Some(secondary)) => Json(json!({
                        "success": true,
                        "data": { "primary": primary, "secondary": secondary, "exchange_rate": 655.957 },
                        "updated_at": "2026-10-18T08:00:00Z"
                    })),
                    _ => Json(json!({
                        "success": true,
                        "data": [{ "primary": "EUR", "secondary": "XOF", "exchange_rate": 655.957 }],
                        "updated_at": "2026-10-18T08:00:00Z"
                    })),
                }
            }),
        )
        .route(
            "/broken/orders.php",
            routing::get(|| async { StatusCode::BAD_GATEWAY }),
        );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, upstream).await.unwrap();
    });
    format!("http://{addr}/")
}

async fn app_behind_upstream(base_url: &str) -> Router {
    let provider = HttpDataProvider::new(base_url).unwrap();
    build_app_with(
        english_config(),
        Arc::new(ScriptedModel::offline()),
        Arc::new(provider),
        knowledge(),
    )
    .await
    .expect("app should build")
}

#[tokio::test]
async fn proxy_routes_mirror_upstream_bodies() {
    let base_url = spawn_upstream().await;
    let app = app_behind_upstream(&base_url).await;

    let response = app.clone().oneshot(get("/api/corridors")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        json_body(response).await,
        json!({ "success": false, "error": "maintenance" })
    );

    let response = app.clone().oneshot(get("/api/orders")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, json!([{ "id": 1 }]));

    let response = app.clone().oneshot(get("/api/rates")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let parsed = json_body(response).await;
    assert_eq!(parsed["updated_at"], "2026-10-18T08:00:00Z");
    assert_eq!(parsed["data"][0]["secondary"], "XOF");

    let response = app
        .oneshot(get("/api/rates?primary=EUR&secondary=XOF"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let parsed = json_body(response).await;
    assert_eq!(parsed["data"]["primary"], "EUR");
    assert_eq!(parsed["data"]["exchange_rate"], 655.957);
}

#[tokio::test]
async fn proxy_maps_upstream_errors_to_server_error() {
    let base_url = spawn_upstream().await;
    let app = app_behind_upstream(&format!("{base_url}broken")).await;

    let response = app.oneshot(get("/api/orders")).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json_body(response).await["error"], "failed to fetch orders");
}

#[tokio::test]
async fn proxy_failure_maps_to_server_error() {
    let provider = FixtureProvider::new().failing(Endpoint::Orders);
    let app = app_with(english_config(), ScriptedModel::offline(), provider).await;

    let response = app.oneshot(get("/api/orders")).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json_body(response).await["error"], "failed to fetch orders");
}

#[tokio::test]
async fn rates_overview_is_localized_text() {
    let provider = FixtureProvider::new().with_rates(ProviderEnvelope::ok(json!([
        { "primary": "EUR", "secondary": "XOF", "exchange_rate": 655.957 }
    ])));
    let app = app_with(english_config(), ScriptedModel::offline(), provider).await;

    let response = app.oneshot(get("/v1/rates/overview?lang=en")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let parsed = json_body(response).await;
    assert_eq!(parsed["language"], "en");
    assert!(parsed["text"].as_str().unwrap().contains("XOF: 655.957"));
}

#[tokio::test]
async fn chat_is_rate_limited_per_client() {
    let config = AppConfig {
        chat_rate_limit_max: 1,
        ..english_config()
    };
    let app = app_with(config, ScriptedModel::offline(), FixtureProvider::new()).await;

    let first = app
        .clone()
        .oneshot(post_json("/v1/chat", json!({ "text": "corridors" })))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    let second = app
        .oneshot(post_json("/v1/chat", json!({ "text": "corridors" })))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(second.headers().get("retry-after").is_some());
}

#[tokio::test]
async fn cors_allows_any_origin() {
    let response = app()
        .await
        .oneshot(
            Request::builder()
                .uri("/health")
                .header("origin", "https://shop.example")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(
        response.headers().get("access-control-allow-origin").unwrap(),
        "*"
    );
}
