use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use hakach_core::ProviderEnvelope;
use parking_lot::Mutex;
use reqwest::Client;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

pub const DEFAULT_PROVIDER_BASE_URL: &str = "https://hakach.net/api/gemini/";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Corridors,
    Orders,
    Rates,
}

impl Endpoint {
    pub fn path(self) -> &'static str {
        match self {
            Self::Corridors => "corridors.php",
            Self::Orders => "orders.php",
            Self::Rates => "rates.php",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Corridors => "corridors",
            Self::Orders => "orders",
            Self::Rates => "rates",
        }
    }
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("invalid provider url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("provider request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("provider answered HTTP {0}")]
    Status(u16),
    #[error("provider body is not JSON: {0}")]
    Decode(String),
}

/// Source of corridor, order and exchange-rate data. The typed calls never fail:
/// problems come back as a failed envelope. `raw` hands back the upstream body
/// untouched for callers that mirror it.
#[async_trait]
pub trait TransferDataProvider: Send + Sync {
    async fn raw(&self, endpoint: Endpoint, query: &[(&str, &str)]) -> Result<Value, ProviderError>;
    async fn corridors(&self) -> ProviderEnvelope;
    async fn orders(&self) -> ProviderEnvelope;
    async fn rate(&self, primary: &str, secondary: &str) -> ProviderEnvelope;
    async fn rates(&self) -> ProviderEnvelope;
}

#[derive(Debug, Clone)]
pub struct HttpDataProvider {
    client: Client,
    base_url: Url,
}

impl HttpDataProvider {
    pub fn new(base_url: &str) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(6))
            .timeout(Duration::from_secs(10))
            .build()?;
        Self::with_client(client, base_url)
    }

    pub fn with_client(client: Client, base_url: &str) -> Result<Self, ProviderError> {
        let trimmed = base_url.trim();
        // without the trailing slash `join` would replace the last path segment
        let normalized = if trimmed.ends_with('/') {
            trimmed.to_string()
        } else {
            format!("{trimmed}/")
        };
        Ok(Self {
            client,
            base_url: Url::parse(&normalized)?,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn endpoint_url(&self, endpoint: Endpoint, query: &[(&str, &str)]) -> Result<Url, ProviderError> {
        let mut url = self.base_url.join(endpoint.path())?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query.iter().copied());
        }
        Ok(url)
    }

    pub async fn fetch_raw(&self, endpoint: Endpoint, query: &[(&str, &str)]) -> Result<Value, ProviderError> {
        let url = self.endpoint_url(endpoint, query)?;
        debug!(url = %url, "fetching provider data");

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Status(status.as_u16()));
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|err| ProviderError::Decode(err.to_string()))
    }

    async fn envelope(&self, endpoint: Endpoint, query: &[(&str, &str)]) -> ProviderEnvelope {
        match self.fetch_raw(endpoint, query).await {
            Ok(body) => into_envelope(body),
            Err(err) => {
                warn!(endpoint = endpoint.label(), error = %err, "provider call failed");
                ProviderEnvelope::failure(err.to_string())
            }
        }
    }
}

#[async_trait]
impl TransferDataProvider for HttpDataProvider {
    async fn raw(&self, endpoint: Endpoint, query: &[(&str, &str)]) -> Result<Value, ProviderError> {
        self.fetch_raw(endpoint, query).await
    }

    async fn corridors(&self) -> ProviderEnvelope {
        self.envelope(Endpoint::Corridors, &[]).await
    }

    async fn orders(&self) -> ProviderEnvelope {
        self.envelope(Endpoint::Orders, &[]).await
    }

    async fn rate(&self, primary: &str, secondary: &str) -> ProviderEnvelope {
        self.envelope(Endpoint::Rates, &[("primary", primary), ("secondary", secondary)])
            .await
    }

    async fn rates(&self) -> ProviderEnvelope {
        self.envelope(Endpoint::Rates, &[]).await
    }
}

/// Upstream services either wrap their payload in an envelope or return it bare.
pub fn into_envelope(body: Value) -> ProviderEnvelope {
    let is_envelope = body
        .as_object()
        .is_some_and(|fields| matches!(fields.get("success"), Some(Value::Bool(_))));
    if !is_envelope {
        return ProviderEnvelope::ok(body);
    }

    match serde_json::from_value::<ProviderEnvelope>(body) {
        Ok(envelope) if envelope.success => envelope,
        Ok(envelope) => ProviderEnvelope::failure(
            envelope
                .error
                .unwrap_or_else(|| "provider reported a failure".to_string()),
        ),
        Err(err) => ProviderEnvelope::failure(err.to_string()),
    }
}

/// Serves fixed envelopes and records what was asked of it.
#[derive(Debug)]
pub struct FixtureProvider {
    corridors: ProviderEnvelope,
    orders: ProviderEnvelope,
    rates: ProviderEnvelope,
    rate: Mutex<Option<ProviderEnvelope>>,
    failing: Vec<Endpoint>,
    calls: AtomicUsize,
    rate_requests: Mutex<Vec<(String, String)>>,
}

impl Default for FixtureProvider {
    fn default() -> Self {
        let empty = ProviderEnvelope::ok(Value::Array(Vec::new()));
        Self {
            corridors: empty.clone(),
            orders: empty.clone(),
            rates: empty,
            rate: Mutex::new(None),
            failing: Vec::new(),
            calls: AtomicUsize::new(0),
            rate_requests: Mutex::new(Vec::new()),
        }
    }
}

impl FixtureProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_corridors(mut self, envelope: ProviderEnvelope) -> Self {
        self.corridors = envelope;
        self
    }

    pub fn with_orders(mut self, envelope: ProviderEnvelope) -> Self {
        self.orders = envelope;
        self
    }

    pub fn with_rates(mut self, envelope: ProviderEnvelope) -> Self {
        self.rates = envelope;
        self
    }

    /// Answer for single-pair lookups; without one the pair is not found.
    pub fn with_rate(self, envelope: ProviderEnvelope) -> Self {
        *self.rate.lock() = Some(envelope);
        self
    }

    /// Makes `endpoint` behave like an unreachable upstream.
    pub fn failing(mut self, endpoint: Endpoint) -> Self {
        self.failing.push(endpoint);
        self
    }

    fn unavailable(&self, endpoint: Endpoint) -> Option<ProviderEnvelope> {
        self.failing
            .contains(&endpoint)
            .then(|| ProviderEnvelope::failure(ProviderError::Status(503).to_string()))
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn rate_requests(&self) -> Vec<(String, String)> {
        self.rate_requests.lock().clone()
    }
}

#[async_trait]
impl TransferDataProvider for FixtureProvider {
    async fn raw(&self, endpoint: Endpoint, query: &[(&str, &str)]) -> Result<Value, ProviderError> {
        let lookup = |name: &str| {
            query
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| *value)
        };
        let envelope = match (endpoint, lookup("primary"), lookup("secondary")) {
            (Endpoint::Corridors, _, _) => self.corridors().await,
            (Endpoint::Orders, _, _) => self.orders().await,
            (Endpoint::Rates, Some(primary), Some(secondary)) => self.rate(primary, secondary).await,
            (Endpoint::Rates, _, _) => self.rates().await,
        };
        if self.failing.contains(&endpoint) {
            return Err(ProviderError::Status(503));
        }
        serde_json::to_value(envelope).map_err(|err| ProviderError::Decode(err.to_string()))
    }

    async fn corridors(&self) -> ProviderEnvelope {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.unavailable(Endpoint::Corridors)
            .unwrap_or_else(|| self.corridors.clone())
    }

    async fn orders(&self) -> ProviderEnvelope {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.unavailable(Endpoint::Orders)
            .unwrap_or_else(|| self.orders.clone())
    }

    async fn rate(&self, primary: &str, secondary: &str) -> ProviderEnvelope {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.rate_requests
            .lock()
            .push((primary.to_string(), secondary.to_string()));
        if let Some(failed) = self.unavailable(Endpoint::Rates) {
            return failed;
        }
        self.rate
            .lock()
            .clone()
            .unwrap_or_else(|| ProviderEnvelope::failure(format!("no rate for {primary}/{secondary}")))
    }

    async fn rates(&self) -> ProviderEnvelope {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.unavailable(Endpoint::Rates)
            .unwrap_or_else(|| self.rates.clone())
    }
}
