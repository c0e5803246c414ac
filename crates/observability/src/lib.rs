use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::OnceCell;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

static TRACING_INIT: OnceCell<()> = OnceCell::new();

/// Turn category as seen by the metrics layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnKind {
    Corridor,
    Order,
    RateFlow,
    Fallback,
}

impl TurnKind {
    fn label(self) -> &'static str {
        match self {
            Self::Corridor => "corridor",
            Self::Order => "order",
            Self::RateFlow => "rate_flow",
            Self::Fallback => "fallback",
        }
    }
}

#[derive(Debug, Default)]
pub struct AppMetrics {
    requests_total: AtomicU64,
    busy_rejections_total: AtomicU64,
    corridor_turns_total: AtomicU64,
    order_turns_total: AtomicU64,
    rate_flow_turns_total: AtomicU64,
    fallback_total: AtomicU64,
    provider_failures_total: AtomicU64,
    model_failures_total: AtomicU64,
    total_latency_millis: AtomicU64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub requests_total: u64,
    pub busy_rejections_total: u64,
    pub corridor_turns_total: u64,
    pub order_turns_total: u64,
    pub rate_flow_turns_total: u64,
    pub fallback_total: u64,
    pub provider_failures_total: u64,
    pub model_failures_total: u64,
    pub avg_latency_millis: f64,
}

impl AppMetrics {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn inc_request(&self) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("hakach_requests_total").increment(1);
    }

    pub fn inc_busy_rejection(&self) {
        self.busy_rejections_total.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("hakach_busy_rejections_total").increment(1);
    }

    pub fn record_turn(&self, kind: TurnKind) {
        let counter = match kind {
            TurnKind::Corridor => &self.corridor_turns_total,
            TurnKind::Order => &self.order_turns_total,
            TurnKind::RateFlow => &self.rate_flow_turns_total,
            TurnKind::Fallback => &self.fallback_total,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("hakach_turns_total", "kind" => kind.label()).increment(1);
    }

    pub fn inc_provider_failure(&self, endpoint: &'static str) {
        self.provider_failures_total.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("hakach_provider_failures_total", "endpoint" => endpoint).increment(1);
    }

    pub fn inc_model_failure(&self) {
        self.model_failures_total.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("hakach_model_failures_total").increment(1);
    }

    pub fn observe_latency(&self, duration: Duration) {
        self.total_latency_millis
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
        metrics::histogram!("hakach_turn_latency_seconds").record(duration.as_secs_f64());
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let requests = self.requests_total.load(Ordering::Relaxed);
        let latency = self.total_latency_millis.load(Ordering::Relaxed);

        MetricsSnapshot {
            requests_total: requests,
            busy_rejections_total: self.busy_rejections_total.load(Ordering::Relaxed),
            corridor_turns_total: self.corridor_turns_total.load(Ordering::Relaxed),
            order_turns_total: self.order_turns_total.load(Ordering::Relaxed),
            rate_flow_turns_total: self.rate_flow_turns_total.load(Ordering::Relaxed),
            fallback_total: self.fallback_total.load(Ordering::Relaxed),
            provider_failures_total: self.provider_failures_total.load(Ordering::Relaxed),
            model_failures_total: self.model_failures_total.load(Ordering::Relaxed),
            avg_latency_millis: if requests == 0 {
                0.0
            } else {
                latency as f64 / requests as f64
            },
        }
    }
}

pub fn init_tracing(service_name: &str) {
    TRACING_INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}=info,hakach_api=info,hakach_agents=info,hakach_llm=info,hakach_knowledge=info,tower_http=info",
                service_name
            ))
        });

        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(true)
            .with_span_list(true)
            .init();
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_counters() {
        let metrics = AppMetrics::default();
        metrics.inc_request();
        metrics.inc_request();
        metrics.record_turn(TurnKind::Corridor);
        metrics.record_turn(TurnKind::Fallback);
        metrics.inc_busy_rejection();
        metrics.inc_provider_failure("rates");
        metrics.observe_latency(Duration::from_millis(30));
        metrics.observe_latency(Duration::from_millis(10));

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.requests_total, 2);
        assert_eq!(snapshot.corridor_turns_total, 1);
        assert_eq!(snapshot.fallback_total, 1);
        assert_eq!(snapshot.busy_rejections_total, 1);
        assert_eq!(snapshot.provider_failures_total, 1);
        assert_eq!(snapshot.avg_latency_millis, 20.0);
    }
}
