//! The two-question exchange-rate dialogue as a pure transition function.
//!
//! `Idle -> AwaitingOrigin -> AwaitingDestination -> Idle`. An answer that
//! does not name a known country re-prompts at the same step. Reaching the
//! destination step's success edge ends the flow whatever the lookup returns.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::catalog::Catalog;
use crate::countries::CountryTable;
use crate::formatter::format_rate_value;
use crate::language::Language;
use crate::models::{CountryMatch, ProviderEnvelope, RateFlow};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateQuery {
    pub language: Language,
    pub origin: CountryMatch,
    pub destination: CountryMatch,
}

impl RateQuery {
    pub fn primary(&self) -> &str {
        &self.origin.currency
    }

    pub fn secondary(&self) -> &str {
        &self.destination.currency
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowOutput {
    Say(String),
    LookupRate(RateQuery),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub next: RateFlow,
    pub output: FlowOutput,
}

pub fn start(language: Language, catalog: &Catalog) -> (RateFlow, String) {
    (
        RateFlow::AwaitingOrigin { language },
        catalog.get(language).ask_origin.to_string(),
    )
}

/// `None` when no flow is active.
pub fn advance(
    flow: &RateFlow,
    input: &str,
    countries: &CountryTable,
    catalog: &Catalog,
) -> Option<Transition> {
    match flow {
        RateFlow::Idle => None,
        RateFlow::AwaitingOrigin { language } => {
            let transition = match countries.resolve(input) {
                Some(origin) => Transition {
                    output: FlowOutput::Say(catalog.ask_destination(*language, &origin.name)),
                    next: RateFlow::AwaitingDestination {
                        language: *language,
                        origin,
                    },
                },
                None => not_recognized(flow, *language, catalog),
            };
            Some(transition)
        }
        RateFlow::AwaitingDestination { language, origin } => {
            let transition = match countries.resolve(input) {
                Some(destination) => Transition {
                    next: RateFlow::Idle,
                    output: FlowOutput::LookupRate(RateQuery {
                        language: *language,
                        origin: origin.clone(),
                        destination,
                    }),
                },
                None => not_recognized(flow, *language, catalog),
            };
            Some(transition)
        }
    }
}

/// Turns the rate provider's answer into the closing message of the flow.
pub fn complete_lookup(query: &RateQuery, envelope: &ProviderEnvelope, catalog: &Catalog) -> String {
    match extract_exchange_rate(envelope) {
        Some(rate) => catalog.rate_sentence(
            query.language,
            &query.origin.name,
            &query.destination.name,
            query.primary(),
            query.secondary(),
            &format_rate_value(rate),
        ),
        None => catalog.get(query.language).rate_error.to_string(),
    }
}

fn not_recognized(flow: &RateFlow, language: Language, catalog: &Catalog) -> Transition {
    Transition {
        next: flow.clone(),
        output: FlowOutput::Say(catalog.get(language).country_not_recognized.to_string()),
    }
}

fn extract_exchange_rate(envelope: &ProviderEnvelope) -> Option<f64> {
    if !envelope.success {
        return None;
    }

    let data = envelope.data.as_ref()?;
    let record = match data {
        Value::Array(items) => items.first()?,
        other => other,
    };

    let rate = match record.get("exchange_rate")? {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    };
    rate.filter(|rate| rate.is_finite() && *rate > 0.0)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn fixtures() -> (CountryTable, Catalog) {
        (CountryTable::builtin(), Catalog::builtin())
    }

    #[test]
    fn idle_flow_does_not_consume_input() {
        let (countries, catalog) = fixtures();
        assert!(advance(&RateFlow::Idle, "France", &countries, &catalog).is_none());
    }

    #[test]
    fn unknown_origin_reprompts_at_the_same_step() {
        let (countries, catalog) = fixtures();
        let (flow, _) = start(Language::En, &catalog);

        let transition = advance(&flow, "Narnia", &countries, &catalog).unwrap();

        assert_eq!(transition.next, flow);
        assert_eq!(
            transition.output,
            FlowOutput::Say(catalog.get(Language::En).country_not_recognized.to_string())
        );
    }

    #[test]
    fn full_flow_issues_one_lookup_and_returns_to_idle() {
        let (countries, catalog) = fixtures();
        let (flow, prompt) = start(Language::En, &catalog);
        assert_eq!(prompt, catalog.get(Language::En).ask_origin);

        let step = advance(&flow, "France", &countries, &catalog).unwrap();
        assert!(matches!(step.next, RateFlow::AwaitingDestination { .. }));
        match &step.output {
            FlowOutput::Say(text) => assert!(text.contains("France")),
            other => panic!("unexpected output {other:?}"),
        }

        let unknown = advance(&step.next, "Mordor", &countries, &catalog).unwrap();
        assert_eq!(unknown.next, step.next);

        let done = advance(&step.next, "Nigeria", &countries, &catalog).unwrap();
        assert_eq!(done.next, RateFlow::Idle);
        let FlowOutput::LookupRate(query) = done.output else {
            panic!("expected a rate lookup");
        };
        assert_eq!(query.primary(), "EUR");
        assert_eq!(query.secondary(), "NGN");
        assert_eq!(query.language, Language::En);
    }

    #[test]
    fn flow_keeps_the_language_it_started_in() {
        let (countries, catalog) = fixtures();
        let (flow, _) = start(Language::Fr, &catalog);
        let step = advance(&flow, "Germany", &countries, &catalog).unwrap();
        assert_eq!(step.next.language(), Some(Language::Fr));
    }

    #[test]
    fn lookup_renders_rate_sentence() {
        let (countries, catalog) = fixtures();
        let query = RateQuery {
            language: Language::En,
            origin: countries.resolve("France").unwrap(),
            destination: countries.resolve("Nigeria").unwrap(),
        };
        let envelope = ProviderEnvelope::ok(json!({ "exchange_rate": 1650.25 }));

        let text = complete_lookup(&query, &envelope, &catalog);

        assert!(text.contains("1 EUR = 1650.25 NGN"), "{text}");
    }

    #[test]
    fn lookup_accepts_numeric_strings() {
        let (countries, catalog) = fixtures();
        let query = RateQuery {
            language: Language::En,
            origin: countries.resolve("France").unwrap(),
            destination: countries.resolve("Senegal").unwrap(),
        };
        let envelope = ProviderEnvelope::ok(json!([{ "exchange_rate": "655.957" }]));
        assert!(complete_lookup(&query, &envelope, &catalog).contains("655.957"));
    }

    #[test]
    fn failed_or_missing_rate_yields_rate_error() {
        let (countries, catalog) = fixtures();
        let query = RateQuery {
            language: Language::De,
            origin: countries.resolve("France").unwrap(),
            destination: countries.resolve("Nigeria").unwrap(),
        };
        let expected = catalog.get(Language::De).rate_error;

        let failed = ProviderEnvelope::failure("timeout");
        assert_eq!(complete_lookup(&query, &failed, &catalog), expected);

        let missing = ProviderEnvelope::ok(json!({ "primary": "EUR" }));
        assert_eq!(complete_lookup(&query, &missing, &catalog), expected);
    }
}
