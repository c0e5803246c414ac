use serde_json::{Map, Value};

use crate::catalog::Catalog;
use crate::language::Language;
use crate::models::ProviderEnvelope;

const FROM_KEYS: &[&str] = &["from", "origin", "source_country", "from_country"];
const TO_KEYS: &[&str] = &["to", "destination", "destination_country", "to_country"];
const LINK_KEYS: &[&str] = &["link", "url"];

pub fn format_corridors(envelope: &ProviderEnvelope, language: Language, catalog: &Catalog) -> String {
    let strings = catalog.get(language);
    if !envelope.success {
        return strings.corridor_error.to_string();
    }
    let Some(items) = non_empty_items(envelope) else {
        return strings.no_data.to_string();
    };

    let mut lines = vec![strings.corridor_title.to_string()];
    for item in items {
        let from = first_text(item, FROM_KEYS).unwrap_or_else(|| "?".to_string());
        let to = first_text(item, TO_KEYS).unwrap_or_else(|| "?".to_string());
        let line = match first_text(item, LINK_KEYS) {
            Some(link) => format!(
                "• {from} → {to} ({}: {link})",
                strings.corridor_link_label
            ),
            None => format!("• {from} → {to}"),
        };
        lines.push(line);
    }
    lines.push(String::new());
    lines.push(strings.corridor_footer.to_string());

    lines.join("\n")
}

pub fn format_orders(envelope: &ProviderEnvelope, language: Language, catalog: &Catalog) -> String {
    let strings = catalog.get(language);
    if !envelope.success {
        return strings.order_error.to_string();
    }
    let Some(items) = non_empty_items(envelope) else {
        return strings.no_data.to_string();
    };

    let mut lines = vec![strings.order_title.to_string()];
    for (index, item) in items.iter().enumerate() {
        lines.push(String::new());
        lines.push(format!("#{}", index + 1));
        match item {
            Value::Object(fields) => {
                for (key, value) in fields {
                    lines.push(format!("  {key}: {}", display_value(value)));
                }
            }
            other => lines.push(format!("  {}", display_value(other))),
        }
    }

    lines.join("\n")
}

/// Rates grouped by primary currency, groups in order of first appearance.
pub fn format_rates(envelope: &ProviderEnvelope, language: Language, catalog: &Catalog) -> String {
    let strings = catalog.get(language);
    if !envelope.success {
        return strings.rate_overview_error.to_string();
    }
    let Some(items) = non_empty_items(envelope) else {
        return strings.no_data.to_string();
    };

    let mut groups: Vec<(String, Vec<String>)> = Vec::new();
    for item in items {
        let Some(fields) = item.as_object() else {
            continue;
        };
        let primary = text_field(fields, "primary").unwrap_or_else(|| "?".to_string());
        let secondary = text_field(fields, "secondary").unwrap_or_else(|| "?".to_string());
        let rate = fields
            .get("exchange_rate")
            .and_then(numeric)
            .map(format_rate_value)
            .unwrap_or_else(|| "-".to_string());
        let line = format!("  → {secondary}: {rate}");

        match groups.iter_mut().find(|(name, _)| *name == primary) {
            Some((_, lines)) => lines.push(line),
            None => groups.push((primary, vec![line])),
        }
    }

    if groups.is_empty() {
        return strings.no_data.to_string();
    }

    let mut lines = vec![strings.rate_overview_title.to_string()];
    for (primary, entries) in groups {
        lines.push(String::new());
        lines.push(format!("{primary}:"));
        lines.extend(entries);
    }

    lines.join("\n")
}

/// At most four decimals, trailing zeros dropped.
pub fn format_rate_value(rate: f64) -> String {
    let fixed = format!("{rate:.4}");
    let trimmed = fixed.trim_end_matches('0').trim_end_matches('.');
    if trimmed.is_empty() || trimmed == "-" {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

fn non_empty_items(envelope: &ProviderEnvelope) -> Option<&Vec<Value>> {
    envelope.items().filter(|items| !items.is_empty())
}

fn first_text(item: &Value, keys: &[&str]) -> Option<String> {
    let fields = item.as_object()?;
    keys.iter().find_map(|key| text_field(fields, key))
}

fn text_field(fields: &Map<String, Value>, key: &str) -> Option<String> {
    match fields.get(key)? {
        Value::String(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::Null => "-".to_string(),
        Value::String(text) => text.clone(),
        Value::Bool(flag) => flag.to_string(),
        Value::Number(number) => number.to_string(),
        other => other.to_string(),
    }
}
