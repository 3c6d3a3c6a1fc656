//! Prometheus text exposition of a metric mapping

use crate::models::{MetricMapping, MetricValue};
use prometheus::{Encoder, GaugeVec, Opts, Registry, TextEncoder};
use std::collections::HashSet;
use tracing::debug;

pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

const PREFIX: &str = "srcds";

/// Entries carried as labels rather than gauges
const METADATA: &[&str] = &["ip", "port", "target", "hostname"];

pub fn render_down() -> String {
    format!("# HELP {PREFIX}_up is the gameserver reachable\n# TYPE {PREFIX}_up gauge\n{PREFIX}_up 0")
}

/// Encodes one scrape through a registry that lives only for this call
pub fn render_metrics(mapping: &MetricMapping) -> Result<String, prometheus::Error> {
    let target = mapping
        .get("target")
        .map(|v| v.to_string())
        .unwrap_or_default();
    let registry = Registry::new();
    let mut taken = HashSet::from([format!("{PREFIX}_up"), format!("{PREFIX}_info")]);

    let up = GaugeVec::new(
        Opts::new(format!("{PREFIX}_up"), "is the gameserver reachable"),
        &["target"],
    )?;
    registry.register(Box::new(up.clone()))?;
    up.with_label_values(&[target.as_str()]).set(1.0);

    if let Some(hostname) = mapping.get("hostname").and_then(MetricValue::as_text) {
        let info = GaugeVec::new(
            Opts::new(
                format!("{PREFIX}_info"),
                "static information about the gameserver",
            ),
            &["target", "hostname"],
        )?;
        registry.register(Box::new(info.clone()))?;
        info.with_label_values(&[target.as_str(), hostname]).set(1.0);
    }

    for (name, value) in mapping.iter() {
        if METADATA.contains(&name) {
            continue;
        }
        let Some(number) = value.as_f64() else {
            continue;
        };

        let metric = format!("{PREFIX}_{}", sanitize_name(name));
        // "a-b" and "a_b" end up with the same name, first one wins
        if !taken.insert(metric.clone()) {
            debug!(name, %metric, "metric name already taken, skipped");
            continue;
        }

        let gauge = GaugeVec::new(
            Opts::new(metric, format!("{name} as reported by the gameserver")),
            &["target"],
        )?;
        registry.register(Box::new(gauge.clone()))?;
        gauge.with_label_values(&[target.as_str()]).set(number);
    }

    let mut buffer = Vec::new();
    TextEncoder::new().encode(&registry.gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}

/// Anything outside `[a-zA-Z0-9_]` becomes `_`
pub fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}
