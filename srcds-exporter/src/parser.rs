//! Parsing of the `status` and `stats` console outputs
//!
//! Every mod formats these a little differently:
//! - `stats` is two whitespace separated lines (names, then values)
//! - `status` is `key: value` header lines, a blank line, then the player table
//!   (Fistful of Frags drops the blank line)

use crate::error::ScrapeError;
use crate::models::MetricMapping;
use once_cell::sync::Lazy;
use regex::Regex;

/// `stats` column names that get a stable metric name
const STATS_RENAMES: &[(&str, &str)] = &[
    ("In", "NetIn"),
    ("In_(KB/s)", "NetIn"),
    ("Out", "NetOut"),
    ("Out_(KB/s)", "NetOut"),
    ("+-ms", "varms"),
    ("~tick", "vartick"),
    ("Svms", "svarms"),
    ("Map_changes", "Maps"),
];

// "0 humans, 0 bots (16/0 max) (hibernating)"   CS:GO
// "0 (16 max)"                                   Garry's Mod
// "12 humans, 0 bots (16 max)"                   most others
static PLAYERS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?P<players>\d+)\s+(?:humans,\s+)?(?:(?P<bots>\d+)\s+bots\s+)?\((?P<max_players>\d+)(?:/\d)? max\)",
    )
    .expect("player count pattern is valid")
});

/// Status first, then stats, into one mapping
pub fn parse_query(status: &str, stats: &str, mapping: &mut MetricMapping) -> Result<(), ScrapeError> {
    parse_status(status, mapping);
    parse_stats(stats, mapping)
}

pub fn rename_stat(name: &str) -> &str {
    STATS_RENAMES
        .iter()
        .find(|(from, _)| *from == name)
        .map(|(_, to)| *to)
        .unwrap_or(name)
}

pub fn parse_stats(text: &str, mapping: &mut MetricMapping) -> Result<(), ScrapeError> {
    let mut lines = text.lines().filter(|line| !line.trim().is_empty());
    let (Some(header), Some(values)) = (lines.next(), lines.next()) else {
        return Err(ScrapeError::MalformedResponse(format!(
            "stats output needs a header and a value line, got {text:?}"
        )));
    };

    let names: Vec<&str> = header.split_whitespace().collect();
    let values = values
        .split_whitespace()
        .map(|raw| {
            raw.parse::<f64>().map_err(|_| {
                ScrapeError::MalformedResponse(format!("stats value {raw:?} is not a number"))
            })
        })
        .collect::<Result<Vec<f64>, _>>()?;

    // Paired by position, extra names or values are ignored
    for (name, value) in names.into_iter().zip(values) {
        mapping.insert(rename_stat(name), value);
    }
    Ok(())
}

pub fn parse_status(text: &str, mapping: &mut MetricMapping) {
    for line in text.lines() {
        if line.trim().is_empty() {
            break;
        }
        let Some((key, value)) = line.split_once(':') else {
            break;
        };

        match key.trim() {
            "hostname" => mapping.insert("hostname", value.trim()),
            "players" => parse_player_count(value.trim(), mapping),
            _ => {}
        }
    }
}

/// Unrecognised layouts are dropped silently
pub fn parse_player_count(value: &str, mapping: &mut MetricMapping) {
    let Some(caps) = PLAYERS_RE.captures(value) else {
        tracing::debug!(value, "unrecognised player count layout");
        return;
    };

    for group in ["players", "bots", "max_players"] {
        if let Some(count) = caps.name(group).and_then(|m| m.as_str().parse::<i64>().ok()) {
            mapping.insert(group, count);
        }
    }
}
