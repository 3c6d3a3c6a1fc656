//! Picks the game server a scrape should query
//!
//! Multi-target mode reads `target=<address>:<port>` and `password=<pw>`
//! from the request. Single-server mode uses the configured target and
//! refuses any override.

use crate::models::Target;
use std::collections::HashMap;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TargetError {
    #[error("'target' and 'password' not allowed in single server mode.")]
    OverrideInSingleServerMode,
    #[error("no target given")]
    MissingTarget,
    #[error("target {0} is not a valid target specification")]
    InvalidTarget(String),
    #[error("no password given")]
    MissingPassword,
}

pub fn resolve_target(
    single_server: Option<&Target>,
    params: &HashMap<String, String>,
) -> Result<Target, TargetError> {
    if let Some(target) = single_server {
        if params.contains_key("target") || params.contains_key("password") {
            return Err(TargetError::OverrideInSingleServerMode);
        }
        return Ok(target.clone());
    }

    let spec = params.get("target").ok_or(TargetError::MissingTarget)?;
    let (address, port) = parse_target_spec(spec)?;

    let password = match params.get("password") {
        Some(pw) if !pw.is_empty() => pw.clone(),
        _ => return Err(TargetError::MissingPassword),
    };

    Ok(Target {
        address,
        port,
        password,
    })
}

/// `host:port`, `1.2.3.4:27015` or `[::1]:27015`
pub fn parse_target_spec(spec: &str) -> Result<(String, u16), TargetError> {
    let invalid = || TargetError::InvalidTarget(spec.to_string());

    let (host, port) = spec.trim().rsplit_once(':').ok_or_else(invalid)?;
    let host = host.trim_start_matches('[').trim_end_matches(']');
    if host.is_empty() {
        return Err(invalid());
    }

    match port.parse::<u16>() {
        Ok(port) if port != 0 => Ok((host.to_string(), port)),
        _ => Err(invalid()),
    }
}
