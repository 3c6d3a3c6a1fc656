//! Maps a scrape result to what the caller gets to see
//!
//! Precedence: rejected target, then down (timeouts and anything
//! unclassified), then refused, then success.

use crate::error::ScrapeError;
use crate::models::MetricMapping;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Bad target specification, nothing was sent on the network
    Rejected(String),
    /// Only `up = 0`, never partial metrics
    Down,
    Refused,
    Up(MetricMapping),
}

pub fn classify(result: Result<MetricMapping, ScrapeError>) -> Outcome {
    match result {
        Ok(mapping) => Outcome::Up(mapping),
        Err(ScrapeError::TargetSpecificationInvalid(detail)) => {
            info!("received invalid target specification: {detail}");
            Outcome::Rejected(detail)
        }
        Err(ScrapeError::QueryTimeout(detail)) => {
            info!("a timeout error occurred during the RCON request: {detail}");
            Outcome::Down
        }
        Err(ScrapeError::ConnectionRefused(peer)) => {
            info!("connection was refused by the gameserver {peer}");
            Outcome::Refused
        }
        Err(
            e @ (ScrapeError::AuthenticationFailed
            | ScrapeError::ProtocolError(_)
            | ScrapeError::MalformedResponse(_)
            | ScrapeError::QueryFailed(_)),
        ) => {
            warn!("scrape failed: {e}");
            Outcome::Down
        }
    }
}
