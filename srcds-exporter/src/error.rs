//! Error taxonomy for one scrape
//!
//! Two layers:
//! - `RconError`: what the protocol client can observe on the wire
//! - `ScrapeError`: what a whole scrape reports to the outcome classifier

use std::io;

/// Failures raised by the RCON protocol client
#[derive(Debug, thiserror::Error)]
pub enum RconError {
    #[error("connection refused by {0}")]
    ConnectionRefused(String),
    #[error("timed out while {0}")]
    Timeout(&'static str),
    #[error("authentication rejected by server")]
    AuthenticationFailed,
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("connection closed by peer")]
    ConnectionClosed,
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl RconError {
    /// Worth another connect+authenticate attempt?
    pub fn is_transient(&self) -> bool {
        !matches!(self, RconError::AuthenticationFailed)
    }
}

/// Failures of a complete scrape (query + parse)
#[derive(Debug, thiserror::Error)]
pub enum ScrapeError {
    #[error("target specification is invalid: {0}")]
    TargetSpecificationInvalid(String),
    #[error("connection refused: {0}")]
    ConnectionRefused(String),
    #[error("authentication failed")]
    AuthenticationFailed,
    #[error("query timed out: {0}")]
    QueryTimeout(String),
    #[error("protocol error: {0}")]
    ProtocolError(String),
    #[error("malformed response: {0}")]
    MalformedResponse(String),
    #[error("query failed: {0}")]
    QueryFailed(String),
}

impl From<RconError> for ScrapeError {
    fn from(err: RconError) -> Self {
        match err {
            RconError::ConnectionRefused(addr) => ScrapeError::ConnectionRefused(addr),
            RconError::Timeout(what) => ScrapeError::QueryTimeout(what.to_string()),
            RconError::AuthenticationFailed => ScrapeError::AuthenticationFailed,
            RconError::Protocol(msg) => ScrapeError::ProtocolError(msg),
            RconError::ConnectionClosed => ScrapeError::QueryFailed(err.to_string()),
            RconError::Io(e) if e.kind() == io::ErrorKind::TimedOut => {
                ScrapeError::QueryTimeout(e.to_string())
            }
            RconError::Io(e) => ScrapeError::QueryFailed(e.to_string()),
        }
    }
}
