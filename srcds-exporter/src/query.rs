//! One RCON session per scrape
//!
//! connect + authenticate (with retries) -> `status` -> `stats` -> close.
//! The session is closed on every path out of `query`, including timeouts.

use crate::config::RconConf;
use crate::error::{RconError, ScrapeError};
use crate::models::{MetricMapping, Target};
use crate::parser::parse_query;
use crate::rcon::RconClient;
use std::time::Duration;
use tokio::time::timeout;
use tracing::debug;

pub const STATUS_COMMAND: &str = "status";
pub const STATS_COMMAND: &str = "stats";

/// Raw console output of the two diagnostic commands
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponses {
    pub status: String,
    pub stats: String,
}

#[derive(Debug, Clone)]
pub struct QueryOrchestrator {
    connect_timeout: Duration,
    handshake_timeout: Duration,
    command_timeout: Duration,
    reconnect_attempts: u32,
}

impl QueryOrchestrator {
    pub fn new(conf: &RconConf) -> Self {
        Self {
            connect_timeout: conf.connect_timeout(),
            handshake_timeout: conf.handshake_timeout(),
            command_timeout: conf.command_timeout(),
            reconnect_attempts: conf.reconnect_attempts,
        }
    }

    /// Query and parse into a complete mapping, never a partial one
    pub async fn scrape(&self, target: &Target) -> Result<MetricMapping, ScrapeError> {
        let raw = self.query(target).await?;
        let mut mapping = MetricMapping::for_target(target);
        parse_query(&raw.status, &raw.stats, &mut mapping)?;
        Ok(mapping)
    }

    pub async fn query(&self, target: &Target) -> Result<RawResponses, ScrapeError> {
        let mut client = self.open_session(target).await?;
        let result = self.run_commands(&mut client).await;
        client.close().await;
        result.map_err(ScrapeError::from)
    }

    async fn run_commands(&self, client: &mut RconClient) -> Result<RawResponses, RconError> {
        let status = client.execute(STATUS_COMMAND, self.command_timeout).await?;
        let stats = client.execute(STATS_COMMAND, self.command_timeout).await?;
        Ok(RawResponses { status, stats })
    }

    /// Connect + authenticate, retried on transient failures
    async fn open_session(&self, target: &Target) -> Result<RconClient, ScrapeError> {
        let handshake = async {
            let mut attempt = 0;
            loop {
                match self.handshake(target).await {
                    Ok(client) => return Ok(client),
                    Err(e) if e.is_transient() && attempt < self.reconnect_attempts => {
                        attempt += 1;
                        debug!(target = %target.endpoint(), attempt, "handshake failed, retrying: {e}");
                    }
                    Err(e) => return Err(e),
                }
            }
        };

        match timeout(self.handshake_timeout, handshake).await {
            Ok(result) => result.map_err(ScrapeError::from),
            Err(_) => Err(ScrapeError::QueryTimeout(format!(
                "handshake with {} exceeded {:?}",
                target.endpoint(),
                self.handshake_timeout
            ))),
        }
    }

    async fn handshake(&self, target: &Target) -> Result<RconClient, RconError> {
        let mut client =
            RconClient::connect(&target.address, target.port, self.connect_timeout).await?;
        if let Err(e) = client
            .authenticate(&target.password, self.connect_timeout)
            .await
        {
            client.close().await;
            return Err(e);
        }
        Ok(client)
    }
}
