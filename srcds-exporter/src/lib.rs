//! SRCDS exporter - Source dedicated server telemetry as Prometheus metrics
//!
//! Each scrape opens a fresh RCON session to the target game server, runs
//! `status` and `stats`, parses both outputs and renders them:
//! - `rcon`: packet framing and the protocol client
//! - `query`: the per-scrape session orchestration
//! - `parser`: `status`/`stats` text to metric mapping
//! - `outcome`: error classification into up / down / refused / rejected
//! - `http`: the axum router serving `/metrics`

pub mod config;
pub mod error;
pub mod http;
pub mod models;
pub mod outcome;
pub mod parser;
pub mod query;
pub mod rcon;
pub mod render;
pub mod target;

pub use config::ExporterConfig;
pub use error::{RconError, ScrapeError};
pub use models::{MetricMapping, MetricValue, Target};
pub use outcome::{classify, Outcome};
pub use query::QueryOrchestrator;
