/**
 * HTTP SURFACE - Endpoint /metrics scrappé par Prometheus
 *
 * RÔLE :
 * Résout la cible du scrape, lance la session RCON et rend le résultat
 * au format d'exposition Prometheus.
 *
 * CODES HTTP :
 * - 200 : métriques complètes, ou corps "down" (srcds_up 0) sur timeout/échec
 * - 404 : chemin inconnu ou spécification de cible invalide
 * - 503 : connexion refusée par le serveur de jeu
 */

use crate::config::ExporterConfig;
use crate::error::ScrapeError;
use crate::outcome::{classify, Outcome};
use crate::query::QueryOrchestrator;
use crate::render::{render_down, render_metrics, CONTENT_TYPE};
use crate::target::resolve_target;
use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ExporterConfig>,
    pub orchestrator: QueryOrchestrator,
}

impl AppState {
    pub fn new(config: ExporterConfig) -> Self {
        let orchestrator = QueryOrchestrator::new(&config.rcon);
        Self {
            config: Arc::new(config),
            orchestrator,
        }
    }
}

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/metrics", get(metrics))
        .fallback(|| async { (StatusCode::NOT_FOUND, "invalid path") })
        .with_state(app_state)
}

// GET /metrics?target=host:port&password=...
async fn metrics(
    State(app): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let result = match resolve_target(app.config.single_server.as_ref(), &params) {
        Ok(target) => app.orchestrator.scrape(&target).await,
        Err(e) => Err(ScrapeError::TargetSpecificationInvalid(e.to_string())),
    };

    match classify(result) {
        Outcome::Up(mapping) => match render_metrics(&mapping) {
            Ok(body) => exposition(body),
            Err(e) => {
                warn!("failed to encode metrics: {e}");
                exposition(render_down())
            }
        },
        Outcome::Down => exposition(render_down()),
        Outcome::Refused => {
            (StatusCode::SERVICE_UNAVAILABLE, "Connection refused by target").into_response()
        }
        Outcome::Rejected(detail) => (
            StatusCode::NOT_FOUND,
            format!("target specification is invalid: {detail}"),
        )
            .into_response(),
    }
}

fn exposition(body: String) -> Response {
    ([(header::CONTENT_TYPE, CONTENT_TYPE)], body).into_response()
}
