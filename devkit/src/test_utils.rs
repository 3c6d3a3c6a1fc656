/*!
Test Harness pour l'exporter

Démarre un mock RCON, fabrique la config, la cible et l'orchestrateur
qui pointent dessus, et offre les assertions sur le cycle de vie des
sessions (fermeture exactement une fois).
*/

use crate::rcon_stub::{MockBehavior, MockRconServer};
use anyhow::Result;
use srcds_exporter::config::{ExporterConfig, RconConf};
use srcds_exporter::http::{build_router, AppState};
use srcds_exporter::models::Target;
use srcds_exporter::query::QueryOrchestrator;
use std::time::Duration;
use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tokio::time::{timeout, Instant};

pub struct TestHarness {
    pub server: MockRconServer,
    pub config: ExporterConfig,
    password: String,
}

impl TestHarness {
    pub async fn start(behavior: MockBehavior) -> Result<Self> {
        env_logger::try_init().ok(); // Init logging pour tests

        let password = behavior.password.clone();
        let server = MockRconServer::start(behavior).await?;
        let config = ExporterConfig {
            rcon: fast_rcon_conf(),
            ..ExporterConfig::default()
        };

        Ok(Self {
            server,
            config,
            password,
        })
    }

    /// Same harness, exporter pinned to the mock in single server mode
    pub fn single_server(mut self) -> Self {
        self.config.single_server = Some(self.target());
        self
    }

    pub fn target(&self) -> Target {
        Target {
            address: "127.0.0.1".into(),
            port: self.server.port(),
            password: self.password.clone(),
        }
    }

    pub fn target_with_password(&self, password: &str) -> Target {
        Target {
            password: password.into(),
            ..self.target()
        }
    }

    pub fn orchestrator(&self) -> QueryOrchestrator {
        QueryOrchestrator::new(&self.config.rcon)
    }

    pub fn router(&self) -> axum::Router {
        build_router(AppState::new(self.config.clone()))
    }

    /// `?target=...&password=...` for the mock
    pub fn metrics_uri(&self) -> String {
        format!(
            "/metrics?target=127.0.0.1:{}&password={}",
            self.server.port(),
            self.password
        )
    }

    /// Every accepted connection was closed by the client, exactly once
    pub async fn assert_sessions_closed(&self) -> Result<()> {
        let log = self.server.log();
        let expected = log.accepted - log.dropped;
        if !self.server.wait_for_closed(expected, 2000).await {
            anyhow::bail!(
                "expected {} closed sessions, mock saw {}",
                expected,
                self.server.log().closed
            );
        }

        let log = self.server.log();
        if log.closed != expected {
            anyhow::bail!("expected {} closed sessions, mock saw {}", expected, log.closed);
        }
        log::info!("✅ {} session(s) closed exactly once", expected);
        Ok(())
    }
}

/// Short timeouts so failure tests stay fast
pub fn fast_rcon_conf() -> RconConf {
    RconConf {
        connect_timeout_ms: 300,
        handshake_timeout_ms: 1000,
        command_timeout_ms: 300,
        reconnect_attempts: 2,
    }
}

/// Sample line of `metric` in an exposition body, labels included
pub fn sample_line<'a>(body: &'a str, metric: &str) -> Option<&'a str> {
    let prefix = format!("{metric}{{");
    body.lines().find(|l| l.starts_with(&prefix))
}

pub fn sample_value(body: &str, metric: &str) -> Option<f64> {
    sample_line(body, metric)?.rsplit(' ').next()?.parse().ok()
}

/// Listener whose accept queue is full: new SYNs are dropped, so
/// connecting to it hangs until the client gives up
pub struct SaturatedListener {
    listener: TcpListener,
    queued: Vec<TcpStream>,
    port: u16,
}

impl SaturatedListener {
    pub async fn start() -> Result<Self> {
        let socket = TcpSocket::new_v4()?;
        socket.bind("127.0.0.1:0".parse()?)?;
        let listener = socket.listen(0)?;
        let addr = listener.local_addr()?;

        // Fill the queue until a connect stops completing
        let mut queued = Vec::new();
        for _ in 0..16 {
            match timeout(Duration::from_millis(100), TcpStream::connect(addr)).await {
                Ok(Ok(stream)) => queued.push(stream),
                _ => break,
            }
        }
        log::info!("🧱 [MOCK] accept queue of {} full after {} connections", addr, queued.len());

        Ok(Self {
            listener,
            queued,
            port: addr.port(),
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Frees the queue, then counts connections beyond the filler ones
    /// that reach the listener within `wait`
    pub async fn late_connections(self, wait: Duration) -> usize {
        let deadline = Instant::now() + wait;
        let mut accepted: usize = 0;
        while let Ok(Ok(_)) = tokio::time::timeout_at(deadline, self.listener.accept()).await {
            accepted += 1;
        }
        accepted.saturating_sub(self.queued.len())
    }
}
