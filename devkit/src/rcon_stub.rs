/*!
Mock SRCDS RCON server pour tests sans serveur de jeu

Parle le vrai protocole (via `srcds_exporter::rcon::packet`) sur 127.0.0.1,
avec un comportement scriptable : mot de passe, réponses par commande,
fragmentation, paquet parasite avant AUTH_RESPONSE, blocages.
Compte les connexions acceptées et fermées pour les assertions.
*/

use anyhow::Result;
use parking_lot::Mutex;
use srcds_exporter::error::RconError;
use srcds_exporter::rcon::{Origin, Packet, PacketType};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// Body SRCDS sends after mirroring an empty command
const SENTINEL_TRAILER: [u8; 4] = [0x00, 0x01, 0x00, 0x00];

#[derive(Debug, Clone)]
pub struct MockBehavior {
    pub password: String,
    /// command -> console output
    pub responses: HashMap<String, String>,
    /// Bytes per RESPONSE_VALUE packet, 0 sends each response whole
    pub fragment_size: usize,
    /// Empty RESPONSE_VALUE right before AUTH_RESPONSE, like real SRCDS
    pub auth_quirk: bool,
    /// Never answer the AUTH packet
    pub stall_auth: bool,
    /// Never answer this command
    pub stall_on: Option<String>,
    /// Hang up on the first N connections right after accepting them
    pub drop_first_connections: usize,
}

impl Default for MockBehavior {
    fn default() -> Self {
        Self {
            password: "secret".into(),
            responses: HashMap::new(),
            fragment_size: 0,
            auth_quirk: true,
            stall_auth: false,
            stall_on: None,
            drop_first_connections: 0,
        }
    }
}

impl MockBehavior {
    pub fn with_response(mut self, command: &str, output: &str) -> Self {
        self.responses.insert(command.to_string(), output.to_string());
        self
    }

    pub fn with_fragment_size(mut self, size: usize) -> Self {
        self.fragment_size = size;
        self
    }

    pub fn stalling_on(mut self, command: &str) -> Self {
        self.stall_on = Some(command.to_string());
        self
    }
}

/// What the mock observed, for assertions
#[derive(Debug, Default, Clone)]
pub struct ServerLog {
    pub accepted: usize,
    /// Connections the client closed
    pub closed: usize,
    /// Connections the mock hung up on
    pub dropped: usize,
    pub auth_attempts: usize,
    pub commands: Vec<String>,
}

pub struct MockRconServer {
    addr: SocketAddr,
    events: Arc<Mutex<ServerLog>>,
    handle: JoinHandle<()>,
}

impl MockRconServer {
    pub async fn start(behavior: MockBehavior) -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let events = Arc::new(Mutex::new(ServerLog::default()));
        let behavior = Arc::new(behavior);

        let accept_events = events.clone();
        let handle = tokio::spawn(async move {
            loop {
                let Ok((stream, peer)) = listener.accept().await else {
                    break;
                };

                let n = {
                    let mut seen = accept_events.lock();
                    seen.accepted += 1;
                    seen.accepted
                };
                if n <= behavior.drop_first_connections {
                    log::info!("🔌 [MOCK] dropping connection #{} from {}", n, peer);
                    accept_events.lock().dropped += 1;
                    drop(stream);
                    continue;
                }

                let events = accept_events.clone();
                let behavior = behavior.clone();
                tokio::spawn(async move {
                    serve_connection(stream, behavior, events).await;
                });
            }
        });

        log::info!("🎮 [MOCK] RCON server listening on {}", addr);
        Ok(Self {
            addr,
            events,
            handle,
        })
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn log(&self) -> ServerLog {
        self.events.lock().clone()
    }

    /// Polls until the client closed `count` connections
    pub async fn wait_for_closed(&self, count: usize, timeout_ms: u64) -> bool {
        let start = std::time::Instant::now();
        while start.elapsed() < Duration::from_millis(timeout_ms) {
            if self.events.lock().closed >= count {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        log::warn!("⏰ [MOCK] timeout waiting for {} closed connections", count);
        false
    }
}

impl Drop for MockRconServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn serve_connection(
    mut stream: TcpStream,
    behavior: Arc<MockBehavior>,
    events: Arc<Mutex<ServerLog>>,
) {
    let mut authenticated = false;
    let mut stalled = false;

    loop {
        let packet = match Packet::read_from(&mut stream, Origin::Client).await {
            Ok(packet) => packet,
            Err(RconError::ConnectionClosed) => {
                events.lock().closed += 1;
                return;
            }
            Err(e) => {
                log::warn!("❌ [MOCK] bad packet: {}", e);
                events.lock().closed += 1;
                return;
            }
        };

        // Keep draining so a client hang-up is still observed
        if stalled {
            continue;
        }

        let result = match packet.kind {
            PacketType::Auth => {
                events.lock().auth_attempts += 1;
                if behavior.stall_auth {
                    stalled = true;
                    continue;
                }
                authenticated = packet.body_text() == behavior.password;
                answer_auth(&mut stream, &behavior, packet.id, authenticated).await
            }
            PacketType::ExecCommand if !authenticated => {
                // SRCDS ignores commands from unauthenticated sessions
                continue;
            }
            PacketType::ExecCommand => {
                let command = packet.body_text();
                if command.is_empty() {
                    answer_sentinel(&mut stream, packet.id).await
                } else {
                    events.lock().commands.push(command.clone());
                    if behavior.stall_on.as_deref() == Some(command.as_str()) {
                        stalled = true;
                        continue;
                    }
                    answer_command(&mut stream, &behavior, packet.id, &command).await
                }
            }
            other => {
                log::warn!("❌ [MOCK] unexpected {:?} from client", other);
                continue;
            }
        };

        if let Err(e) = result {
            log::warn!("❌ [MOCK] write failed: {}", e);
            events.lock().closed += 1;
            return;
        }
    }
}

async fn answer_auth(
    stream: &mut TcpStream,
    behavior: &MockBehavior,
    id: i32,
    accepted: bool,
) -> Result<(), RconError> {
    if behavior.auth_quirk {
        Packet::new(id, PacketType::ResponseValue, "").write_to(stream).await?;
    }
    let reply_id = if accepted { id } else { -1 };
    Packet::new(reply_id, PacketType::AuthResponse, "")
        .write_to(stream)
        .await
}

async fn answer_sentinel(stream: &mut TcpStream, id: i32) -> Result<(), RconError> {
    Packet::new(id, PacketType::ResponseValue, "").write_to(stream).await?;
    Packet::new(id, PacketType::ResponseValue, SENTINEL_TRAILER.to_vec())
        .write_to(stream)
        .await
}

async fn answer_command(
    stream: &mut TcpStream,
    behavior: &MockBehavior,
    id: i32,
    command: &str,
) -> Result<(), RconError> {
    let output = behavior
        .responses
        .get(command)
        .cloned()
        .unwrap_or_else(|| format!("Unknown command \"{command}\"\n"));
    let bytes = output.as_bytes();

    let size = if behavior.fragment_size == 0 {
        bytes.len().max(1)
    } else {
        behavior.fragment_size
    };
    for chunk in bytes.chunks(size) {
        Packet::new(id, PacketType::ResponseValue, chunk.to_vec())
            .write_to(stream)
            .await?;
    }
    if bytes.is_empty() {
        Packet::new(id, PacketType::ResponseValue, "").write_to(stream).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use srcds_exporter::rcon::RconClient;

    const SHORT: Duration = Duration::from_millis(500);

    #[tokio::test]
    async fn test_mock_answers_commands() {
        let server = MockRconServer::start(
            MockBehavior::default().with_response("status", "hostname: mock\n"),
        )
        .await
        .unwrap();

        let mut client = RconClient::connect("127.0.0.1", server.port(), SHORT).await.unwrap();
        client.authenticate("secret", SHORT).await.unwrap();
        assert_eq!(client.execute("status", SHORT).await.unwrap(), "hostname: mock\n");
        assert_eq!(
            client.execute("cvarlist", SHORT).await.unwrap(),
            "Unknown command \"cvarlist\"\n"
        );
        client.close().await;

        assert!(server.wait_for_closed(1, 1000).await);
        let log = server.log();
        assert_eq!(log.accepted, 1);
        assert_eq!(log.auth_attempts, 1);
        assert_eq!(log.commands, vec!["status", "cvarlist"]);
    }

    #[tokio::test]
    async fn test_mock_rejects_wrong_password() {
        let server = MockRconServer::start(MockBehavior::default()).await.unwrap();

        let mut client = RconClient::connect("127.0.0.1", server.port(), SHORT).await.unwrap();
        let err = client.authenticate("nope", SHORT).await.unwrap_err();
        assert!(matches!(err, RconError::AuthenticationFailed));
    }
}
