use super::packet::{Origin, Packet, PacketType, AUTH_FAILED_ID};
use crate::error::RconError;
use std::io::ErrorKind;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unauthenticated,
    Authenticated,
    Closed,
}

/// One RCON session over one TCP connection
#[derive(Debug)]
pub struct RconClient {
    stream: Option<TcpStream>,
    state: SessionState,
    next_id: i32,
    peer: String,
}

impl RconClient {
    /// Opens the TCP connection, nothing is sent yet
    pub async fn connect(
        address: &str,
        port: u16,
        connect_timeout: Duration,
    ) -> Result<Self, RconError> {
        let peer = format!("{address}:{port}");

        let stream = match timeout(connect_timeout, TcpStream::connect((address, port))).await {
            Err(_) => return Err(RconError::Timeout("connecting")),
            Ok(Err(e)) if e.kind() == ErrorKind::ConnectionRefused => {
                return Err(RconError::ConnectionRefused(peer))
            }
            Ok(Err(e)) => return Err(e.into()),
            Ok(Ok(stream)) => stream,
        };
        if let Err(e) = stream.set_nodelay(true) {
            debug!(%peer, "set_nodelay failed: {e}");
        }

        debug!(%peer, "RCON connection established");
        Ok(Self {
            stream: Some(stream),
            state: SessionState::Unauthenticated,
            next_id: 1,
            peer,
        })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    pub async fn authenticate(
        &mut self,
        password: &str,
        auth_timeout: Duration,
    ) -> Result<(), RconError> {
        if self.state != SessionState::Unauthenticated {
            return Err(RconError::Protocol(format!(
                "cannot authenticate a {:?} session",
                self.state
            )));
        }

        match timeout(auth_timeout, self.auth_exchange(password)).await {
            Ok(Ok(())) => {
                self.state = SessionState::Authenticated;
                debug!(peer = %self.peer, "RCON authentication accepted");
                Ok(())
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(RconError::Timeout("authenticating")),
        }
    }

    /// Runs `command` and returns the reassembled response text
    pub async fn execute(
        &mut self,
        command: &str,
        command_timeout: Duration,
    ) -> Result<String, RconError> {
        if self.state != SessionState::Authenticated {
            return Err(RconError::Protocol(format!(
                "cannot execute on a {:?} session",
                self.state
            )));
        }

        match timeout(command_timeout, self.command_exchange(command)).await {
            Ok(result) => result,
            Err(_) => Err(RconError::Timeout("waiting for command response")),
        }
    }

    /// Idempotent
    pub async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.shutdown().await {
                debug!(peer = %self.peer, "shutdown failed: {e}");
            }
            debug!(peer = %self.peer, "RCON session closed");
        }
        self.state = SessionState::Closed;
    }

    async fn auth_exchange(&mut self, password: &str) -> Result<(), RconError> {
        let id = self.next_request_id();
        self.send(&Packet::new(id, PacketType::Auth, password)).await?;

        loop {
            let packet = self.recv().await?;
            match packet.kind {
                // SRCDS sends an empty RESPONSE_VALUE right before the AUTH_RESPONSE
                PacketType::ResponseValue => continue,
                PacketType::AuthResponse if packet.id == id => return Ok(()),
                PacketType::AuthResponse if packet.id == AUTH_FAILED_ID => {
                    return Err(RconError::AuthenticationFailed)
                }
                _ => {
                    return Err(RconError::Protocol(format!(
                        "unexpected {:?} with id {} during authentication",
                        packet.kind, packet.id
                    )))
                }
            }
        }
    }

    async fn command_exchange(&mut self, command: &str) -> Result<String, RconError> {
        let command_id = self.next_request_id();
        let sentinel_id = self.next_request_id();

        self.send(&Packet::new(command_id, PacketType::ExecCommand, command))
            .await?;
        self.send(&Packet::new(sentinel_id, PacketType::ExecCommand, ""))
            .await?;

        let mut body = Vec::new();
        let mut fragments = 0usize;
        loop {
            let packet = self.recv().await?;
            if packet.kind != PacketType::ResponseValue {
                return Err(RconError::Protocol(format!(
                    "unexpected {:?} while reading '{command}' response",
                    packet.kind
                )));
            }

            if packet.id == sentinel_id {
                break;
            }
            if packet.id == command_id {
                body.extend_from_slice(&packet.body);
                fragments += 1;
            } else {
                debug!(peer = %self.peer, id = packet.id, "skipping stale response packet");
            }
        }

        debug!(peer = %self.peer, command, fragments, bytes = body.len(), "command response reassembled");
        Ok(String::from_utf8_lossy(&body).into_owned())
    }

    async fn send(&mut self, packet: &Packet) -> Result<(), RconError> {
        let stream = self.stream.as_mut().ok_or(RconError::ConnectionClosed)?;
        packet.write_to(stream).await
    }

    async fn recv(&mut self) -> Result<Packet, RconError> {
        let stream = self.stream.as_mut().ok_or(RconError::ConnectionClosed)?;
        Packet::read_from(stream, Origin::Server).await
    }

    fn next_request_id(&mut self) -> i32 {
        let id = self.next_id;
        self.next_id = if id == i32::MAX { 1 } else { id + 1 };
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    const SHORT: Duration = Duration::from_millis(300);

    /// Accepts one connection and hands it to `script`
    async fn serve_once<F, Fut>(script: F) -> u16
    where
        F: FnOnce(TcpStream) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            script(stream).await;
        });
        port
    }

    async fn read_client(stream: &mut TcpStream) -> Packet {
        Packet::read_from(stream, Origin::Client).await.unwrap()
    }

    async fn reply(stream: &mut TcpStream, id: i32, kind: PacketType, body: &str) {
        Packet::new(id, kind, body).write_to(stream).await.unwrap();
    }

    /// Plays the SRCDS side of a successful auth, quirk packet included
    async fn accept_auth(stream: &mut TcpStream) {
        let auth = read_client(stream).await;
        assert_eq!(auth.kind, PacketType::Auth);
        reply(stream, auth.id, PacketType::ResponseValue, "").await;
        reply(stream, auth.id, PacketType::AuthResponse, "").await;
    }

    #[tokio::test]
    async fn test_authenticate_skips_empty_response_value() {
        let port = serve_once(|mut stream| async move {
            accept_auth(&mut stream).await;
        })
        .await;

        let mut client = RconClient::connect("127.0.0.1", port, SHORT).await.unwrap();
        client.authenticate("secret", SHORT).await.unwrap();
        assert_eq!(client.state(), SessionState::Authenticated);
    }

    #[tokio::test]
    async fn test_bad_password() {
        let port = serve_once(|mut stream| async move {
            let auth = read_client(&mut stream).await;
            assert_eq!(auth.body_text(), "wrong");
            reply(&mut stream, auth.id, PacketType::ResponseValue, "").await;
            reply(&mut stream, AUTH_FAILED_ID, PacketType::AuthResponse, "").await;
        })
        .await;

        let mut client = RconClient::connect("127.0.0.1", port, SHORT).await.unwrap();
        let err = client.authenticate("wrong", SHORT).await.unwrap_err();
        assert!(matches!(err, RconError::AuthenticationFailed));
    }

    #[tokio::test]
    async fn test_fragmented_response_is_reassembled() {
        let full = "hostname: Fragmented\nversion : 1.38.0.0\nplayers : 3 humans, 0 bots (24 max)";
        let port = serve_once(move |mut stream| async move {
            accept_auth(&mut stream).await;

            let command = read_client(&mut stream).await;
            let sentinel = read_client(&mut stream).await;
            assert_eq!(command.body_text(), "status");
            assert!(sentinel.body.is_empty());
            assert_ne!(command.id, sentinel.id);

            let (a, rest) = full.split_at(10);
            let (b, c) = rest.split_at(25);
            for part in [a, b, c] {
                reply(&mut stream, command.id, PacketType::ResponseValue, part).await;
            }
            reply(&mut stream, sentinel.id, PacketType::ResponseValue, "").await;
        })
        .await;

        let mut client = RconClient::connect("127.0.0.1", port, SHORT).await.unwrap();
        client.authenticate("secret", SHORT).await.unwrap();
        let text = client.execute("status", SHORT).await.unwrap();
        assert_eq!(text, full);
    }

    #[tokio::test]
    async fn test_stale_packets_are_skipped() {
        let port = serve_once(|mut stream| async move {
            accept_auth(&mut stream).await;

            let command = read_client(&mut stream).await;
            let sentinel = read_client(&mut stream).await;
            reply(&mut stream, 9999, PacketType::ResponseValue, "left over").await;
            reply(&mut stream, command.id, PacketType::ResponseValue, "CPU\n1.0").await;
            reply(&mut stream, sentinel.id, PacketType::ResponseValue, "").await;
        })
        .await;

        let mut client = RconClient::connect("127.0.0.1", port, SHORT).await.unwrap();
        client.authenticate("secret", SHORT).await.unwrap();
        assert_eq!(client.execute("stats", SHORT).await.unwrap(), "CPU\n1.0");
    }

    #[tokio::test]
    async fn test_silent_server_times_out() {
        let port = serve_once(|mut stream| async move {
            accept_auth(&mut stream).await;
            let _ = read_client(&mut stream).await;
            tokio::time::sleep(Duration::from_secs(5)).await;
        })
        .await;

        let mut client = RconClient::connect("127.0.0.1", port, SHORT).await.unwrap();
        client.authenticate("secret", SHORT).await.unwrap();
        let err = client.execute("status", SHORT).await.unwrap_err();
        assert!(matches!(err, RconError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_peer_hangup_mid_response() {
        let port = serve_once(|mut stream| async move {
            accept_auth(&mut stream).await;
            let command = read_client(&mut stream).await;
            reply(&mut stream, command.id, PacketType::ResponseValue, "host").await;
        })
        .await;

        let mut client = RconClient::connect("127.0.0.1", port, SHORT).await.unwrap();
        client.authenticate("secret", SHORT).await.unwrap();
        let err = client.execute("status", SHORT).await.unwrap_err();
        assert!(matches!(err, RconError::ConnectionClosed));
    }

    #[tokio::test]
    async fn test_refused_connection() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let err = RconClient::connect("127.0.0.1", port, SHORT).await.unwrap_err();
        assert!(matches!(err, RconError::ConnectionRefused(_)));
    }

    #[tokio::test]
    async fn test_connect_times_out_on_full_accept_queue() {
        // backlog 0: once one connection waits in the queue, SYNs are dropped
        let socket = tokio::net::TcpSocket::new_v4().unwrap();
        socket.bind("127.0.0.1:0".parse().unwrap()).unwrap();
        let listener = socket.listen(0).unwrap();
        let addr = listener.local_addr().unwrap();

        let mut queued = Vec::new();
        for _ in 0..16 {
            match timeout(Duration::from_millis(100), TcpStream::connect(addr)).await {
                Ok(Ok(stream)) => queued.push(stream),
                _ => break,
            }
        }

        let started = std::time::Instant::now();
        let err = RconClient::connect("127.0.0.1", addr.port(), SHORT)
            .await
            .unwrap_err();
        assert!(matches!(err, RconError::Timeout("connecting")), "{err:?}");
        assert!(started.elapsed() >= SHORT);
        drop(queued);
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let port = serve_once(|_stream| async move {}).await;

        let mut client = RconClient::connect("127.0.0.1", port, SHORT).await.unwrap();
        client.close().await;
        client.close().await;
        assert_eq!(client.state(), SessionState::Closed);

        let err = client.execute("status", SHORT).await.unwrap_err();
        assert!(matches!(err, RconError::Protocol(_)));
    }

    #[test]
    fn test_request_ids_wrap_to_one() {
        let mut client = RconClient {
            stream: None,
            state: SessionState::Closed,
            next_id: i32::MAX,
            peer: "test".into(),
        };
        assert_eq!(client.next_request_id(), i32::MAX);
        assert_eq!(client.next_request_id(), 1);
    }
}
