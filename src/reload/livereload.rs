// src/reload/livereload.rs

//! Minimal LiveReload (protocol 7) websocket server.
//!
//! Browsers running the LiveReload client connect, exchange a `hello`, and
//! then receive `reload` commands. Each connection subscribes to a broadcast
//! channel, so `broadcast` never blocks on slow clients.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use super::ReloadBroadcaster;

/// Port the LiveReload browser extensions connect to by default.
pub const DEFAULT_PORT: u16 = 35729;

const PROTOCOL_V7: &str = "http://livereload.com/protocols/official-7";

#[derive(Debug, Deserialize)]
struct ClientCommand {
    command: String,
}

/// Handle to a running LiveReload server.
#[derive(Debug, Clone)]
pub struct LiveReloadServer {
    tx: broadcast::Sender<String>,
    addr: SocketAddr,
}

impl LiveReloadServer {
    /// Bind the listener and start accepting clients in the background.
    pub async fn bind(addr: SocketAddr) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("binding livereload listener on {addr}"))?;
        let addr = listener.local_addr()?;
        let (tx, _rx) = broadcast::channel::<String>(16);

        info!(%addr, "livereload server listening");
        tokio::spawn(accept_loop(listener, tx.clone()));

        Ok(Self { tx, addr })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }
}

impl ReloadBroadcaster for LiveReloadServer {
    fn broadcast(&self, path: &str) {
        let message = reload_message(path);
        match self.tx.send(message) {
            Ok(n) => debug!(path = %path, clients = n, "broadcast reload"),
            Err(_) => debug!(path = %path, "no livereload clients connected"),
        }
    }
}

async fn accept_loop(listener: TcpListener, tx: broadcast::Sender<String>) {
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                let rx = tx.subscribe();
                tokio::spawn(async move {
                    if let Err(e) = serve_client(stream, rx).await {
                        debug!(%peer, error = %e, "livereload client disconnected");
                    }
                });
            }
            Err(e) => {
                warn!(error = %e, "livereload accept failed");
            }
        }
    }
}

async fn serve_client(stream: TcpStream, mut rx: broadcast::Receiver<String>) -> Result<()> {
    let ws = tokio_tungstenite::accept_async(stream)
        .await
        .context("websocket handshake")?;
    let (mut sink, mut incoming) = ws.split();

    loop {
        tokio::select! {
            msg = incoming.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    if is_hello(&text) {
                        sink.send(Message::Text(hello_message())).await?;
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e.into()),
            },
            out = rx.recv() => match out {
                Ok(text) => sink.send(Message::Text(text)).await?,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    // Reloads are idempotent; one more is as good as many.
                    debug!(skipped, "livereload client lagged");
                    sink.send(Message::Text(reload_message("/"))).await?;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }

    Ok(())
}

fn is_hello(text: &str) -> bool {
    serde_json::from_str::<ClientCommand>(text)
        .map(|c| c.command == "hello")
        .unwrap_or(false)
}

fn hello_message() -> String {
    json!({
        "command": "hello",
        "protocols": [PROTOCOL_V7],
        "serverName": "devpipe",
    })
    .to_string()
}

fn reload_message(path: &str) -> String {
    json!({
        "command": "reload",
        "path": path,
        "liveCSS": true,
    })
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    use tokio::time::{timeout, Duration};

    #[test]
    fn hello_detection() {
        assert!(is_hello(r#"{"command":"hello","protocols":[]}"#));
        assert!(!is_hello(r#"{"command":"info"}"#));
        assert!(!is_hello("not json"));
    }

    #[tokio::test]
    async fn client_receives_reload_after_hello() {
        let server = LiveReloadServer::bind("127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();
        let url = format!("ws://{}", server.local_addr());

        let (mut ws, _) = tokio_tungstenite::connect_async(url.as_str()).await.unwrap();
        ws.send(Message::Text(
            r#"{"command":"hello","protocols":["http://livereload.com/protocols/official-7"]}"#
                .to_string(),
        ))
        .await
        .unwrap();

        let hello = timeout(Duration::from_secs(2), ws.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        let hello: serde_json::Value = serde_json::from_str(hello.to_text().unwrap()).unwrap();
        assert_eq!(hello["command"], "hello");

        server.broadcast("/");

        let reload = timeout(Duration::from_secs(2), ws.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        let reload: serde_json::Value = serde_json::from_str(reload.to_text().unwrap()).unwrap();
        assert_eq!(reload["command"], "reload");
        assert_eq!(reload["path"], "/");
    }
}
