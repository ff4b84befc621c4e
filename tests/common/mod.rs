//! Shared helpers for gateway integration tests.

use std::net::SocketAddr;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{self, client::IntoClientRequest, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use ws_gateway::{GatewayConfig, GatewayServer, Shutdown};

pub type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// A gateway running on an ephemeral local port.
pub struct TestGateway {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub task: JoinHandle<()>,
}

impl TestGateway {
    pub fn url(&self, path: &str) -> String {
        format!("ws://{}{}", self.addr, path)
    }

    /// Stop the gateway and wait for it to exit.
    pub async fn stop(self) {
        self.shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(5), self.task)
            .await
            .expect("gateway did not stop")
            .expect("gateway task panicked");
    }
}

pub async fn start_gateway(mut config: GatewayConfig) -> TestGateway {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    config.listener.bind_address = addr.to_string();

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    let server = GatewayServer::new(config);
    let task = tokio::spawn(async move {
        server.run(listener, server_shutdown).await.expect("gateway failed");
    });

    TestGateway { addr, shutdown, task }
}

/// Config running `command args...` for every connection.
pub fn command_config(command: &str, args: &[&str]) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.command.name = command.into();
    config.command.args = args.iter().map(|a| a.to_string()).collect();
    config
}

/// Write an executable shell script.
#[allow(dead_code)]
pub fn write_script(dir: &Path, name: &str, body: &str) {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
}

pub async fn connect(url: &str) -> Result<Client, tungstenite::Error> {
    connect_with(url, &[]).await
}

pub async fn connect_with(url: &str, headers: &[(&'static str, &str)]) -> Result<Client, tungstenite::Error> {
    let mut request = url.into_client_request()?;
    for (name, value) in headers {
        request.headers_mut().insert(*name, value.parse().unwrap());
    }
    let (client, _response) = tokio_tungstenite::connect_async(request).await?;
    Ok(client)
}

/// HTTP status of a refused handshake.
#[allow(dead_code)]
pub async fn refused_status(url: &str) -> u16 {
    match connect(url).await {
        Ok(_) => panic!("handshake to {url} unexpectedly succeeded"),
        Err(tungstenite::Error::Http(response)) => response.status().as_u16(),
        Err(e) => panic!("unexpected handshake error: {e}"),
    }
}

#[allow(dead_code)]
pub async fn send_text(client: &mut Client, text: &str) {
    client.send(Message::Text(text.into())).await.unwrap();
}

/// Next text message, skipping control frames. `None` once the session ends.
#[allow(dead_code)]
pub async fn next_text(client: &mut Client) -> Option<String> {
    let next = tokio::time::timeout(Duration::from_secs(5), async {
        while let Some(message) = client.next().await {
            match message {
                Ok(Message::Text(text)) => return Some(text.as_str().to_owned()),
                Ok(Message::Binary(data)) => return Some(String::from_utf8_lossy(&data).into_owned()),
                Ok(Message::Close(_)) | Err(_) => return None,
                Ok(_) => continue,
            }
        }
        None
    });
    next.await.expect("timed out waiting for a message")
}
