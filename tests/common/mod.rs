//! Shared utilities for integration tests.

use std::fs;
use std::future::Future;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use event_receiver::ReceiverConfig;

/// Write every file the receiver reads at startup under `dir` and return a
/// config pointing at them, with ephemeral ports and fast polling.
#[allow(dead_code)]
pub fn receiver_config(dir: &Path, contract: &[u8]) -> ReceiverConfig {
    let producer = dir.join("producer.properties");
    let http_server = dir.join("http-server.properties");
    let contract_path = dir.join("data");
    let tracing_dir = dir.join("tracing");

    fs::write(&producer, "bootstrap.servers=localhost:9092\nacks=all\n").unwrap();
    fs::write(&http_server, "maxBodySize=65536\n").unwrap();
    fs::write(&contract_path, contract).unwrap();
    fs::create_dir_all(&tracing_dir).unwrap();

    let mut config = ReceiverConfig::default();
    config.ingress.bind_host = "127.0.0.1".into();
    config.ingress.port = 0;
    config.ingress.tls_port = 0;
    config.ingress.instances = Some(2);
    config.paths.producer_config = producer;
    config.paths.http_server_config = http_server;
    config.paths.contract = contract_path;
    config.paths.tracing_dir = tracing_dir;
    config.watcher.poll_interval_ms = 50;
    config.startup.wait_secs = 5;
    config.startup.phase_timeout_secs = 5;
    config.capability.startup_timeout_secs = 2;
    config.shutdown.close_timeout_secs = 2;
    config
}

/// Start a mock control plane answering every request with `f()`.
#[allow(dead_code)]
pub async fn start_control_plane<F, Fut>(f: F) -> SocketAddr
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        let mut buf = [0u8; 4096];
                        let _ = socket.read(&mut buf).await;

                        let (status, body) = f().await;
                        let status_text = match status {
                            200 => "200 OK",
                            401 => "401 Unauthorized",
                            403 => "403 Forbidden",
                            500 => "500 Internal Server Error",
                            _ => "200 OK",
                        };
                        let response = format!(
                            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_text,
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

/// Poll `condition` every 10ms until it holds or `limit` elapses.
#[allow(dead_code)]
pub async fn wait_until<F>(limit: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + limit;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
