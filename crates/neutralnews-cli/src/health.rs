use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tracing::{error, warn};

/// Minimal health probe: a raw TCP listener that answers every request with
/// `200 ok`, regardless of method or path. No router needed for one route.
pub async fn serve(port: u16) {
    let listener = match TcpListener::bind(("0.0.0.0", port)).await {
        Ok(l) => l,
        Err(e) => {
            error!(port, error = %e, "failed to bind health probe port");
            return;
        }
    };

    loop {
        let (mut socket, _) = match listener.accept().await {
            Ok(pair) => pair,
            Err(e) => {
                warn!(error = %e, "health probe accept failed");
                continue;
            }
        };

        tokio::spawn(async move {
            let mut buf = [0u8; 512];
            let _ = socket.read(&mut buf).await;
            let body = "ok";
            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nContent-Type: text/plain\r\nConnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            let _ = socket.write_all(response.as_bytes()).await;
        });
    }
}
