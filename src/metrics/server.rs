use prometheus::{Encoder, TextEncoder};
use std::net::SocketAddr;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tracing::{error, info};

/// Encodes every registered metric in the Prometheus text format
pub fn render_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!("Failed to encode metrics: {}", e);
        return String::new();
    }

    String::from_utf8_lossy(&buffer).into_owned()
}

/// Start a simple Prometheus metrics server in the background
pub async fn start_metrics_server(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;

    info!(
        "Starting Prometheus metrics server on http://{}/metrics",
        addr
    );

    tokio::spawn(async move {
        if let Err(e) = run_metrics_server(listener).await {
            error!("Metrics server error: {}", e);
        }
    });

    Ok(())
}

async fn run_metrics_server(listener: TcpListener) -> std::io::Result<()> {
    loop {
        let (mut stream, _) = listener.accept().await?;

        tokio::spawn(async move {
            let mut buffer = [0; 1024];

            // Every request is answered with the metrics page
            match stream.read(&mut buffer).await {
                Ok(_) => {
                    let body = render_metrics();
                    let response = format!(
                        "HTTP/1.1 200 OK\r\nContent-Type: text/plain; version=0.0.4\r\nContent-Length: {}\r\n\r\n{}",
                        body.len(),
                        body
                    );

                    let _ = stream.write_all(response.as_bytes()).await;
                }
                Err(e) => {
                    error!("Failed to read from stream: {}", e);
                }
            }
        });
    }
}
