//! Local fake forward proxies for probe tests

use reqwest::StatusCode;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

#[derive(Debug, Clone)]
pub(crate) enum ProxyBehavior {
    Respond {
        status: u16,
        headers: Vec<(&'static str, &'static str)>,
        delay: Duration,
    },
    /// Accept the connection and never answer
    Hang,
}

impl ProxyBehavior {
    pub(crate) fn respond(status: u16) -> Self {
        Self::Respond {
            status,
            headers: Vec::new(),
            delay: Duration::ZERO,
        }
    }

    pub(crate) fn with_header(mut self, name: &'static str, value: &'static str) -> Self {
        if let Self::Respond { headers, .. } = &mut self {
            headers.push((name, value));
        }
        self
    }

    pub(crate) fn with_delay(mut self, wait: Duration) -> Self {
        if let Self::Respond { delay, .. } = &mut self {
            *delay = wait;
        }
        self
    }
}

/// Start a fake proxy, returning its endpoint and a request counter
pub(crate) async fn spawn_proxy(behavior: ProxyBehavior) -> (String, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&hits);
    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            let behavior = behavior.clone();
            let counter = Arc::clone(&counter);
            tokio::spawn(async move {
                serve(socket, behavior, counter).await;
            });
        }
    });

    (format!("http://{}", addr), hits)
}

/// Endpoint with nothing listening on it
pub(crate) async fn refused_endpoint() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

async fn serve(mut socket: TcpStream, behavior: ProxyBehavior, hits: Arc<AtomicUsize>) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }
    hits.fetch_add(1, Ordering::SeqCst);

    match behavior {
        ProxyBehavior::Hang => {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        ProxyBehavior::Respond {
            status,
            headers,
            delay,
        } => {
            tokio::time::sleep(delay).await;
            let reason = StatusCode::from_u16(status)
                .ok()
                .and_then(|s| s.canonical_reason())
                .unwrap_or("Unknown");
            let extra: String = headers
                .iter()
                .map(|(name, value)| format!("{}: {}\r\n", name, value))
                .collect();
            let response = format!(
                "HTTP/1.1 {} {}\r\n{}Content-Length: 0\r\nConnection: close\r\n\r\n",
                status, reason, extra
            );
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
        }
    }
}
