//! Shared HTTP retry loop for the provider clients
//!
//! Transport errors and 429 responses are retried with exponential backoff;
//! other error statuses fail at once with the provider's message.

use std::future::Future;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    /// Doubled on every retry
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_millis(2000),
        }
    }
}

impl RetryPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        self.initial_backoff * 2u32.saturating_pow(attempt)
    }
}

#[derive(Debug, Deserialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// Send until success and return the response body
///
/// `label` names the API in errors and logs (`LLM`, `Embedding`).
pub async fn send_with_retry<F, Fut>(label: &str, policy: &RetryPolicy, mut send: F) -> Result<String>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = reqwest::Result<reqwest::Response>>,
{
    let mut last_error: Option<anyhow::Error> = None;

    for attempt in 0..=policy.max_retries {
        let backoff = policy.backoff(attempt);
        let retry = attempt < policy.max_retries;

        let response = match send().await {
            Ok(resp) => resp,
            Err(e) => {
                last_error = Some(anyhow::anyhow!("Failed to send {} request: {}", label, e));
                if retry {
                    tracing::warn!(
                        "{} request failed, retrying in {:?} (attempt {}/{})",
                        label,
                        backoff,
                        attempt + 1,
                        policy.max_retries
                    );
                    tokio::time::sleep(backoff).await;
                    continue;
                }
                break;
            }
        };

        let status = response.status();
        let body = response
            .text()
            .await
            .context("Failed to read response body")?;

        if status.is_success() {
            return Ok(body);
        }

        if status.as_u16() != 429 {
            if let Ok(error) = serde_json::from_str::<ApiError>(&body) {
                anyhow::bail!("{} API error ({}): {}", label, status, error.error.message);
            }
            anyhow::bail!("{} API error ({}): {}", label, status, body);
        }

        last_error = Some(anyhow::anyhow!("Rate limit exceeded (429)"));
        if retry {
            tracing::warn!(
                "Rate limit hit (429), backing off {:?} (attempt {}/{})",
                backoff,
                attempt + 1,
                policy.max_retries
            );
            tokio::time::sleep(backoff).await;
        }
    }

    Err(last_error.unwrap_or_else(|| {
        anyhow::anyhow!("{} request failed after {} retries", label, policy.max_retries)
    }))
}

/// Minimal HTTP/1.1 server replaying canned responses, one per connection
#[cfg(test)]
pub(crate) mod test_server {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    pub struct TestServer {
        pub url: String,
        hits: Arc<AtomicUsize>,
        bodies: Arc<Mutex<Vec<String>>>,
    }

    impl TestServer {
        pub fn hits(&self) -> usize {
            self.hits.load(Ordering::SeqCst)
        }

        /// Request bodies received so far
        pub fn bodies(&self) -> Vec<String> {
            self.bodies.lock().unwrap().clone()
        }
    }

    async fn read_request(socket: &mut TcpStream) -> String {
        let mut data = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            data.extend_from_slice(&chunk[..n]);

            let text = String::from_utf8_lossy(&data);
            if let Some(end) = text.find("\r\n\r\n") {
                let length = text[..end]
                    .lines()
                    .find_map(|l| {
                        let (name, value) = l.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())?
                    })
                    .unwrap_or(0);
                if data.len() >= end + 4 + length {
                    return String::from_utf8_lossy(&data[end + 4..end + 4 + length]).into_owned();
                }
            }
        }
        String::new()
    }

    pub async fn serve(responses: Vec<(u16, &'static str)>) -> TestServer {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let hits = Arc::new(AtomicUsize::new(0));
        let bodies = Arc::new(Mutex::new(Vec::new()));

        let (counter, received) = (hits.clone(), bodies.clone());
        tokio::spawn(async move {
            for (status, body) in responses {
                let (mut socket, _) = listener.accept().await.unwrap();
                counter.fetch_add(1, Ordering::SeqCst);
                let request = read_request(&mut socket).await;
                received.lock().unwrap().push(request);

                let reply = format!(
                    "HTTP/1.1 {} Status\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                socket.write_all(reply.as_bytes()).await.unwrap();
                let _ = socket.shutdown().await;
            }
        });

        TestServer { url, hits, bodies }
    }
}
