//! Test support: a local HTTP server standing in for the authority webhook.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use url::Url;

type Replies = HashMap<String, Vec<(u16, String)>>;

/// Minimal HTTP/1.1 server answering by the request's `action`.
///
/// Several replies for one action are served in order and the last one
/// repeats. Actions without a reply get a 404.
pub struct MockWebhook {
    pub url: Url,
    requests: Arc<Mutex<Vec<serde_json::Value>>>,
    handle: JoinHandle<()>,
}

impl MockWebhook {
    pub async fn start(replies: Vec<(&str, u16, &str)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock webhook");
        let addr = listener.local_addr().expect("mock webhook address");

        let mut scripted = Replies::new();
        for (action, status, body) in replies {
            scripted
                .entry(action.to_string())
                .or_default()
                .push((status, body.to_string()));
        }

        let requests = Arc::new(Mutex::new(Vec::new()));
        let recorded = requests.clone();
        let handle = tokio::spawn(async move {
            let mut scripted = scripted;
            while let Ok((stream, _)) = listener.accept().await {
                serve(stream, &mut scripted, &recorded).await;
            }
        });

        Self {
            url: Url::parse(&format!("http://{}/webhook", addr)).expect("mock webhook url"),
            requests,
            handle,
        }
    }

    /// Request bodies received so far, in arrival order.
    pub fn requests(&self) -> Vec<serde_json::Value> {
        lock(&self.requests).clone()
    }

    /// Count of requests carrying this `action`.
    pub fn count(&self, action: &str) -> usize {
        lock(&self.requests)
            .iter()
            .filter(|r| r["action"] == action)
            .count()
    }
}

impl Drop for MockWebhook {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn next_reply(scripted: &mut Replies, action: &str) -> (u16, String) {
    match scripted.get_mut(action) {
        Some(queue) if queue.len() > 1 => queue.remove(0),
        Some(queue) => queue.first().cloned().unwrap_or((404, String::new())),
        None => (404, String::new()),
    }
}

async fn serve(
    mut stream: TcpStream,
    scripted: &mut Replies,
    recorded: &Mutex<Vec<serde_json::Value>>,
) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];

    let header_end = loop {
        let Ok(n) = stream.read(&mut chunk).await else {
            return;
        };
        if n == 0 {
            return;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };
    let mut body = buf[header_end..].to_vec();

    let head = String::from_utf8_lossy(&buf[..header_end]).to_ascii_lowercase();
    let content_length = head
        .lines()
        .find_map(|l| l.strip_prefix("content-length:"))
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(0);

    while body.len() < content_length {
        let Ok(n) = stream.read(&mut chunk).await else {
            return;
        };
        if n == 0 {
            break;
        }
        body.extend_from_slice(&chunk[..n]);
    }

    let request: serde_json::Value = serde_json::from_slice(&body).unwrap_or_default();
    let action = request["action"].as_str().unwrap_or_default().to_string();
    lock(recorded).push(request);

    let (status, reply) = next_reply(scripted, &action);
    let content_type = if serde_json::from_str::<serde_json::Value>(&reply).is_ok() {
        "application/json"
    } else {
        "text/html"
    };

    let response = format!(
        "HTTP/1.1 {} Mock\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        content_type,
        reply.len(),
        reply
    );
    let _ = stream.write_all(response.as_bytes()).await;
    let _ = stream.shutdown().await;
}
