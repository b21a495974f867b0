//! One-shot loopback listener for the OAuth redirect.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use url::Url;

use crate::error::{AuthError, AuthResult};

const MAX_HEADER_LINES: usize = 100;
/// Bytes read from the callback connection, request line and headers included.
const MAX_REQUEST_BYTES: u64 = 8192;

/// Result of the OAuth callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackResult {
    /// Authorization code from the callback
    pub code: String,
    /// State parameter as returned by the provider; not validated here
    pub state: Option<String>,
}

/// Something that can be armed to receive exactly one authorization callback.
///
/// Arming (`listen`) happens before the browser is opened so the redirect can
/// never arrive ahead of the socket.
#[async_trait]
pub trait CallbackReceiver: Send + Sync {
    /// Start listening. Fails fast if the address is taken.
    async fn listen(&self) -> AuthResult<Box<dyn PendingCallback>>;
}

/// An armed receiver waiting for its single callback.
#[async_trait]
pub trait PendingCallback: Send {
    /// Wait for the callback. Consumes the receiver and releases the socket.
    async fn wait(self: Box<Self>) -> AuthResult<CallbackResult>;
}

/// [`CallbackReceiver`] bound to a fixed loopback address.
#[derive(Debug, Clone)]
pub struct LoopbackReceiver {
    addr: SocketAddr,
    timeout: Duration,
}

impl LoopbackReceiver {
    /// Create a receiver for `addr` that gives up after `timeout`.
    pub fn new(addr: SocketAddr, timeout: Duration) -> Self {
        Self { addr, timeout }
    }
}

#[async_trait]
impl CallbackReceiver for LoopbackReceiver {
    async fn listen(&self) -> AuthResult<Box<dyn PendingCallback>> {
        let listener = CallbackListener::bind(self.addr).await?;
        Ok(Box::new(ArmedListener {
            listener,
            timeout: self.timeout,
        }))
    }
}

struct ArmedListener {
    listener: CallbackListener,
    timeout: Duration,
}

#[async_trait]
impl PendingCallback for ArmedListener {
    async fn wait(self: Box<Self>) -> AuthResult<CallbackResult> {
        self.listener.wait_for_callback(self.timeout).await
    }
}

/// Local HTTP listener that serves a single OAuth redirect.
#[derive(Debug)]
pub struct CallbackListener {
    listener: TcpListener,
    addr: SocketAddr,
}

impl CallbackListener {
    /// Bind `addr`.
    pub async fn bind(addr: SocketAddr) -> AuthResult<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| AuthError::Bind {
                addr,
                source: Arc::new(source),
            })?;
        let addr = listener.local_addr()?;
        tracing::debug!(target: "mal_mcp_auth", %addr, "callback listener bound");
        Ok(Self { listener, addr })
    }

    /// Address actually bound (differs from the requested one for port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Accept exactly one request and extract `code` and `state` from it.
    ///
    /// The socket is closed when this returns, whatever the outcome.
    pub async fn wait_for_callback(self, timeout: Duration) -> AuthResult<CallbackResult> {
        let addr = self.addr;
        let result = tokio::time::timeout(timeout, self.serve_one()).await;
        tracing::debug!(target: "mal_mcp_auth", %addr, "callback listener closed");

        match result {
            Ok(result) => result,
            Err(_) => Err(AuthError::Timeout(timeout)),
        }
    }

    async fn serve_one(self) -> AuthResult<CallbackResult> {
        let (mut stream, peer) = self.listener.accept().await?;
        tracing::debug!(target: "mal_mcp_auth", %peer, "callback connection accepted");

        let (read_half, mut write_half) = stream.split();
        let mut reader = BufReader::new(read_half.take(MAX_REQUEST_BYTES));

        let mut request_line = String::new();
        reader.read_line(&mut request_line).await?;

        let result = if request_line.ends_with('\n') {
            // Drain headers so the browser does not see a reset.
            let mut header = String::new();
            for _ in 0..MAX_HEADER_LINES {
                header.clear();
                let n = reader.read_line(&mut header).await?;
                if n == 0 || header == "\r\n" || header == "\n" {
                    break;
                }
            }

            request_line
                .split_whitespace()
                .nth(1)
                .ok_or(AuthError::MissingCode)
                .and_then(parse_callback_target)
        } else {
            tracing::debug!(
                target: "mal_mcp_auth",
                bytes = request_line.len(),
                "callback request line truncated"
            );
            Err(AuthError::Io(Arc::new(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "callback request line is incomplete or too long",
            ))))
        };

        let response = match &result {
            Ok(_) => success_response(),
            Err(e) => error_response(&e.to_string()),
        };
        let _ = write_half.write_all(response.as_bytes()).await;
        let _ = write_half.shutdown().await;

        result
    }
}

/// Parse the request target (`/callback?code=...&state=...`).
fn parse_callback_target(target: &str) -> AuthResult<CallbackResult> {
    let url = Url::parse("http://localhost")?.join(target)?;

    let mut code = None;
    let mut state = None;
    let mut error = None;
    let mut description = None;

    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            "error_description" => description = Some(value.into_owned()),
            _ => {}
        }
    }

    if let Some(error) = error {
        return Err(AuthError::AuthorizationDenied { error, description });
    }

    match code.filter(|c| !c.is_empty()) {
        Some(code) => Ok(CallbackResult { code, state }),
        None => Err(AuthError::MissingCode),
    }
}

fn success_response() -> String {
    let body = r#"<!DOCTYPE html>
<html>
<head><title>Authorization received</title></head>
<body style="font-family: system-ui; text-align: center; padding: 50px;">
<h1>Authorization code received</h1>
<p>You can close this window.</p>
</body>
</html>"#;
    format!(
        "HTTP/1.1 200 OK\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        body.len(),
        body
    )
}

fn error_response(message: &str) -> String {
    let body = format!(
        r#"<!DOCTYPE html>
<html>
<head><title>Authorization failed</title></head>
<body style="font-family: system-ui; text-align: center; padding: 50px;">
<h1>Authorization failed</h1>
<p>{}</p>
</body>
</html>"#,
        html_escape(message)
    );
    format!(
        "HTTP/1.1 400 Bad Request\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        body.len(),
        body
    )
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
