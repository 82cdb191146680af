//! Palika bot crate - HTTP client for the remote bot-answer API.
//!
//! One query is one POST with a 30-second timeout and exactly one attempt;
//! HTTP failures are mapped to typed errors and never retried here.

use serde::{Deserialize, Serialize};
use tracing::debug;

use palika_core::config::BotConfig;
use palika_core::error::PalikaError;

/// Errors from the bot-answer API.
#[derive(Debug, thiserror::Error)]
pub enum BotError {
    #[error("authentication failed")]
    AuthenticationFailed,
    #[error("access denied")]
    AccessDenied,
    #[error("bot service unreachable: {0}")]
    Unreachable(String),
    #[error("bot request timed out after {0}s")]
    Timeout(u64),
    #[error("bot service error (status {0})")]
    Provider(u16),
    #[error("malformed bot response: {0}")]
    MalformedResponse(String),
    #[error("failed to build HTTP client: {0}")]
    Client(String),
}

impl From<BotError> for PalikaError {
    fn from(err: BotError) -> Self {
        PalikaError::Bot(err.to_string())
    }
}

/// Request body of the query endpoint.
#[derive(Debug, Serialize)]
struct BotQuery<'a> {
    query: &'a str,
}

/// Response body of the query endpoint.
#[derive(Debug, Deserialize)]
struct BotAnswer {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    answer: String,
}

/// Client for the remote question-answering endpoint.
pub struct BotClient {
    client: reqwest::Client,
    endpoint: String,
    timeout_secs: u64,
}

impl BotClient {
    /// Build a client from the bot section of the configuration.
    pub fn new(config: &BotConfig) -> Result<Self, BotError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| BotError::Client(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            timeout_secs: config.timeout_secs,
        })
    }

    /// Send one text query, optionally authenticated with a bearer token.
    ///
    /// Guests omit the token and the request carries no Authorization
    /// header. Exactly one attempt is made.
    pub async fn send_query(
        &self,
        query: &str,
        token: Option<&str>,
    ) -> Result<String, BotError> {
        debug!(endpoint = %self.endpoint, authenticated = token.is_some(), "Sending bot query");

        let mut request = self.client.post(&self.endpoint).json(&BotQuery { query });
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                BotError::Timeout(self.timeout_secs)
            } else {
                BotError::Unreachable(e.to_string())
            }
        })?;

        let status = response.status();
        match status.as_u16() {
            200..=299 => {}
            401 => return Err(BotError::AuthenticationFailed),
            403 => return Err(BotError::AccessDenied),
            code => return Err(BotError::Provider(code)),
        }

        let answer: BotAnswer = response
            .json()
            .await
            .map_err(|e| BotError::MalformedResponse(e.to_string()))?;

        if !answer.success || answer.answer.is_empty() {
            return Err(BotError::MalformedResponse(
                "response carried no answer".to_string(),
            ));
        }

        Ok(answer.answer)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    fn http_response(status_line: &str, body: &str) -> String {
        format!(
            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status_line,
            body.len(),
            body
        )
    }

    /// Serve exactly one connection, returning the raw request text.
    async fn one_shot_server(response: String) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let endpoint = format!("http://{}/palika/bot/", listener.local_addr().unwrap());

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let request = read_request(&mut socket).await;
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            request
        });

        (endpoint, handle)
    }

    async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
        let mut data = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            data.extend_from_slice(&buf[..n]);
            let text = String::from_utf8_lossy(&data);
            if let Some(idx) = text.find("\r\n\r\n") {
                let content_length = text[..idx]
                    .lines()
                    .find_map(|line| {
                        line.to_ascii_lowercase()
                            .strip_prefix("content-length:")
                            .and_then(|v| v.trim().parse::<usize>().ok())
                    })
                    .unwrap_or(0);
                if data.len() >= idx + 4 + content_length {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&data).to_string()
    }

    fn make_client(endpoint: &str, timeout_secs: u64) -> BotClient {
        BotClient::new(&BotConfig {
            endpoint: endpoint.to_string(),
            timeout_secs,
            ..BotConfig::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_successful_query_returns_answer() {
        let body = r#"{"success": true, "answer": "Your ward office is open 10-5."}"#;
        let (endpoint, server) = one_shot_server(http_response("200 OK", body)).await;

        let client = make_client(&endpoint, 5);
        let answer = client.send_query("ward office hours", None).await.unwrap();

        assert_eq!(answer, "Your ward office is open 10-5.");
        let request = server.await.unwrap();
        assert!(request.contains(r#""query":"ward office hours""#));
    }

    #[tokio::test]
    async fn test_guest_query_has_no_authorization_header() {
        let body = r#"{"success": true, "answer": "Hello!"}"#;
        let (endpoint, server) = one_shot_server(http_response("200 OK", body)).await;

        let client = make_client(&endpoint, 5);
        client.send_query("Hello", None).await.unwrap();

        let request = server.await.unwrap();
        assert!(!request.to_ascii_lowercase().contains("authorization"));
    }

    #[tokio::test]
    async fn test_token_sent_as_bearer() {
        let body = r#"{"success": true, "answer": "ok"}"#;
        let (endpoint, server) = one_shot_server(http_response("200 OK", body)).await;

        let client = make_client(&endpoint, 5);
        client.send_query("Hello", Some("tok-123")).await.unwrap();

        let request = server.await.unwrap();
        assert!(request.contains("Bearer tok-123"));
    }

    #[tokio::test]
    async fn test_401_maps_to_authentication_failed() {
        let (endpoint, _server) =
            one_shot_server(http_response("401 Unauthorized", "{}")).await;

        let client = make_client(&endpoint, 5);
        let err = client.send_query("q", Some("expired")).await.unwrap_err();
        assert!(matches!(err, BotError::AuthenticationFailed));
    }

    #[tokio::test]
    async fn test_403_maps_to_access_denied() {
        let (endpoint, _server) = one_shot_server(http_response("403 Forbidden", "{}")).await;

        let client = make_client(&endpoint, 5);
        let err = client.send_query("q", Some("tok")).await.unwrap_err();
        assert!(matches!(err, BotError::AccessDenied));
    }

    #[tokio::test]
    async fn test_500_maps_to_provider_with_status() {
        let (endpoint, _server) =
            one_shot_server(http_response("500 Internal Server Error", "{}")).await;

        let client = make_client(&endpoint, 5);
        let err = client.send_query("q", None).await.unwrap_err();
        assert!(matches!(err, BotError::Provider(500)));
    }

    #[tokio::test]
    async fn test_unsuccessful_body_is_malformed() {
        let body = r#"{"success": false, "answer": ""}"#;
        let (endpoint, _server) = one_shot_server(http_response("200 OK", body)).await;

        let client = make_client(&endpoint, 5);
        let err = client.send_query("q", None).await.unwrap_err();
        assert!(matches!(err, BotError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn test_non_json_body_is_malformed() {
        let (endpoint, _server) =
            one_shot_server(http_response("200 OK", "<html>oops</html>")).await;

        let client = make_client(&endpoint, 5);
        let err = client.send_query("q", None).await.unwrap_err();
        assert!(matches!(err, BotError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn test_connection_refused_is_unreachable() {
        // Bind then drop to obtain a port nobody listens on.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let endpoint = format!("http://{}/palika/bot/", listener.local_addr().unwrap());
        drop(listener);

        let client = make_client(&endpoint, 5);
        let err = client.send_query("q", None).await.unwrap_err();
        assert!(matches!(err, BotError::Unreachable(_)));
    }

    #[tokio::test]
    async fn test_slow_server_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let endpoint = format!("http://{}/palika/bot/", listener.local_addr().unwrap());

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let _ = read_request(&mut socket).await;
            // Never respond within the client timeout.
            tokio::time::sleep(std::time::Duration::from_secs(5)).await;
        });

        let client = make_client(&endpoint, 1);
        let err = client.send_query("q", None).await.unwrap_err();
        assert!(matches!(err, BotError::Timeout(1)));
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            BotError::AuthenticationFailed.to_string(),
            "authentication failed"
        );
        assert_eq!(
            BotError::Provider(502).to_string(),
            "bot service error (status 502)"
        );
        assert_eq!(
            BotError::Timeout(30).to_string(),
            "bot request timed out after 30s"
        );
    }

    #[test]
    fn test_error_converts_to_palika_error() {
        let err: PalikaError = BotError::AccessDenied.into();
        assert!(matches!(err, PalikaError::Bot(_)));
        assert!(err.to_string().contains("access denied"));
    }
}
