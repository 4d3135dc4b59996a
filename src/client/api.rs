//! High-level request executor
//!
//! [`HttpClient`] wraps a connection behind a two-call surface: `execute`
//! sends a request, `response` collects the outcome as an
//! [`ExecutionStatus`] plus the decoded body. Transport and protocol
//! failures are folded into the status instead of surfacing as errors, so a
//! caller polling a peer can treat every outcome uniformly.

use std::time::Duration;

use serde_json::{json, Value};
use tracing::debug;

use crate::channel;

use crate::message::Message;

use super::connection::HttpClientConnection;
use super::Result;

/// Outcome of one executed request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionStatus {
    /// The peer answered with a success status
    NoError,
    /// The peer answered with a non-success status
    Error(String),
    /// The exchange itself failed before a status was obtained
    ExceptionError(String),
}

impl ExecutionStatus {
    /// Whether the request completed with a success status
    pub fn is_ok(&self) -> bool {
        *self == ExecutionStatus::NoError
    }
}

/// Executes requests over one connection and decodes the answers
pub struct HttpClient {
    connection: HttpClientConnection,
}

impl HttpClient {
    /// Wrap `connection`
    pub fn new(connection: HttpClientConnection) -> Self {
        HttpClient { connection }
    }

    /// The underlying connection
    pub fn connection(&mut self) -> &mut HttpClientConnection {
        &mut self.connection
    }

    /// Send a bodyless request, optionally overriding the connection timeout
    pub fn execute(
        &mut self,
        method: &str,
        path: &str,
        timeout: Option<Duration>,
    ) -> Result<()> {
        if timeout.is_some() {
            self.connection.set_timeout(timeout);
        }
        let mut request = self.connection.create_request(method, path)?;
        self.connection.send(&mut request)
    }

    /// Collect the response to the last executed request
    ///
    /// Failures while receiving or decoding are reported as
    /// [`ExecutionStatus::ExceptionError`] rather than returned.
    pub fn response(&mut self) -> (ExecutionStatus, Value) {
        match self.collect_response() {
            Ok(outcome) => outcome,
            Err(e) => {
                debug!(error = %e, "exchange failed");
                (ExecutionStatus::ExceptionError(e.to_string()), Value::Null)
            }
        }
    }

    fn collect_response(&mut self) -> Result<(ExecutionStatus, Value)> {
        let mut response = self.connection.create_response();
        self.connection.receive(&mut response)?;

        let body = match response.content() {
            Some(content) => channel::read_to_end(content)?,
            None => Vec::new(),
        };
        self.connection.end_response(&mut response)?;

        // receive() guarantees a status line on success
        let status_line = response
            .status_line()
            .ok_or_else(|| super::Error::InvalidState("response without status".to_string()))?;

        let status = if (200..300).contains(&status_line.code()) {
            ExecutionStatus::NoError
        } else {
            ExecutionStatus::Error(status_line.to_string())
        };

        let content_type = response
            .headers()
            .get_first("Content-Type")
            .unwrap_or("")
            .to_string();
        Ok((status, decode_body(&body, &content_type)))
    }
}

fn decode_body(body: &[u8], content_type: &str) -> Value {
    if body.is_empty() {
        return Value::Null;
    }
    if content_type.to_ascii_lowercase().contains("json") {
        match serde_json::from_slice(body) {
            Ok(value) => return value,
            Err(_) => {
                // Fall through to the wrapped representation
            }
        }
    }
    json!({
        "message": String::from_utf8_lossy(body),
        "contentType": content_type,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;

    fn serve_once(response: &'static [u8]) -> (thread::JoinHandle<()>, u16) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut buf = [0u8; 4096];
            // Read until the head terminator before answering
            let mut received = Vec::new();
            loop {
                let n = stream.read(&mut buf).unwrap();
                received.extend_from_slice(&buf[..n]);
                if n == 0 || received.windows(4).any(|w| w == b"\r\n\r\n") {
                    break;
                }
            }
            stream.write_all(response).unwrap();
        });
        (handle, port)
    }

    fn client(port: u16) -> HttpClient {
        HttpClient::new(HttpClientConnection::new("127.0.0.1", port, "", None).unwrap())
    }

    #[test]
    fn test_success_without_body() {
        let (handle, port) = serve_once(b"HTTP/1.1 204 No Content\r\nContent-Length: 0\r\n\r\n");
        let mut client = client(port);

        client
            .execute("GET", "/status", Some(Duration::from_secs(2)))
            .unwrap();
        let (status, body) = client.response();
        assert_eq!(status, ExecutionStatus::NoError);
        assert_eq!(body, Value::Null);

        handle.join().unwrap();
    }

    #[test]
    fn test_no_content_status_while_connection_stays_open() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut buf = [0u8; 4096];
            let mut received = Vec::new();
            loop {
                let n = stream.read(&mut buf).unwrap();
                received.extend_from_slice(&buf[..n]);
                if n == 0 || received.windows(4).any(|w| w == b"\r\n\r\n") {
                    break;
                }
            }
            stream
                .write_all(b"HTTP/1.1 204 No Content\r\n\r\n")
                .unwrap();
            // The socket stays open past the client's timeout; the status
            // must still come back as a success
            thread::sleep(Duration::from_millis(400));
        });

        let mut client = client(port);
        client
            .execute("GET", "/empty", Some(Duration::from_millis(100)))
            .unwrap();
        let (status, body) = client.response();
        assert_eq!(status, ExecutionStatus::NoError);
        assert_eq!(body, Value::Null);

        handle.join().unwrap();
    }

    #[test]
    fn test_error_status() {
        let (handle, port) =
            serve_once(b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\n\r\n");
        let mut client = client(port);

        client.execute("GET", "/missing", None).unwrap();
        let (status, _) = client.response();
        match status {
            ExecutionStatus::Error(text) => assert!(text.contains("404")),
            other => panic!("unexpected status: {:?}", other),
        }

        handle.join().unwrap();
    }

    #[test]
    fn test_json_body_is_decoded() {
        let (handle, port) = serve_once(
            b"HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 7\r\n\r\n{\"a\":1}",
        );
        let mut client = client(port);

        client.execute("GET", "/data", None).unwrap();
        let (status, body) = client.response();
        assert_eq!(status, ExecutionStatus::NoError);
        assert_eq!(body, json!({"a": 1}));

        handle.join().unwrap();
    }

    #[test]
    fn test_non_json_body_is_wrapped() {
        let (handle, port) = serve_once(
            b"HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: 5\r\n\r\nhello",
        );
        let mut client = client(port);

        client.execute("GET", "/text", None).unwrap();
        let (_, body) = client.response();
        assert_eq!(body["message"], "hello");
        assert_eq!(body["contentType"], "text/plain");

        handle.join().unwrap();
    }

    #[test]
    fn test_exchange_failure_becomes_exception_status() {
        let mut client = client(1);
        // Nothing was sent, so there is no response to receive
        let (status, body) = client.response();
        assert!(matches!(status, ExecutionStatus::ExceptionError(_)));
        assert_eq!(body, Value::Null);
    }
}
