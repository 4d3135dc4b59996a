//! commlink - layered blocking HTTP/message client
//!
//! This crate provides a client-side communication stack built from small,
//! composable layers:
//!
//! - `channel`: blocking binary channel traits and stackable content-transfer
//!   decorators (chunked, length-prefixed, deflate, multipart, counting)
//! - `http`: HTTP value types (protocol version, request/status lines,
//!   byte ranges, entity tags) with paired parse/format operations
//! - `message`: headers, parameters and the message capability trait
//! - `session`: blocking transport with cooperative poll-based timeouts
//! - `tls`: TLS configuration and per-connection session info over OpenSSL
//! - `client`: the connection state machine, filter chains, progress
//!   listeners, connection factories and a high-level request executor
//!
//! # Examples
//!
//! ```no_run
//! use commlink::client::ConnectionFactoryRegistry;
//!
//! let registry = ConnectionFactoryRegistry::with_defaults();
//! let mut connection = registry.create_connection("http://localhost:8080", None).unwrap();
//!
//! let mut request = connection.create_request("GET", "/status").unwrap();
//! request.add_header("Accept", "application/json").unwrap();
//!
//! connection.send(&mut request).unwrap();
//! let mut response = connection.create_response();
//! connection.receive(&mut response).unwrap();
//! assert_eq!(response.status_line().unwrap().code(), 200);
//! ```

pub mod channel;
pub mod client;
pub mod http;
pub mod message;
pub mod session;
pub mod tls;
