//! Connection factories
//!
//! A factory turns a connection URI into an unconnected
//! [`HttpClientConnection`]. The registry holds an ordered list of factories
//! and hands the URI to the first one claiming its scheme, so additional
//! schemes can be plugged in next to the built-in http/https support.

use std::sync::Arc;

use crate::tls::TlsConfig;

use super::connection::HttpClientConnection;
use super::{Error, Result};

/// The parts of a connection URI: `scheme://host[:port][/path]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionUri {
    scheme: String,
    host: String,
    port: u16,
    path: String,
}

impl ConnectionUri {
    /// Parse a connection URI
    ///
    /// The port defaults from the scheme (80 for http, 443 for https); the
    /// path defaults to empty.
    pub fn parse(uri: &str) -> Result<Self> {
        let (scheme, rest) = uri
            .split_once("://")
            .ok_or_else(|| Error::InvalidArgument(format!("URI without scheme: {}", uri)))?;
        if scheme.is_empty() {
            return Err(Error::InvalidArgument(format!("URI without scheme: {}", uri)));
        }

        let (authority, path) = match rest.find('/') {
            Some(pos) => (&rest[..pos], &rest[pos..]),
            None => (rest, ""),
        };

        let (host, port) = match authority.rsplit_once(':') {
            Some((host, port_text)) => {
                let port = port_text.parse::<u16>().map_err(|_| {
                    Error::InvalidArgument(format!("invalid port in URI: {}", uri))
                })?;
                (host, port)
            }
            None => {
                let default = match scheme {
                    "https" => 443,
                    _ => 80,
                };
                (authority, default)
            }
        };
        if host.is_empty() {
            return Err(Error::InvalidArgument(format!("URI without host: {}", uri)));
        }

        Ok(ConnectionUri {
            scheme: scheme.to_string(),
            host: host.to_string(),
            port,
            path: path.to_string(),
        })
    }

    /// The URI scheme
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// The host part
    pub fn host(&self) -> &str {
        &self.host
    }

    /// The explicit or scheme-default port
    pub fn port(&self) -> u16 {
        self.port
    }

    /// The path part, possibly empty
    pub fn path(&self) -> &str {
        &self.path
    }
}

/// Builds connections for the URI schemes it recognizes
pub trait ConnectionFactory: Send + Sync {
    /// Whether this factory handles `uri`'s scheme
    fn supports_uri(&self, uri: &str) -> bool;

    /// Build an unconnected connection for `uri`
    ///
    /// An explicit `tls` configuration overrides the factory's default for
    /// schemes that use TLS.
    fn create_connection(
        &self,
        uri: &str,
        tls: Option<TlsConfig>,
    ) -> Result<HttpClientConnection>;
}

/// Built-in factory for `http` and `https` URIs
#[derive(Debug, Default)]
pub struct HttpConnectionFactory;

impl HttpConnectionFactory {
    pub fn new() -> Self {
        HttpConnectionFactory
    }
}

impl ConnectionFactory for HttpConnectionFactory {
    fn supports_uri(&self, uri: &str) -> bool {
        uri.starts_with("http://") || uri.starts_with("https://")
    }

    fn create_connection(
        &self,
        uri: &str,
        tls: Option<TlsConfig>,
    ) -> Result<HttpClientConnection> {
        let parsed = ConnectionUri::parse(uri)?;
        let tls = match parsed.scheme() {
            "https" => Some(match tls {
                Some(config) => config,
                None => TlsConfig::client().servername(parsed.host()).build()?,
            }),
            _ => None,
        };
        HttpClientConnection::new(parsed.host(), parsed.port(), parsed.path(), tls)
    }
}

/// Ordered collection of factories, asked in registration order
pub struct ConnectionFactoryRegistry {
    factories: Vec<Arc<dyn ConnectionFactory>>,
}

impl ConnectionFactoryRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        ConnectionFactoryRegistry {
            factories: Vec::new(),
        }
    }

    /// Create a registry with the built-in http/https factory registered
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(HttpConnectionFactory::new()));
        registry
    }

    /// Register a factory behind the already registered ones
    pub fn register(&mut self, factory: Arc<dyn ConnectionFactory>) {
        self.factories.push(factory);
    }

    /// Number of registered factories
    pub fn factory_count(&self) -> usize {
        self.factories.len()
    }

    /// Build a connection using the first factory claiming `uri`
    pub fn create_connection(
        &self,
        uri: &str,
        tls: Option<TlsConfig>,
    ) -> Result<HttpClientConnection> {
        for factory in &self.factories {
            if factory.supports_uri(uri) {
                return factory.create_connection(uri, tls);
            }
        }
        Err(Error::InvalidArgument(format!(
            "no factory supports URI: {}",
            uri
        )))
    }
}

impl Default for ConnectionFactoryRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
