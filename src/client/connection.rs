//! HTTP client connection
//!
//! The half-duplex exchange state machine: Idle → RequestStarted (after
//! `send`) → ResponseReceiving (after `receive`) → Idle (after
//! `end_response`), with Closed as an orthogonal terminal state. The
//! connection connects lazily on the first `send`, so its single timeout
//! value governs resolution, connect, reads and writes alike.
//!
//! Request bodies without a `Content-Length` header are sent with chunked
//! framing, which also carries abort markers when a send fails mid-body.
//! Response bodies are delivered through a content channel assembled from
//! the framing the head announces (chunked, content-length or
//! read-to-close) plus an inflate stage for `Content-Encoding: deflate`.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, trace};

use crate::channel::{
    self, ChunkedMessageContentIBinaryChannel, ChunkedMessageContentOBinaryChannel, ContentInput,
    IBinaryChannel, InflaterMessageContentIBinaryChannel,
    LengthPrefixedMessageContentIBinaryChannel, MessageContentIBinaryChannel,
    MessageContentOBinaryChannel, NullIBinaryChannel, OBinaryChannel, ProgressIBinaryChannel,
    ProgressListener, ProgressOBinaryChannel,
};
use crate::message::Message;
use crate::session::{
    shared, SessionOps, SharedTransport, TcpSessionOps, Transport, TransportIBinaryChannel,
    TransportOBinaryChannel,
};
use crate::tls::{TlsConfig, TlsSession};

use super::filter::{FilterSet, RequestFilter, ResponseFilter};
use super::message::{ClientRequest, ClientResponse};
use super::parser::ResponseHeadParser;
use super::progress::{ConnectionProgressListener, Direction, ProgressFanout};
use super::{Error, Result};

/// Accumulated connection traffic counters
#[derive(Debug, Default)]
pub struct Statistics {
    messages_sent: AtomicU64,
    messages_received: AtomicU64,
    bytes_sent: AtomicU64,
    bytes_received: AtomicU64,
}

impl Statistics {
    /// Requests fully sent
    pub fn messages_sent(&self) -> u64 {
        self.messages_sent.load(Ordering::Relaxed)
    }

    /// Responses fully received
    pub fn messages_received(&self) -> u64 {
        self.messages_received.load(Ordering::Relaxed)
    }

    /// Wire bytes written, head and body
    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent.load(Ordering::Relaxed)
    }

    /// Wire bytes read, head and body
    pub fn bytes_received(&self) -> u64 {
        self.bytes_received.load(Ordering::Relaxed)
    }

    fn add_message_sent(&self) {
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
    }

    fn add_message_received(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    fn add_bytes_sent(&self, n: u64) {
        self.bytes_sent.fetch_add(n, Ordering::Relaxed);
    }

    fn add_bytes_received(&self, n: u64) {
        self.bytes_received.fetch_add(n, Ordering::Relaxed);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectionState {
    Idle,
    RequestStarted,
    ResponseReceiving,
}

/// Progress hook updating statistics and fanning out to attached listeners
struct ExchangeProgress {
    stats: Arc<Statistics>,
    fanout: ProgressFanout,
    direction: Direction,
    last: AtomicU64,
}

impl ExchangeProgress {
    fn new(
        stats: Arc<Statistics>,
        listeners: Vec<Arc<dyn ConnectionProgressListener>>,
        direction: Direction,
    ) -> Self {
        ExchangeProgress {
            stats,
            fanout: ProgressFanout::new(listeners, direction),
            direction,
            last: AtomicU64::new(0),
        }
    }
}

impl ProgressListener for ExchangeProgress {
    fn progress(&self, total_bytes: u64) {
        let prev = self.last.swap(total_bytes, Ordering::Relaxed);
        let delta = total_bytes.saturating_sub(prev);
        match self.direction {
            Direction::Request => self.stats.add_bytes_sent(delta),
            Direction::Response => self.stats.add_bytes_received(delta),
        }
        self.fanout.progress(total_bytes);
    }
}

/// Serves buffered head-overrun bytes before reading from the transport
struct PrefixedIBinaryChannel {
    prefix: Vec<u8>,
    position: usize,
    inner: TransportIBinaryChannel,
}

impl PrefixedIBinaryChannel {
    fn new(prefix: Vec<u8>, inner: TransportIBinaryChannel) -> Self {
        PrefixedIBinaryChannel {
            prefix,
            position: 0,
            inner,
        }
    }
}

impl IBinaryChannel for PrefixedIBinaryChannel {
    fn read(&mut self, buf: &mut [u8]) -> channel::Result<usize> {
        if self.position < self.prefix.len() {
            let n = (self.prefix.len() - self.position).min(buf.len());
            buf[..n].copy_from_slice(&self.prefix[self.position..self.position + n]);
            self.position += n;
            return Ok(n);
        }
        self.inner.read(buf)
    }

    fn close(&mut self) -> channel::Result<()> {
        self.inner.close()
    }
}

/// Read-to-close body framing with one byte of lookahead for
/// `has_more_content`
struct EofContentIBinaryChannel<C: IBinaryChannel> {
    inner: C,
    lookahead: Option<u8>,
    eos: bool,
}

impl<C: IBinaryChannel> EofContentIBinaryChannel<C> {
    fn new(inner: C) -> Self {
        EofContentIBinaryChannel {
            inner,
            lookahead: None,
            eos: false,
        }
    }
}

impl<C: IBinaryChannel> IBinaryChannel for EofContentIBinaryChannel<C> {
    fn read(&mut self, buf: &mut [u8]) -> channel::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if let Some(byte) = self.lookahead.take() {
            buf[0] = byte;
            return Ok(1);
        }
        if self.eos {
            return Ok(0);
        }
        let n = self.inner.read(buf)?;
        if n == 0 {
            self.eos = true;
        }
        Ok(n)
    }

    fn close(&mut self) -> channel::Result<()> {
        self.inner.close()
    }
}

impl<C: IBinaryChannel> MessageContentIBinaryChannel for EofContentIBinaryChannel<C> {
    fn has_more_content(&mut self) -> channel::Result<bool> {
        if self.lookahead.is_some() {
            return Ok(true);
        }
        if self.eos {
            return Ok(false);
        }
        let mut byte = [0u8; 1];
        if self.inner.read(&mut byte)? == 0 {
            self.eos = true;
            Ok(false)
        } else {
            self.lookahead = Some(byte[0]);
            Ok(true)
        }
    }
}

fn encode_query_component(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for byte in text.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                out.push(byte as char)
            }
            other => out.push_str(&format!("%{:02X}", other)),
        }
    }
    out
}

/// A blocking HTTP connection to one host
pub struct HttpClientConnection {
    host: String,
    port: u16,
    base_path: String,
    tls_config: Option<TlsConfig>,

    transport: Option<SharedTransport>,
    tls_session: Option<TlsSession>,
    remote_addr: Option<SocketAddr>,
    local_addr: Option<SocketAddr>,
    timeout: Option<Duration>,

    state: ConnectionState,
    closed: bool,
    request_counter: u64,
    last_request: Option<ClientRequest>,

    request_filters: Vec<Arc<dyn RequestFilter>>,
    response_filters: Vec<Arc<dyn ResponseFilter>>,
    listeners: Vec<Arc<dyn ConnectionProgressListener>>,
    stats: Arc<Statistics>,
}

impl HttpClientConnection {
    /// Create an unconnected connection; the socket is opened on the first
    /// `send`
    pub fn new(
        host: impl Into<String>,
        port: u16,
        base_path: impl Into<String>,
        tls_config: Option<TlsConfig>,
    ) -> Result<Self> {
        let host = host.into();
        if host.is_empty() {
            return Err(Error::InvalidArgument("empty host".to_string()));
        }
        Ok(HttpClientConnection {
            host,
            port,
            base_path: base_path.into(),
            tls_config,
            transport: None,
            tls_session: None,
            remote_addr: None,
            local_addr: None,
            timeout: Some(Duration::from_secs(10)),
            state: ConnectionState::Idle,
            closed: false,
            request_counter: 0,
            last_request: None,
            request_filters: Vec::new(),
            response_filters: Vec::new(),
            listeners: Vec::new(),
            stats: Arc::new(Statistics::default()),
        })
    }

    /// The host this connection targets
    pub fn host(&self) -> &str {
        &self.host
    }

    /// The port this connection targets
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Set the timeout governing connect, read and write waits
    pub fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.timeout = timeout;
        if let Some(transport) = &self.transport {
            transport
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .set_timeout(timeout);
        }
    }

    /// The current timeout
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// The peer address, once connected
    pub fn remote_address(&self) -> Option<SocketAddr> {
        self.remote_addr
    }

    /// The local address, once connected
    pub fn local_address(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// The negotiated TLS parameters, for an https connection after connect
    pub fn ssl_session(&self) -> Option<&TlsSession> {
        self.tls_session.as_ref()
    }

    /// Traffic counters for this connection
    pub fn statistics(&self) -> &Statistics {
        &self.stats
    }

    /// Whether `close` has been called
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Create a request for this connection
    ///
    /// The request target is the connection's base path joined with `path`;
    /// the protocol version defaults to HTTP/1.1.
    pub fn create_request(&mut self, method: &str, path: &str) -> Result<ClientRequest> {
        if self.closed {
            return Err(Error::ConnectionClosed);
        }
        self.request_counter += 1;
        let id = format!("request-{}", self.request_counter);
        ClientRequest::new(id, method, &self.join_path(path))
    }

    /// Create an empty response to receive into
    pub fn create_response(&mut self) -> ClientResponse {
        ClientResponse::new(format!("response-{}", self.request_counter))
    }

    fn join_path(&self, path: &str) -> String {
        let base = self.base_path.trim_end_matches('/');
        if path.is_empty() {
            return if base.is_empty() { "/".to_string() } else { base.to_string() };
        }
        if base.is_empty() {
            if path.starts_with('/') {
                path.to_string()
            } else {
                format!("/{}", path)
            }
        } else if path.starts_with('/') {
            format!("{}{}", base, path)
        } else {
            format!("{}/{}", base, path)
        }
    }

    // -- filters ---------------------------------------------------------

    /// Append a request filter to the end of the chain
    pub fn append_request_filter(&mut self, filter: Arc<dyn RequestFilter>) {
        self.request_filters.push(filter);
    }

    /// Insert a request filter at `index`
    pub fn insert_request_filter(
        &mut self,
        index: usize,
        filter: Arc<dyn RequestFilter>,
    ) -> Result<()> {
        if index > self.request_filters.len() {
            return Err(Error::InvalidArgument(format!(
                "filter index {} out of range",
                index
            )));
        }
        self.request_filters.insert(index, filter);
        Ok(())
    }

    /// Number of request filters
    pub fn request_filter_count(&self) -> usize {
        self.request_filters.len()
    }

    /// The request filter at `index`
    pub fn request_filter(&self, index: usize) -> Option<&Arc<dyn RequestFilter>> {
        self.request_filters.get(index)
    }

    /// Remove one occurrence of `filter`, returning whether it was present
    pub fn remove_request_filter(&mut self, filter: &Arc<dyn RequestFilter>) -> bool {
        if let Some(pos) = self
            .request_filters
            .iter()
            .position(|f| Arc::ptr_eq(f, filter))
        {
            self.request_filters.remove(pos);
            true
        } else {
            false
        }
    }

    /// Remove the request filter at `index`
    pub fn remove_request_filter_at(&mut self, index: usize) -> Result<()> {
        if index >= self.request_filters.len() {
            return Err(Error::InvalidArgument(format!(
                "filter index {} out of range",
                index
            )));
        }
        self.request_filters.remove(index);
        Ok(())
    }

    /// Drop all request filters
    pub fn clear_request_filters(&mut self) {
        self.request_filters.clear();
    }

    /// Append a response filter to the end of the chain
    pub fn append_response_filter(&mut self, filter: Arc<dyn ResponseFilter>) {
        self.response_filters.push(filter);
    }

    /// Insert a response filter at `index`
    pub fn insert_response_filter(
        &mut self,
        index: usize,
        filter: Arc<dyn ResponseFilter>,
    ) -> Result<()> {
        if index > self.response_filters.len() {
            return Err(Error::InvalidArgument(format!(
                "filter index {} out of range",
                index
            )));
        }
        self.response_filters.insert(index, filter);
        Ok(())
    }

    /// Number of response filters
    pub fn response_filter_count(&self) -> usize {
        self.response_filters.len()
    }

    /// The response filter at `index`
    pub fn response_filter(&self, index: usize) -> Option<&Arc<dyn ResponseFilter>> {
        self.response_filters.get(index)
    }

    /// Remove one occurrence of `filter`, returning whether it was present
    pub fn remove_response_filter(&mut self, filter: &Arc<dyn ResponseFilter>) -> bool {
        if let Some(pos) = self
            .response_filters
            .iter()
            .position(|f| Arc::ptr_eq(f, filter))
        {
            self.response_filters.remove(pos);
            true
        } else {
            false
        }
    }

    /// Remove the response filter at `index`
    pub fn remove_response_filter_at(&mut self, index: usize) -> Result<()> {
        if index >= self.response_filters.len() {
            return Err(Error::InvalidArgument(format!(
                "filter index {} out of range",
                index
            )));
        }
        self.response_filters.remove(index);
        Ok(())
    }

    /// Drop all response filters
    pub fn clear_response_filters(&mut self) {
        self.response_filters.clear();
    }

    /// Append every filter in `set`, keeping the set's internal order
    pub fn append_filter_set(&mut self, set: &FilterSet) {
        for filter in set.request_filters() {
            self.request_filters.push(Arc::clone(filter));
        }
        for filter in set.response_filters() {
            self.response_filters.push(Arc::clone(filter));
        }
    }

    /// Remove every filter in `set`; removing a set that was never appended
    /// is a no-op
    pub fn remove_filter_set(&mut self, set: &FilterSet) {
        for filter in set.request_filters() {
            self.remove_request_filter(filter);
        }
        for filter in set.response_filters() {
            self.remove_response_filter(filter);
        }
    }

    // -- progress listeners ----------------------------------------------

    /// Attach a listener; returns `false` when it was already attached
    pub fn attach_progress_listener(
        &mut self,
        listener: Arc<dyn ConnectionProgressListener>,
    ) -> bool {
        if self
            .listeners
            .iter()
            .any(|l| Arc::ptr_eq(l, &listener))
        {
            return false;
        }
        self.listeners.push(listener);
        true
    }

    /// Detach a listener; returns `false` when it was not attached
    pub fn detach_progress_listener(
        &mut self,
        listener: &Arc<dyn ConnectionProgressListener>,
    ) -> bool {
        if let Some(pos) = self.listeners.iter().position(|l| Arc::ptr_eq(l, listener)) {
            self.listeners.remove(pos);
            true
        } else {
            false
        }
    }

    // -- exchange --------------------------------------------------------

    /// Send a request, blocking until it is fully written
    pub fn send(&mut self, request: &mut ClientRequest) -> Result<()> {
        if self.closed {
            return Err(Error::ConnectionClosed);
        }
        if self.state != ConnectionState::Idle {
            return Err(Error::InvalidState(
                "a request is already in flight".to_string(),
            ));
        }
        if request.is_started() {
            return Err(Error::RequestState("request already sent".to_string()));
        }

        let filters = self.request_filters.clone();
        for filter in &filters {
            if let Err(e) = filter.filter(request) {
                let message = e.to_string();
                request.abort(Some(&message));
                return Err(Error::Filter(message));
            }
        }

        self.ensure_connected()?;

        if !request.headers().contains("Host") {
            request.set_header("Host", &format!("{}:{}", self.host, self.port))?;
        }
        let chunked = request.has_content() && !request.headers().contains("Content-Length");
        if chunked && !request.headers().contains("Transfer-Encoding") {
            request.set_header("Transfer-Encoding", "chunked")?;
        }

        for listener in &self.listeners {
            listener.request_started();
        }

        request.start()?;

        let result = self.write_request(request, chunked);
        match result {
            Ok(()) => {
                request.end()?;
                self.stats.add_message_sent();
                self.last_request = Some(request.head_snapshot());
                self.state = ConnectionState::RequestStarted;
                for listener in &self.listeners {
                    listener.request_done();
                }
                debug!(id = request.id(), method = request.method(), "request sent");
                Ok(())
            }
            Err(e) => {
                request.abort(Some(&e.to_string()));
                Err(e)
            }
        }
    }

    fn write_request(&mut self, request: &mut ClientRequest, chunked: bool) -> Result<()> {
        let transport = self
            .transport
            .clone()
            .ok_or_else(|| Error::InvalidState("not connected".to_string()))?;

        let progress = ExchangeProgress::new(
            Arc::clone(&self.stats),
            self.listeners.clone(),
            Direction::Request,
        );
        let mut out =
            ProgressOBinaryChannel::new(TransportOBinaryChannel::new(transport), progress);

        let head = self.format_head(request);
        trace!(bytes = head.len(), "writing request head");
        out.write(head.as_bytes())?;

        if let Some(mut content) = request.take_content() {
            if chunked {
                let mut encoder = ChunkedMessageContentOBinaryChannel::new(out);
                match channel::copy(&mut content, &mut encoder) {
                    Ok(_) => encoder.close()?,
                    Err(e) => {
                        // Tell the peer the body is cut short, then fail
                        let _ = encoder.abort(Some(&e.to_string()));
                        return Err(e.into());
                    }
                }
            } else {
                channel::copy(&mut content, &mut out)?;
                out.flush()?;
            }
        } else {
            out.flush()?;
        }
        Ok(())
    }

    fn format_head(&self, request: &ClientRequest) -> String {
        let mut uri = request.uri().to_string();
        if !request.parameters().is_empty() {
            let query: Vec<String> = request
                .parameters()
                .iter()
                .map(|p| {
                    format!(
                        "{}={}",
                        encode_query_component(p.name()),
                        encode_query_component(p.value())
                    )
                })
                .collect();
            uri.push('?');
            uri.push_str(&query.join("&"));
        }

        let mut head = format!(
            "{} {} {}\r\n",
            request.method(),
            uri,
            request.request_line().version()
        );
        for (name, value) in request.headers().iter() {
            head.push_str(name);
            head.push_str(": ");
            head.push_str(value);
            head.push_str("\r\n");
        }
        head.push_str("\r\n");
        head
    }

    /// Receive a response head, blocking until status line and headers are
    /// fully read; the body is pulled lazily through the content channel
    pub fn receive(&mut self, response: &mut ClientResponse) -> Result<()> {
        if self.closed {
            return Err(Error::ConnectionClosed);
        }
        if self.state != ConnectionState::RequestStarted {
            return Err(Error::InvalidState(
                "no request awaiting a response".to_string(),
            ));
        }

        let transport = self
            .transport
            .clone()
            .ok_or_else(|| Error::InvalidState("not connected".to_string()))?;

        for listener in &self.listeners {
            listener.response_started();
        }

        let mut parser = ResponseHeadParser::new();
        let mut reader = TransportIBinaryChannel::new(transport.clone());
        let mut buf = [0u8; 8192];
        let mut head_read = 0usize;
        while !parser.is_complete() {
            let n = reader.read(&mut buf)?;
            if n == 0 {
                return Err(Error::ConnectionFailed(
                    "connection closed before response head".to_string(),
                ));
            }
            head_read += n;
            parser.feed(&buf[..n])?;
        }

        let (status_line, headers) = parser.take_head()?;
        let status_code = status_line.code();
        debug!(code = status_code, "response head received");
        response.start(status_line, headers)?;

        // Body bytes arriving in the same segment as the head are counted by
        // the content channel, not here.
        let leftover = parser.take_leftover();
        self.stats
            .add_bytes_received((head_read - leftover.len()) as u64);

        let last_request = self
            .last_request
            .take()
            .ok_or_else(|| Error::InvalidState("no sent request recorded".to_string()))?;
        let filters = self.response_filters.clone();
        for filter in &filters {
            if let Err(e) = filter.filter(&last_request, response) {
                return Err(Error::Filter(e.to_string()));
            }
        }

        let content: ContentInput = if bodyless(status_code, last_request.method()) {
            Box::new(NullIBinaryChannel::new())
        } else {
            self.build_content(response, leftover, transport)?
        };
        response.set_content(content);
        self.state = ConnectionState::ResponseReceiving;
        Ok(())
    }

    fn build_content(
        &self,
        response: &ClientResponse,
        leftover: Vec<u8>,
        transport: SharedTransport,
    ) -> Result<ContentInput> {
        let raw = PrefixedIBinaryChannel::new(leftover, TransportIBinaryChannel::new(transport));
        let progress = ExchangeProgress::new(
            Arc::clone(&self.stats),
            self.listeners.clone(),
            Direction::Response,
        );
        let raw = ProgressIBinaryChannel::new(raw, progress);

        let chunked = response
            .headers()
            .get_first("Transfer-Encoding")
            .map(|v| v.to_ascii_lowercase().contains("chunked"))
            .unwrap_or(false);
        let content_length = response
            .headers()
            .get_first("Content-Length")
            .map(|v| {
                v.trim()
                    .parse::<u64>()
                    .map_err(|_| Error::Parse(format!("invalid Content-Length: {}", v)))
            })
            .transpose()?;
        let deflated = response
            .headers()
            .get_first("Content-Encoding")
            .map(|v| v.trim().eq_ignore_ascii_case("deflate"))
            .unwrap_or(false);

        let framed: ContentInput = if chunked {
            Box::new(ChunkedMessageContentIBinaryChannel::new(raw))
        } else if let Some(length) = content_length {
            Box::new(LengthPrefixedMessageContentIBinaryChannel::with_declared_length(raw, length))
        } else {
            Box::new(EofContentIBinaryChannel::new(raw))
        };

        Ok(if deflated {
            Box::new(InflaterMessageContentIBinaryChannel::new(framed))
        } else {
            framed
        })
    }

    /// Finalize the current exchange, draining any unread body bytes so the
    /// connection can be reused
    pub fn end_response(&mut self, response: &mut ClientResponse) -> Result<()> {
        if self.closed {
            return Err(Error::ConnectionClosed);
        }
        if self.state != ConnectionState::ResponseReceiving {
            return Err(Error::InvalidState(
                "no response being received".to_string(),
            ));
        }

        if let Some(mut content) = response.take_content() {
            let mut scratch = [0u8; 8192];
            while content.read(&mut scratch)? > 0 {}
        }

        response.end()?;
        self.stats.add_message_received();
        self.state = ConnectionState::Idle;
        for listener in &self.listeners {
            listener.response_done();
        }
        Ok(())
    }

    /// Close the connection; idempotent, aborts any in-flight exchange
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        debug!(host = %self.host, port = self.port, "closing connection");
        self.closed = true;
        self.state = ConnectionState::Idle;
        if let Some(transport) = self.transport.take() {
            transport
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .close()?;
        }
        Ok(())
    }

    fn ensure_connected(&mut self) -> Result<()> {
        if self.transport.is_some() {
            return Ok(());
        }
        debug!(host = %self.host, port = self.port, "connecting");

        let tcp = TcpSessionOps::connect(&self.host, self.port, self.timeout)
            .map_err(map_connect_error)?;
        self.remote_addr = tcp.peer_addr().ok();
        self.local_addr = tcp.local_addr().ok();

        let session: Box<dyn SessionOps> = match &self.tls_config {
            Some(config) => {
                let tls = config.connect(tcp.into_stream())?;
                self.tls_session = Some(tls.session().clone());
                Box::new(tls)
            }
            None => Box::new(tcp),
        };

        self.transport = Some(shared(Transport::new(session, self.timeout)));
        Ok(())
    }
}

// Statuses that never carry a body (RFC 7230 §3.3.3), plus any response to
// a HEAD request. Framing such a response from its headers would leave the
// connection waiting for bytes the peer will never send.
fn bodyless(status_code: u16, request_method: &str) -> bool {
    matches!(status_code, 100..=199 | 204 | 304) || request_method.eq_ignore_ascii_case("HEAD")
}

fn map_connect_error(e: channel::Error) -> Error {
    match e {
        channel::Error::Protocol(message) => Error::AddressResolution(message),
        channel::Error::Io(io)
            if io.kind() == std::io::ErrorKind::TimedOut
                || io.kind() == std::io::ErrorKind::WouldBlock =>
        {
            Error::ConnectTimeout
        }
        channel::Error::Io(io) => Error::ConnectionFailed(io.to_string()),
        other => Error::ConnectionFailed(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::filter::{Placement, SessionHandlerRequestFilter};

    fn connection() -> HttpClientConnection {
        HttpClientConnection::new("localhost", 8080, "", None).unwrap()
    }

    #[test]
    fn test_query_component_encoding() {
        assert_eq!(encode_query_component("plain-text_1.0~x"), "plain-text_1.0~x");
        assert_eq!(encode_query_component("a b&c=d"), "a%20b%26c%3Dd");
        assert_eq!(encode_query_component("caf\u{e9}"), "caf%C3%A9");
    }

    #[test]
    fn test_path_joining() {
        let conn = HttpClientConnection::new("h", 80, "/api/v1/", None).unwrap();
        assert_eq!(conn.join_path("/status"), "/api/v1/status");
        assert_eq!(conn.join_path("status"), "/api/v1/status");
        assert_eq!(conn.join_path(""), "/api/v1");

        let conn = HttpClientConnection::new("h", 80, "", None).unwrap();
        assert_eq!(conn.join_path("/status"), "/status");
        assert_eq!(conn.join_path("status"), "/status");
        assert_eq!(conn.join_path(""), "/");
    }

    #[test]
    fn test_head_formatting_includes_query_string() {
        let mut conn = connection();
        let mut request = conn.create_request("GET", "/search").unwrap();
        request.add_parameter("q", "hello world").unwrap();
        request.add_parameter("page", "2").unwrap();
        request.add_header("Accept", "text/html").unwrap();

        let head = conn.format_head(&request);
        assert!(head.starts_with("GET /search?q=hello%20world&page=2 HTTP/1.1\r\n"));
        assert!(head.contains("Accept: text/html\r\n"));
        assert!(head.ends_with("\r\n\r\n"));
    }

    #[test]
    fn test_filter_set_append_remove_restores_order() {
        let mut conn = connection();
        let own: Arc<dyn RequestFilter> = Arc::new(SessionHandlerRequestFilter::new(
            "X-Own",
            "1",
            Placement::Header,
        ));
        conn.append_request_filter(Arc::clone(&own));

        let mut set = FilterSet::new();
        set.add_request_filter(Arc::new(SessionHandlerRequestFilter::new(
            "X-Set-A",
            "a",
            Placement::Header,
        )));
        set.add_request_filter(Arc::new(SessionHandlerRequestFilter::new(
            "X-Set-B",
            "b",
            Placement::Header,
        )));

        conn.append_filter_set(&set);
        assert_eq!(conn.request_filter_count(), 3);

        conn.remove_filter_set(&set);
        assert_eq!(conn.request_filter_count(), 1);
        assert!(Arc::ptr_eq(conn.request_filter(0).unwrap(), &own));

        // Removing a set that is not attached is a no-op
        conn.remove_filter_set(&set);
        assert_eq!(conn.request_filter_count(), 1);
    }

    #[test]
    fn test_filter_index_operations() {
        let mut conn = connection();
        let a: Arc<dyn RequestFilter> =
            Arc::new(SessionHandlerRequestFilter::new("A", "1", Placement::Header));
        let b: Arc<dyn RequestFilter> =
            Arc::new(SessionHandlerRequestFilter::new("B", "2", Placement::Header));

        conn.append_request_filter(Arc::clone(&a));
        conn.insert_request_filter(0, Arc::clone(&b)).unwrap();
        assert!(Arc::ptr_eq(conn.request_filter(0).unwrap(), &b));
        assert!(Arc::ptr_eq(conn.request_filter(1).unwrap(), &a));

        assert!(conn.insert_request_filter(5, Arc::clone(&a)).is_err());
        assert!(conn.remove_request_filter_at(7).is_err());

        conn.remove_request_filter_at(0).unwrap();
        assert_eq!(conn.request_filter_count(), 1);
        assert!(!conn.remove_request_filter(&b));
        assert!(conn.remove_request_filter(&a));
    }

    #[test]
    fn test_progress_listener_set_semantics() {
        struct Noop;
        impl ConnectionProgressListener for Noop {}

        let mut conn = connection();
        let listener: Arc<dyn ConnectionProgressListener> = Arc::new(Noop);

        assert!(conn.attach_progress_listener(Arc::clone(&listener)));
        assert!(!conn.attach_progress_listener(Arc::clone(&listener)));
        assert!(conn.detach_progress_listener(&listener));
        assert!(!conn.detach_progress_listener(&listener));
    }

    #[test]
    fn test_operations_after_close_fail() {
        let mut conn = connection();
        conn.close().unwrap();
        // Second close is a no-op
        conn.close().unwrap();
        assert!(conn.is_closed());

        assert!(matches!(
            conn.create_request("GET", "/"),
            Err(Error::ConnectionClosed)
        ));

        let mut response = ClientResponse::new("r".to_string());
        assert!(matches!(
            conn.receive(&mut response),
            Err(Error::ConnectionClosed)
        ));
    }

    #[test]
    fn test_receive_without_send_is_a_state_error() {
        let mut conn = connection();
        let mut response = conn.create_response();
        assert!(matches!(
            conn.receive(&mut response),
            Err(Error::InvalidState(_))
        ));
    }

    #[test]
    fn test_bodyless_statuses_and_head_requests() {
        assert!(bodyless(204, "GET"));
        assert!(bodyless(304, "GET"));
        assert!(bodyless(100, "GET"));
        assert!(bodyless(200, "HEAD"));
        assert!(bodyless(200, "head"));
        assert!(!bodyless(200, "GET"));
        assert!(!bodyless(404, "POST"));
    }

    #[test]
    fn test_eof_content_channel_lookahead() {
        let inner = crate::channel::MemoryIBinaryChannel::new(b"xy".to_vec());
        let mut channel = EofContentIBinaryChannel::new(inner);

        assert!(channel.has_more_content().unwrap());
        let mut buf = [0u8; 8];
        assert_eq!(channel.read(&mut buf).unwrap(), 1);
        assert_eq!(buf[0], b'x');
        assert_eq!(channel.read(&mut buf).unwrap(), 1);
        assert_eq!(buf[0], b'y');
        assert!(!channel.has_more_content().unwrap());
        assert_eq!(channel.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_prefixed_channel_serves_prefix_first() {
        // Prefix-only read path; no transport behind it is touched
        let transport = shared(Transport::new(
            Box::new(NullSession),
            Some(Duration::from_millis(10)),
        ));
        let mut channel = PrefixedIBinaryChannel::new(
            b"abc".to_vec(),
            TransportIBinaryChannel::new(transport),
        );

        let mut buf = [0u8; 2];
        assert_eq!(channel.read(&mut buf).unwrap(), 2);
        assert_eq!(&buf, b"ab");
        assert_eq!(channel.read(&mut buf).unwrap(), 1);
        assert_eq!(buf[0], b'c');
    }

    struct NullSession;

    impl SessionOps for NullSession {
        fn poll(
            &self,
            _events: crate::session::PollEvents,
            _timeout: Option<Duration>,
        ) -> channel::Result<bool> {
            Ok(true)
        }

        fn read(&mut self, _buf: &mut [u8]) -> channel::Result<usize> {
            Ok(0)
        }

        fn write(&mut self, buf: &[u8]) -> channel::Result<usize> {
            Ok(buf.len())
        }

        fn close(&mut self) -> channel::Result<()> {
            Ok(())
        }
    }
}
