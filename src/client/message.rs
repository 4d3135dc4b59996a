//! Client request and response messages
//!
//! A request moves Created → Started → (Ended | Aborted); a response has no
//! abort and moves Created → Started → Ended. All transitions are one-way.
//! Headers, parameters and content can only be changed while the message is
//! still Created; the connection drives the transitions while sending and
//! receiving.

use crate::channel::{ContentInput, ContentSource};
use crate::http::{ProtocolVersion, RequestLine, StatusLine};
use crate::message::{Headers, Message, Parameters};

use super::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RequestState {
    Created,
    Started,
    Ended,
    Aborted,
}

/// An outbound message bound to one connection exchange
pub struct ClientRequest {
    id: String,
    request_line: RequestLine,
    headers: Headers,
    parameters: Parameters,
    state: RequestState,
    content: Option<ContentSource>,
    abort_message: Option<String>,
}

impl ClientRequest {
    pub(crate) fn new(id: String, method: &str, uri: &str) -> Result<Self> {
        let request_line = RequestLine::new(method, uri, ProtocolVersion::http_1_1());
        if !request_line.is_valid() {
            return Err(Error::InvalidArgument(format!(
                "invalid request line: {} {}",
                method, uri
            )));
        }
        Ok(ClientRequest {
            id,
            request_line,
            headers: Headers::new(),
            parameters: Parameters::new(),
            state: RequestState::Created,
            content: None,
            abort_message: None,
        })
    }

    /// The request line to be written on the wire
    pub fn request_line(&self) -> &RequestLine {
        &self.request_line
    }

    /// The request method
    pub fn method(&self) -> &str {
        self.request_line.method()
    }

    /// The request target, before any parameter query string is appended
    pub fn uri(&self) -> &str {
        self.request_line.uri()
    }

    /// Append a header value; only allowed while the request is Created
    pub fn add_header(&mut self, name: &str, value: &str) -> Result<()> {
        self.check_mutable()?;
        self.headers.add(name, value)?;
        Ok(())
    }

    /// Replace all values under a header name
    pub fn set_header(&mut self, name: &str, value: &str) -> Result<()> {
        self.check_mutable()?;
        self.headers.set(name, value)?;
        Ok(())
    }

    /// Append a parameter; parameters are serialized into the query string
    pub fn add_parameter(&mut self, name: &str, value: &str) -> Result<()> {
        self.check_mutable()?;
        self.parameters.add(name, value)?;
        Ok(())
    }

    /// Replace all values under a parameter name
    pub fn set_parameter(&mut self, name: &str, value: &str) -> Result<()> {
        self.check_mutable()?;
        self.parameters.set(name, value)?;
        Ok(())
    }

    /// Attach the body content to send
    pub fn set_content(&mut self, content: ContentSource) -> Result<()> {
        self.check_mutable()?;
        self.content = Some(content);
        Ok(())
    }

    /// Whether a body is attached
    pub fn has_content(&self) -> bool {
        self.content.is_some()
    }

    pub(crate) fn take_content(&mut self) -> Option<ContentSource> {
        self.content.take()
    }

    /// Whether `start` has been called
    pub fn is_started(&self) -> bool {
        self.state != RequestState::Created
    }

    /// Whether the request completed normally
    pub fn is_ended(&self) -> bool {
        self.state == RequestState::Ended
    }

    /// Whether the request was aborted
    pub fn is_aborted(&self) -> bool {
        self.state == RequestState::Aborted
    }

    /// The abort message, when the request was aborted with one
    pub fn abort_reason(&self) -> Option<&str> {
        self.abort_message.as_deref()
    }

    pub(crate) fn start(&mut self) -> Result<()> {
        if self.state != RequestState::Created {
            return Err(Error::RequestState("request already started".to_string()));
        }
        self.state = RequestState::Started;
        Ok(())
    }

    pub(crate) fn end(&mut self) -> Result<()> {
        if self.state != RequestState::Started {
            return Err(Error::RequestState(
                "request not in started state".to_string(),
            ));
        }
        self.state = RequestState::Ended;
        Ok(())
    }

    pub(crate) fn abort(&mut self, message: Option<&str>) {
        if self.state == RequestState::Ended || self.state == RequestState::Aborted {
            return;
        }
        self.state = RequestState::Aborted;
        self.abort_message = message.map(|m| m.to_string());
    }

    fn check_mutable(&self) -> Result<()> {
        if self.state != RequestState::Created {
            return Err(Error::RequestState(
                "request is no longer mutable".to_string(),
            ));
        }
        Ok(())
    }

    // Head-only copy kept by the connection so response filters can see the
    // request that produced the response.
    pub(crate) fn head_snapshot(&self) -> ClientRequest {
        ClientRequest {
            id: self.id.clone(),
            request_line: self.request_line.clone(),
            headers: self.headers.clone(),
            parameters: self.parameters.clone(),
            state: self.state,
            content: None,
            abort_message: self.abort_message.clone(),
        }
    }
}

impl Message for ClientRequest {
    fn id(&self) -> &str {
        &self.id
    }

    fn headers(&self) -> &Headers {
        &self.headers
    }

    fn parameters(&self) -> &Parameters {
        &self.parameters
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ResponseState {
    Created,
    Started,
    Ended,
}

/// An inbound message filled in by a connection's `receive`
pub struct ClientResponse {
    id: String,
    status_line: Option<StatusLine>,
    headers: Headers,
    parameters: Parameters,
    state: ResponseState,
    content: Option<ContentInput>,
}

impl ClientResponse {
    pub(crate) fn new(id: String) -> Self {
        ClientResponse {
            id,
            status_line: None,
            headers: Headers::new(),
            parameters: Parameters::new(),
            state: ResponseState::Created,
            content: None,
        }
    }

    /// The status line, available once the head has been received
    pub fn status_line(&self) -> Option<&StatusLine> {
        self.status_line.as_ref()
    }

    /// The body content channel, available once the head has been received
    pub fn content(&mut self) -> Option<&mut ContentInput> {
        self.content.as_mut()
    }

    /// Detach the body content channel from the response
    pub fn take_content(&mut self) -> Option<ContentInput> {
        self.content.take()
    }

    /// Whether `receive` has populated this response
    pub fn is_started(&self) -> bool {
        self.state != ResponseState::Created
    }

    /// Whether the exchange has been finalized
    pub fn is_ended(&self) -> bool {
        self.state == ResponseState::Ended
    }

    pub(crate) fn start(
        &mut self,
        status_line: StatusLine,
        headers: Headers,
    ) -> Result<()> {
        if self.state != ResponseState::Created {
            return Err(Error::ResponseState(
                "response already received".to_string(),
            ));
        }
        self.status_line = Some(status_line);
        self.headers = headers;
        self.state = ResponseState::Started;
        Ok(())
    }

    pub(crate) fn set_content(&mut self, content: ContentInput) {
        self.content = Some(content);
    }

    pub(crate) fn end(&mut self) -> Result<()> {
        if self.state != ResponseState::Started {
            return Err(Error::ResponseState(
                "response not in started state".to_string(),
            ));
        }
        self.state = ResponseState::Ended;
        Ok(())
    }

    /// Append a header value; used by response filters
    pub fn add_header(&mut self, name: &str, value: &str) -> Result<()> {
        self.headers.add(name, value)?;
        Ok(())
    }
}

impl Message for ClientResponse {
    fn id(&self) -> &str {
        &self.id
    }

    fn headers(&self) -> &Headers {
        &self.headers
    }

    fn parameters(&self) -> &Parameters {
        &self.parameters
    }
}
