//! Request and response filters
//!
//! Filters hook into the exchange: request filters run inside `send` before
//! any byte reaches the wire, response filters run inside `receive` after
//! the head is parsed. A connection keeps each kind in an ordered,
//! index-addressable list; [`FilterSet`] groups filters so they can be
//! attached to and removed from a connection as one unit. Filter identity is
//! the `Arc` pointer, so the same filter instance can be recognized for
//! removal.

use std::sync::Arc;

use super::message::{ClientRequest, ClientResponse};
use super::Result;

/// Hook mutating a request before it is sent
pub trait RequestFilter: Send + Sync {
    fn filter(&self, request: &mut ClientRequest) -> Result<()>;
}

/// Hook observing the sent request and mutating the received response
pub trait ResponseFilter: Send + Sync {
    fn filter(&self, request: &ClientRequest, response: &mut ClientResponse) -> Result<()>;
}

/// A bundle of filters attachable to a connection as a unit
#[derive(Default, Clone)]
pub struct FilterSet {
    request_filters: Vec<Arc<dyn RequestFilter>>,
    response_filters: Vec<Arc<dyn ResponseFilter>>,
}

impl FilterSet {
    /// Create an empty set
    pub fn new() -> Self {
        FilterSet::default()
    }

    /// Append a request filter to the set
    pub fn add_request_filter(&mut self, filter: Arc<dyn RequestFilter>) {
        self.request_filters.push(filter);
    }

    /// Append a response filter to the set
    pub fn add_response_filter(&mut self, filter: Arc<dyn ResponseFilter>) {
        self.response_filters.push(filter);
    }

    /// The request filters in order
    pub fn request_filters(&self) -> &[Arc<dyn RequestFilter>] {
        &self.request_filters
    }

    /// The response filters in order
    pub fn response_filters(&self) -> &[Arc<dyn ResponseFilter>] {
        &self.response_filters
    }

    /// Whether the set holds no filters
    pub fn is_empty(&self) -> bool {
        self.request_filters.is_empty() && self.response_filters.is_empty()
    }
}

/// Where a session identifier is carried on the request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// As a request header
    Header,
    /// As a request parameter (ends up in the query string)
    Parameter,
}

/// Request filter injecting a session identifier into every request
pub struct SessionHandlerRequestFilter {
    name: String,
    session_id: String,
    placement: Placement,
}

impl SessionHandlerRequestFilter {
    /// Create a filter carrying `session_id` under `name`
    pub fn new(name: impl Into<String>, session_id: impl Into<String>, placement: Placement) -> Self {
        SessionHandlerRequestFilter {
            name: name.into(),
            session_id: session_id.into(),
            placement,
        }
    }

    /// The session identifier injected by this filter
    pub fn session_id(&self) -> &str {
        &self.session_id
    }
}

impl RequestFilter for SessionHandlerRequestFilter {
    fn filter(&self, request: &mut ClientRequest) -> Result<()> {
        match self.placement {
            Placement::Header => request.set_header(&self.name, &self.session_id),
            Placement::Parameter => request.set_parameter(&self.name, &self.session_id),
        }
    }
}
