//! Connection progress listeners
//!
//! Listeners observe each exchange as it happens: a started callback, zero
//! or more progress callbacks carrying the running byte total, then a done
//! callback, for the request and response sides separately. Callbacks fire
//! synchronously on the thread driving `send`/`receive`.

use std::sync::Arc;

use crate::channel::ProgressListener;

/// Observer of a connection's exchanges
///
/// All callbacks default to no-ops so a listener only implements what it
/// cares about.
pub trait ConnectionProgressListener: Send + Sync {
    /// A request is about to be written
    fn request_started(&self) {}

    /// `bytes_sent` body and head bytes have been written so far
    fn request_progress(&self, bytes_sent: u64) {
        let _ = bytes_sent;
    }

    /// The request has been fully written
    fn request_done(&self) {}

    /// A response head is about to be read
    fn response_started(&self) {}

    /// `bytes_received` body bytes have been read so far
    fn response_progress(&self, bytes_received: u64) {
        let _ = bytes_received;
    }

    /// The response has been finalized
    fn response_done(&self) {}
}

/// Which side of the exchange a fan-out reports on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Direction {
    Request,
    Response,
}

/// Bridges channel-level byte totals to the attached connection listeners
///
/// A snapshot of the listener list is taken when the exchange starts, so a
/// listener detached mid-transfer keeps receiving callbacks until the
/// exchange completes.
pub(crate) struct ProgressFanout {
    listeners: Vec<Arc<dyn ConnectionProgressListener>>,
    direction: Direction,
}

impl ProgressFanout {
    pub(crate) fn new(
        listeners: Vec<Arc<dyn ConnectionProgressListener>>,
        direction: Direction,
    ) -> Self {
        ProgressFanout {
            listeners,
            direction,
        }
    }
}

impl ProgressListener for ProgressFanout {
    fn progress(&self, total_bytes: u64) {
        for listener in &self.listeners {
            match self.direction {
                Direction::Request => listener.request_progress(total_bytes),
                Direction::Response => listener.response_progress(total_bytes),
            }
        }
    }
}
