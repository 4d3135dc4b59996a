//! End-to-end exchanges against loopback servers
//!
//! Each test spins up a one-shot TCP server on an ephemeral port, drives a
//! real connection through it and asserts on both sides of the wire.

use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use commlink::channel::{
    self, DeflaterMessageContentOBinaryChannel, MemoryIBinaryChannel, MemoryOBinaryChannel,
    OBinaryChannel,
};
use commlink::client::{
    ClientRequest, ConnectionProgressListener, Error, HttpClientConnection, RequestFilter,
};

const HEAD_END: &[u8] = b"\r\n\r\n";
const CHUNK_END: &[u8] = b"0\r\n\r\n";

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

/// Accept one connection, read until `until` appears, write `response`, and
/// hand the captured request bytes back
fn serve_once(
    response: Vec<u8>,
    until: &'static [u8],
) -> (thread::JoinHandle<Vec<u8>>, u16) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let handle = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut received = Vec::new();
        let mut buf = [0u8; 4096];
        while !contains(&received, until) {
            let n = stream.read(&mut buf).unwrap();
            if n == 0 {
                break;
            }
            received.extend_from_slice(&buf[..n]);
        }
        stream.write_all(&response).unwrap();
        received
    });
    (handle, port)
}

fn connect(port: u16) -> HttpClientConnection {
    let mut conn = HttpClientConnection::new("127.0.0.1", port, "", None).unwrap();
    conn.set_timeout(Some(Duration::from_secs(2)));
    conn
}

#[test]
fn test_round_trip_with_chunked_request_body() {
    let (handle, port) = serve_once(
        b"HTTP/1.1 200 OK\r\nContent-Length: 4\r\n\r\ndone".to_vec(),
        CHUNK_END,
    );
    let mut conn = connect(port);

    let mut request = conn.create_request("POST", "/upload").unwrap();
    request
        .set_content(Box::new(MemoryIBinaryChannel::new(b"hello body".to_vec())))
        .unwrap();
    conn.send(&mut request).unwrap();
    assert!(request.is_ended());

    let mut response = conn.create_response();
    conn.receive(&mut response).unwrap();
    assert_eq!(response.status_line().unwrap().code(), 200);

    let body = channel::read_to_end(response.content().unwrap()).unwrap();
    assert_eq!(body, b"done");
    conn.end_response(&mut response).unwrap();
    assert!(response.is_ended());

    let received = handle.join().unwrap();
    assert!(contains(&received, b"POST /upload HTTP/1.1\r\n"));
    assert!(contains(&received, b"Transfer-Encoding: chunked\r\n"));
    assert!(contains(&received, b"hello body"));
    assert!(contains(&received, CHUNK_END));

    assert_eq!(conn.statistics().messages_sent(), 1);
    assert_eq!(conn.statistics().messages_received(), 1);
    assert!(conn.statistics().bytes_sent() > 0);
    assert!(conn.statistics().bytes_received() > 0);
}

#[test]
fn test_chunked_response_body() {
    let (handle, port) = serve_once(
        b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n5\r\nfirst\r\n7\r\n-second\r\n0\r\n\r\n"
            .to_vec(),
        HEAD_END,
    );
    let mut conn = connect(port);

    let mut request = conn.create_request("GET", "/stream").unwrap();
    conn.send(&mut request).unwrap();

    let mut response = conn.create_response();
    conn.receive(&mut response).unwrap();
    let body = channel::read_to_end(response.content().unwrap()).unwrap();
    assert_eq!(body, b"first-second");
    conn.end_response(&mut response).unwrap();

    handle.join().unwrap();
}

#[test]
fn test_deflate_response_body() {
    let mut encoder = DeflaterMessageContentOBinaryChannel::new(MemoryOBinaryChannel::new());
    encoder.write(b"compressed payload").unwrap();
    encoder.close().unwrap();
    let compressed = encoder.into_inner().into_inner();

    let mut wire = format!(
        "HTTP/1.1 200 OK\r\nContent-Encoding: deflate\r\nContent-Length: {}\r\n\r\n",
        compressed.len()
    )
    .into_bytes();
    wire.extend_from_slice(&compressed);

    let (handle, port) = serve_once(wire, HEAD_END);
    let mut conn = connect(port);

    let mut request = conn.create_request("GET", "/packed").unwrap();
    conn.send(&mut request).unwrap();

    let mut response = conn.create_response();
    conn.receive(&mut response).unwrap();
    let body = channel::read_to_end(response.content().unwrap()).unwrap();
    assert_eq!(body, b"compressed payload");
    conn.end_response(&mut response).unwrap();

    handle.join().unwrap();
}

#[test]
fn test_response_body_delimited_by_close() {
    let (handle, port) = serve_once(
        b"HTTP/1.1 200 OK\r\n\r\neverything until close".to_vec(),
        HEAD_END,
    );
    let mut conn = connect(port);

    let mut request = conn.create_request("GET", "/legacy").unwrap();
    conn.send(&mut request).unwrap();

    let mut response = conn.create_response();
    conn.receive(&mut response).unwrap();
    // Server closes after writing; the body runs to end-of-stream
    drop(handle.join().unwrap());
    let body = channel::read_to_end(response.content().unwrap()).unwrap();
    assert_eq!(body, b"everything until close");
    conn.end_response(&mut response).unwrap();
}

struct HeaderAppendingFilter {
    name: &'static str,
    value: &'static str,
}

impl RequestFilter for HeaderAppendingFilter {
    fn filter(&self, request: &mut ClientRequest) -> commlink::client::Result<()> {
        request.add_header(self.name, self.value)
    }
}

#[test]
fn test_request_filters_run_in_order() {
    let (handle, port) = serve_once(
        b"HTTP/1.1 204 No Content\r\nContent-Length: 0\r\n\r\n".to_vec(),
        HEAD_END,
    );
    let mut conn = connect(port);
    conn.append_request_filter(Arc::new(HeaderAppendingFilter {
        name: "X-Order",
        value: "first",
    }));
    conn.append_request_filter(Arc::new(HeaderAppendingFilter {
        name: "X-Order",
        value: "second",
    }));

    let mut request = conn.create_request("GET", "/").unwrap();
    conn.send(&mut request).unwrap();

    let mut response = conn.create_response();
    conn.receive(&mut response).unwrap();
    conn.end_response(&mut response).unwrap();

    let received = handle.join().unwrap();
    let head = String::from_utf8_lossy(&received);
    let first = head.find("X-Order: first").unwrap();
    let second = head.find("X-Order: second").unwrap();
    assert!(first < second);
}

#[test]
fn test_send_while_request_in_flight_is_rejected() {
    let (handle, port) = serve_once(
        b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n".to_vec(),
        HEAD_END,
    );
    let mut conn = connect(port);

    let mut request = conn.create_request("GET", "/a").unwrap();
    conn.send(&mut request).unwrap();

    let mut second = conn.create_request("GET", "/b").unwrap();
    assert!(matches!(conn.send(&mut second), Err(Error::InvalidState(_))));

    // The exchange in flight still completes normally
    let mut response = conn.create_response();
    conn.receive(&mut response).unwrap();
    conn.end_response(&mut response).unwrap();

    handle.join().unwrap();
}

#[test]
fn test_receive_times_out_on_silent_server() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let handle = thread::spawn(move || {
        let (_stream, _) = listener.accept().unwrap();
        thread::sleep(Duration::from_millis(500));
    });

    let mut conn = HttpClientConnection::new("127.0.0.1", port, "", None).unwrap();
    conn.set_timeout(Some(Duration::from_millis(50)));

    let mut request = conn.create_request("GET", "/slow").unwrap();
    conn.send(&mut request).unwrap();

    let mut response = conn.create_response();
    assert!(matches!(conn.receive(&mut response), Err(Error::ReadTimeout)));

    conn.close().unwrap();
    handle.join().unwrap();
}

#[derive(Default)]
struct RecordingListener {
    request_started: AtomicU64,
    request_done: AtomicU64,
    response_started: AtomicU64,
    response_done: AtomicU64,
    request_bytes: AtomicU64,
    response_bytes: AtomicU64,
}

impl ConnectionProgressListener for RecordingListener {
    fn request_started(&self) {
        self.request_started.fetch_add(1, Ordering::SeqCst);
    }

    fn request_progress(&self, bytes_sent: u64) {
        self.request_bytes.store(bytes_sent, Ordering::SeqCst);
    }

    fn request_done(&self) {
        self.request_done.fetch_add(1, Ordering::SeqCst);
    }

    fn response_started(&self) {
        self.response_started.fetch_add(1, Ordering::SeqCst);
    }

    fn response_progress(&self, bytes_received: u64) {
        self.response_bytes.store(bytes_received, Ordering::SeqCst);
    }

    fn response_done(&self) {
        self.response_done.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn test_progress_listener_observes_the_exchange() {
    let reply = b"HTTP/1.1 200 OK\r\nContent-Length: 8\r\n\r\npayload!".to_vec();
    let wire_len = reply.len() as u64;
    let (handle, port) = serve_once(reply, HEAD_END);
    let mut conn = connect(port);
    let listener = Arc::new(RecordingListener::default());
    assert!(conn.attach_progress_listener(listener.clone()));

    let mut request = conn.create_request("GET", "/watched").unwrap();
    conn.send(&mut request).unwrap();

    let mut response = conn.create_response();
    conn.receive(&mut response).unwrap();
    let body = channel::read_to_end(response.content().unwrap()).unwrap();
    assert_eq!(body, b"payload!");
    conn.end_response(&mut response).unwrap();

    assert_eq!(listener.request_started.load(Ordering::SeqCst), 1);
    assert_eq!(listener.request_done.load(Ordering::SeqCst), 1);
    assert_eq!(listener.response_started.load(Ordering::SeqCst), 1);
    assert_eq!(listener.response_done.load(Ordering::SeqCst), 1);
    assert!(listener.request_bytes.load(Ordering::SeqCst) > 0);
    assert_eq!(listener.response_bytes.load(Ordering::SeqCst), 8);

    // Head and body each counted exactly once, whatever segmentation the
    // kernel delivered them in
    assert_eq!(conn.statistics().bytes_received(), wire_len);

    handle.join().unwrap();
}

#[test]
fn test_no_content_response_on_held_open_connection() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let handle = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut received = Vec::new();
        let mut buf = [0u8; 4096];
        while !contains(&received, HEAD_END) {
            let n = stream.read(&mut buf).unwrap();
            assert!(n > 0, "peer closed mid-head");
            received.extend_from_slice(&buf[..n]);
        }
        stream
            .write_all(b"HTTP/1.1 204 No Content\r\n\r\n")
            .unwrap();
        // Keep the connection open well past the client's timeout; the
        // exchange must still finish without waiting for end-of-stream
        thread::sleep(Duration::from_millis(500));
    });

    let mut conn = HttpClientConnection::new("127.0.0.1", port, "", None).unwrap();
    conn.set_timeout(Some(Duration::from_millis(100)));

    let mut request = conn.create_request("GET", "/nothing").unwrap();
    conn.send(&mut request).unwrap();

    let mut response = conn.create_response();
    conn.receive(&mut response).unwrap();
    assert_eq!(response.status_line().unwrap().code(), 204);
    let body = channel::read_to_end(response.content().unwrap()).unwrap();
    assert!(body.is_empty());
    conn.end_response(&mut response).unwrap();

    handle.join().unwrap();
}

#[test]
fn test_connect_times_out_on_unroutable_address() {
    // Blackhole address: SYNs are dropped, so the connect attempt can only
    // end by timing out
    let mut conn = HttpClientConnection::new("10.255.255.1", 81, "", None).unwrap();
    conn.set_timeout(Some(Duration::from_millis(100)));

    let mut request = conn.create_request("GET", "/").unwrap();
    assert!(matches!(
        conn.send(&mut request),
        Err(Error::ConnectTimeout)
    ));
}

#[test]
fn test_connection_reuse_across_exchanges() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let handle = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut buf = [0u8; 4096];
        for body in ["one", "two"] {
            let mut received = Vec::new();
            while !contains(&received, HEAD_END) {
                let n = stream.read(&mut buf).unwrap();
                assert!(n > 0, "peer closed mid-head");
                received.extend_from_slice(&buf[..n]);
            }
            let reply = format!(
                "HTTP/1.1 200 OK\r\nContent-Length: {}\r\n\r\n{}",
                body.len(),
                body
            );
            stream.write_all(reply.as_bytes()).unwrap();
        }
    });

    let mut conn = connect(port);
    for expected in ["one", "two"] {
        let mut request = conn.create_request("GET", "/again").unwrap();
        conn.send(&mut request).unwrap();

        let mut response = conn.create_response();
        conn.receive(&mut response).unwrap();
        let body = channel::read_to_end(response.content().unwrap()).unwrap();
        assert_eq!(body, expected.as_bytes());
        conn.end_response(&mut response).unwrap();
    }
    assert_eq!(conn.statistics().messages_sent(), 2);
    assert_eq!(conn.statistics().messages_received(), 2);

    handle.join().unwrap();
}

#[test]
fn test_unread_body_is_drained_before_reuse() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let handle = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut buf = [0u8; 4096];
        for reply in [
            "HTTP/1.1 200 OK\r\nContent-Length: 10\r\n\r\n0123456789".to_string(),
            "HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nok".to_string(),
        ] {
            let mut received = Vec::new();
            while !contains(&received, HEAD_END) {
                let n = stream.read(&mut buf).unwrap();
                assert!(n > 0, "peer closed mid-head");
                received.extend_from_slice(&buf[..n]);
            }
            stream.write_all(reply.as_bytes()).unwrap();
        }
    });

    let mut conn = connect(port);

    // First exchange: finalize without touching the body
    let mut request = conn.create_request("GET", "/big").unwrap();
    conn.send(&mut request).unwrap();
    let mut response = conn.create_response();
    conn.receive(&mut response).unwrap();
    conn.end_response(&mut response).unwrap();

    // The drained body must not bleed into the next exchange
    let mut request = conn.create_request("GET", "/small").unwrap();
    conn.send(&mut request).unwrap();
    let mut response = conn.create_response();
    conn.receive(&mut response).unwrap();
    assert_eq!(response.status_line().unwrap().code(), 200);
    let body = channel::read_to_end(response.content().unwrap()).unwrap();
    assert_eq!(body, b"ok");
    conn.end_response(&mut response).unwrap();

    handle.join().unwrap();
}
