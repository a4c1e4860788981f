//! Common test utilities: a minimal one-shot HTTP stub standing in for the
//! routing service.

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener};
use std::thread;

/// Spawn a stub routing service that answers every request with `body`.
///
/// Returns the base URL to point a `RoutingClient` at. The serving thread
/// runs for the remainder of the test process.
pub fn spawn_routing_stub(body: &str) -> String {
    serve(body.to_string(), "200 OK")
}

/// Spawn a stub that answers with an HTTP error status and `body`.
pub fn spawn_routing_stub_with_status(body: &str, status: &'static str) -> String {
    serve(body.to_string(), status)
}

/// Reserve an address with nothing listening on it, for connection-refused
/// scenarios.
pub fn unreachable_base_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind probe listener");
    let addr = listener.local_addr().expect("probe addr");
    drop(listener);
    format!("http://{addr}")
}

fn serve(body: String, status: &'static str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind stub listener");
    let addr: SocketAddr = listener.local_addr().expect("stub addr");

    thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(mut stream) = stream else { break };
            // Drain the request head; these tests never send bodies.
            let mut buffer = [0u8; 4096];
            let _ = stream.read(&mut buffer);

            let response = format!(
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            let _ = stream.write_all(response.as_bytes());
        }
    });

    format!("http://{addr}")
}
