//! Lets wiremock-backed integration tests skip where localhost cannot be bound.
//!
//! `FEEDSYNC_REQUIRE_SOCKET_TESTS=1` turns a skip into a failure (CI).

use std::net::TcpListener;

use wiremock::MockServer;

fn required() -> bool {
    std::env::var("FEEDSYNC_REQUIRE_SOCKET_TESTS")
        .is_ok_and(|value| matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
}

/// Starts a mock server, or returns `None` after logging why the test is skipped.
pub async fn start_mock_server_or_skip() -> Option<MockServer> {
    if let Err(error) = TcpListener::bind("127.0.0.1:0") {
        assert!(!required(), "localhost socket unavailable: {error}");
        eprintln!("[socket-bound-test] localhost socket unavailable ({error}); skipping");
        return None;
    }
    Some(MockServer::start().await)
}
