//! Integration tests for the `careescrow serve` HTTP API.
//!
//! Each test starts the server as a child process on a unique port
//! against the simulated escrow contract, makes HTTP requests, and
//! verifies the responses.

use std::io::Read;
use std::net::TcpStream;
use std::path::Path;
use std::process::{Child, Command};
use std::sync::atomic::{AtomicU16, Ordering};
use std::time::Duration;

use serde_json::Value;

/// Atomic port counter to avoid port conflicts between parallel tests.
/// Base port is derived from process ID so separate test binaries don't
/// collide on the same port range.
static NEXT_PORT: AtomicU16 = AtomicU16::new(0);
static PORT_INIT: std::sync::Once = std::sync::Once::new();

fn next_port() -> u16 {
    PORT_INIT.call_once(|| {
        let base = 20000 + (std::process::id() as u16 % 20000);
        NEXT_PORT.store(base, Ordering::SeqCst);
    });
    NEXT_PORT.fetch_add(1, Ordering::SeqCst)
}

/// Kills the server when a test finishes, pass or fail.
struct Server(Child);

impl Drop for Server {
    fn drop(&mut self) {
        let _ = self.0.kill();
        let _ = self.0.wait();
    }
}

/// Helper: start `careescrow serve --simulate-chain` on the given port.
fn start_server(port: u16, config: Option<&Path>, env: &[(&str, &str)]) -> Server {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_careescrow"));
    cmd.arg("serve")
        .arg("--simulate-chain")
        .arg("--port")
        .arg(port.to_string());
    if let Some(path) = config {
        cmd.arg("--config").arg(path);
    }
    for var in ["CARE_API_KEY", "CARE_RATE_LIMIT", "CARE_STAKE_WEI"] {
        cmd.env_remove(var);
    }
    for (key, value) in env {
        cmd.env(key, value);
    }
    // Redirect stdout/stderr to avoid blocking
    cmd.stdout(std::process::Stdio::piped());
    cmd.stderr(std::process::Stdio::piped());

    let child = cmd.spawn().expect("failed to start careescrow serve");
    // Wait for server to be ready by polling the port
    for _ in 0..50 {
        if TcpStream::connect(format!("127.0.0.1:{}", port)).is_ok() {
            return Server(child);
        }
        std::thread::sleep(Duration::from_millis(100));
    }
    Server(child)
}

/// Helper: make an HTTP request and return (status, body).
fn http_request(
    port: u16,
    method: &str,
    path: &str,
    body: Option<&str>,
    extra_headers: &[(&str, &str)],
) -> (u16, String) {
    let mut stream = TcpStream::connect(format!("127.0.0.1:{}", port)).expect("failed to connect");
    stream
        .set_read_timeout(Some(Duration::from_secs(10)))
        .unwrap();

    let mut header_lines = String::new();
    for (name, value) in extra_headers {
        header_lines.push_str(&format!("{}: {}\r\n", name, value));
    }
    let request = match body {
        Some(body) => format!(
            "{} {} HTTP/1.1\r\nHost: localhost:{}\r\nContent-Type: application/json\r\nContent-Length: {}\r\n{}Connection: close\r\n\r\n{}",
            method, path, port, body.len(), header_lines, body
        ),
        None => format!(
            "{} {} HTTP/1.1\r\nHost: localhost:{}\r\n{}Connection: close\r\n\r\n",
            method, path, port, header_lines
        ),
    };
    std::io::Write::write_all(&mut stream, request.as_bytes()).expect("failed to write");

    let mut response = String::new();
    let _ = stream.read_to_string(&mut response);

    parse_http_response(&response)
}

fn http_get(port: u16, path: &str) -> (u16, String) {
    http_request(port, "GET", path, None, &[])
}

/// POST a JSON value and parse the JSON reply.
fn post_json(port: u16, path: &str, body: Value) -> (u16, Value) {
    post_json_with_headers(port, path, body, &[])
}

fn post_json_with_headers(
    port: u16,
    path: &str,
    body: Value,
    headers: &[(&str, &str)],
) -> (u16, Value) {
    let (status, body) = http_request(port, "POST", path, Some(&body.to_string()), headers);
    let json = serde_json::from_str(&body)
        .unwrap_or_else(|e| panic!("invalid JSON from {} ({}): {}", path, e, body));
    (status, json)
}

/// Parse an HTTP response into (status_code, body).
fn parse_http_response(response: &str) -> (u16, String) {
    let parts: Vec<&str> = response.splitn(2, "\r\n\r\n").collect();
    let headers = parts.first().unwrap_or(&"").to_string();
    let body = parts.get(1).unwrap_or(&"").to_string();

    let status_line = headers.lines().next().unwrap_or("");
    let status = status_line
        .split_whitespace()
        .nth(1)
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(0);

    // Handle chunked transfer encoding
    let body = if headers
        .to_lowercase()
        .contains("transfer-encoding: chunked")
    {
        decode_chunked(&body)
    } else {
        body
    };

    (status, body)
}

/// Decode chunked transfer encoding.
fn decode_chunked(data: &str) -> String {
    let mut result = String::new();
    let mut remaining = data;

    while let Some(line_end) = remaining.find("\r\n") {
        let size = match usize::from_str_radix(remaining[..line_end].trim(), 16) {
            Ok(s) => s,
            Err(_) => break,
        };
        if size == 0 {
            break;
        }
        let chunk_start = line_end + 2;
        let chunk_end = chunk_start + size;
        if chunk_end > remaining.len() {
            result.push_str(&remaining[chunk_start..]);
            break;
        }
        result.push_str(&remaining[chunk_start..chunk_end]);
        remaining = if chunk_end + 2 <= remaining.len() {
            &remaining[chunk_end + 2..]
        } else {
            ""
        };
    }

    result
}

/// Register a nurse service for `provider` and return its id.
fn register_service(port: u16, provider: &str) -> String {
    let (status, json) = post_json(
        port,
        "/services",
        serde_json::json!({
            "provider_id": provider,
            "email": format!("{}@example.com", provider),
            "name": "Night nurse",
            "type": "Nurse",
            "hourly_rate": "45.00",
        }),
    );
    assert_eq!(status, 200, "register service: {}", json);
    json["service"]["id"].as_str().expect("service id").to_string()
}

/// Book `service` for `customer` and return the booking id.
fn create_booking(port: u16, service: &str, customer: &str) -> String {
    let (status, json) = post_json(
        port,
        "/bookings",
        serde_json::json!({
            "serviceId": service,
            "userId": customer,
            "email": format!("{}@example.com", customer),
            "date": "2025-06-01",
            "time": "10:00",
            "duration": 3,
        }),
    );
    assert_eq!(status, 200, "create booking: {}", json);
    json["booking"]["id"].as_str().expect("booking id").to_string()
}

#[test]
fn health_reports_simulated_chain() {
    let port = next_port();
    let _server = start_server(port, None, &[]);

    let (status, body) = http_get(port, "/health");
    assert_eq!(status, 200);
    let json: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["status"], "ok");
    assert_eq!(json["chain"], "simulated");
}

#[test]
fn unknown_route_returns_json_404() {
    let port = next_port();
    let _server = start_server(port, None, &[]);

    let (status, body) = http_get(port, "/nope");
    assert_eq!(status, 404);
    let json: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["success"], false);
    assert_eq!(json["error"], "not found");
}

#[test]
fn booking_flows_from_creation_to_completion() {
    let port = next_port();
    let _server = start_server(port, None, &[]);

    let service = register_service(port, "prov-1");
    let (status, json) = post_json(
        port,
        "/bookings",
        serde_json::json!({
            "serviceId": service,
            "userId": "cust-1",
            "email": "cust-1@example.com",
            "date": "2025-06-01",
            "time": "10:00",
            "notes": "ring twice",
        }),
    );
    assert_eq!(status, 200, "{}", json);
    assert_eq!(json["success"], true);
    assert_eq!(json["booking"]["status"], "confirmed");
    assert_eq!(json["booking"]["scheduled_at"], "2025-06-01T10:00:00Z");
    assert_eq!(json["booking"]["duration_hours"], 1);
    let tx_hash = json["txHash"].as_str().unwrap();
    assert!(tx_hash.starts_with("0x"));
    assert_eq!(
        json["booking"]["notes"],
        format!("ring twice\nTx Hash: {}", tx_hash)
    );
    assert_eq!(json["escrowKey"].as_str().unwrap().len(), 66);
    let booking = json["booking"]["id"].as_str().unwrap().to_string();

    let (status, json) = post_json(
        port,
        "/provider/jobs/complete",
        serde_json::json!({ "bookingId": booking, "providerId": "prov-1" }),
    );
    assert_eq!(status, 200, "{}", json);
    assert_eq!(json["booking"]["status"], "in_review");

    let (status, json) = post_json(
        port,
        "/bookings/release",
        serde_json::json!({ "bookingId": booking, "userId": "cust-1" }),
    );
    assert_eq!(status, 200, "{}", json);
    assert_eq!(json["booking"]["status"], "completed");
    let release_tx = json["txHash"].as_str().unwrap();
    assert_eq!(
        json["booking"]["notes"],
        format!("Funds Released. Tx: {}", release_tx)
    );

    let (status, json) = post_json(
        port,
        "/bookings/list",
        serde_json::json!({ "userId": "cust-1" }),
    );
    assert_eq!(status, 200);
    let data = json["data"].as_array().unwrap();
    assert_eq!(data.len(), 1);
    assert_eq!(data[0]["status"], "completed");
    assert_eq!(data[0]["services"]["name"], "Night nurse");
}

#[test]
fn release_before_review_is_a_conflict() {
    let port = next_port();
    let _server = start_server(port, None, &[]);

    let service = register_service(port, "prov-1");
    let booking = create_booking(port, &service, "cust-1");

    let (status, json) = post_json(
        port,
        "/bookings/release",
        serde_json::json!({ "bookingId": booking, "userId": "cust-1" }),
    );
    assert_eq!(status, 409, "{}", json);
    assert_eq!(json["success"], false);
    assert_eq!(json["code"], "INVALID_TRANSITION");
}

#[test]
fn only_the_owning_parties_may_act() {
    let port = next_port();
    let _server = start_server(port, None, &[]);

    let service = register_service(port, "prov-1");
    let booking = create_booking(port, &service, "cust-1");

    let (status, json) = post_json(
        port,
        "/provider/jobs/complete",
        serde_json::json!({ "bookingId": booking, "providerId": "prov-2" }),
    );
    assert_eq!(status, 403, "{}", json);
    assert_eq!(json["code"], "UNAUTHORIZED");

    let (status, json) = post_json(
        port,
        "/bookings/cancel",
        serde_json::json!({ "bookingId": booking, "userId": "cust-2" }),
    );
    assert_eq!(status, 403, "{}", json);
}

#[test]
fn customer_cancels_and_is_refunded() {
    let port = next_port();
    let _server = start_server(port, None, &[]);

    let service = register_service(port, "prov-1");
    let booking = create_booking(port, &service, "cust-1");

    let (status, json) = post_json(
        port,
        "/bookings/cancel",
        serde_json::json!({ "bookingId": booking, "userId": "cust-1" }),
    );
    assert_eq!(status, 200, "{}", json);
    assert_eq!(json["status"], "cancelled");
    assert!(json["txHash"].as_str().unwrap().starts_with("0x"));
}

#[test]
fn invalid_requests_are_rejected() {
    let port = next_port();
    let _server = start_server(port, None, &[]);

    let (status, json) = post_json(
        port,
        "/bookings",
        serde_json::json!({ "userId": "cust-1", "date": "2025-06-01" }),
    );
    assert_eq!(status, 400, "{}", json);
    assert_eq!(json["code"], "VALIDATION_ERROR");

    let (status, json) = post_json(
        port,
        "/bookings",
        serde_json::json!({ "serviceId": "missing", "userId": "cust-1", "date": "2025-06-01" }),
    );
    assert_eq!(status, 404, "{}", json);
    assert_eq!(json["code"], "NOT_FOUND");

    let (status, _) = http_request(port, "POST", "/bookings", Some("{not json"), &[]);
    assert_eq!(status, 400);
}

#[test]
fn provider_sees_jobs_and_role() {
    let port = next_port();
    let _server = start_server(port, None, &[]);

    let service = register_service(port, "prov-1");
    create_booking(port, &service, "cust-1");
    create_booking(port, &service, "cust-2");

    let (status, json) = post_json(
        port,
        "/provider/jobs",
        serde_json::json!({ "providerId": "prov-1" }),
    );
    assert_eq!(status, 200, "{}", json);
    let jobs = json["jobs"].as_array().unwrap();
    assert_eq!(jobs.len(), 2);
    assert_eq!(jobs[0]["services"]["name"], "Night nurse");
    assert!(jobs
        .iter()
        .any(|job| job["users"]["email"] == "cust-1@example.com"));

    let (_, json) = post_json(port, "/users/role", serde_json::json!({ "userId": "prov-1" }));
    assert_eq!(json["role"], "provider");
    let (_, json) = post_json(port, "/users/role", serde_json::json!({ "userId": "cust-1" }));
    assert_eq!(json["role"], "customer");
    let (status, _) = post_json(port, "/users/role", serde_json::json!({ "userId": "ghost" }));
    assert_eq!(status, 404);
}

#[test]
fn api_key_guards_everything_but_health() {
    let port = next_port();
    let _server = start_server(port, None, &[("CARE_API_KEY", "s3cret")]);

    let (status, _) = http_get(port, "/health");
    assert_eq!(status, 200);

    let body = serde_json::json!({ "userId": "cust-1" });
    let (status, _) = post_json(port, "/bookings/list", body.clone());
    assert_eq!(status, 401);

    let (status, _) =
        post_json_with_headers(port, "/bookings/list", body.clone(), &[("X-API-Key", "nope")]);
    assert_eq!(status, 403);

    let (status, json) = post_json_with_headers(
        port,
        "/bookings/list",
        body,
        &[("Authorization", "Bearer s3cret")],
    );
    assert_eq!(status, 200, "{}", json);
    assert_eq!(json["data"], serde_json::json!([]));
}

#[test]
fn sessions_fix_the_acting_user() {
    let dir = tempfile::TempDir::new().unwrap();
    let config = dir.path().join("careescrow.toml");
    std::fs::write(
        &config,
        "[auth.sessions]\n\"tok-cust\" = \"cust-1\"\n\"tok-prov\" = \"prov-1\"\n",
    )
    .unwrap();

    let port = next_port();
    let _server = start_server(port, Some(&config), &[]);

    let (status, json) = post_json_with_headers(
        port,
        "/services",
        serde_json::json!({ "name": "Driver", "type": "Driver", "hourly_rate": 20 }),
        &[("Authorization", "Bearer tok-prov")],
    );
    assert_eq!(status, 200, "{}", json);
    assert_eq!(json["service"]["provider_id"], "prov-1");

    let (status, _) = post_json(port, "/bookings/list", serde_json::json!({}));
    assert_eq!(status, 401);

    let (status, _) = post_json_with_headers(
        port,
        "/bookings/list",
        serde_json::json!({}),
        &[("Authorization", "Bearer tok-unknown")],
    );
    assert_eq!(status, 401);

    let (status, json) = post_json_with_headers(
        port,
        "/bookings/list",
        serde_json::json!({ "userId": "prov-1" }),
        &[("Authorization", "Bearer tok-cust")],
    );
    assert_eq!(status, 403, "{}", json);

    let (status, json) = post_json_with_headers(
        port,
        "/bookings/list",
        serde_json::json!({}),
        &[("Authorization", "Bearer tok-cust")],
    );
    assert_eq!(status, 200, "{}", json);
}
