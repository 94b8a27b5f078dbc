//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use fleet_optimizer::solver::{OptimizationRequest, Solver, SolverError, SolverOutput, SolverResult};

/// Depot west of the Izmit Bay crossing, outside every corridor box.
pub const DEPOT: (f64, f64) = (40.80, 29.43);
/// Customer on the Hersek side, inside the Osmangazi corridor box.
pub const CUSTOMER: (f64, f64) = (40.72, 29.52);
/// Osmangazi tariff for rigid trucks.
pub const OSMANGAZI_TRUCK: f64 = 1575.0;

/// A minimal valid submission with one depot, vehicle and customer.
pub fn sample_request() -> Value {
    json!({
        "depots": [{"id": "d1", "name": "Dilovasi", "location": {"lat": DEPOT.0, "lng": DEPOT.1}}],
        "vehicles": [{"id": "v1", "plate": "41 ABC 001", "type": 2}],
        "customers": [{"id": "c1", "name": "Hersek", "location": {"lat": CUSTOMER.0, "lng": CUSTOMER.1}, "demand": 6}],
        "fuel_price": 44.1
    })
}

pub fn sample_typed_request() -> OptimizationRequest {
    serde_json::from_value(sample_request()).unwrap()
}

/// Solver output for `sample_request`: depot → customer → depot.
pub fn crossing_output() -> Value {
    json!({
        "success": true,
        "routes": [{
            "vehicle_id": "v1",
            "plate": "41 ABC 001",
            "depot_id": "d1",
            "stops": [{"customer_id": "c1", "location": {"lat": CUSTOMER.0, "lng": CUSTOMER.1}, "stopOrder": 1}],
            "distance_km": 48.0,
            "fuel_cost": 600.0,
            "distance_cost": 96.0,
            "fixed_cost": 250.0,
            "toll_cost": 0.0,
            "total_cost": 946.0
        }],
        "summary": {"total_routes": 1, "total_distance_km": 48.0, "total_cost": 946.0}
    })
}

/// Depot next to the Gebze Guney gate of the Anadolu Otoyolu.
pub const GEBZE: (f64, f64) = (40.9125, 29.258);
/// Customer next to the Izmit Guney gate, 50 km further along.
pub const IZMIT: (f64, f64) = (40.7825, 29.892);
/// 50 km at the rigid-truck rate of 2.85 per km.
pub const ANADOLU_GEBZE_IZMIT_TRUCK: f64 = 142.5;

pub fn motorway_request() -> OptimizationRequest {
    serde_json::from_value(json!({
        "depots": [{"id": "d1", "name": "Gebze", "location": {"lat": GEBZE.0, "lng": GEBZE.1}}],
        "vehicles": [{"id": "v1", "type": "kamyon"}],
        "customers": [{"id": "c1", "name": "Izmit", "location": {"lat": IZMIT.0, "lng": IZMIT.1}}]
    }))
    .unwrap()
}

pub fn motorway_output() -> Value {
    json!({
        "success": true,
        "routes": [{
            "vehicle_id": "v1",
            "depot_id": "d1",
            "stops": [{"customer_id": "c1", "location": {"lat": IZMIT.0, "lng": IZMIT.1}}],
            "distance_km": 110.0,
            "fuel_cost": 600.0,
            "distance_cost": 220.0,
            "fixed_cost": 80.0,
            "total_cost": 900.0
        }]
    })
}

/// Always returns the same output.
pub struct FixedSolver {
    output: SolverOutput,
}

impl FixedSolver {
    pub fn new(output: Value) -> Arc<Self> {
        Arc::new(Self {
            output: serde_json::from_value(output).unwrap(),
        })
    }
}

#[async_trait]
impl Solver for FixedSolver {
    async fn solve(&self, _request: &OptimizationRequest, _timeout: Duration) -> SolverResult<SolverOutput> {
        Ok(self.output.clone())
    }
}

/// Always fails with a transport error.
pub struct FailingSolver;

#[async_trait]
impl Solver for FailingSolver {
    async fn solve(&self, _request: &OptimizationRequest, _timeout: Duration) -> SolverResult<SolverOutput> {
        Err(SolverError::Transport("connection refused".into()))
    }
}

/// Never answers.
pub struct HangingSolver;

#[async_trait]
impl Solver for HangingSolver {
    async fn solve(&self, _request: &OptimizationRequest, _timeout: Duration) -> SolverResult<SolverOutput> {
        std::future::pending().await
    }
}

/// Counts calls and answers after `delay`.
pub struct CountingSolver {
    pub calls: AtomicUsize,
    delay: Duration,
    output: SolverOutput,
}

impl CountingSolver {
    pub fn new(delay: Duration, output: Value) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            delay,
            output: serde_json::from_value(output).unwrap(),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Solver for CountingSolver {
    async fn solve(&self, _request: &OptimizationRequest, _timeout: Duration) -> SolverResult<SolverOutput> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        Ok(self.output.clone())
    }
}

/// Read one HTTP/1.1 request and return its body.
async fn read_request(socket: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let header_end = loop {
        let n = socket.read(&mut chunk).await.unwrap_or(0);
        if n == 0 {
            return String::new();
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_ascii_lowercase();
    let content_length = head
        .lines()
        .find_map(|l| l.strip_prefix("content-length:"))
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(0);

    while buf.len() < header_end + content_length {
        let n = socket.read(&mut chunk).await.unwrap_or(0);
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    String::from_utf8_lossy(&buf[header_end..]).into_owned()
}

/// Start a programmable mock backend on an ephemeral port.
///
/// `f` receives the request body and returns the status code and body to send.
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        let request_body = read_request(&mut socket).await;
                        let (status, body) = f(request_body).await;
                        let status_text = match status {
                            200 => "200 OK",
                            400 => "400 Bad Request",
                            404 => "404 Not Found",
                            422 => "422 Unprocessable Entity",
                            500 => "500 Internal Server Error",
                            502 => "502 Bad Gateway",
                            503 => "503 Service Unavailable",
                            _ => "200 OK",
                        };

                        let response = format!(
                            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_text,
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

/// Start a backend that always answers with `status` and `body`.
pub async fn start_mock_backend(status: u16, body: &'static str) -> SocketAddr {
    start_programmable_backend(move |_| async move { (status, body.to_string()) }).await
}

/// Client that never reuses connections to the mock backends.
pub fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
