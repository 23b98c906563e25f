//! Business logic shared by both service flavours.
//!
//! Nothing in here touches telemetry; the auto flavour calls these
//! functions directly and the manual flavour wraps them in spans and
//! instruments.

use axum::body::Body;
use axum::extract::Query;
use axum::http::{HeaderMap, Method, Request, Uri};
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;

use crate::error::AppError;

pub const SLOW_MESSAGE: &str = "This endpoint is slow";
pub const SIMULATED_ERROR: &str = "This is a simulated error";

/// Bounds of the `/slow` delay (upper bound exclusive).
pub const SLOW_DELAY_MIN: Duration = Duration::from_millis(500);
pub const SLOW_DELAY_MAX: Duration = Duration::from_secs(2);

pub const DEFAULT_COMPUTE_N: i64 = 10;

/// Largest request body `/server_request` will buffer.
pub const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Endpoints that carry business logic (everything but `/health`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Slow,
    Error,
    Compute,
    ServerRequest,
}

impl Endpoint {
    pub const ALL: [Endpoint; 4] = [
        Endpoint::Slow,
        Endpoint::Error,
        Endpoint::Compute,
        Endpoint::ServerRequest,
    ];

    /// Name used for instruments, spans and log fields.
    pub fn name(self) -> &'static str {
        match self {
            Endpoint::Slow => "slow",
            Endpoint::Error => "error",
            Endpoint::Compute => "compute",
            Endpoint::ServerRequest => "server_request",
        }
    }

    pub fn path(self) -> &'static str {
        match self {
            Endpoint::Slow => "/slow",
            Endpoint::Error => "/error",
            Endpoint::Compute => "/compute",
            Endpoint::ServerRequest => "/server_request",
        }
    }

    /// Position in [`Endpoint::ALL`].
    pub fn index(self) -> usize {
        match self {
            Endpoint::Slow => 0,
            Endpoint::Error => 1,
            Endpoint::Compute => 2,
            Endpoint::ServerRequest => 3,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct HealthResponse {
    pub status: String,
}

impl HealthResponse {
    pub fn ok() -> Self {
        Self {
            status: "ok".into(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ComputeResponse {
    pub result: i128,
}

#[derive(Debug, Deserialize)]
pub struct ComputeParams {
    pub n: Option<i64>,
}

impl ComputeParams {
    pub fn n(&self) -> i64 {
        self.n.unwrap_or(DEFAULT_COMPUTE_N)
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct EchoResponse {
    pub headers: Map<String, Value>,
    pub query_params: Map<String, Value>,
    pub body: Value,
}

/// Σ i² for i in 0..n, or `None` if the result overflows.
///
/// A non-positive `n` is an empty range.
pub fn sum_of_squares(n: i64) -> Option<i128> {
    if n <= 0 {
        return Some(0);
    }
    // (n - 1) n (2n - 1) / 6
    let n = i128::from(n);
    (n - 1)
        .checked_mul(n)?
        .checked_mul(2 * n - 1)
        .map(|product| product / 6)
}

/// Compute the `/compute` response for `n`.
pub fn compute(n: i64) -> Result<ComputeResponse, AppError> {
    sum_of_squares(n)
        .map(|result| ComputeResponse { result })
        .ok_or(AppError::ComputeOverflow(n))
}

/// Uniformly random `/slow` delay.
pub fn slow_delay() -> Duration {
    rand::thread_rng().gen_range(SLOW_DELAY_MIN..SLOW_DELAY_MAX)
}

/// Block a worker on the blocking pool for `delay`.
///
/// The async executor keeps serving other requests meanwhile.
pub async fn block_for(delay: Duration) -> Result<(), AppError> {
    tokio::task::spawn_blocking(move || std::thread::sleep(delay)).await?;
    Ok(())
}

/// `/slow` body: block for a random delay, then answer.
pub async fn slow() -> Result<MessageResponse, AppError> {
    block_for(slow_delay()).await?;
    Ok(MessageResponse {
        message: SLOW_MESSAGE.into(),
    })
}

/// The failure `/error` always raises.
pub fn simulated_error() -> AppError {
    AppError::Simulated(SIMULATED_ERROR.into())
}

/// Methods whose body `/server_request` parses as JSON.
pub fn has_json_body(method: &Method) -> bool {
    matches!(*method, Method::POST | Method::PUT | Method::PATCH)
}

/// Header map with one value per name (the first), lossily decoded.
///
/// Names keep the order they arrived in.
pub fn header_map(headers: &HeaderMap) -> Map<String, Value> {
    headers
        .keys()
        .filter_map(|name| {
            headers.get(name).map(|value| {
                (
                    name.as_str().to_string(),
                    Value::String(String::from_utf8_lossy(value.as_bytes()).into_owned()),
                )
            })
        })
        .collect()
}

/// Query parameters in request order; a repeated name keeps its last value.
pub fn query_map(uri: &Uri) -> Map<String, Value> {
    Query::<Vec<(String, String)>>::try_from_uri(uri)
        .map(|Query(pairs)| pairs)
        .unwrap_or_default()
        .into_iter()
        .map(|(name, value)| (name, Value::String(value)))
        .collect()
}

/// `/server_request` body: echo headers, query parameters and JSON body.
///
/// Reading the body is the only point where the handler waits on I/O.
pub async fn echo(request: Request<Body>) -> Result<EchoResponse, AppError> {
    let (parts, body) = request.into_parts();

    let body = if has_json_body(&parts.method) {
        let bytes = axum::body::to_bytes(body, MAX_BODY_BYTES)
            .await
            .map_err(|e| AppError::BodyRead(e.to_string()))?;
        serde_json::from_slice(&bytes).map_err(AppError::InvalidJsonBody)?
    } else {
        Value::Object(Map::new())
    };

    Ok(EchoResponse {
        headers: header_map(&parts.headers),
        query_params: query_map(&parts.uri),
        body,
    })
}
