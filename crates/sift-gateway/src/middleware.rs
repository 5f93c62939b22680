use axum::{
    extract::Request,
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use std::time::Instant;
use tracing::info;

/// Header a client may use to name its rate-limit partition.
pub const CLIENT_ID_HEADER: &str = "x-client-id";

/// Partition used when a request carries no identity at all.
pub const ANONYMOUS_IDENTITY: &str = "anonymous";

/// Identity resolved from request headers, stored as a request extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdentity(pub Option<String>);

impl ClientIdentity {
    /// Read the identity from `x-client-id`. Blank or non-UTF-8 values count
    /// as absent.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let id = headers
            .get(CLIENT_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string);
        Self(id)
    }

    /// The identity to rate-limit on, preferring `explicit` when given.
    pub fn resolve(&self, explicit: Option<&str>) -> String {
        explicit
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .or(self.0.as_deref())
            .unwrap_or(ANONYMOUS_IDENTITY)
            .to_string()
    }
}

/// Attach the header identity to the request and log each exchange.
pub async fn identity_middleware(mut request: Request, next: Next) -> Response {
    let identity = ClientIdentity::from_headers(request.headers());
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    request.extensions_mut().insert(identity);

    let started = Instant::now();
    let response = next.run(request).await;
    info!(
        %method,
        path,
        status = response.status().as_u16(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Request handled"
    );
    response
}
