use std::net::SocketAddr;

use axum::extract::{ConnectInfo, State};
use axum::http::HeaderMap;
use axum::Json;

use crate::errors::AppError;
use crate::optimize::{run_optimization, OptimizeRequest, OptimizeResponse};
use crate::state::AppState;

/// POST /api/v1/optimize
pub async fn handle_optimize(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(req): Json<OptimizeRequest>,
) -> Result<Json<OptimizeResponse>, AppError> {
    if !state.rate_limiter.check(&client_key(&headers, addr)) {
        return Err(AppError::RateLimited);
    }

    let response = run_optimization(&state.entitlements, &state.llm, req).await?;
    Ok(Json(response))
}

/// Rate-limit key: the first X-Forwarded-For hop when behind a proxy, else
/// the socket address.
fn client_key(headers: &HeaderMap, addr: SocketAddr) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .unwrap_or_else(|| addr.ip().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_addr() -> SocketAddr {
        "192.168.1.9:55000".parse().unwrap()
    }

    #[test]
    fn test_client_key_prefers_the_first_forwarded_hop() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "203.0.113.7, 10.0.0.1".parse().unwrap());
        assert_eq!(client_key(&headers, make_addr()), "203.0.113.7");
    }

    #[test]
    fn test_client_key_falls_back_to_the_socket_address() {
        assert_eq!(client_key(&HeaderMap::new(), make_addr()), "192.168.1.9");
    }
}
