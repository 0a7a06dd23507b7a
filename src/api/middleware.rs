//! API Middleware
//!
//! Actor extraction and request logging.

use axum::{
    body::Body,
    http::{HeaderMap, HeaderValue, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::net::IpAddr;
use uuid::Uuid;

use crate::domain::{Actor, OperationContext, Role};
use crate::error::AppError;

pub const ACTOR_ID_HEADER: &str = "X-Actor-Id";
pub const ACTOR_ROLE_HEADER: &str = "X-Actor-Role";
pub const CORRELATION_ID_HEADER: &str = "X-Correlation-Id";

// =========================================================================
// Actor Middleware
// =========================================================================

/// Build the [`OperationContext`] from the actor headers set by the
/// authenticating gateway, and echo the correlation id on the response.
pub async fn actor_middleware(mut request: Request<Body>, next: Next) -> Response {
    let context = match operation_context(request.headers()) {
        Ok(context) => context,
        Err(err) => return err.into_response(),
    };
    let correlation_id = context.correlation_id;

    request.extensions_mut().insert(context);
    let mut response = next.run(request).await;

    if let Some(value) = correlation_id.and_then(|id| HeaderValue::from_str(&id.to_string()).ok()) {
        response.headers_mut().insert("x-correlation-id", value);
    }
    response
}

/// Parse the actor, correlation id, client ip and user agent
pub fn operation_context(headers: &HeaderMap) -> Result<OperationContext, AppError> {
    let user_id: i64 = required_header(headers, ACTOR_ID_HEADER)?
        .parse()
        .map_err(|_| AppError::InvalidHeader(ACTOR_ID_HEADER.to_string()))?;
    let role: Role = required_header(headers, ACTOR_ROLE_HEADER)?
        .parse()
        .map_err(|_| AppError::InvalidHeader(ACTOR_ROLE_HEADER.to_string()))?;

    let correlation_id = headers
        .get(CORRELATION_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| Uuid::parse_str(s.trim()).ok())
        .unwrap_or_else(Uuid::new_v4);

    let mut context = OperationContext::new()
        .with_actor(Actor::new(user_id, role))
        .with_correlation_id(correlation_id);

    // First hop of X-Forwarded-For is the originating client
    if let Some(ip) = headers
        .get("X-Forwarded-For")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .and_then(|s| s.trim().parse::<IpAddr>().ok())
    {
        context = context.with_client_ip(ip);
    }

    if let Some(user_agent) = headers.get("User-Agent").and_then(|v| v.to_str().ok()) {
        context = context.with_user_agent(user_agent);
    }

    Ok(context)
}

fn required_header<'a>(headers: &'a HeaderMap, name: &str) -> Result<&'a str, AppError> {
    let value = headers
        .get(name)
        .ok_or_else(|| AppError::MissingHeader(name.to_string()))?;
    let value = value
        .to_str()
        .map_err(|_| AppError::InvalidHeader(name.to_string()))?
        .trim();
    if value.is_empty() {
        return Err(AppError::MissingHeader(name.to_string()));
    }
    Ok(value)
}

// =========================================================================
// mask_headers_for_logging
// =========================================================================

/// Headers that should be masked in logs
const SENSITIVE_HEADERS: &[&str] = &[
    "authorization",
    "proxy-authorization",
    "cookie",
    "set-cookie",
];

/// Mask sensitive headers for logging
pub fn mask_headers_for_logging(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| {
            let name_lower = name.as_str().to_lowercase();
            let masked_value = if SENSITIVE_HEADERS.contains(&name_lower.as_str()) {
                "[REDACTED]".to_string()
            } else {
                value.to_str().unwrap_or("[invalid utf8]").to_string()
            };
            (name.to_string(), masked_value)
        })
        .collect()
}

// =========================================================================
// Request Logging Middleware
// =========================================================================

/// Request logging middleware
pub async fn logging_middleware(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let headers = mask_headers_for_logging(request.headers());

    let start = std::time::Instant::now();

    tracing::info!(
        method = %method,
        path = %path,
        headers = ?headers,
        "Incoming request"
    );

    let response = next.run(request).await;

    let correlation_id = response
        .headers()
        .get(CORRELATION_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    tracing::info!(
        method = %method,
        path = %path,
        status = %response.status(),
        duration_ms = %start.elapsed().as_millis(),
        correlation_id = ?correlation_id,
        "Request completed"
    );

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for (name, value) in pairs {
            headers.insert(*name, value.parse().unwrap());
        }
        headers
    }

    #[test]
    fn test_mask_headers_for_logging() {
        let headers = headers(&[
            ("content-type", "application/json"),
            ("authorization", "Bearer secret"),
            ("x-actor-id", "7"),
        ]);

        let masked = mask_headers_for_logging(&headers);

        let auth = masked.iter().find(|(k, _)| k == "authorization");
        let content_type = masked.iter().find(|(k, _)| k == "content-type");
        let actor = masked.iter().find(|(k, _)| k == "x-actor-id");

        assert_eq!(auth.unwrap().1, "[REDACTED]");
        assert_eq!(content_type.unwrap().1, "application/json");
        assert_eq!(actor.unwrap().1, "7");
    }

    #[test]
    fn test_operation_context_from_headers() {
        let headers = headers(&[
            ("x-actor-id", "7"),
            ("x-actor-role", "Caissier"),
            ("x-correlation-id", "6f1c9a52-2a57-4d8e-9b3c-1f0e2d3c4b5a"),
            ("x-forwarded-for", "10.0.0.8, 172.16.0.1"),
            ("user-agent", "dashboard/1.0"),
        ]);

        let context = operation_context(&headers).unwrap();

        assert_eq!(context.actor, Some(Actor::new(7, Role::Caissier)));
        assert_eq!(
            context.correlation_id.unwrap().to_string(),
            "6f1c9a52-2a57-4d8e-9b3c-1f0e2d3c4b5a"
        );
        assert_eq!(context.client_ip, Some("10.0.0.8".parse().unwrap()));
        assert_eq!(context.user_agent.as_deref(), Some("dashboard/1.0"));
    }

    #[test]
    fn test_missing_and_malformed_actor() {
        let err = operation_context(&headers(&[("x-actor-role", "admin")])).unwrap_err();
        assert!(matches!(err, AppError::MissingHeader(h) if h == ACTOR_ID_HEADER));

        let err = operation_context(&headers(&[("x-actor-id", "seven"), ("x-actor-role", "admin")]))
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidHeader(h) if h == ACTOR_ID_HEADER));

        let err = operation_context(&headers(&[("x-actor-id", "7"), ("x-actor-role", "root")]))
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidHeader(h) if h == ACTOR_ROLE_HEADER));
    }

    #[test]
    fn test_correlation_id_generated_when_absent() {
        let context =
            operation_context(&headers(&[("x-actor-id", "1"), ("x-actor-role", "admin")])).unwrap();
        assert!(context.correlation_id.is_some());
        assert!(context.client_ip.is_none());
    }
}
