use axum::http;
use reqwest::{Request, Response};
use reqwest_middleware::{Middleware, Next, Result as MiddlewareResult};
use std::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

pub const CORRELATION_ID_HEADER: &str = "x-correlation-id";

/// Correlation id carried in request extensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrelationId(pub String);

/// Tags every outbound call with a correlation id and logs its outcome.
pub struct TracingMiddleware;

#[async_trait::async_trait]
impl Middleware for TracingMiddleware {
    async fn handle(
        &self,
        mut req: Request,
        extensions: &mut http::Extensions,
        next: Next<'_>,
    ) -> MiddlewareResult<Response> {
        let correlation_id = match req.headers().get(CORRELATION_ID_HEADER) {
            Some(existing) => existing
                .to_str()
                .map(str::to_string)
                .unwrap_or_else(|_| Uuid::new_v4().to_string()),
            None => extensions
                .get::<CorrelationId>()
                .map(|id| id.0.clone())
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
        };

        if !req.headers().contains_key(CORRELATION_ID_HEADER) {
            if let Ok(value) = correlation_id.parse() {
                req.headers_mut().insert(CORRELATION_ID_HEADER, value);
            }
        }

        let method = req.method().clone();
        let path = req.url().path().to_string();
        let started = Instant::now();

        let response = next.run(req, extensions).await;

        let elapsed_ms = started.elapsed().as_millis();
        match &response {
            Ok(resp) if resp.status().is_success() => debug!(
                "[{}] {} {} -> {} in {}ms",
                correlation_id,
                method,
                path,
                resp.status().as_u16(),
                elapsed_ms
            ),
            Ok(resp) => warn!(
                "[{}] {} {} -> {} in {}ms",
                correlation_id,
                method,
                path,
                resp.status().as_u16(),
                elapsed_ms
            ),
            Err(e) => warn!(
                "[{}] {} {} failed after {}ms: {}",
                correlation_id, method, path, elapsed_ms, e
            ),
        }

        response
    }
}
