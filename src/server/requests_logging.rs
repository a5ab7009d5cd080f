//! Request logging middleware

use axum::{body::Body, extract::Request, middleware::Next, response::IntoResponse};
use std::time::Instant;
use tracing::{info, warn};

pub async fn log_requests(request: Request<Body>, next: Next) -> impl IntoResponse {
    let start = Instant::now();
    let method = request.method().to_string();
    let uri = request.uri().to_string();

    info!(">>> {} {}", method, uri);

    let response = next.run(request).await;
    let status = response.status();
    let elapsed = start.elapsed().as_millis();

    if status.is_server_error() {
        warn!("<<< {} {} {} ({}ms)", method, uri, status.as_u16(), elapsed);
    } else {
        info!("<<< {} {} {} ({}ms)", method, uri, status.as_u16(), elapsed);
    }

    response
}
