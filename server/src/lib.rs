pub mod advisor;
pub mod config;
pub mod error;
pub mod routes;
pub mod server_state;

use std::{net::SocketAddr, sync::Arc, time::Instant};

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{HeaderValue, Method, Request},
    middleware::{from_fn, Next},
    response::Response,
    Router,
};
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{AllowOrigin, Any, CorsLayer},
};

use server_state::ServerState;

/// The full application: routes plus request logging, panic catching and CORS.
pub fn app(state: Arc<ServerState>, allowed_origins: &[String]) -> Router {
    routes::router(state)
        .layer(CatchPanicLayer::custom(error::handle_panic))
        .layer(from_fn(log_request))
        .layer(cors_layer(allowed_origins))
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any);

    if allowed_origins.iter().any(|origin| origin == "*") {
        return cors.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin {origin}");
                None
            }
        })
        .collect();

    cors.allow_origin(AllowOrigin::list(origins))
}

async fn log_request(req: Request<Body>, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_owned();
    let peer = req.extensions().get::<ConnectInfo<SocketAddr>>().map(|ConnectInfo(addr)| addr.ip());
    let started = Instant::now();

    let response = next.run(req).await;

    tracing::debug!(
        %method,
        path = %path,
        status = response.status().as_u16(),
        peer = ?peer,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Handled request"
    );

    response
}
