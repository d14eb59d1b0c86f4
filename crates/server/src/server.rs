use axum::{
    Router,
    routing::{get, post},
};

use std::sync::Arc;

use crate::{comparables, estimations};
use engine::Engine;

#[derive(Clone)]
pub struct ServerState {
    pub engine: Arc<Engine>,
}

fn router(state: ServerState) -> Router {
    Router::new()
        .route(
            "/estimations",
            post(estimations::create).get(estimations::list),
        )
        .route(
            "/estimations/{id}",
            get(estimations::get)
                .put(estimations::save)
                .delete(estimations::delete),
        )
        .route("/estimations/{id}/valuation", post(estimations::recalculate))
        .route("/comparables", post(comparables::add))
        .route("/comparables/{city}", get(comparables::list))
        .with_state(state)
}

/// Builds the application router around an engine.
///
/// Exposed so tests and embedders can drive the API without a listener.
pub fn app(engine: Engine) -> Router {
    router(ServerState {
        engine: Arc::new(engine),
    })
}

pub async fn run(engine: Engine) {
    let listener = match tokio::net::TcpListener::bind("127.0.0.1:3000").await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!("failed to bind server listener: {err}");
            return;
        }
    };
    if let Err(err) = run_with_listener(engine, listener).await {
        tracing::error!("server failed: {err}");
    }
}

pub async fn run_with_listener(
    engine: Engine,
    listener: tokio::net::TcpListener,
) -> Result<(), std::io::Error> {
    let addr = listener.local_addr()?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app(engine)).await
}

pub fn spawn_with_listener(
    engine: Engine,
    listener: tokio::net::TcpListener,
) -> Result<std::net::SocketAddr, std::io::Error> {
    let addr = listener.local_addr()?;

    tokio::spawn(async move {
        if let Err(err) = run_with_listener(engine, listener).await {
            tracing::error!("server failed: {err}");
        }
    });

    Ok(addr)
}
