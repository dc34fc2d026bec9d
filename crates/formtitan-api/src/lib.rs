//! Form-Titan API: serves form definitions and collects submissions
pub mod handlers;
pub mod store;
pub mod transport;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use handlers::AppState;
pub use store::{FormStore, FormSubmission, StoreError};
pub use transport::LocalTransport;

pub fn create_app(store: AppState) -> Router {
    Router::new()
        .route("/api", get(handlers::root))
        .route("/api/", get(handlers::root))
        .route("/api/forms/{form_id}", get(handlers::get_form).put(handlers::put_form))
        .route(
            "/api/forms/{form_id}/submissions",
            post(handlers::submit_form).get(handlers::list_submissions),
        )
        .route("/api/forms/{form_id}/preview", post(handlers::preview_form))
        .route("/api/health", get(handlers::health))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(store)
}

pub async fn run(addr: &str, store: Arc<FormStore>) -> std::io::Result<()> {
    let app = create_app(store);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!("Form-Titan API listening on {}", addr);
    axum::serve(listener, app).await
}
