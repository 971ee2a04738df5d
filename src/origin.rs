//! Built-in informational origin.
//!
//! Answers every request with the configured greeting so the proxy has
//! something to forward to out of the box.

use axum::{extract::State, Router};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;

use crate::lifecycle::shutdown::signalled;

#[derive(Clone)]
struct OriginState {
    greeting: String,
}

async fn greet(State(state): State<OriginState>) -> String {
    state.greeting
}

pub fn setup_origin_router(greeting: &str) -> Router {
    Router::new()
        .fallback(greet)
        .with_state(OriginState {
            greeting: greeting.to_string(),
        })
        .layer(TraceLayer::new_for_http())
}

/// Serve the origin until `shutdown` fires.
pub async fn serve_origin(
    listener: TcpListener,
    greeting: String,
    shutdown: broadcast::Receiver<()>,
) -> std::io::Result<()> {
    tracing::info!(address = ?listener.local_addr().ok(), "Origin server starting");

    axum::serve(listener, setup_origin_router(&greeting))
        .with_graceful_shutdown(signalled(shutdown))
        .await?;

    tracing::info!("Origin server stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    #[tokio::test]
    async fn answers_any_path_and_method() {
        for method in ["GET", "POST", "DELETE"] {
            let res = setup_origin_router("Hi there")
                .oneshot(
                    Request::builder()
                        .method(method)
                        .uri("/gophers?x=1")
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();
            assert_eq!(res.status(), StatusCode::OK);
            let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
            assert_eq!(&bytes[..], b"Hi there");
        }
    }
}
