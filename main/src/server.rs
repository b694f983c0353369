use api_router::{api_routes, api_state::ApiState};
use axum::{
    http::{header::CONTENT_TYPE, HeaderName, HeaderValue, Method},
    Router,
};
use common::utils::config::{get_config, AppConfig};
use tokio::signal;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Set up tracing
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .try_init()
        .ok();

    std::panic::set_hook(Box::new(|panic_info| {
        error!(panic = %panic_info, "Unhandled panic");
    }));

    // Get config
    let config = get_config()?;
    if config.openai_api_key.trim().is_empty() {
        warn!("OPENAI_API_KEY is not set; provider calls will fail");
    }
    if config.admin_token().is_none() {
        warn!("ADMIN_TOKEN is not set; the admin endpoints are disabled");
    }

    let api_state = ApiState::new(&config);
    let app = build_app(&config, api_state);

    let serve_address = format!("0.0.0.0:{}", config.port);
    info!(address = %serve_address, origin = %config.origin, "Starting server");
    let listener = tokio::net::TcpListener::bind(serve_address).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down");
    Ok(())
}

fn build_app(config: &AppConfig, api_state: ApiState) -> Router {
    with_layers(api_routes(&api_state).with_state(api_state), config)
}

/// CORS sits outermost so panic-generated 500s still carry the origin header.
fn with_layers(router: Router, config: &AppConfig) -> Router {
    router
        .layer(CatchPanicLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&config.origin))
}

/// Allows the widget's single origin. An unparsable origin disables
/// cross-origin access instead of widening it.
fn cors_layer(origin: &str) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([CONTENT_TYPE, HeaderName::from_static("x-admin-token")]);

    let origin = origin.trim();
    if origin == "*" {
        return layer.allow_origin(AllowOrigin::any());
    }

    match origin.parse::<HeaderValue>() {
        Ok(value) => layer.allow_origin(AllowOrigin::list([value])),
        Err(e) => {
            error!(origin = %origin, error = %e, "Invalid CORS origin; cross-origin requests will be refused");
            layer
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received SIGINT, starting graceful shutdown"),
        () = terminate => info!("Received SIGTERM, starting graceful shutdown"),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use axum::{body::Body, http::Request, http::StatusCode};
    use common::provider::fake::FakeProvider;
    use tower::ServiceExt;

    fn smoke_test_config(dir: &std::path::Path) -> AppConfig {
        AppConfig {
            openai_api_key: "test-key".into(),
            admin_token: Some("smoke".into()),
            state_file: dir.join("config.json"),
            upload_dir: dir.join("staging"),
            port: 0,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn smoke_startup_serves_probe_and_cors() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = smoke_test_config(dir.path());
        let state = ApiState::with_provider(&config, Arc::new(FakeProvider::answering("ok")));
        let app = build_app(&config, state);

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/healthz")
                    .header("origin", config.origin.as_str())
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("router response");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response
                .headers()
                .get("access-control-allow-origin")
                .and_then(|v| v.to_str().ok()),
            Some(config.origin.as_str())
        );

        let preflight = app
            .oneshot(
                Request::builder()
                    .method("OPTIONS")
                    .uri("/api/ask")
                    .header("origin", config.origin.as_str())
                    .header("access-control-request-method", "POST")
                    .header("access-control-request-headers", "content-type")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("router response");
        assert!(preflight.status().is_success());
    }

    #[tokio::test]
    async fn unknown_origin_is_not_echoed() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = smoke_test_config(dir.path());
        let state = ApiState::with_provider(&config, Arc::new(FakeProvider::default()));

        let response = build_app(&config, state)
            .oneshot(
                Request::builder()
                    .uri("/")
                    .header("origin", "https://elsewhere.example")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response
            .headers()
            .get("access-control-allow-origin")
            .is_none());
    }

    #[tokio::test]
    #[allow(clippy::panic)]
    async fn panicking_handler_returns_500_with_cors_headers() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = smoke_test_config(dir.path());
        async fn boom() -> &'static str {
            panic!("handler blew up")
        }
        let router = Router::new().route("/boom", axum::routing::get(boom));

        let response = with_layers(router, &config)
            .oneshot(
                Request::builder()
                    .uri("/boom")
                    .header("origin", config.origin.as_str())
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            response
                .headers()
                .get("access-control-allow-origin")
                .and_then(|v| v.to_str().ok()),
            Some(config.origin.as_str())
        );
    }

    #[test]
    fn invalid_origin_still_builds_a_layer() {
        let _layer = cors_layer("not a header\nvalue");
    }
}
