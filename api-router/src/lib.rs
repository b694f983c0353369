use api_state::ApiState;
use axum::{
    extract::{DefaultBodyLimit, FromRef},
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use middleware_admin_auth::admin_auth;
use routes::{
    admin::{
        create::create_store, diag::diagnostics, page::show_admin_page, status::store_status,
        upload::upload_files,
    },
    ask::ask,
    liveness::{healthz, root},
};

pub mod api_state;
pub mod error;
pub mod middleware_admin_auth;
mod routes;

/// Router for the widget endpoint, the liveness probes and the admin surface.
pub fn api_routes<S>(app_state: &ApiState) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
    ApiState: FromRef<S>,
{
    // Public endpoints used by the widget and uptime checks
    let public = Router::new()
        .route("/", get(root))
        .route("/healthz", get(healthz))
        .route(
            "/api/ask",
            post(ask).layer(DefaultBodyLimit::max(app_state.config.json_body_limit_bytes)),
        );

    // Admin endpoints (require the shared token)
    let admin = Router::new()
        .route("/admin", get(show_admin_page))
        .route("/admin/create", post(create_store))
        .route(
            "/admin/upload",
            post(upload_files).layer(DefaultBodyLimit::max(
                app_state.config.upload_body_limit_bytes,
            )),
        )
        .route("/admin/status", get(store_status))
        .route("/admin/diag", get(diagnostics))
        .route_layer(from_fn_with_state(app_state.clone(), admin_auth));

    public.merge(admin)
}
