pub mod error;
pub mod handlers;
pub mod middleware;
pub mod state;

pub use state::ApiState;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};

use crate::infra::http::RouterState;

/// JSON API: content reads, revalidation entry points and the contact form.
pub fn build_api_router(state: RouterState) -> Router<RouterState> {
    let revalidate = Router::new()
        .route("/api/revalidate/{endpoint}", post(handlers::revalidate))
        .route_layer(axum_middleware::from_fn_with_state(
            state.api.clone(),
            middleware::require_api_key,
        ));

    let cron = Router::new()
        .route(
            "/api/cron/revalidate",
            get(handlers::cron_get).post(handlers::cron_post),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            state.api.clone(),
            middleware::require_cron_secret,
        ));

    Router::new()
        .route("/api/content/{domain}", get(handlers::list_content))
        .route("/api/content/{domain}/{key}", get(handlers::get_content))
        .route(
            "/api/webhooks/pocketbase",
            get(handlers::webhook_health).post(handlers::webhook_receive),
        )
        .route("/api/contact", post(handlers::submit_contact))
        .merge(revalidate)
        .merge(cron)
}
