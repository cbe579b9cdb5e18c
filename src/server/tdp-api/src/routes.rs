//! API routes.

use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::handlers::{auth, health, stts, users};
use crate::state::AppState;

/// Builds the complete router.
pub fn router(state: AppState) -> Router {
    let cors = cors_layer(state.config.frontend_origin.as_deref());

    Router::new()
        .nest("/v1", v1_router())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

fn v1_router() -> Router<AppState> {
    Router::new()
        .route("/login/oidc", get(auth::login_redirect))
        .route("/logout/oidc", get(auth::logout_redirect))
        .route("/login", get(auth::login_callback))
        .route("/logout", get(auth::logout))
        .route("/users/", get(users::list_users).post(users::create_user))
        .route("/users/set_profile/", post(users::set_profile))
        .route("/users/{id}/", get(users::get_user).patch(users::update_user))
        .route("/stts/all", get(stts::list_regions))
        .route("/health", get(health::health))
}

/// Credentialed CORS for the frontend origin; no origin allows nothing.
fn cors_layer(origin: Option<&str>) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PATCH])
        .allow_headers([CONTENT_TYPE])
        .allow_credentials(true);

    match origin.map(|o| (o, HeaderValue::from_str(o.trim_end_matches('/')))) {
        Some((_, Ok(value))) => layer.allow_origin(value),
        Some((raw, Err(_))) => {
            warn!(origin = %raw, "Ignoring invalid frontend origin");
            layer
        },
        None => layer,
    }
}
