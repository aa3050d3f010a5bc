use axum::{
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method, StatusCode,
    },
    middleware,
    routing::{delete, get, post, put},
    Json, Router,
};
use serde_json::{json, Value};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::middleware::{make_span_with_request_id, request_id_middleware};

pub mod extract;
pub mod feed;
pub mod notifications;
pub mod parent;
pub mod state;
pub mod tags;
pub mod users;

pub use state::AppState;

/// Creates the application router with all routes
pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(state.cors_allowed_origin.as_deref());

    Router::new()
        .route("/health", get(health_check))
        .route("/users", post(users::register))
        .route("/content", post(feed::publish))
        .nest("/feeds", feed_routes())
        .nest("/notifications", notification_routes())
        .layer(
            ServiceBuilder::new()
                .layer(cors)
                .layer(middleware::from_fn(request_id_middleware))
                .layer(TraceLayer::new_for_http().make_span_with(make_span_with_request_id)),
        )
        .with_state(state)
}

/// Feed, tag and parental-control routes under /feeds
fn feed_routes() -> Router<AppState> {
    Router::new()
        .route("/feed", get(feed::get_feed))
        .route("/tags/interaction", post(tags::record_interaction))
        .route(
            "/tags/:kind",
            get(tags::get_tags).post(tags::add_tag).delete(tags::remove_tag),
        )
        .route("/parent/children", get(parent::children))
        .route("/parent/child/:child_id/tags", get(parent::child_tags))
        .route(
            "/parent/child/:child_id/excluded-tags",
            post(parent::update_excluded_tags),
        )
        .route("/parent/unlink-child/:child_id", delete(parent::unlink_child))
        .route("/links/:other_id", delete(parent::unlink))
}

/// Notification and parent request routes under /notifications
fn notification_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(notifications::list))
        .route("/count", get(notifications::unread_count))
        .route("/read-all", put(notifications::mark_all_read))
        .route(
            "/username-suggestions",
            get(notifications::username_suggestions),
        )
        .route("/parent-request", post(notifications::send_parent_request))
        .route("/parent-request/:id/respond", post(notifications::respond))
        .route("/:id/read", put(notifications::mark_read))
        .route("/:id", delete(notifications::delete))
}

/// Permissive unless an explicit origin is configured, in which case
/// credentialed requests (the access token cookie) are allowed from it alone
fn cors_layer(origin: Option<&str>) -> CorsLayer {
    let Some(origin) = origin else {
        return CorsLayer::permissive();
    };

    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE]);

    match origin.parse::<HeaderValue>() {
        Ok(value) => base.allow_origin(value).allow_credentials(true),
        Err(_) => {
            tracing::warn!(origin, "Ignoring unparsable CORS origin; cross-origin requests are refused");
            base
        }
    }
}

/// Health check endpoint
async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}
