pub mod error;
pub mod handlers;
pub mod models;
pub mod state;

pub use state::ApiState;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};

use crate::infra::http::middleware::{expose_error_details, log_responses, set_request_context};

/// Full HTTP surface. `expose_details` adds the error chain to client bodies.
pub fn build_api_router(state: ApiState, expose_details: bool) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/provinces", get(handlers::list_provinces))
        .route("/districts", get(handlers::list_districts))
        .route(
            "/districts/{province_code}",
            get(handlers::list_province_districts),
        )
        .route(
            "/communes",
            get(handlers::list_communes).post(handlers::create_commune),
        )
        .route("/communes/history", get(handlers::list_recent_history))
        .route("/communes/history/{code}", get(handlers::list_code_history))
        .route("/communes/deleted/list", get(handlers::list_deleted_units))
        .route(
            "/communes/{code}",
            get(handlers::list_communes_of)
                .put(handlers::put_commune)
                .post(handlers::update_commune)
                .delete(handlers::delete_commune),
        )
        .route(
            "/communes/{code}/restore",
            post(handlers::restore_commune),
        )
        .route("/convert", post(handlers::convert_address))
        .route(
            "/units",
            get(handlers::list_units).post(handlers::create_unit),
        )
        .route(
            "/units/tree",
            get(handlers::unit_tree).post(handlers::arrange_units),
        )
        .route(
            "/units/{id}",
            get(handlers::get_unit)
                .put(handlers::update_unit)
                .patch(handlers::update_unit)
                .delete(handlers::delete_unit),
        )
        .route("/units/{id}/history", get(handlers::unit_history))
        .route("/units/{id}/restore", post(handlers::restore_unit))
        .route("/units/{id}/diff", get(handlers::unit_diff))
        .route("/bridge/code", post(handlers::map_code))
        .route("/fallback/reload", post(handlers::reload_fallback))
        .with_state(state)
        .layer(axum_middleware::from_fn_with_state(
            expose_details,
            expose_error_details,
        ))
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(set_request_context))
}
