mod api;
mod pages;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::state::AppState;

pub fn build_router(state: Arc<AppState>) -> Router {
    let staff = Router::new()
        .route("/admin/certificates", get(api::staff_list))
        .route("/admin/certificates/:id", get(api::staff_detail))
        .route("/admin/certificates/:id/download", get(api::staff_download))
        .route("/admin/certificates/:id/regenerate", post(api::staff_regenerate))
        .route("/admin/certificates/:id/bundle", get(api::staff_bundle))
        .route("/admin/students/:id/status", post(api::staff_set_status))
        .route_layer(middleware::from_fn_with_state(state.clone(), api::require_staff));

    Router::new()
        .route("/health", get(api::health))
        .route("/certificates/preview/:verification_code", get(pages::preview))
        .route("/certificates/download/:verification_code", get(api::public_download))
        .route("/certificates/verify/:certificate_number", get(pages::verify))
        .merge(staff)
        .with_state(state)
}
