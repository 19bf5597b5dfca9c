use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use std::sync::Arc;

use crate::certificates::VerificationError;
use crate::state::AppState;

pub async fn preview(
    State(state): State<Arc<AppState>>,
    Path(verification_code): Path<String>,
) -> Response {
    let record = match state.verification.resolve(&verification_code).await {
        Ok(record) => record,
        Err(e) => return public_error(e),
    };
    match state.verification.render_preview(&record).await {
        Ok(html) => Html(html).into_response(),
        Err(e) => public_error(e),
    }
}

pub async fn verify(
    State(state): State<Arc<AppState>>,
    Path(certificate_number): Path<String>,
) -> Response {
    let record = match state.verification.resolve_number(&certificate_number).await {
        Ok(record) => record,
        Err(e) => return public_error(e),
    };
    match state.verification.render_public(&record).await {
        Ok(html) => Html(html).into_response(),
        Err(e) => public_error(e),
    }
}

/// Lookup failures become a plain 404 that says nothing about why; anything
/// else is logged and hidden behind a 500.
pub(super) fn public_error(e: VerificationError) -> Response {
    match e {
        VerificationError::NotFound(message) => (StatusCode::NOT_FOUND, message).into_response(),
        other => {
            tracing::error!(error = %other, "public certificate request failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
        }
    }
}
