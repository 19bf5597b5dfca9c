use axum::{
    extract::{Path, Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tokio::sync::OwnedMutexGuard;

use super::pages::public_error;
use crate::certificates::{Attachment, DownloadPolicy, IssuanceError, VerificationError};
use crate::db::{ApprovalStatus, CertificateRecord};
use crate::events::{change_status, DispatchOutcome, StatusChanged};
use crate::state::AppState;

pub async fn health() -> &'static str {
    "ok"
}

pub async fn public_download(
    State(state): State<Arc<AppState>>,
    Path(verification_code): Path<String>,
) -> Response {
    let record = match state.verification.resolve(&verification_code).await {
        Ok(record) => record,
        Err(e) => return public_error(e),
    };
    match state
        .verification
        .render_download(&record, DownloadPolicy::ReadOnly)
        .await
    {
        Ok(doc) => file_response(doc),
        Err(e) => public_error(e),
    }
}

/// Staff routes require `Authorization: Bearer <STAFF_API_TOKEN>`. Without a
/// configured token every staff request is refused.
pub async fn require_staff(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Response {
    let presented = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim);

    match (state.config.staff_api_token.as_deref(), presented) {
        (Some(expected), Some(given)) if tokens_match(expected, given) => next.run(req).await,
        _ => {
            tracing::warn!(path = %req.uri().path(), "rejected staff request");
            api_error(StatusCode::UNAUTHORIZED, "Unauthorized")
        }
    }
}

fn tokens_match(expected: &str, given: &str) -> bool {
    expected.as_bytes().ct_eq(given.as_bytes()).into()
}

#[derive(Serialize)]
pub struct CertificateView {
    pub id: i64,
    pub student_id: i64,
    pub student_name: Option<String>,
    pub certificate_number: String,
    pub verification_code: String,
    pub verification_url: String,
    pub issued_date: NaiveDate,
    pub has_document: bool,
    pub download_filename: String,
}

async fn view(state: &AppState, record: &CertificateRecord) -> CertificateView {
    let student_name = match state.db.get_student(record.student_id).await {
        Ok(student) => student.map(|s| s.full_name),
        Err(e) => {
            tracing::warn!(student_id = record.student_id, error = %e, "student lookup failed");
            None
        }
    };
    CertificateView {
        id: record.id,
        student_id: record.student_id,
        student_name,
        certificate_number: record.certificate_number.clone(),
        verification_code: record.verification_code.clone(),
        verification_url: state.verification.build_verification_url(record),
        issued_date: record.issued_date,
        has_document: state.verification.has_document(record),
        download_filename: record.download_filename(),
    }
}

pub async fn staff_list(State(state): State<Arc<AppState>>) -> Response {
    match state.db.list_certificates().await {
        Ok(rows) => Json(rows).into_response(),
        Err(e) => internal("list certificates", &e),
    }
}

pub async fn staff_detail(State(state): State<Arc<AppState>>, Path(id): Path<i64>) -> Response {
    match load(&state, id).await {
        Ok(record) => Json(view(&state, &record).await).into_response(),
        Err(resp) => resp,
    }
}

pub async fn staff_download(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Response {
    let (record, _guard) = match load_locked(&state, id).await {
        Ok(loaded) => loaded,
        Err(resp) => return resp,
    };
    match state
        .verification
        .render_download(&record, DownloadPolicy::RegenerateMissing(&state.issuance))
        .await
    {
        Ok(doc) => file_response(doc),
        Err(e) => staff_error(e),
    }
}

pub async fn staff_regenerate(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Response {
    let (record, _guard) = match load_locked(&state, id).await {
        Ok(loaded) => loaded,
        Err(resp) => return resp,
    };
    match state.issuance.regenerate(&record).await {
        Ok(updated) => Json(view(&state, &updated).await).into_response(),
        Err(e) => staff_error(e.into()),
    }
}

/// Zip of the certificate PDF and its QR code.
pub async fn staff_bundle(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Response {
    let (record, _guard) = match load_locked(&state, id).await {
        Ok(loaded) => loaded,
        Err(resp) => return resp,
    };
    let pdf = match state
        .verification
        .render_download(&record, DownloadPolicy::RegenerateMissing(&state.issuance))
        .await
    {
        Ok(pdf) => pdf,
        Err(e) => return staff_error(e),
    };
    let qr = match state.verification.qr_png(&record) {
        Ok(bytes) => Attachment {
            filename: record.qr_filename(),
            content_type: "image/png",
            bytes,
        },
        Err(e) => return staff_error(e),
    };

    match zip_files(&[pdf, qr]) {
        Ok(bytes) => file_response(Attachment {
            filename: format!("certificate_{}.zip", record.certificate_number),
            content_type: "application/zip",
            bytes,
        }),
        Err(e) => internal("build certificate bundle", &e),
    }
}

fn zip_files(files: &[Attachment]) -> Result<Vec<u8>, zip::result::ZipError> {
    let mut zip = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default().unix_permissions(0o644);
    for file in files {
        zip.start_file(file.filename.as_str(), options)?;
        zip.write_all(&file.bytes)?;
    }
    Ok(zip.finish()?.into_inner())
}

#[derive(Deserialize)]
pub struct StatusUpdate {
    status: String,
}

#[derive(Serialize)]
struct StatusResponse {
    event: StatusChanged,
    outcome: DispatchOutcome,
}

pub async fn staff_set_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(body): Json<StatusUpdate>,
) -> Response {
    let status: ApprovalStatus = match body.status.parse() {
        Ok(status) => status,
        Err(e) => return api_error(StatusCode::UNPROCESSABLE_ENTITY, &e.to_string()),
    };

    let event = match change_status(&state.db, id, status).await {
        Ok(Some(event)) => event,
        Ok(None) => return api_error(StatusCode::NOT_FOUND, "Student not found"),
        Err(e) => return internal("change student status", &e),
    };

    match state.handlers.dispatch(&event).await {
        Ok(outcome) => Json(StatusResponse { event, outcome }).into_response(),
        Err(e) => {
            tracing::error!(event_id = %event.event_id, error = %e, "certificate issuance failed");
            api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Status updated, but the certificate could not be issued",
            )
        }
    }
}

/// Takes the record's regeneration lock only once the record is known to
/// exist, then reloads it so a regeneration that finished while waiting is seen.
async fn load_locked(
    state: &AppState,
    id: i64,
) -> Result<(CertificateRecord, OwnedMutexGuard<()>), Response> {
    load(state, id).await?;
    let guard = state.regeneration_locks.lock_for(id).lock_owned().await;
    let record = load(state, id).await?;
    Ok((record, guard))
}

async fn load(state: &AppState, id: i64) -> Result<CertificateRecord, Response> {
    match state.db.find_certificate(id).await {
        Ok(Some(record)) => Ok(record),
        Ok(None) => Err(api_error(StatusCode::NOT_FOUND, "Certificate not found")),
        Err(e) => Err(internal("load certificate", &e)),
    }
}

fn file_response(file: Attachment) -> Response {
    (
        [
            (header::CONTENT_TYPE, file.content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file.filename),
            ),
        ],
        file.bytes,
    )
        .into_response()
}

fn api_error(status: StatusCode, message: &str) -> Response {
    (status, Json(serde_json::json!({ "error": message }))).into_response()
}

fn internal(action: &str, e: &dyn std::fmt::Display) -> Response {
    tracing::error!(action, error = %e, "staff request failed");
    api_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
}

fn staff_error(e: VerificationError) -> Response {
    match e {
        VerificationError::NotFound(message) => api_error(StatusCode::NOT_FOUND, &message),
        VerificationError::Issuance(IssuanceError::StudentNotFound(_)) => {
            api_error(StatusCode::NOT_FOUND, "Student not found")
        }
        other => internal("serve certificate", &other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_comparison_requires_exact_match() {
        assert!(tokens_match("s3cret", "s3cret"));
        assert!(!tokens_match("s3cret", "s3cre"));
        assert!(!tokens_match("s3cret", "S3cret"));
    }
}
