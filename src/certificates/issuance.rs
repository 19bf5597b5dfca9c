use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use tracing::{error, info, warn};

use super::identifiers::{generate_certificate_number, generate_verification_code};
use crate::db::{
    ApprovalStatus, CertificateRecord, Db, NewCertificate, StoreError, Student, UniqueField,
};
use crate::events::StatusChanged;
use crate::pdf::{CertificateDetails, DocumentRenderer, RenderError};
use crate::storage::{DocumentStorage, StorageError};

/// Fresh identifier pairs tried before giving up on a colliding insert.
const MAX_IDENTIFIER_ATTEMPTS: usize = 5;

/// Produces a `(certificate_number, verification_code)` pair per attempt.
pub type IdentifierSource = Arc<dyn Fn() -> (String, String) + Send + Sync>;

fn random_identifiers() -> (String, String) {
    (generate_certificate_number(), generate_verification_code())
}

#[derive(Debug, thiserror::Error)]
pub enum IssuanceError {
    #[error("student {0} not found")]
    StudentNotFound(i64),

    #[error("student {0} is not accepted")]
    NotAccepted(i64),

    #[error("certificate rendering failed: {0}")]
    Render(#[from] RenderError),

    #[error("certificate storage failed: {0}")]
    Storage(#[from] StorageError),

    #[error("certificate store failed: {0}")]
    Store(#[from] StoreError),

    #[error("no unique certificate identifiers after {0} attempts")]
    IdentifiersExhausted(usize),
}

/// Creates certificates for accepted students and re-renders existing ones.
///
/// A record is only inserted once its document has been rendered and written,
/// so a failed render leaves nothing behind. The unique constraints on the
/// certificate table decide races between concurrent issuers.
#[derive(Clone)]
pub struct IssuanceWorkflow {
    db: Db,
    storage: DocumentStorage,
    renderer: Arc<dyn DocumentRenderer>,
    identifiers: IdentifierSource,
}

impl IssuanceWorkflow {
    pub fn new(db: Db, storage: DocumentStorage, renderer: Arc<dyn DocumentRenderer>) -> Self {
        Self {
            db,
            storage,
            renderer,
            identifiers: Arc::new(random_identifiers),
        }
    }

    /// Replaces the random identifier generator.
    pub fn with_identifiers(mut self, identifiers: IdentifierSource) -> Self {
        self.identifiers = identifiers;
        self
    }

    /// Returns the student's certificate, issuing one if none exists yet.
    pub async fn on_student_accepted(
        &self,
        student: &Student,
    ) -> Result<CertificateRecord, IssuanceError> {
        if student.approval_status != ApprovalStatus::Accepted {
            return Err(IssuanceError::NotAccepted(student.id));
        }
        if let Some(existing) = self.db.find_certificate_by_student(student.id).await? {
            return Ok(existing);
        }

        for attempt in 1..=MAX_IDENTIFIER_ATTEMPTS {
            let (certificate_number, verification_code) = (self.identifiers)();
            let new = NewCertificate {
                student_id: student.id,
                certificate_number,
                verification_code,
                issued_date: Utc::now().date_naive(),
                document_path: None,
            };

            let bytes = self
                .render(student, &new.certificate_number, new.issued_date)
                .await
                .inspect_err(|e| {
                    error!(
                        student_id = student.id,
                        error = %e,
                        "certificate render failed, nothing persisted"
                    );
                })?;

            let path = DocumentStorage::certificate_path(student.id, &new.certificate_number);
            self.storage.write_atomic(&path, &bytes)?;
            let new = NewCertificate {
                document_path: Some(path.clone()),
                ..new
            };

            match self.db.insert_certificate(&new).await {
                Ok(record) => {
                    info!(
                        student_id = student.id,
                        certificate_number = %record.certificate_number,
                        "certificate issued"
                    );
                    return Ok(record);
                }
                Err(StoreError::Conflict(UniqueField::StudentId)) => {
                    self.discard(&path);
                    info!(
                        student_id = student.id,
                        "certificate issued concurrently, keeping the existing one"
                    );
                    return self
                        .db
                        .find_certificate_by_student(student.id)
                        .await?
                        .ok_or_else(|| {
                            IssuanceError::Store(StoreError::NotFound(format!(
                                "certificate for student {}",
                                student.id
                            )))
                        });
                }
                Err(StoreError::Conflict(field)) => {
                    self.discard(&path);
                    warn!(
                        student_id = student.id,
                        %field,
                        attempt,
                        "identifier collision, retrying"
                    );
                }
                Err(e) => {
                    self.discard(&path);
                    return Err(e.into());
                }
            }
        }

        Err(IssuanceError::IdentifiersExhausted(MAX_IDENTIFIER_ATTEMPTS))
    }

    /// Re-renders the document for an existing record. Number, code and issue
    /// date never change; the file is replaced atomically, so a failed write
    /// keeps the previous document.
    pub async fn regenerate(
        &self,
        record: &CertificateRecord,
    ) -> Result<CertificateRecord, IssuanceError> {
        let student = self
            .db
            .get_student(record.student_id)
            .await?
            .ok_or(IssuanceError::StudentNotFound(record.student_id))?;

        let bytes = self
            .render(&student, &record.certificate_number, record.issued_date)
            .await?;
        let path = DocumentStorage::certificate_path(student.id, &record.certificate_number);
        self.storage.write_atomic(&path, &bytes)?;

        if let Some(previous) = record.document_path.as_deref().filter(|p| *p != path) {
            self.discard(previous);
        }

        let updated = self.db.set_document_path(record.id, Some(&path)).await?;
        info!(certificate_number = %updated.certificate_number, "certificate regenerated");
        Ok(updated)
    }

    /// Issuance handler for status events. Anything other than `accepted` is
    /// ignored; an existing certificate survives later status changes.
    pub async fn handle(
        &self,
        event: &StatusChanged,
    ) -> Result<Option<CertificateRecord>, IssuanceError> {
        if event.new != ApprovalStatus::Accepted {
            return Ok(None);
        }
        let student = self
            .db
            .get_student(event.student_id)
            .await?
            .ok_or(IssuanceError::StudentNotFound(event.student_id))?;
        self.on_student_accepted(&student).await.map(Some)
    }

    async fn render(
        &self,
        student: &Student,
        certificate_number: &str,
        issued_date: NaiveDate,
    ) -> Result<Vec<u8>, RenderError> {
        let renderer = Arc::clone(&self.renderer);
        let student = student.clone();
        let certificate_number = certificate_number.to_string();

        tokio::task::spawn_blocking(move || {
            let details = CertificateDetails {
                certificate_number: &certificate_number,
                issued_date: Some(issued_date),
            };
            renderer.render(&student, &details)
        })
        .await
        .map_err(|e| RenderError::Worker(e.to_string()))?
    }

    fn discard(&self, path: &str) {
        if let Err(e) = self.storage.remove(path) {
            warn!(path, error = %e, "could not remove certificate document");
        }
    }
}
