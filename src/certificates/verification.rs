use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tera::{Context, Tera};
use tracing::{debug, info};

use super::issuance::{IssuanceError, IssuanceWorkflow};
use crate::config::Config;
use crate::db::{CertificateRecord, Db, StoreError, Student};
use crate::pdf::layout::format_date;
use crate::qr::{self, QrError};
use crate::storage::{DocumentStorage, StorageError};
use crate::templates;

pub const DOCUMENT_MISSING: &str = "Certificate document is not available";

#[derive(Debug, thiserror::Error)]
pub enum VerificationError {
    #[error("{0}")]
    NotFound(String),

    #[error("template error: {0}")]
    Template(#[from] tera::Error),

    #[error("QR code error: {0}")]
    Qr(#[from] QrError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Issuance(#[from] IssuanceError),
}

/// How a download treats a record whose document is missing.
#[derive(Clone, Copy)]
pub enum DownloadPolicy<'a> {
    /// Token holders only ever get what is already stored.
    ReadOnly,
    /// Staff downloads re-render a missing document first.
    RegenerateMissing(&'a IssuanceWorkflow),
}

/// A named file handed to a browser or a mail transport.
#[derive(Debug, Clone)]
pub struct Attachment {
    pub filename: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

#[derive(Clone)]
pub struct VerificationService {
    db: Db,
    storage: DocumentStorage,
    site_base: String,
    verification_path: String,
    institute_name: String,
    tera: Arc<Tera>,
}

impl VerificationService {
    pub fn new(db: Db, config: &Config) -> Result<Self, tera::Error> {
        Ok(Self {
            db,
            storage: DocumentStorage::new(&config.media_root),
            site_base: config.site_base_url.clone(),
            verification_path: config.verification_path.clone(),
            institute_name: config.institute_name.clone(),
            tera: Arc::new(templates::load()?),
        })
    }

    /// Exact match on the verification code.
    pub async fn resolve(&self, token: &str) -> Result<CertificateRecord, VerificationError> {
        if token.is_empty() {
            return Err(not_found());
        }
        self.db
            .find_certificate_by_code(token)
            .await?
            .ok_or_else(not_found)
    }

    pub async fn resolve_number(
        &self,
        number: &str,
    ) -> Result<CertificateRecord, VerificationError> {
        if !super::identifiers::is_well_formed_certificate_number(number) {
            debug!(number, "malformed certificate number");
            return Err(not_found());
        }
        self.db
            .find_certificate_by_number(number)
            .await?
            .ok_or_else(not_found)
    }

    pub fn build_verification_url(&self, record: &CertificateRecord) -> String {
        let base = self.site_base.trim_end_matches('/');
        let path = self.verification_path.trim_matches('/');
        if path.is_empty() {
            format!("{base}/{}", record.verification_code)
        } else {
            format!("{base}/{path}/{}", record.verification_code)
        }
    }

    /// PNG whose payload is exactly the verification URL.
    pub fn qr_png(&self, record: &CertificateRecord) -> Result<Vec<u8>, VerificationError> {
        Ok(qr::qr_png(&self.build_verification_url(record))?)
    }

    /// True only when the stored document is actually on disk.
    pub fn has_document(&self, record: &CertificateRecord) -> bool {
        record
            .document_path
            .as_deref()
            .is_some_and(|path| self.storage.exists(path))
    }

    pub async fn render_preview(
        &self,
        record: &CertificateRecord,
    ) -> Result<String, VerificationError> {
        let student = self.student_of(record).await?;
        let qr = STANDARD.encode(self.qr_png(record)?);

        let mut ctx = self.base_context(record, &student);
        ctx.insert("enrolled_date", &format_date(student.enrolled_date));
        ctx.insert("qr_base64", &qr);
        ctx.insert("verification_url", &self.build_verification_url(record));
        ctx.insert(
            "download_url",
            &format!("/certificates/download/{}", record.verification_code),
        );
        ctx.insert("has_document", &self.has_document(record));

        Ok(self.tera.render(templates::PREVIEW, &ctx)?)
    }

    /// Record page for the legacy by-number link.
    pub async fn render_public(
        &self,
        record: &CertificateRecord,
    ) -> Result<String, VerificationError> {
        let student = self.student_of(record).await?;
        let mut ctx = self.base_context(record, &student);
        ctx.insert("course_duration", &student.course_duration);
        Ok(self.tera.render(templates::VERIFY, &ctx)?)
    }

    pub async fn render_download(
        &self,
        record: &CertificateRecord,
        policy: DownloadPolicy<'_>,
    ) -> Result<Attachment, VerificationError> {
        let stored = match record.document_path.as_deref() {
            Some(path) => self.storage.read(path)?,
            None => None,
        };

        let bytes = match (stored, policy) {
            (Some(bytes), _) => bytes,
            (None, DownloadPolicy::ReadOnly) => {
                return Err(VerificationError::NotFound(DOCUMENT_MISSING.to_string()))
            }
            (None, DownloadPolicy::RegenerateMissing(workflow)) => {
                info!(
                    certificate_number = %record.certificate_number,
                    "document missing, regenerating"
                );
                let updated = workflow.regenerate(record).await?;
                let path = updated
                    .document_path
                    .as_deref()
                    .ok_or_else(|| VerificationError::NotFound(DOCUMENT_MISSING.to_string()))?;
                self.storage
                    .read(path)?
                    .ok_or_else(|| VerificationError::NotFound(DOCUMENT_MISSING.to_string()))?
            }
        };

        Ok(Attachment {
            filename: record.download_filename(),
            content_type: "application/pdf",
            bytes,
        })
    }

    /// The stored document when present, plus a freshly rendered QR code.
    pub fn attachments(
        &self,
        record: &CertificateRecord,
    ) -> Result<Vec<Attachment>, VerificationError> {
        let mut out = Vec::with_capacity(2);
        if let Some(bytes) = record
            .document_path
            .as_deref()
            .map(|path| self.storage.read(path))
            .transpose()?
            .flatten()
        {
            out.push(Attachment {
                filename: record.download_filename(),
                content_type: "application/pdf",
                bytes,
            });
        }
        out.push(Attachment {
            filename: record.qr_filename(),
            content_type: "image/png",
            bytes: self.qr_png(record)?,
        });
        Ok(out)
    }

    fn base_context(&self, record: &CertificateRecord, student: &Student) -> Context {
        let mut ctx = Context::new();
        ctx.insert("certificate_number", &record.certificate_number);
        ctx.insert("issued_date", &format_date(record.issued_date));
        ctx.insert("student_name", &student.full_name);
        ctx.insert("course_name", &student.course_name);
        ctx.insert("institute_name", &self.institute_name);
        ctx
    }

    async fn student_of(&self, record: &CertificateRecord) -> Result<Student, VerificationError> {
        self.db
            .get_student(record.student_id)
            .await?
            .ok_or_else(not_found)
    }
}

fn not_found() -> VerificationError {
    VerificationError::NotFound("Certificate not found".to_string())
}
