mod memory;
mod models;
mod postgres;

pub use memory::MemoryDb;
pub use models::*;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{info, warn};

pub type DbPool = Arc<PgPool>;

/// Columns carrying a unique constraint on `certificates`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniqueField {
    StudentId,
    CertificateNumber,
    VerificationCode,
}

impl std::fmt::Display for UniqueField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::StudentId => "student_id",
            Self::CertificateNumber => "certificate_number",
            Self::VerificationCode => "verification_code",
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unique constraint violated on {0}")]
    Conflict(UniqueField),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &e {
            if db_err.is_unique_violation() {
                if let Some(field) = db_err.constraint().and_then(postgres::constraint_field) {
                    return Self::Conflict(field);
                }
            }
        }
        Self::Query(e.to_string())
    }
}

pub async fn create_pool(database_url: &str) -> Result<DbPool, StoreError> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await
        .map_err(|e| StoreError::Connection(e.to_string()))?;

    Ok(Arc::new(pool))
}

pub async fn run_migrations(pool: &PgPool) -> Result<(), StoreError> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| StoreError::Migration(e.to_string()))
}

/// Handle to whichever backend holds students and certificate records.
#[derive(Clone)]
pub enum Db {
    Postgres(DbPool),
    Memory(Arc<MemoryDb>),
}

impl Db {
    /// Connects and migrates when a URL is given, otherwise starts the in-process store.
    pub async fn open(database_url: Option<&str>) -> Result<Self, StoreError> {
        match database_url {
            Some(url) => {
                let pool = create_pool(url).await?;
                run_migrations(pool.as_ref()).await?;
                info!("Postgres store ready, migrations applied");
                Ok(Self::Postgres(pool))
            }
            None => {
                warn!("DATABASE_URL not set; using the in-process store (data is not persisted)");
                Ok(Self::memory())
            }
        }
    }

    pub fn memory() -> Self {
        Self::Memory(Arc::new(MemoryDb::default()))
    }

    pub async fn get_student(&self, id: i64) -> Result<Option<Student>, StoreError> {
        match self {
            Self::Postgres(pool) => postgres::get_student(pool, id).await,
            Self::Memory(mem) => Ok(mem.get_student(id).await),
        }
    }

    /// Returns the previous status and the updated student, or `None` if the student is unknown.
    pub async fn set_student_status(
        &self,
        id: i64,
        status: ApprovalStatus,
    ) -> Result<Option<(ApprovalStatus, Student)>, StoreError> {
        match self {
            Self::Postgres(pool) => postgres::set_student_status(pool, id, status).await,
            Self::Memory(mem) => Ok(mem.set_student_status(id, status).await),
        }
    }

    pub async fn find_certificate(&self, id: i64) -> Result<Option<CertificateRecord>, StoreError> {
        match self {
            Self::Postgres(pool) => postgres::find_certificate(pool, id).await,
            Self::Memory(mem) => Ok(mem.find_certificate(|c| c.id == id).await),
        }
    }

    pub async fn find_certificate_by_student(
        &self,
        student_id: i64,
    ) -> Result<Option<CertificateRecord>, StoreError> {
        match self {
            Self::Postgres(pool) => postgres::find_certificate_by_student(pool, student_id).await,
            Self::Memory(mem) => Ok(mem.find_certificate(|c| c.student_id == student_id).await),
        }
    }

    /// Exact match only.
    pub async fn find_certificate_by_code(
        &self,
        verification_code: &str,
    ) -> Result<Option<CertificateRecord>, StoreError> {
        match self {
            Self::Postgres(pool) => {
                postgres::find_certificate_by_code(pool, verification_code).await
            }
            Self::Memory(mem) => Ok(mem
                .find_certificate(|c| c.verification_code == verification_code)
                .await),
        }
    }

    pub async fn find_certificate_by_number(
        &self,
        certificate_number: &str,
    ) -> Result<Option<CertificateRecord>, StoreError> {
        match self {
            Self::Postgres(pool) => {
                postgres::find_certificate_by_number(pool, certificate_number).await
            }
            Self::Memory(mem) => Ok(mem
                .find_certificate(|c| c.certificate_number == certificate_number)
                .await),
        }
    }

    pub async fn list_certificates(&self) -> Result<Vec<CertificateListing>, StoreError> {
        match self {
            Self::Postgres(pool) => postgres::list_certificates(pool).await,
            Self::Memory(mem) => Ok(mem.list_certificates().await),
        }
    }

    pub async fn insert_certificate(
        &self,
        new: &NewCertificate,
    ) -> Result<CertificateRecord, StoreError> {
        match self {
            Self::Postgres(pool) => postgres::insert_certificate(pool, new).await,
            Self::Memory(mem) => mem.insert_certificate(new).await,
        }
    }

    pub async fn set_document_path(
        &self,
        id: i64,
        document_path: Option<&str>,
    ) -> Result<CertificateRecord, StoreError> {
        match self {
            Self::Postgres(pool) => postgres::set_document_path(pool, id, document_path).await,
            Self::Memory(mem) => mem.set_document_path(id, document_path).await,
        }
    }
}
