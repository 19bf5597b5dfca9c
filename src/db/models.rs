use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalStatus {
    Pending,
    Accepted,
    Rejected,
}

impl ApprovalStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
        }
    }

    pub fn display(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Accepted => "Accepted",
            Self::Rejected => "Rejected",
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown approval status: {0}")]
pub struct UnknownStatus(pub String);

impl TryFrom<String> for ApprovalStatus {
    type Error = UnknownStatus;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl std::str::FromStr for ApprovalStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "accepted" => Ok(Self::Accepted),
            "rejected" => Ok(Self::Rejected),
            _ => Err(UnknownStatus(s.to_string())),
        }
    }
}

/// Owned by the registration subsystem; read-only here.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Student {
    pub id: i64,
    pub full_name: String,
    pub fathers_name: String,
    pub address: String,
    pub course_name: String,
    pub course_duration: String,
    pub hours_per_day: Option<String>,
    pub mode_of_learning: String,
    pub batch_schedule: Option<String>,
    pub enrolled_date: NaiveDate,
    pub instructor_name: String,
    pub email_address: String,
    /// Relative to the media root.
    pub photo_path: Option<String>,
    #[sqlx(try_from = "String")]
    pub approval_status: ApprovalStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Student {
    /// `STU000042`
    pub fn reference_id(&self) -> String {
        format!("STU{:06}", self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct CertificateRecord {
    pub id: i64,
    pub student_id: i64,
    pub certificate_number: String,
    pub verification_code: String,
    pub issued_date: NaiveDate,
    /// Relative to the media root. `None` means the document is pending regeneration.
    pub document_path: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CertificateRecord {
    pub fn download_filename(&self) -> String {
        format!("certificate_{}.pdf", self.certificate_number)
    }

    pub fn qr_filename(&self) -> String {
        format!("certificate_qr_{}.png", self.certificate_number)
    }
}

/// Everything needed to insert a certificate row.
#[derive(Debug, Clone)]
pub struct NewCertificate {
    pub student_id: i64,
    pub certificate_number: String,
    pub verification_code: String,
    pub issued_date: NaiveDate,
    pub document_path: Option<String>,
}

/// Row shape for the staff listing.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct CertificateListing {
    pub id: i64,
    pub certificate_number: String,
    pub student_id: i64,
    pub student_name: String,
    pub course_name: String,
    pub issued_date: NaiveDate,
    pub has_document: bool,
}

/// Registration payload used to seed students in the in-process store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewStudent {
    pub full_name: String,
    pub fathers_name: String,
    pub address: String,
    pub course_name: String,
    pub course_duration: String,
    pub hours_per_day: Option<String>,
    pub mode_of_learning: String,
    pub batch_schedule: Option<String>,
    pub enrolled_date: NaiveDate,
    pub instructor_name: String,
    pub email_address: String,
    pub photo_path: Option<String>,
}
