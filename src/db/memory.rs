use chrono::Utc;
use tokio::sync::Mutex;

use super::{
    ApprovalStatus, CertificateListing, CertificateRecord, NewCertificate, NewStudent, StoreError,
    Student, UniqueField,
};

/// In-process store with the same unique constraints as the Postgres schema.
#[derive(Default)]
pub struct MemoryDb {
    inner: Mutex<Tables>,
}

#[derive(Default)]
struct Tables {
    students: Vec<Student>,
    certificates: Vec<CertificateRecord>,
    next_student_id: i64,
    next_certificate_id: i64,
}

impl MemoryDb {
    /// Stands in for the registration subsystem. New students start as `pending`.
    pub async fn insert_student(&self, new: NewStudent) -> Student {
        let mut tables = self.inner.lock().await;
        tables.next_student_id += 1;
        let now = Utc::now();
        let student = Student {
            id: tables.next_student_id,
            full_name: new.full_name,
            fathers_name: new.fathers_name,
            address: new.address,
            course_name: new.course_name,
            course_duration: new.course_duration,
            hours_per_day: new.hours_per_day,
            mode_of_learning: new.mode_of_learning,
            batch_schedule: new.batch_schedule,
            enrolled_date: new.enrolled_date,
            instructor_name: new.instructor_name,
            email_address: new.email_address,
            photo_path: new.photo_path,
            approval_status: ApprovalStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        tables.students.push(student.clone());
        student
    }

    pub(super) async fn get_student(&self, id: i64) -> Option<Student> {
        let tables = self.inner.lock().await;
        tables.students.iter().find(|s| s.id == id).cloned()
    }

    pub(super) async fn set_student_status(
        &self,
        id: i64,
        status: ApprovalStatus,
    ) -> Option<(ApprovalStatus, Student)> {
        let mut tables = self.inner.lock().await;
        let student = tables.students.iter_mut().find(|s| s.id == id)?;
        let previous = student.approval_status;
        student.approval_status = status;
        student.updated_at = Utc::now();
        Some((previous, student.clone()))
    }

    pub(super) async fn find_certificate(
        &self,
        predicate: impl Fn(&CertificateRecord) -> bool,
    ) -> Option<CertificateRecord> {
        let tables = self.inner.lock().await;
        tables.certificates.iter().find(|c| predicate(c)).cloned()
    }

    pub(super) async fn list_certificates(&self) -> Vec<CertificateListing> {
        let tables = self.inner.lock().await;
        let mut rows: Vec<CertificateListing> = tables
            .certificates
            .iter()
            .filter_map(|c| {
                let student = tables.students.iter().find(|s| s.id == c.student_id)?;
                Some(CertificateListing {
                    id: c.id,
                    certificate_number: c.certificate_number.clone(),
                    student_id: c.student_id,
                    student_name: student.full_name.clone(),
                    course_name: student.course_name.clone(),
                    issued_date: c.issued_date,
                    has_document: c.document_path.is_some(),
                })
            })
            .collect();
        rows.sort_by(|a, b| b.issued_date.cmp(&a.issued_date).then(b.id.cmp(&a.id)));
        rows
    }

    pub(super) async fn insert_certificate(
        &self,
        new: &NewCertificate,
    ) -> Result<CertificateRecord, StoreError> {
        let mut tables = self.inner.lock().await;

        if !tables.students.iter().any(|s| s.id == new.student_id) {
            return Err(StoreError::Query(format!(
                "student {} does not exist",
                new.student_id
            )));
        }
        for existing in &tables.certificates {
            if existing.student_id == new.student_id {
                return Err(StoreError::Conflict(UniqueField::StudentId));
            }
            if existing.certificate_number == new.certificate_number {
                return Err(StoreError::Conflict(UniqueField::CertificateNumber));
            }
            if existing.verification_code == new.verification_code {
                return Err(StoreError::Conflict(UniqueField::VerificationCode));
            }
        }

        tables.next_certificate_id += 1;
        let now = Utc::now();
        let record = CertificateRecord {
            id: tables.next_certificate_id,
            student_id: new.student_id,
            certificate_number: new.certificate_number.clone(),
            verification_code: new.verification_code.clone(),
            issued_date: new.issued_date,
            document_path: new.document_path.clone(),
            created_at: now,
            updated_at: now,
        };
        tables.certificates.push(record.clone());
        Ok(record)
    }

    pub(super) async fn set_document_path(
        &self,
        id: i64,
        document_path: Option<&str>,
    ) -> Result<CertificateRecord, StoreError> {
        let mut tables = self.inner.lock().await;
        let record = tables
            .certificates
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("certificate {id}")))?;
        record.document_path = document_path.map(str::to_string);
        record.updated_at = Utc::now();
        Ok(record.clone())
    }
}
