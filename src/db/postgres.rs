use sqlx::PgPool;

use super::{
    ApprovalStatus, CertificateListing, CertificateRecord, NewCertificate, StoreError, Student,
    UniqueField,
};

/// Maps the constraint names declared in `migrations/` to the column they guard.
pub(super) fn constraint_field(name: &str) -> Option<UniqueField> {
    match name {
        "certificates_student_id_key" => Some(UniqueField::StudentId),
        "certificates_certificate_number_key" => Some(UniqueField::CertificateNumber),
        "certificates_verification_code_key" => Some(UniqueField::VerificationCode),
        _ => None,
    }
}

pub(super) async fn get_student(pool: &PgPool, id: i64) -> Result<Option<Student>, StoreError> {
    let student = sqlx::query_as::<_, Student>("SELECT * FROM students WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(student)
}

pub(super) async fn set_student_status(
    pool: &PgPool,
    id: i64,
    status: ApprovalStatus,
) -> Result<Option<(ApprovalStatus, Student)>, StoreError> {
    let mut tx = pool.begin().await?;

    let previous: Option<(String,)> =
        sqlx::query_as("SELECT approval_status FROM students WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
    let Some((previous,)) = previous else {
        return Ok(None);
    };
    let previous: ApprovalStatus = previous
        .parse()
        .map_err(|e: super::UnknownStatus| StoreError::Query(e.to_string()))?;

    let student = sqlx::query_as::<_, Student>(
        r#"
        UPDATE students
        SET approval_status = $2, updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(status.as_str())
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(Some((previous, student)))
}

pub(super) async fn find_certificate(
    pool: &PgPool,
    id: i64,
) -> Result<Option<CertificateRecord>, StoreError> {
    let record = sqlx::query_as::<_, CertificateRecord>("SELECT * FROM certificates WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(record)
}

pub(super) async fn find_certificate_by_student(
    pool: &PgPool,
    student_id: i64,
) -> Result<Option<CertificateRecord>, StoreError> {
    let record =
        sqlx::query_as::<_, CertificateRecord>("SELECT * FROM certificates WHERE student_id = $1")
            .bind(student_id)
            .fetch_optional(pool)
            .await?;
    Ok(record)
}

pub(super) async fn find_certificate_by_code(
    pool: &PgPool,
    verification_code: &str,
) -> Result<Option<CertificateRecord>, StoreError> {
    let record = sqlx::query_as::<_, CertificateRecord>(
        "SELECT * FROM certificates WHERE verification_code = $1",
    )
    .bind(verification_code)
    .fetch_optional(pool)
    .await?;
    Ok(record)
}

pub(super) async fn find_certificate_by_number(
    pool: &PgPool,
    certificate_number: &str,
) -> Result<Option<CertificateRecord>, StoreError> {
    let record = sqlx::query_as::<_, CertificateRecord>(
        "SELECT * FROM certificates WHERE certificate_number = $1",
    )
    .bind(certificate_number)
    .fetch_optional(pool)
    .await?;
    Ok(record)
}

pub(super) async fn list_certificates(
    pool: &PgPool,
) -> Result<Vec<CertificateListing>, StoreError> {
    let rows = sqlx::query_as::<_, CertificateListing>(
        r#"
        SELECT c.id, c.certificate_number, c.student_id,
               s.full_name AS student_name, s.course_name,
               c.issued_date, (c.document_path IS NOT NULL) AS has_document
        FROM certificates c
        JOIN students s ON s.id = c.student_id
        ORDER BY c.issued_date DESC, c.id DESC
        "#,
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub(super) async fn insert_certificate(
    pool: &PgPool,
    new: &NewCertificate,
) -> Result<CertificateRecord, StoreError> {
    let record = sqlx::query_as::<_, CertificateRecord>(
        r#"
        INSERT INTO certificates
            (student_id, certificate_number, verification_code, issued_date, document_path)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(new.student_id)
    .bind(&new.certificate_number)
    .bind(&new.verification_code)
    .bind(new.issued_date)
    .bind(&new.document_path)
    .fetch_one(pool)
    .await?;
    Ok(record)
}

pub(super) async fn set_document_path(
    pool: &PgPool,
    id: i64,
    document_path: Option<&str>,
) -> Result<CertificateRecord, StoreError> {
    sqlx::query_as::<_, CertificateRecord>(
        r#"
        UPDATE certificates
        SET document_path = $2, updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(document_path)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| StoreError::NotFound(format!("certificate {id}")))
}
