// Certificate PDF generation.
// Layout is computed against the base-14 Helvetica metrics, so no font files
// are needed at runtime.
mod assets;
pub mod layout;
pub mod metrics;
mod render;

pub use assets::AssetLoader;

use chrono::{NaiveDate, Utc};
use tracing::warn;

use crate::config::Config;
use crate::db::Student;
use layout::{CertificateContent, Element, LayoutError, Page, NOT_AVAILABLE};

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("document setup failed: {0}")]
    Setup(String),

    #[error("rasterization failed: {0}")]
    Rasterize(String),

    #[error("render worker failed: {0}")]
    Worker(String),
}

/// Certificate fields that are not part of the student record.
#[derive(Debug, Clone, Copy)]
pub struct CertificateDetails<'a> {
    pub certificate_number: &'a str,
    /// `None` prints today's date.
    pub issued_date: Option<NaiveDate>,
}

/// Turns a student and certificate details into finished document bytes.
pub trait DocumentRenderer: Send + Sync {
    fn render(
        &self,
        student: &Student,
        details: &CertificateDetails<'_>,
    ) -> Result<Vec<u8>, RenderError>;
}

#[derive(Clone, Debug)]
pub struct LayoutEngine {
    assets: AssetLoader,
    institute_name: String,
    signature_lines: [String; 3],
}

impl LayoutEngine {
    pub fn new(config: &Config) -> Self {
        Self {
            assets: AssetLoader::new(&config.assets_dir, &config.media_root),
            institute_name: config.institute_name.clone(),
            signature_lines: config.signature_lines.clone(),
        }
    }

    /// Header, footer and main container are each composed on their own; a
    /// block that fails is logged and left off the page.
    pub fn compose(&self, student: &Student, details: &CertificateDetails<'_>) -> Page {
        let content = self.content(student, details);
        let mut elements = Vec::new();

        elements.extend(guarded("header", layout::header(self.assets.header())));
        elements.extend(guarded(
            "main container",
            layout::main_container(
                &content,
                self.assets.student_photo(student.photo_path.as_deref()),
            ),
        ));
        elements.extend(guarded("footer", layout::footer(self.assets.footer())));

        Page {
            width: layout::PAGE_WIDTH,
            height: layout::PAGE_HEIGHT,
            elements,
        }
    }

    fn content(&self, student: &Student, details: &CertificateDetails<'_>) -> CertificateContent {
        let or_na = |value: &Option<String>| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .unwrap_or(NOT_AVAILABLE)
                .to_string()
        };

        CertificateContent {
            student_name: student.full_name.clone(),
            fathers_name: student.fathers_name.clone(),
            address: student.address.clone(),
            enrolled_date: student.enrolled_date,
            issued_date: details
                .issued_date
                .unwrap_or_else(|| Utc::now().date_naive()),
            certificate_number: details.certificate_number.to_string(),
            course_rows: vec![
                ("Course", student.course_name.clone()),
                ("Duration", student.course_duration.clone()),
                ("Hours/Day", or_na(&student.hours_per_day)),
                ("Mode", student.mode_of_learning.clone()),
                ("Batch", or_na(&student.batch_schedule)),
                ("Instructor", student.instructor_name.clone()),
            ],
            signature_lines: self.signature_lines.clone(),
            institute_name: self.institute_name.clone(),
        }
    }
}

fn guarded(block: &str, result: Result<Vec<Element>, LayoutError>) -> Vec<Element> {
    result.unwrap_or_else(|e| {
        warn!(block, error = %e, "certificate block skipped");
        Vec::new()
    })
}

impl DocumentRenderer for LayoutEngine {
    fn render(
        &self,
        student: &Student,
        details: &CertificateDetails<'_>,
    ) -> Result<Vec<u8>, RenderError> {
        let page = self.compose(student, details);
        let title = format!("Certificate {}", details.certificate_number);
        render::rasterize(&page, &title)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::ApprovalStatus;

    fn jane() -> Student {
        Student {
            id: 1,
            full_name: "Jane Doe".to_string(),
            fathers_name: "John Doe".to_string(),
            address: "12 Elm Street".to_string(),
            course_name: "Web Development".to_string(),
            course_duration: "3 months".to_string(),
            hours_per_day: Some("2".to_string()),
            mode_of_learning: "Online".to_string(),
            batch_schedule: None,
            enrolled_date: NaiveDate::from_ymd_opt(2024, 1, 10).unwrap(),
            instructor_name: "Ada Lovelace".to_string(),
            email_address: "jane@example.com".to_string(),
            photo_path: Some("student_photos/missing.jpg".to_string()),
            approval_status: ApprovalStatus::Accepted,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn engine(dir: &std::path::Path) -> LayoutEngine {
        LayoutEngine::new(&Config::local(dir))
    }

    #[test]
    fn missing_issue_date_defaults_to_today() {
        let dir = tempfile::tempdir().unwrap();
        let details = CertificateDetails {
            certificate_number: "CERT-20240110000000-AAAAAA",
            issued_date: None,
        };
        let page = engine(dir.path()).compose(&jane(), &details);
        let today = layout::format_date(Utc::now().date_naive());
        assert!(page.text().contains(&format!("Date of Issue: {today}")));
    }

    #[test]
    fn absent_batch_prints_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        let details = CertificateDetails {
            certificate_number: "CERT-20240110000000-AAAAAA",
            issued_date: NaiveDate::from_ymd_opt(2024, 2, 1),
        };
        let page = engine(dir.path()).compose(&jane(), &details);
        let text = page.text();
        assert!(text.contains("Batch N/A"), "{text}");
        assert!(text.contains("Hours/Day 2"), "{text}");
    }

    #[test]
    fn missing_photo_still_renders_a_pdf() {
        let dir = tempfile::tempdir().unwrap();
        let details = CertificateDetails {
            certificate_number: "CERT-20240110000000-AAAAAA",
            issued_date: None,
        };
        let bytes = engine(dir.path()).render(&jane(), &details).unwrap();
        assert!(bytes.starts_with(b"%PDF-"));
    }

    #[test]
    fn renders_with_header_footer_and_photo() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::local(dir.path());
        std::fs::create_dir_all(&config.assets_dir).unwrap();
        std::fs::create_dir_all(config.media_root.join("student_photos")).unwrap();
        image::DynamicImage::new_rgb8(400, 60)
            .save(config.assets_dir.join("header.png"))
            .unwrap();
        image::DynamicImage::new_rgb8(400, 40)
            .save(config.assets_dir.join("footer.png"))
            .unwrap();
        image::DynamicImage::new_rgb8(90, 120)
            .save(config.media_root.join("student_photos/jane.png"))
            .unwrap();

        let mut student = jane();
        student.photo_path = Some("student_photos/jane.png".to_string());
        let engine = LayoutEngine::new(&config);
        let details = CertificateDetails {
            certificate_number: "CERT-20240110000000-AAAAAA",
            issued_date: None,
        };

        assert_eq!(engine.compose(&student, &details).image_count(), 3);
        let bytes = engine.render(&student, &details).unwrap();
        assert!(bytes.starts_with(b"%PDF-"));
    }

    #[test]
    fn overflowing_main_container_is_skipped_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let mut student = jane();
        student.address = "very long address ".repeat(2000);
        let details = CertificateDetails {
            certificate_number: "CERT-20240110000000-AAAAAA",
            issued_date: None,
        };
        let engine = engine(dir.path());
        let page = engine.compose(&student, &details);
        assert!(!page.text().contains("Jane Doe"));
        assert!(engine.render(&student, &details).is_ok());
    }
}
