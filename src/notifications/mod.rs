use std::sync::{Arc, Mutex};

use tracing::info;

use crate::certificates::{Attachment, VerificationError, VerificationService};
use crate::db::{ApprovalStatus, CertificateRecord, Student};
use crate::events::StatusChanged;

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("could not prepare attachments: {0}")]
    Attachments(#[from] VerificationError),

    #[error("transport failed: {0}")]
    Transport(String),
}

#[derive(Debug, Clone)]
pub struct OutgoingMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
    pub attachments: Vec<Attachment>,
}

/// Hands finished messages to whatever delivers them.
pub trait Outbox: Send + Sync {
    fn send(&self, message: OutgoingMessage) -> Result<(), NotifyError>;
}

/// Logs messages instead of delivering them.
#[derive(Debug, Default)]
pub struct LogOutbox;

impl Outbox for LogOutbox {
    fn send(&self, message: OutgoingMessage) -> Result<(), NotifyError> {
        let names: Vec<&str> = message.attachments.iter().map(|a| a.filename.as_str()).collect();
        info!(
            to = %message.to,
            subject = %message.subject,
            attachments = ?names,
            "status update ready for delivery"
        );
        Ok(())
    }
}

/// Keeps every message in memory.
#[derive(Debug, Default)]
pub struct MemoryOutbox {
    sent: Mutex<Vec<OutgoingMessage>>,
}

impl MemoryOutbox {
    pub fn sent(&self) -> Vec<OutgoingMessage> {
        self.sent.lock().map(|m| m.clone()).unwrap_or_default()
    }
}

impl Outbox for MemoryOutbox {
    fn send(&self, message: OutgoingMessage) -> Result<(), NotifyError> {
        self.sent
            .lock()
            .map_err(|e| NotifyError::Transport(e.to_string()))?
            .push(message);
        Ok(())
    }
}

pub struct Notifier {
    outbox: Arc<dyn Outbox>,
    institute_name: String,
}

impl Notifier {
    pub fn new(outbox: Arc<dyn Outbox>, institute_name: impl Into<String>) -> Self {
        Self {
            outbox,
            institute_name: institute_name.into(),
        }
    }

    /// Composes and sends the status update for `event`. Acceptances carry the
    /// certificate PDF and its QR code when a certificate exists.
    pub fn status_update(
        &self,
        student: &Student,
        event: &StatusChanged,
        certificate: Option<&CertificateRecord>,
        verification: &VerificationService,
    ) -> Result<(), NotifyError> {
        let certificate_url = certificate.map(|c| verification.build_verification_url(c));
        let attachments = match (event.new, certificate) {
            (ApprovalStatus::Accepted, Some(record)) => verification.attachments(record)?,
            _ => Vec::new(),
        };

        self.outbox.send(OutgoingMessage {
            to: student.email_address.clone(),
            subject: status_subject(event.new),
            body: self.status_body(student, event.new, certificate_url.as_deref()),
            attachments,
        })
    }

    fn status_body(
        &self,
        student: &Student,
        status: ApprovalStatus,
        certificate_url: Option<&str>,
    ) -> String {
        let mut body = format!(
            "Dear {name},\n\n\
             Your application for {course} has been reviewed by our administration team.\n\n\
             APPLICATION DECISION:\n\
             - Status: {status}\n\
             - Course: {course}\n\
             - Reference ID: {reference}\n\
             - Review Date: {date}\n\n",
            name = student.full_name,
            course = student.course_name,
            status = status.display().to_uppercase(),
            reference = student.reference_id(),
            date = student.updated_at.format("%B %d, %Y"),
        );

        match status {
            ApprovalStatus::Accepted => body.push_str(&format!(
                "CONGRATULATIONS! Your application has been accepted!\n\n\
                 - Your digital certificate is attached to this email\n\
                 - A QR code is included for quick verification and access to your certificate\n\
                 - You can also preview and download your certificate using the link below:\n  \
                 {url}\n\n\
                 SCAN THE QR CODE TO:\n\
                 - View your certificate online\n\
                 - Download a digital copy\n\
                 - Share with employers or on social media\n",
                url = certificate_url.unwrap_or_default(),
            )),
            ApprovalStatus::Rejected => body.push_str(
                "APPLICATION REVIEW NOTE:\n\n\
                 We regret to inform you that your application could not be approved \
                 at this time.\n\n\
                 Contact our admissions office to discuss alternative options.\n",
            ),
            ApprovalStatus::Pending => body.push_str(
                "Your application is currently being processed. \
                 We appreciate your patience during this time.\n\
                 You will receive another notification once the review is complete.\n",
            ),
        }

        body.push_str(&format!(
            "\nIMPORTANT NOTES:\n\
             - This decision is based on your submitted application materials\n\
             - Keep your reference ID for all future reference\n\n\
             This is an automated message. Please do not reply to this email.\n\n\
             {institute}",
            institute = self.institute_name,
        ));
        body
    }
}

pub fn status_subject(status: ApprovalStatus) -> String {
    format!("Application Status Update - {}", status.display())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::db::Db;
    use chrono::{NaiveDate, TimeZone, Utc};

    fn student() -> Student {
        Student {
            id: 42,
            full_name: "Jane Doe".to_string(),
            fathers_name: "John Doe".to_string(),
            address: "12 Elm Street".to_string(),
            course_name: "Web Development".to_string(),
            course_duration: "3 months".to_string(),
            hours_per_day: None,
            mode_of_learning: "Online".to_string(),
            batch_schedule: None,
            enrolled_date: NaiveDate::from_ymd_opt(2024, 1, 10).unwrap(),
            instructor_name: "Ada Lovelace".to_string(),
            email_address: "jane@example.com".to_string(),
            photo_path: None,
            approval_status: ApprovalStatus::Accepted,
            created_at: Utc::now(),
            updated_at: Utc.with_ymd_and_hms(2024, 3, 5, 9, 0, 0).unwrap(),
        }
    }

    fn record() -> CertificateRecord {
        CertificateRecord {
            id: 7,
            student_id: 42,
            certificate_number: "CERT-20240305090000-XYZ789".to_string(),
            verification_code: "token".to_string(),
            issued_date: NaiveDate::from_ymd_opt(2024, 3, 5).unwrap(),
            document_path: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn setup() -> (Notifier, Arc<MemoryOutbox>, VerificationService) {
        let outbox = Arc::new(MemoryOutbox::default());
        let notifier = Notifier::new(outbox.clone(), "Learning Institute");
        let config = Config::local(&std::env::temp_dir());
        let verification = VerificationService::new(Db::memory(), &config).unwrap();
        (notifier, outbox, verification)
    }

    #[test]
    fn acceptance_message_links_certificate_and_attaches_qr() {
        let (notifier, outbox, verification) = setup();
        let event = StatusChanged::new(42, ApprovalStatus::Pending, ApprovalStatus::Accepted);
        notifier
            .status_update(&student(), &event, Some(&record()), &verification)
            .unwrap();

        let sent = outbox.sent();
        assert_eq!(sent.len(), 1);
        let msg = &sent[0];
        assert_eq!(msg.to, "jane@example.com");
        assert_eq!(msg.subject, "Application Status Update - Accepted");
        assert!(msg.body.contains("Reference ID: STU000042"));
        assert!(msg.body.contains("Status: ACCEPTED"));
        assert!(msg.body.contains("Review Date: March 05, 2024"));
        assert!(msg
            .body
            .contains("http://localhost:5001/certificates/preview/token"));
        assert_eq!(msg.attachments.len(), 1);
        assert_eq!(
            msg.attachments[0].filename,
            "certificate_qr_CERT-20240305090000-XYZ789.png"
        );
    }

    #[test]
    fn rejection_message_has_no_attachments() {
        let (notifier, outbox, verification) = setup();
        let event = StatusChanged::new(42, ApprovalStatus::Accepted, ApprovalStatus::Rejected);
        notifier
            .status_update(&student(), &event, Some(&record()), &verification)
            .unwrap();

        let msg = &outbox.sent()[0];
        assert_eq!(msg.subject, "Application Status Update - Rejected");
        assert!(msg.body.contains("could not be approved"));
        assert!(msg.attachments.is_empty());
    }
}
