//! Approval status changes as explicit events.
//!
//! Persisting a new status and reacting to it are separate steps: the status
//! write returns a [`StatusChanged`], and [`StatusHandlers`] then runs
//! issuance followed by notification.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info};
use uuid::Uuid;

use crate::certificates::{IssuanceError, IssuanceWorkflow, VerificationService};
use crate::db::{ApprovalStatus, CertificateRecord, Db, StoreError};
use crate::notifications::Notifier;

#[derive(Debug, Clone, Serialize)]
pub struct StatusChanged {
    pub event_id: Uuid,
    pub student_id: i64,
    pub old: ApprovalStatus,
    pub new: ApprovalStatus,
    pub occurred_at: DateTime<Utc>,
}

impl StatusChanged {
    pub fn new(student_id: i64, old: ApprovalStatus, new: ApprovalStatus) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            student_id,
            old,
            new,
            occurred_at: Utc::now(),
        }
    }

    pub fn is_transition(&self) -> bool {
        self.old != self.new
    }
}

/// Persists `new` for the student. `Ok(None)` means the student does not exist.
pub async fn change_status(
    db: &Db,
    student_id: i64,
    new: ApprovalStatus,
) -> Result<Option<StatusChanged>, StoreError> {
    let Some((old, _)) = db.set_student_status(student_id, new).await? else {
        return Ok(None);
    };
    let event = StatusChanged::new(student_id, old, new);
    info!(
        event_id = %event.event_id,
        student_id,
        old = old.as_str(),
        new = new.as_str(),
        "student status changed"
    );
    Ok(Some(event))
}

/// What the handlers did with one event.
#[derive(Debug, Clone, Serialize)]
pub struct DispatchOutcome {
    pub certificate: Option<CertificateRecord>,
    pub notified: bool,
}

#[derive(Clone)]
pub struct StatusHandlers {
    db: Db,
    issuance: IssuanceWorkflow,
    verification: VerificationService,
    notifier: Arc<Notifier>,
}

impl StatusHandlers {
    pub fn new(
        db: Db,
        issuance: IssuanceWorkflow,
        verification: VerificationService,
        notifier: Arc<Notifier>,
    ) -> Self {
        Self {
            db,
            issuance,
            verification,
            notifier,
        }
    }

    /// Runs issuance, then notification. An issuance failure is returned and
    /// nothing is sent; notification failures are logged only.
    pub async fn dispatch(&self, event: &StatusChanged) -> Result<DispatchOutcome, IssuanceError> {
        let certificate = self.issuance.handle(event).await?;

        if !event.is_transition() {
            return Ok(DispatchOutcome {
                certificate,
                notified: false,
            });
        }

        let notified = match self.db.get_student(event.student_id).await {
            Ok(Some(student)) => {
                match self
                    .notifier
                    .status_update(&student, event, certificate.as_ref(), &self.verification)
                {
                    Ok(()) => true,
                    Err(e) => {
                        error!(
                            event_id = %event.event_id,
                            error = %e,
                            "status notification failed"
                        );
                        false
                    }
                }
            }
            Ok(None) => false,
            Err(e) => {
                error!(
                    event_id = %event.event_id,
                    error = %e,
                    "could not load student for notification"
                );
                false
            }
        };

        Ok(DispatchOutcome {
            certificate,
            notified,
        })
    }
}
