pub mod identifiers;
pub mod issuance;
pub mod verification;

pub use issuance::{IdentifierSource, IssuanceError, IssuanceWorkflow};
pub use verification::{Attachment, DownloadPolicy, VerificationError, VerificationService};
