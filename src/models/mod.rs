pub mod complaint;
pub mod pnr;
pub mod submission;
pub mod upload;

pub use complaint::{collect_pending, Complaint, ComplaintStatus, PendingComplaint};
pub use pnr::Pnr;
pub use submission::{ComplaintForm, ComplaintSubmission};
pub use upload::{ImageUpload, ALLOWED_IMAGE_TYPES};
