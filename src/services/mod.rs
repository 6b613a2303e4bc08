pub mod complaint_store;
pub mod image_analysis;
pub mod image_storage;
pub mod llm_service;

pub use complaint_store::{ComplaintStore, FirestoreComplaintStore, InMemoryComplaintStore, PnrDocument};
pub use image_analysis::{assess_labels, CaptionOutcome, DamageAssessment, ImageAnalyzer};
pub use image_storage::{GcsImageStorage, ImageStorage, InMemoryImageStorage};
pub use llm_service::{DescriptionRequest, DescriptionWriter, LlmService};
