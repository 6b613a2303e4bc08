pub mod complaint_ctx;
pub mod complaint_flow;

pub use complaint_ctx::ComplaintCtx;
pub use complaint_flow::{ComplaintFlow, PendingOverview, DESCRIPTION_FALLBACK};
