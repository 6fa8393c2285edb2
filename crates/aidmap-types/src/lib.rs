pub mod api;
pub mod models;

pub use models::{Category, ReportReason, Status, Urgency};
