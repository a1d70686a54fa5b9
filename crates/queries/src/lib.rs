pub mod client;
pub mod definitions;
pub mod schema;
pub mod summary;
pub mod timestamp;
pub mod transcript;

pub use client::DashboardClient;
pub use definitions::{Appointments, CallDetails, Calls, Companies, Documents, EntityQuery, RagChunks};
pub use schema::{
    Appointment, AppointmentStatus, Call, CallDetail, CallRef, Company, CompanyRef, Document, DocumentRef,
    RagChunk, Speaker,
};
pub use summary::DashboardSummary;
pub use transcript::{TranscriptState, TranscriptViewer};
