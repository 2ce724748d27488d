//! Client-side workflow for counting vehicles with a remote detection service.

pub mod config;
pub mod error;
pub mod http;
pub mod orchestrator;
pub mod service;
pub mod session;
pub mod view;

pub use config::{load_settings, ClientSettings};
pub use error::{ActionOutcome, FailureKind, Rejection, ServiceError};
pub use http::HttpVehicleService;
pub use orchestrator::{SessionEvent, WorkflowOrchestrator};
pub use service::{ArtifactRef, UploadReceipt, VehicleService};
pub use session::{DetectionResult, Phase, SelectedFile, Session, Stage};
pub use view::{project, ResultPanel, SessionView};
