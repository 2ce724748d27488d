use async_trait::async_trait;
use shared::domain::{FileKind, OutputName, RecordId, UploadedName, VehicleCounts};

use crate::{
    error::ServiceError,
    session::{DetectionResult, SelectedFile},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReceipt {
    pub uploaded_name: UploadedName,
    pub file_kind: FileKind,
}

/// Where an output artifact can be fetched from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactRef {
    pub output_name: OutputName,
    /// Suitable for inline display of the annotated image or video.
    pub inline_url: String,
    /// Served as an attachment download.
    pub download_url: String,
}

/// The remote operations the orchestrator drives. Each call either succeeds
/// with its payload or fails; no retry, idempotency or ordering is assumed.
#[async_trait]
pub trait VehicleService: Send + Sync {
    async fn upload(&self, file: &SelectedFile) -> Result<UploadReceipt, ServiceError>;
    async fn detect(&self, uploaded: &UploadedName) -> Result<DetectionResult, ServiceError>;
    async fn save(
        &self,
        uploaded: &UploadedName,
        output: &OutputName,
        counts: &VehicleCounts,
    ) -> Result<RecordId, ServiceError>;
    async fn retrieve(&self, output: &OutputName) -> Result<Vec<u8>, ServiceError>;
    fn artifact_ref(&self, output: &OutputName) -> ArtifactRef;
}
