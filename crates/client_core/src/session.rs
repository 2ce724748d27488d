use std::{fmt, path::Path, sync::Arc};

use anyhow::{anyhow, Context, Result};
use shared::domain::{FileKind, OutputName, RecordId, UploadedName, VehicleCounts};

use crate::{error::Rejection, service::UploadReceipt};

/// A local file picked by the operator, read fully into memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedFile {
    name: String,
    mime_type: String,
    bytes: Vec<u8>,
}

impl SelectedFile {
    pub fn from_bytes(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let name = name.into();
        let mime_type = mime_guess::from_path(&name)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        Self {
            name,
            mime_type,
            bytes,
        }
    }

    pub async fn from_path(path: &Path) -> Result<Self> {
        let name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| anyhow!("'{}' does not name a file", path.display()))?
            .to_string();
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("failed to read '{}'", path.display()))?;
        Ok(Self::from_bytes(name, bytes))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Upload,
    Detect,
    Save,
}

impl Stage {
    pub fn label(&self) -> &'static str {
        match self {
            Stage::Upload => "Upload",
            Stage::Detect => "Detection",
            Stage::Save => "Save",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Phase {
    #[default]
    Idle,
    Ready,
    Uploading,
    Uploaded,
    Detecting,
    Detected,
    Saving,
    Saved,
    Failed(Stage),
}

impl Phase {
    pub fn is_in_flight(&self) -> bool {
        matches!(self, Phase::Uploading | Phase::Detecting | Phase::Saving)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Phase::Failed(_))
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Idle => f.write_str("idle"),
            Phase::Ready => f.write_str("ready"),
            Phase::Uploading => f.write_str("uploading"),
            Phase::Uploaded => f.write_str("uploaded"),
            Phase::Detecting => f.write_str("detecting"),
            Phase::Detected => f.write_str("detected"),
            Phase::Saving => f.write_str("saving"),
            Phase::Saved => f.write_str("saved"),
            Phase::Failed(stage) => write!(f, "failed ({})", stage.label().to_ascii_lowercase()),
        }
    }
}

/// Counts and the annotated artifact they were drawn on. One detect call
/// produces both, so they are stored together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectionResult {
    pub counts: VehicleCounts,
    pub output_name: OutputName,
}

/// Progress of one file through upload, detection and persistence.
///
/// Fields are only mutated by the orchestrator; everything outside the crate
/// sees clones through the accessors below.
#[derive(Debug, Clone, Default)]
pub struct Session {
    selected_file: Option<Arc<SelectedFile>>,
    uploaded_name: Option<UploadedName>,
    file_kind: Option<FileKind>,
    detection: Option<DetectionResult>,
    saved_id: Option<RecordId>,
    phase: Phase,
    status_message: String,
}

impl Session {
    pub fn selected_file(&self) -> Option<&SelectedFile> {
        self.selected_file.as_deref()
    }

    pub fn uploaded_name(&self) -> Option<&UploadedName> {
        self.uploaded_name.as_ref()
    }

    pub fn file_kind(&self) -> Option<&FileKind> {
        self.file_kind.as_ref()
    }

    pub fn detection(&self) -> Option<&DetectionResult> {
        self.detection.as_ref()
    }

    pub fn counts(&self) -> Option<&VehicleCounts> {
        self.detection.as_ref().map(|detection| &detection.counts)
    }

    pub fn output_name(&self) -> Option<&OutputName> {
        self.detection.as_ref().map(|detection| &detection.output_name)
    }

    pub fn saved_id(&self) -> Option<&RecordId> {
        self.saved_id.as_ref()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn status_message(&self) -> &str {
        &self.status_message
    }

    pub fn run_detection_blocker(&self) -> Option<Rejection> {
        if self.phase.is_in_flight() {
            return Some(Rejection::InFlight(self.phase));
        }
        if self.selected_file.is_none() {
            return Some(Rejection::NoFileSelected);
        }
        None
    }

    pub fn save_blocker(&self) -> Option<Rejection> {
        if self.phase.is_in_flight() {
            return Some(Rejection::InFlight(self.phase));
        }
        if self.detection.is_none() || self.uploaded_name.is_none() {
            return Some(Rejection::NoResults);
        }
        if let Some(id) = &self.saved_id {
            return Some(Rejection::AlreadySaved(id.clone()));
        }
        None
    }

    pub fn can_run_detection(&self) -> bool {
        self.run_detection_blocker().is_none()
    }

    pub fn can_save(&self) -> bool {
        self.save_blocker().is_none()
    }

    pub fn can_download(&self) -> bool {
        self.detection.is_some()
    }

    pub(crate) fn selected_file_handle(&self) -> Option<Arc<SelectedFile>> {
        self.selected_file.clone()
    }

    pub(crate) fn select(&mut self, file: Arc<SelectedFile>) {
        let status_message = format!("Selected: {}", file.name());
        *self = Session {
            selected_file: Some(file),
            phase: Phase::Ready,
            status_message,
            ..Session::default()
        };
    }

    pub(crate) fn enter(&mut self, phase: Phase, message: impl Into<String>) {
        self.phase = phase;
        self.status_message = message.into();
    }

    pub(crate) fn set_status(&mut self, message: impl Into<String>) {
        self.status_message = message.into();
    }

    /// A fresh upload supersedes whatever the previous upload produced.
    pub(crate) fn record_upload(&mut self, receipt: UploadReceipt) {
        self.uploaded_name = Some(receipt.uploaded_name);
        self.file_kind = Some(receipt.file_kind);
        self.detection = None;
        self.saved_id = None;
        self.enter(Phase::Uploaded, "File uploaded.");
    }

    pub(crate) fn record_detection(&mut self, detection: DetectionResult) {
        self.detection = Some(detection);
        self.saved_id = None;
        self.enter(Phase::Detected, "Detection completed successfully!");
    }

    /// Without results to pair the id with, the save is committed as failed
    /// so the session never stays in `Saving`.
    pub(crate) fn record_saved(&mut self, id: RecordId) {
        if self.detection.is_none() || self.uploaded_name.is_none() {
            self.enter(
                Phase::Failed(Stage::Save),
                format!("{} failed: {}", Stage::Save.label(), Rejection::NoResults),
            );
            return;
        }
        let message = format!("Saved successfully! ID: {id}");
        self.saved_id = Some(id);
        self.enter(Phase::Saved, message);
    }
}
