//! Drives one [`Session`] through upload, detection, save and download.

use std::sync::Arc;

use tokio::sync::{broadcast, Mutex};
use tracing::{debug, error, info, warn};

use crate::{
    error::{failure_message, ActionOutcome, Rejection, ServiceError},
    service::{ArtifactRef, VehicleService},
    session::{Phase, SelectedFile, Session, Stage},
    view::{project, SessionView},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    PhaseChanged { phase: Phase, message: String },
}

/// Owns the session and serializes every remote call against it.
///
/// The session lock is only held to check guards and commit results, never
/// across a remote call. Claiming an in-flight phase under the lock is what
/// keeps a second action from issuing a concurrent call.
pub struct WorkflowOrchestrator {
    service: Arc<dyn VehicleService>,
    session: Mutex<Session>,
    events: broadcast::Sender<SessionEvent>,
}

impl WorkflowOrchestrator {
    pub fn new(service: Arc<dyn VehicleService>) -> Arc<Self> {
        let (events, _) = broadcast::channel(64);
        Arc::new(Self {
            service,
            session: Mutex::new(Session::default()),
            events,
        })
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub async fn snapshot(&self) -> Session {
        self.session.lock().await.clone()
    }

    pub async fn view(&self) -> SessionView {
        project(&*self.session.lock().await)
    }

    pub async fn select_file(&self, file: SelectedFile) -> ActionOutcome {
        let mut session = self.session.lock().await;
        if session.phase().is_in_flight() {
            let phase = session.phase();
            return self.reject(&mut session, Rejection::InFlight(phase));
        }

        info!(
            file = %file.name(),
            mime_type = %file.mime_type(),
            size_bytes = file.len(),
            "file selected"
        );
        session.select(Arc::new(file));
        self.publish(&session);
        ActionOutcome::Completed
    }

    /// Uploads the selected file and, only if that succeeds, runs detection on
    /// the name the service assigned to it. Every run re-uploads.
    pub async fn run_detection(&self) -> ActionOutcome {
        let file = {
            let mut session = self.session.lock().await;
            if let Some(rejection) = session.run_detection_blocker() {
                return self.reject(&mut session, rejection);
            }
            let Some(file) = session.selected_file_handle() else {
                return self.reject(&mut session, Rejection::NoFileSelected);
            };
            session.enter(Phase::Uploading, "Uploading file...");
            self.publish(&session);
            file
        };

        info!(file = %file.name(), size_bytes = file.len(), "uploading file");
        let receipt = match self.service.upload(&file).await {
            Ok(receipt) => receipt,
            Err(err) => return self.fail(Stage::Upload, err).await,
        };

        let uploaded_name = {
            let mut session = self.session.lock().await;
            info!(
                uploaded_name = %receipt.uploaded_name,
                file_kind = %receipt.file_kind,
                "upload accepted"
            );
            let uploaded_name = receipt.uploaded_name.clone();
            session.record_upload(receipt);
            self.publish(&session);
            session.enter(Phase::Detecting, "File uploaded. Running detection...");
            self.publish(&session);
            uploaded_name
        };

        let detection = match self.service.detect(&uploaded_name).await {
            Ok(detection) => detection,
            Err(err) => return self.fail(Stage::Detect, err).await,
        };

        let mut session = self.session.lock().await;
        info!(
            uploaded_name = %uploaded_name,
            output_name = %detection.output_name,
            motorbikes = detection.counts.motorbikes,
            cars = detection.counts.cars,
            trucks = detection.counts.trucks,
            "detection completed"
        );
        session.record_detection(detection);
        self.publish(&session);
        ActionOutcome::Completed
    }

    /// Persists the current result. Guarded so a result is saved at most once;
    /// the service does not deduplicate.
    pub async fn save_result(&self) -> ActionOutcome {
        let (uploaded_name, detection) = {
            let mut session = self.session.lock().await;
            if let Some(rejection) = session.save_blocker() {
                return self.reject(&mut session, rejection);
            }
            let (Some(uploaded_name), Some(detection)) =
                (session.uploaded_name().cloned(), session.detection().cloned())
            else {
                return self.reject(&mut session, Rejection::NoResults);
            };
            session.enter(Phase::Saving, "Saving to database...");
            self.publish(&session);
            (uploaded_name, detection)
        };

        let saved = self
            .service
            .save(&uploaded_name, &detection.output_name, &detection.counts)
            .await;
        let id = match saved {
            Ok(id) => id,
            Err(err) => return self.fail(Stage::Save, err).await,
        };

        let mut session = self.session.lock().await;
        info!(uploaded_name = %uploaded_name, record_id = %id, "detection result saved");
        session.record_saved(id);
        self.publish(&session);
        if session.saved_id().is_some() {
            ActionOutcome::Completed
        } else {
            ActionOutcome::Rejected(Rejection::NoResults)
        }
    }

    /// Reference to the annotated output, or `None` when there is nothing to
    /// fetch yet. Never touches the session.
    pub async fn download_result(&self) -> Option<ArtifactRef> {
        let output_name = self.session.lock().await.output_name().cloned();
        match output_name {
            Some(output_name) => {
                debug!(output_name = %output_name, "resolved output artifact");
                Some(self.service.artifact_ref(&output_name))
            }
            None => {
                debug!("download requested without an output artifact");
                None
            }
        }
    }

    async fn fail(&self, stage: Stage, err: ServiceError) -> ActionOutcome {
        let kind = err.kind();
        let message = failure_message(stage, &err);
        error!(stage = stage.label(), kind = ?kind, error = %err, "remote call failed");

        let mut session = self.session.lock().await;
        session.enter(Phase::Failed(stage), message);
        self.publish(&session);
        ActionOutcome::Failed { stage, kind }
    }

    fn reject(&self, session: &mut Session, rejection: Rejection) -> ActionOutcome {
        match &rejection {
            Rejection::InFlight(phase) => {
                debug!(phase = %phase, "action ignored while a call is in flight");
            }
            other => {
                warn!(reason = %other, "action rejected");
                session.set_status(other.to_string());
                self.publish(session);
            }
        }
        ActionOutcome::Rejected(rejection)
    }

    fn publish(&self, session: &Session) {
        let _ = self.events.send(SessionEvent::PhaseChanged {
            phase: session.phase(),
            message: session.status_message().to_string(),
        });
    }
}

#[cfg(test)]
#[path = "tests/orchestrator_tests.rs"]
mod tests;
