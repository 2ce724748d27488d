use shared::domain::{MediaKind, OutputName, RecordId, VehicleCounts};

use crate::session::{Phase, Session};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultPanel {
    None,
    Image {
        counts: VehicleCounts,
        output_name: OutputName,
    },
    Video {
        counts: VehicleCounts,
        output_name: OutputName,
    },
}

impl ResultPanel {
    pub fn media_kind(&self) -> Option<MediaKind> {
        match self {
            ResultPanel::None => None,
            ResultPanel::Image { .. } => Some(MediaKind::Image),
            ResultPanel::Video { .. } => Some(MediaKind::Video),
        }
    }

    pub fn counts(&self) -> Option<&VehicleCounts> {
        match self {
            ResultPanel::None => None,
            ResultPanel::Image { counts, .. } | ResultPanel::Video { counts, .. } => Some(counts),
        }
    }
}

/// Read-only rendering state derived from a [`Session`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionView {
    pub phase: Phase,
    pub selected_file_name: Option<String>,
    pub status_message: String,
    pub status_is_error: bool,
    pub busy: bool,
    pub can_run_detection: bool,
    pub can_save: bool,
    pub can_download: bool,
    pub saved_id: Option<RecordId>,
    pub panel: ResultPanel,
}

pub fn project(session: &Session) -> SessionView {
    let panel = match session.detection() {
        None => ResultPanel::None,
        Some(detection) => match MediaKind::classify(session.file_kind()) {
            MediaKind::Image => ResultPanel::Image {
                counts: detection.counts,
                output_name: detection.output_name.clone(),
            },
            MediaKind::Video => ResultPanel::Video {
                counts: detection.counts,
                output_name: detection.output_name.clone(),
            },
        },
    };

    SessionView {
        phase: session.phase(),
        selected_file_name: session.selected_file().map(|file| file.name().to_string()),
        status_message: session.status_message().to_string(),
        status_is_error: session.phase().is_failed(),
        busy: session.phase().is_in_flight(),
        can_run_detection: session.can_run_detection(),
        can_save: session.can_save(),
        can_download: session.can_download(),
        saved_id: session.saved_id().cloned(),
        panel,
    }
}
