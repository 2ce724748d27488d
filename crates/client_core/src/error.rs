//! Remote failure taxonomy and normalization into operator-facing messages.

use std::fmt;

use shared::domain::RecordId;
use thiserror::Error;

use crate::session::{Phase, Stage};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Transport,
    Service,
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("transport failure: {message}")]
    Transport { message: String, timed_out: bool },
    #[error("service failure (status {status:?}): {detail:?}")]
    Service {
        status: Option<u16>,
        detail: Option<String>,
    },
    #[error("unexpected payload: {message}")]
    Payload { message: String },
}

impl ServiceError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            timed_out: false,
        }
    }

    pub fn rejected(detail: impl Into<String>) -> Self {
        Self::Service {
            status: None,
            detail: Some(detail.into()),
        }
    }

    pub fn payload(message: impl Into<String>) -> Self {
        Self::Payload {
            message: message.into(),
        }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            ServiceError::Transport { .. } => FailureKind::Transport,
            ServiceError::Service { .. } | ServiceError::Payload { .. } => FailureKind::Service,
        }
    }

    /// Single human-readable line: the service's own detail when it gave one,
    /// otherwise a generic description of what broke.
    pub fn user_message(&self) -> String {
        match self {
            ServiceError::Transport {
                timed_out: true, ..
            } => "Request to the vehicle service timed out; retry when it is responsive."
                .to_string(),
            ServiceError::Transport { .. } => {
                "Vehicle service unreachable; check URL/network and retry.".to_string()
            }
            ServiceError::Service {
                detail: Some(detail),
                ..
            } => detail.clone(),
            ServiceError::Service {
                status: Some(status),
                detail: None,
            } => format!("Vehicle service responded with status {status}"),
            ServiceError::Service {
                status: None,
                detail: None,
            } => "Vehicle service reported a failure without details".to_string(),
            ServiceError::Payload { message } => {
                format!("Unexpected response from the vehicle service: {message}")
            }
        }
    }
}

impl From<reqwest::Error> for ServiceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            return ServiceError::payload(err.to_string());
        }
        if let Some(status) = err.status() {
            return ServiceError::Service {
                status: Some(status.as_u16()),
                detail: None,
            };
        }
        ServiceError::Transport {
            message: err.to_string(),
            timed_out: err.is_timeout(),
        }
    }
}

/// Local guard that stopped an action before any remote call was issued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    InFlight(Phase),
    NoFileSelected,
    NoResults,
    AlreadySaved(RecordId),
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::InFlight(phase) => write!(f, "Another operation is in progress ({phase})"),
            Rejection::NoFileSelected => f.write_str("Please select a file first"),
            Rejection::NoResults => f.write_str("No detection results to save"),
            Rejection::AlreadySaved(id) => write!(f, "Result already saved (ID: {id})"),
        }
    }
}

/// What an orchestrator action did. Failures are already folded into the
/// session's status message; this only reports the shape of the outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    Completed,
    Rejected(Rejection),
    Failed { stage: Stage, kind: FailureKind },
}

impl ActionOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, ActionOutcome::Completed)
    }
}

pub(crate) fn failure_message(stage: Stage, err: &ServiceError) -> String {
    format!("{} failed: {}", stage.label(), err.user_message())
}
