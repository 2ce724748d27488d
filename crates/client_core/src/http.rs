//! HTTP implementation of [`VehicleService`] plus the read-only statistics endpoints.

use async_trait::async_trait;
use reqwest::{
    multipart::{Form, Part},
    Client, Response,
};
use serde::de::DeserializeOwned;
use shared::{
    domain::{FileKind, OutputName, RecordId, UploadedName, VehicleCounts},
    error::ServiceErrorBody,
    protocol::{
        CleanupResponse, DetectResponse, HealthResponse, SaveQuery, SaveResponse,
        StatisticRecord, StatisticResponse, StatisticsListResponse, UploadResponse,
    },
};
use tracing::{debug, warn};
use url::Url;

use crate::{
    config::ClientSettings,
    error::ServiceError,
    service::{ArtifactRef, UploadReceipt, VehicleService},
    session::{DetectionResult, SelectedFile},
};

pub struct HttpVehicleService {
    http: Client,
    base_url: Url,
}

impl HttpVehicleService {
    pub fn new(base_url: Url) -> Self {
        Self {
            http: Client::new(),
            base_url,
        }
    }

    pub fn from_settings(settings: &ClientSettings) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(settings.request_timeout())
            .build()?;
        Ok(Self {
            http,
            base_url: settings.base_url()?,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    pub async fn list_statistics(&self) -> Result<Vec<StatisticRecord>, ServiceError> {
        let response = self
            .http
            .get(self.endpoint(&["api", "vehicles", "statistics"]))
            .send()
            .await?;
        let body: StatisticsListResponse = read_json(response).await?;
        ensure_success(body.success, &body.details)?;
        Ok(body.data)
    }

    pub async fn get_statistic(&self, id: &RecordId) -> Result<StatisticRecord, ServiceError> {
        let response = self
            .http
            .get(self.endpoint(&["api", "vehicles", "statistics", id.as_str()]))
            .send()
            .await?;
        let body: StatisticResponse = read_json(response).await?;
        ensure_success(body.success, &body.details)?;
        body.data
            .ok_or_else(|| ServiceError::payload("statistic response is missing data"))
    }

    pub async fn health(&self) -> Result<HealthResponse, ServiceError> {
        let response = self.http.get(self.endpoint(&["health"])).send().await?;
        read_json(response).await
    }

    /// Asks the service to drop its temporary uploads and outputs.
    pub async fn cleanup(&self) -> Result<Option<String>, ServiceError> {
        let response = self
            .http
            .delete(self.endpoint(&["api", "vehicles", "cleanup"]))
            .send()
            .await?;
        let body: CleanupResponse = read_json(response).await?;
        ensure_success(body.success, &body.details)?;
        Ok(body.details.message)
    }
}

#[async_trait]
impl VehicleService for HttpVehicleService {
    async fn upload(&self, file: &SelectedFile) -> Result<UploadReceipt, ServiceError> {
        let part = Part::bytes(file.bytes().to_vec())
            .file_name(file.name().to_string())
            .mime_str(file.mime_type())?;
        let response = self
            .http
            .post(self.endpoint(&["api", "vehicles", "upload"]))
            .multipart(Form::new().part("file", part))
            .send()
            .await?;
        let body: UploadResponse = read_json(response).await?;
        ensure_success(body.success, &body.details)?;

        let uploaded_name = body
            .filename
            .ok_or_else(|| ServiceError::payload("upload response is missing filename"))?;
        let file_kind = match body.file_type {
            Some(kind) => kind,
            None => FileKind::from_filename(uploaded_name.as_str()).ok_or_else(|| {
                ServiceError::payload("upload response is missing file_type")
            })?,
        };
        Ok(UploadReceipt {
            uploaded_name,
            file_kind,
        })
    }

    async fn detect(&self, uploaded: &UploadedName) -> Result<DetectionResult, ServiceError> {
        let response = self
            .http
            .post(self.endpoint(&["api", "vehicles", "detect", uploaded.as_str()]))
            .send()
            .await?;
        let body: DetectResponse = read_json(response).await?;
        ensure_success(body.success, &body.details)?;

        match (body.vehicle_counts, body.output_filename) {
            (Some(counts), Some(output_name)) => Ok(DetectionResult {
                counts,
                output_name,
            }),
            _ => Err(ServiceError::payload(
                "detect response must carry both vehicle_counts and output_filename",
            )),
        }
    }

    async fn save(
        &self,
        uploaded: &UploadedName,
        output: &OutputName,
        counts: &VehicleCounts,
    ) -> Result<RecordId, ServiceError> {
        let query = SaveQuery {
            filename: uploaded.to_string(),
            output_filename: output.to_string(),
            vehicle_counts: serde_json::to_string(counts)
                .map_err(|e| ServiceError::payload(format!("cannot encode counts: {e}")))?,
        };
        let response = self
            .http
            .post(self.endpoint(&["api", "vehicles", "save"]))
            .query(&query)
            .send()
            .await?;
        let body: SaveResponse = read_json(response).await?;
        ensure_success(body.success, &body.details)?;
        body.id
            .ok_or_else(|| ServiceError::payload("save response is missing id"))
    }

    async fn retrieve(&self, output: &OutputName) -> Result<Vec<u8>, ServiceError> {
        let response = self
            .http
            .get(self.endpoint(&["api", "vehicles", "download", output.as_str()]))
            .send()
            .await?;
        let response = check_status(response).await?;
        Ok(response.bytes().await?.to_vec())
    }

    fn artifact_ref(&self, output: &OutputName) -> ArtifactRef {
        ArtifactRef {
            output_name: output.clone(),
            inline_url: self.endpoint(&["outputs", output.as_str()]).to_string(),
            download_url: self
                .endpoint(&["api", "vehicles", "download", output.as_str()])
                .to_string(),
        }
    }
}

async fn check_status(response: Response) -> Result<Response, ServiceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let url = response.url().clone();
    let bytes = response.bytes().await?;
    let detail = serde_json::from_slice::<ServiceErrorBody>(&bytes)
        .ok()
        .and_then(|body| body.detail_text());
    warn!(%url, status = status.as_u16(), detail = ?detail, "vehicle service returned an error status");
    Err(ServiceError::Service {
        status: Some(status.as_u16()),
        detail,
    })
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, ServiceError> {
    let response = check_status(response).await?;
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| {
        debug!(body_len = bytes.len(), "undecodable vehicle service body");
        ServiceError::payload(e.to_string())
    })
}

fn ensure_success(success: bool, failure: &ServiceErrorBody) -> Result<(), ServiceError> {
    if success {
        return Ok(());
    }
    Err(ServiceError::Service {
        status: None,
        detail: failure.detail_text(),
    })
}

#[cfg(test)]
#[path = "tests/http_tests.rs"]
mod tests;
