use crate::errors::AppError;
use crate::meta_models::EventPayload;
use serde_json::Value;
use std::time::Duration;

/// Client for the Meta Conversions API.
///
/// One synchronous POST per dispatch; the bounded timeout means a hung
/// upstream is treated identically to a rejected request.
#[derive(Clone)]
pub struct MetaClient {
    client: reqwest::Client,
    base_url: String,
    pixel_id: String,
}

impl MetaClient {
    pub fn new(base_url: String, pixel_id: String) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| {
                AppError::InternalError(format!("Failed to create Conversions API client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url,
            pixel_id,
        })
    }

    /// Submits one event payload. Non-success HTTP status (or a timeout)
    /// is a dispatch failure; the caller must not write a dispatch record
    /// in that case so the event stays eligible for upstream retry.
    pub async fn send_events(&self, payload: &EventPayload) -> Result<Value, AppError> {
        let url = format!("{}/{}/events", self.base_url, self.pixel_id);
        tracing::info!("Submitting {} event(s) to Conversions API", payload.data.len());

        let response = self
            .client
            .post(&url)
            .json(payload)
            .send()
            .await
            .map_err(|e| {
                AppError::DispatchError(format!("Conversions API request failed: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::DispatchError(format!(
                "Conversions API returned {}: {}",
                status, error_text
            )));
        }

        let data = response.json().await.map_err(|e| {
            AppError::DispatchError(format!("Failed to parse Conversions API response: {}", e))
        })?;

        Ok(data)
    }
}
