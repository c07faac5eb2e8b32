//! HTTP client for the external training-program management service.

use async_trait::async_trait;
use forma_core::{error::FormaError, intent::EditAction, traits::ProgramService};
use serde::Serialize;
use tracing::debug;

/// Program management collaborator over HTTP.
pub struct HttpProgramService {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpProgramService {
    pub fn new(base_url: String, api_key: String, timeout_secs: u64) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url,
            api_key,
        }
    }
}

#[derive(Serialize)]
struct EditRequest<'a> {
    client_id: &'a str,
    action: &'a str,
    exercise: &'a str,
    category: &'a str,
}

#[async_trait]
impl ProgramService for HttpProgramService {
    async fn apply_edit(
        &self,
        client_id: &str,
        action: EditAction,
        exercise: &str,
        category: &str,
    ) -> Result<(), FormaError> {
        let url = format!("{}/program/edits", self.base_url.trim_end_matches('/'));
        let body = EditRequest {
            client_id,
            action: action.as_str(),
            exercise,
            category,
        };

        debug!(
            "program edit: {} {} on {} for {}",
            body.action, exercise, category, client_id
        );

        let mut request = self.client.post(&url).json(&body);
        if !self.api_key.is_empty() {
            request = request.bearer_auth(&self.api_key);
        }

        let resp = request
            .send()
            .await
            .map_err(|e| FormaError::ExternalAction(format!("program edit request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(FormaError::ExternalAction(format!(
                "program edit returned {status}: {text}"
            )));
        }

        Ok(())
    }
}
