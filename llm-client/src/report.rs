//! One-shot report-generation backend, used by the report consumer (§4.D).

use async_trait::async_trait;
use psych_core::CoreError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub keywords: Vec<String>,
    #[serde(rename = "type")]
    pub kind: Vec<String>,
    pub content: String,
    pub grade: String,
    pub suggestion: Vec<String>,
}

/// A non-streaming LLM call that turns a transcript into a structured report.
#[async_trait]
pub trait ReportApp: Send + Sync {
    async fn call(&self, transcript: &str) -> Result<Report, CoreError>;
}

/// HTTP-backed report app calling an OpenAI-compatible chat completion
/// endpoint configured to return a JSON object matching [`Report`].
pub struct HttpReportApp {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    app_id: String,
}

impl HttpReportApp {
    pub fn new(endpoint: impl Into<String>, app_id: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            app_id: app_id.into(),
        }
    }
}

#[derive(Serialize)]
struct ReportRequest<'a> {
    app_id: &'a str,
    prompt: &'a str,
}

#[async_trait]
impl ReportApp for HttpReportApp {
    async fn call(&self, transcript: &str) -> Result<Report, CoreError> {
        let resp = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&ReportRequest {
                app_id: &self.app_id,
                prompt: transcript,
            })
            .send()
            .await
            .map_err(|e| CoreError::LlmStreamError(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(CoreError::LlmStreamError(format!(
                "report backend returned {}",
                resp.status()
            )));
        }

        resp.json::<Report>()
            .await
            .map_err(|e| CoreError::LlmStreamError(e.to_string()))
    }
}
