use super::AgentExecutor;
use crate::types::Task;
use async_trait::async_trait;
use foreman_core::{ForemanError, ForemanResult};
use std::time::Duration;
use tracing::{debug, warn};

/// Forwards tasks to an HTTP endpoint.
///
/// The task is POSTed as JSON and the response body, which must be JSON, is
/// the result. `GET {url}/health` answering 2xx counts as healthy.
pub struct WebhookExecutor {
    name: String,
    url: String,
    client: reqwest::Client,
}

impl WebhookExecutor {
    pub fn new(name: impl Into<String>, url: impl Into<String>, timeout: Duration) -> ForemanResult<Self> {
        let url = url.into();
        reqwest::Url::parse(&url)
            .map_err(|e| ForemanError::Config(format!("invalid webhook url '{url}': {e}")))?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| ForemanError::Http(e.to_string()))?;
        Ok(Self {
            name: name.into(),
            url,
            client,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl AgentExecutor for WebhookExecutor {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, task: &Task) -> ForemanResult<serde_json::Value> {
        debug!(executor = %self.name, url = %self.url, task_id = %task.id, "Posting task to webhook");
        let response = self
            .client
            .post(&self.url)
            .json(task)
            .send()
            .await
            .map_err(|e| ForemanError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(executor = %self.name, status = %status, "Webhook rejected task");
            return Err(ForemanError::AgentExecution(format!(
                "webhook {} returned {}: {}",
                self.name, status, body
            )));
        }

        response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| ForemanError::AgentExecution(format!("webhook returned invalid JSON: {e}")))
    }

    async fn health(&self) -> bool {
        let url = format!("{}/health", self.url.trim_end_matches('/'));
        match self.client.get(&url).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                warn!(executor = %self.name, error = %e, "Webhook health probe failed");
                false
            }
        }
    }
}
