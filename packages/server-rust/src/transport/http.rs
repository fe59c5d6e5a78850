//! JSON-over-HTTP task delivery.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use avs_core::{Task, Transport, TransportError};

/// Path appended to an operator endpoint when posting a task.
pub const TASK_PATH: &str = "/tasks";

/// Posts each task as JSON to `<endpoint>/tasks`.
///
/// Endpoints without a scheme are treated as `http://` hosts.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Builds a transport whose requests are capped at `request_timeout`.
    ///
    /// # Errors
    ///
    /// Fails if the underlying HTTP client cannot be constructed.
    pub fn new(request_timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;
        Ok(Self { client })
    }

    #[must_use]
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

/// The URL a task for `endpoint` is posted to.
#[must_use]
pub fn task_url(endpoint: &str) -> String {
    let base = endpoint.trim_end_matches('/');
    if base.contains("://") {
        format!("{base}{TASK_PATH}")
    } else {
        format!("http://{base}{TASK_PATH}")
    }
}

fn classify(endpoint: &str, err: &reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout {
            endpoint: endpoint.to_string(),
        }
    } else if err.is_builder() || err.is_body() {
        TransportError::Encode(err.to_string())
    } else {
        TransportError::Unreachable {
            endpoint: endpoint.to_string(),
            reason: err.to_string(),
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, endpoint: &str, task: &Task) -> Result<(), TransportError> {
        let url = task_url(endpoint);
        let response = self
            .client
            .post(&url)
            .json(task)
            .send()
            .await
            .map_err(|err| classify(endpoint, &err))?;

        let status = response.status();
        if status.is_success() {
            debug!(%url, task_id = %task.id, "task accepted");
            Ok(())
        } else {
            Err(TransportError::Rejected {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
            })
        }
    }
}
