use reqwest::{Client, StatusCode};
use thiserror::Error;
use unban_relay_core::format::DiscordPayload;
use url::Url;

/// Client that executes Discord webhooks carrying formatted notifications.
///
/// One POST per call, no retry; a failed delivery surfaces as an error the
/// caller logs and moves past.
#[derive(Clone)]
pub struct DiscordWebhookClient {
    http: Client,
}

impl DiscordWebhookClient {
    /// Creates a new client around the shared HTTP instance.
    pub fn new(http: Client) -> Self {
        Self { http }
    }

    /// POSTs the payload to the webhook and returns Discord's raw response
    /// text.
    ///
    /// The target URL carries `wait=true` so Discord reports the delivery
    /// outcome in the response, and `thread_id` when the rule routes into a
    /// thread.
    pub async fn execute(
        &self,
        payload: &DiscordPayload,
        webhook_url: &str,
        thread_id: Option<&str>,
    ) -> Result<String, DiscordError> {
        let url = delivery_url(webhook_url, thread_id)?;
        let response = self.http.post(url).json(payload).send().await?;

        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<unavailable>"));
        if !status.is_success() {
            return Err(DiscordError::Status { status, body });
        }

        Ok(body)
    }
}

/// Builds the final webhook URL with the wait flag and optional thread
/// routing parameter.
fn delivery_url(webhook_url: &str, thread_id: Option<&str>) -> Result<Url, DiscordError> {
    let mut url = Url::parse(webhook_url)?;
    {
        let mut query = url.query_pairs_mut();
        query.append_pair("wait", "true");
        if let Some(thread_id) = thread_id {
            query.append_pair("thread_id", thread_id);
        }
    }
    Ok(url)
}

/// Errors produced while delivering a webhook payload.
#[derive(Debug, Error)]
pub enum DiscordError {
    #[error("invalid webhook url: {0}")]
    Url(#[from] url::ParseError),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected status {status}: {body}")]
    Status { status: StatusCode, body: String },
}
