use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use unban_relay_core::ChannelDirectory;
use unban_relay_discord::DiscordWebhookClient;
use unban_relay_twitch::{HelixClient, TwitchOAuthClient};

use crate::{oauth, telemetry, webhook};

const INDEX_TEXT: &str = "Twitch Unban Requests EventSub Webhook Endpoint";

/// Twitch identity and API clients backing the `/auth` endpoints.
///
/// Absent when the process was started without credentials; the endpoints
/// then answer with a plain-text notice instead of redirecting.
pub struct OAuthContext {
    pub client: TwitchOAuthClient,
    pub helix: HelixClient,
    pub redirect_uri: String,
}

#[derive(Clone)]
pub struct AppState {
    metrics: PrometheusHandle,
    directory: Arc<ChannelDirectory>,
    webhook_secret: Arc<[u8]>,
    discord: DiscordWebhookClient,
    oauth: Option<Arc<OAuthContext>>,
}

impl AppState {
    pub fn new(
        metrics: PrometheusHandle,
        directory: Arc<ChannelDirectory>,
        webhook_secret: Arc<[u8]>,
        discord: DiscordWebhookClient,
        oauth: Option<OAuthContext>,
    ) -> Self {
        Self {
            metrics,
            directory,
            webhook_secret,
            discord,
            oauth: oauth.map(Arc::new),
        }
    }

    pub fn metrics(&self) -> &PrometheusHandle {
        &self.metrics
    }

    pub fn directory(&self) -> &ChannelDirectory {
        &self.directory
    }

    pub fn webhook_secret(&self) -> Arc<[u8]> {
        self.webhook_secret.clone()
    }

    pub fn discord(&self) -> &DiscordWebhookClient {
        &self.discord
    }

    pub fn oauth(&self) -> Option<&OAuthContext> {
        self.oauth.as_deref()
    }
}

pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index).post(webhook::handle))
        .route("/auth", get(oauth::auth))
        .route("/auth-callback", get(oauth::auth_callback))
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics))
        .with_state(state)
}

async fn index() -> &'static str {
    INDEX_TEXT
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    let body = telemetry::render_metrics(state.metrics());
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/plain; version=0.0.4")
        .body(Body::from(body))
        .unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request};
    use http_body_util::BodyExt;
    use reqwest::Client;
    use tower::ServiceExt;

    fn setup_state() -> AppState {
        let metrics = telemetry::init_metrics().expect("metrics init");
        let secret: Arc<[u8]> = Arc::from(b"test-secret".to_vec().into_boxed_slice());
        let discord = DiscordWebhookClient::new(Client::builder().build().expect("client"));
        AppState::new(
            metrics,
            Arc::new(ChannelDirectory::default()),
            secret,
            discord,
            None,
        )
    }

    #[tokio::test]
    async fn index_returns_confirmation_text() {
        let app = app_router(setup_state());

        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .expect("handler should respond");

        assert_eq!(response.status(), StatusCode::OK);
        let collected = response.into_body().collect().await.expect("body");
        assert_eq!(collected.to_bytes(), INDEX_TEXT.as_bytes());
    }

    #[tokio::test]
    async fn healthz_returns_ok() {
        let app = app_router(setup_state());

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/healthz")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .expect("handler should respond");

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn metrics_exports_build_info() {
        let app = app_router(setup_state());

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/metrics")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .expect("handler should respond");

        assert_eq!(response.status(), StatusCode::OK);
        let collected = response
            .into_body()
            .collect()
            .await
            .expect("body should read");
        let body = String::from_utf8(collected.to_bytes().to_vec()).expect("utf-8");
        assert!(body.contains("app_build_info"));
        assert!(body.contains("app_uptime_seconds"));
    }
}
