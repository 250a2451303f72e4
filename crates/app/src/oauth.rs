use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tracing::{error, warn};
use unban_relay_twitch::OAuthError;

use crate::router::{AppState, OAuthContext};

/// Scopes requested for the bot account grant.
const OAUTH_SCOPES: &[&str] = &[
    "moderator:read:unban_requests",
    "moderator:manage:unban_requests",
];

const CREDENTIALS_UNSET: &str = "TWITCH_CLIENT_ID and/or TWITCH_CLIENT_SECRET not set!";
const DIRECT_INVOCATION: &str = "This endpoint is intended to be redirected to from Twitch's \
     auth flow. It is not meant to be called directly.";

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
}

/// `GET /auth`: hands the user agent to Twitch's authorization page.
pub async fn auth(State(state): State<AppState>) -> Response {
    let Some(oauth) = state.oauth() else {
        return plain_text(CREDENTIALS_UNSET);
    };

    match oauth.client.authorize_url(&oauth.redirect_uri, OAUTH_SCOPES) {
        Ok(url) => redirect_found(url.as_str()),
        Err(err) => {
            error!(stage = "oauth", error = %err, "failed to build authorize url");
            plain_text("Failed to build the Twitch authorization URL.")
        }
    }
}

/// `GET /auth-callback`: exchanges the authorization code and reports the
/// bot account the tokens belong to. Always answers 200 plain text.
pub async fn auth_callback(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
) -> Response {
    let Some(oauth) = state.oauth() else {
        return plain_text(CREDENTIALS_UNSET);
    };

    if let Some(code) = query.code.as_deref() {
        return exchange(oauth, code).await;
    }

    if let Some(error) = query.error.as_deref() {
        warn!(
            stage = "oauth",
            error,
            description = query.error_description.as_deref(),
            "authorization was not granted"
        );
        return match query.error_description.as_deref() {
            Some(description) => {
                plain_text(format!("The following error occured:\n{error}\n{description}"))
            }
            None => plain_text(format!("The following error occured:\n{error}")),
        };
    }

    plain_text(DIRECT_INVOCATION)
}

async fn exchange(oauth: &OAuthContext, code: &str) -> Response {
    let token = match oauth.client.exchange_code(code, &oauth.redirect_uri).await {
        Ok(token) => token,
        Err(OAuthError::Status { status, body }) => {
            // Twitch's rejection text is the most useful thing to show.
            warn!(stage = "oauth", %status, "token exchange rejected");
            return plain_text(body);
        }
        Err(err) => {
            error!(stage = "oauth", error = %err, "token exchange failed");
            return plain_text("Failed to exchange the authorization code.");
        }
    };

    match oauth.helix.user(&token.access_token, None).await {
        Ok(user) => {
            if user.display_name.to_lowercase() == user.login {
                plain_text(format!("Got tokens for {}", user.display_name))
            } else {
                plain_text(format!(
                    "Got tokens for {} ({})",
                    user.display_name, user.login
                ))
            }
        }
        Err(err) => {
            error!(stage = "oauth", error = %err, "failed to look up token owner");
            plain_text("Got tokens, but failed to look up the associated user.")
        }
    }
}

fn plain_text(text: impl Into<String>) -> Response {
    (StatusCode::OK, text.into()).into_response()
}

fn redirect_found(location: &str) -> Response {
    let mut response = Redirect::temporary(location).into_response();
    *response.status_mut() = StatusCode::FOUND;
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{header, Request},
    };
    use http_body_util::BodyExt;
    use httpmock::MockServer;
    use reqwest::Client;
    use serde_json::json;
    use std::sync::Arc;
    use tower::ServiceExt;
    use unban_relay_core::ChannelDirectory;
    use unban_relay_discord::DiscordWebhookClient;
    use unban_relay_twitch::{HelixClient, TwitchOAuthClient};
    use url::Url;

    use crate::router::app_router;
    use crate::telemetry;

    fn state(server: Option<&MockServer>) -> AppState {
        let metrics = telemetry::init_metrics().expect("metrics init");
        let http = Client::builder().build().expect("client");
        let secret: Arc<[u8]> = Arc::from(b"test-secret".to_vec().into_boxed_slice());
        let discord = DiscordWebhookClient::new(http.clone());

        let oauth = server.map(|server| OAuthContext {
            client: TwitchOAuthClient::new(
                "client",
                "secret",
                Url::parse(&format!("{}/oauth2/", server.base_url())).expect("url"),
                http.clone(),
            ),
            helix: HelixClient::new(
                "client",
                Url::parse(&format!("{}/helix/", server.base_url())).expect("url"),
                http,
            ),
            redirect_uri: "http://localhost:8080/auth-callback".to_string(),
        });

        AppState::new(
            metrics,
            Arc::new(ChannelDirectory::default()),
            secret,
            discord,
            oauth,
        )
    }

    async fn get(state: AppState, uri: &str) -> Response {
        let app = app_router(state);
        app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .expect("response")
    }

    async fn body_text(response: Response) -> String {
        let collected = response.into_body().collect().await.expect("body");
        String::from_utf8(collected.to_bytes().to_vec()).expect("utf-8")
    }

    fn mock_token_success(server: &MockServer) {
        server.mock(|when, then| {
            when.method("POST").path("/oauth2/token");
            then.status(200)
                .header("content-type", "application/json")
                .body(
                    json!({
                        "access_token": "access",
                        "refresh_token": "refresh",
                        "expires_in": 3600,
                        "scope": OAUTH_SCOPES,
                        "token_type": "bearer"
                    })
                    .to_string(),
                );
        });
    }

    fn mock_user(server: &MockServer, login: &str, display_name: &str) {
        let body = json!({
            "data": [{"id": "141981764", "login": login, "display_name": display_name}]
        })
        .to_string();
        server.mock(|when, then| {
            when.method("GET").path("/helix/users");
            then.status(200)
                .header("content-type", "application/json")
                .body(body);
        });
    }

    #[tokio::test]
    async fn auth_without_credentials_reports_missing_env() {
        let response = get(state(None), "/auth").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, CREDENTIALS_UNSET);
    }

    #[tokio::test]
    async fn auth_redirects_to_authorization_url() {
        let server = MockServer::start_async().await;
        let response = get(state(Some(&server)), "/auth").await;

        assert_eq!(response.status(), StatusCode::FOUND);
        let location = response
            .headers()
            .get(header::LOCATION)
            .expect("location header")
            .to_str()
            .expect("ascii");
        assert!(location.contains("/oauth2/authorize"));
        assert!(location.contains("client_id=client"));
        assert!(location.contains("response_type=code"));
        assert!(location.contains("moderator%3Aread%3Aunban_requests"));
    }

    #[tokio::test]
    async fn callback_reports_token_owner() {
        let server = MockServer::start_async().await;
        mock_token_success(&server);
        mock_user(&server, "relaybot", "RelayBot");

        let response = get(state(Some(&server)), "/auth-callback?code=abc").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "Got tokens for RelayBot");
    }

    #[tokio::test]
    async fn callback_appends_login_when_names_differ() {
        let server = MockServer::start_async().await;
        mock_token_success(&server);
        mock_user(&server, "relaybot", "リレーボット");

        let response = get(state(Some(&server)), "/auth-callback?code=abc").await;
        assert_eq!(
            body_text(response).await,
            "Got tokens for リレーボット (relaybot)"
        );
    }

    #[tokio::test]
    async fn callback_renders_upstream_rejection_body() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method("POST").path("/oauth2/token");
            then.status(400).body("{\"message\":\"Invalid authorization code\"}");
        });

        let response = get(state(Some(&server)), "/auth-callback?code=expired").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_text(response).await,
            "{\"message\":\"Invalid authorization code\"}"
        );
    }

    #[tokio::test]
    async fn callback_renders_error_and_description() {
        let server = MockServer::start_async().await;
        let response = get(
            state(Some(&server)),
            "/auth-callback?error=access_denied&error_description=The+user+denied+access",
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_text(response).await,
            "The following error occured:\naccess_denied\nThe user denied access"
        );
    }

    #[tokio::test]
    async fn callback_without_parameters_explains_usage() {
        let server = MockServer::start_async().await;
        let response = get(state(Some(&server)), "/auth-callback").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, DIRECT_INVOCATION);
    }
}
