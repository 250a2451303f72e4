use reqwest::{Client, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize};
use thiserror::Error;
use url::Url;

/// Client for the Helix user endpoint.
#[derive(Clone)]
pub struct HelixClient {
    http: Client,
    base_url: Url,
    client_id: String,
}

impl HelixClient {
    /// Creates a new Helix client with the provided configuration.
    pub fn new(client_id: impl Into<String>, base_url: Url, http: Client) -> Self {
        Self {
            http,
            base_url,
            client_id: client_id.into(),
        }
    }

    /// Fetches a user profile.
    ///
    /// With `id = None` Helix resolves the user the access token belongs
    /// to, which is how the OAuth callback identifies the bot account.
    pub async fn user(&self, access_token: &str, id: Option<&str>) -> Result<HelixUser, HelixError> {
        let mut url = self.base_url.join("users")?;
        if let Some(id) = id {
            url.query_pairs_mut().append_pair("id", id);
        }

        let response = self
            .http
            .get(url)
            .header("Client-Id", &self.client_id)
            .header("Authorization", format!("Bearer {access_token}"))
            .send()
            .await?;

        let page: UsersResponse = parse_json(response).await?;
        page.data.into_iter().next().ok_or(HelixError::NoUser)
    }
}

#[derive(Debug, Clone, Deserialize)]
struct UsersResponse {
    data: Vec<HelixUser>,
}

/// User entry returned by `GET /users`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct HelixUser {
    pub id: String,
    pub login: String,
    pub display_name: String,
}

/// Errors produced by the Helix client.
#[derive(Debug, Error)]
pub enum HelixError {
    #[error("failed to build url: {0}")]
    Url(#[from] url::ParseError),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected status {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("users response contained no entries")]
    NoUser,
}

async fn parse_json<T>(response: Response) -> Result<T, HelixError>
where
    T: DeserializeOwned,
{
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<unavailable>"));
        return Err(HelixError::Status { status, body });
    }

    Ok(response.json().await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn client(base_url: &Url) -> HelixClient {
        HelixClient::new(
            "client-id",
            base_url.clone(),
            Client::builder().build().expect("client"),
        )
    }

    #[tokio::test]
    async fn user_resolves_token_owner_without_id() {
        let server = MockServer::start_async().await;
        let base = Url::parse(&server.url("/helix/")).expect("url");
        let client = client(&base);

        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/helix/users")
                    .header("Authorization", "Bearer token")
                    .header("Client-Id", "client-id");
                then.status(200).json_body(json!({
                    "data": [
                        {
                            "id": "141981764",
                            "login": "twitchdev",
                            "display_name": "TwitchDev",
                            "type": "",
                            "broadcaster_type": "partner"
                        }
                    ]
                }));
            })
            .await;

        let user = client.user("token", None).await.expect("user");
        mock.assert_async().await;
        assert_eq!(user.id, "141981764");
        assert_eq!(user.login, "twitchdev");
        assert_eq!(user.display_name, "TwitchDev");
    }

    #[tokio::test]
    async fn user_passes_id_query_when_present() {
        let server = MockServer::start_async().await;
        let base = Url::parse(&server.url("/helix/")).expect("url");
        let client = client(&base);

        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/helix/users")
                    .query_param("id", "1234");
                then.status(200).json_body(json!({
                    "data": [
                        {"id": "1234", "login": "someone", "display_name": "Someone"}
                    ]
                }));
            })
            .await;

        let user = client.user("token", Some("1234")).await.expect("user");
        mock.assert_async().await;
        assert_eq!(user.id, "1234");
    }

    #[tokio::test]
    async fn empty_data_array_is_an_error() {
        let server = MockServer::start_async().await;
        let base = Url::parse(&server.url("/helix/")).expect("url");
        let client = client(&base);

        server
            .mock_async(|when, then| {
                when.method(GET).path("/helix/users");
                then.status(200).json_body(json!({ "data": [] }));
            })
            .await;

        let err = client.user("token", None).await.expect_err("should error");
        assert!(matches!(err, HelixError::NoUser));
    }

    #[tokio::test]
    async fn error_status_returns_message() {
        let server = MockServer::start_async().await;
        let base = Url::parse(&server.url("/helix/")).expect("url");
        let client = client(&base);

        server
            .mock_async(|when, then| {
                when.method(GET).path("/helix/users");
                then.status(401).body("unauthorized");
            })
            .await;

        let err = client.user("token", None).await.expect_err("should error");
        match err {
            HelixError::Status { status, body } => {
                assert_eq!(status, StatusCode::UNAUTHORIZED);
                assert_eq!(body, "unauthorized");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
