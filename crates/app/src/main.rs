mod oauth;
mod router;
mod telemetry;
mod webhook;

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use tracing::info;
use unban_relay_core::ChannelDirectory;
use unban_relay_discord::DiscordWebhookClient;
use unban_relay_twitch::{HelixClient, TwitchOAuthClient};
use unban_relay_util::{load_env_file, AppConfig};
use url::Url;

use router::OAuthContext;

const TWITCH_OAUTH_BASE_URL: &str = "https://id.twitch.tv/oauth2/";
const TWITCH_HELIX_BASE_URL: &str = "https://api.twitch.tv/helix/";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    load_env_file();
    let config = AppConfig::from_env()?;

    telemetry::init_tracing(&config)?;
    let metrics = telemetry::init_metrics()?;

    let directory = load_directory(&config.channel_config_path)?;
    info!(
        stage = "app",
        channels = directory.len(),
        path = %config.channel_config_path.display(),
        "loaded channel routing config"
    );

    let http = reqwest::Client::builder()
        .timeout(config.http_timeout)
        .build()?;
    let discord = DiscordWebhookClient::new(http.clone());

    let oauth = match config.twitch.as_ref() {
        Some(credentials) => Some(OAuthContext {
            client: TwitchOAuthClient::new(
                &credentials.client_id,
                &credentials.client_secret,
                Url::parse(TWITCH_OAUTH_BASE_URL)?,
                http.clone(),
            ),
            helix: HelixClient::new(&credentials.client_id, Url::parse(TWITCH_HELIX_BASE_URL)?, http),
            redirect_uri: credentials.redirect_uri.clone(),
        }),
        None => {
            info!(
                stage = "app",
                "Twitch credentials not set; /auth endpoints are degraded"
            );
            None
        }
    };

    let secret: Arc<[u8]> = Arc::from(config.eventsub_secret.into_bytes().into_boxed_slice());
    let state = router::AppState::new(metrics, Arc::new(directory), secret, discord, oauth);

    let addr: SocketAddr = config.bind_addr;
    info!(stage = "app", %addr, env = %config.environment.as_str(), "starting HTTP server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router::app_router(state))
        .await
        .map_err(|err| err.into())
}

fn load_directory(path: &Path) -> Result<ChannelDirectory, Box<dyn std::error::Error>> {
    let raw = std::fs::read_to_string(path)
        .map_err(|err| format!("failed to read channel config {}: {err}", path.display()))?;
    Ok(ChannelDirectory::from_json(&raw)?)
}
