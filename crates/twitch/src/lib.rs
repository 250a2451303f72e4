pub mod helix;
pub mod oauth;

pub use helix::{HelixClient, HelixError, HelixUser};
pub use oauth::{OAuthError, TokenResponse, TwitchOAuthClient};
