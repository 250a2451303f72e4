use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Message classification carried in the `Twitch-Eventsub-Message-Type` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Verification,
    Notification,
    Revocation,
}

impl TryFrom<&str> for MessageType {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "webhook_callback_verification" => Ok(Self::Verification),
            "notification" => Ok(Self::Notification),
            "revocation" => Ok(Self::Revocation),
            other => Err(format!("unsupported message type: {other}")),
        }
    }
}

impl MessageType {
    pub fn metric_label(self) -> &'static str {
        match self {
            Self::Verification => "verification",
            Self::Notification => "notification",
            Self::Revocation => "revocation",
        }
    }
}

/// Subscription categories this relay knows how to format.
///
/// The dispatch site keeps an explicit arm for unrecognized types so new
/// upstream event categories show up loudly in logs instead of silently
/// falling through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SubscriptionType {
    #[serde(rename = "channel.unban_request.create")]
    UnbanRequestCreate,
    #[serde(rename = "channel.unban_request.resolve")]
    UnbanRequestResolve,
}

impl SubscriptionType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::UnbanRequestCreate => "channel.unban_request.create",
            Self::UnbanRequestResolve => "channel.unban_request.resolve",
        }
    }
}

impl fmt::Display for SubscriptionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubscriptionType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "channel.unban_request.create" => Ok(Self::UnbanRequestCreate),
            "channel.unban_request.resolve" => Ok(Self::UnbanRequestResolve),
            other => Err(format!("unsupported subscription type: {other}")),
        }
    }
}

/// Subscription descriptor embedded in notification and revocation payloads.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Subscription {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub condition: Value,
}

/// Event payload of a `channel.unban_request.create` notification.
///
/// `id` and `created_at` are optional: truncated or adversarial payloads
/// must still deserialize so the handler can answer with a diagnostic
/// instead of an error.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UnbanRequestCreated {
    #[serde(default)]
    pub id: Option<String>,
    pub broadcaster_user_id: String,
    #[serde(default)]
    pub broadcaster_user_login: String,
    #[serde(default)]
    pub broadcaster_user_name: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub user_login: String,
    #[serde(default)]
    pub user_name: String,
    /// Free text entered by the requesting user. Forwarded verbatim.
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// Event payload of a `channel.unban_request.resolve` notification.
///
/// Moderator fields are defaulted: requests withdrawn by the user arrive
/// without an acting moderator.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UnbanRequestResolved {
    #[serde(default)]
    pub id: Option<String>,
    pub broadcaster_user_id: String,
    #[serde(default)]
    pub broadcaster_user_login: String,
    #[serde(default)]
    pub broadcaster_user_name: String,
    #[serde(default)]
    pub moderator_user_id: String,
    #[serde(default)]
    pub moderator_user_login: String,
    #[serde(default)]
    pub moderator_user_name: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub user_login: String,
    #[serde(default)]
    pub user_name: String,
    #[serde(default)]
    pub resolution_text: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}
