use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::notification::SubscriptionType;

/// One configured routing from a `(channel, subscription type)` pair to a
/// Discord webhook destination.
///
/// Key names follow the historical `config.json` shape, so existing
/// deployments keep working unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRule {
    pub event: SubscriptionType,
    pub webhook: String,
    #[serde(default)]
    pub thread_id: Option<String>,
    #[serde(default)]
    pub hide_broadcaster: bool,
}

/// All routing entries for a single broadcaster channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelConfig {
    /// Twitch broadcaster user id.
    pub channel: String,
    #[serde(default)]
    pub events: Vec<EventRule>,
}

/// Read-only channel routing list, loaded once at startup.
///
/// Channel ids are not required to be unique; lookups return the first
/// matching entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelDirectory {
    channels: Vec<ChannelConfig>,
}

impl ChannelDirectory {
    pub fn new(channels: Vec<ChannelConfig>) -> Self {
        Self { channels }
    }

    /// Parses the directory from the raw contents of the config file.
    pub fn from_json(raw: &str) -> Result<Self, DirectoryParseError> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// First channel entry matching the broadcaster id, if any.
    pub fn channel(&self, channel_id: &str) -> Option<&ChannelConfig> {
        self.channels.iter().find(|c| c.channel == channel_id)
    }

    /// All rules of the first matching channel that route the given
    /// subscription type. Empty when the channel is unknown or has no rule
    /// for the type; callers treat both the same way.
    pub fn rules_for(&self, channel_id: &str, event: SubscriptionType) -> Vec<&EventRule> {
        self.channel(channel_id)
            .map(|config| {
                config
                    .events
                    .iter()
                    .filter(|rule| rule.event == event)
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Error raised when the channel config file does not parse.
#[derive(Debug, Error)]
#[error("invalid channel config: {0}")]
pub struct DirectoryParseError(#[from] serde_json::Error);
