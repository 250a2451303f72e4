pub mod config;
pub mod format;
pub mod notification;

pub use config::{ChannelConfig, ChannelDirectory, DirectoryParseError, EventRule};
pub use format::{DiscordPayload, Embed, EmbedField};
pub use notification::{
    MessageType, Subscription, SubscriptionType, UnbanRequestCreated, UnbanRequestResolved,
};
