use chrono::DateTime;
use serde::{Deserialize, Serialize};

use crate::config::EventRule;
use crate::notification::{UnbanRequestCreated, UnbanRequestResolved};

/// Embed accent for newly created requests and denials.
pub const COLOR_ALERT: u32 = 0xCC3333;
/// Embed accent for approved requests.
pub const COLOR_APPROVED: u32 = 0xAAFF00;
/// Embed accent for canceled or unrecognized resolutions.
pub const COLOR_NEUTRAL: u32 = 0x808080;

/// Message body posted to a Discord webhook.
///
/// Serialization order follows declaration order; Discord renders embed
/// fields in the order they appear.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscordPayload {
    pub embeds: Vec<Embed>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embed {
    pub color: u32,
    pub title: String,
    pub fields: Vec<EmbedField>,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

/// Formats a `channel.unban_request.create` event for one routing rule.
pub fn unban_request_created(event: &UnbanRequestCreated, rule: &EventRule) -> DiscordPayload {
    let mut fields = Vec::new();
    if !rule.hide_broadcaster {
        fields.push(EmbedField {
            name: "Broadcaster".to_string(),
            value: user_link(
                &event.broadcaster_user_name,
                &event.broadcaster_user_login,
                &event.broadcaster_user_id,
            ),
            inline: false,
        });
    }
    fields.push(EmbedField {
        name: "User".to_string(),
        value: user_link(&event.user_name, &event.user_login, &event.user_id),
        inline: false,
    });
    fields.push(EmbedField {
        name: "Created at".to_string(),
        value: discord_timestamp(event.created_at.as_deref().unwrap_or_default()),
        inline: false,
    });

    let title = match event.id.as_deref() {
        Some(id) if !id.is_empty() => format!("New Unban Request ({id}) created"),
        _ => "New Unban Request created".to_string(),
    };

    DiscordPayload {
        embeds: vec![Embed {
            color: COLOR_ALERT,
            title,
            fields,
            description: format!("```{}```", event.text),
        }],
    }
}

/// Formats a `channel.unban_request.resolve` event for one routing rule.
///
/// `status` is passed explicitly: the dispatcher has already rejected
/// payloads without one, so the formatter stays total.
pub fn unban_request_resolved(
    event: &UnbanRequestResolved,
    status: &str,
    rule: &EventRule,
) -> DiscordPayload {
    let mut fields = Vec::new();
    if !rule.hide_broadcaster {
        fields.push(EmbedField {
            name: "Broadcaster".to_string(),
            value: user_link(
                &event.broadcaster_user_name,
                &event.broadcaster_user_login,
                &event.broadcaster_user_id,
            ),
            inline: false,
        });
    }
    fields.push(EmbedField {
        name: "Moderator".to_string(),
        value: user_link(
            &event.moderator_user_name,
            &event.moderator_user_login,
            &event.moderator_user_id,
        ),
        inline: false,
    });
    fields.push(EmbedField {
        name: "User".to_string(),
        value: user_link(&event.user_name, &event.user_login, &event.user_id),
        inline: false,
    });

    let title = match event.id.as_deref() {
        Some(id) if !id.is_empty() => format!("Unban Request {id} {status}"),
        _ => format!("Unban Request {status}"),
    };

    let resolution_text = event.resolution_text.as_deref().unwrap_or_default();

    DiscordPayload {
        embeds: vec![Embed {
            color: resolution_color(status),
            title,
            fields,
            description: format!(
                "**Status: `{status}`**\n**Resolution Text:**\n```{resolution_text}```"
            ),
        }],
    }
}

/// Three-way status switch; everything outside the two decided outcomes,
/// including `canceled`, renders neutral.
pub fn resolution_color(status: &str) -> u32 {
    match status {
        "approved" => COLOR_APPROVED,
        "denied" => COLOR_ALERT,
        _ => COLOR_NEUTRAL,
    }
}

/// Markdown link to a Twitch profile: `` [`Name` (`login` - `id`)](<url>) ``.
fn user_link(name: &str, login: &str, id: &str) -> String {
    format!("[`{name}` (`{login}` - `{id}`)](<https://www.twitch.tv/{login}>)")
}

/// Renders an RFC 3339 timestamp as a Discord `<t:{unix}:F>` token.
///
/// Unparseable input falls back to the raw string rather than emitting a
/// token Discord cannot render.
fn discord_timestamp(raw: &str) -> String {
    match DateTime::parse_from_rfc3339(raw) {
        Ok(parsed) => format!("<t:{}:F>", parsed.timestamp()),
        Err(_) => raw.to_string(),
    }
}
