use std::time::Instant;

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use hmac::{Hmac, Mac};
use metrics::{counter, histogram};
use serde_json::Value;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use tracing::{error, info, warn};
use unban_relay_core::config::EventRule;
use unban_relay_core::format::{self, DiscordPayload};
use unban_relay_core::notification::{
    MessageType, Subscription, SubscriptionType, UnbanRequestCreated, UnbanRequestResolved,
};

use crate::router::AppState;

const HEADER_MESSAGE_ID: &str = "Twitch-Eventsub-Message-Id";
const HEADER_TIMESTAMP: &str = "Twitch-Eventsub-Message-Timestamp";
const HEADER_SIGNATURE: &str = "Twitch-Eventsub-Message-Signature";
const HEADER_MESSAGE_TYPE: &str = "Twitch-Eventsub-Message-Type";

const NO_SUBSCRIPTION_TYPE: &str =
    "This seems like an invalid payload. There is no subscription type to check for.";
const NOT_CONFIGURED: &str = "Event not configured to be sent to Discord. Skipping event.";
const INVALID_JSON: &str = "This seems like an invalid payload. The request body is not valid JSON.";
const NO_CHALLENGE: &str = "This seems like an invalid payload. There is no challenge to echo.";
const NO_EVENT: &str = "This seems like an invalid payload. There is no usable event object.";

/// Entry point for `POST /`.
///
/// Every branch resolves to a response here; nothing propagates past this
/// handler.
pub async fn handle(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let start = Instant::now();
    let label = message_type_label(&headers);
    let response = process(&state, &headers, &body, label).await;
    histogram!("webhook_ack_latency_seconds", "type" => label)
        .record(start.elapsed().as_secs_f64());
    response
}

async fn process(
    state: &AppState,
    headers: &HeaderMap,
    body: &Bytes,
    label: &'static str,
) -> Response {
    // Signature first: the body is not parsed before it is authenticated.
    let message_id = header_str(headers, HEADER_MESSAGE_ID);
    let timestamp = header_str(headers, HEADER_TIMESTAMP);
    let signature = header_str(headers, HEADER_SIGNATURE);
    let (Some(message_id), Some(timestamp), Some(signature)) = (message_id, timestamp, signature)
    else {
        warn!(stage = "ingress", "request missing signature headers");
        counter!("eventsub_invalid_signature_total", "type" => label).increment(1);
        return forbidden();
    };

    let secret = state.webhook_secret();
    if let Err(reason) = verify_signature(&secret, message_id, timestamp, body, signature) {
        warn!(stage = "ingress", %message_id, %reason, "signature verification failed");
        counter!("eventsub_invalid_signature_total", "type" => label).increment(1);
        return forbidden();
    }

    counter!("eventsub_ingress_total", "type" => label).increment(1);

    // Unknown or missing message types are acknowledged and dropped so new
    // upstream types never bounce as errors.
    let message_type = match header_str(headers, HEADER_MESSAGE_TYPE) {
        Some(raw) => match MessageType::try_from(raw) {
            Ok(message_type) => message_type,
            Err(detail) => {
                info!(stage = "ingress", %message_id, %detail, "ignoring unknown message type");
                return no_content();
            }
        },
        None => {
            info!(stage = "ingress", %message_id, "request carries no message type header");
            return no_content();
        }
    };

    let notification: Value = match serde_json::from_slice(body) {
        Ok(value) => value,
        Err(err) => {
            warn!(
                stage = "ingress",
                %message_id,
                error = %err,
                "authenticated payload is not valid JSON"
            );
            return diagnostic(INVALID_JSON);
        }
    };

    match message_type {
        MessageType::Verification => challenge_response(message_id, &notification),
        MessageType::Revocation => {
            log_revocation(message_id, &notification);
            no_content()
        }
        MessageType::Notification => dispatch_notification(state, message_id, &notification).await,
    }
}

/// Echoes the verification challenge back as plain text.
fn challenge_response(message_id: &str, notification: &Value) -> Response {
    match notification.get("challenge").and_then(Value::as_str) {
        Some(challenge) => Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, "text/plain")
            .body(challenge.to_string().into())
            .unwrap(),
        None => {
            warn!(stage = "ingress", %message_id, "verification payload without challenge");
            diagnostic(NO_CHALLENGE)
        }
    }
}

fn log_revocation(message_id: &str, notification: &Value) {
    match notification
        .get("subscription")
        .map(|value| serde_json::from_value::<Subscription>(value.clone()))
    {
        Some(Ok(subscription)) => {
            info!(
                stage = "ingress",
                %message_id,
                subscription_type = %subscription.kind,
                status = subscription.status.as_deref().unwrap_or("unknown"),
                condition = %subscription.condition,
                "subscription revoked"
            );
        }
        _ => {
            warn!(stage = "ingress", %message_id, "revocation payload missing subscription block");
        }
    }
}

async fn dispatch_notification(
    state: &AppState,
    message_id: &str,
    notification: &Value,
) -> Response {
    let Some(kind_raw) = notification
        .pointer("/subscription/type")
        .and_then(Value::as_str)
    else {
        warn!(stage = "ingress", %message_id, payload = %notification, "subscription type not available");
        return diagnostic(NO_SUBSCRIPTION_TYPE);
    };

    let kind = match kind_raw.parse::<SubscriptionType>() {
        Ok(kind) => kind,
        Err(_) => {
            // Extension point for further event types; unhandled ones are
            // surfaced with their raw event so they show up in logs.
            info!(
                stage = "ingress",
                %message_id,
                subscription_type = kind_raw,
                event = %notification.get("event").cloned().unwrap_or(serde_json::Value::Null),
                "ignoring unhandled subscription type"
            );
            return no_content();
        }
    };

    match kind {
        SubscriptionType::UnbanRequestCreate => handle_create(state, message_id, notification).await,
        SubscriptionType::UnbanRequestResolve => {
            handle_resolve(state, message_id, notification).await
        }
    }
}

async fn handle_create(state: &AppState, message_id: &str, notification: &Value) -> Response {
    let event: UnbanRequestCreated = match deserialize_event(message_id, notification) {
        Ok(event) => event,
        Err(response) => return response,
    };

    let rules = state
        .directory()
        .rules_for(&event.broadcaster_user_id, SubscriptionType::UnbanRequestCreate);
    if rules.is_empty() {
        return diagnostic(NOT_CONFIGURED);
    }

    for rule in rules {
        let payload = format::unban_request_created(&event, rule);
        deliver(state, message_id, rule, &payload).await;
    }

    no_content()
}

async fn handle_resolve(state: &AppState, message_id: &str, notification: &Value) -> Response {
    let event: UnbanRequestResolved = match deserialize_event(message_id, notification) {
        Ok(event) => event,
        Err(response) => return response,
    };

    let rules = state
        .directory()
        .rules_for(&event.broadcaster_user_id, SubscriptionType::UnbanRequestResolve);
    if rules.is_empty() {
        return diagnostic(NOT_CONFIGURED);
    }

    // A resolution without a status carries nothing to report.
    let Some(status) = event.status.as_deref() else {
        return no_content();
    };

    for rule in rules {
        let payload = format::unban_request_resolved(&event, status, rule);
        deliver(state, message_id, rule, &payload).await;
    }

    no_content()
}

fn deserialize_event<T>(message_id: &str, notification: &Value) -> Result<T, Response>
where
    T: serde::de::DeserializeOwned,
{
    let Some(event) = notification.get("event") else {
        warn!(stage = "ingress", %message_id, "notification payload without event object");
        return Err(diagnostic(NO_EVENT));
    };

    serde_json::from_value(event.clone()).map_err(|err| {
        warn!(stage = "ingress", %message_id, error = %err, "event payload failed to deserialize");
        diagnostic(NO_EVENT)
    })
}

/// One outbound POST. Failures are logged and counted; they never affect
/// the inbound response or the remaining deliveries.
async fn deliver(state: &AppState, message_id: &str, rule: &EventRule, payload: &DiscordPayload) {
    match state
        .discord()
        .execute(payload, &rule.webhook, rule.thread_id.as_deref())
        .await
    {
        Ok(response_text) => {
            counter!("discord_delivery_total", "result" => "ok").increment(1);
            info!(stage = "discord", %message_id, response = %response_text, "delivered payload");
        }
        Err(err) => {
            counter!("discord_delivery_total", "result" => "error").increment(1);
            error!(stage = "discord", %message_id, error = %err, "delivery failed");
        }
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

fn message_type_label(headers: &HeaderMap) -> &'static str {
    header_str(headers, HEADER_MESSAGE_TYPE)
        .and_then(|raw| MessageType::try_from(raw).ok())
        .map(MessageType::metric_label)
        .unwrap_or("unknown")
}

fn forbidden() -> Response {
    (StatusCode::FORBIDDEN, "Forbidden").into_response()
}

fn diagnostic(text: &'static str) -> Response {
    (StatusCode::OK, text).into_response()
}

fn no_content() -> Response {
    StatusCode::NO_CONTENT.into_response()
}

fn verify_signature(
    secret: &[u8],
    message_id: &str,
    timestamp: &str,
    body: &[u8],
    provided: &str,
) -> Result<(), String> {
    let hex_part = provided
        .strip_prefix("sha256=")
        .ok_or_else(|| "signature must start with 'sha256='".to_string())?;
    let provided_bytes =
        hex::decode(hex_part).map_err(|_| "signature is not valid hex".to_string())?;

    let mut mac = Hmac::<Sha256>::new_from_slice(secret)
        .map_err(|_| "failed to initialize signature verifier".to_string())?;
    mac.update(message_id.as_bytes());
    mac.update(timestamp.as_bytes());
    mac.update(body);
    let expected = mac.finalize().into_bytes();
    let expected_bytes: &[u8] = expected.as_ref();

    if expected_bytes.ct_eq(provided_bytes.as_slice()).into() {
        Ok(())
    } else {
        Err("signature mismatch".to_string())
    }
}
