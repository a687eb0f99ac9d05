//! Gmail API response normalization
//!
//! Converts Gmail API messages to domain [`Message`]s. Body selection is
//! deliberately shallow: a part-less payload decodes its own body, otherwise
//! the first direct `text/plain` sub-part wins. HTML-only mail has an empty
//! plain-text body.

use base64::prelude::*;
use chrono::{DateTime, TimeZone, Utc};
use log::debug;

use super::api::{GmailMessage, MessagePart};
use crate::error::{Error, Result};
use crate::models::{EmailAddress, Message, MessageId, ThreadId};

/// Normalize a Gmail API message into a [`Message`]
pub fn normalize_message(gmail_msg: GmailMessage) -> Result<Message> {
    let payload = gmail_msg.payload.unwrap_or_default();

    let body_text = select_plain_text(&payload)
        .map(decode_body_data)
        .transpose()
        .map_err(|reason| Error::Decode {
            id: gmail_msg.id.clone(),
            reason,
        })?
        .unwrap_or_default();

    let body_html =
        select_part(&payload, "text/html").and_then(|data| match decode_body_data(data) {
            Ok(html) => Some(html),
            Err(reason) => {
                debug!("Dropping undecodable HTML body of {}: {}", gmail_msg.id, reason);
                None
            }
        });

    // internalDate is milliseconds since epoch
    let received_at = gmail_msg
        .internal_date
        .as_deref()
        .and_then(|d| d.parse::<i64>().ok())
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
        .or_else(|| {
            extract_header(&payload, "Date")
                .and_then(|date| DateTime::parse_from_rfc2822(date.trim()).ok())
                .map(|date| date.with_timezone(&Utc))
        });
    if received_at.is_none() {
        debug!("No usable receive time for {}", gmail_msg.id);
    }

    Ok(Message::builder(MessageId::new(gmail_msg.id), ThreadId::new(gmail_msg.thread_id))
        .subject(extract_header(&payload, "Subject").unwrap_or_default())
        .from(extract_header(&payload, "From").map(|s| EmailAddress::parse(&s)))
        .to(extract_header(&payload, "To")
            .map(|s| EmailAddress::parse_list(&s))
            .unwrap_or_default())
        .received_at(received_at)
        .body_text(body_text)
        .body_html(body_html)
        .build())
}

/// Raw (still encoded) plain-text body data, per the selection rule
///
/// Returns `None` when a multipart message has no `text/plain` sub-part.
pub fn select_plain_text(payload: &MessagePart) -> Option<&str> {
    match &payload.parts {
        None => Some(body_data(payload)),
        Some(_) => select_part(payload, "text/plain"),
    }
}

/// First direct sub-part with the given MIME type
fn select_part<'a>(payload: &'a MessagePart, mime_type: &str) -> Option<&'a str> {
    match &payload.parts {
        None => (payload.mime_type.as_deref() == Some(mime_type)).then(|| body_data(payload)),
        Some(parts) => parts
            .iter()
            .find(|part| part.mime_type.as_deref() == Some(mime_type))
            .map(body_data),
    }
}

fn body_data(part: &MessagePart) -> &str {
    part.body
        .as_ref()
        .and_then(|b| b.data.as_deref())
        .unwrap_or_default()
}

/// Decode base64url body data (padded or not) to text
pub fn decode_body_data(data: &str) -> std::result::Result<String, String> {
    let bytes = BASE64_URL_SAFE_NO_PAD
        .decode(data.trim_end_matches('='))
        .map_err(|e| format!("invalid base64url body: {}", e))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Extract a header value by name
fn extract_header(payload: &MessagePart, name: &str) -> Option<String> {
    payload
        .headers
        .as_ref()?
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case(name))
        .map(|h| h.value.clone())
}
