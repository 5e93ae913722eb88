// Copyright © 2025 the MailStash authors
// Licensed under the MIT License

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::DateTime;

use crate::modules::common::Addr;
use crate::modules::graph::model::{GraphMessage, Recipient};
use crate::modules::parser::{
    strip_html, wrap_plaintext, ParsedAttachment, ParsedMail, NO_SUBJECT,
};
use crate::utc_now;

fn recipient_addr(recipient: &Recipient) -> Addr {
    Addr {
        name: recipient.email_address.name.clone(),
        address: recipient.email_address.address.clone(),
    }
}

/// Converts a Graph message payload into the canonical record. Graph never
/// hands back raw RFC 5322, so everything derives from the JSON model.
pub fn parse_graph_message(message: &GraphMessage) -> ParsedMail {
    let from = message
        .from
        .as_ref()
        .or(message.sender.as_ref())
        .map(|recipient| recipient_addr(recipient).render())
        .unwrap_or_default();

    let to: Vec<String> = message
        .to_recipients
        .as_deref()
        .unwrap_or_default()
        .iter()
        .map(recipient_addr)
        .filter(|addr| addr.address.as_deref().is_some_and(|a| !a.is_empty()))
        .map(|addr| addr.render())
        .collect();

    let subject = message
        .subject
        .clone()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| NO_SUBJECT.into());

    let (body, html_body) = match &message.body {
        Some(item) if item.content_type.eq_ignore_ascii_case("html") => {
            (strip_html(&item.content), Some(item.content.clone()))
        }
        Some(item) => {
            let html = wrap_plaintext(&item.content);
            (item.content.clone(), Some(html))
        }
        None => (
            message.body_preview.clone().unwrap_or_default(),
            None,
        ),
    };

    let received_at = message
        .received_date_time
        .as_deref()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.timestamp_millis())
        .unwrap_or_else(|| utc_now!());

    let attachments = message
        .attachments
        .as_deref()
        .unwrap_or_default()
        .iter()
        .filter_map(|attachment| {
            let bytes = attachment
                .content_bytes
                .as_deref()
                .and_then(|b64| STANDARD.decode(b64).ok())?;
            Some(ParsedAttachment {
                filename: attachment.name.clone(),
                content_type: attachment
                    .content_type
                    .clone()
                    .unwrap_or_else(|| "application/octet-stream".into()),
                size: attachment.size.map(|s| s as usize).unwrap_or(bytes.len()),
                content_id: attachment.content_id.clone(),
                bytes,
            })
        })
        .collect();

    ParsedMail {
        message_id: message
            .internet_message_id
            .clone()
            .or_else(|| Some(message.id.clone())),
        from,
        to,
        subject,
        body,
        html_body,
        is_read: message.is_read.unwrap_or(false),
        received_at,
        attachments,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::graph::model::{GraphEmailAddress, ItemBody};

    fn recipient(name: Option<&str>, address: Option<&str>) -> Recipient {
        Recipient {
            email_address: GraphEmailAddress {
                name: name.map(String::from),
                address: address.map(String::from),
            },
        }
    }

    #[test]
    fn html_body_is_stripped_for_plain_text() {
        let message = GraphMessage {
            id: "m1".into(),
            internet_message_id: Some("<x@example.com>".into()),
            subject: Some("Hi".into()),
            is_read: Some(true),
            received_date_time: Some("2025-07-01T10:00:00Z".into()),
            body: Some(ItemBody {
                content_type: "html".into(),
                content: "<p>Hello <b>you</b></p>".into(),
            }),
            from: Some(recipient(Some("John"), Some("john@example.com"))),
            to_recipients: Some(vec![
                recipient(None, Some("jane@example.com")),
                recipient(Some("ghost"), None),
            ]),
            ..Default::default()
        };
        let parsed = parse_graph_message(&message);
        assert_eq!(parsed.body, "Hello you");
        assert_eq!(parsed.html_body.as_deref(), Some("<p>Hello <b>you</b></p>"));
        assert_eq!(parsed.from, "\"John\" <john@example.com>");
        assert_eq!(parsed.to, vec!["jane@example.com".to_string()]);
        assert!(parsed.is_read);
        assert_eq!(parsed.message_id.as_deref(), Some("<x@example.com>"));
    }

    #[test]
    fn plain_text_body_gets_div_wrapped_html() {
        let message = GraphMessage {
            id: "m2".into(),
            body: Some(ItemBody {
                content_type: "text".into(),
                content: "plain".into(),
            }),
            ..Default::default()
        };
        let parsed = parse_graph_message(&message);
        assert_eq!(parsed.body, "plain");
        assert_eq!(parsed.html_body.as_deref(), Some("<div>plain</div>"));
        assert_eq!(parsed.subject, NO_SUBJECT);
        // opaque Graph id is the message-id fallback
        assert_eq!(parsed.message_id.as_deref(), Some("m2"));
    }

    #[test]
    fn received_at_parses_rfc3339() {
        let message = GraphMessage {
            id: "m3".into(),
            received_date_time: Some("2025-07-01T10:00:00Z".into()),
            ..Default::default()
        };
        let parsed = parse_graph_message(&message);
        assert_eq!(parsed.received_at, 1751364000000);
    }
}
