// Copyright © 2025 the MailStash authors
// Licensed under the MIT License

pub mod graph;
pub mod imap;

pub const NO_SUBJECT: &str = "(No Subject)";

/// Structural attachment handed to the blob uploader; never blocks message
/// persistence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedAttachment {
    pub filename: String,
    pub content_type: String,
    pub size: usize,
    pub content_id: Option<String>,
    pub bytes: Vec<u8>,
}

/// Canonical message record produced by both adapters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedMail {
    pub message_id: Option<String>,
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub body: String,
    pub html_body: Option<String>,
    pub is_read: bool,
    pub received_at: i64,
    pub attachments: Vec<ParsedAttachment>,
}

/// Strips tags from an HTML body and collapses runs of whitespace, leaving a
/// plain-text rendition suitable for the mirror and the FTS index.
pub fn strip_html(html: &str) -> String {
    let mut text = String::with_capacity(html.len());
    let mut in_tag = false;
    let mut chars = html.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '<' => {
                in_tag = true;
                // block-level closers read better as separators
                text.push(' ');
            }
            '>' if in_tag => in_tag = false,
            _ if in_tag => {}
            '&' => {
                let mut entity = String::new();
                while let Some(&next) = chars.peek() {
                    if next == ';' || entity.len() > 8 {
                        break;
                    }
                    entity.push(next);
                    chars.next();
                }
                if chars.peek() == Some(&';') {
                    chars.next();
                }
                text.push_str(decode_entity(&entity));
            }
            _ => text.push(c),
        }
    }
    collapse_whitespace(&text)
}

fn decode_entity(entity: &str) -> &'static str {
    match entity {
        "amp" => "&",
        "lt" => "<",
        "gt" => ">",
        "quot" => "\"",
        "apos" | "#39" => "'",
        "nbsp" => " ",
        _ => " ",
    }
}

pub fn collapse_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// HTML rendition for a plain-text-only message.
pub fn wrap_plaintext(text: &str) -> String {
    format!("<div>{}</div>", text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_html_removes_tags_and_collapses_whitespace() {
        let html = "<html><body><p>Hello   <b>world</b></p>\n<p>bye</p></body></html>";
        assert_eq!(strip_html(html), "Hello world bye");
    }

    #[test]
    fn strip_html_decodes_common_entities() {
        assert_eq!(strip_html("a &amp; b &lt;c&gt;"), "a & b <c>");
    }

    #[test]
    fn strip_html_on_plain_text_is_identity_modulo_whitespace() {
        assert_eq!(strip_html("just  text"), "just text");
    }

    #[test]
    fn wrap_plaintext_produces_div() {
        assert_eq!(wrap_plaintext("hi"), "<div>hi</div>");
    }
}
