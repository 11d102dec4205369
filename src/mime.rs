//! MIME structure of mirrored messages: finding attachments, addressing them by positional
//! path, and splicing their payloads out of the raw bytes.

use chrono::{DateTime, FixedOffset};
use mail_parser::{MessageParser, MimeHeaders, PartType};

use crate::error::{Error, Result};

/// The `date-time` grammar of RFC 5322. Messages whose `Date` header deviates from it are left
/// untouched rather than re-uploaded with a guessed timestamp.
const DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S %z";

/// Extensions that mark a nameless-typed part as a photo in disguise.
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "gif", "png", "bmp"];

/// A parsed message, reduced to the shape the reconciliation logic needs.
pub struct Message {
    root: Part,
    date_raw: Option<String>,
    from_raw: Option<String>,
    subject_raw: Option<String>,
}

/// One node of the MIME tree.
///
/// An attached `message/rfc822` is deliberately an opaque [`Leaf`]: its positional path
/// addresses the whole attached message, and its inner structure is never walked.
pub enum Part {
    Leaf(Leaf),
    Multipart(Vec<Part>),
}

/// A terminal MIME part.
pub struct Leaf {
    /// `type/subtype`, lowercased. Defaults to `text/plain` when the part does not say.
    pub content_type: String,
    /// The part's file name, from either disposition or content-type parameters.
    pub filename: Option<String>,
    /// The decoded payload.
    pub contents: Vec<u8>,
    /// Span of the encoded payload within the raw message.
    body: (usize, usize),
    attachment_disposition: bool,
}

impl Leaf {
    /// The `type` half of the content type.
    pub fn main_type(&self) -> &str {
        self.content_type
            .split_once('/')
            .map(|(t, _)| t)
            .unwrap_or(&self.content_type)
    }

    /// A part is an attachment if it is declared as one, or if it carries a file name. Mailers
    /// disagree on which of the two signals to send, so either counts.
    pub fn is_attachment(&self) -> bool {
        self.attachment_disposition || self.filename.is_some()
    }

    /// Whether this part is a picture that a photo-heavy thread embeds inline.
    ///
    /// The declared content type wins, but plenty of mailers ship photos as
    /// `application/octet-stream`, so the file extension is consulted as a fallback.
    pub fn is_inline_image(&self) -> bool {
        if self.main_type().eq_ignore_ascii_case("image") {
            return true;
        }
        match &self.filename {
            Some(name) => match name.rsplit_once('.') {
                Some((_, ext)) => IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()),
                None => false,
            },
            None => false,
        }
    }
}

fn build(msg: &mail_parser::Message<'_>, id: usize) -> Option<Part> {
    let part = msg.part(id)?;
    match &part.body {
        PartType::Multipart(children) => {
            let children = children
                .iter()
                .filter_map(|child| build(msg, *child))
                .collect();
            Some(Part::Multipart(children))
        }
        _ => {
            let content_type = part
                .content_type()
                .map(|ct| match ct.subtype() {
                    Some(sub) => format!("{}/{}", ct.ctype(), sub).to_lowercase(),
                    None => ct.ctype().to_lowercase(),
                })
                .unwrap_or_else(|| "text/plain".to_string());
            let attachment_disposition = part
                .content_disposition()
                .map(|cd| cd.is_attachment())
                .unwrap_or(false);
            Some(Part::Leaf(Leaf {
                content_type,
                filename: part.attachment_name().map(str::to_string),
                contents: part.contents().to_vec(),
                body: (part.offset_body, part.offset_end),
                attachment_disposition,
            }))
        }
    }
}

fn raw_header(msg: &mail_parser::Message<'_>, raw: &[u8], name: &str) -> Option<String> {
    msg.root_part().headers.iter().find_map(|h| {
        if !h.name.as_str().eq_ignore_ascii_case(name) {
            return None;
        }
        let value = raw.get(h.offset_start..h.offset_end)?;
        Some(String::from_utf8_lossy(value).trim().to_string())
    })
}

impl Message {
    /// Parse raw message bytes.
    pub fn parse(raw: &[u8]) -> Result<Message> {
        let msg = MessageParser::new()
            .parse(raw)
            .ok_or_else(|| Error::MalformedMime("not parseable as a message".to_string()))?;
        let root = build(&msg, 0)
            .ok_or_else(|| Error::MalformedMime("message has no parts".to_string()))?;
        Ok(Message {
            root,
            date_raw: raw_header(&msg, raw, "Date"),
            from_raw: raw_header(&msg, raw, "From"),
            subject_raw: raw_header(&msg, raw, "Subject"),
        })
    }

    /// The raw `Date` header, for display.
    pub fn date_header(&self) -> Option<&str> {
        self.date_raw.as_deref()
    }

    /// The raw `From` header, for display.
    pub fn from_header(&self) -> Option<&str> {
        self.from_raw.as_deref()
    }

    /// The raw `Subject` header, for display.
    pub fn subject_header(&self) -> Option<&str> {
        self.subject_raw.as_deref()
    }

    /// All attachment parts in document order, each with its positional path.
    ///
    /// Paths are 1-based indices into each multipart level, joined with dots (`2.3` is the third
    /// child of the second child of the root). A non-multipart message is its own single part at
    /// path `1`. Paths are stable across reparses of identical bytes, and are purely local
    /// addressing; they make no claim of validity against IMAP part numbering.
    pub fn attachments(&self) -> Vec<(String, &Leaf)> {
        let mut found = Vec::new();
        match &self.root {
            Part::Leaf(leaf) => {
                if leaf.is_attachment() {
                    found.push(("1".to_string(), leaf));
                }
            }
            Part::Multipart(children) => walk(children, "", &mut found),
        }
        found
    }

    /// The message's `Date` header parsed against the exact RFC 5322 grammar.
    pub fn date(&self) -> Result<DateTime<FixedOffset>> {
        let raw = self
            .date_raw
            .as_deref()
            .ok_or_else(|| Error::BadDateHeader("no Date header".to_string()))?;
        DateTime::parse_from_str(raw, DATE_FORMAT)
            .map_err(|e| Error::BadDateHeader(format!("{:?}: {}", raw, e)))
    }

    /// Copy `raw` with every attachment's encoded payload removed.
    ///
    /// Headers survive, so receivers still see the attachment's name and type; only the payload
    /// is gone. Bytes outside attachment payloads are preserved exactly.
    pub fn strip(&self, raw: &[u8]) -> Vec<u8> {
        let mut spans: Vec<(usize, usize)> = self
            .attachments()
            .iter()
            .map(|(_, leaf)| leaf.body)
            .collect();
        spans.sort_unstable();

        let mut out = Vec::with_capacity(raw.len());
        let mut at = 0;
        for (start, end) in spans {
            if start < at {
                continue;
            }
            out.extend_from_slice(&raw[at..start.min(raw.len())]);
            at = end.min(raw.len());
        }
        out.extend_from_slice(&raw[at..]);
        out
    }
}

fn walk<'a>(children: &'a [Part], prefix: &str, found: &mut Vec<(String, &'a Leaf)>) {
    for (i, part) in children.iter().enumerate() {
        let path = if prefix.is_empty() {
            format!("{}", i + 1)
        } else {
            format!("{}.{}", prefix, i + 1)
        };
        match part {
            Part::Leaf(leaf) => {
                if leaf.is_attachment() {
                    found.push((path, leaf));
                }
            }
            Part::Multipart(grandchildren) => walk(grandchildren, &path, found),
        }
    }
}
