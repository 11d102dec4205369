use imap_proto::{MailboxDatum, Response, StatusAttribute};
use log::{debug, warn};

use super::error::{Error, ParseError, Result};
use super::types::*;

/// Split off the first CRLF-terminated line, for resynchronizing after a response the parser
/// cannot digest.
fn split_line(data: &[u8]) -> (&[u8], &[u8]) {
    match data.iter().position(|&b| b == b'\n') {
        Some(i) => (&data[..=i], &data[i + 1..]),
        None => (data, &[]),
    }
}

/// Parse the untagged lines of a `LIST` response.
///
/// Servers in the wild emit listing lines this parser does not understand (unencoded 8-bit
/// names, vendor extensions). One mangled line must not sink the whole listing, so such lines
/// are logged and skipped rather than failing the command.
pub fn parse_names(mut lines: &[u8]) -> Result<Vec<Name>> {
    let mut names = Vec::new();
    loop {
        if lines.is_empty() {
            break Ok(names);
        }

        match imap_proto::parser::parse_response(lines) {
            Ok((
                rest,
                Response::MailboxData(MailboxDatum::List {
                    name_attributes,
                    delimiter,
                    name,
                }),
            )) => {
                lines = rest;
                names.push(Name {
                    attributes: name_attributes
                        .into_iter()
                        .map(NameAttribute::from)
                        .collect(),
                    delimiter: delimiter.map(|d| d.to_string()),
                    name: name.to_string(),
                });
            }
            Ok((rest, resp)) => {
                lines = rest;
                debug!("ignoring response while listing: {:?}", resp);
            }
            Err(_) => {
                let (bad, rest) = split_line(lines);
                warn!(
                    "skipping unparseable listing line: {:?}",
                    String::from_utf8_lossy(bad)
                );
                lines = rest;
            }
        }
    }
}

/// Parse the reply to `STATUS <mailbox> (UIDNEXT UIDVALIDITY)`.
///
/// Both attributes are required; a server that withholds either leaves us unable to decide
/// whether the folder needs syncing at all.
pub fn parse_status(mut lines: &[u8], mailbox_name: &str) -> Result<FolderStatus> {
    let mut uid_next = None;
    let mut uid_validity = None;
    while !lines.is_empty() {
        match imap_proto::parser::parse_response(lines) {
            Ok((rest, Response::MailboxData(MailboxDatum::Status { status, .. }))) => {
                lines = rest;
                for attr in status {
                    match attr {
                        StatusAttribute::UidNext(n) => uid_next = Some(n),
                        StatusAttribute::UidValidity(v) => uid_validity = Some(v),
                        _ => {}
                    }
                }
            }
            Ok((rest, resp)) => {
                lines = rest;
                debug!("ignoring response during STATUS: {:?}", resp);
            }
            Err(_) => {
                return Err(Error::Parse(ParseError::Invalid(lines.to_vec())));
            }
        }
    }
    match (uid_next, uid_validity) {
        (Some(uid_next), Some(uid_validity)) => Ok(FolderStatus {
            uid_next,
            uid_validity,
        }),
        _ => Err(Error::MissingStatus(mailbox_name.to_string())),
    }
}

/// Parse the untagged lines of a `SELECT` or `EXAMINE` response.
pub fn parse_mailbox(mut lines: &[u8]) -> Result<Mailbox> {
    let mut mailbox = Mailbox::default();

    while !lines.is_empty() {
        match imap_proto::parser::parse_response(lines) {
            Ok((rest, Response::Data { code, .. })) => {
                lines = rest;

                use imap_proto::ResponseCode;
                match code {
                    Some(ResponseCode::UidValidity(v)) => {
                        mailbox.uid_validity = Some(v);
                    }
                    Some(ResponseCode::UidNext(n)) => {
                        mailbox.uid_next = Some(n);
                    }
                    _ => {}
                }
            }
            Ok((rest, Response::MailboxData(m))) => {
                lines = rest;

                match m {
                    MailboxDatum::Exists(e) => {
                        mailbox.exists = e;
                    }
                    MailboxDatum::Recent(r) => {
                        mailbox.recent = r;
                    }
                    MailboxDatum::Flags(flags) => {
                        mailbox
                            .flags
                            .extend(flags.iter().map(|f| Flag::from(f.to_string())));
                    }
                    m => {
                        debug!("ignoring mailbox data during selection: {:?}", m);
                    }
                }
            }
            Ok((rest, resp)) => {
                lines = rest;
                debug!("ignoring response during selection: {:?}", resp);
            }
            Err(_) => {
                return Err(Error::Parse(ParseError::Invalid(lines.to_vec())));
            }
        }
    }
    Ok(mailbox)
}

/// Parse a `SEARCH` reply into an ascending, de-duplicated list of ids.
pub fn parse_ids(mut lines: &[u8]) -> Result<Vec<u32>> {
    let mut ids = Vec::new();
    loop {
        if lines.is_empty() {
            ids.sort_unstable();
            ids.dedup();
            break Ok(ids);
        }

        match imap_proto::parser::parse_response(lines) {
            Ok((rest, Response::MailboxData(MailboxDatum::Search(c)))) => {
                lines = rest;
                ids.extend(c);
            }
            Ok((rest, resp)) => {
                lines = rest;
                debug!("ignoring response during search: {:?}", resp);
            }
            Err(_) => {
                break Err(Error::Parse(ParseError::Invalid(lines.to_vec())));
            }
        }
    }
}

/// Parse the untagged lines of a `FETCH` reply.
pub fn parse_fetches(mut lines: &[u8]) -> Result<Vec<Fetch>> {
    let mut fetches = Vec::new();
    loop {
        if lines.is_empty() {
            break Ok(fetches);
        }

        match imap_proto::parser::parse_response(lines) {
            Ok((rest, Response::Fetch(num, attrs))) => {
                lines = rest;

                let mut fetch = Fetch {
                    message: num,
                    ..Fetch::default()
                };
                for attr in attrs {
                    use imap_proto::AttributeValue;
                    match attr {
                        AttributeValue::Uid(uid) => fetch.uid = Some(uid),
                        AttributeValue::Rfc822Size(sz) => fetch.size = Some(sz),
                        AttributeValue::Flags(flags) => {
                            fetch
                                .flags
                                .extend(flags.iter().map(|f| Flag::from(f.to_string())));
                        }
                        AttributeValue::Rfc822(Some(body)) => {
                            fetch.rfc822 = Some(body.to_vec());
                        }
                        _ => {}
                    }
                }
                fetches.push(fetch);
            }
            Ok((rest, resp)) => {
                lines = rest;
                debug!("ignoring response during fetch: {:?}", resp);
            }
            Err(_) => {
                break Err(Error::Parse(ParseError::Invalid(lines.to_vec())));
            }
        }
    }
}
