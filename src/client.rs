use std::io::{Read, Write};
use std::net::TcpStream;

use bufstream::BufStream;
use chrono::{DateTime, FixedOffset};
use log::trace;
use native_tls::{TlsConnector, TlsStream};

use super::error::{Error, ParseError, Result, ValidateError};
use super::parse::{parse_fetches, parse_ids, parse_mailbox, parse_names, parse_status};
use super::types::*;
use super::utils::iter_join;

static TAG_PREFIX: &str = "a";
const INITIAL_TAG: u32 = 0;
const CR: u8 = 0x0d;
const LF: u8 = 0x0a;

macro_rules! quote {
    ($x: expr) => {
        format!("\"{}\"", $x.replace('\\', "\\\\").replace('"', "\\\""))
    };
}

fn validate_str(value: &str) -> Result<String> {
    let quoted = quote!(value);
    if quoted.contains('\n') {
        return Err(Error::Validate(ValidateError('\n')));
    }
    if quoted.contains('\r') {
        return Err(Error::Validate(ValidateError('\r')));
    }
    Ok(quoted)
}

/// A blocking connection to an IMAP server, speaking the command stream.
///
/// The type is generic over the transport so that the protocol logic can be exercised against an
/// in-memory stream in tests; production use goes through [`Client::connect`].
#[derive(Debug)]
pub struct Client<T: Read + Write> {
    pub(crate) stream: BufStream<T>,
    tag: u32,
}

impl Client<TlsStream<TcpStream>> {
    /// Open a TLS connection to the given server and consume its greeting.
    pub fn connect(domain: &str, port: u16) -> Result<Self> {
        let tcp = TcpStream::connect((domain, port))?;
        let tls = TlsConnector::builder().build()?;
        let stream = TlsConnector::connect(&tls, domain, tcp)?;
        let mut client = Client::new(stream);
        client.read_greeting()?;
        Ok(client)
    }
}

impl<T: Read + Write> Client<T> {
    /// Creates a new client over the underlying stream.
    pub fn new(stream: T) -> Client<T> {
        Client {
            stream: BufStream::new(stream),
            tag: INITIAL_TAG,
        }
    }

    /// Log in to the IMAP server.
    pub fn login(&mut self, username: &str, password: &str) -> Result<()> {
        self.run_command_and_check_ok(&format!(
            "LOGIN {} {}",
            validate_str(username)?,
            validate_str(password)?
        ))
    }

    /// List every name the server exposes to this account.
    pub fn list(&mut self) -> Result<Vec<Name>> {
        self.run_command_and_read_response("LIST \"\" \"*\"")
            .and_then(|lines| parse_names(&lines))
    }

    /// Ask for the UIDNEXT and UIDVALIDITY of a mailbox without selecting it.
    pub fn status(&mut self, mailbox_name: &str) -> Result<FolderStatus> {
        self.run_command_and_read_response(&format!(
            "STATUS {} (UIDNEXT UIDVALIDITY)",
            validate_str(mailbox_name)?
        ))
        .and_then(|lines| parse_status(&lines, mailbox_name))
    }

    /// Select a mailbox for read-write access.
    pub fn select(&mut self, mailbox_name: &str) -> Result<Mailbox> {
        self.run_command_and_read_response(&format!("SELECT {}", validate_str(mailbox_name)?))
            .and_then(|lines| parse_mailbox(&lines))
    }

    /// Identical to [`Client::select`], except the mailbox is opened read-only.
    pub fn examine(&mut self, mailbox_name: &str) -> Result<Mailbox> {
        self.run_command_and_read_response(&format!("EXAMINE {}", validate_str(mailbox_name)?))
            .and_then(|lines| parse_mailbox(&lines))
    }

    /// Run `UID SEARCH` with the given query, returning matching UIDs in ascending order.
    pub fn uid_search(&mut self, query: &str) -> Result<Vec<Uid>> {
        self.run_command_and_read_response(&format!("UID SEARCH {}", query))
            .and_then(|lines| parse_ids(&lines))
    }

    /// Retrieve data for the messages in `uid_set`.
    pub fn uid_fetch(&mut self, uid_set: &str, query: &str) -> Result<Vec<Fetch>> {
        self.run_command_and_read_response(&format!("UID FETCH {} {}", uid_set, query))
            .and_then(|lines| parse_fetches(&lines))
    }

    /// Move the messages in `uid_set` to another mailbox.
    ///
    /// This uses `UID MOVE` ([RFC 6851](https://tools.ietf.org/html/rfc6851)), which every server
    /// this tool targets advertises.
    pub fn uid_mv(&mut self, uid_set: &str, mailbox_name: &str) -> Result<()> {
        self.run_command_and_check_ok(&format!(
            "UID MOVE {} {}",
            uid_set,
            validate_str(mailbox_name)?
        ))
    }

    /// Append a message to a mailbox, optionally with flags and an explicit `INTERNALDATE`.
    pub fn append(
        &mut self,
        mailbox_name: &str,
        flags: &[Flag],
        internal_date: Option<&DateTime<FixedOffset>>,
        content: &[u8],
    ) -> Result<()> {
        let mut command = format!("APPEND {}", validate_str(mailbox_name)?);
        if !flags.is_empty() {
            command.push_str(&format!(" ({})", iter_join(flags, " ")));
        }
        if let Some(date) = internal_date {
            command.push_str(&format!(" \"{}\"", date.format("%d-%b-%Y %H:%M:%S %z")));
        }
        command.push_str(&format!(" {{{}}}", content.len()));

        self.run_command(&command)?;
        let mut v = Vec::new();
        self.readline(&mut v)?;
        if !v.starts_with(b"+") {
            return Err(Error::Append);
        }
        self.stream.write_all(content)?;
        self.stream.write_all(b"\r\n")?;
        self.stream.flush()?;
        self.read_response().map(|_| ())
    }

    /// Close the currently selected mailbox, returning to the authenticated state.
    pub fn close(&mut self) -> Result<()> {
        self.run_command_and_check_ok("CLOSE")
    }

    /// Inform the server that the client is done with the connection.
    pub fn logout(&mut self) -> Result<()> {
        self.run_command_and_check_ok("LOGOUT")
    }

    fn run_command_and_check_ok(&mut self, command: &str) -> Result<()> {
        self.run_command_and_read_response(command).map(|_| ())
    }

    fn run_command(&mut self, untagged_command: &str) -> Result<()> {
        let command = self.create_command(untagged_command);
        self.write_line(command.as_bytes())
    }

    fn run_command_and_read_response(&mut self, untagged_command: &str) -> Result<Vec<u8>> {
        self.run_command(untagged_command)?;
        self.read_response()
    }

    fn read_response(&mut self) -> Result<Vec<u8>> {
        let mut v = Vec::new();
        self.read_response_onto(&mut v)?;
        Ok(v)
    }

    /// Accumulate lines until the tagged completion of the current command arrives, leaving the
    /// untagged payload in `data`.
    ///
    /// A line that parses as `Incomplete` is a response with an unfinished literal; the next
    /// readline appends to it and the parse is retried from the same offset.
    fn read_response_onto(&mut self, data: &mut Vec<u8>) -> Result<()> {
        let mut continue_from = None;
        let mut try_first = !data.is_empty();
        let match_tag = format!("{}{}", TAG_PREFIX, self.tag);
        loop {
            let line_start = if try_first {
                try_first = false;
                0
            } else {
                let start_new = data.len();
                self.readline(data)?;
                continue_from.take().unwrap_or(start_new)
            };

            let break_with = {
                use imap_proto::{Response, Status};
                let line = &data[line_start..];

                match imap_proto::parser::parse_response(line) {
                    Ok((
                        _,
                        Response::Done {
                            tag,
                            status,
                            information,
                            ..
                        },
                    )) => {
                        if tag.as_bytes() != match_tag.as_bytes() {
                            Some(Err((
                                Status::Bad,
                                Some(format!(
                                    "got response for unexpected tag {}",
                                    String::from_utf8_lossy(tag.as_bytes())
                                )),
                            )))
                        } else {
                            Some(match status {
                                Status::Bad | Status::No => {
                                    Err((status, information.map(|s| s.to_string())))
                                }
                                Status::Ok => Ok(()),
                                status => Err((status, None)),
                            })
                        }
                    }
                    Ok(..) => None,
                    Err(nom::Err::Incomplete(..)) => {
                        continue_from = Some(line_start);
                        None
                    }
                    Err(_) => Some(Err((Status::Bye, None))),
                }
            };

            match break_with {
                Some(Ok(())) => {
                    data.truncate(line_start);
                    break Ok(());
                }
                Some(Err((status, expl))) => {
                    use imap_proto::Status;
                    let expl = expl.unwrap_or_else(|| "no explanation given".to_string());
                    break match status {
                        Status::Bad => Err(Error::Bad(expl)),
                        Status::No => Err(Error::No(expl)),
                        _ => Err(Error::Parse(ParseError::Invalid(data.split_off(0)))),
                    };
                }
                None => {}
            }
        }
    }

    fn read_greeting(&mut self) -> Result<()> {
        let mut v = Vec::new();
        self.readline(&mut v)?;
        Ok(())
    }

    fn readline(&mut self, into: &mut Vec<u8>) -> Result<usize> {
        use std::io::BufRead;
        let read = self.stream.read_until(LF, into)?;
        if read == 0 {
            return Err(Error::ConnectionLost);
        }

        trace!("S: {}", String::from_utf8_lossy(&into[into.len() - read..]));
        Ok(read)
    }

    fn create_command(&mut self, command: &str) -> String {
        self.tag += 1;
        format!("{}{} {}", TAG_PREFIX, self.tag, command)
    }

    fn write_line(&mut self, buf: &[u8]) -> Result<()> {
        self.stream.write_all(buf)?;
        self.stream.write_all(&[CR, LF])?;
        self.stream.flush()?;
        trace!("C: {}", String::from_utf8_lossy(buf));
        Ok(())
    }
}
