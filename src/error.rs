use std::error::Error as StdError;
use std::fmt;
use std::io::Error as IoError;
use std::net::TcpStream;
use std::result;
use std::string::FromUtf8Error;

use bufstream::IntoInnerError as BufError;
use native_tls::Error as TlsError;
use native_tls::HandshakeError as TlsHandshakeError;

/// A convenience wrapper around `Result` for [`Error`].
pub type Result<T> = result::Result<T, Error>;

/// Everything that can go wrong while talking to the server or maintaining
/// the local mirror.
#[derive(Debug)]
pub enum Error {
    /// An `io::Error` that occurred while trying to read or write to a network stream or to a
    /// file in the mail directory.
    Io(IoError),
    /// An error from the `native_tls` library during the TLS handshake.
    TlsHandshake(TlsHandshakeError<TcpStream>),
    /// An error from the `native_tls` library while managing the socket.
    Tls(TlsError),
    /// A BAD response from the IMAP server.
    Bad(String),
    /// A NO response from the IMAP server.
    No(String),
    /// The connection was terminated unexpectedly.
    ConnectionLost,
    /// Error parsing a server response.
    Parse(ParseError),
    /// Command inputs were not valid IMAP strings.
    Validate(ValidateError),
    /// The server refused the continuation of an `APPEND` literal.
    Append,
    /// Error reading or writing a JSON metadata record.
    Json(serde_json::Error),
    /// A STATUS reply did not carry the attributes that were asked for.
    MissingStatus(String),
    /// The server reports a different UIDVALIDITY than the one recorded locally, so local UIDs no
    /// longer correspond to anything on the server. Resolving this (usually by moving the local
    /// folder directory aside) is left to a human.
    UidValidityChanged {
        /// Folder this was detected in.
        folder: String,
        /// The locally recorded UIDVALIDITY.
        stored: u32,
        /// What the server reports now.
        server: u32,
    },
    /// A message record already exists locally with different contents.
    DuplicateMessage {
        /// Folder the message lives in.
        folder: String,
        /// UID of the conflicting message.
        uid: u32,
    },
    /// A locally stored message could not be parsed as MIME.
    MalformedMime(String),
    /// The `Date` header was absent or not in RFC 5322 `date-time` form.
    BadDateHeader(String),
}

impl From<IoError> for Error {
    fn from(err: IoError) -> Error {
        Error::Io(err)
    }
}

impl<T> From<BufError<T>> for Error {
    fn from(err: BufError<T>) -> Error {
        Error::Io(err.into())
    }
}

impl From<TlsHandshakeError<TcpStream>> for Error {
    fn from(err: TlsHandshakeError<TcpStream>) -> Error {
        Error::TlsHandshake(err)
    }
}

impl From<TlsError> for Error {
    fn from(err: TlsError) -> Error {
        Error::Tls(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Error {
        Error::Json(err)
    }
}

impl From<ParseError> for Error {
    fn from(err: ParseError) -> Error {
        Error::Parse(err)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "{}", e),
            Error::Tls(e) => write!(f, "{}", e),
            Error::TlsHandshake(e) => write!(f, "{}", e),
            Error::Bad(s) => write!(f, "BAD response: {}", s),
            Error::No(s) => write!(f, "NO response: {}", s),
            Error::ConnectionLost => f.write_str("connection lost"),
            Error::Parse(e) => write!(f, "{}", e),
            Error::Validate(e) => write!(f, "{}", e),
            Error::Append => f.write_str("could not append message to mailbox"),
            Error::Json(e) => write!(f, "bad metadata record: {}", e),
            Error::MissingStatus(mbox) => {
                write!(f, "STATUS response for {} lacked UIDNEXT or UIDVALIDITY", mbox)
            }
            Error::UidValidityChanged {
                folder,
                stored,
                server,
            } => write!(
                f,
                "UIDVALIDITY of {} changed from {} to {}; local state needs manual attention",
                folder, stored, server
            ),
            Error::DuplicateMessage { folder, uid } => write!(
                f,
                "{} already contains a different message for UID {}",
                folder, uid
            ),
            Error::MalformedMime(s) => write!(f, "unparseable MIME content: {}", s),
            Error::BadDateHeader(s) => write!(f, "unusable Date header: {}", s),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Tls(e) => Some(e),
            Error::TlsHandshake(e) => Some(e),
            Error::Json(e) => Some(e),
            Error::Parse(ParseError::DataNotUtf8(e)) => Some(e),
            _ => None,
        }
    }
}

/// An error parsing a server response.
#[derive(Debug)]
pub enum ParseError {
    /// The response was not syntactically valid IMAP.
    Invalid(Vec<u8>),
    /// The response was valid IMAP but not what the command expected.
    Unexpected(String),
    /// The response contained data that was not valid UTF-8.
    DataNotUtf8(FromUtf8Error),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::Invalid(data) => {
                write!(f, "unparseable response: {:?}", String::from_utf8_lossy(data))
            }
            ParseError::Unexpected(s) => write!(f, "unexpected response: {}", s),
            ParseError::DataNotUtf8(_) => f.write_str("response data was not valid UTF-8"),
        }
    }
}

impl StdError for ParseError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            ParseError::DataNotUtf8(e) => Some(e),
            _ => None,
        }
    }
}

/// An invalid character in a command argument.
#[derive(Debug)]
pub struct ValidateError(pub char);

impl fmt::Display for ValidateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // print the character in debug form because the invalid ones are usually whitespace
        write!(f, "invalid character in input: {:?}", self.0)
    }
}

impl StdError for ValidateError {}
