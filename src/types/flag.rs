use std::fmt;

/// With the exception of [`Flag::Custom`], these are the system flags pre-defined in
/// [RFC 3501 section 2.3.2](https://tools.ietf.org/html/rfc3501#section-2.3.2). All system flags
/// begin with `\` in the IMAP protocol.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub enum Flag {
    /// Message has been read.
    Seen,
    /// Message has been answered.
    Answered,
    /// Message is "flagged" for urgent/special attention.
    Flagged,
    /// Message is "deleted" for removal by a later EXPUNGE.
    Deleted,
    /// Message has not completed composition.
    Draft,
    /// Message recently arrived in this mailbox. Cannot be altered by the client.
    Recent,
    /// `\*`, indicating that new keywords may be created by storing them.
    MayCreate,
    /// A non-standard user- or server-defined flag.
    Custom(String),
}

impl Flag {
    fn system(s: &str) -> Option<Self> {
        match s {
            "\\Seen" => Some(Flag::Seen),
            "\\Answered" => Some(Flag::Answered),
            "\\Flagged" => Some(Flag::Flagged),
            "\\Deleted" => Some(Flag::Deleted),
            "\\Draft" => Some(Flag::Draft),
            "\\Recent" => Some(Flag::Recent),
            "\\*" => Some(Flag::MayCreate),
            _ => None,
        }
    }
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Flag::Seen => f.write_str("\\Seen"),
            Flag::Answered => f.write_str("\\Answered"),
            Flag::Flagged => f.write_str("\\Flagged"),
            Flag::Deleted => f.write_str("\\Deleted"),
            Flag::Draft => f.write_str("\\Draft"),
            Flag::Recent => f.write_str("\\Recent"),
            Flag::MayCreate => f.write_str("\\*"),
            Flag::Custom(s) => f.write_str(s),
        }
    }
}

impl From<String> for Flag {
    fn from(s: String) -> Self {
        if let Some(f) = Flag::system(&s) {
            f
        } else {
            Flag::Custom(s)
        }
    }
}

impl From<&str> for Flag {
    fn from(s: &str) -> Self {
        if let Some(f) = Flag::system(s) {
            f
        } else {
            Flag::Custom(s.to_string())
        }
    }
}
