use std::fmt;

use super::{Flag, Uid};

/// Summary state of a mailbox reported by `SELECT` or `EXAMINE`.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Mailbox {
    /// Flags defined in this mailbox.
    pub flags: Vec<Flag>,
    /// Number of messages in the mailbox.
    pub exists: u32,
    /// Number of messages with `\Recent` set.
    pub recent: u32,
    /// The next UID the server expects to assign.
    pub uid_next: Option<Uid>,
    /// The current UIDVALIDITY of the mailbox.
    pub uid_validity: Option<u32>,
}

impl fmt::Display for Mailbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "exists: {}, recent: {}, uid_next: {:?}, uid_validity: {:?}",
            self.exists, self.recent, self.uid_next, self.uid_validity
        )
    }
}

/// The answer to a `STATUS (UIDNEXT UIDVALIDITY)` query.
///
/// Unlike [`Mailbox`], both fields are mandatory here: the sync algorithm cannot proceed without
/// them, so their absence is already rejected at the parsing stage.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct FolderStatus {
    /// The next UID the server expects to assign.
    pub uid_next: Uid,
    /// The current UIDVALIDITY of the mailbox.
    pub uid_validity: u32,
}
