use super::{Flag, Seq, Uid};

/// A `FETCH` reply for a single message.
///
/// Only the attributes this tool asks for are retained: `RFC822` content for mirroring, and the
/// flags and size of the `FAST` set for existence probes.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Fetch {
    /// The message sequence number this reply refers to.
    pub message: Seq,
    /// The message's UID, if the reply carried one. `UID FETCH` replies always do.
    pub uid: Option<Uid>,
    /// The `RFC822.SIZE` of the message.
    pub size: Option<u32>,
    pub(crate) flags: Vec<Flag>,
    pub(crate) rfc822: Option<Vec<u8>>,
}

impl Fetch {
    /// A list of flags that are set for this message.
    pub fn flags(&self) -> &[Flag] {
        &self.flags[..]
    }

    /// The entire content of this message, if `RFC822` was included in the query.
    pub fn rfc822(&self) -> Option<&[u8]> {
        self.rfc822.as_deref()
    }
}
