//! Data carried in IMAP server responses.

/// From section [2.3.1.1 of RFC 3501](https://tools.ietf.org/html/rfc3501#section-2.3.1.1).
///
/// A 32-bit value assigned to each message. Together with the mailbox's UIDVALIDITY it refers to
/// a single immutable message on the server forever: UIDs are assigned in strictly ascending
/// order as messages arrive, and are only reused after the server announces a new UIDVALIDITY.
pub type Uid = u32;

/// From section [2.3.1.2 of RFC 3501](https://tools.ietf.org/html/rfc3501#section-2.3.1.2).
///
/// A relative position from 1 to the number of messages in the mailbox, ordered by ascending
/// UID. Sequence numbers are reassigned whenever messages are expunged, so they are only
/// meaningful within a single session.
pub type Seq = u32;

mod fetch;
pub use self::fetch::Fetch;

mod flag;
pub use self::flag::Flag;

mod mailbox;
pub use self::mailbox::{FolderStatus, Mailbox};

mod name;
pub use self::name::{Name, NameAttribute};
