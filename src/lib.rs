//! Mirror large IMAP messages to disk, review them offline, and push the verdicts back.
//!
//! The crate is organized around three moving parts:
//!
//! * [`store`] is the on-disk mirror: raw messages plus JSON metafiles recording per-folder sync
//!   cursors and per-message operator dispositions.
//! * [`fetch`] incrementally pulls every message over a size threshold from the server into the
//!   store, resumable after interruption.
//! * [`push`] replays operator dispositions: marked messages are replaced on the server by
//!   copies with their attachments stripped, and the originals are archived to a trash folder.
//!
//! [`client`] is the blocking IMAP client underneath both engines, and [`mime`] understands
//! enough message structure to find, export, and strip attachments.

pub mod client;
pub mod error;
pub mod export;
pub mod fetch;
pub mod mime;
mod parse;
pub mod push;
pub mod store;
pub mod types;
mod utils;

#[cfg(test)]
mod mock_stream;

pub use crate::client::Client;
pub use crate::error::{Error, Result};
