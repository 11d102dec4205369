//! The reconciliation engine: replay operator dispositions against the server by replacing each
//! marked message with a copy whose attachments have been stripped, archiving the original.

use std::io::{Read, Write};

use log::{debug, error, info, warn};

use crate::client::Client;
use crate::error::Result;
use crate::mime;
use crate::store::{Disposition, MailStore};
use crate::types::{Flag, Uid};

/// Knobs for a push run.
#[derive(Clone, Debug)]
pub struct PushOptions {
    /// Where originals are moved before the stripped copy is appended.
    pub trash_mailbox: String,
    /// Restrict the run to one folder.
    pub folder: Option<String>,
    /// Restrict the run to one message.
    pub uid: Option<Uid>,
    /// Report what would happen without sending any mutating command.
    pub dry_run: bool,
}

impl Default for PushOptions {
    fn default() -> PushOptions {
        PushOptions {
            trash_mailbox: "[Gmail]/Trash".to_string(),
            folder: None,
            uid: None,
            dry_run: false,
        }
    }
}

/// Push dispositions for every folder in the store.
///
/// Folders are independent; one folder failing to push is reported and does not stop the rest,
/// but the first such failure is returned once the pass is over so the run exits nonzero.
pub fn push_all<T: Read + Write>(
    client: &mut Client<T>,
    store: &MailStore,
    options: &PushOptions,
) -> Result<()> {
    let mut first_failure = None;
    for folder in store.folders()? {
        if let Some(only) = &options.folder {
            if only != &folder {
                continue;
            }
        }
        if let Err(e) = push_folder(client, store, &folder, options) {
            error!("failed to push {}: {}", folder, e);
            first_failure.get_or_insert(e);
        }
    }
    match first_failure {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// Push dispositions for one folder.
///
/// Only `download`- and `delete`-marked messages are touched. A message that cannot be pushed
/// (unparseable, deviant `Date` header) is reported and left alone on both sides, and the run
/// continues with the next message.
pub fn push_folder<T: Read + Write>(
    client: &mut Client<T>,
    store: &MailStore,
    folder: &str,
    options: &PushOptions,
) -> Result<()> {
    let mut actionable = Vec::new();
    for uid in store.uids(folder)? {
        if let Some(only) = options.uid {
            if only != uid {
                continue;
            }
        }
        match store.disposition(folder, uid)? {
            Disposition::Download | Disposition::Delete => actionable.push(uid),
            Disposition::Unknown | Disposition::Keep => {}
        }
    }
    if actionable.is_empty() {
        debug!("{}: nothing marked for pushing", folder);
        return Ok(());
    }

    client.select(folder)?;
    for uid in actionable {
        if let Err(e) = push_message(client, store, folder, uid, options) {
            warn!("{}: leaving UID {} untouched: {}", folder, uid, e);
        }
    }
    client.close()
}

/// Replace one message on the server with its stripped copy.
///
/// The stripped copy and its timestamp are computed before any mutating command goes out, so a
/// message we cannot reconstruct is never moved away from its folder.
fn push_message<T: Read + Write>(
    client: &mut Client<T>,
    store: &MailStore,
    folder: &str,
    uid: Uid,
    options: &PushOptions,
) -> Result<()> {
    let raw = store.message_raw(folder, uid)?;
    let msg = mime::Message::parse(&raw)?;
    let date = msg.date()?;
    let stripped = msg.strip(&raw);

    if options.dry_run {
        info!(
            "{}: would replace UID {} ({} -> {} bytes)",
            folder,
            uid,
            raw.len(),
            stripped.len()
        );
        return Ok(());
    }

    // The UID may have been moved or expunged by another client since the mirror was taken.
    let probe = client.uid_fetch(&uid.to_string(), "FAST")?;
    if !probe.iter().any(|f| f.uid == Some(uid)) {
        info!("{}: UID {} is gone from the server, skipping", folder, uid);
        return Ok(());
    }

    client.uid_mv(&uid.to_string(), &options.trash_mailbox)?;
    client.append(folder, &[Flag::Seen], Some(&date), &stripped)?;
    store.overwrite_message(folder, uid, &stripped)?;
    info!(
        "{}: replaced UID {} ({} -> {} bytes)",
        folder,
        uid,
        raw.len(),
        stripped.len()
    );
    Ok(())
}
