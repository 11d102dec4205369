//! Copy the attachments of `download`-marked messages out of the mirror into a flat directory.

use std::fs;
use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::error::Result;
use crate::mime;
use crate::store::{Disposition, MailStore};

/// Export every named attachment of every `download`-marked message into `dest`.
///
/// File names come from the attachments themselves, reduced to their final path component so a
/// hostile name cannot escape `dest`. Name collisions get a numeric suffix before the extension.
/// Unparseable messages are reported and skipped.
pub fn export_attachments(store: &MailStore, dest: &Path) -> Result<()> {
    fs::create_dir_all(dest)?;
    for folder in store.folders()? {
        for uid in store.uids(&folder)? {
            if store.disposition(&folder, uid)? != Disposition::Download {
                continue;
            }
            let raw = store.message_raw(&folder, uid)?;
            let msg = match mime::Message::parse(&raw) {
                Ok(msg) => msg,
                Err(e) => {
                    warn!("{}/{}: not exporting: {}", folder, uid, e);
                    continue;
                }
            };
            for (part, leaf) in msg.attachments() {
                let name = match leaf.filename.as_deref().map(sanitize) {
                    Some(Some(name)) => name,
                    _ => continue,
                };
                if leaf.contents.is_empty() {
                    continue;
                }
                let path = dedup_path(dest, &name);
                fs::write(&path, &leaf.contents)?;
                info!(
                    "{}/{} part {}: wrote {} ({} bytes)",
                    folder,
                    uid,
                    part,
                    path.display(),
                    leaf.contents.len()
                );
            }
        }
    }
    Ok(())
}

/// Reduce an attachment name to its final path component.
fn sanitize(name: &str) -> Option<String> {
    Path::new(name)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
}

/// The first of `name`, `stem(1).ext`, `stem(2).ext`, ... that does not exist in `dir`.
fn dedup_path(dir: &Path, name: &str) -> PathBuf {
    let candidate = dir.join(name);
    if !candidate.exists() {
        return candidate;
    }
    let (stem, ext) = match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
        _ => (name, None),
    };
    for n in 1.. {
        let candidate = match ext {
            Some(ext) => dir.join(format!("{}({}).{}", stem, n, ext)),
            None => dir.join(format!("{}({})", stem, n)),
        };
        if !candidate.exists() {
            return candidate;
        }
    }
    unreachable!()
}
