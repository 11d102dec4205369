//! The local mirror: one directory per folder, one directory per message, JSON metafiles for
//! everything the tool needs to remember between runs.
//!
//! Layout under the store root:
//!
//! ```text
//! <root>/<folder>/meta.json     folder sync state (NAME, UIDVALIDITY, UIDFETCHNEXT)
//! <root>/<folder>/<uid>/rfc822  raw message content
//! <root>/<folder>/<uid>/meta.json  operator disposition (absent means unknown)
//! ```
//!
//! Every metafile write goes through a sibling temporary file and a rename, so a reader (or a
//! crash) can only ever observe the old complete record or the new complete record.

use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use log::debug;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::error::{Error, Result};
use crate::types::Uid;

/// Sync state for one folder, stored as `<root>/<folder>/meta.json`.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct FolderState {
    /// The folder's IMAP name, before directory-name mapping. Recorded on first sync.
    #[serde(rename = "NAME", default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// The UIDVALIDITY under which all local UIDs in this folder were recorded. Zero means the
    /// folder has never been synced.
    #[serde(rename = "UIDVALIDITY", default)]
    pub uid_validity: u32,
    /// The next UID to consider when fetching. Everything below has already been processed.
    #[serde(rename = "UIDFETCHNEXT", default)]
    pub uid_fetch_next: Uid,
}

/// What the operator wants done with a mirrored message.
#[derive(
    Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize, ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Disposition {
    /// Not reviewed yet.
    #[default]
    Unknown,
    /// Leave the message alone.
    Keep,
    /// Export the attachments locally, then trim the message like `delete`.
    Download,
    /// Trim the attachments out of the message.
    Delete,
}

impl fmt::Display for Disposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Disposition::Unknown => f.write_str("unknown"),
            Disposition::Keep => f.write_str("keep"),
            Disposition::Download => f.write_str("download"),
            Disposition::Delete => f.write_str("delete"),
        }
    }
}

/// Per-message state, stored as `<root>/<folder>/<uid>/meta.json`.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct MessageState {
    /// The operator's disposition for this message.
    #[serde(default)]
    pub status: Disposition,
}

/// Map an IMAP folder name to a directory name.
///
/// `/` would nest directories and `[`, `]`, `*` trip up shells, so all four become `_`. The
/// mapping is deterministic; names that collide after mapping are out of scope.
pub fn folder_dir_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '[' | ']' | '*' => '_',
            c => c,
        })
        .collect()
}

/// Read a JSON metafile, or its `Default` if the file does not exist yet.
pub fn read_metafile<T: DeserializeOwned + Default>(path: &Path) -> Result<T> {
    match fs::read(path) {
        Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(T::default()),
        Err(e) => Err(e.into()),
    }
}

/// Atomically replace a JSON metafile, creating parent directories as needed.
pub fn write_metafile<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut buf = serde_json::to_vec(value)?;
    buf.push(b'\n');
    write_atomic(path, &buf)
}

/// Write `content` to `path` via a same-directory temporary file and a rename. The temporary
/// file is unlinked on any early exit.
fn write_atomic(path: &Path, content: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(d) if !d.as_os_str().is_empty() => d,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(content)?;
    tmp.persist(path).map_err(|e| Error::Io(e.error))?;
    Ok(())
}

/// Handle on the mirror rooted at a directory.
#[derive(Clone, Debug)]
pub struct MailStore {
    root: PathBuf,
}

impl MailStore {
    pub fn new(root: impl Into<PathBuf>) -> MailStore {
        MailStore { root: root.into() }
    }

    fn folder_dir(&self, folder: &str) -> PathBuf {
        self.root.join(folder_dir_name(folder))
    }

    fn message_dir(&self, folder: &str, uid: Uid) -> PathBuf {
        self.folder_dir(folder).join(uid.to_string())
    }

    /// Whether this folder has a local directory at all.
    pub fn folder_exists(&self, folder: &str) -> bool {
        self.folder_dir(folder).is_dir()
    }

    /// Read this folder's sync state. A folder that was never synced reads as the default.
    pub fn folder_state(&self, folder: &str) -> Result<FolderState> {
        read_metafile(&self.folder_dir(folder).join("meta.json"))
    }

    /// Persist this folder's sync state.
    pub fn write_folder_state(&self, folder: &str, state: &FolderState) -> Result<()> {
        write_metafile(&self.folder_dir(folder).join("meta.json"), state)
    }

    /// Record a message's raw content.
    ///
    /// Returns `true` if the record was created, `false` if an identical record already existed
    /// (a crash-resume re-fetch). A record with *different* content for the same UID is an error:
    /// either the server broke its UID promise or the local store was tampered with, and
    /// overwriting would destroy the evidence.
    pub fn save_message(&self, folder: &str, uid: Uid, raw: &[u8]) -> Result<bool> {
        let path = self.message_dir(folder, uid).join("rfc822");
        match fs::read(&path) {
            Ok(existing) => {
                if existing == raw {
                    debug!("{}/{} already mirrored, skipping", folder, uid);
                    Ok(false)
                } else {
                    Err(Error::DuplicateMessage {
                        folder: folder.to_string(),
                        uid,
                    })
                }
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                write_atomic(&path, raw)?;
                Ok(true)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Replace a message's raw content unconditionally, e.g. after the server-side copy was
    /// rewritten.
    pub fn overwrite_message(&self, folder: &str, uid: Uid, raw: &[u8]) -> Result<()> {
        write_atomic(&self.message_dir(folder, uid).join("rfc822"), raw)
    }

    /// Read back a mirrored message's raw content.
    pub fn message_raw(&self, folder: &str, uid: Uid) -> Result<Vec<u8>> {
        Ok(fs::read(self.message_dir(folder, uid).join("rfc822"))?)
    }

    /// Read a message's disposition. Missing metafiles mean [`Disposition::Unknown`].
    pub fn disposition(&self, folder: &str, uid: Uid) -> Result<Disposition> {
        let state: MessageState = read_metafile(&self.message_dir(folder, uid).join("meta.json"))?;
        Ok(state.status)
    }

    /// Record a message's disposition. Last writer wins.
    pub fn set_disposition(&self, folder: &str, uid: Uid, disposition: Disposition) -> Result<()> {
        let path = self.message_dir(folder, uid).join("meta.json");
        let mut state: MessageState = read_metafile(&path)?;
        state.status = disposition;
        write_metafile(&path, &state)
    }

    /// All folders known to the mirror, by IMAP name, sorted.
    pub fn folders(&self) -> Result<Vec<String>> {
        let mut folders = Vec::new();
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(folders),
            Err(e) => return Err(e.into()),
        };
        for entry in entries {
            let entry = entry?;
            let meta = entry.path().join("meta.json");
            if !meta.is_file() {
                continue;
            }
            let state: FolderState = read_metafile(&meta)?;
            folders.push(
                state
                    .name
                    .unwrap_or_else(|| entry.file_name().to_string_lossy().into_owned()),
            );
        }
        folders.sort();
        Ok(folders)
    }

    /// All mirrored UIDs in a folder, ascending.
    pub fn uids(&self, folder: &str) -> Result<Vec<Uid>> {
        let mut uids = Vec::new();
        let entries = match fs::read_dir(self.folder_dir(folder)) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(uids),
            Err(e) => return Err(e.into()),
        };
        for entry in entries {
            let entry = entry?;
            if let Ok(uid) = entry.file_name().to_string_lossy().parse::<Uid>() {
                uids.push(uid);
            }
        }
        uids.sort_unstable();
        Ok(uids)
    }
}
