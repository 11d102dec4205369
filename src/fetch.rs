//! The incremental fetch engine: mirror every new large message from the server into the local
//! store, folder by folder, resumable at any point.

use std::io::{Read, Write};

use log::{debug, error, info};

use crate::client::Client;
use crate::error::{Error, Result};
use crate::store::MailStore;

/// Messages at or below this size are left on the server. Small mail is not worth reviewing.
pub const SIZE_THRESHOLD: u32 = 1024 * 1024;

/// Mirror new large messages from every selectable folder.
///
/// A folder that fails to sync is reported and skipped so the remaining folders still run, but
/// the first such failure is returned once the pass is over: a folder-level failure is fatal
/// and must reach the exit status, it just should not block the other folders. The per-folder
/// state writes make each folder independently resumable, so there is nothing to unwind.
pub fn fetch_all<T: Read + Write>(client: &mut Client<T>, store: &MailStore) -> Result<()> {
    let mut first_failure = None;
    for name in client.list()? {
        if !name.selectable() {
            debug!("skipping non-selectable folder {}", name.name());
            continue;
        }
        if let Err(e) = fetch_folder(client, store, name.name()) {
            error!("failed to sync {}: {}", name.name(), e);
            first_failure.get_or_insert(e);
        }
    }
    match first_failure {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// Mirror new large messages from one folder.
///
/// The fetch cursor (`UIDFETCHNEXT`) only moves forward after the message below it is safely on
/// disk, so an interrupted run re-fetches at most one message. If the folder's UIDVALIDITY has
/// changed since the last sync, every locally recorded UID is meaningless and the sync stops
/// before touching anything.
pub fn fetch_folder<T: Read + Write>(
    client: &mut Client<T>,
    store: &MailStore,
    folder: &str,
) -> Result<()> {
    let mut state = store.folder_state(folder)?;
    let status = client.status(folder)?;

    if store.folder_exists(folder)
        && state.uid_validity != 0
        && state.uid_validity != status.uid_validity
    {
        return Err(Error::UidValidityChanged {
            folder: folder.to_string(),
            stored: state.uid_validity,
            server: status.uid_validity,
        });
    }

    state.uid_validity = status.uid_validity;
    state.name = Some(folder.to_string());
    store.write_folder_state(folder, &state)?;

    if state.uid_fetch_next >= status.uid_next {
        debug!("{}: nothing new below UID {}", folder, status.uid_next);
        return Ok(());
    }

    client.examine(folder)?;

    let start = state.uid_fetch_next.max(1);
    let mut uids =
        client.uid_search(&format!("UID {}:* LARGER {}", start, SIZE_THRESHOLD))?;
    // An `n:*` set matches the highest-UID message even when n exceeds it, so a search from an
    // up-to-date cursor can hand back an already-mirrored UID.
    uids.retain(|&uid| uid >= start);
    info!(
        "{}: {} new large message(s) above UID {}",
        folder,
        uids.len(),
        start
    );

    for uid in uids {
        let fetches = client.uid_fetch(&uid.to_string(), "(RFC822)")?;
        match fetches
            .iter()
            .find(|f| f.uid == Some(uid))
            .and_then(|f| f.rfc822())
        {
            Some(raw) => {
                if store.save_message(folder, uid, raw)? {
                    info!("{}: mirrored UID {} ({} bytes)", folder, uid, raw.len());
                }
            }
            None => {
                debug!("{}: UID {} vanished between search and fetch", folder, uid);
            }
        }
        state.uid_fetch_next = uid + 1;
        store.write_folder_state(folder, &state)?;
    }

    state.uid_fetch_next = status.uid_next;
    store.write_folder_state(folder, &state)?;

    client.close()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock_stream::MockStream;
    use crate::store::FolderState;
    use tempfile::tempdir;

    fn client_with(responses: &str) -> Client<MockStream> {
        Client::new(MockStream::new(responses.as_bytes().to_vec()))
    }

    fn written(client: &Client<MockStream>) -> String {
        String::from_utf8_lossy(&client.stream.get_ref().written_buf).into_owned()
    }

    #[test]
    fn first_sync_mirrors_everything_large() {
        let dir = tempdir().unwrap();
        let store = MailStore::new(dir.path());
        let mut client = client_with(
            "* STATUS INBOX (UIDNEXT 150 UIDVALIDITY 5)\r\n\
             a1 OK STATUS completed\r\n\
             * 7 EXISTS\r\n\
             * OK [UIDVALIDITY 5] UIDs valid\r\n\
             a2 OK [READ-ONLY] EXAMINE completed\r\n\
             * SEARCH 101 107\r\n\
             a3 OK SEARCH completed\r\n\
             * 1 FETCH (UID 101 RFC822 {9}\r\nhello 101)\r\n\
             a4 OK FETCH completed\r\n\
             * 2 FETCH (UID 107 RFC822 {9}\r\nhello 107)\r\n\
             a5 OK FETCH completed\r\n\
             a6 OK CLOSE completed\r\n",
        );

        fetch_folder(&mut client, &store, "INBOX").unwrap();

        assert_eq!(
            written(&client),
            "a1 STATUS \"INBOX\" (UIDNEXT UIDVALIDITY)\r\n\
             a2 EXAMINE \"INBOX\"\r\n\
             a3 UID SEARCH UID 1:* LARGER 1048576\r\n\
             a4 UID FETCH 101 (RFC822)\r\n\
             a5 UID FETCH 107 (RFC822)\r\n\
             a6 CLOSE\r\n"
        );
        assert_eq!(store.message_raw("INBOX", 101).unwrap(), b"hello 101");
        assert_eq!(store.message_raw("INBOX", 107).unwrap(), b"hello 107");

        let state = store.folder_state("INBOX").unwrap();
        assert_eq!(state.name.as_deref(), Some("INBOX"));
        assert_eq!(state.uid_validity, 5);
        assert_eq!(state.uid_fetch_next, 150);
    }

    #[test]
    fn uidvalidity_change_is_fatal_and_touches_nothing() {
        let dir = tempdir().unwrap();
        let store = MailStore::new(dir.path());
        let state = FolderState {
            name: Some("INBOX".to_string()),
            uid_validity: 3,
            uid_fetch_next: 100,
        };
        store.write_folder_state("INBOX", &state).unwrap();
        store.save_message("INBOX", 42, b"mirrored earlier").unwrap();

        let mut client = client_with(
            "* STATUS INBOX (UIDNEXT 150 UIDVALIDITY 5)\r\n\
             a1 OK STATUS completed\r\n",
        );

        match fetch_folder(&mut client, &store, "INBOX") {
            Err(Error::UidValidityChanged {
                folder,
                stored,
                server,
            }) => {
                assert_eq!(folder, "INBOX");
                assert_eq!(stored, 3);
                assert_eq!(server, 5);
            }
            r => panic!("unexpected result: {:?}", r),
        }

        // only the STATUS probe went out, and the local state is untouched
        assert_eq!(written(&client), "a1 STATUS \"INBOX\" (UIDNEXT UIDVALIDITY)\r\n");
        assert_eq!(store.folder_state("INBOX").unwrap(), state);
        assert_eq!(store.message_raw("INBOX", 42).unwrap(), b"mirrored earlier");
    }

    #[test]
    fn empty_search_still_advances_cursor() {
        let dir = tempdir().unwrap();
        let store = MailStore::new(dir.path());
        let mut client = client_with(
            "* STATUS INBOX (UIDNEXT 150 UIDVALIDITY 5)\r\n\
             a1 OK STATUS completed\r\n\
             a2 OK [READ-ONLY] EXAMINE completed\r\n\
             * SEARCH\r\n\
             a3 OK SEARCH completed\r\n\
             a4 OK CLOSE completed\r\n",
        );

        fetch_folder(&mut client, &store, "INBOX").unwrap();

        let state = store.folder_state("INBOX").unwrap();
        assert_eq!(state.uid_fetch_next, 150);
    }

    #[test]
    fn up_to_date_folder_skips_the_search() {
        let dir = tempdir().unwrap();
        let store = MailStore::new(dir.path());
        let state = FolderState {
            name: Some("INBOX".to_string()),
            uid_validity: 5,
            uid_fetch_next: 150,
        };
        store.write_folder_state("INBOX", &state).unwrap();

        let mut client = client_with(
            "* STATUS INBOX (UIDNEXT 150 UIDVALIDITY 5)\r\n\
             a1 OK STATUS completed\r\n",
        );

        fetch_folder(&mut client, &store, "INBOX").unwrap();
        assert_eq!(written(&client), "a1 STATUS \"INBOX\" (UIDNEXT UIDVALIDITY)\r\n");
    }

    #[test]
    fn search_results_below_the_cursor_are_ignored() {
        let dir = tempdir().unwrap();
        let store = MailStore::new(dir.path());
        let state = FolderState {
            name: Some("INBOX".to_string()),
            uid_validity: 5,
            uid_fetch_next: 100,
        };
        store.write_folder_state("INBOX", &state).unwrap();

        // UID 99 is the highest-UID message and matches 100:* by the protocol's rules, but it
        // was mirrored on a previous run and must not be fetched again.
        let mut client = client_with(
            "* STATUS INBOX (UIDNEXT 150 UIDVALIDITY 5)\r\n\
             a1 OK STATUS completed\r\n\
             a2 OK [READ-ONLY] EXAMINE completed\r\n\
             * SEARCH 99\r\n\
             a3 OK SEARCH completed\r\n\
             a4 OK CLOSE completed\r\n",
        );

        fetch_folder(&mut client, &store, "INBOX").unwrap();

        assert_eq!(
            written(&client),
            "a1 STATUS \"INBOX\" (UIDNEXT UIDVALIDITY)\r\n\
             a2 EXAMINE \"INBOX\"\r\n\
             a3 UID SEARCH UID 100:* LARGER 1048576\r\n\
             a4 CLOSE\r\n"
        );
        assert_eq!(store.folder_state("INBOX").unwrap().uid_fetch_next, 150);
    }

    #[test]
    fn vanished_message_is_skipped_but_cursor_moves() {
        let dir = tempdir().unwrap();
        let store = MailStore::new(dir.path());
        let mut client = client_with(
            "* STATUS INBOX (UIDNEXT 150 UIDVALIDITY 5)\r\n\
             a1 OK STATUS completed\r\n\
             a2 OK [READ-ONLY] EXAMINE completed\r\n\
             * SEARCH 101\r\n\
             a3 OK SEARCH completed\r\n\
             a4 OK FETCH completed\r\n\
             a5 OK CLOSE completed\r\n",
        );

        fetch_folder(&mut client, &store, "INBOX").unwrap();

        assert!(store.uids("INBOX").unwrap().is_empty());
        assert_eq!(store.folder_state("INBOX").unwrap().uid_fetch_next, 150);
    }

    #[test]
    fn interrupted_run_resumes_without_duplicates() {
        let dir = tempdir().unwrap();
        let store = MailStore::new(dir.path());
        // a previous run persisted UID 101 but crashed before advancing the cursor past it
        let state = FolderState {
            name: Some("INBOX".to_string()),
            uid_validity: 5,
            uid_fetch_next: 100,
        };
        store.write_folder_state("INBOX", &state).unwrap();
        store.save_message("INBOX", 101, b"hello 101").unwrap();

        let mut client = client_with(
            "* STATUS INBOX (UIDNEXT 150 UIDVALIDITY 5)\r\n\
             a1 OK STATUS completed\r\n\
             a2 OK [READ-ONLY] EXAMINE completed\r\n\
             * SEARCH 101 107\r\n\
             a3 OK SEARCH completed\r\n\
             * 1 FETCH (UID 101 RFC822 {9}\r\nhello 101)\r\n\
             a4 OK FETCH completed\r\n\
             * 2 FETCH (UID 107 RFC822 {9}\r\nhello 107)\r\n\
             a5 OK FETCH completed\r\n\
             a6 OK CLOSE completed\r\n",
        );

        fetch_folder(&mut client, &store, "INBOX").unwrap();

        // the re-fetch of 101 hit the idempotent path and no record was duplicated or changed
        assert_eq!(store.uids("INBOX").unwrap(), vec![101, 107]);
        assert_eq!(store.message_raw("INBOX", 101).unwrap(), b"hello 101");
        assert_eq!(store.folder_state("INBOX").unwrap().uid_fetch_next, 150);

        // a second pass with nothing new leaves the cursor where it is
        let mut client = client_with(
            "* STATUS INBOX (UIDNEXT 150 UIDVALIDITY 5)\r\n\
             a1 OK STATUS completed\r\n",
        );
        fetch_folder(&mut client, &store, "INBOX").unwrap();
        assert_eq!(written(&client), "a1 STATUS \"INBOX\" (UIDNEXT UIDVALIDITY)\r\n");
        assert_eq!(store.folder_state("INBOX").unwrap().uid_fetch_next, 150);
        assert_eq!(store.uids("INBOX").unwrap(), vec![101, 107]);
    }

    #[test]
    fn fetch_all_reports_a_failed_folder_after_finishing_the_rest() {
        let dir = tempdir().unwrap();
        let store = MailStore::new(dir.path());
        let inbox = FolderState {
            name: Some("INBOX".to_string()),
            uid_validity: 3,
            uid_fetch_next: 100,
        };
        store.write_folder_state("INBOX", &inbox).unwrap();
        store.save_message("INBOX", 42, b"mirrored earlier").unwrap();
        let sent = FolderState {
            name: Some("Sent".to_string()),
            uid_validity: 2,
            uid_fetch_next: 10,
        };
        store.write_folder_state("Sent", &sent).unwrap();

        let mut client = client_with(
            "* LIST () \"/\" \"INBOX\"\r\n\
             * LIST () \"/\" \"Sent\"\r\n\
             a1 OK LIST completed\r\n\
             * STATUS INBOX (UIDNEXT 150 UIDVALIDITY 5)\r\n\
             a2 OK STATUS completed\r\n\
             * STATUS Sent (UIDNEXT 10 UIDVALIDITY 2)\r\n\
             a3 OK STATUS completed\r\n",
        );

        match fetch_all(&mut client, &store) {
            Err(Error::UidValidityChanged { folder, .. }) => assert_eq!(folder, "INBOX"),
            r => panic!("unexpected result: {:?}", r),
        }

        // the failing folder did not keep Sent from being synced
        assert_eq!(
            written(&client),
            "a1 LIST \"\" \"*\"\r\n\
             a2 STATUS \"INBOX\" (UIDNEXT UIDVALIDITY)\r\n\
             a3 STATUS \"Sent\" (UIDNEXT UIDVALIDITY)\r\n"
        );
        assert_eq!(store.folder_state("INBOX").unwrap(), inbox);
    }

    #[test]
    fn fetch_all_skips_non_selectable_folders() {
        let dir = tempdir().unwrap();
        let store = MailStore::new(dir.path());
        let state = FolderState {
            name: Some("INBOX".to_string()),
            uid_validity: 5,
            uid_fetch_next: 150,
        };
        store.write_folder_state("INBOX", &state).unwrap();

        let mut client = client_with(
            "* LIST (\\Noselect) \"/\" \"[Gmail]\"\r\n\
             * LIST () \"/\" \"INBOX\"\r\n\
             a1 OK LIST completed\r\n\
             * STATUS INBOX (UIDNEXT 150 UIDVALIDITY 5)\r\n\
             a2 OK STATUS completed\r\n",
        );

        fetch_all(&mut client, &store).unwrap();

        assert_eq!(
            written(&client),
            "a1 LIST \"\" \"*\"\r\n\
             a2 STATUS \"INBOX\" (UIDNEXT UIDVALIDITY)\r\n"
        );
    }
}
