use std::fs;
use std::net::TcpStream;
use std::path::{Path, PathBuf};
use std::process;

use clap::{ArgAction, Parser, Subcommand};
use log::LevelFilter;
use native_tls::TlsStream;

use harvest::export::export_attachments;
use harvest::push::PushOptions;
use harvest::store::{Disposition, MailStore};
use harvest::types::Uid;
use harvest::{fetch, mime, push, Client, Result};

const IMAPS_PORT: u16 = 993;

#[derive(Parser)]
#[command(version, about = "Mirror large IMAP messages to disk, then trim or archive them in place")]
struct Cli {
    /// Directory holding the local mirror.
    #[arg(short, long, global = true, default_value = ".")]
    directory: PathBuf,

    /// Increase log verbosity (repeat for more).
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Mirror new large messages from the server into the local store.
    Fetch {
        /// IMAP server host name.
        server: String,
        /// Account to log in as.
        user: String,
        /// Read the password from this file instead of prompting.
        #[arg(short, long)]
        password_file: Option<PathBuf>,
    },
    /// Replay recorded dispositions back to the server.
    Push {
        /// IMAP server host name.
        server: String,
        /// Account to log in as.
        user: String,
        /// Read the password from this file instead of prompting.
        #[arg(short, long)]
        password_file: Option<PathBuf>,
        /// Only push this folder.
        #[arg(short, long)]
        folder: Option<String>,
        /// Only push this UID.
        #[arg(short, long)]
        uid: Option<Uid>,
        /// Where originals go before the stripped copy is appended.
        #[arg(long, default_value = "[Gmail]/Trash")]
        trash: String,
        /// Report what would happen without changing anything.
        #[arg(short = 'n', long)]
        dry_run: bool,
    },
    /// List the folders in the local store.
    Folders,
    /// List the mirrored messages in a folder.
    Messages {
        /// IMAP folder name.
        folder: String,
    },
    /// Show one message's headers and attachments.
    Show {
        /// IMAP folder name.
        folder: String,
        uid: Uid,
    },
    /// Record a disposition for one message.
    Mark {
        /// IMAP folder name.
        folder: String,
        uid: Uid,
        #[arg(value_enum)]
        disposition: Disposition,
    },
    /// Copy the attachments of download-marked messages into a directory.
    Copy {
        /// Destination directory.
        dest: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();
    env_logger::Builder::new()
        .filter_level(match cli.verbose {
            0 => LevelFilter::Error,
            1 => LevelFilter::Warn,
            2 => LevelFilter::Info,
            3 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        })
        .init();

    if let Err(e) = run(cli) {
        eprintln!("error: {}", e);
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let store = MailStore::new(&cli.directory);
    match cli.command {
        Command::Fetch {
            server,
            user,
            password_file,
        } => {
            let mut client = connect_and_login(&server, &user, password_file.as_deref())?;
            fetch::fetch_all(&mut client, &store)?;
            client.logout()
        }
        Command::Push {
            server,
            user,
            password_file,
            folder,
            uid,
            trash,
            dry_run,
        } => {
            let options = PushOptions {
                trash_mailbox: trash,
                folder,
                uid,
                dry_run,
            };
            let mut client = connect_and_login(&server, &user, password_file.as_deref())?;
            push::push_all(&mut client, &store, &options)?;
            client.logout()
        }
        Command::Folders => {
            for folder in store.folders()? {
                println!("{}", folder);
            }
            Ok(())
        }
        Command::Messages { folder } => {
            for uid in store.uids(&folder)? {
                let disposition = store.disposition(&folder, uid)?;
                let raw = store.message_raw(&folder, uid)?;
                let subject = mime::Message::parse(&raw)
                    .ok()
                    .and_then(|m| m.subject_header().map(str::to_string))
                    .unwrap_or_else(|| "-".to_string());
                println!("{:>8}  {:<8}  {}", uid, disposition, subject);
            }
            Ok(())
        }
        Command::Show { folder, uid } => {
            let raw = store.message_raw(&folder, uid)?;
            let msg = mime::Message::parse(&raw)?;
            println!("Date:    {}", msg.date_header().unwrap_or("-"));
            println!("From:    {}", msg.from_header().unwrap_or("-"));
            println!("Subject: {}", msg.subject_header().unwrap_or("-"));
            println!("Size:    {} bytes", raw.len());
            for (part, leaf) in msg.attachments() {
                println!(
                    "  {}  {}  {}  {} bytes{}",
                    part,
                    leaf.content_type,
                    leaf.filename.as_deref().unwrap_or("-"),
                    leaf.contents.len(),
                    if leaf.is_inline_image() { "  (inline image)" } else { "" }
                );
            }
            Ok(())
        }
        Command::Mark {
            folder,
            uid,
            disposition,
        } => store.set_disposition(&folder, uid, disposition),
        Command::Copy { dest } => export_attachments(&store, &dest),
    }
}

fn connect_and_login(
    server: &str,
    user: &str,
    password_file: Option<&Path>,
) -> Result<Client<TlsStream<TcpStream>>> {
    let password = match password_file {
        Some(path) => fs::read_to_string(path)?.trim().to_string(),
        None => rpassword::prompt_password("Password: ")?,
    };
    let mut client = Client::connect(server, IMAPS_PORT)?;
    client.login(user, &password)?;
    Ok(client)
}
