//! # notevault
//!
//! Command-line front end for encrypted note vaults kept on a folder
//! remote with a local cache. Every command opens the vault through the
//! cache-aware provider, so edits made while the remote is unreachable are
//! kept locally and uploaded by `notevault sync`.

mod config;

use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use notevault_document::{EncryptedDatabase, Group, Note, Property, PropertyKind, VaultSession};
use notevault_remote::{ConflictResolution, FolderApiClient};
use notevault_shared::DocumentKey;
use notevault_store::{CacheDir, Database};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use crate::config::VaultConfig;

#[derive(Parser)]
#[command(name = "notevault", version)]
#[command(about = "Encrypted notes synchronized through a cached remote", long_about = None)]
struct Cli {
    /// Remote path of the vault document
    #[arg(short, long, global = true, default_value = "/vault.nvdb")]
    vault: String,

    /// Vault password
    #[arg(short, long, global = true, env = "NOTEVAULT_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new vault on the remote
    Init,

    /// Print the group tree with note titles
    Tree,

    /// Add a group
    AddGroup {
        title: String,

        /// Parent group title or uid (defaults to the root)
        #[arg(long)]
        parent: Option<String>,
    },

    /// Add a note
    AddNote(AddNoteArgs),

    /// Search notes by title, field name or field value
    Find {
        query: String,

        /// Print matches as JSON
        #[arg(long)]
        json: bool,

        /// Include protected values in the output
        #[arg(long)]
        reveal: bool,
    },

    /// Change the vault password
    Passwd {
        #[arg(long, env = "NOTEVAULT_NEW_PASSWORD", hide_env_values = true)]
        new_password: String,
    },

    /// Show how the cached copy relates to the remote
    Status,

    /// Synchronize the vault, or every locally modified file with --all
    Sync {
        #[arg(long)]
        all: bool,

        /// Keep the local copy if both sides changed
        #[arg(long, conflicts_with = "force_remote")]
        force_local: bool,

        /// Take the remote copy if both sides changed
        #[arg(long)]
        force_remote: bool,
    },
}

#[derive(Args)]
struct AddNoteArgs {
    title: String,

    /// Group title or uid (defaults to the root)
    #[arg(short, long)]
    group: Option<String>,

    #[arg(long)]
    username: Option<String>,

    #[arg(long)]
    url: Option<String>,

    /// Value of the password field
    #[arg(long)]
    secret: Option<String>,

    /// Free-text notes
    #[arg(long)]
    text: Option<String>,

    /// Custom field as NAME=VALUE, may be repeated
    #[arg(long = "field", value_name = "NAME=VALUE")]
    fields: Vec<String>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,notevault=debug")),
        )
        .with_writer(std::io::stderr)
        .init();

    let Cli {
        vault,
        password,
        command,
    } = Cli::parse();
    let config = VaultConfig::from_env();
    info!(?config, "Loaded configuration");

    let session = open_session(&config)?;

    match command {
        Commands::Init => {
            let created = session.create(&vault, require_key(&password)?)?;
            report_deferred(created.deferred);
            let root = created.value.root_group()?;
            println!("created {} (root group {})", vault, root.uid);
        }
        Commands::Tree => {
            let db = open_vault(&session, &vault, &password)?;
            print_tree(&db)?;
        }
        Commands::AddGroup { title, parent } => {
            let db = open_vault(&session, &vault, &password)?;
            let parent = resolve_group(&db, parent.as_deref())?;
            let outcome = db.insert_group(Group::new(parent, title))?;
            report_deferred(outcome.deferred);
            println!("{}", outcome.value.uid);
        }
        Commands::AddNote(args) => {
            let db = open_vault(&session, &vault, &password)?;
            let group = resolve_group(&db, args.group.as_deref())?;
            let outcome = db.insert_note(build_note(group, args)?)?;
            report_deferred(outcome.deferred);
            println!("{}", outcome.value.uid);
        }
        Commands::Find {
            query,
            json,
            reveal,
        } => {
            let db = open_vault(&session, &vault, &password)?;
            let mut notes = db.find_notes(&query)?;
            if !reveal {
                notes.iter_mut().for_each(mask_protected);
            }
            if json {
                println!("{}", serde_json::to_string_pretty(&notes)?);
            } else {
                for note in &notes {
                    println!("{}  {}", note.uid, note.title);
                    for property in &note.properties {
                        println!("    {}: {}", property.name, property.value);
                    }
                }
            }
        }
        Commands::Passwd { new_password } => {
            let db = open_vault(&session, &vault, &password)?;
            let old = require_key(&password)?;
            let outcome = db.change_key(&old, &DocumentKey::from_password(&new_password)?)?;
            report_deferred(outcome.deferred);
            println!("password changed");
        }
        Commands::Status => {
            let status = session.sync_status(&vault, config.sync_strategy);
            println!("{}: {:?}", vault, status);
        }
        Commands::Sync {
            all,
            force_local,
            force_remote,
        } => {
            if all {
                let report = session.sync_all(config.sync_strategy)?;
                println!("{}", serde_json::to_string_pretty(&report)?);
                if !report.is_clean() {
                    bail!("some files were not synchronized");
                }
            } else {
                let resolution = match (force_local, force_remote) {
                    (true, _) => Some(ConflictResolution::ForceLocal),
                    (_, true) => Some(ConflictResolution::ForceRemote),
                    _ => None,
                };
                let outcome = session.sync(&vault, config.sync_strategy, resolution)?;
                println!(
                    "{}: {:?} ({:?})",
                    vault, outcome.action, outcome.resolution
                );
            }
        }
    }

    Ok(())
}

fn open_session(config: &VaultConfig) -> anyhow::Result<VaultSession> {
    std::fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("creating {}", config.data_dir.display()))?;

    let api = FolderApiClient::new(config.remote_dir.clone(), config.remote_user.clone())?;
    let db = Database::open_at(&config.cache_db_path())?.into_shared();
    let cache = CacheDir::new(config.cache_files_dir())?;

    Ok(VaultSession::new(Arc::new(api), db, cache, config.provider))
}

fn require_key(password: &Option<String>) -> anyhow::Result<DocumentKey> {
    match password {
        Some(password) => Ok(DocumentKey::from_password(password)?),
        None => bail!("a password is required (--password or NOTEVAULT_PASSWORD)"),
    }
}

fn open_vault(
    session: &VaultSession,
    vault: &str,
    password: &Option<String>,
) -> anyhow::Result<EncryptedDatabase> {
    let opened = session
        .open(vault, require_key(password)?)
        .with_context(|| format!("opening {}", vault))?;
    if opened.deferred {
        warn!(%vault, "remote unreachable, working on the cached copy");
    }
    Ok(opened.value)
}

fn report_deferred(deferred: bool) {
    if deferred {
        warn!("change kept in the local cache only, run `notevault sync` once online");
    }
}

/// Accepts a group uid or a case-insensitive title. `None` means the root.
fn resolve_group(db: &EncryptedDatabase, reference: Option<&str>) -> anyhow::Result<Uuid> {
    let Some(reference) = reference else {
        return Ok(db.root_group()?.uid);
    };
    if let Ok(uid) = Uuid::parse_str(reference) {
        return Ok(db.get_group(&uid)?.uid);
    }

    let mut matches: Vec<_> = db
        .find_groups(reference)?
        .into_iter()
        .filter(|g| g.title.eq_ignore_ascii_case(reference))
        .collect();
    match matches.len() {
        0 => bail!("no group titled {reference:?}"),
        1 => Ok(matches.remove(0).uid),
        n => bail!("{n} groups are titled {reference:?}, pass a uid instead"),
    }
}

fn build_note(group: Uuid, args: AddNoteArgs) -> anyhow::Result<Note> {
    let mut note = Note::new(group, args.title);
    let standard = [
        (PropertyKind::Username, args.username),
        (PropertyKind::Url, args.url),
        (PropertyKind::Password, args.secret),
        (PropertyKind::Text, args.text),
    ];
    for (kind, value) in standard {
        if let Some(value) = value {
            note = note.with_property(Property::standard(kind, value));
        }
    }
    for field in args.fields {
        let Some((name, value)) = field.split_once('=') else {
            bail!("custom fields take the form NAME=VALUE, got {field:?}");
        };
        note = note.with_property(Property::custom(name.trim(), value, false));
    }
    Ok(note)
}

fn mask_protected(note: &mut Note) {
    for property in note.properties.iter_mut().filter(|p| p.protected) {
        property.value = "********".to_string();
    }
}

fn print_tree(db: &EncryptedDatabase) -> anyhow::Result<()> {
    let root = db.root_group()?;
    let mut stack = vec![(root, 0usize)];

    while let Some((group, depth)) = stack.pop() {
        let indent = "  ".repeat(depth);
        println!("{indent}{}/", group.title);
        for note in db.notes_in(&group.uid)? {
            println!("{indent}  - {}", note.title);
        }
        let children = db.child_groups(&group.uid)?;
        stack.extend(children.into_iter().rev().map(|child| (child, depth + 1)));
    }
    Ok(())
}
