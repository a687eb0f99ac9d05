//! mailrag - build a semantic search corpus from a Gmail mailbox
//!
//! | Command | Description |
//! |---------|-------------|
//! | `mailrag auth` | Run browser consent and save the credential |
//! | `mailrag sync` | Ingest mail newer than the cursor |
//! | `mailrag search "<text>"` | Print stored bodies similar to the text |
//! | `mailrag cursor show` | Print the sync cursor |
//! | `mailrag cursor set <YYYY-MM-DD>` | Seed or reset the sync cursor |

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{error, info, warn};
use mailrag::{
    CredentialManager, CursorFile, Error, GmailClient, OAuthClient, OAuthEndpoints, OllamaClient,
    Settings, SqliteVectorStore, SyncContext, SyncCursor, acquire_initial_grant, semantic_search,
    sync_mailbox,
};

#[derive(Parser)]
#[command(name = "mailrag", version, about = "Embed your Gmail into a local vector store")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Authorize Gmail access in the browser and save the credential.
    Auth,

    /// Ingest every message received after the sync cursor.
    Sync,

    /// Print stored message bodies similar to the given text.
    Search {
        text: String,

        /// Minimum cosine similarity, in [-1, 1].
        #[arg(long, allow_negative_numbers = true)]
        threshold: Option<f32>,
    },

    /// Inspect or seed the sync cursor.
    Cursor {
        #[command(subcommand)]
        action: CursorAction,
    },
}

#[derive(Subcommand)]
enum CursorAction {
    /// Print the current cursor date.
    Show,

    /// Set the cursor to a date (YYYY-MM-DD).
    Set { date: String },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli.command) {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Auth => auth(&Settings::load()?),
        Commands::Sync => sync(&Settings::load()?),
        Commands::Search { text, threshold } => search(&Settings::load()?, &text, threshold),
        // Cursor commands work without OAuth settings
        Commands::Cursor { action } => {
            let data_dir = Settings::data_dir(&Settings::environment()?)?;
            cursor(CursorFile::in_dir(&data_dir), action)
        }
    }
}

fn oauth_client(settings: &Settings) -> OAuthClient {
    OAuthClient::new(OAuthEndpoints::default(), settings.refresh_margin())
}

fn auth(settings: &Settings) -> Result<()> {
    let oauth = oauth_client(settings);
    let credential = acquire_initial_grant(
        &oauth,
        &settings.gmail.client_id,
        &settings.gmail.client_secret,
        settings.gmail.redirect_port,
    )?;

    let file = settings.credential_file();
    file.save(&credential)?;
    info!("Credential saved to {}", file.path().display());

    let cursor = settings.cursor_file();
    if matches!(cursor.load(), Err(Error::CacheMissing(_))) {
        warn!("No sync cursor yet; seed one with `mailrag cursor set <YYYY-MM-DD>`");
    }
    Ok(())
}

fn ollama_client(settings: &Settings) -> OllamaClient {
    OllamaClient::new(settings.embedding.base_url(), settings.embedding.model.as_str())
        .with_context_length(settings.embedding.context_length)
}

fn sync(settings: &Settings) -> Result<()> {
    let credential_file = settings.credential_file();
    let credential = credential_file
        .load(&settings.gmail.client_id, &settings.gmail.client_secret)
        .context("No usable credential; run `mailrag auth` first")?;

    let manager = Arc::new(
        CredentialManager::new(oauth_client(settings), credential).with_file(credential_file),
    );
    let gmail = GmailClient::new(Arc::clone(&manager));
    let embedder = ollama_client(settings);
    let store = SqliteVectorStore::open(&settings.store_path)?;
    let cursor = settings.cursor_file();

    let stats = sync_mailbox(&SyncContext {
        tokens: manager.as_ref(),
        source: &gmail,
        embedder: &embedder,
        store: &store,
        cursor: &cursor,
    })?;

    println!(
        "Synced mail after {}: {} listed, {} already stored, {} without text, {} inserted ({}ms)",
        stats.since,
        stats.messages_listed,
        stats.messages_skipped,
        stats.messages_without_text,
        stats.documents_inserted,
        stats.duration_ms
    );
    Ok(())
}

fn search(settings: &Settings, text: &str, threshold: Option<f32>) -> Result<()> {
    let threshold = threshold.unwrap_or(settings.search_threshold);
    anyhow::ensure!(
        (-1.0..=1.0).contains(&threshold),
        "threshold must be within [-1, 1], got {}",
        threshold
    );

    let embedder = ollama_client(settings);
    let store = SqliteVectorStore::open(&settings.store_path)?;

    let hits = semantic_search(&embedder, &store, text, threshold)?;
    if hits.is_empty() {
        info!("No documents at or above {}", threshold);
    }
    for (i, contents) in hits.iter().enumerate() {
        if i > 0 {
            println!("---");
        }
        println!("{}", contents.trim_end());
    }
    Ok(())
}

fn cursor(file: CursorFile, action: CursorAction) -> Result<()> {
    match action {
        CursorAction::Show => {
            let cursor = file.load()?;
            println!("{}", cursor);
        }
        CursorAction::Set { date } => {
            let cursor = SyncCursor::parse_iso(&date)?;
            file.store(&cursor)?;
            info!("Sync cursor set to {} ({})", cursor, file.path().display());
        }
    }
    Ok(())
}
