//! Convo application binary - composition root.
//!
//! 1. Parse CLI flags and load configuration from TOML
//! 2. Initialize tracing on stderr
//! 3. Connect the document store and auth provider (Supabase, or in-memory
//!    when no backend is configured)
//! 4. Build the key-point extractor and the terminal-backed devices
//! 5. Run the interactive shell on stdin/stdout

mod cli;
mod router;
mod shell;
mod terminal;

use std::sync::Arc;

use clap::Parser;
use tokio::sync::broadcast::error::RecvError;

use convo_auth::{AuthFlow, AuthProvider, MockAuthProvider, SessionContext, SupabaseAuth};
use convo_core::config::ConvoConfig;
use convo_core::events::{NoticeBus, NoticeLevel};
use convo_insight::KeyPointExtractor;
use convo_session::{ChannelRecognizer, MemoryRecorder, SessionDevices};
use convo_storage::{ConversationCatalog, DocumentStore, InMemoryStore, SupabaseClient, SupabaseStore};

use crate::cli::CliArgs;
use crate::shell::{Services, Shell};
use crate::terminal::{CommandClipboard, Console, NoShareSheet};

/// Print notices as they arrive until the bus is dropped.
async fn print_notices(notices: NoticeBus) {
    let mut rx = notices.subscribe();
    loop {
        match rx.recv().await {
            Ok(notice) => {
                let tag = match notice.level {
                    NoticeLevel::Success => "ok",
                    NoticeLevel::Info => "..",
                    NoticeLevel::Warning => "!!",
                    NoticeLevel::Error => "xx",
                };
                println!("[{}] {}", tag, notice.message);
            }
            Err(RecvError::Lagged(skipped)) => {
                tracing::debug!(skipped, "Notice printer lagged");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

/// Pick the backend: Supabase when configured, otherwise in memory.
fn connect(
    config: &ConvoConfig,
    offline: bool,
) -> Result<(Arc<dyn DocumentStore>, Arc<dyn AuthProvider>), Box<dyn std::error::Error>> {
    if offline || !config.backend.is_configured() {
        tracing::info!("No backend configured; conversations are kept in memory");
        return Ok((
            Arc::new(InMemoryStore::new()),
            Arc::new(MockAuthProvider::new()),
        ));
    }

    // One client so the auth provider's access token reaches store requests.
    let client = SupabaseClient::from_config(&config.backend)?;
    tracing::info!(url = %config.backend.url, "Connected to Supabase");
    Ok((
        Arc::new(SupabaseStore::new(client.clone())),
        Arc::new(SupabaseAuth::new(client)),
    ))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config.
    let config_file = args.resolve_config_path();
    let mut config = ConvoConfig::load_or_default(&config_file);
    config.apply_env_overrides();

    // Tracing. RUST_LOG > --log-level > config.
    let level = args.resolve_log_level(&config.general.log_level);
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&level)),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Starting Convo v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(path = %config_file.display(), "Configuration loaded");

    // Backend.
    let (store, provider) = connect(&config, args.offline)?;
    let notices = NoticeBus::default();
    tokio::spawn(print_notices(notices.clone()));

    let auth = AuthFlow::new(
        SessionContext::new(provider),
        Arc::clone(&store),
        notices.clone(),
        config.auth.clone(),
    );
    let catalog = ConversationCatalog::new(store, notices.clone());
    let extractor = KeyPointExtractor::from_config(&config.analysis);

    // Devices.
    let recognizer = ChannelRecognizer::new();
    let feed = recognizer.feed();
    let devices = SessionDevices {
        recognizer: Arc::new(recognizer),
        recorder: Arc::new(MemoryRecorder::new()),
        share: Arc::new(NoShareSheet),
        clipboard: Arc::new(CommandClipboard::from_config(&config.share)),
    };

    let console = Arc::new(Console::stdin(args.assume_yes));
    let services = Services {
        auth,
        catalog,
        extractor,
        devices,
        feed,
        notices,
    };
    let mut shell = Shell::new(console, services, config);
    shell.run().await?;

    Ok(())
}
