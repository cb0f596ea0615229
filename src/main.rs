use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use snap_translate_lib::{
    AlertChoice, ClientSettings, EventSink, FileAcquirer, LanguageCode, SessionController, SessionEvent,
    TranslationOutcome,
};

/// Send a photo to the OCR/translation server and print the translated text
#[derive(Parser, Debug)]
#[command(name = "snap-translate", version)]
struct Cli {
    /// Image to translate
    #[arg(short, long)]
    image: PathBuf,

    /// Target language (en, fr, es); defaults to the configured language
    #[arg(short, long)]
    language: Option<LanguageCode>,

    /// Server address (host:port or URL), overrides the settings file
    #[arg(long)]
    server: Option<String>,

    /// Settings file to use instead of the per-user one
    #[arg(long)]
    config: Option<PathBuf>,

    /// How many times to retry the connection check before giving up
    #[arg(long, default_value_t = 1)]
    retries: u32,
}

/// Terminal stand-in for the mobile view
struct ConsoleView;

impl EventSink for ConsoleView {
    fn emit(&self, event: SessionEvent) -> Result<(), String> {
        match event {
            SessionEvent::StateChanged(snapshot) => {
                tracing::debug!(
                    phase = ?snapshot.phase,
                    connection = ?snapshot.connection,
                    busy = snapshot.busy,
                    "view updated"
                );
            }
            SessionEvent::ConnectionAlert { message } => {
                eprintln!("⚠ {}", message);
            }
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let mut settings = match &cli.config {
        Some(path) => ClientSettings::load_from(path)
            .await
            .with_context(|| format!("loading settings from {}", path.display()))?,
        None => ClientSettings::load().await.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "using default settings");
            ClientSettings::default()
        }),
    };
    if let Some(server) = cli.server {
        settings.server_address = server;
    }

    let session = SessionController::connect(
        &settings,
        Arc::new(FileAcquirer::new(&cli.image)),
        Arc::new(ConsoleView),
    )?;

    let mut status = session.start().await;
    let mut attempts = 0;
    while !status.is_connected() && attempts < cli.retries {
        attempts += 1;
        tracing::info!(attempt = attempts, "retrying connection");
        status = session
            .resolve_alert(AlertChoice::Retry)
            .await
            .unwrap_or(status);
    }
    if !status.is_connected() {
        session.resolve_alert(AlertChoice::Dismiss).await;
        bail!("server at {} is not reachable", settings.server_address);
    }

    session.pick_image().await?;
    if let Some(language) = cli.language {
        session.set_language(language)?;
    }

    let language = session.snapshot().language;
    tracing::info!(language = %language, name = language.display_name(), "translating");

    match session.submit().await? {
        TranslationOutcome::Success(translation) => {
            if let Some(extracted) = &translation.extracted_text {
                println!("Extracted: {}", extracted);
            }
            println!("{}", translation.text);
            Ok(())
        }
        _ => {
            let message = session
                .snapshot()
                .last_failure
                .unwrap_or_else(|| "translation failed".to_string());
            bail!(message)
        }
    }
}
