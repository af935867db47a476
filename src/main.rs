use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use loqa_asr::{
    create_router, transcribe_file, AppState, Config, SessionCallbacks, SessionError,
    TranscriptCollector,
};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "loqa-asr", version, about = "Streaming speech recognition client")]
struct Cli {
    /// Config file (extension optional)
    #[arg(short, long, default_value = "config/loqa-asr")]
    config: String,

    /// Log level for loqa-asr (overridden by RUST_LOG)
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Stream a WAV file through a live recognition session
    Transcribe {
        file: PathBuf,

        /// Seconds to keep the session open for final results after the audio ends
        #[arg(long, default_value_t = 3)]
        linger_secs: u64,
    },
    /// Run the sign endpoint for clients without the shared secret
    Serve,
}

/// Prints partial results in place and final ones on their own line
struct ConsolePrinter {
    collector: TranscriptCollector,
}

impl SessionCallbacks for ConsolePrinter {
    fn on_result_change(&self, text: &str, is_partial: bool) {
        self.collector.on_result_change(text, is_partial);

        if is_partial {
            print!("\r{}", text);
            std::io::stdout().flush().ok();
        } else {
            println!("\r{}", text);
        }
    }

    fn on_status_change(&self, recording: bool) {
        info!("Recording: {}", recording);
    }

    fn on_error(&self, error: &SessionError) {
        error!("{}", error);
    }
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("loqa_asr={},warn", level)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn transcribe(cfg: &Config, file: PathBuf, linger: Duration) -> Result<()> {
    let printer = Arc::new(ConsolePrinter {
        collector: TranscriptCollector::new(),
    });
    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    };

    let snapshot = transcribe_file(
        cfg.session_config(),
        &file,
        cfg.audio.buffer_duration_ms,
        linger,
        Arc::clone(&printer) as Arc<dyn SessionCallbacks>,
        interrupt,
    )
    .await?;

    info!(
        "Session finished: {} channels, {} retries, {} frames sent ({} dropped), {} segments",
        snapshot.stats.channels_opened,
        snapshot.stats.retries_scheduled,
        snapshot.stats.frames_sent,
        snapshot.stats.frames_dropped,
        snapshot.stats.transcript_segments_count
    );

    println!();
    println!("{}", printer.collector.text());

    Ok(())
}

async fn serve(cfg: &Config) -> Result<()> {
    let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("Sign endpoint listening on {}", addr);

    let state = AppState::new(cfg.asr.app_key.clone(), cfg.asr.secret.clone());
    axum::serve(listener, create_router(state))
        .await
        .context("HTTP server failed")
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    let cfg = Config::load(&cli.config)?;
    info!("Loqa ASR v{}", env!("CARGO_PKG_VERSION"));
    info!("Loaded config: {}", cfg.service.name);

    match cli.command {
        Command::Transcribe { file, linger_secs } => {
            transcribe(&cfg, file, Duration::from_secs(linger_secs)).await
        }
        Command::Serve => serve(&cfg).await,
    }
}
