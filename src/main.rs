use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};
use voice_chat::{
    create_router, AppState, Config, ExecutionContext, LoopbackConnector, LoopbackOptions,
    ManagerOptions, SessionClient, SessionManager, WavCapture,
};

#[derive(Debug, Parser)]
#[command(name = "voice-chat", version, about = "Voice chat session orchestrator")]
struct Cli {
    /// Configuration file (extension optional)
    #[arg(long, default_value = "config/voice-chat")]
    config: String,

    /// Where this client runs relative to the backend
    #[arg(long, value_enum, default_value_t = ExecutionContext::Browser)]
    context: ExecutionContext,

    /// WAV file used as the microphone
    #[arg(long)]
    wav: Option<String>,

    /// View server port
    #[arg(long)]
    port: Option<u16>,

    /// Do not connect on start-up
    #[arg(long)]
    no_auto_connect: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let mut cfg = Config::load(&cli.config)?;
    if let Some(wav) = cli.wav {
        cfg.capture.wav_path = Some(wav);
    }
    if let Some(port) = cli.port {
        cfg.view.port = port;
    }
    if cli.no_auto_connect {
        cfg.view.auto_connect = false;
    }

    info!("Voice chat v{}", env!("CARGO_PKG_VERSION"));

    let client = SessionClient::from_config(&cfg.backend, cli.context)?;

    let mut loopback = LoopbackOptions::with_agent("voice-agent");
    loopback.echo = true;

    let manager = SessionManager::new(
        Arc::new(client),
        Arc::new(LoopbackConnector::new(loopback)),
        Arc::new(WavCapture::from_config(&cfg.capture)),
        ManagerOptions::from(&cfg),
    );

    if cfg.view.auto_connect {
        manager.connect().await;
        if let Some(error) = manager.snapshot().error {
            warn!("Initial connect failed: {}", error);
        }
    }

    let addr: SocketAddr = format!("{}:{}", cfg.view.bind, cfg.view.port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", cfg.view.bind, cfg.view.port))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("View server listening on http://{}", addr);

    let app = create_router(AppState::new(manager.clone()));
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("View server failed")?;

    info!("Shutting down");
    manager.disconnect().await;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl-C: {}", e);
    }
}
