use anyhow::{Context, Result};
use clap::Parser;
use modality_sessions::{
    create_router, AppState, Config, DirectoryPlaybackProvider, Devices, FileMicrophoneProvider,
    Orchestrator, StillImageCameraProvider, WebSocketConnector,
};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "modality-sessions", version, about = "Video and audio analysis session coordinator")]
struct Args {
    /// Config file (TOML); the extension may be omitted
    #[arg(short, long, default_value = "config/modality-sessions")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let cfg = Arc::new(Config::load(&args.config)?);

    info!("{} v{}", cfg.service.name, env!("CARGO_PKG_VERSION"));
    info!("Analysis service: {}", cfg.remote.base_url);
    match &cfg.video.source_image {
        Some(path) => info!("Camera source: {}", path.display()),
        None => info!("No camera source configured; video capture will report the device unavailable"),
    }
    match &cfg.audio.source_file {
        Some(path) => info!("Microphone source: {}", path.display()),
        None => info!("No microphone source configured; recording will report the device unavailable"),
    }

    let devices = Devices {
        camera: Arc::new(StillImageCameraProvider::new(cfg.video.source_image.clone())),
        microphone: Arc::new(FileMicrophoneProvider::new(cfg.audio.source_file.clone())),
        playback: Arc::new(DirectoryPlaybackProvider::new(cfg.audio.playback_dir.clone())),
    };

    let (orchestrator, inbox) = Orchestrator::new(Arc::clone(&cfg), Arc::new(WebSocketConnector::new()), devices);
    let handle = orchestrator.spawn(inbox);

    let app = create_router(AppState::new(handle.clone()));
    let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("HTTP control surface listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for ctrl-c: {}", e);
            }
            info!("Shutdown requested");
        })
        .await
        .context("HTTP server failed")?;

    if let Err(e) = handle.shutdown().await {
        error!("Orchestrator shutdown: {}", e);
    }

    info!("Stopped");
    Ok(())
}
