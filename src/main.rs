use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};
use voice_channel::config::NatsConfig;
use voice_channel::{
    create_router, supervise, AppState, CaptureConfig, ChannelServer, Config, CpalPlayer,
    CpalRecorder, VoiceChannel,
};

/// Voice recording and playback over a named method channel
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file (extension optional)
    #[arg(short, long, default_value = "config/voice-channel")]
    config: String,

    /// Serve the channel over NATS regardless of the config file
    #[arg(long)]
    nats: bool,

    /// Disable the HTTP transport
    #[arg(long)]
    no_http: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "voice_channel=info,tower_http=info".into()),
        )
        .init();

    let args = Args::parse();
    let cfg = Config::load(&args.config)?;

    let recordings_dir = cfg.audio.recordings_dir()?;
    info!("Voice channel {} v{}", cfg.channel.name, env!("CARGO_PKG_VERSION"));
    info!("Recordings directory: {}", recordings_dir.display());

    let recorder = CpalRecorder::new(CaptureConfig {
        sample_rate: cfg.audio.sample_rate(),
        channels: cfg.audio.channels(),
        container: cfg.audio.container,
    });
    let channel = Arc::new(VoiceChannel::new(
        Arc::new(recorder),
        Arc::new(CpalPlayer::new()),
        recordings_dir,
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut servers = Vec::new();

    if cfg.http.enabled && !args.no_http {
        let address = cfg.http.address();
        let listener = tokio::net::TcpListener::bind(&address)
            .await
            .with_context(|| format!("Failed to bind HTTP listener on {}", address))?;
        info!("HTTP transport listening on http://{}", address);

        let router = create_router(AppState::new(Arc::clone(&channel)));
        let mut rx = shutdown_rx.clone();
        servers.push(tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    let _ = rx.changed().await;
                })
                .await
                .context("HTTP server failed")
        }));
    }

    if cfg.nats.enabled || args.nats {
        let subject = NatsConfig::subject_for(&cfg.channel.name);
        let server = ChannelServer::connect(&cfg.nats.url, subject, Arc::clone(&channel)).await?;
        let mut rx = shutdown_rx.clone();
        servers.push(tokio::spawn(async move {
            server
                .serve(async move {
                    let _ = rx.changed().await;
                })
                .await
        }));
    }

    if servers.is_empty() {
        warn!("No transport enabled; nothing to serve");
        return Ok(());
    }

    let result = supervise(servers, tokio::signal::ctrl_c(), shutdown_tx).await;
    channel.shutdown().await;
    result
}
