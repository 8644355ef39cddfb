use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tokio::sync::broadcast;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use camfeed::config::AppConfig;
use camfeed::state::AppState;
use camfeed::video::capture::SourceSpec;
use camfeed::web;

/// Log level for the application
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

/// camfeed command line arguments
#[derive(Parser, Debug)]
#[command(name = "camfeed")]
#[command(version, about = "Camera streaming backend with MJPEG feeds and dashboard metadata", long_about = None)]
struct CliArgs {
    /// Listen address (overrides config file)
    #[arg(short = 'a', long, value_name = "ADDRESS")]
    address: Option<String>,

    /// HTTP port (overrides config file)
    #[arg(short = 'p', long, value_name = "PORT")]
    port: Option<u16>,

    /// Path to TOML configuration file
    #[arg(short = 'c', long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Webcam device index (selects webcam mode)
    #[arg(long, value_name = "INDEX")]
    camera_index: Option<usize>,

    /// Motion-JPEG clip to loop instead of a webcam (selects file mode)
    #[arg(long, value_name = "FILE")]
    video_file: Option<PathBuf>,

    /// Capture width
    #[arg(long, value_name = "PIXELS")]
    width: Option<u32>,

    /// Capture height
    #[arg(long, value_name = "PIXELS")]
    height: Option<u32>,

    /// Target frame rate
    #[arg(long, value_name = "FPS")]
    fps: Option<u32>,

    /// JPEG quality (1-100)
    #[arg(long, value_name = "QUALITY")]
    quality: Option<u32>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short = 'l', long, value_name = "LEVEL", default_value = "info")]
    log_level: LogLevel,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();

    init_logging(args.log_level, args.verbose);

    tracing::info!("Starting camfeed v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration file, fall back to defaults when absent
    let mut config = match &args.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };

    // Apply CLI argument overrides (only when explicitly specified)
    if let Some(addr) = args.address {
        config.web.bind_address = addr;
    }
    if let Some(port) = args.port {
        config.web.port = port;
    }
    if let Some(index) = args.camera_index {
        config.camera.use_webcam = true;
        config.camera.camera_index = index;
    }
    if let Some(path) = args.video_file {
        config.camera.use_webcam = false;
        config.camera.video_file = path;
    }
    if let Some(width) = args.width {
        config.video.width = width;
    }
    if let Some(height) = args.height {
        config.video.height = height;
    }
    if let Some(fps) = args.fps {
        config.video.fps = fps;
    }
    if let Some(quality) = args.quality {
        config.video.quality = quality;
    }

    match config.camera.source() {
        SourceSpec::Webcam { index } => {
            tracing::info!("Mode: webcam (/dev/video{})", index);
        }
        SourceSpec::File { path } => {
            tracing::info!("Mode: clip file ({})", path.display());
            if !path.exists() {
                tracing::warn!(
                    "Clip file {} not found; streams will serve blank frames",
                    path.display()
                );
            }
        }
    }
    tracing::info!(
        "Capture: {} @ {}fps, JPEG quality {}",
        config.video.resolution(),
        config.video.fps,
        config.video.quality
    );

    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let state = AppState::new(config.clone(), shutdown_tx.clone());

    let app = web::create_router(state.clone());

    let addr: SocketAddr = format!("{}:{}", config.web.bind_address, config.web.port)
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid bind address: {}", e))?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Starting HTTP server on {}", addr);
    tracing::info!("Dashboard: {}/api/dashboard", config.web.public_url);
    tracing::info!("Video: {}/api/video/live", config.web.public_url);

    // Graceful shutdown
    let shutdown_signal = async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install CTRL+C handler: {}", e);
            return;
        }
        tracing::info!("Shutdown signal received");
        let _ = shutdown_tx.send(());
    };

    let server = axum::serve(listener, app);
    tokio::select! {
        _ = shutdown_signal => {
            cleanup(&state).await;
        }
        result = server => {
            if let Err(e) = result {
                tracing::error!("HTTP server error: {}", e);
            }
            cleanup(&state).await;
        }
    }

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Initialize logging with tracing
fn init_logging(level: LogLevel, verbose_count: u8) {
    // Verbose count overrides log level
    let effective_level = match verbose_count {
        0 => level,
        1 => LogLevel::Debug,
        _ => LogLevel::Trace,
    };

    let filter = match effective_level {
        LogLevel::Error => "camfeed=error,tower_http=error",
        LogLevel::Warn => "camfeed=warn,tower_http=warn",
        LogLevel::Info => "camfeed=info,tower_http=info",
        LogLevel::Debug => "camfeed=debug,tower_http=debug",
        LogLevel::Trace => "camfeed=trace,tower_http=debug",
    };

    // Environment variable takes highest priority
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into());

    if let Err(err) = tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
    {
        eprintln!("failed to initialize tracing: {}", err);
    }
}

/// Clean up subsystems on shutdown
async fn cleanup(state: &Arc<AppState>) {
    state.capture.release().await;
    tracing::info!("Capture released");
}
