//! Generation Service (bestekar-gen) - Main entry point
//!
//! Background song-generation service for Bestekar: accepts requests
//! over HTTP, runs the multi-stage pipeline in a single worker, and
//! exposes job status for polling clients.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bestekar_gen::api;
use bestekar_gen::config::GenConfig;
use bestekar_gen::engine::assembler::SongAssembler;
use bestekar_gen::engine::model::{ModelPool, MusicModel, RemoteMusicModel};
use bestekar_gen::engine::profile::{default_mirrors, ProfileLibrary};
use bestekar_gen::engine::vocal::{CommandSynthesizer, CommandVoiceConverter, VoicePipeline};
use bestekar_gen::tasks::{JobStore, TaskManager};

/// Command-line arguments for bestekar-gen
#[derive(Parser, Debug)]
#[command(name = "bestekar-gen")]
#[command(about = "Song generation service for Bestekar")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "5750", env = "BESTEKAR_PORT")]
    port: u16,

    /// Output folder for generated songs
    #[arg(short, long, env = "BESTEKAR_MUSIC_FOLDER")]
    music_folder: Option<String>,

    /// Folder holding voice conversion profiles
    #[arg(long, env = "BESTEKAR_PROFILES_FOLDER")]
    profiles_folder: Option<String>,

    /// Endpoint of the music generation daemon
    #[arg(long, env = "BESTEKAR_MODEL_ENDPOINT")]
    model_endpoint: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bestekar_gen=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Parse command-line arguments
    let args = Args::parse();

    let config = GenConfig::load(
        args.music_folder.as_deref(),
        args.profiles_folder.as_deref(),
        args.model_endpoint.as_deref(),
    )
    .context("Failed to load configuration")?;

    info!("Starting Bestekar generation service on port {}", args.port);
    info!("Music folder: {}", config.music_folder.display());
    info!("Model endpoint: {}", config.model_endpoint);

    std::fs::create_dir_all(&config.music_folder)
        .context("Failed to create music folder")?;

    // Model pool: the model loads lazily on the first generation request
    let endpoint = config.model_endpoint.clone();
    let model = ModelPool::spawn(Box::new(move || {
        Ok(Box::new(RemoteMusicModel::new(endpoint)?) as Box<dyn MusicModel>)
    }));

    // Vocal pipeline with the default profile library and mirrors
    let vocal = Arc::new(VoicePipeline::new(
        Box::new(CommandSynthesizer::default()),
        Box::new(CommandVoiceConverter::default()),
        ProfileLibrary::new(&config.profiles_folder),
        default_mirrors(),
        config.tts_voice.clone(),
    ));

    let assembler = Arc::new(SongAssembler::new(model, vocal, &config));
    let store = Arc::new(JobStore::new(config.result_retention_secs));
    let manager = TaskManager::spawn(&config, Arc::clone(&store), assembler);
    info!("Generation engine initialized");

    // Build the application router
    let app_state = api::AppState {
        manager,
        store,
        music_folder: config.music_folder.to_string_lossy().to_string(),
        port: args.port,
    };

    let app = api::create_router(app_state);

    // Create socket address
    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));

    info!("Starting HTTP server on {}", addr);

    // Create and run the server
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
