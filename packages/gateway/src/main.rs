use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use gateway::config::AppConfig;
use gateway::database::init_db;
use gateway::notify::TracingNotifier;
use gateway::pipeline::{Pipeline, PipelineSettings};
use gateway::sink::HttpSink;
use gateway::state::AppState;
use tokio_util::sync::CancellationToken;
use tracing::{Level, error, info};
use upstream::DocrobotClient;

/// Relay EDI documents from the exchange to the downstream receiver.
#[derive(Parser, Debug)]
#[command(name = "edi-gateway", version)]
struct Args {
    /// Run a single fetch and delivery cycle, then exit.
    #[arg(long)]
    once: bool,

    /// Configuration file (extension optional).
    #[arg(long, env = gateway::config::CONFIG_PATH_ENV)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    let args = Args::parse();
    let config = AppConfig::load(args.config.as_deref()).context("Failed to load configuration")?;

    let db = init_db(&config.database)
        .await
        .context("Failed to connect to database")?;
    info!("Database connected and schema synced");

    let source = DocrobotClient::new(config.upstream.clone())
        .context("Failed to build upstream client")?;
    let sink = HttpSink::new(config.downstream.clone()).context("Failed to build downstream sink")?;

    let pipeline = Arc::new(Pipeline::new(
        db.clone(),
        Arc::new(source),
        Arc::new(sink),
        Arc::new(TracingNotifier),
        PipelineSettings::from_config(&config),
    ));

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            shutdown_signal().await;
            cancel.cancel();
        }
    });

    let ops_server = if config.ops.enabled && !args.once {
        let addr = format!("{}:{}", config.ops.host, config.ops.port);
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Failed to bind operator API on {addr}"))?;
        info!("Operator API listening on http://{}", addr);

        let app = gateway::build_router(AppState {
            pipeline: pipeline.clone(),
            db,
        });
        let shutdown = cancel.clone();
        Some(tokio::spawn(async move {
            let serve = axum::serve(listener, app)
                .with_graceful_shutdown(async move { shutdown.cancelled().await });
            if let Err(e) = serve.await {
                error!(error = %e, "Operator API stopped");
            }
        }))
    } else {
        None
    };

    pipeline.run(cancel.clone(), args.once).await;

    if let Some(handle) = ops_server {
        cancel.cancel();
        let _ = handle.await;
    }

    Ok(())
}

async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, finishing current operation"),
        _ = terminate => info!("Received SIGTERM, finishing current operation"),
    }
}
