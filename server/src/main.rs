use std::{fs::OpenOptions, net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use axum_server::{tls_rustls::RustlsConfig, Handle};
use matchday_data_management::DataManager;
use server::{
    advisor::{backend::OpenAiCompatibleLoader, TrafficAdvisor},
    app,
    config::{self, Config},
    server_state::ServerState,
};
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    let log_dir = config::log_dir();
    std::fs::create_dir_all(&log_dir).with_context(|| format!("Failed to create log directory {}", log_dir.display()))?;

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("server.log"))
        .context("Failed to open log file")?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| format!("{}=trace,matchday_data_management=debug", env!("CARGO_CRATE_NAME")).into())
        )
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(file))
        .init();

    tracing::info!("Starting server...");

    let config = Config::load()?;

    let data_manager = DataManager::start(config.database.as_ref()).await
        .context("Failed to start data manager")?;

    let loader = OpenAiCompatibleLoader::new(
        &config.llm.base_url,
        config.llm.api_key.clone(),
        &config.llm.model,
        config.llm.advisor.generation_timeout,
    )?;
    tracing::info!(model = %config.llm.model, url = %config.llm.base_url, "Inference backend will load on first advice request");

    if let Some(fixture) = &config.fixture {
        tracing::info!(club = %fixture.favorite_club, game_time = %fixture.game_time, "Advice is pinned to a fixture");
    }

    let server_state = Arc::new(ServerState {
        data_manager,
        advisor: TrafficAdvisor::new(loader, config.llm.advisor.clone()),
        fixture: config.fixture.clone(),
    });

    let app = app(server_state.clone(), &config.allowed_origins);
    let addr = SocketAddr::from((config.bind_address, config.port));

    match &config.tls {
        Some(tls) => {
            let rustls = RustlsConfig::from_pem_file(&tls.cert, &tls.key)
                .await
                .context("Failed to load TLS certificate")?;

            let handle = Handle::new();
            let shutdown = handle.clone();
            tokio::spawn(async move {
                shutdown_signal().await;
                server_state.advisor.close();
                shutdown.graceful_shutdown(Some(Duration::from_secs(10)));
            });

            tracing::info!("Listening on https://{addr}");
            axum_server::bind_rustls(addr, rustls)
                .handle(handle)
                .serve(app.into_make_service_with_connect_info::<SocketAddr>())
                .await?;
        }
        None => {
            let listener = tokio::net::TcpListener::bind(addr).await
                .with_context(|| format!("Failed to bind {addr}"))?;

            tracing::info!("Listening on http://{}", listener.local_addr()?);
            axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
                .with_graceful_shutdown(async move {
                    shutdown_signal().await;
                    server_state.advisor.close();
                })
                .await?;
        }
    }

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {err}");
            std::future::pending::<()>().await;
        }
        tracing::info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                tracing::info!("Received terminate signal, shutting down");
            }
            Err(err) => {
                tracing::error!("Failed to install terminate handler: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
