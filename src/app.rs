/*
 * Responsibility
 * - tracing / panic hook の初期化
 * - Config読み込み → AppState 生成 → Router 組み立て
 * - axum::serve() で起動 (peer アドレス付き、graceful shutdown)
 */
use std::{net::SocketAddr, panic, process};

use anyhow::{Context, Result};
use axum::Router;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::{
    api,
    config::Config,
    middleware::http::{self, HttpLimits},
    services::snapshot::JwtSettings,
    state::AppState,
};

fn init_tracing() {
    // Prefer RUST_LOG if set; otherwise use a sensible default.
    // Ex:
    // RUST_LOG=info,http_echo=debug,tower_http=debug cargo run
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,tower_http=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn init_panic_hook(abort_on_panic: bool) {
    let default_hook = panic::take_hook();

    panic::set_hook(Box::new(move |info| {
        // Always surface panics via tracing so they don't get lost.
        tracing::error!(?info, "panic");

        // Development: fail fast. Production: default hook, keep serving.
        if abort_on_panic {
            process::abort();
        } else {
            default_hook(info);
        }
    }))
}

pub async fn run() -> Result<()> {
    init_tracing();
    let config = Config::from_env().context("failed to load configuration")?;

    init_panic_hook(!config.app_env.is_production());

    tracing::info!(
        addr = %config.addr,
        env = ?config.app_env,
        jwt_header = config.jwt_header.as_ref().map(|h| h.as_str()).unwrap_or("<disabled>"),
        log_jwt = config.log_jwt,
        "starting HTTP echo server"
    );

    let state = build_state(&config);
    let app = build_router(state, &config);

    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("failed to bind {}", config.addr))?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server failed")?;

    tracing::info!("server has shut down gracefully");
    Ok(())
}

fn build_state(config: &Config) -> AppState {
    let os_hostname = gethostname::gethostname().to_string_lossy().into_owned();

    let jwt = JwtSettings {
        header: config.jwt_header.clone(),
        log: config.log_jwt,
    };

    AppState::new(os_hostname, jwt, config.body_limit_bytes)
}

fn build_router(state: AppState, config: &Config) -> Router {
    let router = api::routes().with_state(state);

    http::apply(
        router,
        HttpLimits {
            body_limit_bytes: config.body_limit_bytes,
            request_timeout: config.request_timeout,
        },
    )
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to install Ctrl+C handler");
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
                tracing::warn!(error = %e, "failed to install SIGTERM handler");
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
