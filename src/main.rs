use std::sync::Arc;

use axum::body::Body;
use axum::http::Request;
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as AutoBuilder;
use tokio_util::sync::CancellationToken;

use chatstream::config::{load_config, AppConfig};
use chatstream::observability::init_tracing;
use chatstream::routing::dispatch::{dispatch_request, normalize_base_path};
use chatstream::state::AppState;
use chatstream::store::MemoryStore;

fn main() {
    let config = load_config("config.yaml").unwrap_or_else(|e| {
        eprintln!("Failed to load configuration: {e}");
        eprintln!("Please copy 'config.example.yaml' to 'config.yaml' and modify as needed.");
        std::process::exit(1);
    });

    init_tracing(&config.features.log_level);
    let runtime = build_runtime(&config);

    runtime.block_on(async move {
        run(config).await;
    });
}

fn build_runtime(config: &AppConfig) -> tokio::runtime::Runtime {
    let worker_threads = config.server.runtime_worker_threads;
    let mut runtime_builder = if worker_threads == Some(1) {
        tokio::runtime::Builder::new_current_thread()
    } else {
        let mut builder = tokio::runtime::Builder::new_multi_thread();
        if let Some(threads) = worker_threads {
            builder.worker_threads(threads);
        }
        builder
    };
    runtime_builder.enable_io();
    runtime_builder.enable_time();
    runtime_builder.build().unwrap_or_else(|e| {
        eprintln!("Failed to initialize Tokio runtime: {e}");
        std::process::exit(1);
    })
}

async fn run(config: AppConfig) {
    let host = config.server.host.clone();
    let port = config.server.port;
    let base_path = normalize_base_path(&config.server.base_path);

    if config.provider.api_key.trim().is_empty() {
        tracing::warn!("OPENROUTER_API_KEY is not set; chat requests will be rejected with 503");
    }

    let shutdown = CancellationToken::new();
    let state = Arc::new(AppState::new(
        config,
        Arc::new(MemoryStore::new()),
        shutdown.clone(),
    ));
    let dispatch_base_path = Arc::<str>::from(base_path.clone());

    tracing::info!(
        "chatstream starting on {}:{} with base_path='{}', model='{}'",
        host,
        port,
        base_path,
        state.provider.model()
    );

    let listener = match tokio::net::TcpListener::bind(format!("{host}:{port}")).await {
        Ok(listener) => listener,
        Err(err) => {
            eprintln!("Failed to bind {host}:{port}: {err}");
            std::process::exit(1);
        }
    };

    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::error!("failed to listen for shutdown signal: {err}");
                return;
            }
            tracing::info!("shutdown requested, cancelling in-flight chat turns");
            shutdown.cancel();
        }
    });

    tracing::info!("chatstream is ready to accept connections");
    serve_accept_loop(listener, state, dispatch_base_path, shutdown).await;
}

async fn serve_accept_loop(
    listener: tokio::net::TcpListener,
    dispatch_state: Arc<AppState>,
    dispatch_base_path: Arc<str>,
    shutdown: CancellationToken,
) {
    let conn_builder = AutoBuilder::new(TokioExecutor::new());
    loop {
        let accepted = tokio::select! {
            () = shutdown.cancelled() => break,
            accepted = listener.accept() => accepted,
        };
        let (stream, remote_addr) = match accepted {
            Ok((stream, remote_addr)) => (stream, remote_addr),
            Err(err) => {
                tracing::warn!("accept error: {err}");
                continue;
            }
        };

        if let Err(err) = stream.set_nodelay(true) {
            tracing::debug!("failed to enable TCP_NODELAY for {remote_addr}: {err}");
        }

        let io = TokioIo::new(stream);
        let conn_builder = conn_builder.clone();
        let request_state = Arc::clone(&dispatch_state);
        let request_base_path = Arc::clone(&dispatch_base_path);
        let hyper_service = service_fn(move |request: Request<Incoming>| {
            dispatch_request(
                Arc::clone(&request_state),
                Arc::clone(&request_base_path),
                request.map(Body::new),
            )
        });

        tokio::spawn(async move {
            if let Err(err) = conn_builder.serve_connection(io, hyper_service).await {
                tracing::debug!("failed to serve connection from {remote_addr}: {err:#}");
            }
        });
    }
    tracing::info!("chatstream stopped accepting connections");
}
