use std::{process, sync::Arc};

use newsgate::{
    cache::{CacheStorage, HeaderStamp, MemoryStorage, Partition, parse_namespace_name},
    config::{self, StorageBackend},
    error::AppError,
    gateway::{
        Gateway, GatewayConfig, GatewayContext, SystemClock,
        maintenance::spawn_maintenance,
        messages::{self, run_message_loop},
    },
    infra::{
        error::InfraError,
        fs_store::FsStorage,
        http::{self, HttpState},
        telemetry,
        upstream::HttpFetcher,
    },
};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Clear(args) => run_clear(settings, args).await,
    }
}

fn build_storage(settings: &config::StorageSettings) -> Result<Arc<dyn CacheStorage>, AppError> {
    let quota = settings.quota_bytes.map(|quota| quota.get());
    match settings.backend {
        StorageBackend::Memory => Ok(Arc::new(match quota {
            Some(quota) => MemoryStorage::with_quota(quota),
            None => MemoryStorage::new(),
        })),
        StorageBackend::Fs => {
            let storage = FsStorage::new(settings.directory.clone(), quota)
                .map_err(|err| AppError::from(InfraError::from(err)))?;
            Ok(Arc::new(storage))
        }
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let storage = build_storage(&settings.storage)?;
    let fetcher = Arc::new(HttpFetcher::new(settings.upstream.connect_timeout)?);
    let context = GatewayContext::new(
        GatewayConfig::from(&settings),
        storage,
        fetcher,
        Arc::new(HeaderStamp),
        Arc::new(SystemClock::new()),
    );
    let gateway = Arc::new(Gateway::new(context));

    info!(
        target = "newsgate::serve",
        upstream = %settings.upstream.base_url,
        version = %settings.gateway.version,
        storage = ?settings.storage.backend,
        "starting gateway"
    );

    let (sender, receiver) = messages::channel(settings.gateway.message_capacity.get());
    let message_handle = tokio::spawn(run_message_loop(Arc::clone(&gateway), receiver));

    let lifecycle_handle = {
        let gateway = Arc::clone(&gateway);
        let skip_waiting = settings.gateway.skip_waiting;
        tokio::spawn(async move {
            if let Err(err) = gateway.run_lifecycle(skip_waiting).await {
                error!(error = %err, "gateway failed to activate; forwarding without caching");
            }
        })
    };

    let maintenance_handle = spawn_maintenance(Arc::clone(&gateway));

    let state = HttpState {
        gateway,
        messages: sender,
        max_body_bytes: settings.server.max_body_bytes.get() as usize,
    };
    let result = serve_http(&settings, state).await;

    for handle in [lifecycle_handle, maintenance_handle, message_handle] {
        handle.abort();
        let _ = handle.await;
    }

    result
}

async fn run_clear(settings: config::Settings, args: config::ClearArgs) -> Result<(), AppError> {
    let partition = args
        .partition
        .as_deref()
        .map(str::parse::<Partition>)
        .transpose()
        .map_err(AppError::validation)?;

    let storage = build_storage(&settings.storage)?;
    let prefix = &settings.gateway.cache_prefix;
    let version = &settings.gateway.version;

    let mut deleted = 0;
    for name in storage.namespaces().await? {
        let Some((ns_partition, ns_version)) = parse_namespace_name(&name, prefix) else {
            continue;
        };
        if !args.all_versions && ns_version != version.as_str() {
            continue;
        }
        if partition.is_some_and(|wanted| wanted.as_str() != ns_partition) {
            continue;
        }
        if storage.delete_namespace(&name).await? {
            info!(target = "newsgate::clear", namespace = %name, "deleted namespace");
            deleted += 1;
        }
    }

    if deleted == 0 {
        warn!(target = "newsgate::clear", "no matching namespaces found");
    }
    Ok(())
}

async fn serve_http(settings: &config::Settings, state: HttpState) -> Result<(), AppError> {
    let router = http::build_router(state);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(target = "newsgate::serve", addr = %settings.server.addr, "listening");

    let grace = settings.server.graceful_shutdown;
    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let server = axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(async move {
            let _ = stop_rx.await;
        });
    let mut server = std::pin::pin!(server.into_future());

    tokio::select! {
        result = &mut server => {
            return result.map_err(|err| AppError::unexpected(format!("server error: {err}")));
        }
        signal = tokio::signal::ctrl_c() => {
            if let Err(err) = signal {
                warn!(error = %err, "failed to listen for shutdown signal");
            }
        }
    }

    info!(target = "newsgate::serve", grace_secs = grace.as_secs(), "shutting down");
    let _ = stop_tx.send(());
    match tokio::time::timeout(grace, server).await {
        Ok(result) => result.map_err(|err| AppError::unexpected(format!("server error: {err}"))),
        Err(_) => {
            warn!(target = "newsgate::serve", "graceful shutdown timed out");
            Ok(())
        }
    }
}
