use log::{error, info};

use bridge_event_relayer::api::StatusServer;
use bridge_event_relayer::blockchain::{EventNormalizer, RpcClient};
use bridge_event_relayer::config::AppConfig;
use bridge_event_relayer::error::RelayerError;
use bridge_event_relayer::listener::{BridgeListener, ListenerSettings, Shutdown};
use bridge_event_relayer::logging::{init_logging, ErrorLogger, LogContext};
use bridge_event_relayer::relay::RelayClient;
use bridge_event_relayer::state::open_store;

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();

    // Nothing touches the network before configuration is valid
    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = init_logging(&config.logging) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    info!(
        "Starting {} v{} for contract {}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        config.chain.contract_address
    );

    if let Err(e) = run(config).await {
        ErrorLogger::log_error(&e, Some(LogContext::new("main", "startup")));
        std::process::exit(1);
    }

    info!("Shutdown complete");
}

async fn run(config: AppConfig) -> Result<(), RelayerError> {
    let source = RpcClient::new(config.chain.rpc_url.clone(), config.chain.timeout_seconds)?;
    let relay = RelayClient::new(&config.relayer)?;
    let store = open_store(&config.state)?;
    let normalizer = EventNormalizer::new(config.event_schema());

    let shutdown = Shutdown::new();
    let mut listener = BridgeListener::new(
        source,
        relay,
        store,
        normalizer,
        &config.chain.contract_address,
        ListenerSettings::from_config(&config),
    )?
    .with_shutdown(shutdown.clone());

    spawn_signal_handler(shutdown.clone());

    let api_task = if config.api.enabled {
        let server = StatusServer::new(listener.subscribe(), &config.api);
        let server_shutdown = shutdown.clone();
        Some(tokio::spawn(async move {
            if let Err(e) = server.start(server_shutdown).await {
                error!("Status API failed: {}", e);
            }
        }))
    } else {
        None
    };

    let result = listener.run().await;

    shutdown.trigger();
    if let Some(task) = api_task {
        let _ = task.await;
    }

    result
}

fn spawn_signal_handler(shutdown: Shutdown) {
    tokio::spawn(async move {
        match wait_for_signal().await {
            Ok(()) => {
                info!("Received shutdown signal");
                shutdown.trigger();
            }
            Err(err) => {
                error!("Unable to listen for shutdown signal: {}", err);
            }
        }
    });
}

#[cfg(unix)]
async fn wait_for_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result,
        _ = terminate.recv() => Ok(()),
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}
