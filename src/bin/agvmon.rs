use agvmon::config::MonitorConfig;
use agvmon::error::{MonitorError, StoreError};
use agvmon::monitor::Monitor;
use agvmon::server;
use clap::{App, Arg};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let matches = App::new("agvmon")
        .version(env!("CARGO_PKG_VERSION"))
        .about("🚚 AGV Fleet Monitor - polls the AGV table and streams changes to viewers")
        .arg(
            Arg::with_name("config")
                .short("c")
                .long("config")
                .value_name("FILE")
                .help("TOML configuration file")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("bind")
                .short("b")
                .long("bind")
                .value_name("ADDR")
                .help("Viewer listen address, overrides [server] bind")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("interval")
                .short("i")
                .long("interval")
                .value_name("MS")
                .help("Poll interval in milliseconds, overrides [poll] interval_ms")
                .takes_value(true)
                .validator(|v| match v.parse::<u64>() {
                    Ok(ms) if ms > 0 => Ok(()),
                    _ => Err("Interval must be a positive number of milliseconds".into()),
                }),
        )
        .get_matches();

    let config = match matches.value_of("config") {
        Some(path) => MonitorConfig::from_file(path),
        None => Ok(MonitorConfig::default()),
    };
    let mut config = match config {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ {}", e);
            std::process::exit(2);
        }
    };
    if let Some(bind) = matches.value_of("bind") {
        config.server.bind = bind.to_string();
    }
    if let Some(ms) = matches.value_of("interval").and_then(|v| v.parse().ok()) {
        config.poll.interval_ms = ms;
    }

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Err(e) = run(config).await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run(config: MonitorConfig) -> Result<(), MonitorError> {
    let store = config.build_store().map_err(MonitorError::StoreUnreachable)?;

    // A store that is unreachable at startup is fatal; later failures are not.
    let probe_store = Arc::clone(&store);
    let probe = tokio::task::spawn_blocking(move || probe_store.probe());
    match tokio::time::timeout(config.poll.timeout(), probe).await {
        Ok(Ok(Ok(()))) => info!("✅ Store reachable: {}", store.describe()),
        Ok(Ok(Err(e))) => return Err(MonitorError::StoreUnreachable(e)),
        Ok(Err(e)) => {
            return Err(MonitorError::StoreUnreachable(StoreError::Unavailable(e.to_string())));
        }
        Err(_) => {
            return Err(MonitorError::StoreUnreachable(StoreError::Timeout(config.poll.timeout())));
        }
    }

    let listener = TcpListener::bind(config.server.bind.as_str()).await.map_err(|source| MonitorError::Bind {
        addr: config.server.bind.clone(),
        source,
    })?;

    let monitor = Arc::new(Monitor::new(store, config.poll.interval(), config.poll.timeout()));
    let server_task = tokio::spawn(server::serve(listener, Arc::clone(&monitor)));

    monitor
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for Ctrl-C: {}", e);
                // Without a signal handler, keep polling forever.
                std::future::pending::<()>().await;
            }
        })
        .await;

    server_task.abort();
    let stats = monitor.stats();
    info!(
        publishes = stats.publishes,
        failures = stats.failures,
        deliveries = stats.deliveries,
        "👋 Shutting down"
    );
    Ok(())
}
