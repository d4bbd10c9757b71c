use std::env;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use toolshowcase::config::Config;
use toolshowcase::kv::{FileKv, KvStore, MemoryKv};
use toolshowcase::storage::KvToolStore;
use toolshowcase::{routes, AppState, RequestRouter, SyncController};

fn print_usage() {
    println!("Usage: toolshowcase [serve|watch|check] [OPTIONS]");
    println!("Commands:");
    println!("  serve           Run the function-style tool API (default)");
    println!("  watch           Poll the configured backend and log the tool list");
    println!("  check           Report the configured backend and whether it is reachable");
    println!("Options:");
    println!("  -config <path>  Path to configuration file (default: ./etc/toolshowcase.toml)");
    println!("  -help, --help   Print this help message");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();
    if args.iter().any(|arg| arg == "-help" || arg == "--help") {
        print_usage();
        return Ok(());
    }

    let mut command = "serve";
    let mut rest = args.iter().skip(1);
    while let Some(arg) = rest.next() {
        match arg.as_str() {
            "-config" => {
                rest.next();
            }
            "serve" => command = "serve",
            "watch" => command = "watch",
            "check" => command = "check",
            _ => {}
        }
    }

    let config_path = args
        .iter()
        .skip_while(|arg| arg.as_str() != "-config")
        .nth(1)
        .map(|s| s.to_string())
        .unwrap_or_else(|| "./etc/toolshowcase.toml".to_string());

    // Load configuration first (before logging init)
    let config = Config::load(&config_path).unwrap_or_else(|e| {
        eprintln!("Could not load config file: {}, using defaults", e);
        Config::default()
    });

    // Priority: RUST_LOG env var > config file > default "info"
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log.level));

    fmt::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    info!("Loading configuration from: {}", config_path);

    match command {
        "watch" => watch(config).await,
        "check" => check(config).await,
        _ => serve(config).await,
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    info!("Starting tool API server...");

    let kv: Arc<dyn KvStore> = match &config.server.data_path {
        Some(path) => {
            info!("Persisting tools to {}", path.display());
            Arc::new(FileKv::open(path).await?)
        }
        None => {
            tracing::warn!("No server.data_path configured, tools are kept in memory only");
            Arc::new(MemoryKv::new())
        }
    };
    let store = Arc::new(KvToolStore::new(kv));

    let addr: SocketAddr = config.addr.parse().unwrap_or_else(|_| {
        tracing::warn!("Invalid address '{}', using default 0.0.0.0:8080", config.addr);
        SocketAddr::from(([0, 0, 0, 0], 8080))
    });

    let app = routes::create_router(AppState::new(store), &config.server.base_path);

    info!("Server listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await?;

    Ok(())
}

async fn watch(config: Config) -> anyhow::Result<()> {
    let router = RequestRouter::from_config(&config).await?;
    let controller = SyncController::new(router, &config.sync);
    let mut updates = controller.subscribe();
    let handle = controller.start();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = updates.borrow_and_update().clone();
                if state.loading {
                    continue;
                }
                match state.error() {
                    Some(message) => tracing::warn!("{}", message),
                    None => info!(
                        "{} tools in groups {:?}",
                        state.tools.len(),
                        controller.groups()
                    ),
                }
            }
        }
    }

    handle.shutdown().await;
    info!("Stopped watching");
    Ok(())
}

async fn check(config: Config) -> anyhow::Result<()> {
    let router = RequestRouter::from_config(&config).await?;
    let kind = router.check().await?;
    info!("Backend check passed ({})", kind);
    Ok(())
}
