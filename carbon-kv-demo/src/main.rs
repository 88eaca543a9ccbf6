use carbon_kv::{create_db, CacheService, CachedValue};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use shared::config::Config;
use std::time::Duration;
use tokio::time::{sleep_until, Instant};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const KEY: &str = "SOME_KEY1";
const CACHE_TIME_MINUTES: i64 = 2;
const LAST_NAME: &str = "Denis6";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct Person {
    name: String,
}

impl Person {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting carbon-kv demo");

    // Load environment variables
    match dotenvy::dotenv() {
        Ok(_) => info!("Loaded environment variables from .env file"),
        Err(_) => info!("No .env file found, using system environment variables"),
    }

    let config = Config::from_env();
    let store = create_db(&config).await?;
    let cache = CacheService::new(&store);
    let start = Instant::now();

    let writer = tokio::spawn(write_timeline(cache.clone(), start));
    let reader = tokio::spawn(watch(cache.clone(), start));

    tokio::select! {
        result = reader => {
            match result {
                Ok(Ok(())) => info!("Observed every update, exiting"),
                Ok(Err(e)) => warn!("Live query failed: {}", e),
                Err(e) => warn!("Reader task failed: {}", e),
            }
        }
        _ = shutdown_signal() => {}
    }

    writer.abort();
    drop(cache);
    store.close()?;

    info!("carbon-kv demo shutting down");
    Ok(())
}

/// Upserts at 2s, 5s and 6s after start
async fn write_timeline(cache: CacheService, start: Instant) {
    let steps = [(2, "Denis2"), (5, "Denis5"), (6, LAST_NAME)];

    for (at_secs, name) in steps {
        sleep_until(start + Duration::from_secs(at_secs)).await;

        match cache.upsert(KEY, &Person::new(name), CACHE_TIME_MINUTES).await {
            Ok(record) => info!(
                "Upserted {} = {} (expires {})",
                KEY, record.entry.data, record.entry.cache_time
            ),
            Err(e) => warn!("Upsert of {} failed: {}", KEY, e),
        }
    }
}

/// Subscribes at 3s and logs every value until the last write shows up
async fn watch(cache: CacheService, start: Instant) -> shared::Result<()> {
    sleep_until(start + Duration::from_secs(3)).await;

    let mut query = cache.get::<Person>(KEY).await?;

    while let Some(state) = query.next().await {
        match state {
            Some(CachedValue::Value(person)) => {
                info!("Value from DB: {:?}", person);
                if person.name == LAST_NAME {
                    break;
                }
            }
            Some(CachedValue::Raw(raw)) => info!("Raw value from DB: {}", raw),
            None => info!("No value for {} yet", KEY),
        }
    }

    query.cancel();
    Ok(())
}

// Graceful shutdown handler
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received terminate signal");
        },
    }

    info!("Shutting down gracefully...");
}
