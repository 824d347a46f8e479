use {
    knockflow::{
        config::RuntimeConfig,
        ingest::{self, IngestMessage},
        patterns::PatternStore,
        service::KnockService,
        settings::{SensorConfig, SettingsStore},
        source::{self, TcpLineSource},
        store::KnockStore,
    },
    std::{sync::Arc, time::Duration},
    tokio::sync::mpsc,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = RuntimeConfig::from_env()?;

    log::info!("Starting knockflow...");
    log::info!("  Broker: {}", config.broker_addr);
    log::info!("  Topic filter: {}", config.topic_filter);
    log::info!("  Patterns file: {}", config.patterns_file);
    log::info!("  Channel buffer: {}", config.channel_buffer);

    let store = Arc::new(KnockStore::new());
    let settings = Arc::new(SettingsStore::new(SensorConfig::default()));
    let patterns = Arc::new(PatternStore::load(&config.patterns_file)?);

    // Bounded channel between the subscriber and the ingestion task
    let (tx, rx) = mpsc::channel::<IngestMessage>(config.channel_buffer);

    let store_for_ingest = store.clone();
    let ingest_handle = tokio::spawn(async move {
        ingest::ingestion_task(rx, store_for_ingest).await;
    });

    // Query surface for the external request layer; the binary only uses it
    // for periodic status reporting.
    let service = KnockService::new(store, settings, patterns);
    tokio::spawn(async move {
        status_task(service).await;
    });

    let bridge_source = TcpLineSource::new(config.broker_addr.clone(), config.topic_filter.clone());

    let subscriber_tx = tx.clone();
    tokio::select! {
        result = source::run_with_reconnect(bridge_source, subscriber_tx) => {
            match result {
                Ok(()) => log::info!("Subscriber finished"),
                Err(e) => log::error!("Subscriber failed: {}", e),
            }
        }
        _ = tokio::signal::ctrl_c() => {
            log::info!("Shutdown signal received");
        }
    }

    // Let the ingestion task finish the message in hand, then stop it
    let _ = tx.send(IngestMessage::Shutdown).await;
    let _ = ingest_handle.await;

    log::info!("knockflow stopped");
    Ok(())
}

/// Periodic one-line health summary of the shared stores.
async fn status_task(service: KnockService) {
    let mut timer = tokio::time::interval(Duration::from_secs(30));
    timer.tick().await; // first tick fires immediately

    loop {
        timer.tick().await;
        let sensors = service.knocks().await.len();
        let config = service.config().await;
        let patterns = service.patterns().await.patterns.len();
        log::info!(
            "Tracking {} sensors, {} stored patterns (programming mode: {})",
            sensors,
            patterns,
            config.is_programming_mode
        );
    }
}
