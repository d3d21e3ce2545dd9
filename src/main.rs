use anyhow::Result;
use skybar_core::{AppError, Config, FileStore, SettingsStore};
use skybar_weather::{
    CoordinateResolver, DashboardView, FetchOrchestrator, ForecastTransformer, HttpProxySource,
    LastKnownGoodCache, RefreshController, SystemGeolocation,
};
use std::sync::Arc;
use std::time::Duration;

fn print_view(view: &DashboardView) -> Result<()> {
    if let Some(error) = &view.error {
        println!("Error: {}", error);
    }
    if let Some(warning) = &view.warning {
        println!("Warning: {}", warning);
    }
    if let Some(location) = &view.location {
        println!(
            "Location: {}, {} ({})",
            location.latitude_display(),
            location.longitude_display(),
            location.map_link()
        );
    }
    if let Some(snapshot) = &view.snapshot {
        println!("{}", serde_json::to_string_pretty(snapshot.as_ref())?);
    }
    Ok(())
}

/// `--watch <minutes>` keeps refreshing until interrupted
fn watch_interval() -> Option<Duration> {
    let args: Vec<String> = std::env::args().collect();
    let pos = args.iter().position(|a| a == "--watch")?;
    let minutes = args.get(pos + 1).and_then(|m| m.parse::<u64>().ok()).unwrap_or(10);
    Some(Duration::from_secs(minutes.max(1) * 60))
}

#[tokio::main]
async fn main() -> Result<()> {
    skybar_core::init()?;

    let (config, _) = Config::load_validated().map_err(AppError::Config)?;

    tracing::info!("Data directory: {}", config.data_dir.display());

    let store = Arc::new(FileStore::new(&config.data_dir));
    let settings = Arc::new(SettingsStore::new(store.clone()));
    let cache = LastKnownGoodCache::new(store);

    let request_timeout = Duration::from_secs(config.proxy.request_timeout_secs);
    let source = Arc::new(HttpProxySource::new(request_timeout)?);
    let orchestrator = FetchOrchestrator::new(
        source,
        config.proxy.endpoints.clone(),
        request_timeout,
        cache,
    );

    let geolocation = Arc::new(SystemGeolocation::new(config.location.desktop_id.clone()));
    let resolver = CoordinateResolver::new(
        Some(geolocation),
        Duration::from_secs(config.location.timeout_secs),
    );

    let controller = RefreshController::new(
        resolver,
        orchestrator,
        ForecastTransformer::new(),
        settings,
    );

    controller.load_settings().await;
    print_view(&controller.view())?;

    let Some(every) = watch_interval() else {
        return Ok(());
    };

    tracing::info!("Refreshing every {} seconds", every.as_secs());
    let mut ticker = tokio::time::interval(every);
    ticker.tick().await;
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                controller.on_manual_refresh().await;
                print_view(&controller.view())?;
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutting down");
                return Ok(());
            }
        }
    }
}
