use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use skycast_core::{AppError, Config, ProviderError, Units, WeatherError};
use skycast_weather::{
    FixedLocation, Geolocator, MemoryCache, NoLocation, Observation, OpenMeteoProvider,
    OrchestratorConfig, SqliteStorage, WeatherOrchestrator, DEFAULT_FORECAST_DAYS,
    DEFAULT_SEARCH_LIMIT,
};

fn print_observation(label: &str, observation: &Observation) {
    let temperature = observation.temperature();
    print!(
        "{:<24} {:>8}  {}",
        label,
        temperature.format(),
        observation.condition()
    );
    if let Some(humidity) = observation.humidity() {
        print!("  humidity {:.0}%", humidity);
    }
    println!();
}

/// Print one line per favorite. Returns false when there are none.
async fn print_favorites(orchestrator: &WeatherOrchestrator, units: Units) -> bool {
    let favorites = orchestrator.get_weather_for_favorites(units).await;
    for favorite in &favorites {
        match &favorite.weather {
            Some(observation) => print_observation(&favorite.name, observation),
            None => println!("{:<24} unavailable", favorite.name),
        }
    }
    !favorites.is_empty()
}

/// Refresh favorites every `interval` until Ctrl-C.
async fn watch(
    orchestrator: &WeatherOrchestrator,
    units: Units,
    interval: Duration,
) -> Result<()> {
    tracing::info!("Refreshing favorites every {}s", interval.as_secs());
    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                orchestrator.cancel();
                return Ok(());
            }
            _ = ticker.tick() => {
                if !print_favorites(orchestrator, units).await {
                    println!("No favorites to watch. Add one with: skycast <city>");
                    return Ok(());
                }
                println!();
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    skycast_core::init()?;

    let (config, _) = Config::load_validated()?;

    let storage = SqliteStorage::open(config.database_path())
        .context("Failed to open the SkyCast database")?;
    let provider = OpenMeteoProvider::new(&config.provider)?;
    let geolocator: Arc<dyn Geolocator> = match &config.home {
        Some(home) => Arc::new(FixedLocation::from(home)),
        None => Arc::new(NoLocation),
    };

    let orchestrator = WeatherOrchestrator::builder(Arc::new(provider))
        .cache(Arc::new(MemoryCache::new()))
        .storage(Arc::new(storage))
        .geolocator(geolocator)
        .config(OrchestratorConfig::from(&config))
        .build()
        .await;
    let units = orchestrator.default_units();

    tracing::info!("SkyCast started");

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.first().map(String::as_str) == Some("--watch") {
        return match config.weather.refresh_interval() {
            Some(interval) => watch(&orchestrator, units, interval).await,
            None => {
                println!("Watching is off (weather.refresh_minutes = 0).");
                Ok(())
            }
        };
    }
    if !args.is_empty() {
        let city = args.join(" ");
        let observation = match orchestrator.get_current_weather(&city, units, true).await {
            Ok(observation) => observation,
            Err(WeatherError::ProviderFatal(ProviderError::NotFound(_))) => {
                println!("No weather found for '{}'.", city);
                let matches = orchestrator
                    .search_locations(&city, DEFAULT_SEARCH_LIMIT)
                    .await
                    .unwrap_or_default();
                for location in matches {
                    println!("  did you mean {}?", location.display_name());
                }
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };
        print_observation(&observation.location().display_name(), &observation);

        let forecast = orchestrator
            .get_forecast(&city, DEFAULT_FORECAST_DAYS, units, true)
            .await?;
        for day in forecast.days() {
            println!(
                "  {}  {:>6.1} / {:<6.1}{}  {}",
                day.date(),
                day.high(),
                day.low(),
                forecast.unit().symbol(),
                day.condition().map(|c| c.description()).unwrap_or("-")
            );
        }
        return Ok(());
    }

    if !print_favorites(&orchestrator, units).await {
        match orchestrator.get_current_location_weather(units, true).await {
            Ok(observation) => {
                print_observation(&observation.location().display_name(), &observation)
            }
            Err(e) => {
                let error = AppError::from(e);
                tracing::warn!("{}", error);
                println!("{}", error.user_message());
                println!("Usage: skycast <city> | skycast --watch");
            }
        }
    }

    Ok(())
}
