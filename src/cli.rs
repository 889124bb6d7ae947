use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::conditions::{
    ConditionsAggregator, ConditionsSnapshot, HttpReachability, LoadMode, LocationService,
    LogAlertSink, Reachability, RefreshScheduler, StaticReachability,
};
use crate::config::models::WaterwatchConfig;
use crate::error_context::{self, ErrorContextExt};
use crate::feeds::{Fetcher, NdbcClient, UsgsClient};
use crate::metrics::start_metrics_server;
use crate::models::{Location, Region, WaterConditions};
use crate::normalize::{
    celsius_to_fahrenheit, cfs_to_gallons_per_second, degrees_to_compass, fahrenheit_to_celsius,
    meters_to_feet,
};
use crate::storage::{open_store, Cache};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Waterwatch - marine and river water conditions from public buoy and stream feeds",
    long_about = "Waterwatch fetches buoy observations and river temperature/discharge series, \
                  caches the latest readings locally for offline use, and keeps a list of \
                  tracked locations and groups."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List buoy stations
    Stations {
        /// Case-insensitive match on station name or id
        #[arg(short, long)]
        query: Option<String>,

        /// Only stations in this region (e.g. "West Coast")
        #[arg(short, long, value_parser = parse_region)]
        region: Option<Region>,
    },
    /// Track a buoy station as a new location
    Add { station_id: String },
    /// List tracked locations with their cached conditions
    Locations,
    /// Show conditions for a location
    Show {
        location_id: String,

        /// Fetch fresh conditions instead of using the cache
        #[arg(long)]
        refresh: bool,
    },
    /// Toggle the favorite flag of a location
    Favorite { location_id: String },
    /// Delete a location, its group memberships and cached conditions
    Delete { location_id: String },
    /// Manage location groups
    Group {
        #[command(subcommand)]
        command: GroupCommands,
    },
    /// List location groups
    Groups,
    /// Current river temperature and discharge
    Current {
        /// Read the cache without touching the network
        #[arg(long)]
        offline: bool,
    },
    /// Refresh on the configured schedule and serve metrics until Ctrl-C
    Watch,
}

#[derive(Subcommand, Debug, Clone)]
pub enum GroupCommands {
    /// Create an empty group
    Create { name: String },
    /// Add a location to a group
    Add { group_id: String, location_id: String },
    /// Remove a location from a group
    Remove { group_id: String, location_id: String },
    /// Delete a group
    Delete { group_id: String },
}

fn parse_region(value: &str) -> std::result::Result<Region, String> {
    Region::ALL
        .into_iter()
        .find(|r| r.as_str().eq_ignore_ascii_case(value.trim()))
        .ok_or_else(|| {
            let names: Vec<&str> = Region::ALL.iter().map(|r| r.as_str()).collect();
            format!("unknown region '{value}', expected one of: {}", names.join(", "))
        })
}

/// Shared clients and services built from the configuration
struct App {
    config: WaterwatchConfig,
    fetcher: Arc<Fetcher>,
    cache: Cache,
    locations: LocationService,
}

impl App {
    async fn new(config: WaterwatchConfig) -> Result<Self> {
        let fetcher = Arc::new(Fetcher::new(Duration::from_secs(
            config.feeds.ndbc.timeout_secs,
        ))?);

        let store = open_store(&config.storage)
            .await
            .context_fmt(|| error_context::messages::failed_to("open", "cache"))?;
        let cache = Cache::new(store);

        let ndbc = Arc::new(NdbcClient::new(&config.feeds.ndbc, Arc::clone(&fetcher)));
        let locations = LocationService::new(ndbc, cache.clone());

        Ok(Self {
            config,
            fetcher,
            cache,
            locations,
        })
    }

    fn aggregator(&self, offline: bool) -> Result<ConditionsAggregator> {
        let usgs_fetcher = Arc::new(Fetcher::new(Duration::from_secs(
            self.config.feeds.usgs.timeout_secs,
        ))?);
        let usgs = Arc::new(UsgsClient::new(&self.config.feeds.usgs, usgs_fetcher)?);

        let reachability: Arc<dyn Reachability> = if offline {
            Arc::new(StaticReachability::new(false))
        } else {
            Arc::new(HttpReachability::new(
                &self.config.reachability,
                Arc::clone(&self.fetcher),
            ))
        };

        Ok(ConditionsAggregator::new(
            usgs,
            self.cache.clone(),
            reachability,
            Arc::new(LogAlertSink),
        ))
    }
}

pub async fn handle_command(command: Commands, config: WaterwatchConfig) -> Result<()> {
    let app = App::new(config).await?;

    match command {
        Commands::Stations { query, region } => list_stations(&app, query, region).await,
        Commands::Add { station_id } => add_location(&app, &station_id).await,
        Commands::Locations => list_locations(&app).await,
        Commands::Show {
            location_id,
            refresh,
        } => show_location(&app, &location_id, refresh).await,
        Commands::Favorite { location_id } => toggle_favorite(&app, &location_id).await,
        Commands::Delete { location_id } => delete_location(&app, &location_id).await,
        Commands::Group { command } => handle_group_command(&app, command).await,
        Commands::Groups => list_groups(&app).await,
        Commands::Current { offline } => current_conditions(&app, offline).await,
        Commands::Watch => watch(app).await,
    }
}

async fn list_stations(app: &App, query: Option<String>, region: Option<Region>) -> Result<()> {
    let stations = app
        .locations
        .search_stations(query.as_deref(), region)
        .await
        .context(error_context::feed::station_list())?;

    if stations.is_empty() {
        println!("No stations found");
        return Ok(());
    }

    for station in &stations {
        println!(
            "{:<8} {:<40} {:<12} {:>8.3} {:>9.3}",
            station.id,
            station.name,
            station.region.as_str(),
            station.latitude,
            station.longitude
        );
    }
    println!("\n{} station(s)", stations.len());
    Ok(())
}

async fn add_location(app: &App, station_id: &str) -> Result<()> {
    let location = app.locations.add_station(station_id).await?;
    println!(
        "{} has been added to your locations (id {})",
        location.name, location.id
    );
    Ok(())
}

async fn list_locations(app: &App) -> Result<()> {
    let locations = app.locations.locations().await?;
    if locations.is_empty() {
        println!("No locations yet. Add one with `waterwatch add <station-id>`.");
        return Ok(());
    }

    let conditions = app.locations.all_conditions().await?;
    for location in &locations {
        print_location_line(location);
        match conditions.get(&location.id) {
            Some(c) => println!("    {}", summarize_conditions(c)),
            None => println!("    no conditions available"),
        }
    }
    Ok(())
}

async fn show_location(app: &App, location_id: &str, refresh: bool) -> Result<()> {
    let location = app.locations.location(location_id).await?;
    let conditions = if refresh {
        app.locations.refresh_conditions(location_id).await
    } else {
        app.locations.conditions_for(location_id).await
    }
    .context_fmt(|| error_context::feed::station(&location.ndbc_station_id))?;

    print_location_line(&location);
    println!("  Station:        {}", location.ndbc_station_id);
    println!(
        "  Coordinates:    {:.3}, {:.3}",
        location.latitude, location.longitude
    );
    println!("  Observed:       {}", conditions.timestamp.format("%Y-%m-%d %H:%M UTC"));
    println!(
        "  Water temp:     {}",
        format_temperature(
            conditions.water_temperature.value,
            &conditions.water_temperature.unit
        )
    );
    println!(
        "  Waves:          {:.1} m / {:.1} ft every {:.0} s from {}",
        conditions.wave_height.value,
        meters_to_feet(conditions.wave_height.value),
        conditions.wave_period.value,
        degrees_to_compass(conditions.wave_direction.value)
    );
    println!(
        "  Wind:           {:.1} {} from {}",
        conditions.wind_speed.value,
        conditions.wind_speed.unit,
        degrees_to_compass(conditions.wind_direction.value)
    );
    Ok(())
}

async fn toggle_favorite(app: &App, location_id: &str) -> Result<()> {
    let location = app.locations.toggle_favorite(location_id).await?;
    if location.is_favorite {
        println!("{} added to favorites", location.name);
    } else {
        println!("{} removed from favorites", location.name);
    }
    Ok(())
}

async fn delete_location(app: &App, location_id: &str) -> Result<()> {
    app.locations.delete_location(location_id).await?;
    println!("Location {location_id} deleted");
    Ok(())
}

async fn handle_group_command(app: &App, command: GroupCommands) -> Result<()> {
    match command {
        GroupCommands::Create { name } => {
            let group = app.locations.create_group(&name).await;
            println!("Created group {} (id {})", group.name, group.id);
        }
        GroupCommands::Add {
            group_id,
            location_id,
        } => {
            let group = app.locations.add_to_group(&group_id, &location_id).await?;
            println!("{} now has {} location(s)", group.name, group.location_ids.len());
        }
        GroupCommands::Remove {
            group_id,
            location_id,
        } => {
            let group = app
                .locations
                .remove_from_group(&group_id, &location_id)
                .await?;
            println!("{} now has {} location(s)", group.name, group.location_ids.len());
        }
        GroupCommands::Delete { group_id } => {
            app.locations.delete_group(&group_id).await?;
            println!("Group {group_id} deleted");
        }
    }
    Ok(())
}

async fn list_groups(app: &App) -> Result<()> {
    let groups = app.locations.groups().await?;
    if groups.is_empty() {
        println!("No groups yet");
        return Ok(());
    }

    for group in &groups {
        println!(
            "{}  {} ({} location(s))",
            group.id,
            group.name,
            group.location_ids.len()
        );
    }
    Ok(())
}

async fn current_conditions(app: &App, offline: bool) -> Result<()> {
    let aggregator = app.aggregator(offline)?;
    let snapshot = aggregator.load(LoadMode::Foreground).await?;
    print_snapshot(&snapshot);
    Ok(())
}

async fn watch(app: App) -> Result<()> {
    if app.config.metrics.enabled {
        start_metrics_server(app.config.metrics.port)
            .await
            .context_fmt(|| error_context::messages::failed_to("start", "metrics server"))?;
    }

    let aggregator = Arc::new(app.aggregator(false)?);

    match aggregator.load(LoadMode::Foreground).await {
        Ok(snapshot) => print_snapshot(&snapshot),
        Err(e) => warn!("Initial load failed: {}", e),
    }

    let mut scheduler =
        RefreshScheduler::new(app.config.refresh.clone(), Arc::clone(&aggregator)).await?;
    scheduler.start().await?;

    info!("Watching for updates. Press Ctrl-C to stop.");
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;

    scheduler.stop().await?;
    info!("Stopped");
    Ok(())
}

fn print_location_line(location: &Location) {
    let star = if location.is_favorite { "*" } else { " " };
    println!(
        "{} {}  {} [{}]",
        star, location.id, location.name, location.region
    );
}

fn summarize_conditions(conditions: &WaterConditions) -> String {
    format!(
        "{}, waves {:.1} {}, wind {:.1} {} {} ({})",
        format_temperature(
            conditions.water_temperature.value,
            &conditions.water_temperature.unit
        ),
        conditions.wave_height.value,
        conditions.wave_height.unit,
        conditions.wind_speed.value,
        conditions.wind_speed.unit,
        degrees_to_compass(conditions.wind_direction.value),
        conditions.timestamp.format("%Y-%m-%d %H:%M UTC")
    )
}

/// Both scales, taking the reading as Celsius when its unit says so
fn format_temperature(value: f64, unit: &str) -> String {
    let (celsius, fahrenheit) = if unit.contains('C') {
        (value, celsius_to_fahrenheit(value))
    } else {
        (fahrenheit_to_celsius(value), value)
    };
    format!("{celsius:.1} °C / {fahrenheit:.1} °F")
}

fn format_discharge(value: f64, unit: &str) -> String {
    if unit == "ft3/s" {
        format!(
            "{value:.0} ft³/s / {:.0} gal/s",
            cfs_to_gallons_per_second(value)
        )
    } else {
        format!("{value:.0} {unit}")
    }
}

fn format_delta(delta: Option<f64>) -> String {
    match delta {
        Some(d) if d > 0.0 => format!(" (+{d:.1})"),
        Some(d) if d < 0.0 => format!(" ({d:.1})"),
        Some(_) => " (no change)".to_string(),
        None => String::new(),
    }
}

fn print_snapshot(snapshot: &ConditionsSnapshot) {
    if snapshot.is_offline() {
        println!("Offline: showing cached data");
    }

    let temperature = &snapshot.current.temperature;
    let discharge = &snapshot.current.discharge;

    println!(
        "Water temperature: {}{}  (updated {})",
        format_temperature(temperature.current, &temperature.unit),
        format_delta(snapshot.temperature_delta()),
        temperature.last_updated.format("%Y-%m-%d %H:%M %:z")
    );
    println!(
        "Discharge:         {}{}  (updated {})",
        format_discharge(discharge.current, &discharge.unit),
        format_delta(snapshot.discharge_delta()),
        discharge.last_updated.format("%Y-%m-%d %H:%M %:z")
    );
    if !temperature.history.is_empty() {
        println!(
            "History:           {} temperature / {} discharge samples",
            temperature.history.len(),
            discharge.history.len()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_region_names() {
        assert_eq!(parse_region("west coast").unwrap(), Region::WestCoast);
        assert_eq!(parse_region("Gulf Coast").unwrap(), Region::GulfCoast);
        assert!(parse_region("Atlantis").is_err());
    }

    #[test]
    fn test_cli_parses_group_commands() {
        let cli = Cli::try_parse_from(["waterwatch", "group", "add", "g1", "l1"]).unwrap();
        match cli.command {
            Commands::Group {
                command: GroupCommands::Add {
                    group_id,
                    location_id,
                },
            } => {
                assert_eq!(group_id, "g1");
                assert_eq!(location_id, "l1");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_cli_global_config_flag() {
        let cli = Cli::try_parse_from([
            "waterwatch",
            "current",
            "--offline",
            "--config",
            "/tmp/waterwatch.yaml",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/waterwatch.yaml")));
        assert!(matches!(cli.command, Commands::Current { offline: true }));
    }

    #[test]
    fn test_format_temperature_follows_unit() {
        assert_eq!(format_temperature(20.0, "deg C"), "20.0 °C / 68.0 °F");
        assert_eq!(format_temperature(20.0, "degC"), "20.0 °C / 68.0 °F");
        assert_eq!(format_temperature(68.0, "deg F"), "20.0 °C / 68.0 °F");
    }

    #[test]
    fn test_format_discharge_follows_unit() {
        assert!(format_discharge(100.0, "ft3/s").starts_with("100 ft³/s / 748 gal/s"));
        assert_eq!(format_discharge(3.2, "m3/s"), "3 m3/s");
    }

    #[test]
    fn test_format_delta() {
        assert_eq!(format_delta(Some(1.5)), " (+1.5)");
        assert_eq!(format_delta(Some(-0.5)), " (-0.5)");
        assert_eq!(format_delta(Some(0.0)), " (no change)");
        assert_eq!(format_delta(None), "");
    }
}
