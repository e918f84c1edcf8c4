//! Bluedock: find bikeshare stations you can actually walk to.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use bluedock_cli::render::{render_map, render_outcome, write_map};
use bluedock_cli::session::API_KEY_ENV;
use bluedock_cli::shell::Shell;
use bluedock_cli::{SearchOutcome, Session};
use bluedock_core::{AppError, Config, ConfigError, SearchMode};
use bluedock_services::Direction;
use clap::{Args, Parser, Subcommand};

/// Auto-refresh intervals offered by `watch`, in seconds.
const REFRESH_INTERVALS: [u64; 4] = [30, 60, 120, 300];

/// Find bikeshare stations within walking distance
#[derive(Parser, Debug)]
#[command(name = "bluedock", version, about, long_about = None)]
struct Cli {
    /// Configuration file (defaults to the user config directory)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// OpenWeatherMap API key for this run
    #[arg(long, global = true, value_name = "KEY")]
    api_key: Option<String>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Clone)]
struct SearchArgs {
    /// pickup (find bikes) or dropoff (find docks)
    #[arg(long, default_value = "pickup")]
    mode: SearchMode,

    /// Walking radius in miles: 0.1, 0.25, 0.5, 0.75, 1.0, 1.5 or 2.0
    #[arg(long)]
    radius: Option<f64>,

    /// Only stations in this direction (all, north, NE, ...)
    #[arg(long)]
    direction: Option<Direction>,

    /// Also write an HTML map (to FILE or the configured default)
    #[arg(long, value_name = "FILE")]
    map: Option<Option<PathBuf>>,

    /// Recalculate walking routes instead of using cached ones
    #[arg(long)]
    refresh: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Search around an address
    Search {
        address: String,

        #[command(flatten)]
        search: SearchArgs,

        /// Save this search as a favorite, optionally under NAME
        #[arg(long, value_name = "NAME")]
        save_favorite: Option<Option<String>>,
    },

    /// Search around coordinates
    At {
        #[arg(allow_negative_numbers = true)]
        lat: f64,

        #[arg(allow_negative_numbers = true)]
        lon: f64,

        #[command(flatten)]
        search: SearchArgs,

        /// Save this search as a favorite, optionally under NAME
        #[arg(long, value_name = "NAME")]
        save_favorite: Option<Option<String>>,
    },

    /// Search and keep refreshing availability
    Watch {
        address: String,

        #[command(flatten)]
        search: SearchArgs,

        /// Seconds between refreshes: 30, 60, 120 or 300
        #[arg(long, default_value_t = 120, value_parser = parse_interval)]
        interval: u64,
    },

    /// Interactive session
    Shell {
        /// Search to start in
        #[arg(long, default_value = "pickup")]
        mode: SearchMode,
    },

    /// Manage saved searches
    Favorites {
        #[command(subcommand)]
        action: FavoritesAction,
    },

    /// Weather key and other settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
}

#[derive(Subcommand, Debug)]
enum FavoritesAction {
    /// List saved searches
    List,
    /// Print one saved search as JSON
    Show { name: String },
    /// Remove a saved search
    Delete { name: String },
}

#[derive(Subcommand, Debug)]
enum SettingsAction {
    /// Set the OpenWeatherMap API key
    ApiKey {
        key: String,

        /// Store the key in the preferences file
        #[arg(long)]
        remember: bool,
    },
    /// Remove a stored API key
    ForgetApiKey,
    /// Show configuration and preference locations
    Show,
}

fn parse_interval(value: &str) -> Result<u64, String> {
    let seconds: u64 = value
        .parse()
        .map_err(|_| format!("not a number of seconds: {}", value))?;
    if REFRESH_INTERVALS.contains(&seconds) {
        Ok(seconds)
    } else {
        Err(format!("interval must be one of {:?}", REFRESH_INTERVALS))
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    if let Err(e) = bluedock_core::init(level) {
        eprintln!("{}", e);
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            eprintln!("{}", e.user_message());
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), AppError> {
    let (config, _) = Config::load_validated(cli.config.as_deref())
        .map_err(|e| ConfigError::Invalid(format!("{:#}", e)))?;

    let config_path = Config::resolve_path(cli.config.as_deref());
    let mut session = Session::open(config, cli.api_key.as_deref())?;

    match cli.command {
        Commands::Search {
            address,
            search,
            save_favorite,
        } => {
            session.set_address(search.mode, &address);
            let outcome = run_search(&mut session, &search).await?;
            if let Some(name) = save_favorite {
                let name = session.save_favorite(outcome.mode, name)?;
                println!("Saved favorite: {}", name);
            }
        }
        Commands::At {
            lat,
            lon,
            search,
            save_favorite,
        } => {
            session.place_at(search.mode, lat, lon)?;
            let outcome = run_search(&mut session, &search).await?;
            if let Some(name) = save_favorite {
                let name = session.save_favorite(outcome.mode, name)?;
                println!("Saved favorite: {}", name);
            }
        }
        Commands::Watch {
            address,
            search,
            interval,
        } => {
            session.set_address(search.mode, &address);
            watch(&mut session, &search, Duration::from_secs(interval)).await?;
        }
        Commands::Shell { mode } => {
            Shell::new(&mut session, mode).run().await?;
        }
        Commands::Favorites { action } => favorites(&mut session, action)?,
        Commands::Settings { action } => settings(&mut session, action, config_path)?,
    }
    Ok(())
}

fn apply_search_args(session: &mut Session, args: &SearchArgs) {
    if let Some(radius) = args.radius {
        session.set_radius(args.mode, radius);
    }
    if let Some(direction) = args.direction {
        session.set_direction(args.mode, direction);
    }
}

fn map_path(session: &Session, args: &SearchArgs) -> Option<PathBuf> {
    args.map.as_ref().map(|path| {
        path.clone()
            .unwrap_or_else(|| session.config().storage.map_output.clone())
    })
}

fn output(session: &Session, args: &SearchArgs, outcome: &SearchOutcome) -> Result<(), AppError> {
    println!("{}", render_outcome(outcome));
    if let Some(path) = map_path(session, args) {
        if outcome.result.is_empty() {
            println!("No stations to map");
        } else {
            write_map(&path, &render_map(outcome)?)?;
            println!("Map written to {}", path.display());
        }
    }
    Ok(())
}

async fn run_search(session: &mut Session, args: &SearchArgs) -> Result<SearchOutcome, AppError> {
    apply_search_args(session, args);
    let outcome = session.search(args.mode, args.refresh).await?;
    output(session, args, &outcome)?;
    Ok(outcome)
}

/// Re-run one search on a timer, refetching the feed before each pass.
/// Stops on Ctrl-C.
async fn watch(session: &mut Session, args: &SearchArgs, interval: Duration) -> Result<(), AppError> {
    apply_search_args(session, args);
    let mut force_refresh = args.refresh;

    loop {
        let outcome = session.search(args.mode, force_refresh).await?;
        force_refresh = false;
        output(session, args, &outcome)?;
        println!(
            "Refreshing every {}s, Ctrl-C to stop",
            interval.as_secs()
        );

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = tokio::signal::ctrl_c() => break,
        }

        println!();
        if let Err(e) = session.refresh_stations().await {
            tracing::warn!("Refresh failed, keeping previous data: {}", e);
        }
    }
    Ok(())
}

fn favorites(session: &mut Session, action: FavoritesAction) -> Result<(), AppError> {
    match action {
        FavoritesAction::List => {
            let favorites = &session.preferences().favorites;
            if favorites.is_empty() {
                println!("No favorites saved");
            }
            for (name, favorite) in favorites {
                println!(
                    "{}: {} ({}, {} mi, {})",
                    name, favorite.address, favorite.search_type, favorite.radius, favorite.direction
                );
            }
        }
        FavoritesAction::Show { name } => {
            let favorite = session.preferences().favorite(&name)?;
            let json =
                serde_json::to_string_pretty(favorite).context("Failed to encode favorite")?;
            println!("{}", json);
        }
        FavoritesAction::Delete { name } => {
            session.delete_favorite(&name)?;
            println!("Deleted favorite: {}", name);
        }
    }
    Ok(())
}

fn settings(
    session: &mut Session,
    action: SettingsAction,
    config_path: anyhow::Result<PathBuf>,
) -> Result<(), AppError> {
    match action {
        SettingsAction::ApiKey { key, remember } => {
            session.set_api_key(&key, remember)?;
            if remember {
                println!(
                    "Weather API key saved to {}",
                    session.preferences_path().display()
                );
            } else {
                println!(
                    "Key not stored. Use --remember, --api-key or {} to enable weather.",
                    API_KEY_ENV
                );
            }
        }
        SettingsAction::ForgetApiKey => {
            session.forget_api_key()?;
            println!("Weather API key removed");
        }
        SettingsAction::Show => {
            let config = session.config();
            match config_path {
                Ok(path) => println!("Config file:      {}", path.display()),
                Err(e) => println!("Config file:      unavailable ({})", e),
            }
            println!("Preferences file: {}", session.preferences_path().display());
            println!("Station feed:     {}", config.endpoints.gbfs_url);
            println!("Router:           {}", config.endpoints.routing_url);
            println!("Geocoder:         {}", config.endpoints.geocode_url);
            println!(
                "Default search:   {} mi, {}",
                config.search.default_radius_miles, config.search.default_direction
            );
            println!(
                "Weather:          {}",
                if session.has_weather() {
                    "enabled"
                } else {
                    "disabled (no API key)"
                }
            );
            println!(
                "API key stored:   {}",
                if session.preferences().remembered_api_key().is_some() {
                    "yes"
                } else {
                    "no"
                }
            );
            println!("Favorites:        {}", session.preferences().favorites.len());
        }
    }
    Ok(())
}
