use bluedock_core::SearchMode;
use bluedock_services::{Direction, NearbyStation};
use bluedock_weather::CurrentWeather;
use chrono::Local;

use super::format_radius;
use crate::session::SearchOutcome;

/// Headline counters above the station list, in display order.
pub fn metrics(mode: SearchMode, stations: &[NearbyStation]) -> Vec<(&'static str, u32)> {
    let total = stations.len() as u32;
    match mode {
        SearchMode::Pickup => {
            let with_bikes = stations
                .iter()
                .filter(|s| s.station.num_bikes_available > 0)
                .count() as u32;
            let ebikes: u32 = stations.iter().map(|s| s.station.num_ebikes_available).sum();
            let regular: u32 = stations.iter().map(|s| s.station.regular_bikes()).sum();
            vec![
                ("Stations", total),
                ("With Bikes", with_bikes),
                ("Regular", regular),
                ("E-bikes", ebikes),
            ]
        }
        SearchMode::Dropoff => {
            let with_docks = stations
                .iter()
                .filter(|s| s.station.num_docks_available > 0)
                .count() as u32;
            let docks: u32 = stations.iter().map(|s| s.station.num_docks_available).sum();
            vec![
                ("Stations", total),
                ("With Docks", with_docks),
                ("Full", total - with_docks),
                ("Free Docks", docks),
            ]
        }
    }
}

pub fn empty_message(radius: f64, direction: Direction) -> String {
    format!(
        "No stations found within {} mi walking distance in {}",
        format_radius(radius),
        direction.describe()
    )
}

pub fn weather_line(weather: &CurrentWeather) -> String {
    format!(
        "Temperature {:.0}°F | Humidity {}% | Wind {:.0} mph | Conditions {} ({})",
        weather.temperature,
        weather.humidity,
        weather.wind_speed,
        weather.riding_conditions().label(),
        weather.description
    )
}

pub fn station_line(mode: SearchMode, nearby: &NearbyStation) -> String {
    let station = &nearby.station;
    let availability = match mode {
        SearchMode::Pickup => format!(
            "{:>2} bikes ({} e-bikes, {} regular)",
            station.num_bikes_available,
            station.num_ebikes_available,
            station.regular_bikes()
        ),
        SearchMode::Dropoff => format!("{:>2} free docks", station.num_docks_available),
    };
    let closed = match mode {
        SearchMode::Pickup if !station.is_renting => "  [not renting]",
        SearchMode::Dropoff if !station.is_returning => "  [not accepting returns]",
        _ => "",
    };
    format!(
        "{:<40} Walk: {:.1} mi  {}{}",
        station.name, nearby.walking_distance_miles, availability, closed
    )
}

/// Full terminal rendering of one search.
pub fn render_outcome(outcome: &SearchOutcome) -> String {
    let mut lines = vec![format!(
        "{} near {}",
        outcome.mode.title(),
        outcome.location.formatted_address
    )];
    lines.push(format!(
        "Radius {} mi, direction {}",
        format_radius(outcome.radius),
        outcome.direction
    ));

    if let Some(weather) = &outcome.weather {
        lines.push(weather_line(weather));
    }

    let result = &outcome.result;
    if result.is_empty() {
        lines.push(empty_message(outcome.radius, outcome.direction));
    } else {
        let summary = metrics(outcome.mode, &result.stations)
            .iter()
            .map(|(label, value)| format!("{}: {}", label, value))
            .collect::<Vec<_>>()
            .join(" | ");
        lines.push(summary);
        lines.push(String::new());
        lines.extend(
            result
                .stations
                .iter()
                .map(|nearby| station_line(outcome.mode, nearby)),
        );
    }

    if let Some(caption) = result.summary.caption() {
        lines.push(caption);
    }
    if result.from_cache {
        lines.push("Routes from cache, availability refreshed".to_string());
    }
    if let Some(updated) = outcome.last_update {
        lines.push(format!(
            "Last updated: {}",
            updated.with_timezone(&Local).format("%H:%M:%S")
        ));
    }

    lines.join("\n")
}
