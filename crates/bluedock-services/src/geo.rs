//! Straight-line geometry used to pre-filter stations before routing.

use serde::{Deserialize, Serialize};

/// Mean Earth radius in miles.
pub const EARTH_RADIUS_MILES: f64 = 3959.0;

/// A WGS84 point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Six-decimal rendering used in cache keys (about 10 cm).
    pub fn cache_key(&self) -> String {
        format!("{:.6},{:.6}", self.lat, self.lon)
    }

    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }
}

/// Great-circle distance in miles.
pub fn haversine_miles(a: Coordinate, b: Coordinate) -> f64 {
    let (lat1, lat2) = (a.lat.to_radians(), b.lat.to_radians());
    let dlat = lat2 - lat1;
    let dlon = (b.lon - a.lon).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_MILES * h.sqrt().asin()
}

/// Initial bearing from `a` to `b`, in degrees within `[0, 360)`.
pub fn bearing_degrees(a: Coordinate, b: Coordinate) -> f64 {
    let (lat1, lat2) = (a.lat.to_radians(), b.lat.to_radians());
    let dlon = (b.lon - a.lon).to_radians();

    let y = dlon.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlon.cos();

    (y.atan2(x).to_degrees() + 360.0) % 360.0
}

/// Compass filter applied to the bearing from the search origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    All,
    North,
    Northeast,
    East,
    Southeast,
    South,
    Southwest,
    West,
    Northwest,
}

impl Direction {
    pub const ALL: [Direction; 9] = [
        Direction::All,
        Direction::North,
        Direction::Northeast,
        Direction::East,
        Direction::Southeast,
        Direction::South,
        Direction::Southwest,
        Direction::West,
        Direction::Northwest,
    ];

    /// Inclusive bearing bounds `(start, end)`; north wraps through 0.
    fn sector(&self) -> Option<(f64, f64)> {
        match self {
            Self::All => None,
            Self::North => Some((337.5, 22.5)),
            Self::Northeast => Some((22.5, 67.5)),
            Self::East => Some((67.5, 112.5)),
            Self::Southeast => Some((112.5, 157.5)),
            Self::South => Some((157.5, 202.5)),
            Self::Southwest => Some((202.5, 247.5)),
            Self::West => Some((247.5, 292.5)),
            Self::Northwest => Some((292.5, 337.5)),
        }
    }

    pub fn contains(&self, bearing: f64) -> bool {
        match self.sector() {
            None => true,
            Some((start, end)) if start > end => bearing >= start || bearing <= end,
            Some((start, end)) => (start..=end).contains(&bearing),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::North => "north",
            Self::Northeast => "northeast",
            Self::East => "east",
            Self::Southeast => "southeast",
            Self::South => "south",
            Self::Southwest => "southwest",
            Self::West => "west",
            Self::Northwest => "northwest",
        }
    }

    pub fn short_label(&self) -> &'static str {
        match self {
            Self::All => "All",
            Self::North => "N",
            Self::Northeast => "NE",
            Self::East => "E",
            Self::Southeast => "SE",
            Self::South => "S",
            Self::Southwest => "SW",
            Self::West => "W",
            Self::Northwest => "NW",
        }
    }

    /// Phrase used when nothing matched: "all directions" / "the north direction".
    pub fn describe(&self) -> String {
        match self {
            Self::All => "all directions".to_string(),
            other => format!("the {} direction", other.name()),
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|d| d.name() == wanted || d.short_label().to_lowercase() == wanted)
            .ok_or_else(|| format!("unknown direction: {}", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOSTON: Coordinate = Coordinate {
        lat: 42.3601,
        lon: -71.0589,
    };

    fn approx(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() < tol
    }

    #[test]
    fn test_haversine_zero_for_same_point() {
        assert_eq!(haversine_miles(BOSTON, BOSTON), 0.0);
    }

    #[test]
    fn test_haversine_known_distance() {
        // Boston to Cambridge (Harvard Square), roughly 3.2 miles
        let harvard = Coordinate::new(42.3736, -71.1190);
        let d = haversine_miles(BOSTON, harvard);
        assert!(approx(d, 3.22, 0.1), "got {}", d);
    }

    #[test]
    fn test_one_degree_latitude() {
        let north = Coordinate::new(BOSTON.lat + 1.0, BOSTON.lon);
        assert!(approx(haversine_miles(BOSTON, north), 69.1, 0.1));
    }

    #[test]
    fn test_bearing_cardinals() {
        let north = Coordinate::new(BOSTON.lat + 0.01, BOSTON.lon);
        let east = Coordinate::new(BOSTON.lat, BOSTON.lon + 0.01);
        let south = Coordinate::new(BOSTON.lat - 0.01, BOSTON.lon);
        let west = Coordinate::new(BOSTON.lat, BOSTON.lon - 0.01);

        assert!(approx(bearing_degrees(BOSTON, north), 0.0, 0.01));
        assert!(approx(bearing_degrees(BOSTON, east), 90.0, 0.1));
        assert!(approx(bearing_degrees(BOSTON, south), 180.0, 0.01));
        assert!(approx(bearing_degrees(BOSTON, west), 270.0, 0.1));
    }

    #[test]
    fn test_bearing_is_normalized() {
        let nw = Coordinate::new(BOSTON.lat + 0.01, BOSTON.lon - 0.01);
        let b = bearing_degrees(BOSTON, nw);
        assert!((0.0..360.0).contains(&b));
        assert!(Direction::Northwest.contains(b));
    }

    #[test]
    fn test_north_sector_wraps() {
        assert!(Direction::North.contains(0.0));
        assert!(Direction::North.contains(350.0));
        assert!(Direction::North.contains(22.5));
        assert!(!Direction::North.contains(23.0));
        assert!(!Direction::North.contains(337.0));
    }

    #[test]
    fn test_sector_bounds_are_inclusive() {
        assert!(Direction::Northeast.contains(22.5));
        assert!(Direction::Northeast.contains(67.5));
        assert!(Direction::East.contains(67.5));
        assert!(Direction::South.contains(180.0));
        assert!(!Direction::South.contains(100.0));
    }

    #[test]
    fn test_all_contains_everything() {
        for bearing in [0.0, 45.0, 180.0, 359.9] {
            assert!(Direction::All.contains(bearing));
        }
    }

    #[test]
    fn test_every_bearing_has_a_sector() {
        let mut bearing = 0.0;
        while bearing < 360.0 {
            let hits = Direction::ALL[1..]
                .iter()
                .filter(|d| d.contains(bearing))
                .count();
            assert!(hits >= 1, "bearing {} has no sector", bearing);
            bearing += 0.5;
        }
    }

    #[test]
    fn test_direction_parsing() {
        assert_eq!("NE".parse::<Direction>().unwrap(), Direction::Northeast);
        assert_eq!("southwest".parse::<Direction>().unwrap(), Direction::Southwest);
        assert_eq!(" All ".parse::<Direction>().unwrap(), Direction::All);
        assert!("up".parse::<Direction>().is_err());
    }

    #[test]
    fn test_direction_describe() {
        assert_eq!(Direction::All.describe(), "all directions");
        assert_eq!(Direction::West.describe(), "the west direction");
    }

    #[test]
    fn test_coordinate_cache_key() {
        assert_eq!(Coordinate::new(42.36, -71.0589).cache_key(), "42.360000,-71.058900");
    }

    #[test]
    fn test_coordinate_validity() {
        assert!(BOSTON.is_valid());
        assert!(!Coordinate::new(91.0, 0.0).is_valid());
        assert!(!Coordinate::new(f64::NAN, 0.0).is_valid());
    }
}
