//! Persisted user preferences: the weather API key and favorite searches.
//!
//! Stored as a flat JSON document:
//! `{"api_key": "", "favorites": {...}, "save_api_key": false}`.
//! The key is only written when the user asked for it to be remembered.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::Path;

use crate::error::StorageError;

/// Whether a search looks for bikes to pick up or docks to return to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    #[default]
    Pickup,
    Dropoff,
}

impl SearchMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pickup => "pickup",
            Self::Dropoff => "dropoff",
        }
    }

    /// Heading shown above a search ("Find bikes" / "Find docks")
    pub fn title(&self) -> &'static str {
        match self {
            Self::Pickup => "Find bikes",
            Self::Dropoff => "Find docks",
        }
    }
}

impl std::fmt::Display for SearchMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SearchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pickup" | "bikes" => Ok(Self::Pickup),
            "dropoff" | "docks" => Ok(Self::Dropoff),
            other => Err(format!("unknown search mode: {}", other)),
        }
    }
}

/// A successfully geocoded address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeocodedLocation {
    pub lat: f64,
    pub lon: f64,
    pub formatted_address: String,
}

impl GeocodedLocation {
    /// Pseudo-result for a search placed directly on coordinates.
    pub fn from_coordinates(lat: f64, lon: f64) -> Self {
        Self {
            lat,
            lon,
            formatted_address: format!("Map Location ({:.4}, {:.4})", lat, lon),
        }
    }
}

/// A saved search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Favorite {
    pub address: String,
    pub search_type: SearchMode,
    pub radius: f64,
    pub direction: String,
    pub location_result: GeocodedLocation,
}

impl Favorite {
    /// Name used when the user does not pick one: `"pickup: 123 Main St, Bo..."`.
    pub fn default_name(search_type: SearchMode, address: &str) -> String {
        let prefix: String = address.chars().take(15).collect();
        format!("{}: {}...", search_type, prefix)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(default)]
    pub api_key: String,

    #[serde(default)]
    pub favorites: BTreeMap<String, Favorite>,

    #[serde(default)]
    pub save_api_key: bool,
}

impl Preferences {
    /// Load preferences, falling back to defaults on any problem.
    pub fn load_from(path: &Path) -> Self {
        match Self::try_load_from(path) {
            Ok(Some(prefs)) => prefs,
            Ok(None) => Self::default(),
            Err(e) => {
                tracing::warn!("{}; using default preferences", e);
                Self::default()
            }
        }
    }

    /// Load preferences, returning `None` if the file does not exist.
    pub fn try_load_from(path: &Path) -> Result<Option<Self>, StorageError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(StorageError::Read {
                    path: path.display().to_string(),
                    message: e.to_string(),
                })
            }
        };

        if contents.trim().is_empty() {
            return Ok(None);
        }

        serde_json::from_str(&contents)
            .map(Some)
            .map_err(|e| StorageError::Read {
                path: path.display().to_string(),
                message: e.to_string(),
            })
    }

    pub fn save_to(&self, path: &Path) -> Result<(), StorageError> {
        let write_err = |message: String| StorageError::Write {
            path: path.display().to_string(),
            message,
        };

        let on_disk = Self {
            api_key: if self.save_api_key {
                self.api_key.clone()
            } else {
                String::new()
            },
            favorites: self.favorites.clone(),
            save_api_key: self.save_api_key,
        };

        let contents = serde_json::to_string(&on_disk).map_err(|e| write_err(e.to_string()))?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| write_err(e.to_string()))?;
        }
        std::fs::write(path, contents).map_err(|e| write_err(e.to_string()))?;

        tracing::debug!("Saved preferences to {}", path.display());
        Ok(())
    }

    /// Update the stored key. Forgetting clears it.
    pub fn set_api_key(&mut self, key: &str, remember: bool) {
        self.save_api_key = remember;
        self.api_key = if remember { key.to_string() } else { String::new() };
    }

    /// The remembered key, if any.
    pub fn remembered_api_key(&self) -> Option<&str> {
        if self.save_api_key && !self.api_key.is_empty() {
            Some(self.api_key.as_str())
        } else {
            None
        }
    }

    /// Add or replace a favorite, returning its name.
    pub fn add_favorite(&mut self, name: Option<String>, favorite: Favorite) -> String {
        let name = name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| Favorite::default_name(favorite.search_type, &favorite.address));
        self.favorites.insert(name.clone(), favorite);
        name
    }

    pub fn remove_favorite(&mut self, name: &str) -> Result<Favorite, StorageError> {
        self.favorites
            .remove(name)
            .ok_or_else(|| StorageError::FavoriteNotFound(name.to_string()))
    }

    pub fn favorite(&self, name: &str) -> Result<&Favorite, StorageError> {
        self.favorites
            .get(name)
            .ok_or_else(|| StorageError::FavoriteNotFound(name.to_string()))
    }
}
