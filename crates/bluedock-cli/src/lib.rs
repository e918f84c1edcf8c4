//! Terminal front end for Bluedock: the search session, rendering of
//! results as text and Leaflet maps, and the interactive shell.

pub mod error_mapping;
pub mod render;
pub mod session;
pub mod shell;

pub use session::{resolve_api_key, SearchOutcome, SearchParams, Session};
