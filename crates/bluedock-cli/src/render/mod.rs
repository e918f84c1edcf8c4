//! Presentation of search outcomes: terminal text and HTML maps.

pub mod map;
pub mod text;

pub use map::{render_map, write_map};
pub use text::render_outcome;

/// Radius as typed in the menus: `0.5`, `1.0`, `0.25`.
pub fn format_radius(radius: f64) -> String {
    if radius.fract() == 0.0 {
        format!("{:.1}", radius)
    } else {
        format!("{}", radius)
    }
}
