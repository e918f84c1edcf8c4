//! Maps crate errors that live outside bluedock-core to
//! bluedock_core::AppError for consistent user-facing messages.

mod weather;

pub use weather::weather_error;
