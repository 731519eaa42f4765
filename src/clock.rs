//! Wall-clock helpers
//!
//! History start references and Timer timestamps are Unix seconds as `f64`,
//! so they survive a JSON round trip unchanged.

use chrono::Utc;

/// Current wall-clock time in Unix seconds (microsecond resolution).
#[allow(clippy::cast_precision_loss)]
pub fn now_secs() -> f64 {
    Utc::now().timestamp_micros() as f64 / 1e6
}

/// Human-readable local timestamp used in run metadata.
pub fn date_and_time() -> String {
    chrono::Local::now().format("%d-%m-%Y--%H-%M-%S").to_string()
}
