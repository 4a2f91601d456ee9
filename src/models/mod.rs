//! Data models for the LexMatch marketplace.
//!
//! Wire names are camelCase to match the web client.

mod auth;
mod lead;
mod professional;
mod questionnaire;

pub use auth::*;
pub use lead::*;
pub use professional::*;
pub use questionnaire::*;

use chrono::{SecondsFormat, Utc};

/// Current time as fixed-width RFC 3339, so stored timestamps sort lexically.
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}
