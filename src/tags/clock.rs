//! Source of tag version timestamps.

use chrono::Utc;

/// Produces the version string written when a tag is created or bumped.
pub trait Clock: Send + Sync {
    fn timestamp(&self) -> String;
}

/// Wall clock with second resolution (Unix seconds).
///
/// Two versions written within the same second are equal, so a bump in the
/// same second as the snapshot it should invalidate goes unnoticed.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn timestamp(&self) -> String {
        Utc::now().timestamp().to_string()
    }
}
