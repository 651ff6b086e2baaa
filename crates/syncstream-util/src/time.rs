//! Time utilities for syncstream

use chrono::{DateTime, Local};

/// Get the current local time.
///
/// All timestamps recorded by the engine and the audit log go through here.
#[allow(clippy::disallowed_methods)]
pub fn now() -> DateTime<Local> {
    chrono::Local::now()
}

/// Format a DateTime for display with full date and time.
pub fn format_datetime_full(dt: &DateTime<Local>) -> String {
    dt.format("%Y-%m-%d %H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn format_full() {
        let dt = Local.with_ymd_and_hms(2026, 1, 7, 9, 5, 3).unwrap();
        assert_eq!(format_datetime_full(&dt), "2026-01-07 09:05:03");
    }
}
