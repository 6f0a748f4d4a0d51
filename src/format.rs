//! Formatting helpers for human-readable byte sizes and durations.

use std::time::Duration;

const KB: u64 = 1024;
const MB: u64 = KB * 1024;
const GB: u64 = MB * 1024;

/// Formats a byte count as a human-readable string (B, KB, MB, GB).
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn format_bytes(bytes: u64) -> String {
    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{bytes} B")
    }
}

/// Formats a byte count in megabytes with two decimals, as shown next to
/// the selection total.
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn format_megabytes(bytes: u64) -> String {
    format!("{:.2} MB", bytes as f64 / MB as f64)
}

/// Formats a selection total against the batch cap (e.g. "120.00 MB / 100.00 MB").
#[must_use]
pub fn format_size_vs_limit(total: u64, limit: u64) -> String {
    format!("{} / {}", format_megabytes(total), format_megabytes(limit))
}

/// Formats a duration as a human-readable string (e.g. "5.0s", "1m 05s", "1h 01m 05s").
#[must_use]
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs >= 3600 {
        format!(
            "{}h {:02}m {:02}s",
            secs / 3600,
            (secs % 3600) / 60,
            secs % 60
        )
    } else if secs >= 60 {
        format!("{}m {:02}s", secs / 60, secs % 60)
    } else {
        format!("{}.{:01}s", secs, d.subsec_millis() / 100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_bytes_units() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(500), "500 B");
        assert_eq!(format_bytes(1536), "1.50 KB");
        assert_eq!(format_bytes(11 * MB), "11.00 MB");
        assert_eq!(format_bytes(GB), "1.00 GB");
    }

    #[test]
    fn megabytes_always_use_two_decimals() {
        assert_eq!(format_megabytes(0), "0.00 MB");
        assert_eq!(format_megabytes(MB / 2), "0.50 MB");
        assert_eq!(format_megabytes(1200 * MB), "1200.00 MB");
    }

    #[test]
    fn size_vs_limit() {
        assert_eq!(
            format_size_vs_limit(1200 * MB, 1024 * MB),
            "1200.00 MB / 1024.00 MB"
        );
    }

    #[test]
    fn format_duration_units() {
        assert_eq!(format_duration(Duration::ZERO), "0.0s");
        assert_eq!(format_duration(Duration::from_millis(500)), "0.5s");
        assert_eq!(format_duration(Duration::from_secs(65)), "1m 05s");
        assert_eq!(format_duration(Duration::from_secs(3665)), "1h 01m 05s");
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn format_bytes_never_panics(bytes in 0u64..u64::MAX) {
                let _ = format_bytes(bytes);
            }

            #[test]
            fn format_megabytes_has_two_decimals(bytes in 0u64..1_000_000_000_000) {
                let text = format_megabytes(bytes);
                let number = text.trim_end_matches(" MB");
                let decimals = number.split('.').nth(1).map(str::len);
                prop_assert_eq!(decimals, Some(2));
            }
        }
    }
}
