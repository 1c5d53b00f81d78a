use chrono::{TimeZone, Utc};

/// Formats an epoch-millisecond timestamp as `dd/MM/yyyy` (UTC).
///
/// Values outside chrono's representable range yield an empty string.
pub fn format_timestamp(timestamp_ms: i64) -> String {
    match Utc.timestamp_millis_opt(timestamp_ms).single() {
        Some(datetime) => datetime.format("%d/%m/%Y").to_string(),
        None => String::new(),
    }
}

/// Formats a byte count for display with binary units and two-decimal
/// precision. The highest cleared threshold wins: >= 1024 KB renders as MB,
/// >= 1024 bytes as KB, everything else as bytes.
pub fn format_size(size_bytes: u64) -> String {
    let bytes = size_bytes as f64;
    let kb = bytes / 1024.0;
    let mb = kb / 1024.0;
    if mb >= 1.0 {
        format!("{:.2} MB", mb)
    } else if kb >= 1.0 {
        format!("{:.2} KB", kb)
    } else {
        format!("{:.2} bytes", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size_units() {
        assert_eq!(format_size(0), "0.00 bytes");
        assert_eq!(format_size(500), "500.00 bytes");
        assert_eq!(format_size(1023), "1023.00 bytes");
        assert_eq!(format_size(1024), "1.00 KB");
        assert_eq!(format_size(2048), "2.00 KB");
        assert_eq!(format_size(5_242_880), "5.00 MB");
    }

    #[test]
    fn test_format_timestamp() {
        // 2024-01-15T00:00:00Z
        assert_eq!(format_timestamp(1_705_276_800_000), "15/01/2024");
        // Mid-day stays on the same date
        assert_eq!(format_timestamp(1_705_276_800_000 + 13 * 3_600_000), "15/01/2024");
        assert_eq!(format_timestamp(0), "01/01/1970");
        assert_eq!(format_timestamp(i64::MAX), "");
    }
}
