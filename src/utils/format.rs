use crate::error::DownloadError;

const UNITS: [&str; 9] = ["B", "KB", "MB", "GB", "TB", "PB", "EB", "ZB", "YB"];
const K: u128 = 1024;

/// Index into `UNITS` such that `1024^index <= bytes < 1024^(index + 1)`.
pub fn unit_index(bytes: u64) -> usize {
    let bytes = bytes as u128;
    let mut index = 0;
    let mut divisor = K;
    while index + 1 < UNITS.len() && bytes >= divisor {
        divisor *= K;
        index += 1;
    }
    index
}

/// `value` with exactly `decimals` places, exact ties rounded up (`1.25` at
/// one place is `1.3`).
pub fn to_fixed(value: f64, decimals: usize) -> String {
    let scale = 10f64.powi(decimals as i32);
    format!("{:.*}", decimals, (value * scale).round() / scale)
}

/// Human readable byte count, e.g. `1.5MB`.
///
/// The value is rounded to `decimals` places and trailing zeros are dropped,
/// so `1024` renders as `1KB` rather than `1.00KB`.
pub fn format_bytes(bytes: u64, decimals: usize, show_unit: bool) -> String {
    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    let index = unit_index(bytes);
    let value = bytes as f64 / (K.pow(index as u32) as f64);
    let mut text = to_fixed(value, decimals);
    if text.contains('.') {
        let trimmed = text.trim_end_matches('0').trim_end_matches('.').len();
        text.truncate(trimmed);
    }

    if show_unit {
        text.push_str(UNITS[index]);
    }
    text
}

/// `mm:ss` below one hour, `hh:mm` from one hour on.
pub fn format_seconds(seconds: u64) -> String {
    // rendered as a time of day, so hours wrap after 24
    let seconds = seconds % 86_400;
    if seconds < 3600 {
        format!("{:02}:{:02}", seconds / 60, seconds % 60)
    } else {
        format!("{:02}:{:02}", seconds / 3600, (seconds % 3600) / 60)
    }
}

/// Same as [`format_seconds`] for durations that arrive as text.
pub fn format_seconds_str(seconds: &str) -> Result<String, DownloadError> {
    let value: f64 = seconds
        .trim()
        .parse()
        .map_err(|_| DownloadError::InvalidArgument(format!("not a number of seconds: {:?}", seconds)))?;
    if !value.is_finite() || value < 0.0 {
        return Err(DownloadError::InvalidArgument(format!("not a valid duration: {:?}", seconds)));
    }
    Ok(format_seconds(value.trunc() as u64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_bytes() {
        assert_eq!(format_bytes(0, 1, true), "0 Bytes");
        assert_eq!(format_bytes(0, 2, false), "0 Bytes");
    }

    #[test]
    fn test_unit_boundaries() {
        for k in 0..7u32 {
            let low = 1024u128.pow(k);
            let high = 1024u128.pow(k + 1) - 1;
            assert_eq!(unit_index(low as u64), k as usize, "lower bound of unit {}", k);
            if high <= u64::MAX as u128 {
                assert_eq!(unit_index(high as u64), k as usize, "upper bound of unit {}", k);
            }
        }
        assert_eq!(unit_index(u64::MAX), 6);
    }

    #[test]
    fn test_format_bytes_rounding() {
        assert_eq!(format_bytes(1, 1, true), "1B");
        assert_eq!(format_bytes(1023, 2, true), "1023B");
        assert_eq!(format_bytes(1024, 2, true), "1KB");
        assert_eq!(format_bytes(1536, 1, true), "1.5KB");
        assert_eq!(format_bytes(1_572_864, 1, true), "1.5MB");
        assert_eq!(format_bytes(1_234_567, 2, true), "1.18MB");
        assert_eq!(format_bytes(1_234_567, 0, true), "1MB");
        assert_eq!(format_bytes(1536, 1, false), "1.5");
    }

    #[test]
    fn test_ties_round_up() {
        assert_eq!(format_bytes(1280, 1, true), "1.3KB");
        assert_eq!(format_bytes(1152, 2, true), "1.13KB");
        assert_eq!(format_bytes(2560, 0, true), "3KB");
        assert_eq!(format_bytes(1_310_720, 1, true), "1.3MB");
        assert_eq!(to_fixed(6.25, 1), "6.3");
        assert_eq!(to_fixed(0.125, 2), "0.13");
        assert_eq!(to_fixed(50.0, 2), "50.00");
        // 1.005 is stored just below the tie
        assert_eq!(to_fixed(1.005, 2), "1.00");
    }

    #[test]
    fn test_format_seconds_boundary() {
        assert_eq!(format_seconds(0), "00:00");
        assert_eq!(format_seconds(75), "01:15");
        assert_eq!(format_seconds(3599), "59:59");
        assert_eq!(format_seconds(3600), "01:00");
        assert_eq!(format_seconds(3600 * 2 + 60 * 5 + 59), "02:05");
    }

    #[test]
    fn test_format_seconds_str() {
        assert_eq!(format_seconds_str("212").unwrap(), "03:32");
        assert_eq!(format_seconds_str(" 59.9 ").unwrap(), "00:59");
        assert!(matches!(format_seconds_str("abc"), Err(DownloadError::InvalidArgument(_))));
        assert!(matches!(format_seconds_str("-1"), Err(DownloadError::InvalidArgument(_))));
        assert!(matches!(format_seconds_str("inf"), Err(DownloadError::InvalidArgument(_))));
    }
}
