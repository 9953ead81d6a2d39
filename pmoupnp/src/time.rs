//! Time conversions for AVTransport.
//!
//! AVTransport reports and accepts positions as `H+:MM:SS[.F+]` strings
//! (`RelTime`, `TrackDuration`, `Seek` targets with unit `REL_TIME`).

use crate::errors::UpnpError;

/// Parses `H+:MM:SS[.F+]` (also `MM:SS` and plain seconds) to seconds.
///
/// Renderers that do not know the value answer `NOT_IMPLEMENTED` or an
/// empty string; both read as `0.0`.
///
/// ```
/// # use pmoupnp::time::hms_to_seconds;
/// assert_eq!(hms_to_seconds("0:01:30").unwrap(), 90.0);
/// assert_eq!(hms_to_seconds("01:00:00.500").unwrap(), 3600.5);
/// assert_eq!(hms_to_seconds("NOT_IMPLEMENTED").unwrap(), 0.0);
/// ```
pub fn hms_to_seconds(input: &str) -> Result<f64, UpnpError> {
    let trimmed = input.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("NOT_IMPLEMENTED") {
        return Ok(0.0);
    }

    let parts: Vec<&str> = trimmed.split(':').collect();
    if parts.len() > 3 {
        return Err(UpnpError::InvalidTimeFormat(input.to_string()));
    }

    // Only the last component may carry a fraction.
    let (whole, last) = parts.split_at(parts.len() - 1);
    let mut total = 0.0;
    for part in whole {
        let value: u64 = part
            .parse()
            .map_err(|_| UpnpError::InvalidTimeFormat(input.to_string()))?;
        total = total * 60.0 + value as f64;
    }

    let seconds: f64 = last[0]
        .parse()
        .map_err(|_| UpnpError::InvalidTimeFormat(input.to_string()))?;
    if !seconds.is_finite() || seconds < 0.0 {
        return Err(UpnpError::InvalidTimeFormat(input.to_string()));
    }

    Ok(total * 60.0 + seconds)
}

/// Formats seconds as `HH:MM:SS`, rounding to the nearest second.
///
/// ```
/// # use pmoupnp::time::seconds_to_hms;
/// assert_eq!(seconds_to_hms(50.0), "00:00:50");
/// assert_eq!(seconds_to_hms(3661.4), "01:01:01");
/// ```
pub fn seconds_to_hms(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.round() as u64
    } else {
        0
    };
    format!(
        "{:02}:{:02}:{:02}",
        total / 3600,
        (total % 3600) / 60,
        total % 60
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_renderer_formats() {
        assert_eq!(hms_to_seconds("00:00:00").unwrap(), 0.0);
        assert_eq!(hms_to_seconds("0:03:45").unwrap(), 225.0);
        assert_eq!(hms_to_seconds("123:00:00").unwrap(), 442800.0);
        assert_eq!(hms_to_seconds("02:03").unwrap(), 123.0);
        assert_eq!(hms_to_seconds("42").unwrap(), 42.0);
        assert_eq!(hms_to_seconds(" 00:00:01.250 ").unwrap(), 1.25);
        assert_eq!(hms_to_seconds("").unwrap(), 0.0);
        assert_eq!(hms_to_seconds("not_implemented").unwrap(), 0.0);
    }

    #[test]
    fn rejects_garbage() {
        assert!(hms_to_seconds("1:2:3:4").is_err());
        assert!(hms_to_seconds("ab:00:00").is_err());
        assert!(hms_to_seconds("00:00:xx").is_err());
        assert!(hms_to_seconds("00:1.5:00").is_err());
        assert!(hms_to_seconds("-5").is_err());
    }

    #[test]
    fn formats_whole_seconds() {
        assert_eq!(seconds_to_hms(0.0), "00:00:00");
        assert_eq!(seconds_to_hms(30.0), "00:00:30");
        assert_eq!(seconds_to_hms(59.6), "00:01:00");
        assert_eq!(seconds_to_hms(86399.0), "23:59:59");
        assert_eq!(seconds_to_hms(-3.0), "00:00:00");
        assert_eq!(seconds_to_hms(f64::NAN), "00:00:00");
    }
}
