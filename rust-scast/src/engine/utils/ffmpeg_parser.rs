//! FFmpeg output parsing utilities.
//!
//! FFmpeg reports its status on stderr as
//! `frame=X fps=X q=X size=XkB time=HH:MM:SS.ms bitrate=Xkbits/s speed=Xx`.

use crate::engine::EngineProgress;

/// Parse time string in HH:MM:SS.ms format to seconds.
///
/// # Examples
/// ```ignore
/// assert_eq!(parse_time("00:00:10.50"), Some(10.5));
/// assert_eq!(parse_time("N/A"), None);
/// ```
pub fn parse_time(time_str: &str) -> Option<f64> {
    // Negative timestamps show up before the first packet is muxed.
    if time_str.trim_start().starts_with('-') {
        return None;
    }

    let mut parts = time_str.split(':');
    let hours: f64 = parts.next()?.trim().parse().ok()?;
    let minutes: f64 = parts.next()?.parse().ok()?;
    let seconds: f64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }

    Some(hours * 3600.0 + minutes * 60.0 + seconds)
}

/// Value of a `key=value` field, tolerating padding after the `=`.
fn field<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    let start = line.find(key)? + key.len();
    let rest = line[start..].trim_start();
    let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
    Some(&rest[..end])
}

/// Parse the `time=` field to seconds.
pub fn parse_time_field(line: &str) -> Option<f64> {
    parse_time(field(line, "time=")?)
}

/// Parse the `bitrate=` field (e.g. `bitrate=2097.2kbits/s`) in kbit/s.
pub fn parse_bitrate_kbps(line: &str) -> Option<f64> {
    let value = field(line, "bitrate=")?;
    value.strip_suffix("kbits/s")?.trim().parse().ok()
}

/// Parse the `speed=` multiplier (e.g. `speed=1.00x`).
pub fn parse_speed(line: &str) -> Option<f64> {
    let value = field(line, "speed=")?;
    value.strip_suffix('x')?.trim().parse().ok()
}

/// Parse a status line into progress.
///
/// Requires a valid `time=` plus at least one other status marker, so
/// unrelated lines that mention a time are not mistaken for progress.
pub fn parse_progress(line: &str) -> Option<EngineProgress> {
    if !(line.contains("frame=") || line.contains("size=")) {
        return None;
    }

    Some(EngineProgress {
        elapsed_secs: parse_time_field(line)?,
        bitrate_kbps: parse_bitrate_kbps(line),
        speed: parse_speed(line),
    })
}

/// Whether a stderr record reports an error.
pub fn is_error_line(line: &str) -> bool {
    line.contains("Error") || line.contains("error") || line.contains("Invalid")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_time_valid() {
        assert_eq!(parse_time("00:00:10.50"), Some(10.5));
        assert_eq!(parse_time("01:30:00.00"), Some(5400.0));
        assert_eq!(parse_time("00:01:30.50"), Some(90.5));
    }

    #[test]
    fn test_parse_time_invalid() {
        assert_eq!(parse_time("N/A"), None);
        assert_eq!(parse_time("00:00"), None);
        assert_eq!(parse_time(""), None);
        assert_eq!(parse_time("00:00:00:00"), None);
        assert_eq!(parse_time("-00:00:00.05"), None);
    }

    #[test]
    fn test_parse_bitrate_and_speed() {
        let line = "size=1024kB time=00:00:04.00 bitrate=2097.2kbits/s speed=1.00x";
        assert_eq!(parse_bitrate_kbps(line), Some(2097.2));
        assert_eq!(parse_speed(line), Some(1.0));

        let padded = "bitrate= 128.0kbits/s speed=0.998x";
        assert_eq!(parse_bitrate_kbps(padded), Some(128.0));
        assert_eq!(parse_speed(padded), Some(0.998));

        assert_eq!(parse_bitrate_kbps("bitrate=N/A speed=N/A"), None);
        assert_eq!(parse_speed("bitrate=N/A speed=N/A"), None);
    }

    #[test]
    fn test_parse_progress_complete() {
        let line = "frame=  100 fps=25 q=-1.0 size=    1024kB time=00:00:04.00 bitrate=2097.2kbits/s speed=1.00x";
        let progress = parse_progress(line).unwrap();
        assert_eq!(progress.elapsed_secs, 4.0);
        assert_eq!(progress.bitrate_kbps, Some(2097.2));
        assert_eq!(progress.speed, Some(1.0));
    }

    #[test]
    fn test_parse_progress_without_bitrate() {
        let line = "frame=    0 fps=0.0 q=0.0 size=       0kB time=00:00:00.00 bitrate=N/A speed=N/A";
        let progress = parse_progress(line).unwrap();
        assert_eq!(progress.elapsed_secs, 0.0);
        assert_eq!(progress.bitrate_kbps, None);
        assert_eq!(progress.speed, None);
    }

    #[test]
    fn test_non_progress_lines() {
        assert!(parse_progress("time=00:00:10.00").is_none());
        assert!(parse_progress("frame=100 fps=25 q=-1.0").is_none());
        assert!(parse_progress("frame=1 size=0kB time=N/A bitrate=N/A").is_none());
        assert!(parse_progress("Input #0, mp3, from 'pipe:0':").is_none());
    }

    #[test]
    fn test_is_error_line() {
        assert!(is_error_line("rtmp://x: Error opening output"));
        assert!(is_error_line("pipe:0: Invalid data found when processing input"));
        assert!(!is_error_line("frame=1 fps=0.0"));
    }
}
