// src/duration.rs

//! Duration strings as stored in schedules and config files.

use std::time::Duration;

/// Parse a Go-style duration string like `"1h"`, `"1h30m"`, `"1.5h"`,
/// `"250ms"` or `"90s"`.
///
/// Units: `ns`, `us`/`µs`, `ms`, `s`, `m`, `h`. A bare `"0"` is accepted.
/// Negative durations are rejected since nothing here can use them.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }
    if s.starts_with('-') {
        return Err(format!("negative duration '{s}'"));
    }
    let body = s.strip_prefix('+').unwrap_or(s);
    if body == "0" {
        return Ok(Duration::ZERO);
    }

    let mut total_nanos: f64 = 0.0;
    let mut rest = body;

    while !rest.is_empty() {
        let num_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .ok_or_else(|| format!("missing unit in duration '{s}'"))?;
        if num_len == 0 {
            return Err(format!("expected number in duration '{s}'"));
        }
        let (num_part, after) = rest.split_at(num_len);
        let value: f64 = num_part
            .parse()
            .map_err(|e| format!("invalid duration number '{num_part}': {e}"))?;

        let unit_len = after
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(after.len());
        let (unit, tail) = after.split_at(unit_len);

        let scale = match unit {
            "ns" => 1.0,
            "us" | "µs" | "μs" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60.0 * 1e9,
            "h" => 3600.0 * 1e9,
            other => {
                return Err(format!(
                    "unsupported duration unit '{other}'; expected ns, us, ms, s, m, or h"
                ));
            }
        };

        total_nanos += value * scale;
        rest = tail;
    }

    if !total_nanos.is_finite() || total_nanos > u64::MAX as f64 {
        return Err(format!("duration '{s}' out of range"));
    }

    Ok(Duration::from_nanos(total_nanos.round() as u64))
}

/// Like [`parse_duration`] but also rejects zero, for intervals that drive
/// timers.
pub fn parse_positive_duration(s: &str) -> Result<Duration, String> {
    let d = parse_duration(s)?;
    if d.is_zero() {
        return Err(format!("duration '{}' must be greater than zero", s.trim()));
    }
    Ok(d)
}
