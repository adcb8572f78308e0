// src/config/duration.rs

use std::time::Duration;

/// Parse a duration string such as `"500ms"`, `"3s"`, `"20m"` or `"1h"`.
///
/// Whitespace between the number and the unit is accepted; the unit is
/// case-insensitive.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    // Find the boundary between digits and suffix.
    let idx = s
        .chars()
        .position(|c| !c.is_ascii_digit())
        .ok_or_else(|| format!("duration '{}' is missing a unit suffix", s))?;

    let (num_part, unit_part) = s.split_at(idx);
    let value: u64 = num_part
        .parse()
        .map_err(|e| format!("invalid duration number '{}': {}", num_part, e))?;
    let unit = unit_part.trim().to_lowercase();

    let secs = |mult: u64| {
        value
            .checked_mul(mult)
            .map(Duration::from_secs)
            .ok_or_else(|| format!("duration '{}' is too large", s))
    };

    match unit.as_str() {
        "ms" => Ok(Duration::from_millis(value)),
        "s" => secs(1),
        "m" => secs(60),
        "h" => secs(60 * 60),
        _ => Err(format!(
            "unsupported duration unit '{}'; expected ms, s, m, or h",
            unit
        )),
    }
}
