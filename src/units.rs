//! Size conversion helpers
//!
//! `human` renders a byte count the way the report expects it: one
//! decimal place and a single-letter binary unit. `parse_size` is the
//! inverse direction for the `--size-limit` flag.

/// Binary unit suffixes, one per power of 1024.
const UNITS: [&str; 9] = ["B", "K", "M", "G", "T", "P", "E", "Z", "Y"];

/// Render a byte count as `%.1f` plus a binary unit suffix.
///
/// Picks the largest unit whose multiplier is strictly below the value
/// while the value stays below the next multiplier; anything that fits
/// no bracket (0, 1, exact powers of 1024) falls back to bytes.
pub fn human(value: u64) -> String {
    let v = value as u128;
    for exp in (0..UNITS.len()).rev() {
        let mult = 1024u128.pow(exp as u32);
        if mult < v && v < mult * 1024 {
            return format!("{:.1}{}", value as f64 / mult as f64, UNITS[exp]);
        }
    }
    format!("{:.1}B", value as f64)
}

/// Parse a size argument with an optional binary unit suffix.
///
/// Accepts a plain integer (`1048576`), or a number with a suffix from
/// `B K M G T P E` (`512K`, `1.5G`). Suffixes are case-insensitive.
pub fn parse_size(input: &str) -> Result<u64, String> {
    let s = input.trim();
    if s.is_empty() {
        return Err("empty size".to_string());
    }

    let last = s.chars().last().unwrap_or('0');
    if !last.is_ascii_alphabetic() {
        return s
            .parse::<u64>()
            .map_err(|e| format!("invalid size '{s}': {e}"));
    }

    let exp = UNITS
        .iter()
        .take(7)
        .position(|u| u.eq_ignore_ascii_case(&last.to_string()))
        .ok_or_else(|| format!("invalid size unit '{last}' in '{s}'"))?;

    let number = &s[..s.len() - 1];
    let value: f64 = number
        .parse()
        .map_err(|e| format!("invalid size '{s}': {e}"))?;
    if value < 0.0 {
        return Err(format!("negative size '{s}'"));
    }

    Ok((value * 1024f64.powi(exp as i32)) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn human_plain_bytes() {
        assert_eq!(human(0), "0.0B");
        assert_eq!(human(1), "1.0B");
        assert_eq!(human(500), "500.0B");
        assert_eq!(human(1023), "1023.0B");
    }

    #[test]
    fn human_binary_units() {
        assert_eq!(human(1536), "1.5K");
        assert_eq!(human(10 * 1024 * 1024), "10.0M");
        assert_eq!(human(3 * 1024 * 1024 * 1024 / 2), "1.5G");
    }

    #[test]
    fn human_exact_powers_fall_back_to_bytes() {
        // 1024 sits on the bracket boundary: no unit strictly contains it.
        assert_eq!(human(1024), "1024.0B");
    }

    #[test]
    fn parse_plain() {
        assert_eq!(parse_size("0").unwrap(), 0);
        assert_eq!(parse_size("1048576").unwrap(), 1 << 20);
    }

    #[test]
    fn parse_suffixed() {
        assert_eq!(parse_size("2K").unwrap(), 2048);
        assert_eq!(parse_size("2k").unwrap(), 2048);
        assert_eq!(parse_size("1.5G").unwrap(), 3 * (1 << 30) / 2);
        assert_eq!(parse_size("10B").unwrap(), 10);
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(parse_size("").is_err());
        assert!(parse_size("12Q").is_err());
        assert!(parse_size("abcK").is_err());
        assert!(parse_size("-1K").is_err());
    }
}
