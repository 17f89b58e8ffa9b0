/// Parses a human size as printed by yt-dlp, e.g. `10.00MiB`, `512KiB`,
/// `1.5GB`.
pub fn parse_bytes(text: &str) -> Option<f64> {
    let text = text.trim();
    let split = text
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(text.len());
    let (number, unit) = text.split_at(split);
    let number: f64 = number.parse().ok()?;

    let multiplier = match unit.trim() {
        "" | "B" => 1.0,
        "KiB" => 1024.0,
        "MiB" => 1024.0 * 1024.0,
        "GiB" => 1024.0 * 1024.0 * 1024.0,
        "TiB" => 1024.0 * 1024.0 * 1024.0 * 1024.0,
        "KB" | "kB" => 1e3,
        "MB" => 1e6,
        "GB" => 1e9,
        "TB" => 1e12,
        _ => return None,
    };

    Some(number * multiplier)
}

/// Parses a transfer rate such as `1.20MiB/s`.
pub fn parse_rate(text: &str) -> Option<f64> {
    parse_bytes(text.trim().strip_suffix("/s")?)
}

/// Parses an ETA clock such as `05`, `01:05` or `1:02:03` into seconds.
pub fn parse_clock(text: &str) -> Option<f64> {
    text.trim()
        .split(':')
        .try_fold(0.0, |acc, part| Some(acc * 60.0 + part.parse::<u32>().ok()? as f64))
}
