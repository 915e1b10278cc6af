/// Returns "$1.23" for amounts of a cent or more, otherwise enough significant
/// digits to tell small quotes apart ("$0.000128").
pub fn format_usd(amount: f64) -> String {
    if amount == 0.0 {
        return "$0.00".to_string();
    }
    if amount.abs() >= 0.01 {
        return format!("${:.2}", amount);
    }
    // Four significant digits below one cent.
    let magnitude = amount.abs().log10().floor() as i32;
    let decimals = (3 - magnitude).clamp(2, 12) as usize;
    let text = format!("{:.*}", decimals, amount);
    let text = text.trim_end_matches('0').trim_end_matches('.');
    if text == "0" || text == "-0" {
        return "$0.00".to_string();
    }
    format!("${}", text)
}

/// Returns "950", "1.5K", or "2.3M".
pub fn format_tokens(count: u64) -> String {
    if count >= 1_000_000 {
        format!("{:.1}M", count as f64 / 1_000_000.0)
    } else if count >= 1_000 {
        format!("{:.1}K", count as f64 / 1_000.0)
    } else {
        format!("{}", count)
    }
}

/// Returns "7.5s", "2m 05s", or "1h 02m".
pub fn format_duration(seconds: f64) -> String {
    let seconds = seconds.max(0.0);
    if seconds < 60.0 {
        return format!("{:.1}s", seconds);
    }
    let total = seconds.round() as u64;
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    if hours > 0 {
        format!("{}h {:02}m", hours, minutes)
    } else {
        format!("{}m {:02}s", minutes, total % 60)
    }
}

/// Returns "$0.0002 / 1K tokens".
pub fn format_rate_per_1k(price: f64) -> String {
    format!("{} / 1K tokens", format_usd(price))
}

/// Returns the container price scaled to an hour, e.g. "$0.80/h".
pub fn format_hourly(price_per_second: f64) -> String {
    format!("{}/h", format_usd(price_per_second * 3600.0))
}
