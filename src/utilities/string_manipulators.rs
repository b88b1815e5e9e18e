use chrono::{Local, LocalResult, TimeZone};

/// Name of the front face, for double-faced card names like "Fire // Ice".
pub fn front_face_name(name: &str) -> &str {
    name.split("//").next().unwrap_or(name).trim()
}

/// Parses user-entered prices, accepting both "1.50" and "1,50".
pub fn parse_decimal(input: &str) -> Option<f64> {
    let cleaned = input.trim().replace(',', ".");
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse().ok()
}

pub fn timestamp_as_string(secs: i64) -> String {
    if secs <= 0 {
        return "never".to_string();
    }
    match Local.timestamp_opt(secs, 0) {
        LocalResult::Single(dt) => dt.format("%Y-%m-%d %H:%M").to_string(),
        _ => "never".to_string(),
    }
}
