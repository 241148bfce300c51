/// Number of focus tasks a single calendar day may hold.
pub const DAILY_LIMIT: usize = 3;

/// Maximum task content length, in characters.
pub const MAX_CONTENT_CHARS: usize = 20;

pub fn can_add(count_today: usize) -> bool {
    count_today < DAILY_LIMIT
}

/// Trims `raw` and caps it at [`MAX_CONTENT_CHARS`]; `None` when nothing is left.
pub fn normalize_content(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let capped: String = trimmed.chars().take(MAX_CONTENT_CHARS).collect();
    Some(capped.trim_end().to_string())
}
