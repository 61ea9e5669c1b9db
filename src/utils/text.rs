pub fn truncate_utf8_prefix(value: &str, max_bytes: usize) -> String {
    if value.len() <= max_bytes {
        return value.to_string();
    }
    let mut end = max_bytes;
    while end > 0 && !value.is_char_boundary(end) {
        end -= 1;
    }
    value[..end].to_string()
}

/// Truncates to `max_bytes` and appends a marker with the number of bytes dropped.
pub fn preview(value: &str, max_bytes: usize) -> String {
    let trimmed = value.trim();
    if trimmed.len() <= max_bytes {
        return trimmed.to_string();
    }
    let head = truncate_utf8_prefix(trimmed, max_bytes);
    format!("{}... [+{} bytes]", head, trimmed.len() - head.len())
}
