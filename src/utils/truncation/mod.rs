/// Truncate tool output to at most `max_chars` bytes (on a char boundary),
/// appending a marker that tells the caller how much was dropped.
pub fn truncate_text(text: &str, max_chars: usize) -> String {
    if text.len() <= max_chars {
        return text.to_string();
    }

    // For very small limits, just return a short prefix rather than
    // a truncation message that would exceed max_chars itself
    if max_chars < 120 {
        let safe = floor_char_boundary(text, max_chars);
        return text[..safe].to_string();
    }

    let budget = max_chars - 100;
    let safe_budget = floor_char_boundary(text, budget);
    format!(
        "{}\n\n... [truncated - showed {} of {} chars]",
        &text[..safe_budget],
        safe_budget,
        text.len()
    )
}

/// Find the largest byte index <= `index` that is a valid char boundary.
pub fn floor_char_boundary(s: &str, index: usize) -> usize {
    let mut i = index.min(s.len());
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}
