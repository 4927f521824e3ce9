pub const MAX_DISPLAY_CHARS: usize = 4000;
pub const MAX_DISPLAY_LINES: usize = 20;

// Room reserved for the marker line so truncated output stays inside the
// char limit, which is what makes the policy idempotent.
const MARKER_CHAR_RESERVE: usize = 64;

/// Caps text at the display limits, appending a marker line when anything
/// was dropped. Output always satisfies both limits, so re-applying the
/// policy to already-truncated text is the identity.
pub fn truncate_display(text: &str) -> String {
    let total_chars = text.chars().count();
    let total_lines = text.lines().count();
    if total_chars <= MAX_DISPLAY_CHARS && total_lines <= MAX_DISPLAY_LINES {
        return text.to_string();
    }

    let kept_lines: Vec<&str> = text.lines().take(MAX_DISPLAY_LINES - 1).collect();
    let mut body: String = kept_lines.join("\n");

    let char_budget = MAX_DISPLAY_CHARS - MARKER_CHAR_RESERVE;
    if body.chars().count() > char_budget {
        body = body.chars().take(char_budget).collect();
    }

    let dropped_lines = total_lines.saturating_sub(body.lines().count());
    let marker = if dropped_lines > 0 {
        format!("... ({dropped_lines} more lines)")
    } else {
        "... (output truncated)".to_string()
    };

    format!("{body}\n{marker}")
}
