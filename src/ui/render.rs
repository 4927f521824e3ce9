use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::Line;
use ratatui::widgets::{Paragraph, Wrap};
use ratatui::Frame;

use crate::state::block::{Block, BlockKind};
use crate::ui::input_metrics::{
    char_display_width, cursor_row_col, truncate_to_display_width, wrap_input_lines,
};

pub fn input_visual_rows(input: &str, width: usize) -> usize {
    wrap_input_lines(input, width).len().max(1)
}

pub fn render_status_line(frame: &mut Frame<'_>, area: Rect, status: &str) {
    if area.height == 0 || area.width == 0 {
        return;
    }
    let text = truncate_line(status, area.width as usize);
    frame.render_widget(
        Paragraph::new(text).style(Style::default().fg(Color::DarkGray)),
        area,
    );
}

/// Projects the block ledger into styled lines. One blank line between
/// blocks; empty text segments (turns that went straight to a tool) are
/// skipped.
pub fn block_lines(blocks: &[Block]) -> Vec<Line<'static>> {
    let mut lines: Vec<Line<'static>> = Vec::new();
    for block in blocks {
        if block.text.is_empty() && matches!(block.kind, BlockKind::Text) {
            continue;
        }
        if !lines.is_empty() {
            lines.push(Line::default());
        }
        let style = block_style(&block.kind);
        match block.kind {
            BlockKind::UserEcho => {
                for (index, text_line) in block.text.lines().enumerate() {
                    let prefix = if index == 0 { "> " } else { "  " };
                    lines.push(Line::styled(format!("{prefix}{text_line}"), style));
                }
            }
            _ => {
                for text_line in block.text.lines() {
                    lines.push(Line::styled(text_line.to_string(), style));
                }
            }
        }
    }
    lines
}

pub fn render_history(frame: &mut Frame<'_>, area: Rect, blocks: &[Block], scroll: usize) {
    if area.height == 0 || area.width == 0 {
        return;
    }
    let paragraph = Paragraph::new(block_lines(blocks))
        .wrap(Wrap { trim: false })
        .scroll((scroll as u16, 0));
    frame.render_widget(paragraph, area);
}

pub fn render_input(frame: &mut Frame<'_>, area: Rect, input: &str, cursor_byte: usize) {
    if area.height == 0 || area.width <= 2 {
        return;
    }
    let input_width = area.width.saturating_sub(2).max(1) as usize;
    let lines = wrap_input_lines(input, input_width);
    let (cursor_row, cursor_col) = cursor_row_col(input, cursor_byte, input_width);
    let visible_rows = area.height as usize;
    let window_start = cursor_row.saturating_add(1).saturating_sub(visible_rows);

    let mut rendered = Vec::with_capacity(visible_rows);
    for offset in 0..visible_rows {
        let row_index = window_start + offset;
        let prefix = if row_index == 0 { "> " } else { "  " };
        let line = lines.get(row_index).cloned().unwrap_or_default();
        rendered.push(Line::from(format!("{prefix}{line}")));
    }

    frame.render_widget(
        Paragraph::new(rendered)
            .style(Style::default().fg(Color::Gray))
            .wrap(Wrap { trim: false }),
        area,
    );

    let cursor_y = area
        .y
        .saturating_add(cursor_row.saturating_sub(window_start) as u16);
    let cursor_x = area
        .x
        .saturating_add(2 + cursor_col as u16)
        .min(area.x.saturating_add(area.width.saturating_sub(1)));
    frame.set_cursor_position((cursor_x, cursor_y));
}

fn block_style(kind: &BlockKind) -> Style {
    match kind {
        BlockKind::UserEcho => Style::default().fg(Color::Cyan),
        BlockKind::Text => Style::default().fg(Color::White),
        BlockKind::Tool { .. } => Style::default().fg(Color::Yellow),
        BlockKind::Error => Style::default().fg(Color::Red),
        BlockKind::Notice => Style::default().fg(Color::DarkGray),
        BlockKind::CompactionSummary => Style::default()
            .fg(Color::Magenta)
            .add_modifier(Modifier::BOLD),
    }
}

fn truncate_line(input: &str, width: usize) -> String {
    let width = width.max(1);
    let mut out = String::new();
    let mut used = 0usize;
    let mut truncated = false;

    for ch in input.chars() {
        let ch_width = char_display_width(ch);
        if used + ch_width > width {
            truncated = true;
            break;
        }
        out.push(ch);
        used += ch_width;
    }

    if truncated && width >= 4 {
        out = truncate_to_display_width(&out, width - 3);
        out.push_str("...");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(kind: BlockKind, text: &str) -> Block {
        Block {
            id: 0,
            kind,
            text: text.to_string(),
            finalized: true,
        }
    }

    #[test]
    fn test_block_lines_prefix_user_echo_and_skip_empty_text() {
        let blocks = vec![
            block(BlockKind::UserEcho, "run the tests"),
            block(BlockKind::Text, ""),
            block(BlockKind::Tool { tool_name: "bash".to_string(), tool_call_id: "t1".to_string() }, "[bash] $ ls\nok"),
        ];
        let lines = block_lines(&blocks);
        let rendered: Vec<String> = lines
            .iter()
            .map(|line| {
                line.spans
                    .iter()
                    .map(|span| span.content.as_ref())
                    .collect::<String>()
            })
            .collect();
        assert_eq!(rendered, vec!["> run the tests", "", "[bash] $ ls", "ok"]);
    }

    #[test]
    fn test_truncate_line_appends_ellipsis() {
        assert_eq!(truncate_line("short", 10), "short");
        assert_eq!(truncate_line("a longer status line", 10), "a longe...");
    }
}
