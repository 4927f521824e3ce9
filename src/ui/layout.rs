use ratatui::layout::{Constraint, Direction, Layout, Rect};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ThreePaneLayout {
    pub status: Rect,
    pub history: Rect,
    pub input: Rect,
}

/// Status bar on top, scrollable history in the middle, input anchored at
/// the bottom with a height that follows the wrapped input.
pub fn split_three_pane_layout(area: Rect, input_rows: u16) -> ThreePaneLayout {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(1),
            Constraint::Length(input_rows.max(1)),
        ])
        .split(area);

    ThreePaneLayout {
        status: chunks[0],
        history: chunks[1],
        input: chunks[2],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_splits_into_three_panes() {
        let panes = split_three_pane_layout(Rect::new(0, 0, 80, 24), 2);
        assert_eq!(panes.status.height, 1);
        assert_eq!(panes.history.height, 21);
        assert_eq!(panes.input.height, 2);
        assert_eq!(panes.input.y, 22);
    }

    #[test]
    fn test_input_height_never_collapses() {
        let panes = split_three_pane_layout(Rect::new(0, 0, 80, 10), 0);
        assert_eq!(panes.input.height, 1);
    }
}
