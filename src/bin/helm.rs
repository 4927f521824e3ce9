use std::time::Duration;

use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use helmcoder::app::{App, Frontend, UserInput};
use helmcoder::config::Config;
use helmcoder::logging;
use helmcoder::render::{BlockProjection, RenderOp, Renderer};
use helmcoder::terminal::TerminalSession;
use helmcoder::ui::layout::split_three_pane_layout;
use helmcoder::ui::render::{
    block_lines, input_visual_rows, render_history, render_input, render_status_line,
};

const INPUT_POLL_INTERVAL: Duration = Duration::from_millis(16);
const SCROLL_PAGE_LINES: usize = 10;

struct TuiFrontend {
    session: TerminalSession,
    projection: BlockProjection,
    input: String,
    cursor: usize,
    scroll: usize,
    follow: bool,
    quit: bool,
}

impl TuiFrontend {
    fn new() -> Result<Self> {
        Ok(Self {
            session: TerminalSession::enter()?,
            projection: BlockProjection::new(),
            input: String::new(),
            cursor: 0,
            scroll: 0,
            follow: true,
            quit: false,
        })
    }

    fn clamp_cursor_left(&self, mut index: usize) -> usize {
        index = index.min(self.input.len());
        while index > 0 && !self.input.is_char_boundary(index) {
            index -= 1;
        }
        index
    }

    fn prev_char_boundary(&self, index: usize) -> usize {
        let clamped = self.clamp_cursor_left(index);
        if clamped == 0 {
            return 0;
        }
        let mut prev = clamped - 1;
        while prev > 0 && !self.input.is_char_boundary(prev) {
            prev -= 1;
        }
        prev
    }

    fn next_char_boundary(&self, index: usize) -> usize {
        let clamped = self.clamp_cursor_left(index);
        match self.input[clamped..].chars().next() {
            Some(ch) => clamped + ch.len_utf8(),
            None => self.input.len(),
        }
    }

    fn insert_str(&mut self, value: &str) {
        let cursor = self.clamp_cursor_left(self.cursor);
        self.input.insert_str(cursor, value);
        self.cursor = cursor + value.len();
    }

    fn backspace(&mut self) {
        let end = self.clamp_cursor_left(self.cursor);
        if end == 0 {
            return;
        }
        let start = self.prev_char_boundary(end);
        self.input.replace_range(start..end, "");
        self.cursor = start;
    }

    fn delete(&mut self) {
        let start = self.clamp_cursor_left(self.cursor);
        if start >= self.input.len() {
            return;
        }
        let end = self.next_char_boundary(start);
        self.input.replace_range(start..end, "");
        self.cursor = start;
    }

    fn submit(&mut self) -> Option<String> {
        let value = self.input.trim().to_string();
        self.input.clear();
        self.cursor = 0;
        if value.is_empty() {
            None
        } else {
            Some(value)
        }
    }

    fn scroll_by(&mut self, delta: isize) {
        if delta < 0 {
            self.scroll = self.scroll.saturating_sub(delta.unsigned_abs());
            self.follow = false;
        } else {
            self.scroll = self.scroll.saturating_add(delta as usize);
        }
    }

    fn map_key(&mut self, key: KeyEvent) -> Option<UserInput> {
        match key.code {
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                Some(UserInput::Interrupt)
            }
            KeyCode::Char('d') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                if self.input.is_empty() {
                    Some(UserInput::Quit)
                } else {
                    None
                }
            }
            KeyCode::Char('j') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.insert_str("\n");
                None
            }
            KeyCode::Enter if key.modifiers.contains(KeyModifiers::SHIFT) => {
                self.insert_str("\n");
                None
            }
            KeyCode::Enter => self.submit().map(UserInput::Line),
            KeyCode::Up => {
                self.scroll_by(-1);
                None
            }
            KeyCode::Down => {
                self.scroll_by(1);
                None
            }
            KeyCode::PageUp => {
                self.scroll_by(-(SCROLL_PAGE_LINES as isize));
                None
            }
            KeyCode::PageDown => {
                self.scroll_by(SCROLL_PAGE_LINES as isize);
                None
            }
            KeyCode::End if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.follow = true;
                None
            }
            KeyCode::Home => {
                self.cursor = 0;
                None
            }
            KeyCode::End => {
                self.cursor = self.input.len();
                None
            }
            KeyCode::Left => {
                self.cursor = self.prev_char_boundary(self.cursor);
                None
            }
            KeyCode::Right => {
                self.cursor = self.next_char_boundary(self.cursor);
                None
            }
            KeyCode::Backspace => {
                self.backspace();
                None
            }
            KeyCode::Delete => {
                self.delete();
                None
            }
            KeyCode::Char(ch)
                if !key.modifiers.contains(KeyModifiers::CONTROL)
                    && !key.modifiers.contains(KeyModifiers::ALT) =>
            {
                self.insert_str(&ch.to_string());
                None
            }
            _ => None,
        }
    }
}

impl Renderer for TuiFrontend {
    fn apply(&mut self, op: RenderOp) {
        self.projection.apply(op);
    }
}

impl Frontend for TuiFrontend {
    fn poll_input(&mut self) -> Option<UserInput> {
        let Ok(has_event) = event::poll(INPUT_POLL_INTERVAL) else {
            self.quit = true;
            return None;
        };
        if !has_event {
            return None;
        }
        let Ok(ev) = event::read() else {
            self.quit = true;
            return None;
        };

        match ev {
            Event::Key(key) => {
                if key.kind == KeyEventKind::Release {
                    return None;
                }
                self.map_key(key)
            }
            Event::Paste(text) => {
                self.insert_str(&text);
                None
            }
            _ => None,
        }
    }

    fn render_frame(&mut self, status: &str) {
        let blocks = self.projection.blocks().to_vec();
        let input = self.input.clone();
        let cursor = self.cursor;
        let follow = self.follow;
        let mut scroll = self.scroll;
        let mut follow_next = false;

        let _ = self.session.terminal().draw(|frame| {
            let area = frame.area();
            let input_width = area.width.saturating_sub(2).max(1) as usize;
            let input_rows = input_visual_rows(&input, input_width) as u16;
            let panes = split_three_pane_layout(area, input_rows);

            let total_lines = block_lines(&blocks).len();
            let bottom = total_lines.saturating_sub(panes.history.height as usize);
            if follow || scroll >= bottom {
                scroll = bottom;
                follow_next = true;
            }

            render_status_line(frame, panes.status, status);
            render_history(frame, panes.history, &blocks, scroll);
            render_input(frame, panes.input, &input, cursor);
        });

        self.scroll = scroll;
        if follow_next {
            self.follow = true;
        }
    }

    fn should_quit(&self) -> bool {
        self.quit
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load()?;
    config.validate()?;
    logging::init(&config)?;

    let mut frontend = TuiFrontend::new()?;
    let app = App::new(&config);
    app.run(&mut frontend).await?;
    Ok(())
}
