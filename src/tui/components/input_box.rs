//! # InputBox Component
//!
//! The prompt editor. Holds the text being typed and a byte-offset cursor;
//! emits `Submit` on Enter. While an answer streams the box is disabled and
//! Enter is swallowed so at most one turn is in flight.

use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Color, Style};
use ratatui::widgets::{Block, BorderType, Paragraph};
use unicode_width::UnicodeWidthStr;

use crate::tui::component::{Component, EventHandler};
use crate::tui::event::TuiEvent;

/// Border (2) + padding (2) consumed horizontally
const HORIZONTAL_OVERHEAD: u16 = 4;
/// Top + bottom borders
const VERTICAL_OVERHEAD: u16 = 2;
/// Content lines shown before older lines scroll out of view
const MAX_VISIBLE_LINES: u16 = 5;

/// High-level events emitted by the InputBox
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    Submit(String),
    ContentChanged,
}

pub struct InputBox {
    pub buffer: String,
    /// Byte offset into `buffer`, always on a char boundary.
    cursor: usize,
    /// Prop: an answer is streaming.
    pub disabled: bool,
    /// Prop: keyboard focus is here rather than on the sidebar.
    pub focused: bool,
}

impl Default for InputBox {
    fn default() -> Self {
        Self::new()
    }
}

fn wrap_options(width: u16) -> textwrap::Options<'static> {
    textwrap::Options::new(width.max(1) as usize)
        .break_words(true)
        .word_separator(textwrap::WordSeparator::AsciiSpace)
}

/// Wrapped lines of `text`, keeping a trailing empty line after a final newline.
fn wrapped_lines(text: &str, width: u16) -> Vec<String> {
    let mut lines: Vec<String> = textwrap::wrap(text, wrap_options(width))
        .into_iter()
        .map(|l| l.into_owned())
        .collect();
    // textwrap doesn't always emit the empty line after a trailing newline
    if lines.is_empty() || (text.ends_with('\n') && !lines.last().is_some_and(|l| l.is_empty())) {
        lines.push(String::new());
    }
    lines
}

impl InputBox {
    pub fn new() -> Self {
        Self {
            buffer: String::new(),
            cursor: 0,
            disabled: false,
            focused: true,
        }
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Box height for `width`, clamped to `MAX_VISIBLE_LINES` of content.
    pub fn calculate_height(&self, width: u16) -> u16 {
        let inner = width.saturating_sub(HORIZONTAL_OVERHEAD);
        let lines = wrapped_lines(&self.buffer, inner).len() as u16;
        lines.clamp(1, MAX_VISIBLE_LINES) + VERTICAL_OVERHEAD
    }

    fn prev_boundary(&self) -> usize {
        self.buffer[..self.cursor]
            .char_indices()
            .next_back()
            .map_or(0, |(i, _)| i)
    }

    fn next_boundary(&self) -> usize {
        self.buffer[self.cursor..]
            .chars()
            .next()
            .map_or(self.buffer.len(), |c| self.cursor + c.len_utf8())
    }

    fn title(&self) -> &'static str {
        if self.disabled {
            " Waiting for the answer (Esc to cancel) "
        } else {
            " Ask a question (Enter to send, Ctrl+J for newline) "
        }
    }
}

impl Component for InputBox {
    fn render(&mut self, frame: &mut Frame, area: Rect) {
        let inner = area.width.saturating_sub(HORIZONTAL_OVERHEAD);
        let lines = wrapped_lines(&self.buffer, inner);
        let skip = lines.len().saturating_sub(MAX_VISIBLE_LINES as usize);
        let visible = lines[skip..].join("\n");

        let border = match (self.disabled, self.focused) {
            (true, _) => Style::default().fg(Color::DarkGray),
            (false, true) => Style::default().fg(Color::Green),
            (false, false) => Style::default().fg(Color::Gray),
        };
        let block = Block::bordered()
            .border_type(BorderType::Rounded)
            .border_style(border)
            .title(self.title())
            .padding(ratatui::widgets::Padding::horizontal(1));

        frame.render_widget(Paragraph::new(visible).block(block).style(border), area);

        if self.focused && !self.disabled {
            // Cursor sits after the wrapped text preceding it
            let before = wrapped_lines(&self.buffer[..self.cursor], inner);
            let row = (before.len() - 1).saturating_sub(skip) as u16;
            let col = before.last().map_or(0, |l| l.width()) as u16;
            frame.set_cursor_position((
                area.x + 2 + col.min(inner.saturating_sub(1)),
                area.y + 1 + row.min(MAX_VISIBLE_LINES - 1),
            ));
        }
    }
}

impl EventHandler for InputBox {
    type Event = InputEvent;

    fn handle_event(&mut self, event: &TuiEvent) -> Option<InputEvent> {
        match event {
            TuiEvent::InputChar(c) => {
                self.buffer.insert(self.cursor, *c);
                self.cursor += c.len_utf8();
                Some(InputEvent::ContentChanged)
            }
            TuiEvent::Paste(text) => {
                let text = text.replace("\r\n", "\n");
                self.buffer.insert_str(self.cursor, &text);
                self.cursor += text.len();
                Some(InputEvent::ContentChanged)
            }
            TuiEvent::Backspace if self.cursor > 0 => {
                let prev = self.prev_boundary();
                self.buffer.drain(prev..self.cursor);
                self.cursor = prev;
                Some(InputEvent::ContentChanged)
            }
            TuiEvent::Delete if self.cursor < self.buffer.len() => {
                let next = self.next_boundary();
                self.buffer.drain(self.cursor..next);
                Some(InputEvent::ContentChanged)
            }
            TuiEvent::CursorLeft if self.cursor > 0 => {
                self.cursor = self.prev_boundary();
                None
            }
            TuiEvent::CursorRight if self.cursor < self.buffer.len() => {
                self.cursor = self.next_boundary();
                None
            }
            TuiEvent::CursorHome => {
                self.cursor = self.buffer[..self.cursor].rfind('\n').map_or(0, |i| i + 1);
                None
            }
            TuiEvent::CursorEnd => {
                self.cursor = self.buffer[self.cursor..]
                    .find('\n')
                    .map_or(self.buffer.len(), |i| self.cursor + i);
                None
            }
            TuiEvent::Submit => {
                if self.disabled || self.buffer.trim().is_empty() {
                    return None;
                }
                self.cursor = 0;
                Some(InputEvent::Submit(std::mem::take(&mut self.buffer)))
            }
            _ => None,
        }
    }
}
