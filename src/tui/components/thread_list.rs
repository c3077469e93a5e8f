//! # Thread List Component
//!
//! The "Recent Chats" sidebar. Threads are grouped under Today, Yesterday
//! and Older by their last update (local date), newest first.
//!
//! Follows the persistent state + transient wrapper pattern:
//! - `ThreadListState` lives in `TuiState`
//! - `ThreadList` is created each frame with borrowed state and threads
//!
//! Keys while focused: Up/Down move, Enter opens, `n` starts a new thread,
//! `r` reloads the list, `d` twice deletes.

use chrono::{DateTime, Local, NaiveDate, Utc};
use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Padding, Paragraph};

use crate::cortex::Thread;
use crate::tui::component::{Component, EventHandler};
use crate::tui::event::TuiEvent;

/// Longest thread name shown before it is shortened.
pub const NAME_WIDTH: usize = 25;
const PLACEHOLDER: &str = "...";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayGroup {
    Today,
    Yesterday,
    Older,
}

impl DayGroup {
    pub fn of(updated_at: DateTime<Utc>, today: NaiveDate) -> Self {
        let day = updated_at.with_timezone(&Local).date_naive();
        if day == today {
            DayGroup::Today
        } else if today.pred_opt() == Some(day) {
            DayGroup::Yesterday
        } else {
            DayGroup::Older
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            DayGroup::Today => "Today",
            DayGroup::Yesterday => "Yesterday",
            DayGroup::Older => "Older",
        }
    }
}

/// Shortens `name` to at most `width` characters at a word boundary,
/// ending with "...". Whitespace runs collapse to single spaces.
pub fn shorten(name: &str, width: usize) -> String {
    let words: Vec<&str> = name.split_whitespace().collect();
    let collapsed = words.join(" ");
    if collapsed.chars().count() <= width {
        return collapsed;
    }

    let budget = width.saturating_sub(PLACEHOLDER.len());
    let mut out = String::new();
    for word in words {
        let needed = if out.is_empty() {
            word.chars().count()
        } else {
            out.chars().count() + 1 + word.chars().count()
        };
        if needed > budget {
            break;
        }
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(word);
    }
    out.push_str(PLACEHOLDER);
    out
}

/// Events emitted by the sidebar.
#[derive(Debug, Clone, PartialEq)]
pub enum ThreadEvent {
    Open(String),
    Delete(String),
    CreateNew,
    Refresh,
}

/// Persistent sidebar state.
#[derive(Default)]
pub struct ThreadListState {
    /// Ids in display order, refreshed by `sync`.
    ids: Vec<String>,
    pub selected: usize,
    pub confirm_delete: bool,
    list_state: ListState,
}

impl ThreadListState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keeps the selection on the same thread id across list refreshes.
    pub fn sync(&mut self, threads: &[Thread]) {
        let selected_id = self.ids.get(self.selected).cloned();
        self.ids = threads.iter().map(|t| t.id.clone()).collect();
        self.selected = selected_id
            .and_then(|id| self.ids.iter().position(|i| *i == id))
            .unwrap_or(0)
            .min(self.ids.len().saturating_sub(1));
    }

    pub fn selected_id(&self) -> Option<&str> {
        self.ids.get(self.selected).map(String::as_str)
    }
}

impl EventHandler for ThreadListState {
    type Event = ThreadEvent;

    fn handle_event(&mut self, event: &TuiEvent) -> Option<ThreadEvent> {
        // Any key other than `d` cancels a pending delete
        if !matches!(event, TuiEvent::InputChar('d')) {
            self.confirm_delete = false;
        }

        match event {
            TuiEvent::CursorUp => {
                self.selected = self.selected.saturating_sub(1);
                None
            }
            TuiEvent::CursorDown => {
                if !self.ids.is_empty() {
                    self.selected = (self.selected + 1).min(self.ids.len() - 1);
                }
                None
            }
            TuiEvent::Submit => self.selected_id().map(|id| ThreadEvent::Open(id.to_string())),
            TuiEvent::InputChar('n') => Some(ThreadEvent::CreateNew),
            TuiEvent::InputChar('r') => Some(ThreadEvent::Refresh),
            TuiEvent::InputChar('d') => {
                let id = self.selected_id()?.to_string();
                if self.confirm_delete {
                    self.confirm_delete = false;
                    Some(ThreadEvent::Delete(id))
                } else {
                    self.confirm_delete = true;
                    None
                }
            }
            _ => None,
        }
    }
}

/// Transient render wrapper for the sidebar.
pub struct ThreadList<'a> {
    pub state: &'a mut ThreadListState,
    pub threads: &'a [Thread],
    pub current_thread_id: Option<&'a str>,
    pub focused: bool,
    pub today: NaiveDate,
}

impl<'a> ThreadList<'a> {
    pub fn new(
        state: &'a mut ThreadListState,
        threads: &'a [Thread],
        current_thread_id: Option<&'a str>,
        focused: bool,
    ) -> Self {
        Self {
            state,
            threads,
            current_thread_id,
            focused,
            today: Local::now().date_naive(),
        }
    }

    fn block(&self) -> Block<'static> {
        let help = if self.state.confirm_delete {
            " d again to delete "
        } else if self.focused {
            " n new  r reload  d delete "
        } else {
            " Tab to browse "
        };
        let border = if self.focused { Color::Cyan } else { Color::DarkGray };
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(border))
            .title(" Recent Chats ")
            .title_bottom(Line::from(help).centered())
            .padding(Padding::horizontal(1))
    }
}

impl<'a> Component for ThreadList<'a> {
    fn render(&mut self, frame: &mut Frame, area: Rect) {
        let block = self.block();
        if self.threads.is_empty() {
            let empty = Paragraph::new("No threads yet.")
                .style(Style::default().fg(Color::DarkGray))
                .block(block);
            frame.render_widget(empty, area);
            return;
        }

        let header = Style::default().fg(Color::DarkGray).add_modifier(Modifier::BOLD);
        let mut items = Vec::with_capacity(self.threads.len() + 3);
        let mut selected_row = None;
        let mut last_group = None;

        for (i, thread) in self.threads.iter().enumerate() {
            let group = DayGroup::of(thread.updated_at, self.today);
            if last_group != Some(group) {
                items.push(ListItem::new(Line::from(Span::styled(group.label(), header))));
                last_group = Some(group);
            }

            let is_selected = self.focused && i == self.state.selected;
            let is_current = self.current_thread_id == Some(thread.id.as_str());
            let style = match (is_selected, self.state.confirm_delete) {
                (true, true) => Style::default()
                    .fg(Color::Red)
                    .add_modifier(Modifier::BOLD | Modifier::REVERSED),
                (true, false) => Style::default().add_modifier(Modifier::BOLD | Modifier::REVERSED),
                _ if is_current => Style::default().fg(Color::Cyan),
                _ => Style::default().fg(Color::Gray),
            };
            let name = if thread.name.trim().is_empty() {
                "(untitled)".to_string()
            } else {
                shorten(&thread.name, NAME_WIDTH)
            };

            if i == self.state.selected {
                selected_row = Some(items.len());
            }
            items.push(ListItem::new(Line::from(Span::styled(name, style))));
        }

        self.state.list_state.select(selected_row);
        frame.render_stateful_widget(List::new(items).block(block), area, &mut self.state.list_state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::thread;
    use chrono::{Duration, TimeZone};
    use ratatui::Terminal;
    use ratatui::backend::TestBackend;

    #[test]
    fn test_shorten_keeps_short_names() {
        assert_eq!(shorten("Sales by region", 25), "Sales by region");
        assert_eq!(shorten("  spaced   out  ", 25), "spaced out");
    }

    #[test]
    fn test_shorten_cuts_at_word_boundary() {
        let name = "What were the top five products by revenue last quarter";
        let short = shorten(name, 25);
        assert_eq!(short, "What were the top five...");
        assert!(short.chars().count() <= 25);
    }

    #[test]
    fn test_shorten_single_long_word() {
        assert_eq!(shorten(&"x".repeat(40), 25), "...");
    }

    #[test]
    fn test_day_groups() {
        let now = Local.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap();
        let today = now.date_naive();
        let at = |dt: DateTime<Local>| dt.with_timezone(&Utc);

        assert_eq!(DayGroup::of(at(now), today), DayGroup::Today);
        assert_eq!(DayGroup::of(at(now - Duration::days(1)), today), DayGroup::Yesterday);
        assert_eq!(DayGroup::of(at(now - Duration::days(3)), today), DayGroup::Older);
    }

    #[test]
    fn test_double_d_deletes_selected() {
        let mut state = ThreadListState::new();
        state.sync(&[thread("t-1", 2_000), thread("t-2", 1_000)]);
        state.handle_event(&TuiEvent::CursorDown);

        assert_eq!(state.handle_event(&TuiEvent::InputChar('d')), None);
        assert!(state.confirm_delete);
        assert_eq!(
            state.handle_event(&TuiEvent::InputChar('d')),
            Some(ThreadEvent::Delete("t-2".to_string()))
        );
    }

    #[test]
    fn test_other_key_cancels_delete() {
        let mut state = ThreadListState::new();
        state.sync(&[thread("t-1", 1_000)]);
        state.handle_event(&TuiEvent::InputChar('d'));
        state.handle_event(&TuiEvent::CursorUp);
        assert!(!state.confirm_delete);
        assert_eq!(state.handle_event(&TuiEvent::InputChar('d')), None);
    }

    #[test]
    fn test_enter_opens_and_n_creates() {
        let mut state = ThreadListState::new();
        assert_eq!(state.handle_event(&TuiEvent::Submit), None);
        state.sync(&[thread("t-1", 1_000)]);
        assert_eq!(
            state.handle_event(&TuiEvent::Submit),
            Some(ThreadEvent::Open("t-1".to_string()))
        );
        assert_eq!(state.handle_event(&TuiEvent::InputChar('n')), Some(ThreadEvent::CreateNew));
        assert_eq!(state.handle_event(&TuiEvent::InputChar('r')), Some(ThreadEvent::Refresh));
    }

    #[test]
    fn test_sync_follows_selected_thread() {
        let mut state = ThreadListState::new();
        state.sync(&[thread("a", 3_000), thread("b", 2_000)]);
        state.handle_event(&TuiEvent::CursorDown);
        assert_eq!(state.selected_id(), Some("b"));

        // A new thread lands on top; selection stays on "b"
        state.sync(&[thread("c", 4_000), thread("a", 3_000), thread("b", 2_000)]);
        assert_eq!(state.selected_id(), Some("b"));

        state.sync(&[thread("c", 4_000)]);
        assert_eq!(state.selected_id(), Some("c"));
    }

    #[test]
    fn test_render_groups_threads() {
        let backend = TestBackend::new(32, 10);
        let mut terminal = Terminal::new(backend).unwrap();
        let mut state = ThreadListState::new();
        let threads = vec![thread("t-1", 1_000)];
        state.sync(&threads);

        terminal
            .draw(|f| {
                ThreadList::new(&mut state, &threads, Some("t-1"), true).render(f, f.area());
            })
            .unwrap();

        let text: String = terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|c| c.symbol())
            .collect();
        assert!(text.contains("Recent Chats"));
        // 1970 is never today
        assert!(text.contains("Older"));
        assert!(text.contains("thread t-1"));
    }
}
