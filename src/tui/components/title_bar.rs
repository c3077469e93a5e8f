//! # TitleBar Component
//!
//! One-line header: agent, active thread and the "↓ New" indicator when the
//! transcript has content below the viewport.
//!
//! Stateless: all data comes in as props, so it renders whatever it is
//! given and is trivial to test.

use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};

use crate::tui::component::Component;

pub struct TitleBar {
    pub agent_name: String,
    /// `None` until the first prompt creates a thread.
    pub thread_name: Option<String>,
    pub has_unseen_content: bool,
}

impl TitleBar {
    pub fn new(agent_name: String, thread_name: Option<String>, has_unseen_content: bool) -> Self {
        Self {
            agent_name,
            thread_name,
            has_unseen_content,
        }
    }

    fn line(&self) -> Line<'static> {
        let mut spans = vec![
            Span::styled("Cortex Chat", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(format!(" ({})", self.agent_name)),
            Span::raw(" | "),
        ];
        match &self.thread_name {
            Some(name) => spans.push(Span::styled(name.clone(), Style::default().fg(Color::Cyan))),
            None => spans.push(Span::styled("New thread", Style::default().fg(Color::DarkGray))),
        }
        if self.has_unseen_content {
            spans.push(Span::styled(" | ↓ New", Style::default().fg(Color::Yellow)));
        }
        Line::from(spans)
    }
}

impl Component for TitleBar {
    fn render(&mut self, frame: &mut Frame, area: Rect) {
        frame.render_widget(self.line(), area);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::Terminal;
    use ratatui::backend::TestBackend;

    fn rendered(title_bar: &mut TitleBar) -> String {
        let backend = TestBackend::new(80, 1);
        let mut terminal = Terminal::new(backend).unwrap();
        terminal.draw(|f| title_bar.render(f, f.area())).unwrap();
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|c| c.symbol())
            .collect()
    }

    #[test]
    fn test_title_bar_shows_agent_and_thread() {
        let mut title_bar = TitleBar::new(
            "DATA_FOR_GOOD".to_string(),
            Some("Sales by region".to_string()),
            false,
        );
        let text = rendered(&mut title_bar);
        assert!(text.contains("Cortex Chat"));
        assert!(text.contains("DATA_FOR_GOOD"));
        assert!(text.contains("Sales by region"));
        assert!(!text.contains("↓ New"));
    }

    #[test]
    fn test_title_bar_without_thread() {
        let mut title_bar = TitleBar::new("AGENT".to_string(), None, false);
        assert!(rendered(&mut title_bar).contains("New thread"));
    }

    #[test]
    fn test_title_bar_with_unseen_content() {
        let mut title_bar = TitleBar::new("AGENT".to_string(), None, true);
        assert!(rendered(&mut title_bar).contains("↓ New"));
    }
}
