//! Frame layout.
//!
//! ```text
//! ┌ title ───────────────────────────────────────────┐
//! │ Recent Chats │ transcript                         │
//! │  Today       │                                    │
//! │   ...        │                                    │
//! ├ status / thinking / error ───────────────────────┤
//! └ input ───────────────────────────────────────────┘
//! ```

use ratatui::Frame;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};

use crate::core::state::App;
use crate::tui::component::Component;
use crate::tui::components::{MessageList, ThreadList, TitleBar};
use crate::tui::{Focus, TuiState};

const SIDEBAR_WIDTH: u16 = 32;
/// Below this width the sidebar is hidden.
const MIN_WIDTH_FOR_SIDEBAR: u16 = 72;
const SPINNER: [char; 4] = ['⠋', '⠙', '⠹', '⠸'];

pub fn draw_ui(frame: &mut Frame, app: &App, tui: &mut TuiState, spinner_frame: usize) {
    use Constraint::{Length, Min};

    let input_height = tui.input_box.calculate_height(frame.area().width);
    let [title_area, body_area, status_area, input_area] =
        Layout::vertical([Length(1), Min(0), Length(1), Length(input_height)]).areas(frame.area());

    let show_sidebar = body_area.width >= MIN_WIDTH_FOR_SIDEBAR;
    let (sidebar_area, transcript_area) = if show_sidebar {
        let [side, main] = Layout::horizontal([Length(SIDEBAR_WIDTH), Min(0)]).areas(body_area);
        (Some(side), main)
    } else {
        (None, body_area)
    };

    MessageList::new(
        &mut tui.message_list,
        &app.transcript,
        app.live.as_ref(),
        &app.agent_name,
    )
    .render(frame, transcript_area);

    if let Some(area) = sidebar_area {
        ThreadList::new(
            &mut tui.thread_list,
            &app.threads,
            app.session.current_thread_id.as_deref(),
            tui.focus == Focus::Sidebar,
        )
        .render(frame, area);
    }

    TitleBar::new(
        app.agent_name.clone(),
        app.current_thread_name().map(str::to_string),
        tui.message_list.has_unseen_content,
    )
    .render(frame, title_area);

    frame.render_widget(status_line(app, spinner_frame), status_area);

    tui.input_box.disabled = app.is_streaming;
    tui.input_box.focused = tui.focus == Focus::Input;
    tui.input_box.render(frame, input_area);
}

/// Error first, then streaming progress, then the plain status message.
pub fn status_line(app: &App, spinner_frame: usize) -> Line<'static> {
    if let Some(error) = &app.error {
        return Line::from(vec![
            Span::styled("✗ ", Style::default().fg(Color::Red).add_modifier(Modifier::BOLD)),
            Span::styled(error.clone(), Style::default().fg(Color::Red)),
        ]);
    }

    if app.is_streaming {
        let spinner = SPINNER[spinner_frame % SPINNER.len()];
        // Thinking is transient: only its latest line is shown
        let detail = app
            .live
            .as_ref()
            .filter(|live| live.text.is_empty())
            .and_then(|live| live.thinking.lines().rev().find(|l| !l.trim().is_empty()))
            .map(|l| l.trim().to_string())
            .unwrap_or_else(|| app.status_message.clone());
        return Line::from(vec![
            Span::styled(format!("{spinner} "), Style::default().fg(Color::Cyan)),
            Span::styled(
                detail,
                Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
            ),
        ]);
    }

    Line::from(Span::styled(
        app.status_message.clone(),
        Style::default().fg(Color::DarkGray),
    ))
}

/// Whether the sidebar is drawn at this terminal size.
pub fn sidebar_visible(area: Rect) -> bool {
    area.width >= MIN_WIDTH_FOR_SIDEBAR
}
