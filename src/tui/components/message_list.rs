//! # MessageList Component
//!
//! Scrollable view of the conversation: stored transcript entries followed
//! by the answer currently streaming, if any.
//!
//! `MessageList` is a transient component (created each frame) that wraps
//! `&'a mut MessageListState` (persistent state) and the transcript (props).
//! Heights of stored entries are cached; only the live answer is measured
//! on every frame since it grows while streaming.

use ratatui::Frame;
use ratatui::layout::{Position, Rect, Size};
use ratatui::style::{Color, Style};
use ratatui::text::Line;
use ratatui::widgets::Paragraph;
use tui_scrollview::{ScrollView, ScrollViewState, ScrollbarVisibility};

use crate::core::state::{LiveTurn, TranscriptEntry};
use crate::tui::component::{Component, EventHandler};
use crate::tui::components::message::Message;
use crate::tui::event::TuiEvent;

/// Layout and scroll state for the message list.
/// Must be persisted in the parent TuiState.
pub struct MessageListState {
    pub scroll_state: ScrollViewState,
    pub layout: LayoutCache,
    /// When true, auto-scroll to bottom on new content
    pub stick_to_bottom: bool,
    /// Last known viewport height (for scroll clamping between frames)
    pub viewport_height: u16,
    /// Whether content exists below the viewport
    pub has_unseen_content: bool,
}

impl Default for MessageListState {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageListState {
    pub fn new() -> Self {
        Self {
            scroll_state: ScrollViewState::default(),
            layout: LayoutCache::new(),
            stick_to_bottom: true,
            viewport_height: 0,
            has_unseen_content: false,
        }
    }

    fn max_offset(&self, total_height: u16) -> u16 {
        total_height.saturating_sub(self.viewport_height)
    }

    /// Re-engage auto-scroll once the user scrolls back to the bottom.
    fn repin_if_at_bottom(&mut self) {
        let max_y = self.max_offset(self.layout.total_height);
        let current = self.scroll_state.offset();
        if current.y >= max_y {
            self.stick_to_bottom = true;
            self.scroll_state.set_offset(Position { x: current.x, y: max_y });
        }
    }

    /// Forget cached layout, e.g. after switching threads.
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

/// Scrollable conversation view component.
pub struct MessageList<'a> {
    pub state: &'a mut MessageListState,
    pub transcript: &'a [TranscriptEntry],
    pub live: Option<&'a LiveTurn>,
    pub agent_name: &'a str,
}

impl<'a> MessageList<'a> {
    pub fn new(
        state: &'a mut MessageListState,
        transcript: &'a [TranscriptEntry],
        live: Option<&'a LiveTurn>,
        agent_name: &'a str,
    ) -> Self {
        Self {
            state,
            transcript,
            live,
            agent_name,
        }
    }
}

impl<'a> Component for MessageList<'a> {
    fn render(&mut self, frame: &mut Frame, area: Rect) {
        let content_width = area.width.saturating_sub(1); // -1 for scrollbar

        if self.transcript.is_empty() && self.live.is_none() {
            let hint = Paragraph::new(Line::from("Ask a question to start a new thread."))
                .style(Style::default().fg(Color::DarkGray))
                .centered();
            let y = area.y + area.height / 2;
            frame.render_widget(hint, Rect::new(area.x, y, area.width, 1.min(area.height)));
            self.state.layout = LayoutCache::new();
            return;
        }

        // 1. Refresh cached heights for stored entries
        let layout = &mut self.state.layout;
        let reusable = layout.reusable_count(self.transcript.len(), content_width);
        layout.heights.truncate(reusable);
        for entry in self.transcript.iter().skip(layout.heights.len()) {
            let height = Message::from_entry(entry, self.agent_name).calculate_height(content_width);
            layout.heights.push(height);
        }
        layout.rebuild_prefix_heights();
        layout.content_width = content_width;

        // 2. The live answer is always measured fresh
        let live_message = self
            .live
            .filter(|l| !l.text.is_empty())
            .map(|l| Message::live(&l.text, self.agent_name));
        let live_height = live_message
            .as_ref()
            .map_or(0, |m| m.calculate_height(content_width));

        let stored_height = self.state.layout.prefix_heights.last().copied().unwrap_or(0);
        let total_height = stored_height.saturating_add(live_height);
        self.state.layout.total_height = total_height;

        self.state.viewport_height = area.height;
        let max_y = self.state.max_offset(total_height);
        let current = self.state.scroll_state.offset();
        if self.state.stick_to_bottom || current.y > max_y {
            self.state.scroll_state.set_offset(Position { x: current.x, y: max_y });
        }

        // 3. Render the visible entries
        let scroll_offset = self.state.scroll_state.offset().y;
        let visible = self.state.layout.visible_range(scroll_offset, area.height);

        let mut scroll_view = ScrollView::new(Size::new(content_width, total_height))
            .vertical_scrollbar_visibility(ScrollbarVisibility::Always)
            .horizontal_scrollbar_visibility(ScrollbarVisibility::Never);

        let mut y_offset = match visible.start {
            0 => 0,
            i => self.state.layout.prefix_heights[i - 1],
        };
        for i in visible {
            let height = self.state.layout.heights[i];
            let message = Message::from_entry(&self.transcript[i], self.agent_name);
            scroll_view.render_widget(&message, Rect::new(0, y_offset, content_width, height));
            y_offset += height;
        }
        if let Some(message) = &live_message {
            scroll_view.render_widget(message, Rect::new(0, stored_height, content_width, live_height));
        }

        frame.render_stateful_widget(scroll_view, area, &mut self.state.scroll_state);

        let offset = self.state.scroll_state.offset().y;
        self.state.has_unseen_content = offset < self.state.max_offset(total_height);
    }
}

/// EventHandler lives on the persistent state since `MessageList` is
/// recreated every frame.
impl EventHandler for MessageListState {
    type Event = ();

    fn handle_event(&mut self, event: &TuiEvent) -> Option<Self::Event> {
        match event {
            TuiEvent::ScrollUp => {
                self.scroll_state.scroll_up();
                self.stick_to_bottom = false;
            }
            TuiEvent::ScrollDown => {
                self.scroll_state.scroll_down();
                self.repin_if_at_bottom();
            }
            TuiEvent::ScrollPageUp => {
                self.scroll_state.scroll_page_up();
                self.stick_to_bottom = false;
            }
            TuiEvent::ScrollPageDown => {
                self.scroll_state.scroll_page_down();
                self.repin_if_at_bottom();
            }
            _ => {}
        }
        None
    }
}

/// Cached layout measurements for stored entries.
#[derive(Default)]
pub struct LayoutCache {
    pub heights: Vec<u16>,
    pub prefix_heights: Vec<u16>,
    content_width: u16,
    /// Stored entries plus the live answer, as of the last render.
    total_height: u16,
}

impl LayoutCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// How many cached heights are still valid. The transcript only grows
    /// by appending, so a shrink means it was replaced wholesale.
    pub fn reusable_count(&self, entry_count: usize, content_width: u16) -> usize {
        if self.content_width != content_width || entry_count < self.heights.len() {
            return 0;
        }
        self.heights.len()
    }

    pub fn rebuild_prefix_heights(&mut self) {
        self.prefix_heights = self
            .heights
            .iter()
            .scan(0u16, |acc, &h| {
                *acc = acc.saturating_add(h);
                Some(*acc)
            })
            .collect();
    }

    /// Entries overlapping the viewport, plus half a screen either side.
    pub fn visible_range(&self, scroll_offset: u16, viewport_height: u16) -> std::ops::Range<usize> {
        let buffer = viewport_height / 2;
        let top = scroll_offset.saturating_sub(buffer);
        let bottom = scroll_offset
            .saturating_add(viewport_height)
            .saturating_add(buffer);

        let start = self.prefix_heights.partition_point(|&end| end <= top);
        let end = self
            .prefix_heights
            .partition_point(|&end| end < bottom)
            .saturating_add(1)
            .min(self.prefix_heights.len());
        start..end.max(start)
    }
}
