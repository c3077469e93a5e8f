use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, BorderType, Padding, Paragraph, Widget, Wrap};
use serde_json::Value;
use unicode_width::UnicodeWidthStr;

use crate::core::state::TranscriptEntry;
use crate::cortex::payload::{BlockRenderer, annotate_text, render_block};
use crate::cortex::{Annotation, Role, Table};
use crate::tui::component::Component;
use crate::tui::markdown;

/// Horizontal padding (per side) between the border and text content.
const CONTENT_PAD_H: u16 = 1;
/// Total horizontal space consumed by borders (1 left + 1 right) and padding.
const HORIZONTAL_OVERHEAD: u16 = 2 + CONTENT_PAD_H * 2;
/// Total vertical space consumed by borders (1 top + 1 bottom).
const VERTICAL_OVERHEAD: u16 = 2;
/// Widest a table column is drawn before its cells are cut.
const MAX_COLUMN_WIDTH: usize = 30;

const USER_COLOR: Color = Color::Green;
const AGENT_COLOR: Color = Color::Blue;

// ============================================================================
// Block → Text
// ============================================================================

/// Renders content blocks into terminal lines.
pub struct LineRenderer {
    base_fg: Color,
    pub lines: Vec<Line<'static>>,
}

impl LineRenderer {
    pub fn new(base_fg: Color) -> Self {
        Self {
            base_fg,
            lines: Vec::new(),
        }
    }

    fn gap(&mut self) {
        if !self.lines.is_empty() {
            self.lines.push(Line::default());
        }
    }
}

impl BlockRenderer for LineRenderer {
    fn text(&mut self, text: &str, annotations: &[Annotation]) {
        self.gap();
        let annotated = annotate_text(text, annotations);
        self.lines
            .extend(markdown::render(annotated.trim(), self.base_fg).lines);
    }

    fn table(&mut self, table: &Table) {
        self.gap();
        self.lines.extend(table_lines(table));
    }

    fn chart(&mut self, spec: &Value) {
        self.gap();
        self.lines.push(Line::from(Span::styled(
            chart_summary(spec),
            Style::default().fg(Color::Yellow).add_modifier(Modifier::ITALIC),
        )));
    }

    fn annotations(&mut self, items: &[Annotation]) {
        if items.is_empty() {
            return;
        }
        self.gap();
        let dim = Style::default().fg(Color::DarkGray);
        self.lines.push(Line::from(Span::styled("Sources", dim.add_modifier(Modifier::BOLD))));
        for item in items {
            self.lines.push(Line::from(vec![
                Span::styled(format!("[{}] ", item.number), Style::default().fg(Color::Magenta)),
                Span::styled(item.document_ref.clone(), dim),
            ]));
        }
    }
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn fit(s: &str, width: usize) -> String {
    if s.width() <= width {
        return format!("{s}{}", " ".repeat(width - s.width()));
    }
    let mut out = String::new();
    for c in s.chars() {
        if out.width() + 1 >= width {
            break;
        }
        out.push(c);
    }
    out.push('…');
    format!("{out}{}", " ".repeat(width.saturating_sub(out.width())))
}

/// Lays a table out as aligned text rows under a bold header.
pub fn table_lines(table: &Table) -> Vec<Line<'static>> {
    if table.columns.is_empty() {
        return vec![Line::from(Span::styled(
            "(empty table)",
            Style::default().fg(Color::DarkGray),
        ))];
    }

    let cells: Vec<Vec<String>> = table
        .rows
        .iter()
        .map(|row| {
            table
                .columns
                .iter()
                .map(|c| row.get(c).map(cell_text).unwrap_or_default())
                .collect()
        })
        .collect();

    let widths: Vec<usize> = table
        .columns
        .iter()
        .enumerate()
        .map(|(i, name)| {
            cells
                .iter()
                .map(|r| r[i].width())
                .chain(std::iter::once(name.width()))
                .max()
                .unwrap_or(0)
                .min(MAX_COLUMN_WIDTH)
        })
        .collect();

    let row_line = |values: &[String], style: Style| {
        let joined = values
            .iter()
            .zip(&widths)
            .map(|(v, w)| fit(v, *w))
            .collect::<Vec<_>>()
            .join(" │ ");
        Line::from(Span::styled(joined.trim_end().to_string(), style))
    };

    let frame = Style::default().fg(Color::DarkGray);
    let mut lines = vec![row_line(
        &table.columns,
        Style::default().add_modifier(Modifier::BOLD),
    )];
    lines.push(Line::from(Span::styled(
        widths
            .iter()
            .map(|w| "─".repeat(*w))
            .collect::<Vec<_>>()
            .join("─┼─"),
        frame,
    )));
    lines.extend(cells.iter().map(|r| row_line(r, Style::default())));
    lines
}

/// One-line description of a chart spec; charts are not drawn.
pub fn chart_summary(spec: &Value) -> String {
    let title = spec
        .get("title")
        .and_then(|t| t.as_str().or_else(|| t.get("text").and_then(Value::as_str)));
    let mark = spec
        .get("mark")
        .and_then(|m| m.as_str().or_else(|| m.get("type").and_then(Value::as_str)));
    match (title, mark) {
        (Some(t), Some(m)) => format!("[chart: {m}] {t}"),
        (Some(t), None) => format!("[chart] {t}"),
        (None, Some(m)) => format!("[chart: {m}]"),
        (None, None) => "[chart]".to_string(),
    }
}

// ============================================================================
// Message widget
// ============================================================================

/// A bordered transcript message. Created fresh each frame.
pub struct Message {
    pub role: Role,
    pub title: String,
    pub body: Text<'static>,
    /// Pulses the border while the answer is streaming.
    pub is_live: bool,
}

impl Message {
    pub fn from_entry(entry: &TranscriptEntry, agent_name: &str) -> Self {
        let mut renderer = LineRenderer::new(role_color(entry.role));
        for block in &entry.blocks {
            render_block(&mut renderer, block);
        }
        Self {
            role: entry.role,
            title: role_title(entry.role, agent_name),
            body: Text::from(renderer.lines),
            is_live: false,
        }
    }

    /// The answer being streamed: plain markdown of the text so far.
    pub fn live(text: &str, agent_name: &str) -> Self {
        Self {
            role: Role::Assistant,
            title: role_title(Role::Assistant, agent_name),
            body: markdown::render(text.trim(), AGENT_COLOR),
            is_live: true,
        }
    }

    fn paragraph(&self) -> Paragraph<'static> {
        Paragraph::new(self.body.clone()).wrap(Wrap { trim: true })
    }

    /// Rendered height at `width`, borders included.
    pub fn calculate_height(&self, width: u16) -> u16 {
        let content_width = width.saturating_sub(HORIZONTAL_OVERHEAD);
        if content_width == 0 {
            return 1;
        }
        if self.body.lines.is_empty() {
            return VERTICAL_OVERHEAD + 1;
        }
        let lines = self.paragraph().line_count(content_width);
        (lines as u16).max(1) + VERTICAL_OVERHEAD
    }
}

fn role_title(role: Role, agent_name: &str) -> String {
    match role {
        Role::User => "you".to_string(),
        Role::Assistant => agent_name.to_lowercase(),
    }
}

fn role_color(role: Role) -> Color {
    match role {
        Role::User => USER_COLOR,
        Role::Assistant => AGENT_COLOR,
    }
}

impl Widget for &Message {
    fn render(self, area: Rect, buf: &mut ratatui::buffer::Buffer) {
        let color = role_color(self.role);
        let border_style = if self.is_live {
            Style::default().fg(color).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(color).add_modifier(Modifier::DIM)
        };

        let block = Block::bordered()
            .title(self.title.as_str())
            .border_type(BorderType::Rounded)
            .border_style(border_style)
            .title_style(border_style)
            .padding(Padding::horizontal(CONTENT_PAD_H));

        let inner = block.inner(area);
        block.render(area, buf);
        self.paragraph().render(inner, buf);
    }
}

impl Component for Message {
    fn render(&mut self, frame: &mut Frame, area: Rect) {
        frame.render_widget(&*self, area);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cortex::ContentBlock;
    use serde_json::json;

    fn text_entry(role: Role, text: &str) -> TranscriptEntry {
        TranscriptEntry {
            role,
            blocks: vec![ContentBlock::Text {
                text: text.to_string(),
                annotations: Vec::new(),
            }],
        }
    }

    fn plain(lines: &[Line<'_>]) -> Vec<String> {
        lines
            .iter()
            .map(|l| l.spans.iter().map(|s| s.content.as_ref()).collect())
            .collect()
    }

    #[test]
    fn height_single_line_includes_borders() {
        let message = Message::from_entry(&text_entry(Role::User, "Hello"), "AGENT");
        assert_eq!(message.calculate_height(80), 1 + VERTICAL_OVERHEAD);
    }

    #[test]
    fn height_wraps_narrow_width() {
        let message = Message::from_entry(&text_entry(Role::User, "Hello world"), "AGENT");
        // content width 5: "Hello" | "world"
        assert_eq!(message.calculate_height(9), 2 + VERTICAL_OVERHEAD);
    }

    #[test]
    fn height_zero_width_returns_minimum() {
        let message = Message::from_entry(&text_entry(Role::User, "Hello"), "AGENT");
        assert_eq!(message.calculate_height(0), 1);
    }

    #[test]
    fn titles_follow_role() {
        assert_eq!(Message::from_entry(&text_entry(Role::User, "q"), "DATA_FOR_GOOD").title, "you");
        assert_eq!(
            Message::from_entry(&text_entry(Role::Assistant, "a"), "DATA_FOR_GOOD").title,
            "data_for_good"
        );
    }

    #[test]
    fn stored_annotations_render_as_markers() {
        let entry = TranscriptEntry {
            role: Role::Assistant,
            blocks: vec![ContentBlock::Text {
                text: "Sales rose".to_string(),
                annotations: vec![Annotation {
                    number: 1,
                    document_ref: "doc-1".to_string(),
                    position: 10,
                }],
            }],
        };
        let message = Message::from_entry(&entry, "AGENT");
        assert_eq!(plain(&message.body.lines)[0], "Sales rose [1]");
    }

    #[test]
    fn table_lines_align_columns_in_order() {
        let mut row1 = serde_json::Map::new();
        row1.insert("id".into(), json!(1));
        row1.insert("label".into(), json!("alpha"));
        let mut row2 = serde_json::Map::new();
        row2.insert("id".into(), json!(22));
        row2.insert("label".into(), Value::Null);
        let table = Table {
            columns: vec!["id".into(), "label".into()],
            rows: vec![row1, row2],
        };

        let lines = plain(&table_lines(&table));
        assert_eq!(lines[0], "id │ label");
        assert_eq!(lines[1], "───┼──────");
        assert_eq!(lines[2], "1  │ alpha");
        assert_eq!(lines[3], "22 │");
    }

    #[test]
    fn long_cells_are_cut() {
        assert_eq!(fit("abcdef", 4), "abc…");
        assert_eq!(fit("ab", 4), "ab  ");
    }

    #[test]
    fn chart_summary_uses_title_and_mark() {
        assert_eq!(
            chart_summary(&json!({"mark": "bar", "title": "Sales by region"})),
            "[chart: bar] Sales by region"
        );
        assert_eq!(chart_summary(&json!({"mark": {"type": "line"}})), "[chart: line]");
        assert_eq!(chart_summary(&Value::Null), "[chart]");
    }

    #[test]
    fn sources_listed_under_text() {
        let mut renderer = LineRenderer::new(AGENT_COLOR);
        renderer.annotations(&[Annotation {
            number: 2,
            document_ref: "doc-b".into(),
            position: 0,
        }]);
        assert_eq!(plain(&renderer.lines), vec!["Sources", "[2] doc-b"]);
    }
}
