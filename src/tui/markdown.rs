//! Markdown → ratatui `Text` renderer.
//!
//! Converts `pulldown_cmark` events into styled `Line`/`Span` values:
//! headings, emphasis, inline code, fenced code blocks, lists, blockquotes
//! and links. Citation links (`[3](doc-id)`) collapse to a styled `[3]`
//! marker since the document reference means nothing on a terminal.

use pulldown_cmark::{CodeBlockKind, Event, HeadingLevel, Options, Parser, Tag, TagEnd};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};

const CITATION_COLOR: Color = Color::Magenta;
const FRAME_COLOR: Color = Color::DarkGray;

/// Parse markdown content into styled `Text` with `base_fg` as body color.
pub fn render(content: &str, base_fg: Color) -> Text<'static> {
    let mut opts = Options::empty();
    opts.insert(Options::ENABLE_STRIKETHROUGH);
    opts.insert(Options::ENABLE_TASKLISTS);

    let mut w = Writer::new(base_fg);
    for event in Parser::new_ext(content, opts) {
        w.handle(event);
    }
    w.text
}

struct Link {
    url: String,
    label: String,
}

struct Writer {
    text: Text<'static>,
    base_fg: Color,
    /// Inline styles compose via `patch`, so nested bold+italic works.
    styles: Vec<Style>,
    /// Per-line prefixes (blockquote and code block gutters).
    prefixes: Vec<Span<'static>>,
    /// None = bullet list, Some(n) = ordered list at n.
    lists: Vec<Option<u64>>,
    in_code: bool,
    link: Option<Link>,
    pending_blank: bool,
}

impl Writer {
    fn new(base_fg: Color) -> Self {
        Self {
            text: Text::default(),
            base_fg,
            styles: Vec::new(),
            prefixes: Vec::new(),
            lists: Vec::new(),
            in_code: false,
            link: None,
            pending_blank: false,
        }
    }

    fn style(&self) -> Style {
        self.styles
            .last()
            .copied()
            .unwrap_or_else(|| Style::default().fg(self.base_fg))
    }

    fn push_style(&mut self, overlay: Style) {
        self.styles.push(self.style().patch(overlay));
    }

    fn new_line(&mut self, mut line: Line<'static>) {
        for prefix in self.prefixes.iter().rev() {
            line.spans.insert(0, prefix.clone());
        }
        self.text.lines.push(line);
    }

    fn push_span(&mut self, span: Span<'static>) {
        match self.text.lines.last_mut() {
            Some(line) => line.push_span(span),
            None => self.new_line(Line::from(span)),
        }
    }

    fn block_gap(&mut self) {
        if self.pending_blank {
            self.new_line(Line::default());
            self.pending_blank = false;
        }
    }

    fn handle(&mut self, event: Event<'_>) {
        match event {
            Event::Start(tag) => self.open(tag),
            Event::End(tag) => self.close(tag),
            Event::Text(t) => self.write(&t),
            Event::Code(c) => {
                let span = Span::styled(c.to_string(), Style::default().fg(Color::White).bg(FRAME_COLOR));
                self.push_span(span);
            }
            Event::SoftBreak => self.write(" "),
            Event::HardBreak => self.new_line(Line::default()),
            Event::Rule => {
                self.block_gap();
                self.new_line(Line::from(Span::styled("─".repeat(40), Style::default().fg(FRAME_COLOR))));
                self.pending_blank = true;
            }
            Event::TaskListMarker(done) => self.push_span(Span::raw(if done { "[x] " } else { "[ ] " })),
            _ => {}
        }
    }

    fn open(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::Paragraph => {
                self.block_gap();
                self.new_line(Line::default());
            }
            Tag::Heading { level, .. } => {
                self.block_gap();
                let style = heading_style(self.base_fg, level);
                self.new_line(Line::default());
                self.push_style(style);
            }
            Tag::BlockQuote(_) => {
                self.block_gap();
                self.prefixes.push(Span::styled("│ ", Style::default().fg(FRAME_COLOR)));
                self.push_style(Style::default().add_modifier(Modifier::DIM | Modifier::ITALIC));
            }
            Tag::CodeBlock(kind) => {
                self.block_gap();
                let frame = Style::default().fg(FRAME_COLOR);
                let header = match kind {
                    CodeBlockKind::Fenced(lang) if !lang.is_empty() => format!("╭── {lang} ──"),
                    _ => "╭──".to_string(),
                };
                self.new_line(Line::from(Span::styled(header, frame)));
                self.prefixes.push(Span::styled("│ ", frame));
                self.in_code = true;
            }
            Tag::List(start) => {
                if self.lists.is_empty() {
                    self.block_gap();
                }
                self.lists.push(start);
            }
            Tag::Item => {
                self.new_line(Line::default());
                let indent = "  ".repeat(self.lists.len().saturating_sub(1));
                let marker = match self.lists.last_mut() {
                    Some(Some(n)) => {
                        let marker = format!("{indent}{n}. ");
                        *n += 1;
                        marker
                    }
                    _ => format!("{indent}- "),
                };
                self.push_span(Span::styled(marker, Style::default().fg(FRAME_COLOR)));
            }
            Tag::Emphasis => self.push_style(Style::default().add_modifier(Modifier::ITALIC)),
            Tag::Strong => self.push_style(Style::default().add_modifier(Modifier::BOLD)),
            Tag::Strikethrough => self.push_style(Style::default().add_modifier(Modifier::CROSSED_OUT)),
            Tag::Link { dest_url, .. } => {
                self.link = Some(Link {
                    url: dest_url.to_string(),
                    label: String::new(),
                });
            }
            _ => {}
        }
    }

    fn close(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Paragraph => self.pending_blank = true,
            TagEnd::Heading(_) => {
                self.styles.pop();
                self.pending_blank = true;
            }
            TagEnd::BlockQuote(_) => {
                self.prefixes.pop();
                self.styles.pop();
                self.pending_blank = true;
            }
            TagEnd::CodeBlock => {
                self.in_code = false;
                self.prefixes.pop();
                self.new_line(Line::from(Span::styled("╰──", Style::default().fg(FRAME_COLOR))));
                self.pending_blank = true;
            }
            TagEnd::List(_) => {
                self.lists.pop();
                self.pending_blank = true;
            }
            TagEnd::Emphasis | TagEnd::Strong | TagEnd::Strikethrough => {
                self.styles.pop();
            }
            TagEnd::Link => {
                if let Some(link) = self.link.take() {
                    self.finish_link(link);
                }
            }
            _ => {}
        }
    }

    fn finish_link(&mut self, link: Link) {
        let is_citation = !link.label.is_empty() && link.label.chars().all(|c| c.is_ascii_digit());
        if is_citation {
            self.push_span(Span::styled(
                format!("[{}]", link.label),
                Style::default().fg(CITATION_COLOR).add_modifier(Modifier::BOLD),
            ));
            return;
        }
        let style = self.style().fg(Color::Cyan).add_modifier(Modifier::UNDERLINED);
        self.push_span(Span::styled(link.label, style));
        if !link.url.is_empty() {
            self.push_span(Span::styled(format!(" ({})", link.url), Style::default().fg(FRAME_COLOR)));
        }
    }

    fn write(&mut self, raw: &str) {
        // ratatui renders \t as zero-width
        let text = raw.replace('\t', "    ");

        if let Some(link) = self.link.as_mut() {
            link.label.push_str(&text);
            return;
        }

        if self.in_code {
            let code = Style::default().fg(Color::White);
            for line in text.lines() {
                self.new_line(Line::from(Span::styled(line.to_owned(), code)));
            }
            return;
        }

        let style = self.style();
        self.push_span(Span::styled(text, style));
    }
}

fn heading_style(base_fg: Color, level: HeadingLevel) -> Style {
    let style = Style::default().fg(base_fg).add_modifier(Modifier::BOLD);
    match level {
        HeadingLevel::H1 => style.add_modifier(Modifier::UNDERLINED),
        HeadingLevel::H2 => style,
        _ => style.add_modifier(Modifier::ITALIC),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(text: &Text<'_>) -> Vec<String> {
        text.lines
            .iter()
            .map(|l| l.spans.iter().map(|s| s.content.as_ref()).collect())
            .collect()
    }

    #[test]
    fn heading_text_is_bold_in_base_color() {
        let text = render("## Results", Color::Blue);
        let span = text.lines[0].spans.iter().find(|s| s.content == "Results").unwrap();
        assert!(span.style.add_modifier.contains(Modifier::BOLD));
        assert_eq!(span.style.fg, Some(Color::Blue));
    }

    #[test]
    fn bold_text_is_bold() {
        let text = render("Some **bold** text", Color::Blue);
        let span = text.lines[0].spans.iter().find(|s| s.content == "bold").unwrap();
        assert!(span.style.add_modifier.contains(Modifier::BOLD));
    }

    #[test]
    fn citation_link_collapses_to_marker() {
        let text = render("Revenue grew [1](doc-7) last year", Color::Green);
        let lines = plain(&text);
        assert_eq!(lines[0], "Revenue grew [1] last year");
        let marker = text.lines[0].spans.iter().find(|s| s.content == "[1]").unwrap();
        assert_eq!(marker.style.fg, Some(CITATION_COLOR));
    }

    #[test]
    fn ordinary_link_keeps_url() {
        let text = render("[docs](https://example.com)", Color::Green);
        assert_eq!(plain(&text)[0], "docs (https://example.com)");
    }

    #[test]
    fn code_block_is_framed() {
        let lines = plain(&render("```sql\nselect 1\n```", Color::Blue));
        assert!(lines[0].starts_with("╭── sql"));
        assert_eq!(lines[1], "│ select 1");
        assert!(lines.last().unwrap().starts_with('╰'));
    }

    #[test]
    fn ordered_list_numbers_items() {
        let lines = plain(&render("1. one\n2. two", Color::Blue));
        assert!(lines.iter().any(|l| l == "1. one"));
        assert!(lines.iter().any(|l| l == "2. two"));
    }

    #[test]
    fn plain_text_uses_base_color() {
        let text = render("hello", Color::Green);
        assert_eq!(text.lines[0].spans[0].style.fg, Some(Color::Green));
    }

    #[test]
    fn tabs_expanded_to_spaces() {
        let lines = plain(&render("```\n\tindented\n```", Color::Blue));
        assert!(lines.iter().any(|l| l.contains("    indented")));
        assert!(!lines.iter().any(|l| l.contains('\t')));
    }
}
