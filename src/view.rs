use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Widget},
};

/// The recorded entries, oldest at the top, with the cursor and the
/// keyboard selection marked.
pub struct HistoryView<'a> {
    entries: &'a [String],
    position: Option<usize>,
    selected: usize,
    current: Option<&'a str>,
    capacity: usize,
    key: Option<&'a str>,
}

impl<'a> HistoryView<'a> {
    pub fn new(
        entries: &'a [String],
        position: Option<usize>,
        selected: usize,
        current: Option<&'a str>,
        capacity: usize,
        key: Option<&'a str>,
    ) -> Self {
        Self {
            entries,
            position,
            selected,
            current,
            capacity,
            key,
        }
    }
}

impl Widget for HistoryView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        Clear.render(area, buf);

        let chunks = Layout::vertical([
            Constraint::Length(1),
            Constraint::Min(1),
            Constraint::Length(1),
        ])
        .split(area);

        render_current(chunks[0], buf, self.current);

        let list_area = chunks[1];
        let viewport = list_area.height as usize;
        let scroll = scroll_offset(self.selected, self.entries.len(), viewport);

        let lines: Vec<Line> = self
            .entries
            .iter()
            .enumerate()
            .skip(scroll)
            .take(viewport)
            .map(|(i, entry)| {
                entry_line(
                    i,
                    entry,
                    Some(i) == self.position,
                    i == self.selected,
                )
            })
            .collect();

        if lines.is_empty() {
            Paragraph::new(Line::styled(
                "  (no history yet, press o to open a location)",
                Style::default().fg(Color::DarkGray),
            ))
            .render(list_area, buf);
        } else {
            Paragraph::new(lines).render(list_area, buf);
        }

        render_status_bar(
            chunks[2],
            buf,
            self.key,
            self.position,
            self.entries.len(),
            self.capacity,
        );
    }
}

/// First visible row so that `selected` stays inside a viewport of
/// `viewport` rows.
pub fn scroll_offset(selected: usize, len: usize, viewport: usize) -> usize {
    if viewport == 0 || len <= viewport {
        return 0;
    }
    let max_scroll = len - viewport;
    selected.saturating_sub(viewport - 1).min(max_scroll)
}

fn entry_line(index: usize, entry: &str, at_cursor: bool, selected: bool) -> Line<'static> {
    let marker = if at_cursor { "●" } else { " " };
    let mut style = if at_cursor {
        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
    } else {
        Style::default()
    };
    if selected {
        style = style.bg(Color::DarkGray);
    }

    Line::from(vec![
        Span::styled(format!(" {} ", marker), style),
        Span::styled(format!("{:>3}  ", index), style.fg(Color::DarkGray)),
        Span::styled(entry.to_string(), style),
    ])
}

fn render_current(area: Rect, buf: &mut Buffer, current: Option<&str>) {
    let style = Style::default().bg(Color::Blue).fg(Color::White);
    fill_line(area, buf, style);

    let text = match current {
        Some(value) => format!(" ▶ {}", value),
        None => " ▶ (no current location)".to_string(),
    };
    buf.set_span(area.x, area.y, &Span::styled(text, style), area.width);
}

fn render_status_bar(
    area: Rect,
    buf: &mut Buffer,
    key: Option<&str>,
    position: Option<usize>,
    len: usize,
    capacity: usize,
) {
    let status_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    fill_line(area, buf, status_style);

    let left = match key {
        Some(key) => format!(" [{}] ", key),
        None => " [memory] ".to_string(),
    };
    buf.set_span(
        area.x,
        area.y,
        &Span::styled(left.as_str(), status_style),
        left.chars().count() as u16,
    );

    let position = match position {
        Some(p) => format!("{}/{}", p + 1, len),
        None => format!("-/{}", len),
    };
    let right_str = format!("{} (cap {}) │ [?]help [q]quit", position, capacity);
    let right_width = right_str.chars().count() as u16 + 1;
    let right_x = area.right().saturating_sub(right_width);
    if right_x > area.x + left.chars().count() as u16 {
        buf.set_span(
            right_x,
            area.y,
            &Span::styled(format!("{} ", right_str), status_style),
            right_width,
        );
    }
}

fn fill_line(area: Rect, buf: &mut Buffer, style: Style) {
    for x in area.left()..area.right() {
        buf[(x, area.y)].set_style(style);
        buf[(x, area.y)].set_char(' ');
    }
}

/// Single-line input for typing a location.
pub struct LocationPrompt<'a> {
    input: &'a str,
}

impl<'a> LocationPrompt<'a> {
    pub fn new(input: &'a str) -> Self {
        Self { input }
    }
}

impl Widget for LocationPrompt<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let style = Style::default().fg(Color::White).bg(Color::DarkGray);
        fill_line(area, buf, style);

        let prompt = format!("open: {}", self.input);
        buf.set_span(area.x, area.y, &Span::styled(prompt, style), area.width);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Info,
    Error,
}

/// One-line message shown over the status bar until the next key press.
pub struct MessageLine<'a> {
    text: &'a str,
    kind: MessageKind,
}

impl<'a> MessageLine<'a> {
    pub fn new(text: &'a str, kind: MessageKind) -> Self {
        Self { text, kind }
    }
}

impl Widget for MessageLine<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let style = match self.kind {
            MessageKind::Info => Style::default().fg(Color::Black).bg(Color::Green),
            MessageKind::Error => Style::default().fg(Color::White).bg(Color::Red),
        };
        fill_line(area, buf, style);

        let msg = format!(" {} ", self.text);
        buf.set_span(area.x, area.y, &Span::styled(msg, style), area.width);
    }
}

pub struct HelpOverlay;

impl Widget for HelpOverlay {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let help_text = r#"
  histnav - Navigation History

  Moving through history:
    h, ←, Backspace   Back
    l, →              Forward
    gg, Home          Oldest entry
    G, End            Newest entry
    j/k, ↓/↑          Move selection
    Enter             Go to selected entry

  Recording:
    o                 Open a location
    f, /              Fuzzy jump (or open typed text)
    x                 Clear the current location

  Storage:
    s                 Save history list
    r                 Restore history list

  General:
    ?                 Show this help
    q, Escape         Quit / Close overlay
"#;

        let lines: Vec<&str> = help_text.lines().collect();
        let height = lines.len().min(area.height as usize);
        let width = lines
            .iter()
            .map(|l| l.chars().count())
            .max()
            .unwrap_or(40)
            .min((area.width as usize).saturating_sub(4));

        let x = area.x + (area.width.saturating_sub(width as u16 + 4)) / 2;
        let y = area.y + (area.height.saturating_sub(height as u16 + 2)) / 2;
        let overlay_area = Rect::new(x, y, width as u16 + 4, height as u16 + 2).intersection(area);

        Clear.render(overlay_area, buf);

        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan))
            .style(Style::default().bg(Color::Black));

        let inner = block.inner(overlay_area);
        block.render(overlay_area, buf);

        for (i, line) in lines.iter().take(inner.height as usize).enumerate() {
            let span = Span::styled(
                line.chars().take(inner.width as usize).collect::<String>(),
                Style::default().fg(Color::White),
            );
            buf.set_span(inner.x, inner.y + i as u16, &span, inner.width);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rendered_text(buf: &Buffer, area: Rect) -> String {
        let mut text = String::new();
        for y in area.top()..area.bottom() {
            for x in area.left()..area.right() {
                text.push_str(buf[(x, y)].symbol());
            }
            text.push('\n');
        }
        text
    }

    #[test]
    fn scroll_keeps_selection_visible() {
        assert_eq!(scroll_offset(0, 5, 10), 0);
        assert_eq!(scroll_offset(3, 20, 5), 0);
        assert_eq!(scroll_offset(4, 20, 5), 0);
        assert_eq!(scroll_offset(5, 20, 5), 1);
        assert_eq!(scroll_offset(19, 20, 5), 15);
        assert_eq!(scroll_offset(7, 20, 0), 0);
    }

    #[test]
    fn history_view_shows_entries_and_status() {
        let entries = vec!["/a".to_string(), "/b".to_string()];
        let area = Rect::new(0, 0, 60, 6);
        let mut buf = Buffer::empty(area);

        HistoryView::new(&entries, Some(1), 0, Some("/b"), 10, Some("nav")).render(area, &mut buf);

        let text = rendered_text(&buf, area);
        assert!(text.contains("▶ /b"));
        assert!(text.contains("/a"));
        assert!(text.contains("[nav]"));
        assert!(text.contains("2/2 (cap 10)"));
    }

    #[test]
    fn history_view_empty_hint() {
        let area = Rect::new(0, 0, 60, 4);
        let mut buf = Buffer::empty(area);

        HistoryView::new(&[], None, 0, None, 3, None).render(area, &mut buf);

        let text = rendered_text(&buf, area);
        assert!(text.contains("no history yet"));
        assert!(text.contains("[memory]"));
        assert!(text.contains("-/0"));
    }
}
