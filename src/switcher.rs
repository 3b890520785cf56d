use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use nucleo::{Config as NucleoConfig, Matcher, Utf32Str};
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::Span,
    widgets::{Block, Borders, Clear, Widget},
};

/// Fuzzy picker over the recorded entries.
pub struct JumpList {
    entries: Vec<String>,
    current: Option<usize>,
    pub query: String,
    filtered: Vec<(u32, usize)>, // (score, position in history)
    pub selected: usize,
    matcher: Matcher,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JumpAction {
    None,
    Close,
    /// Move the cursor to this history position.
    Jump(usize),
    /// Nothing matched; navigate to the typed text instead.
    Open(String),
}

impl JumpList {
    pub fn new(entries: Vec<String>, current: Option<usize>) -> Self {
        let mut list = Self {
            entries,
            current,
            query: String::new(),
            filtered: Vec::new(),
            selected: 0,
            matcher: Matcher::new(NucleoConfig::DEFAULT),
        };
        list.update_filtered();
        list
    }

    pub fn push_char(&mut self, c: char) {
        self.query.push(c);
        self.update_filtered();
        self.selected = 0;
    }

    pub fn pop_char(&mut self) {
        self.query.pop();
        self.update_filtered();
        self.selected = 0;
    }

    fn update_filtered(&mut self) {
        self.filtered.clear();

        if self.query.is_empty() {
            // Newest first, the way a back menu reads
            self.filtered = (0..self.entries.len()).rev().map(|i| (0, i)).collect();
            return;
        }

        let mut needle_buf = Vec::new();
        let needle = Utf32Str::new(&self.query, &mut needle_buf);

        for (i, entry) in self.entries.iter().enumerate() {
            let mut haystack_buf = Vec::new();
            let haystack = Utf32Str::new(entry, &mut haystack_buf);

            if let Some(score) = self.matcher.fuzzy_match(haystack, needle) {
                self.filtered.push((u32::from(score), i));
            }
        }

        // Best score first, newer entries win ties
        self.filtered
            .sort_by(|a, b| b.0.cmp(&a.0).then_with(|| b.1.cmp(&a.1)));
    }

    pub fn move_up(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    pub fn move_down(&mut self) {
        if self.selected + 1 < self.filtered.len() {
            self.selected += 1;
        }
    }

    pub fn selection(&self) -> JumpAction {
        if let Some((_, position)) = self.filtered.get(self.selected) {
            return JumpAction::Jump(*position);
        }

        let typed = self.query.trim();
        if typed.is_empty() {
            JumpAction::None
        } else {
            JumpAction::Open(typed.to_string())
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> JumpAction {
        match key.code {
            KeyCode::Esc => JumpAction::Close,
            KeyCode::Enter => self.selection(),
            KeyCode::Up => {
                self.move_up();
                JumpAction::None
            }
            KeyCode::Down => {
                self.move_down();
                JumpAction::None
            }
            KeyCode::Char('p') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.move_up();
                JumpAction::None
            }
            KeyCode::Char('n') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.move_down();
                JumpAction::None
            }
            KeyCode::Backspace => {
                self.pop_char();
                JumpAction::None
            }
            KeyCode::Char(c) => {
                self.push_char(c);
                JumpAction::None
            }
            _ => JumpAction::None,
        }
    }

    pub fn matches(&self) -> impl Iterator<Item = usize> + '_ {
        self.filtered.iter().map(|(_, i)| *i)
    }
}

pub struct JumpListWidget<'a> {
    list: &'a JumpList,
}

impl<'a> JumpListWidget<'a> {
    pub fn new(list: &'a JumpList) -> Self {
        Self { list }
    }
}

impl Widget for JumpListWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let width = (area.width * 2 / 3).clamp(30, 70).min(area.width);
        let height = (area.height * 2 / 3).clamp(8, 20).min(area.height);

        let x = area.x + (area.width - width) / 2;
        let y = area.y + (area.height - height) / 2;
        let overlay_area = Rect::new(x, y, width, height);

        Clear.render(overlay_area, buf);

        let title = format!(" Jump ({} entries) ", self.list.entries.len());
        let block = Block::default()
            .title(title)
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Magenta))
            .style(Style::default().bg(Color::Black));

        let inner = block.inner(overlay_area);
        block.render(overlay_area, buf);

        let input_line = format!("> {}", self.list.query);
        let input_span = Span::styled(&input_line, Style::default().fg(Color::Yellow));
        buf.set_span(inner.x, inner.y, &input_span, inner.width);

        if self.list.query.is_empty() {
            let hint = "Type to filter, or a new location...";
            let hint_x = inner.x + input_line.len() as u16;
            let hint_span = Span::styled(hint, Style::default().fg(Color::DarkGray));
            buf.set_span(
                hint_x,
                inner.y,
                &hint_span,
                inner.width.saturating_sub(input_line.len() as u16),
            );
        }

        let separator = "─".repeat(inner.width as usize);
        let sep_span = Span::styled(separator, Style::default().fg(Color::DarkGray));
        buf.set_span(inner.x, inner.y + 1, &sep_span, inner.width);

        let items_start_y = inner.y + 2;
        let items_height = inner.height.saturating_sub(3) as usize;
        let selected_style = Style::default()
            .fg(Color::Black)
            .bg(Color::Magenta)
            .add_modifier(Modifier::BOLD);

        if self.list.filtered.is_empty() && !self.list.query.is_empty() {
            let line = pad(format!("▶ {} (open)", self.list.query.trim()), inner.width);
            buf.set_span(inner.x, items_start_y, &Span::styled(line, selected_style), inner.width);
        } else {
            // Keep the selection on screen
            let skip = self.list.selected.saturating_sub(items_height.saturating_sub(1));
            for (row, (i, position)) in self
                .list
                .matches()
                .enumerate()
                .skip(skip)
                .take(items_height)
                .enumerate()
            {
                let is_selected = i == self.list.selected;
                let style = if is_selected {
                    selected_style
                } else if Some(position) == self.list.current {
                    Style::default().fg(Color::Cyan)
                } else {
                    Style::default().fg(Color::White)
                };

                let marker = if is_selected { "▶ " } else { "  " };
                let line = pad(
                    format!("{}{:>3} {}", marker, position, self.list.entries[position]),
                    inner.width,
                );
                buf.set_span(inner.x, items_start_y + row as u16, &Span::styled(line, style), inner.width);
            }
        }

        if inner.height > 4 {
            let help_y = overlay_area.bottom() - 2;
            let help_text = "Enter: jump │ Esc: cancel";
            let help_span = Span::styled(help_text, Style::default().fg(Color::DarkGray));
            let help_x = inner.x + (inner.width.saturating_sub(help_text.len() as u16)) / 2;
            buf.set_span(help_x, help_y, &help_span, help_text.len() as u16);
        }
    }
}

/// Truncates or pads `line` to exactly `width` characters.
fn pad(mut line: String, width: u16) -> String {
    let width = width as usize;
    let len = line.chars().count();
    if len > width {
        line = line.chars().take(width.saturating_sub(3)).collect();
        line.push_str("...");
    } else {
        line.extend(std::iter::repeat_n(' ', width - len));
    }
    line
}
