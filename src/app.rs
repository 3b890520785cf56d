use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent};
use ratatui::{Frame, layout::Rect};
use std::time::Duration;

use crate::{
    config::Config,
    history::{HistoryOptions, NavigationHistory, SetOutcome},
    keys::{Action, KeyHandler},
    storage::Storage,
    switcher::{JumpAction, JumpList, JumpListWidget},
    view::{HelpOverlay, HistoryView, LocationPrompt, MessageKind, MessageLine},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Browsing,
    Prompting,
    Jumping,
    Help,
}

pub struct App {
    pub state: AppState,
    pub history: NavigationHistory<String>,
    /// Row highlighted in the list; only becomes the cursor on Enter.
    pub selected: usize,
    pub prompt: String,
    pub jump: Option<JumpList>,
    pub key_handler: KeyHandler,
    pub should_quit: bool,
    pub message: Option<(String, MessageKind)>,
}

/// Builds the history the navigator works on. Without storage the history
/// lives in memory only.
pub fn build_history(
    config: &Config,
    storage: Option<Box<dyn Storage>>,
) -> Result<NavigationHistory<String>> {
    let mut options = HistoryOptions::default().capacity(config.capacity);

    let filter = config.drop_filter();
    if !filter.is_empty() {
        options = options.drop_item(move |location: &String| filter.matches(location));
    }

    let history = match storage {
        Some(storage) => {
            NavigationHistory::persisted_json(options.persistence_key(config.key.clone()), storage)?
        }
        None => NavigationHistory::new(options)?,
    };
    Ok(history)
}

impl App {
    pub fn new(history: NavigationHistory<String>, config: &Config) -> Self {
        let mut app = Self {
            state: AppState::Browsing,
            history,
            selected: 0,
            prompt: String::new(),
            jump: None,
            key_handler: KeyHandler::new(config.keys.clone()),
            should_quit: false,
            message: None,
        };
        app.follow_cursor();
        app
    }

    /// Records each location in order, as if typed one after another.
    pub fn open_all(&mut self, locations: &[String]) {
        for location in locations {
            self.open(location);
        }
    }

    pub fn run(&mut self, terminal: &mut ratatui::Terminal<impl ratatui::backend::Backend>) -> Result<()> {
        while !self.should_quit {
            terminal.draw(|frame| self.draw(frame))?;
            self.handle_events()?;
        }
        Ok(())
    }

    fn draw(&mut self, frame: &mut Frame) {
        let area = frame.area();

        let view = HistoryView::new(
            self.history.history(),
            self.history.position(),
            self.selected,
            self.history.current().map(String::as_str),
            self.history.capacity(),
            self.history.persistence_key(),
        );
        frame.render_widget(view, area);

        let bottom = Rect::new(area.x, area.bottom().saturating_sub(1), area.width, 1);
        match self.state {
            AppState::Prompting => {
                frame.render_widget(LocationPrompt::new(&self.prompt), bottom);
            }
            AppState::Jumping => {
                if let Some(ref jump) = self.jump {
                    frame.render_widget(JumpListWidget::new(jump), area);
                }
            }
            AppState::Help => {
                frame.render_widget(HelpOverlay, area);
            }
            AppState::Browsing => {}
        }

        if let Some((ref text, kind)) = self.message
            && self.state != AppState::Prompting
        {
            frame.render_widget(MessageLine::new(text, kind), bottom);
        }
    }

    fn handle_events(&mut self) -> Result<()> {
        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                self.message = None;
                self.handle_key(key);
            }
        } else {
            self.tick();
        }
        Ok(())
    }

    /// Picks up changes other sessions made to the stored location.
    pub fn tick(&mut self) {
        if self.history.sync_external() {
            let text = match self.history.current() {
                Some(current) => format!("Another session moved to {}", current),
                None => "Another session cleared the location".to_string(),
            };
            self.message = Some((text, MessageKind::Info));
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent) {
        match self.state {
            AppState::Browsing => self.handle_browsing_key(key),
            AppState::Prompting => self.handle_prompting_key(key),
            AppState::Jumping => self.handle_jumping_key(key),
            AppState::Help => self.handle_help_key(key),
        }
    }

    fn handle_browsing_key(&mut self, key: KeyEvent) {
        let Some(action) = self.key_handler.handle(key) else {
            return;
        };

        match action {
            Action::Quit => {
                self.should_quit = true;
            }
            Action::SelectUp => {
                self.selected = self.selected.saturating_sub(1);
            }
            Action::SelectDown => {
                if self.selected + 1 < self.history.len() {
                    self.selected += 1;
                }
            }
            Action::OpenSelected => {
                self.history.go(self.selected as isize);
                self.follow_cursor();
            }
            Action::Back => {
                self.history.back(1);
                self.follow_cursor();
            }
            Action::Forward => {
                self.history.forward(1);
                self.follow_cursor();
            }
            Action::First => {
                self.history.go(0);
                self.follow_cursor();
            }
            Action::Last => {
                self.history.go(-1);
                self.follow_cursor();
            }
            Action::OpenLocation => {
                self.prompt.clear();
                self.state = AppState::Prompting;
                self.key_handler.reset_pending();
            }
            Action::Find => {
                self.jump = Some(JumpList::new(
                    self.history.history().to_vec(),
                    self.history.position(),
                ));
                self.state = AppState::Jumping;
                self.key_handler.reset_pending();
            }
            Action::Save => {
                let saved = self.history.save_history().len();
                self.message = Some((format!("Saved {} entries", saved), MessageKind::Info));
            }
            Action::Restore => {
                let restored = self.history.restore_history().len();
                self.follow_cursor();
                self.message = Some((
                    format!("History has {} entries", restored),
                    MessageKind::Info,
                ));
            }
            Action::Remove => {
                self.history.remove_value();
                self.message = Some(("Cleared current location".to_string(), MessageKind::Info));
            }
            Action::ShowHelp => {
                self.state = AppState::Help;
                self.key_handler.reset_pending();
            }
        }
    }

    fn handle_prompting_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => {
                self.prompt.clear();
                self.state = AppState::Browsing;
            }
            KeyCode::Enter => {
                let location = std::mem::take(&mut self.prompt);
                self.state = AppState::Browsing;
                self.open(location.trim());
            }
            KeyCode::Backspace => {
                self.prompt.pop();
            }
            KeyCode::Char(c) => {
                self.prompt.push(c);
            }
            _ => {}
        }
    }

    fn handle_jumping_key(&mut self, key: KeyEvent) {
        let Some(ref mut jump) = self.jump else {
            self.state = AppState::Browsing;
            return;
        };

        match jump.handle_key(key) {
            JumpAction::None => return,
            JumpAction::Close => {}
            JumpAction::Jump(position) => {
                self.history.go(position as isize);
                self.follow_cursor();
            }
            JumpAction::Open(location) => {
                self.open(&location);
            }
        }
        self.jump = None;
        self.state = AppState::Browsing;
    }

    fn handle_help_key(&mut self, key: KeyEvent) {
        if matches!(
            key.code,
            KeyCode::Esc | KeyCode::Char('q') | KeyCode::Char('?') | KeyCode::Enter
        ) {
            self.state = AppState::Browsing;
        }
    }

    fn open(&mut self, location: &str) {
        if location.is_empty() {
            return;
        }

        match self.history.set(location.to_string()) {
            SetOutcome::Dropped => {
                self.message = Some((
                    format!("Not recorded: {}", location),
                    MessageKind::Error,
                ));
            }
            SetOutcome::Unchanged => {
                self.message = Some((format!("Reloaded {}", location), MessageKind::Info));
            }
            SetOutcome::Navigated => {}
        }
        self.follow_cursor();
    }

    fn follow_cursor(&mut self) {
        self.selected = self.history.position().unwrap_or(0);
    }
}
