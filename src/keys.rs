use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::config::KeyConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Quit,
    SelectUp,
    SelectDown,
    OpenSelected,
    Back,
    Forward,
    First,
    Last,
    OpenLocation,
    Find,
    Save,
    Restore,
    Remove,
    ShowHelp,
}

pub struct KeyHandler {
    bindings: Vec<(Action, Vec<String>)>,
    pending_g: bool,
}

impl KeyHandler {
    pub fn new(config: KeyConfig) -> Self {
        let bindings = vec![
            (Action::Quit, config.quit),
            (Action::SelectUp, config.select_up),
            (Action::SelectDown, config.select_down),
            (Action::OpenSelected, config.open_selected),
            (Action::Back, config.back),
            (Action::Forward, config.forward),
            (Action::First, config.first),
            (Action::Last, config.last),
            (Action::OpenLocation, config.open_location),
            (Action::Find, config.find),
            (Action::Save, config.save),
            (Action::Restore, config.restore),
            (Action::Remove, config.remove),
            (Action::ShowHelp, config.help),
        ];
        Self {
            bindings,
            pending_g: false,
        }
    }

    pub fn handle(&mut self, key: KeyEvent) -> Option<Action> {
        // "gg" is the only two-key sequence
        if self.pending_g {
            self.pending_g = false;
            if key.code == KeyCode::Char('g') {
                return self.lookup("gg", &key);
            }
        }

        if key.code == KeyCode::Char('g') && key.modifiers.is_empty() && self.binds_gg() {
            self.pending_g = true;
            return None;
        }

        let key_str = key_to_string(&key);
        self.lookup(&key_str, &key)
    }

    fn lookup(&self, key_str: &str, key: &KeyEvent) -> Option<Action> {
        self.bindings
            .iter()
            .find(|(_, patterns)| patterns.iter().any(|p| matches_key(p, key_str, key)))
            .map(|(action, _)| *action)
    }

    fn binds_gg(&self) -> bool {
        self.bindings
            .iter()
            .any(|(_, patterns)| patterns.iter().any(|p| p == "gg"))
    }

    pub fn reset_pending(&mut self) {
        self.pending_g = false;
    }
}

fn key_to_string(key: &KeyEvent) -> String {
    let mut s = String::new();

    if key.modifiers.contains(KeyModifiers::CONTROL) {
        s.push_str("Ctrl-");
    }
    if key.modifiers.contains(KeyModifiers::ALT) {
        s.push_str("Alt-");
    }
    // Shift is already folded into the character for Char keys
    if key.modifiers.contains(KeyModifiers::SHIFT) && !matches!(key.code, KeyCode::Char(_)) {
        s.push_str("Shift-");
    }

    match key.code {
        KeyCode::Char(c) => s.push(c),
        KeyCode::Esc => s.push_str("Escape"),
        KeyCode::Enter => s.push_str("Enter"),
        KeyCode::Backspace => s.push_str("Backspace"),
        KeyCode::Tab => s.push_str("Tab"),
        KeyCode::Up => s.push_str("Up"),
        KeyCode::Down => s.push_str("Down"),
        KeyCode::Left => s.push_str("Left"),
        KeyCode::Right => s.push_str("Right"),
        KeyCode::Home => s.push_str("Home"),
        KeyCode::End => s.push_str("End"),
        KeyCode::PageUp => s.push_str("PageUp"),
        KeyCode::PageDown => s.push_str("PageDown"),
        KeyCode::F(n) => s.push_str(&format!("F{}", n)),
        _ => s.push_str("Unknown"),
    }

    s
}

fn matches_key(pattern: &str, key_str: &str, key: &KeyEvent) -> bool {
    if pattern == key_str {
        return true;
    }

    match pattern {
        "Space" => key.code == KeyCode::Char(' '),
        "Escape" | "Esc" => key.code == KeyCode::Esc,
        _ => match pattern.strip_prefix("Ctrl-") {
            Some(rest) => match key.code {
                KeyCode::Char(c) => {
                    key.modifiers.contains(KeyModifiers::CONTROL)
                        && rest.eq_ignore_ascii_case(&c.to_string())
                }
                _ => false,
            },
            // Single letters are case sensitive ("G" is not "g")
            None if pattern.chars().count() == 1 => false,
            None => pattern.eq_ignore_ascii_case(key_str),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn make_key_ctrl(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL)
    }

    fn handler() -> KeyHandler {
        let config = crate::config::Config::from_toml_str("").unwrap();
        KeyHandler::new(config.keys)
    }

    // ========================================
    // key_to_string tests
    // ========================================

    #[test]
    fn key_to_string_plain_and_special() {
        assert_eq!(key_to_string(&make_key(KeyCode::Char('G'))), "G");
        assert_eq!(key_to_string(&make_key(KeyCode::Esc)), "Escape");
        assert_eq!(key_to_string(&make_key(KeyCode::Backspace)), "Backspace");
        assert_eq!(key_to_string(&make_key(KeyCode::F(5))), "F5");
        assert_eq!(key_to_string(&make_key_ctrl('o')), "Ctrl-o");
    }

    #[test]
    fn key_to_string_shift_special_key() {
        let key = KeyEvent::new(KeyCode::Left, KeyModifiers::SHIFT);
        assert_eq!(key_to_string(&key), "Shift-Left");
    }

    // ========================================
    // matches_key tests
    // ========================================

    #[test]
    fn matches_key_named_patterns() {
        let space = make_key(KeyCode::Char(' '));
        assert!(matches_key("Space", &key_to_string(&space), &space));

        let esc = make_key(KeyCode::Esc);
        assert!(matches_key("Esc", &key_to_string(&esc), &esc));
        assert!(matches_key("escape", &key_to_string(&esc), &esc));
    }

    #[test]
    fn matches_key_ctrl_is_case_insensitive() {
        let key = make_key_ctrl('r');
        assert!(matches_key("Ctrl-R", &key_to_string(&key), &key));
        assert!(!matches_key("Ctrl-s", &key_to_string(&key), &key));
    }

    #[test]
    fn matches_key_single_letters_are_case_sensitive() {
        let key = make_key(KeyCode::Char('g'));
        assert!(!matches_key("G", &key_to_string(&key), &key));
    }

    // ========================================
    // KeyHandler tests
    // ========================================

    #[test]
    fn default_bindings() {
        let mut handler = handler();
        let cases = [
            (KeyCode::Char('q'), Action::Quit),
            (KeyCode::Char('k'), Action::SelectUp),
            (KeyCode::Down, Action::SelectDown),
            (KeyCode::Enter, Action::OpenSelected),
            (KeyCode::Backspace, Action::Back),
            (KeyCode::Char('h'), Action::Back),
            (KeyCode::Right, Action::Forward),
            (KeyCode::Char('G'), Action::Last),
            (KeyCode::Home, Action::First),
            (KeyCode::Char('o'), Action::OpenLocation),
            (KeyCode::Char('/'), Action::Find),
            (KeyCode::Char('s'), Action::Save),
            (KeyCode::Char('r'), Action::Restore),
            (KeyCode::Char('x'), Action::Remove),
            (KeyCode::Char('?'), Action::ShowHelp),
        ];
        for (code, action) in cases {
            assert_eq!(handler.handle(make_key(code)), Some(action), "{:?}", code);
        }
    }

    #[test]
    fn gg_goes_to_first() {
        let mut handler = handler();
        assert_eq!(handler.handle(make_key(KeyCode::Char('g'))), None);
        assert!(handler.pending_g);
        assert_eq!(
            handler.handle(make_key(KeyCode::Char('g'))),
            Some(Action::First)
        );
        assert!(!handler.pending_g);
    }

    #[test]
    fn g_followed_by_other_key_runs_that_key() {
        let mut handler = handler();
        handler.handle(make_key(KeyCode::Char('g')));
        assert_eq!(
            handler.handle(make_key(KeyCode::Char('l'))),
            Some(Action::Forward)
        );
        assert!(!handler.pending_g);
    }

    #[test]
    fn reset_pending_clears_g() {
        let mut handler = handler();
        handler.handle(make_key(KeyCode::Char('g')));
        handler.reset_pending();
        assert!(!handler.pending_g);
    }

    #[test]
    fn custom_binding_replaces_default() {
        let config = crate::config::Config::from_toml_str("[keys]\nback = [\"b\"]").unwrap();
        let mut handler = KeyHandler::new(config.keys);
        assert_eq!(handler.handle(make_key(KeyCode::Char('b'))), Some(Action::Back));
        assert_eq!(handler.handle(make_key(KeyCode::Backspace)), None);
    }

    #[test]
    fn unmapped_key_returns_none() {
        let mut handler = handler();
        assert_eq!(handler.handle(make_key(KeyCode::Char('z'))), None);
    }
}
