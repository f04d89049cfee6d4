//! Effects produced by conversation steps

use super::navigation::{BACK, BACK_LABEL, CANCEL, CANCEL_LABEL};

/// Text formatting understood by the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParseMode {
    #[default]
    Plain,
    Markdown,
    Html,
}

/// Inline button: visible label plus callback data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub label: String,
    pub data: String,
}

impl Button {
    pub fn new(label: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            data: data.into(),
        }
    }
}

/// Inline keyboard, row by row
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Keyboard {
    pub rows: Vec<Vec<Button>>,
}

impl Keyboard {
    pub fn new(rows: Vec<Vec<Button>>) -> Self {
        Self { rows }
    }

    /// Choice keyboard: the given rows followed by the navigation row.
    ///
    /// The navigation row holds Cancel, plus Back unless `only_cancel`.
    pub fn choice(mut rows: Vec<Vec<Button>>, only_cancel: bool) -> Self {
        let mut controls = vec![Button::new(CANCEL_LABEL, CANCEL)];
        if !only_cancel {
            controls.push(Button::new(BACK_LABEL, BACK));
        }
        rows.push(controls);
        Self { rows }
    }

    pub fn buttons(&self) -> impl Iterator<Item = &Button> {
        self.rows.iter().flatten()
    }
}

/// A message as shown to the user
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Screen {
    pub text: String,
    pub keyboard: Option<Keyboard>,
    pub parse_mode: ParseMode,
}

impl Screen {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            keyboard: None,
            parse_mode: ParseMode::Plain,
        }
    }

    pub fn with_keyboard(mut self, keyboard: Keyboard) -> Self {
        self.keyboard = Some(keyboard);
        self
    }

    pub fn markdown(mut self) -> Self {
        self.parse_mode = ParseMode::Markdown;
        self
    }

    pub fn html(mut self) -> Self {
        self.parse_mode = ParseMode::Html;
        self
    }
}

/// Rendering requests executed by the runtime after a state update
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Show in place of the message a button was pressed on; for typed
    /// messages this is a reply
    Render(Screen),

    /// Always send a new message
    Send(Screen),

    /// Short notice to the originator (a callback toast for button presses)
    Notice(String),
}

impl Effect {
    pub fn render(screen: Screen) -> Self {
        Effect::Render(screen)
    }

    pub fn render_text(text: impl Into<String>) -> Self {
        Effect::Render(Screen::text(text))
    }

    pub fn notice(text: impl Into<String>) -> Self {
        Effect::Notice(text.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_choice_keyboard_appends_controls() {
        let kb = Keyboard::choice(vec![vec![Button::new("Numbers", "task:numbers")]], false);
        assert_eq!(kb.rows.len(), 2);
        let data: Vec<&str> = kb.buttons().map(|b| b.data.as_str()).collect();
        assert_eq!(data, vec!["task:numbers", CANCEL, BACK]);
    }

    #[test]
    fn test_only_cancel_keyboard() {
        let kb = Keyboard::choice(vec![], true);
        assert_eq!(kb.rows, vec![vec![Button::new(CANCEL_LABEL, CANCEL)]]);
    }
}
