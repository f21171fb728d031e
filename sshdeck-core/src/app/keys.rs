//! Terminal-independent key events

/// A key press or paste, decoupled from the terminal backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Key {
    /// Printable character
    Char(char),
    /// Character with Control held
    Ctrl(char),
    /// Enter
    Enter,
    /// Escape
    Esc,
    /// Tab
    Tab,
    /// Shift+Tab
    BackTab,
    /// Arrow up
    Up,
    /// Arrow down
    Down,
    /// Arrow left
    Left,
    /// Arrow right
    Right,
    /// Backspace
    Backspace,
    /// Delete
    Delete,
    /// Home
    Home,
    /// End
    End,
    /// Page up
    PageUp,
    /// Page down
    PageDown,
    /// Bracketed paste
    Paste(String),
}

impl Key {
    /// Whether this key asks to quit from any non-text state
    #[must_use]
    pub const fn is_interrupt(&self) -> bool {
        matches!(self, Self::Ctrl('c'))
    }
}
