//! Input widgets
//!
//! Widgets own their own key handling and report completion through a
//! signal. Drawing them is the binary's job.

use secrecy::SecretString;

use super::keys::Key;

const PAGE: usize = 10;

/// Signal returned by [`SelectList::handle`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListSignal {
    /// The selected entry was chosen
    Chosen(usize),
    /// Nothing to report
    Idle,
}

/// A list with one selected entry
#[derive(Debug, Clone)]
pub struct SelectList<T> {
    items: Vec<T>,
    selected: usize,
}

impl<T> Default for SelectList<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            selected: 0,
        }
    }
}

impl<T> SelectList<T> {
    /// Creates a list selecting the first entry
    #[must_use]
    pub fn new(items: Vec<T>) -> Self {
        Self { items, selected: 0 }
    }

    /// Entries
    #[must_use]
    pub fn items(&self) -> &[T] {
        &self.items
    }

    /// Number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the list has no entries
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Index of the selected entry
    #[must_use]
    pub const fn selected_index(&self) -> usize {
        self.selected
    }

    /// Selected entry, if any
    #[must_use]
    pub fn selected(&self) -> Option<&T> {
        self.items.get(self.selected)
    }

    /// Replaces the entries, keeping the selection in range
    pub fn set_items(&mut self, items: Vec<T>) {
        self.items = items;
        self.selected = self.selected.min(self.items.len().saturating_sub(1));
    }

    /// Selects the first entry
    pub fn reset_selection(&mut self) {
        self.selected = 0;
    }

    /// Selects `index`, clamped to the list
    pub fn select(&mut self, index: usize) {
        self.selected = index.min(self.items.len().saturating_sub(1));
    }

    /// Handles navigation keys and Enter
    pub fn handle(&mut self, key: &Key) -> ListSignal {
        let last = self.items.len().saturating_sub(1);
        match key {
            Key::Up | Key::Char('k') => self.selected = self.selected.saturating_sub(1),
            Key::Down | Key::Char('j') => self.selected = (self.selected + 1).min(last),
            Key::Home => self.selected = 0,
            Key::End => self.selected = last,
            Key::PageUp => self.selected = self.selected.saturating_sub(PAGE),
            Key::PageDown => self.selected = (self.selected + PAGE).min(last),
            Key::Enter if !self.items.is_empty() => return ListSignal::Chosen(self.selected),
            _ => {}
        }
        ListSignal::Idle
    }
}

/// How a form field edits and displays its value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Plain single-line text
    Text,
    /// Masked text; pasted newlines are kept
    Secret,
    /// Boolean switched with Space
    Toggle,
}

/// One form field
#[derive(Debug, Clone)]
pub struct FormField {
    /// Stable field name
    pub name: &'static str,
    /// Label shown next to the field
    pub label: &'static str,
    /// Field kind
    pub kind: FieldKind,
    value: String,
    checked: bool,
}

impl FormField {
    /// Creates a text field
    #[must_use]
    pub fn text(name: &'static str, label: &'static str) -> Self {
        Self {
            name,
            label,
            kind: FieldKind::Text,
            value: String::new(),
            checked: false,
        }
    }

    /// Creates a masked field
    #[must_use]
    pub fn secret(name: &'static str, label: &'static str) -> Self {
        Self {
            kind: FieldKind::Secret,
            ..Self::text(name, label)
        }
    }

    /// Creates a toggle
    #[must_use]
    pub fn toggle(name: &'static str, label: &'static str) -> Self {
        Self {
            kind: FieldKind::Toggle,
            ..Self::text(name, label)
        }
    }

    /// Prefills the value
    #[must_use]
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = value.into();
        self
    }

    /// Prefills the toggle state
    #[must_use]
    pub const fn with_checked(mut self, checked: bool) -> Self {
        self.checked = checked;
        self
    }

    /// Current text
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Current toggle state
    #[must_use]
    pub const fn checked(&self) -> bool {
        self.checked
    }

    /// Text as shown on screen
    #[must_use]
    pub fn display_value(&self) -> String {
        match self.kind {
            FieldKind::Text => self.value.clone(),
            FieldKind::Secret if self.value.contains('\n') => {
                format!("<{} lines>", self.value.lines().count())
            }
            FieldKind::Secret => "*".repeat(self.value.chars().count()),
            FieldKind::Toggle => if self.checked { "[x]" } else { "[ ]" }.to_string(),
        }
    }

    fn insert(&mut self, text: &str) {
        match self.kind {
            FieldKind::Text => self.value.extend(text.chars().filter(|c| !c.is_control())),
            FieldKind::Secret => self
                .value
                .extend(text.chars().filter(|c| *c == '\n' || !c.is_control())),
            FieldKind::Toggle => {}
        }
    }
}

/// Signal returned by [`FormState::handle`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormSignal {
    /// The user submitted the form
    Submit,
    /// Nothing to report
    Idle,
}

/// A vertical form with one focused field
#[derive(Debug, Clone)]
pub struct FormState {
    /// Title shown above the fields
    pub title: String,
    fields: Vec<FormField>,
    focus: usize,
    error: Option<String>,
}

impl FormState {
    /// Creates a form focusing the first field
    #[must_use]
    pub fn new(title: impl Into<String>, fields: Vec<FormField>) -> Self {
        Self {
            title: title.into(),
            fields,
            focus: 0,
            error: None,
        }
    }

    /// Fields in display order
    #[must_use]
    pub fn fields(&self) -> &[FormField] {
        &self.fields
    }

    /// Index of the focused field
    #[must_use]
    pub const fn focus(&self) -> usize {
        self.focus
    }

    /// Moves focus to the field called `name`
    pub fn focus_field(&mut self, name: &str) {
        if let Some(index) = self.fields.iter().position(|f| f.name == name) {
            self.focus = index;
        }
    }

    /// Validation message from the last submit
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Sets the validation message
    pub fn set_error(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
    }

    fn field(&self, name: &str) -> Option<&FormField> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Trimmed text of `name`; empty when the field does not exist
    #[must_use]
    pub fn text(&self, name: &str) -> String {
        self.field(name)
            .map(|f| f.value.trim().to_string())
            .unwrap_or_default()
    }

    /// Trimmed text of `name`, `None` when empty
    #[must_use]
    pub fn optional(&self, name: &str) -> Option<String> {
        Some(self.text(name)).filter(|v| !v.is_empty())
    }

    /// Untrimmed value of `name` as a secret, `None` when empty
    #[must_use]
    pub fn secret(&self, name: &str) -> Option<SecretString> {
        self.field(name)
            .map(|f| f.value.clone())
            .filter(|v| !v.trim().is_empty())
            .map(SecretString::from)
    }

    /// Toggle state of `name`
    #[must_use]
    pub fn checked(&self, name: &str) -> bool {
        self.field(name).is_some_and(|f| f.checked)
    }

    /// Handles editing and navigation keys
    pub fn handle(&mut self, key: &Key) -> FormSignal {
        let count = self.fields.len();
        if count == 0 {
            return if *key == Key::Enter {
                FormSignal::Submit
            } else {
                FormSignal::Idle
            };
        }
        let Some(field) = self.fields.get_mut(self.focus) else {
            return FormSignal::Idle;
        };
        match key {
            Key::Enter => return FormSignal::Submit,
            Key::Tab | Key::Down => self.focus = (self.focus + 1) % count,
            Key::BackTab | Key::Up => self.focus = (self.focus + count - 1) % count,
            Key::Char(' ') if field.kind == FieldKind::Toggle => field.checked = !field.checked,
            Key::Char(c) => field.insert(&c.to_string()),
            Key::Paste(text) => field.insert(text),
            Key::Backspace => {
                field.value.pop();
            }
            Key::Ctrl('u') => field.value.clear(),
            _ => {}
        }
        FormSignal::Idle
    }
}
