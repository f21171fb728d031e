//! Rendering of the controller state

use ratatui::Frame;
use ratatui::layout::{Constraint, Flex, Layout, Rect};
use ratatui::style::{Color, Modifier, Style, Stylize};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Clear, List, ListItem, ListState, Paragraph, Wrap};
use sshdeck_core::app::{
    AppState, FieldKind, FormState, NoticeLevel, SelectList, StateKind, StateController,
};
use sshdeck_core::models::ConnectionRecord;
use sshdeck_core::storage::BackendKind;

const HIGHLIGHT: &str = "> ";

/// Draws the whole screen
pub fn draw(frame: &mut Frame, controller: &StateController) {
    let [header, body, status, hints] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(3),
        Constraint::Length(1),
        Constraint::Length(1),
    ])
    .areas(frame.area());

    frame.render_widget(header_line(controller), header);

    match controller.state() {
        AppState::StorageSelect(list) => {
            draw_list(frame, body, "Storage", list, |c| c.label().to_string());
        }
        AppState::OrganizationSelect(list) => {
            draw_list(frame, body, "Organization", list, |e| e.label().to_string());
        }
        AppState::CollectionSelect { organization, list } => {
            let title = format!("Collections of {}", organization.name);
            draw_list(frame, body, &title, list, |c| c.name.clone());
        }
        AppState::VaultConfig(form)
        | AppState::VaultLogin(form)
        | AppState::VaultUnlock(form)
        | AppState::AddConnection(form)
        | AppState::EditConnection { form, .. }
        | AppState::PasswordPrompt { form, .. } => draw_form(frame, body, form),
        AppState::ConnectionList => draw_connections(frame, body, controller.connections()),
        AppState::ConfirmDelete { name, .. } => {
            draw_connections(frame, body, controller.connections());
            draw_confirm(frame, body, name);
        }
        AppState::LiveSession { title, .. } => {
            let text = Paragraph::new(format!("Session running: {title}"))
                .block(Block::bordered().title("Session"));
            frame.render_widget(text, body);
        }
    }

    frame.render_widget(status_line(controller), status);
    frame.render_widget(
        Paragraph::new(hint(controller.state().kind())).dark_gray(),
        hints,
    );
}

fn header_line(controller: &StateController) -> Line<'static> {
    let backend = match controller.backend().map(|b| (b.kind(), b.scope().cloned())) {
        None => String::new(),
        Some((BackendKind::Local, _)) => " · local".to_string(),
        Some((BackendKind::Vault, None)) => " · vault".to_string(),
        Some((BackendKind::Vault, Some(scope))) => format!(" · vault {scope}"),
    };
    Line::from(vec![
        Span::styled("SSHDeck", Style::new().bold().cyan()),
        Span::raw(backend),
    ])
}

fn status_line(controller: &StateController) -> Line<'static> {
    if let Some(op) = controller.loading() {
        return Line::from(Span::styled(
            format!("Working: {op}... (Esc to cancel)"),
            Style::new().yellow(),
        ));
    }
    let Some(notice) = controller.notice() else {
        return Line::default();
    };
    let (prefix, style) = match notice.level {
        NoticeLevel::Info => (String::new(), Style::new().green()),
        NoticeLevel::Warning => ("Warning: ".to_string(), Style::new().yellow()),
        NoticeLevel::Error(kind) => (format!("{kind}: "), Style::new().red()),
    };
    Line::from(Span::styled(format!("{prefix}{}", notice.text), style))
}

fn draw_list<T>(
    frame: &mut Frame,
    area: Rect,
    title: &str,
    list: &SelectList<T>,
    label: impl Fn(&T) -> String,
) {
    let items: Vec<ListItem> = list.items().iter().map(|i| ListItem::new(label(i))).collect();
    let widget = List::new(items)
        .block(Block::bordered().title(title.to_string()))
        .highlight_style(Style::new().add_modifier(Modifier::REVERSED))
        .highlight_symbol(HIGHLIGHT);
    let mut state = ListState::default().with_selected(Some(list.selected_index()));
    frame.render_stateful_widget(widget, area, &mut state);
}

fn draw_connections(frame: &mut Frame, area: Rect, list: &SelectList<ConnectionRecord>) {
    if list.is_empty() {
        let empty = Paragraph::new("No connections. Press a to add one.")
            .block(Block::bordered().title("Connections"));
        frame.render_widget(empty, area);
        return;
    }
    draw_list(frame, area, "Connections", list, |r| {
        format!("{:<24} {}:{}", r.name, r.destination(), r.effective_port())
    });
}

fn draw_form(frame: &mut Frame, area: Rect, form: &FormState) {
    let mut lines: Vec<Line> = form
        .fields()
        .iter()
        .enumerate()
        .map(|(index, field)| {
            let focused = index == form.focus();
            let marker = if focused { HIGHLIGHT } else { "  " };
            let mut value = field.display_value();
            if focused && field.kind != FieldKind::Toggle {
                value.push('_');
            }
            let label_style = if focused {
                Style::new().bold()
            } else {
                Style::new()
            };
            Line::from(vec![
                Span::raw(marker),
                Span::styled(format!("{:<36}", field.label), label_style),
                Span::raw(value),
            ])
        })
        .collect();
    if let Some(error) = form.error() {
        lines.push(Line::default());
        lines.push(Line::from(Span::styled(error.to_string(), Style::new().red())));
    }

    let widget = Paragraph::new(lines)
        .block(Block::bordered().title(form.title.clone()))
        .wrap(Wrap { trim: false });
    frame.render_widget(widget, area);
}

fn draw_confirm(frame: &mut Frame, area: Rect, name: &str) {
    let [row] = Layout::vertical([Constraint::Length(3)])
        .flex(Flex::Center)
        .areas(area);
    let [popup] = Layout::horizontal([Constraint::Percentage(60)])
        .flex(Flex::Center)
        .areas(row);
    let text = Paragraph::new(format!("Delete {name}? (y/n)"))
        .block(Block::bordered().title("Confirm").fg(Color::Red));
    frame.render_widget(Clear, popup);
    frame.render_widget(text, popup);
}

fn hint(kind: StateKind) -> &'static str {
    match kind {
        StateKind::StorageSelect => "Enter select · c configure vault · q quit",
        StateKind::OrganizationSelect | StateKind::CollectionSelect => {
            "Enter select · Esc back · q quit"
        }
        StateKind::ConnectionList => {
            "Enter open · s session · w window · a add · e edit · d delete · r reload · Esc back"
        }
        StateKind::ConfirmDelete => "y delete · n cancel",
        StateKind::VaultConfig
        | StateKind::VaultLogin
        | StateKind::VaultUnlock
        | StateKind::AddConnection
        | StateKind::EditConnection
        | StateKind::PasswordPrompt => "Tab next field · Space toggle · Enter submit · Esc back",
        StateKind::LiveSession => "",
    }
}
