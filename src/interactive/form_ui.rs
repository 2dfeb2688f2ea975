//! Entry form rendering with a choice panel on the right

use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph},
    Frame,
};

use timesheet::entry_form::FormField;
use timesheet::filters::FilterStore;
use timesheet::models::EntryStatus;
use timesheet::{TimesheetRepository, TimesheetSession};

use super::app::App;
use super::utils::get_status_color;

/// Render the form editor
pub fn render_form<R: TimesheetRepository, S: FilterStore>(
    f: &mut Frame,
    app: &App<R, S>,
    area: Rect,
) {
    let Some(form) = &app.form else {
        return;
    };
    let title = if form.is_edit() { " Edit Entry " } else { " Add Entry " };

    let mut lines = vec![
        Line::from(Span::styled(
            "Tab: Next | Shift+Tab: Prev | ←→: Cursor or choice | Enter: Save | Esc: Cancel",
            Style::default().fg(Color::Gray),
        )),
        Line::from(""),
    ];

    for field in form.fields() {
        let is_current = form.current_field == field;
        let value = display_value(&app.session, field, form.value(field));

        let label_style = if is_current {
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::White)
        };
        let value_style = if is_current {
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::Gray)
        };

        let shown = if is_current && !field.is_choice() {
            let mut display: Vec<char> = value.chars().collect();
            let cursor = form.cursor_position.min(display.len());
            display.insert(cursor, '█');
            display.into_iter().collect()
        } else if value.is_empty() {
            "<empty>".to_string()
        } else if field.is_choice() {
            format!("◀ {} ▶", value)
        } else {
            value
        };

        let mut spans = vec![
            Span::styled(format!("{:15}", field.label()), label_style),
            Span::raw(": "),
            Span::styled(shown, value_style),
        ];
        if let Some(error) = form.errors.get(field.key()) {
            spans.push(Span::styled(
                format!("  ✗ {}", error),
                Style::default().fg(Color::Red),
            ));
        }
        lines.push(Line::from(spans));
    }

    lines.push(Line::from(""));
    let hint = match form.current_field {
        FormField::User => "←→ to choose the owner",
        FormField::Project => "←→ to choose the project",
        FormField::Date => "Format: YYYY-MM-DD (e.g., 2024-01-15)",
        FormField::Time => "Digits only, e.g. 0730 for 07:30",
        FormField::ActivityType => "What was done (e.g., Development)",
        FormField::Notes => "Optional notes",
        FormField::Status => "←→ to choose the status",
    };
    lines.push(Line::from(Span::styled(
        format!("💡 {}", hint),
        Style::default().fg(Color::Blue),
    )));

    let paragraph =
        Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title(title));
    f.render_widget(paragraph, area);
}

/// Names instead of ids for the choice fields
fn display_value<R: TimesheetRepository, S: FilterStore>(
    session: &TimesheetSession<R, S>,
    field: FormField,
    value: &str,
) -> String {
    match field {
        FormField::User if !value.is_empty() => session.user_name(value).to_string(),
        FormField::Project if !value.is_empty() => session.project_name(value).to_string(),
        _ => value.to_string(),
    }
}

/// Lists the options of the focused choice field
pub fn render_context_panel<R: TimesheetRepository, S: FilterStore>(
    f: &mut Frame,
    app: &App<R, S>,
    area: Rect,
) {
    let Some(form) = &app.form else {
        return;
    };

    let (title, items): (&str, Vec<ListItem>) = match form.current_field {
        FormField::User => (
            " Users ",
            app.session
                .users()
                .iter()
                .map(|u| option_item(&u.name, u.id == form.user_id, Color::White))
                .collect(),
        ),
        FormField::Project => (
            " Projects ",
            app.session
                .projects()
                .iter()
                .map(|p| {
                    let label = match &p.client_name {
                        Some(client) => format!("{} ({})", p.name, client),
                        None => p.name.clone(),
                    };
                    option_item(&label, p.id == form.project_id, Color::White)
                })
                .collect(),
        ),
        FormField::Status => (
            " Status ",
            EntryStatus::ALL
                .iter()
                .map(|s| option_item(s.as_str(), *s == form.status, get_status_color(*s)))
                .collect(),
        ),
        _ => (
            " Projects ",
            app.session
                .projects()
                .iter()
                .map(|p| option_item(&p.name, p.id == form.project_id, Color::Gray))
                .collect(),
        ),
    };

    let list = List::new(items).block(
        Block::default()
            .borders(Borders::ALL)
            .title(title)
            .style(Style::default().fg(Color::Cyan)),
    );
    f.render_widget(list, area);
}

fn option_item(label: &str, selected: bool, color: Color) -> ListItem<'static> {
    let style = if selected {
        Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(color)
    };
    let prefix = if selected { "▶ " } else { "  " };
    ListItem::new(format!("{}{}", prefix, label)).style(style)
}
