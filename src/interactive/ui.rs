//! Main UI rendering logic

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph},
    Frame,
};

use timesheet::filters::FilterStore;
use timesheet::grouping::total_hours;
use timesheet::time_mask::to_masked;
use timesheet::utils::format_day;
use timesheet::{TimesheetRepository, TimesheetSession};

use super::app::{App, AppMode};
use super::form_ui;
use super::messages::MessageType;
use super::utils::{fit_width, get_message_style, get_status_color};

/// Main draw function
pub fn draw<R: TimesheetRepository, S: FilterStore>(f: &mut Frame, app: &mut App<R, S>) {
    let size = f.size();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(10),   // Main content
            Constraint::Length(5), // Messages
            Constraint::Length(3), // Footer
        ])
        .split(size);

    render_header(f, &app.session, chunks[0]);

    match app.mode {
        AppMode::Help => render_help(f, chunks[1]),
        AppMode::Form => {
            let content_chunks = Layout::default()
                .direction(Direction::Vertical)
                .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
                .split(chunks[1]);
            render_month_view(f, app, content_chunks[0]);

            let form_chunks = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([Constraint::Percentage(70), Constraint::Percentage(30)])
                .split(content_chunks[1]);
            form_ui::render_form(f, app, form_chunks[0]);
            form_ui::render_context_panel(f, app, form_chunks[1]);
        }
        _ => render_month_view(f, app, chunks[1]),
    }

    render_messages(f, app, chunks[2]);
    render_footer(f, app, chunks[3]);

    match app.mode {
        AppMode::ConfirmStatus => render_message_dialog(f, app, " Confirm status change ", size),
        AppMode::ConfirmBulk(action) => {
            let title = format!(" Bulk {} of {} entries ", action, app.session.selection().len());
            render_message_dialog(f, app, &title, size);
        }
        _ => {}
    }
}

fn render_header<R: TimesheetRepository, S: FilterStore>(
    f: &mut Frame,
    session: &TimesheetSession<R, S>,
    area: Rect,
) {
    let filters = session.filters();
    let mut title = format!(
        " Timesheet - {} ({}) - {} ",
        session.actor().name,
        session.actor().role,
        filters.month.label()
    );
    if let Some(submission) = session.submission() {
        let lock = if session.month_locked() { " 🔒" } else { "" };
        title.push_str(&format!("- Submission: {}{} ", submission.status, lock));
    }

    let mut active = Vec::new();
    if let Some(user) = &filters.user_id {
        active.push(format!("user={}", session.user_name(user)));
    }
    if let Some(project) = &filters.project_id {
        active.push(format!("project={}", session.project_name(project)));
    }
    if let Some(status) = filters.status {
        active.push(format!("status={}", status));
    }
    if let Some(date) = filters.date {
        active.push(format!("date={}", date));
    }
    if !active.is_empty() {
        title.push_str(&format!("- Filters: {} ", active.join(", ")));
    }

    let header = Paragraph::new(title)
        .style(
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan)),
        );

    f.render_widget(header, area);
}

/// Day groups of the active month, newest day first
fn render_month_view<R: TimesheetRepository, S: FilterStore>(
    f: &mut Frame,
    app: &mut App<R, S>,
    area: Rect,
) {
    let groups = app.session.view().to_vec();
    let session = &app.session;

    let mut items = Vec::new();
    let mut highlighted = None;
    let mut entry_index = 0;

    for group in &groups {
        items.push(ListItem::new(Line::from(vec![
            Span::styled(
                format_day(group.date),
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                format!(
                    "  {} {}  {}",
                    group.count,
                    if group.count == 1 { "entry" } else { "entries" },
                    group.total_label
                ),
                Style::default().fg(Color::Gray),
            ),
        ])));

        for entry in &group.entries {
            if entry_index == app.cursor {
                highlighted = Some(items.len());
            }
            entry_index += 1;

            let mark = if session.selection().contains(&entry.id) { "[x]" } else { "[ ]" };
            let lock = if session.entry_locked(entry) { "🔒" } else { "  " };
            let row = format!(
                "  {} {} {} {} {:>5}  ",
                mark,
                lock,
                fit_width(session.user_name(&entry.user_id), 18),
                fit_width(session.project_name(&entry.project_id), 20),
                to_masked(entry.hours),
            );
            items.push(ListItem::new(Line::from(vec![
                Span::raw(row),
                Span::styled(
                    fit_width(entry.status.as_str(), 9),
                    Style::default().fg(get_status_color(entry.status)),
                ),
                Span::raw(format!(" {}", entry.activity_type)),
            ])));
        }
    }

    if items.is_empty() {
        items.push(ListItem::new(Span::styled(
            format!("No entries for {}. Press 'a' to add one", session.filters().month.label()),
            Style::default().fg(Color::Gray),
        )));
    }

    let total = to_masked(total_hours(&groups));
    let title = format!(
        " {} - {} entries, {} - {} selected ",
        session.filters().month.label(),
        entry_index,
        total,
        session.selection().len()
    );

    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(title)
                .border_style(Style::default().fg(Color::Cyan)),
        )
        .highlight_style(
            Style::default()
                .bg(Color::DarkGray)
                .add_modifier(Modifier::BOLD),
        );

    let mut state = ListState::default().with_selected(highlighted);
    f.render_stateful_widget(list, area, &mut state);
}

/// Render the help screen
fn render_help(f: &mut Frame, area: Rect) {
    let section = |title: &'static str| {
        Line::from(Span::styled(title, Style::default().add_modifier(Modifier::BOLD)))
    };
    let help_text = vec![
        Line::from(Span::styled(
            "Keyboard Shortcuts",
            Style::default()
                .add_modifier(Modifier::BOLD)
                .fg(Color::Cyan),
        )),
        Line::from(""),
        section("Navigation:"),
        Line::from("  ←/→           Previous/next month with entries"),
        Line::from("  Home          Current month"),
        Line::from("  ↑/↓           Move between entries"),
        Line::from(""),
        section("Entries:"),
        Line::from("  a             Add entry"),
        Line::from("  e / Enter     Edit entry"),
        Line::from("  c             Duplicate entry"),
        Line::from("  d             Delete entry"),
        Line::from("  s             Propose the next status (admins and managers)"),
        Line::from(""),
        section("Selection and bulk actions:"),
        Line::from("  space         Toggle entry"),
        Line::from("  g             Toggle the entry's day"),
        Line::from("  A             Toggle all visible entries"),
        Line::from("  b / x / D     Approve / reject / delete the selection"),
        Line::from(""),
        section("Filters (admins and managers):"),
        Line::from("  f / p / o     Cycle status / project / user filter"),
        Line::from("  F             Clear filters"),
        Line::from(""),
        section("General:"),
        Line::from("  r             Request approval for the month"),
        Line::from("  u             Refresh data"),
        Line::from("  ?             Show this help"),
        Line::from("  q             Quit application"),
        Line::from(""),
        Line::from(Span::styled(
            "Press any key to return...",
            Style::default().fg(Color::Gray),
        )),
    ];

    let paragraph = Paragraph::new(help_text).block(
        Block::default()
            .borders(Borders::ALL)
            .title(" Help ")
            .border_style(Style::default().fg(Color::Cyan)),
    );

    f.render_widget(paragraph, area);
}

/// Render the messages pane
fn render_messages<R, S>(f: &mut Frame, app: &App<R, S>, area: Rect) {
    let mut lines = Vec::new();

    for msg in app.messages.iter().rev().take(3).rev() {
        let mut style = get_message_style(msg.message_type);
        let confirming = matches!(app.mode, AppMode::ConfirmDelete | AppMode::ConfirmSubmit);
        if confirming && msg.message_type == MessageType::Warning {
            style = style.add_modifier(Modifier::SLOW_BLINK);
        }

        lines.push(Line::from(vec![
            Span::styled(format!("{} ", msg.time_label()), Style::default().fg(Color::DarkGray)),
            Span::styled(format!("{} ", msg.icon()), style),
            Span::styled(msg.text.as_str(), style),
        ]));
    }

    if lines.is_empty() {
        lines.push(Line::from(Span::styled(
            "Ready",
            Style::default().fg(Color::Gray),
        )));
    }

    let paragraph = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .title(" Messages ")
            .border_style(Style::default().fg(Color::Cyan)),
    );

    f.render_widget(paragraph, area);
}

/// Render the footer with keyboard shortcuts
fn render_footer<R, S>(f: &mut Frame, app: &App<R, S>, area: Rect) {
    let shortcuts = match app.mode {
        AppMode::Browse => {
            "[←→] Months  [↑↓] Entries  [space] Select  [a]dd  [e]dit  [c]opy  [d]elete  [s]tatus  [b/x/D] Bulk  [r]equest approval  [u]pdate  [?] help  [q]uit"
        }
        AppMode::Form => "[Tab/↑↓] Fields  [←→] Cursor or choice  [Enter] Save  [Esc] Cancel",
        AppMode::ConfirmStatus | AppMode::ConfirmBulk(_) => {
            "Type an optional message  [Enter] Confirm  [Esc] Cancel"
        }
        AppMode::ConfirmDelete | AppMode::ConfirmSubmit => "[y] Confirm  [any other key] Cancel",
        AppMode::Help => "Press any key to return",
    };

    let footer = Paragraph::new(shortcuts)
        .style(Style::default().fg(Color::Gray))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::DarkGray)),
        );

    f.render_widget(footer, area);
}

/// Centered popup with the message input
fn render_message_dialog<R, S>(f: &mut Frame, app: &App<R, S>, title: &str, area: Rect) {
    let popup_width = 60.min(area.width);
    let popup_height = 3;
    let popup_area = Rect {
        x: area.width.saturating_sub(popup_width) / 2,
        y: area.height.saturating_sub(popup_height) / 2,
        width: popup_width,
        height: popup_height.min(area.height),
    };

    let inner_width = popup_width.saturating_sub(2) as usize;
    let scroll = app.message_input.visual_scroll(inner_width);
    let input = Paragraph::new(app.message_input.value())
        .scroll((0, scroll as u16))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(title)
                .border_style(Style::default().fg(Color::Yellow))
                .style(Style::default().bg(Color::Black)),
        );

    f.render_widget(Clear, popup_area);
    f.render_widget(input, popup_area);
    f.set_cursor(
        popup_area.x + 1 + (app.message_input.visual_cursor().saturating_sub(scroll)) as u16,
        popup_area.y + 1,
    );
}
