//! Plain-text rendering of the month view for the command line

use std::fmt::Write;

use crate::filters::FilterStore;
use crate::grouping::{self, MonthOption};
use crate::models::TimeEntry;
use crate::repository::TimesheetRepository;
use crate::session::TimesheetSession;
use crate::time_mask;
use crate::utils::{format_day, truncate_string};

const RULE_WIDTH: usize = 92;

/// Day-grouped table of the active month, newest day first
pub fn month_table<R: TimesheetRepository, S: FilterStore>(
    session: &mut TimesheetSession<R, S>,
) -> String {
    let mut out = String::new();
    let month = session.filters().month;
    let locked = session.month_locked();

    let _ = writeln!(out, "\n=== TIMESHEET for {} ({}) ===", session.actor().name, month.label());
    if let Some(submission) = session.submission() {
        let _ = writeln!(out, "Submission: {}{}", submission.status, if locked { " 🔒" } else { "" });
    }

    let groups = session.view().to_vec();
    if groups.is_empty() {
        let _ = writeln!(out, "\nNo entries for {}.", month.label());
        return out;
    }

    let _ = writeln!(
        out,
        "\n{:<10} {:<2} {:<18} {:<20} {:<6} {:<9} {:<20}",
        "ID", "", "User", "Project", "Time", "Status", "Activity"
    );
    let _ = writeln!(out, "{}", "-".repeat(RULE_WIDTH));

    for group in &groups {
        let _ = writeln!(
            out,
            "{}  ({} {}, {})",
            format_day(group.date),
            group.count,
            if group.count == 1 { "entry" } else { "entries" },
            group.total_label
        );
        for entry in &group.entries {
            let _ = writeln!(out, "{}", entry_row(session, entry));
        }
    }

    let _ = writeln!(out, "{}", "-".repeat(RULE_WIDTH));
    let _ = writeln!(
        out,
        "Total: {} in {} entries",
        time_mask::to_masked(grouping::total_hours(&groups)),
        grouping::visible_entries(&groups).count()
    );
    out
}

fn entry_row<R: TimesheetRepository, S: FilterStore>(
    session: &TimesheetSession<R, S>,
    entry: &TimeEntry,
) -> String {
    let lock = if session.entry_locked(entry) { "🔒" } else { "" };
    format!(
        "{:<10} {:<2} {:<18} {:<20} {:<6} {:<9} {:<20}",
        truncate_string(&entry.id, 10),
        lock,
        truncate_string(session.user_name(&entry.user_id), 18),
        truncate_string(session.project_name(&entry.project_id), 20),
        time_mask::to_masked(entry.hours),
        entry.status,
        truncate_string(&entry.activity_type, 20)
    )
}

/// One line per month that has entries, the active one marked
pub fn months_list(months: &[MonthOption], active: crate::models::YearMonth) -> String {
    if months.is_empty() {
        return "No entries yet.\n".to_string();
    }
    months
        .iter()
        .map(|m| {
            let marker = if m.month == active { "*" } else { " " };
            format!("{} {}  {}\n", marker, m.month, m.label)
        })
        .collect()
}

/// Multi-line description of one entry, used before confirmations
pub fn entry_details<R: TimesheetRepository, S: FilterStore>(
    session: &TimesheetSession<R, S>,
    entry: &TimeEntry,
) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "  ID:       {}", entry.id);
    let _ = writeln!(out, "  Date:     {}", format_day(entry.date));
    let _ = writeln!(out, "  User:     {}", session.user_name(&entry.user_id));
    let _ = writeln!(out, "  Project:  {}", session.project_name(&entry.project_id));
    let _ = writeln!(out, "  Time:     {}", time_mask::to_masked(entry.hours));
    let _ = writeln!(out, "  Activity: {}", entry.activity_type);
    if let Some(notes) = &entry.notes {
        let _ = writeln!(out, "  Notes:    {}", notes);
    }
    let _ = writeln!(out, "  Status:   {}", entry.status);
    if let Some(description) = &entry.status_description {
        let _ = writeln!(out, "  Message:  {}", description);
    }
    out
}
