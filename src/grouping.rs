//! Role-scoped, month-scoped, day-grouped projection of the entry collection

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;

use crate::filters::FilterState;
use crate::models::{Role, TimeEntry, YearMonth};
use crate::policy::{can, Action};
use crate::time_mask;

/// Entries of one calendar day, newest first
#[derive(Debug, Clone, PartialEq)]
pub struct DayGroup {
    pub date: NaiveDate,
    pub entries: Vec<TimeEntry>,
    pub total_hours: f64,
    /// `total_hours` rendered as `HH:MM`
    pub total_label: String,
    pub count: usize,
}

/// A month that has at least one entry, for the month selector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthOption {
    pub month: YearMonth,
    pub label: String,
}

/// Builds the grouped month view.
///
/// Elevated roles get the optional user/project/status/date filters applied;
/// owner-restricted roles ignore them and only ever see their own entries.
pub fn project_view(
    entries: &[TimeEntry],
    filters: &FilterState,
    role: Role,
    user_id: &str,
) -> Vec<DayGroup> {
    let elevated = can(role, Action::ViewAllUsers);
    let date_filter = filters.date.filter(|_| can(role, Action::FilterByDate));

    let mut by_day: BTreeMap<NaiveDate, Vec<TimeEntry>> = BTreeMap::new();
    for entry in entries {
        if !filters.month.contains(entry.date) {
            continue;
        }
        let keep = if elevated {
            filters.user_id.as_ref().map_or(true, |u| &entry.user_id == u)
                && filters.project_id.as_ref().map_or(true, |p| &entry.project_id == p)
                && filters.status.map_or(true, |s| entry.status == s)
                && date_filter.map_or(true, |d| entry.date == d)
        } else {
            entry.user_id == user_id
        };
        if keep {
            by_day.entry(entry.date).or_default().push(entry.clone());
        }
    }

    by_day
        .into_iter()
        .rev()
        .map(|(date, mut entries)| {
            entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            let total_hours: f64 = entries.iter().map(|e| e.hours).sum();
            DayGroup {
                date,
                count: entries.len(),
                total_label: time_mask::to_masked(total_hours),
                total_hours,
                entries,
            }
        })
        .collect()
}

/// Distinct months present in the whole collection, most recent first
pub fn available_months(entries: &[TimeEntry]) -> Vec<MonthOption> {
    let months: BTreeSet<YearMonth> = entries.iter().map(TimeEntry::month).collect();
    months
        .into_iter()
        .rev()
        .map(|month| MonthOption {
            label: month.label(),
            month,
        })
        .collect()
}

pub fn visible_entries(groups: &[DayGroup]) -> impl Iterator<Item = &TimeEntry> {
    groups.iter().flat_map(|g| g.entries.iter())
}

pub fn total_hours(groups: &[DayGroup]) -> f64 {
    groups.iter().map(|g| g.total_hours).sum()
}

#[derive(Debug, Clone, PartialEq)]
struct ViewKey {
    generation: u64,
    filters: FilterState,
    role: Role,
    user_id: String,
}

/// Memoizes [`project_view`] on (data generation, filters, role, user)
#[derive(Debug, Default)]
pub struct ViewCache {
    key: Option<ViewKey>,
    groups: Vec<DayGroup>,
}

impl ViewCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// `generation` must change whenever the entry collection is replaced
    pub fn get(
        &mut self,
        generation: u64,
        entries: &[TimeEntry],
        filters: &FilterState,
        role: Role,
        user_id: &str,
    ) -> &[DayGroup] {
        let key = ViewKey {
            generation,
            filters: filters.clone(),
            role,
            user_id: user_id.to_string(),
        };
        if self.key.as_ref() != Some(&key) {
            self.groups = project_view(entries, filters, role, user_id);
            self.key = Some(key);
        }
        &self.groups
    }

    pub fn invalidate(&mut self) {
        self.key = None;
    }
}
