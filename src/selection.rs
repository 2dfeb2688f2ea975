//! Entry identifiers chosen for a bulk action

use std::collections::{BTreeSet, HashSet};

use crate::error::Refusal;
use crate::grouping::{visible_entries, DayGroup};
use crate::models::{Actor, TimeEntry};
use crate::policy::check_entry_action;

/// Outcome of a group or select-all toggle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupToggle {
    Selected(usize),
    Deselected(usize),
    /// Nothing in scope can be selected
    Nothing,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectionSet {
    ids: BTreeSet<String>,
}

impl SelectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    /// Flips one entry; selecting a locked or foreign entry is refused,
    /// deselecting always works. Returns whether the entry is now selected.
    pub fn toggle(&mut self, actor: &Actor, entry: &TimeEntry) -> Result<bool, Refusal> {
        if self.ids.remove(&entry.id) {
            return Ok(false);
        }
        check_entry_action(actor, entry)?;
        self.ids.insert(entry.id.clone());
        Ok(true)
    }

    /// Selects every selectable entry of the day, or deselects them when all
    /// of them already are
    pub fn toggle_group(&mut self, actor: &Actor, group: &DayGroup) -> GroupToggle {
        self.toggle_scope(selectable(actor, group.entries.iter()))
    }

    /// Same as [`toggle_group`](Self::toggle_group) across every visible day
    pub fn toggle_all(&mut self, actor: &Actor, groups: &[DayGroup]) -> GroupToggle {
        self.toggle_scope(selectable(actor, visible_entries(groups)))
    }

    fn toggle_scope(&mut self, scope: Vec<String>) -> GroupToggle {
        if scope.is_empty() {
            return GroupToggle::Nothing;
        }
        if scope.iter().all(|id| self.ids.contains(id)) {
            for id in &scope {
                self.ids.remove(id);
            }
            GroupToggle::Deselected(scope.len())
        } else {
            let count = scope.len();
            self.ids.extend(scope);
            GroupToggle::Selected(count)
        }
    }

    /// Drops identifiers that are no longer visible; returns how many went
    pub fn reconcile<'a>(&mut self, visible: impl IntoIterator<Item = &'a str>) -> usize {
        let visible: HashSet<&str> = visible.into_iter().collect();
        let before = self.ids.len();
        self.ids.retain(|id| visible.contains(id.as_str()));
        before - self.ids.len()
    }
}

fn selectable<'a>(actor: &Actor, entries: impl Iterator<Item = &'a TimeEntry>) -> Vec<String> {
    entries
        .filter(|e| check_entry_action(actor, e).is_ok())
        .map(|e| e.id.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::FilterState;
    use crate::grouping::project_view;
    use crate::models::{Role, YearMonth};
    use crate::test_data::{actor, entry};

    fn locked(id: &str, user: &str, date: &str) -> TimeEntry {
        let mut e = entry(id, user, date, 1.0);
        e.submission_id = Some("s1".to_string());
        e
    }

    fn groups(entries: &[TimeEntry], role: Role, user: &str) -> Vec<DayGroup> {
        let filters = FilterState::new(YearMonth::new(2024, 3).unwrap());
        project_view(entries, &filters, role, user)
    }

    #[test]
    fn test_toggle_refuses_locked_entry() {
        let consultant = actor("c1", Role::Consultant);
        let mut selection = SelectionSet::new();

        let open = entry("e1", "c1", "2024-03-01", 1.0);
        assert_eq!(selection.toggle(&consultant, &open), Ok(true));
        assert_eq!(selection.toggle(&consultant, &open), Ok(false));

        let frozen = locked("e2", "c1", "2024-03-01");
        assert_eq!(selection.toggle(&consultant, &frozen), Err(Refusal::Locked));
        assert!(selection.is_empty());

        let admin = actor("a1", Role::Admin);
        assert_eq!(selection.toggle(&admin, &frozen), Ok(true));
    }

    #[test]
    fn test_toggle_group_only_takes_unlocked_subset() {
        let consultant = actor("c1", Role::Consultant);
        let entries = vec![
            entry("e1", "c1", "2024-03-01", 1.0),
            locked("e2", "c1", "2024-03-01"),
            entry("e3", "c1", "2024-03-01", 1.0),
        ];
        let view = groups(&entries, Role::Consultant, "c1");
        let mut selection = SelectionSet::new();

        assert_eq!(selection.toggle_group(&consultant, &view[0]), GroupToggle::Selected(2));
        assert!(!selection.contains("e2"));
        assert_eq!(selection.toggle_group(&consultant, &view[0]), GroupToggle::Deselected(2));
        assert!(selection.is_empty());
    }

    #[test]
    fn test_toggle_all_selects_when_partially_selected() {
        let consultant = actor("c1", Role::Consultant);
        let entries = vec![
            entry("e1", "c1", "2024-03-01", 1.0),
            entry("e2", "c1", "2024-03-02", 1.0),
            locked("e3", "c1", "2024-03-03"),
        ];
        let view = groups(&entries, Role::Consultant, "c1");
        let mut selection = SelectionSet::new();
        selection.toggle(&consultant, &entries[0]).unwrap();

        assert_eq!(selection.toggle_all(&consultant, &view), GroupToggle::Selected(2));
        assert_eq!(selection.len(), 2);
        assert_eq!(selection.toggle_all(&consultant, &view), GroupToggle::Deselected(2));
        assert!(selection.is_empty());
    }

    #[test]
    fn test_toggle_all_with_nothing_selectable() {
        let consultant = actor("c1", Role::Consultant);
        let entries = vec![locked("e1", "c1", "2024-03-01")];
        let view = groups(&entries, Role::Consultant, "c1");
        let mut selection = SelectionSet::new();
        assert_eq!(selection.toggle_all(&consultant, &view), GroupToggle::Nothing);
    }

    #[test]
    fn test_reconcile_drops_stale_ids() {
        let admin = actor("a1", Role::Admin);
        let mut selection = SelectionSet::new();
        for id in ["e1", "e2", "e3"] {
            selection
                .toggle(&admin, &entry(id, "u1", "2024-03-01", 1.0))
                .unwrap();
        }

        let dropped = selection.reconcile(["e1", "e3", "e9"]);
        assert_eq!(dropped, 1);
        assert_eq!(selection.ids().collect::<Vec<_>>(), vec!["e1", "e3"]);
    }
}
