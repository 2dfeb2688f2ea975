//! Active filter state of a viewing session and where it is persisted

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use chrono::{Local, NaiveDate};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result, TimesheetError};
use crate::models::{EntryStatus, YearMonth};

/// Page key under which the timesheet view stores its filters
pub const TIMESHEET_PAGE: &str = "timesheet-entries";

/// Role-scoped query over the entry collection.
///
/// The month filter is mandatory: it can be moved to another month or reset to
/// the current one but never cleared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterState {
    pub month: YearMonth,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub status: Option<EntryStatus>,
    #[serde(default)]
    pub date: Option<NaiveDate>,
}

impl FilterState {
    pub fn new(month: YearMonth) -> Self {
        FilterState {
            month,
            user_id: None,
            project_id: None,
            status: None,
            date: None,
        }
    }

    /// Keeps the optional filters of a saved state but starts on the current month
    pub fn restored(saved: FilterState) -> Self {
        let month = YearMonth::current();
        let date = saved.date.filter(|d| month.contains(*d));
        FilterState {
            month,
            date,
            ..saved
        }
    }

    /// Moves the active month; the exact-date filter is always cleared
    pub fn select_month(&mut self, month: YearMonth) {
        self.month = month;
        self.date = None;
    }

    pub fn reset_month(&mut self) {
        self.select_month(YearMonth::current());
    }

    /// Narrows to one date, moving the active month along with it
    pub fn set_date(&mut self, date: Option<NaiveDate>) {
        if let Some(date) = date {
            self.month = YearMonth::from_date(date);
        }
        self.date = date;
    }

    /// Clears user, project, status and date; the month stays
    pub fn clear_optional(&mut self) {
        self.user_id = None;
        self.project_id = None;
        self.status = None;
        self.date = None;
    }

    pub fn has_optional(&self) -> bool {
        self.user_id.is_some()
            || self.project_id.is_some()
            || self.status.is_some()
            || self.date.is_some()
    }
}

impl Default for FilterState {
    fn default() -> Self {
        Self::new(YearMonth::current())
    }
}

/// Key-value port for filter persistence
pub trait FilterStore {
    fn load(&self, key: &str) -> Result<Option<FilterState>>;
    fn save(&self, key: &str, state: &FilterState) -> Result<()>;
}

/// Keeps filters for the lifetime of the process only
#[derive(Debug, Default)]
pub struct MemoryFilterStore {
    pages: Mutex<HashMap<String, FilterState>>,
}

impl MemoryFilterStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FilterStore for MemoryFilterStore {
    fn load(&self, key: &str) -> Result<Option<FilterState>> {
        let pages = self
            .pages
            .lock()
            .map_err(|_| TimesheetError::Other("filter store poisoned".to_string()))?;
        Ok(pages.get(key).cloned())
    }

    fn save(&self, key: &str, state: &FilterState) -> Result<()> {
        let mut pages = self
            .pages
            .lock()
            .map_err(|_| TimesheetError::Other("filter store poisoned".to_string()))?;
        pages.insert(key.to_string(), state.clone());
        Ok(())
    }
}

/// On-disk layout of the filter file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct FilterFile {
    pages: HashMap<String, FilterState>,
    last_updated: String, // ISO 8601 timestamp
}

/// JSON file in the platform cache directory, one entry per page key
#[derive(Debug, Clone)]
pub struct FileFilterStore {
    path: PathBuf,
}

impl FileFilterStore {
    pub fn new(path: PathBuf) -> Self {
        FileFilterStore { path }
    }

    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("com", "timesheet", "timesheet")
            .map(|proj_dirs| proj_dirs.cache_dir().join("filters.json"))
    }

    pub fn at_default_location() -> Result<Self> {
        let path = Self::default_path().ok_or(ConfigError::NoDirectory("cache"))?;
        Ok(Self::new(path))
    }

    fn read(&self) -> Result<FilterFile> {
        if !self.path.exists() {
            return Ok(FilterFile::default());
        }
        let data = fs::read_to_string(&self.path)?;
        match serde_json::from_str(&data) {
            Ok(file) => Ok(file),
            Err(e) => {
                // A corrupt cache only costs the saved filters
                tracing::warn!(path = %self.path.display(), error = %e, "ignoring unreadable filter file");
                Ok(FilterFile::default())
            }
        }
    }
}

impl FilterStore for FileFilterStore {
    fn load(&self, key: &str) -> Result<Option<FilterState>> {
        Ok(self.read()?.pages.remove(key))
    }

    fn save(&self, key: &str, state: &FilterState) -> Result<()> {
        let mut file = self.read()?;
        file.pages.insert(key.to_string(), state.clone());
        file.last_updated = Local::now().to_rfc3339();

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(&file)?)?;
        tracing::debug!(path = %self.path.display(), key, "saved filters");
        Ok(())
    }
}
