//! Timesheet entry lifecycle and monthly approval client
//!
//! Everything except terminal rendering lives here: the data model, the time
//! mask, the lock and capability policy, filtering and grouping, selection,
//! status transitions, the monthly submission flow and the backend adapters.

pub mod api;
pub mod config;
pub mod entry_form;
pub mod error;
pub mod filters;
pub mod grouping;
pub mod logging;
pub mod memory;
pub mod models;
pub mod policy;
pub mod report;
pub mod repository;
pub mod selection;
pub mod session;
pub mod submission;
pub mod time_mask;
pub mod transitions;
pub mod utils;

#[cfg(test)]
mod test_data;

pub use error::{Result, TimesheetError};
pub use repository::TimesheetRepository;
pub use session::TimesheetSession;
