//! Interactive terminal UI for the timesheet month view
//!
//! One screen lists the active month's entries grouped by day, with keys for
//! the entry lifecycle, selection, bulk actions and the approval request.

pub mod app;
pub mod events;
pub mod form_ui;
pub mod messages;
pub mod ui;
pub mod utils;

pub use app::App;
pub use events::EventHandler;

use anyhow::Result;
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io;

use timesheet::filters::FilterStore;
use timesheet::{TimesheetRepository, TimesheetSession};

/// Run the interactive UI on an opened session
pub async fn run_interactive<R: TimesheetRepository, S: FilterStore>(
    session: TimesheetSession<R, S>,
) -> Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(session);
    let res = run_app(&mut terminal, &mut app).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        tracing::error!(error = %err, "interactive session failed");
        eprintln!("Error: {:?}", err);
    }

    Ok(())
}

async fn run_app<B, R, S>(terminal: &mut Terminal<B>, app: &mut App<R, S>) -> Result<()>
where
    B: ratatui::backend::Backend,
    R: TimesheetRepository,
    S: FilterStore,
{
    let event_handler = EventHandler::new();

    loop {
        terminal.draw(|f| ui::draw(f, app))?;

        if let Some(event) = event_handler.next()? {
            if !app.handle_event(event).await? {
                break;
            }
        }
    }

    Ok(())
}
