mod interactive;

use std::io::{self, Write};
use std::process;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand, ValueEnum};

use timesheet::api::ApiClient;
use timesheet::config::Config;
use timesheet::entry_form::{EntryForm, FormField};
use timesheet::filters::{FileFilterStore, FilterStore, MemoryFilterStore};
use timesheet::logging;
use timesheet::memory::InMemoryRepository;
use timesheet::models::{EntryStatus, Role, YearMonth};
use timesheet::report;
use timesheet::time_mask;
use timesheet::transitions::{BulkAction, Proposal};
use timesheet::utils::{mask_token, parse_date};
use timesheet::{TimesheetRepository, TimesheetSession};

const LONG_VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), " (built ", env!("BUILD_DATE"), ")");

#[derive(Parser)]
#[command(name = "timesheet")]
#[command(version, long_version = LONG_VERSION)]
#[command(about = "Timesheet entries and monthly approval requests", long_about = None)]
struct Cli {
    /// Verbose output (debug logging)
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    /// Run against built-in sample data instead of the backend
    #[arg(long, global = true)]
    demo: bool,

    /// Role to act as in demo mode
    #[arg(long, value_enum, default_value_t = DemoRole::Consultant, global = true)]
    demo_role: DemoRole,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the entries of a month grouped by day
    Entries {
        /// Month to show (YYYY-MM, default: current month)
        #[arg(short, long, value_parser = parse_month)]
        month: Option<YearMonth>,

        /// Only this user's entries (admins and managers)
        #[arg(short, long)]
        user: Option<String>,

        /// Only this project's entries (admins and managers)
        #[arg(short, long)]
        project: Option<String>,

        /// Only entries with this status (admins and managers)
        #[arg(short, long, value_parser = parse_status)]
        status: Option<EntryStatus>,

        /// Only this exact date (admins only; also selects its month)
        #[arg(short = 'D', long)]
        date: Option<String>,

        /// Clear the saved user/project/status/date filters first
        #[arg(long)]
        clear: bool,
    },
    /// List the months that have entries
    Months,
    /// Log a new entry
    Add {
        /// Project ID
        #[arg(short, long)]
        project: String,

        /// Duration as HH:MM
        #[arg(short = 't', long)]
        time: String,

        /// Activity type
        #[arg(short, long)]
        activity: String,

        /// Date (YYYY-MM-DD, YYYY.MM.DD, or YYYY/MM/DD format, default: today)
        #[arg(short = 'D', long)]
        date: Option<String>,

        /// Free-text notes
        #[arg(short, long)]
        notes: Option<String>,

        /// Owner of the entry (admins and managers)
        #[arg(short, long)]
        user: Option<String>,

        /// Initial status (admins and managers)
        #[arg(short, long, value_parser = parse_status)]
        status: Option<EntryStatus>,
    },
    /// Change fields of an existing entry
    Edit {
        id: String,
        #[arg(short, long)]
        project: Option<String>,
        #[arg(short = 't', long)]
        time: Option<String>,
        #[arg(short, long)]
        activity: Option<String>,
        #[arg(short = 'D', long)]
        date: Option<String>,
        #[arg(short, long)]
        notes: Option<String>,
        #[arg(short, long)]
        user: Option<String>,
        #[arg(short, long, value_parser = parse_status)]
        status: Option<EntryStatus>,
    },
    /// Copy an entry as a new pending entry
    Duplicate { id: String },
    /// Delete an entry
    Delete {
        id: String,

        /// Skip confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,
    },
    /// Approve, reject or reset one entry
    Status {
        id: String,

        #[arg(value_parser = parse_status)]
        status: EntryStatus,

        /// Message attached to the status change
        #[arg(short, long)]
        message: Option<String>,

        /// Skip confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,
    },
    /// Apply one action to several entries
    Bulk {
        #[arg(value_enum)]
        action: BulkKind,

        #[arg(required = true)]
        ids: Vec<String>,

        /// Message attached to approvals and rejections
        #[arg(short, long)]
        message: Option<String>,

        /// Skip confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,
    },
    /// Request approval for a month of your entries
    Submit {
        /// Month to submit (YYYY-MM, default: current month)
        #[arg(short, long, value_parser = parse_month)]
        month: Option<YearMonth>,
    },
    /// Start the interactive terminal UI (default)
    Interactive,
    /// Set up the backend URL and API token
    Config,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum BulkKind {
    Approve,
    Reject,
    Delete,
}

impl From<BulkKind> for BulkAction {
    fn from(kind: BulkKind) -> Self {
        match kind {
            BulkKind::Approve => BulkAction::Approve,
            BulkKind::Reject => BulkAction::Reject,
            BulkKind::Delete => BulkAction::Delete,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum DemoRole {
    Admin,
    Manager,
    Consultant,
}

impl From<DemoRole> for Role {
    fn from(role: DemoRole) -> Self {
        match role {
            DemoRole::Admin => Role::Admin,
            DemoRole::Manager => Role::Manager,
            DemoRole::Consultant => Role::Consultant,
        }
    }
}

fn parse_month(s: &str) -> std::result::Result<YearMonth, String> {
    s.parse().map_err(|e: timesheet::error::ValidationError| e.to_string())
}

fn parse_status(s: &str) -> std::result::Result<EntryStatus, String> {
    s.parse().map_err(|e: timesheet::error::ValidationError| e.to_string())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // The terminal UI owns the screen, so it logs to a file
    if matches!(cli.command, None | Some(Commands::Interactive)) {
        if let Err(e) = logging::init_with_file("timesheet.log", cli.verbose) {
            eprintln!("Warning: file logging unavailable: {}", e);
        }
    } else {
        logging::init(cli.verbose);
    }

    if let Err(e) = run(cli).await {
        eprintln!("❌ Error: {:#}", e);
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    if matches!(cli.command, Some(Commands::Config)) {
        configure().await?;
        return Ok(());
    }

    if cli.demo {
        let repo = InMemoryRepository::seeded_demo(cli.demo_role.into());
        let session = TimesheetSession::open(repo, MemoryFilterStore::new()).await?;
        return dispatch(session, cli.command).await;
    }

    let config = match Config::load() {
        Ok(config) => {
            tracing::debug!(token = %mask_token(&config.api_token), "using saved API token");
            config
        }
        Err(e) => {
            println!("No usable configuration ({}). Let's set one up!", e);
            configure().await?
        }
    };

    let client = ApiClient::new(&config.api_url, config.api_token.clone())?;
    let store = FileFilterStore::at_default_location()?;
    let session = TimesheetSession::open(client, store).await?;
    dispatch(session, cli.command).await
}

/// Prompts for the backend settings, checks them and saves them
async fn configure() -> Result<Config> {
    let config = Config::prompt()?;

    println!("Testing connection to {}...", config.api_url);
    let client = ApiClient::new(&config.api_url, config.api_token.clone())?;
    match client.test_connection().await {
        Ok(actor) => {
            config.save()?;
            println!(
                "✅ Connected as {} ({}). Configuration saved.",
                actor.name, actor.role
            );
            Ok(config)
        }
        Err(e) => Err(anyhow!(
            "Failed to validate configuration: {}. Please check the URL and token and try again.",
            e
        )),
    }
}

async fn dispatch<R: TimesheetRepository, S: FilterStore>(
    mut session: TimesheetSession<R, S>,
    command: Option<Commands>,
) -> Result<()> {
    let actor = session.actor().clone();
    tracing::info!(user = %actor.id, role = %actor.role, "running as {}", actor.name);

    match command.unwrap_or(Commands::Interactive) {
        Commands::Entries {
            month,
            user,
            project,
            status,
            date,
            clear,
        } => {
            if clear {
                session.clear_filters();
            }
            if let Some(month) = month {
                session.select_month(month).await?;
            }
            if user.is_some() {
                session.set_user_filter(user)?;
            }
            if project.is_some() {
                session.set_project_filter(project)?;
            }
            if status.is_some() {
                session.set_status_filter(status)?;
            }
            if let Some(date) = date {
                let date = parse_date(&date)?;
                session.set_date_filter(Some(date))?;
            }
            print!("{}", report::month_table(&mut session));
            if session.filters().has_optional() {
                println!("(saved filters active; use --clear to reset them)");
            }
        }
        Commands::Months => {
            let months = session.available_months();
            print!("{}", report::months_list(&months, session.filters().month));
        }
        Commands::Add {
            project,
            time,
            activity,
            date,
            notes,
            user,
            status,
        } => {
            let mut form = session.new_entry_form();
            form.project_id = project;
            form.time = masked_time(&time);
            form.activity_type = activity;
            if let Some(date) = date {
                form.date = date;
            }
            form.notes = notes.unwrap_or_default();
            apply_owner_fields(&mut form, user, status);

            let created = session.create_entry(&form).await?;
            println!(
                "✅ Created entry {} on {} ({})",
                created.id,
                created.date,
                time_mask::to_masked(created.hours)
            );
        }
        Commands::Edit {
            id,
            project,
            time,
            activity,
            date,
            notes,
            user,
            status,
        } => {
            let mut form = session.edit_entry_form(&id)?;
            if let Some(project) = project {
                form.project_id = project;
            }
            if let Some(time) = time {
                form.time = masked_time(&time);
            }
            if let Some(activity) = activity {
                form.activity_type = activity;
            }
            if let Some(date) = date {
                form.date = date;
            }
            if let Some(notes) = notes {
                form.notes = notes;
            }
            apply_owner_fields(&mut form, user, status);

            let updated = session.edit_entry(&form).await?;
            println!("✅ Updated entry {}", updated.id);
        }
        Commands::Duplicate { id } => {
            let copy = session.duplicate_entry(&id).await?;
            println!("✅ Duplicated entry {} as {}", id, copy.id);
        }
        Commands::Delete { id, yes } => {
            let entry = session.guard_entry(&id)?.clone();
            println!("\n📋 Entry Details:");
            print!("{}", report::entry_details(&session, &entry));

            if !yes && !confirm("\n🗑️  Delete this entry? This action cannot be undone!")? {
                println!("Deletion cancelled.");
                return Ok(());
            }
            session.delete_entry(&id).await?;
            println!("✅ Entry deleted successfully!");
        }
        Commands::Status {
            id,
            status,
            message,
            yes,
        } => match session.propose_status(&id, status)? {
            Proposal::Unchanged => {
                println!("ℹ️  Entry {} is already {}; nothing to do.", id, status);
            }
            Proposal::AwaitingConfirmation(change) => {
                if let Some(entry) = session.find_entry(&id) {
                    print!("{}", report::entry_details(&session, entry));
                }
                let question = format!("\nChange status from {} to {}?", change.from, change.to);
                if yes || confirm(&question)? {
                    let message = match message {
                        Some(message) => Some(message),
                        None if !yes => {
                            Some(prompt("Optional message (press Enter to skip):")?)
                        }
                        None => None,
                    };
                    let updated = session.confirm_status(message).await?;
                    println!("✅ Entry {} is now {}", updated.id, updated.status);
                } else {
                    session.cancel_status().await?;
                    println!("Status change cancelled.");
                }
            }
        },
        Commands::Bulk {
            action,
            ids,
            message,
            yes,
        } => {
            let action = BulkAction::from(action);
            for id in &ids {
                session.toggle_selection(id)?;
            }
            let question = format!("\nApply '{}' to {} entries?", action, ids.len());
            if !yes && !confirm(&question)? {
                session.clear_selection();
                println!("Bulk {} cancelled.", action);
                return Ok(());
            }
            let report = session.bulk(action, message).await?;
            println!("✅ Bulk {} applied to {} entries", report.action, report.attempted);
        }
        Commands::Submit { month } => {
            if let Some(month) = month {
                session.select_month(month).await?;
            }
            let label = session.filters().month.label();
            let request = session.request_approval().await?;
            println!(
                "✅ {} submitted for approval: {} entries linked to submission {}",
                label, request.associated, request.submission.id
            );
        }
        Commands::Interactive => {
            interactive::run_interactive(session).await?;
        }
        Commands::Config => {
            configure().await?;
        }
    }

    Ok(())
}

/// Accepts "7:30" as typed, or bare digits run through the input mask
fn masked_time(raw: &str) -> String {
    if raw.contains(':') {
        raw.trim().to_string()
    } else {
        time_mask::complete_partial(&time_mask::apply_mask(raw))
    }
}

fn apply_owner_fields(form: &mut EntryForm, user: Option<String>, status: Option<EntryStatus>) {
    let assignable = form.fields().contains(&FormField::User);
    if !assignable && (user.is_some() || status.is_some()) {
        println!("⚠️  Your role cannot choose the owner or status of an entry; ignoring them.");
        return;
    }
    if let Some(user) = user {
        form.user_id = user;
    }
    if let Some(status) = status {
        form.status = status;
    }
}

fn confirm(question: &str) -> Result<bool> {
    println!("{} (y/N)", question);
    io::stdout().flush()?;

    let mut confirmation = String::new();
    io::stdin().read_line(&mut confirmation)?;
    Ok(confirmation.trim().eq_ignore_ascii_case("y"))
}

fn prompt(question: &str) -> Result<String> {
    println!("{}", question);
    io::stdout().flush()?;

    let mut answer = String::new();
    io::stdin().read_line(&mut answer)?;
    Ok(answer.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_bulk_and_status() {
        let cli = Cli::try_parse_from(["timesheet", "bulk", "approve", "e1", "e2", "-m", "ok"]).unwrap();
        match cli.command {
            Some(Commands::Bulk {
                action, ids, message, yes,
            }) => {
                assert!(action == BulkKind::Approve);
                assert_eq!(ids, vec!["e1", "e2"]);
                assert_eq!(message.as_deref(), Some("ok"));
                assert!(!yes);
            }
            _ => panic!("expected bulk command"),
        }

        let cli = Cli::try_parse_from(["timesheet", "--demo", "status", "e1", "approve", "-y"]).unwrap();
        assert!(cli.demo);
        assert!(matches!(
            cli.command,
            Some(Commands::Status { status: EntryStatus::Approved, yes: true, .. })
        ));

        assert!(Cli::try_parse_from(["timesheet", "status", "e1", "done"]).is_err());
        assert!(Cli::try_parse_from(["timesheet", "bulk", "approve"]).is_err());
    }

    #[test]
    fn test_month_argument() {
        let cli = Cli::try_parse_from(["timesheet", "entries", "--month", "2024-03"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Entries { month: Some(m), .. }) if m == YearMonth::new(2024, 3).unwrap()
        ));
        assert!(Cli::try_parse_from(["timesheet", "entries", "--month", "2024-13"]).is_err());
    }

    #[test]
    fn test_masked_time() {
        assert_eq!(masked_time("7:30"), "7:30");
        assert_eq!(masked_time("0730"), "07:30");
        assert_eq!(masked_time("08"), "08:00");
    }
}
