//! Admin harness for the campus store. Exercises the same operations the
//! portal's HTTP layer consumes: register, login, account lookup, and the
//! project document repository.

use std::sync::OnceLock;

use anyhow::{anyhow, bail, Result};
use clap::{Parser, Subcommand};
use regex::Regex;

use campus_core::{AccountDraft, AccountId, Password, ScheduleProfile};
use campus_store::{verify_password, AccountRepo, Database, ProjectRepo};

const MIN_PASSWORD_LENGTH: usize = 6;

#[derive(Parser)]
#[command(name = "campus", about = "Account and project store for the campus portal", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create an account, or update the one registered under the email.
    Register {
        #[arg(long)]
        full_name: String,
        #[arg(long)]
        email: String,
        /// Course number, 1-10.
        #[arg(long)]
        course: String,
        #[arg(long)]
        group: String,
        #[arg(long)]
        university_id: String,
        #[arg(long)]
        university_title: String,
        #[arg(long)]
        password: String,
        /// Linked schedule entity as "id:type:label".
        #[arg(long)]
        schedule: Option<String>,
    },
    /// Check a password against a registered account.
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Show an account by its public id.
    Account { id: String },
    /// Manage project documents.
    Project {
        #[command(subcommand)]
        action: ProjectAction,
    },
}

#[derive(Subcommand)]
enum ProjectAction {
    /// List documents, most recently updated first.
    List,
    /// Show one document.
    Get { id: String },
    /// Insert or update a document from JSON text.
    Save { json: String },
    /// Remove a document.
    Delete { id: String },
}

fn main() -> Result<()> {
    // Logs go to stderr; stdout is reserved for command output.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let db = Database::from_env();

    match cli.command {
        Command::Register {
            full_name,
            email,
            course,
            group,
            university_id,
            university_title,
            password,
            schedule,
        } => register(
            db,
            full_name,
            email,
            course,
            group,
            university_id,
            university_title,
            password,
            schedule,
        ),
        Command::Login { email, password } => login(db, &email, &password),
        Command::Account { id } => show_account(db, &id),
        Command::Project { action } => project(db, action),
    }
}

#[allow(clippy::too_many_arguments)]
fn register(
    db: Database,
    full_name: String,
    email: String,
    course: String,
    group: String,
    university_id: String,
    university_title: String,
    password: String,
    schedule: Option<String>,
) -> Result<()> {
    if full_name.trim().len() < 5 {
        bail!("full name looks too short");
    }
    if !is_valid_email(&email) {
        bail!("invalid email address");
    }
    let course = normalize_course(&course)
        .ok_or_else(|| anyhow!("course must be a number from 1 to 10"))?;
    if group.trim().len() < 2 {
        bail!("group label looks too short");
    }
    if password.len() < MIN_PASSWORD_LENGTH {
        bail!("password must be at least {MIN_PASSWORD_LENGTH} characters");
    }
    let schedule_profile = schedule.as_deref().map(parse_schedule).transpose()?;

    let draft = AccountDraft {
        full_name,
        email,
        course: course.to_string(),
        group_label: group,
        university_id,
        university_title,
        schedule_profile,
        password: Password::new(password),
    };
    let account = AccountRepo::new(db).save(&draft)?;
    println!("{}", serde_json::to_string_pretty(&account)?);
    Ok(())
}

fn login(db: Database, email: &str, password: &str) -> Result<()> {
    if !is_valid_email(email) {
        bail!("invalid email address");
    }
    if password.is_empty() {
        bail!("password is required");
    }
    let repo = AccountRepo::new(db);
    let Some(auth) = repo.get_auth_by_email(email)? else {
        bail!("account not found; register first");
    };
    if !verify_password(
        password,
        auth.password_hash.as_deref(),
        auth.password_salt.as_deref(),
    ) {
        bail!("invalid password");
    }
    println!("{}", serde_json::to_string_pretty(&auth.account)?);
    Ok(())
}

fn show_account(db: Database, id: &str) -> Result<()> {
    let repo = AccountRepo::new(db);
    let Some(account) = repo.get_by_public_id(&AccountId::from_raw(id))? else {
        bail!("account not found");
    };
    println!("{}", serde_json::to_string_pretty(&account)?);
    Ok(())
}

fn project(db: Database, action: ProjectAction) -> Result<()> {
    let repo = ProjectRepo::new(db);
    match action {
        ProjectAction::List => {
            let documents = repo.list()?;
            println!("{}", serde_json::to_string_pretty(&documents)?);
        }
        ProjectAction::Get { id } => {
            let Some(document) = repo.get(&id)? else {
                bail!("project not found");
            };
            println!("{}", serde_json::to_string_pretty(&document)?);
        }
        ProjectAction::Save { json } => {
            let document: serde_json::Value = serde_json::from_str(&json)?;
            let stored = repo.upsert(document)?;
            println!("{}", serde_json::to_string_pretty(&stored)?);
        }
        ProjectAction::Delete { id } => {
            repo.delete(&id)?;
        }
    }
    Ok(())
}

fn email_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("static pattern"))
}

fn is_valid_email(raw: &str) -> bool {
    email_pattern().is_match(raw.trim().to_lowercase().as_str())
}

/// Accept "3", "3rd course", etc.; clamp into 1-10.
fn normalize_course(raw: &str) -> Option<u32> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    let number = digits.parse::<u32>().ok()?;
    if number == 0 {
        None
    } else {
        Some(number.clamp(1, 10))
    }
}

fn parse_schedule(raw: &str) -> Result<ScheduleProfile> {
    let mut parts = raw.splitn(3, ':');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(id), Some(kind), Some(label))
            if !id.is_empty() && !kind.is_empty() && !label.is_empty() =>
        {
            Ok(ScheduleProfile {
                id: id.into(),
                kind: kind.into(),
                label: label.into(),
            })
        }
        _ => bail!("schedule must look like \"id:type:label\""),
    }
}
