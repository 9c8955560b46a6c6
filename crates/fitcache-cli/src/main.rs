//! fitcache - command line front end for the fitness user-data cache.
//!
//! Loads, syncs and watches a signed-in user's quiz answers, plans and
//! progress through `fitcache_core::UserDataContext`.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use fitcache_core::auth::{CredentialStore, Session, SessionData};
use fitcache_core::config::Config;
use fitcache_core::models::{DietPlan, ProgressPatch, Versioned, WeightEntry};
use fitcache_core::nutrition::recalculate_plan;
use fitcache_core::store::State;
use fitcache_core::sync::{LoadOutcome, PlanOutcome, SyncOutcome};
use fitcache_core::utils::{format_date, format_macros, format_optional, format_signed_kg, format_weight};
use fitcache_core::UserDataContext;

// ============================================================================
// Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "fitcache")]
#[command(about = "Load, sync and watch fitness plan data")]
#[command(version)]
struct Cli {
    /// Path to config file (default: ~/.config/fitcache/config.json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// User to act as (default: last signed-in user)
    #[arg(short, long, global = true)]
    user: Option<String>,

    /// Also write logs to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the session and what the local mirror holds
    Status,
    /// Load user data (cache, then remote with retry, then local mirror)
    Load,
    /// Push quiz answers and progress to the remote store
    Sync,
    /// Load, subscribe to pushes and print changes until interrupted
    Watch {
        /// Stop after this many seconds
        #[arg(short, long)]
        seconds: Option<u64>,
    },
    /// Ask the backend to generate new diet and workout plans
    Generate,
    /// Record progress (weight, body measurements)
    Progress {
        /// Current weight in kg; also added to the weight history
        #[arg(short, long)]
        weight: Option<f64>,

        /// Body measurement in cm, as name=value (repeatable)
        #[arg(short, long = "measure", value_parser = parse_measurement)]
        measurements: Vec<(String, f64)>,
    },
    /// Store a session for a user
    Login {
        #[arg(long)]
        email: Option<String>,

        /// Bearer token (default: the one saved in the keychain)
        #[arg(long)]
        token: Option<String>,
    },
    /// Forget the saved session
    Logout,
    /// Recalculate macros of a diet plan JSON file and print the totals
    Macros {
        file: PathBuf,
    },
}

fn parse_measurement(s: &str) -> Result<(String, f64), String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected name=value, got '{}'", s))?;
    let name = name.trim();
    if name.is_empty() {
        return Err("measurement name is empty".to_string());
    }
    let value = value
        .trim()
        .replace(',', ".")
        .parse::<f64>()
        .map_err(|e| format!("invalid value for '{}': {}", name, e))?;
    Ok((name.to_string(), value))
}

// ============================================================================
// Logging
// ============================================================================

/// Initialize the tracing subscriber for logging.
///
/// Use RUST_LOG to control the level (e.g. RUST_LOG=fitcache_core=debug).
/// The returned guard must live until exit so the file writer flushes.
fn init_tracing(log_file: Option<&PathBuf>) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            let (writer, guard) = tracing_appender::non_blocking(file);
            (
                Some(fmt::layer().with_ansi(false).with_writer(writer)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    Ok(guard)
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let _guard = init_tracing(cli.log_file.as_ref())?;

    let mut config = match &cli.config {
        Some(path) => {
            let mut config = Config::load_from(path)?;
            config.apply_env(|key| std::env::var(key).ok());
            config
        }
        None => Config::load()?,
    };
    info!(command = ?cli.command, "fitcache starting");

    let user = cli.user.clone().or_else(|| config.last_user_id.clone());

    match cli.command {
        Command::Login { email, token } => {
            login(&mut config, cli.config.as_ref(), user, email, token)
        }
        Command::Logout => logout(&config, user.as_deref()),
        Command::Macros { file } => macros(&file),
        Command::Status => {
            let session = load_session(&config, user.as_deref())?;
            status(&config, session.as_ref())
        }
        command => {
            let session = load_session(&config, user.as_deref())?;
            let ctx = UserDataContext::from_config(&config, session.as_ref())?;
            run(&ctx, session, command).await
        }
    }
}

/// Commands that go through the context.
async fn run(ctx: &UserDataContext, session: Option<SessionData>, command: Command) -> Result<()> {
    match command {
        Command::Load => {
            let outcome = ctx.handle_auth_change(session).await;
            ctx.sync().unsubscribe_all().await;
            print_outcome(&outcome);
            print_state(&ctx.snapshot().await);
        }
        Command::Sync => {
            require(&session)?;
            ctx.handle_auth_change(session).await;
            let outcome = ctx.sync_data().await;
            ctx.sync().unsubscribe_all().await;
            match outcome {
                SyncOutcome::Synced { quiz_version } => match quiz_version {
                    Some(v) => println!("Synced (quiz version {})", v),
                    None => println!("Synced"),
                },
                SyncOutcome::Skipped => println!("Nothing to sync"),
                SyncOutcome::Failed(message) => bail!(message),
            }
        }
        Command::Watch { seconds } => watch(ctx, session, seconds).await?,
        Command::Generate => {
            require(&session)?;
            ctx.handle_auth_change(session).await;
            println!("Generating plans...");
            let outcome = ctx.generate_plans().await;
            ctx.sync().unsubscribe_all().await;
            match outcome {
                PlanOutcome::Generated(load) => {
                    print_outcome(&load);
                    print_state(&ctx.snapshot().await);
                }
                PlanOutcome::MissingPrerequisites => {
                    bail!(ctx.error().await.unwrap_or_else(|| "Cannot generate plans".to_string()))
                }
                PlanOutcome::Failed(message) => bail!(message),
            }
        }
        Command::Progress {
            weight,
            measurements,
        } => {
            ctx.handle_auth_change(session).await;
            ctx.sync().unsubscribe_all().await;
            let patch = ProgressPatch {
                current_weight: weight,
                weight_entry: weight.map(|weight| WeightEntry {
                    date: Utc::now().format("%Y-%m-%d").to_string(),
                    weight,
                }),
                measurements: measurements.into_iter().collect(),
                ..Default::default()
            };
            match ctx.update_progress_data(patch).await {
                SyncOutcome::Skipped => println!("Nothing to record"),
                SyncOutcome::Failed(message) => {
                    println!("Saved locally; remote write failed: {}", message)
                }
                SyncOutcome::Synced { .. } => println!("Progress saved"),
            }
            if let Some(progress) = ctx.progress_data().await {
                if let Some(change) = progress.weight_change() {
                    println!("Weight change: {}", format_signed_kg(change));
                }
            }
        }
        Command::Status | Command::Login { .. } | Command::Logout | Command::Macros { .. } => {}
    }

    if let Some(error) = ctx.error().await {
        eprintln!("Error: {}", error);
    }
    Ok(())
}

/// Load, subscribe, then print every change until Ctrl+C or the timeout.
async fn watch(ctx: &UserDataContext, session: Option<SessionData>, seconds: Option<u64>) -> Result<()> {
    require(&session)?;
    let outcome = ctx.handle_auth_change(session).await;
    print_outcome(&outcome);

    let mut last = versions(&ctx.snapshot().await);
    print_state(&ctx.snapshot().await);

    let deadline = seconds.map(|s| tokio::time::Instant::now() + Duration::from_secs(s));
    let mut ticker = tokio::time::interval(Duration::from_secs(1));

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = ticker.tick() => {
                if deadline.is_some_and(|d| tokio::time::Instant::now() >= d) {
                    break;
                }
                let state = ctx.snapshot().await;
                let current = versions(&state);
                if current != last {
                    println!("--- update at {} ---", format_date(Some(Utc::now())));
                    print_state(&state);
                    last = current;
                }
            }
        }
    }

    let torn_down = ctx.sign_out().await;
    info!(torn_down, "Watch stopped");
    Ok(())
}

fn versions(state: &State) -> [Option<u64>; 4] {
    [
        state.quiz_data.as_ref().and_then(|q| q.version),
        state.diet_plan.as_ref().and_then(|p| p.version),
        state.workout_plan.as_ref().and_then(|p| p.version),
        state.progress_data.as_ref().and_then(|p| p.version),
    ]
}

// ============================================================================
// Session Commands
// ============================================================================

fn load_session(config: &Config, user: Option<&str>) -> Result<Option<SessionData>> {
    let Some(user) = user else {
        return Ok(None);
    };
    let mut session = Session::new(config.cache_dir(Some(user))?);
    if !session.load()? {
        warn!(user, "No valid session, run `fitcache login` again");
    }
    Ok(session.data)
}

fn require(session: &Option<SessionData>) -> Result<()> {
    if session.is_none() {
        bail!("Not signed in. Run `fitcache --user <id> login --token <token>` first.");
    }
    Ok(())
}

fn login(
    config: &mut Config,
    config_path: Option<&PathBuf>,
    user: Option<String>,
    email: Option<String>,
    token: Option<String>,
) -> Result<()> {
    let Some(user) = user else {
        bail!("Pass --user <id> to sign in");
    };

    let token = match token {
        Some(token) => {
            if let Err(e) = CredentialStore::store_token(&user, &token) {
                warn!(error = %e, "Could not save token to keychain");
            }
            token
        }
        None => CredentialStore::get_token(&user)
            .context("No token given and none saved in the keychain")?,
    };

    let mut data = SessionData::new(&user, token);
    if let Some(email) = email {
        data = data.with_email(email);
    }

    let mut session = Session::new(config.cache_dir(Some(&user))?);
    session.update(data);
    session.save()?;

    config.last_user_id = Some(user.clone());
    match config_path {
        Some(path) => config.save_to(path)?,
        None => config.save()?,
    }

    println!("Signed in as {}", user);
    Ok(())
}

fn logout(config: &Config, user: Option<&str>) -> Result<()> {
    let Some(user) = user else {
        println!("Not signed in");
        return Ok(());
    };

    let mut session = Session::new(config.cache_dir(Some(user))?);
    session.clear()?;
    if CredentialStore::has_token(user) {
        CredentialStore::delete(user)?;
    }
    println!("Signed out {}", user);
    Ok(())
}

fn status(config: &Config, session: Option<&SessionData>) -> Result<()> {
    match session {
        Some(data) => {
            println!(
                "User:      {} ({})",
                data.user_id,
                format_optional(data.email.as_deref(), "no email")
            );
            println!("Session:   expires in {} min", data.minutes_until_expiry());
        }
        None => println!("User:      signed out"),
    }
    println!("Remote:    {}", config.remote_base_url);
    println!("Demo mode: {}", if config.demo_mode { "on" } else { "off" });

    let ctx = UserDataContext::from_config(config, session)?;
    let mirror = ctx.mirror();
    println!("Mirror:    last updated {}", mirror.mirror_ages().last_updated());
    match mirror.load_document() {
        Some(document) => {
            for record in document.records() {
                println!(
                    "  {:<14} v{}",
                    record.section().field_name(),
                    format_optional(record.version().map(|v| v.to_string()).as_deref(), "-")
                );
            }
        }
        None => println!("  (empty)"),
    }
    Ok(())
}

// ============================================================================
// Output
// ============================================================================

fn macros(file: &PathBuf) -> Result<()> {
    let contents = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let mut plan: DietPlan = serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse diet plan {}", file.display()))?;

    recalculate_plan(&mut plan);

    for meal in &plan.meals {
        println!("{:<20} {}", meal.name, format_macros(&meal.totals));
    }
    println!("{:<20} {}", "Daily total", format_macros(&plan.daily_totals));
    Ok(())
}

fn print_outcome(outcome: &LoadOutcome) {
    let text = match outcome {
        LoadOutcome::SignedOut => "signed out, nothing loaded".to_string(),
        LoadOutcome::Cache => "served from cache".to_string(),
        LoadOutcome::Remote => "loaded from remote".to_string(),
        LoadOutcome::LocalFallback { reason } => format!("using local copy ({:?})", reason),
        LoadOutcome::Cancelled => "cancelled".to_string(),
    };
    println!("Load: {}", text);
}

fn print_state(state: &State) {
    println!("Last sync: {}", format_date(state.last_sync));

    match &state.quiz_data {
        Some(quiz) => {
            println!("Quiz (v{}):", quiz.version.unwrap_or(0));
            println!("  Goals:  {}", quiz.goal.join(", "));
            if let Some(weight) = quiz.weight {
                println!("  Weight: {}", format_weight(Some(weight)));
            }
            if let Some(bmi) = quiz.bmi() {
                println!("  BMI:    {:.1}", bmi);
            }
        }
        None => println!("Quiz: none"),
    }

    match &state.diet_plan {
        Some(plan) => println!(
            "Diet plan (v{}): {} meals, {}",
            plan.version.unwrap_or(0),
            plan.meals.len(),
            format_macros(&plan.daily_totals)
        ),
        None => println!("Diet plan: none"),
    }

    match &state.workout_plan {
        Some(plan) => println!(
            "Workout plan (v{}): {} days, {} exercises",
            plan.version.unwrap_or(0),
            plan.days.len(),
            plan.total_exercises()
        ),
        None => println!("Workout plan: none"),
    }

    if let Some(progress) = &state.progress_data {
        println!(
            "Progress: {} | {} workouts | {} day streak",
            format_weight(progress.current_weight),
            progress.workouts_completed,
            progress.streak_days
        );
    }
}
