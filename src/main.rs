use std::{
    error::Error,
    fs::File,
    io::{self, stdin, BufRead, Write},
    ops::ControlFlow,
    path::PathBuf,
    sync::Arc,
};

use clap::{error::ErrorKind, CommandFactory, Parser, Subcommand};
use crossterm::{
    cursor::Show,
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use itertools::Itertools;
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use tracing::warn;
use webbrowser::Browser;

use surgitrack::{
    api::{load_task_detail, ApiError, HttpApi, SkillsApi},
    app::App,
    app_dirs::AppDirs,
    attempt::AttemptFlow,
    config::{Config, ConfigStore, FileConfigStore},
    export,
    guide::{coach_reply, guide_for, SUGGESTED_PROMPTS},
    logging,
    runtime::{AppEvent, CrosstermEventSource, FixedTicker, Runner},
    session::{FileTokenStore, RestoreOutcome, SessionManager},
    timer::SystemClock,
    ui,
    util::{format_secs, progress_bar, progress_percent, truncate},
};

const NOT_SIGNED_IN: &str = "You need to log in first. Run `surgitrack login`.";
const SESSION_EXPIRED: &str = "Your session has expired. Run `surgitrack login` again.";

/// time, tag and submit surgical-skills training attempts
#[derive(Parser, Debug)]
#[clap(
    version,
    about,
    long_about = "Log in, browse training tasks, time yourself performing a task, tag your errors and submit the attempt for scoring. Dashboards and leaderboards come from the same training API."
)]
pub struct Cli {
    /// base url of the training api (overrides config and SURGITRACK_API_BASE)
    #[clap(long, global = true)]
    api_base: Option<String>,

    /// log filter, e.g. `debug` or `surgitrack=trace` (RUST_LOG wins)
    #[clap(long, global = true)]
    log_level: Option<String>,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// sign in and remember the session
    Login {
        #[clap(short, long)]
        email: String,
        /// read from stdin when omitted
        #[clap(short, long)]
        password: Option<String>,
    },
    /// create an account, then sign in
    Register {
        #[clap(short, long)]
        email: String,
        #[clap(short, long)]
        password: Option<String>,
        /// full name shown on your profile
        #[clap(short, long)]
        name: Option<String>,
    },
    /// forget the stored session
    Logout,
    /// show the signed-in profile
    Whoami,
    /// list training tasks
    Tasks,
    /// show a task with its standards and the error vocabulary
    Task { slug: String },
    /// time and submit an attempt interactively
    Practice { slug: String },
    /// proficiency summary and best results per task
    Dashboard,
    /// global leaderboard
    Leaderboard {
        #[clap(short = 'n', long, default_value_t = 50)]
        limit: usize,
    },
    /// your submitted attempts
    History {
        /// write the attempts to a csv file instead of printing them
        #[clap(long)]
        csv: Option<PathBuf>,
    },
    /// technique guide for a task
    Guide {
        slug: String,
        /// open the first resource in a browser
        #[clap(long)]
        open: bool,
    },
    /// ask the technique coach a question about a task
    Coach {
        slug: String,
        question: Vec<String>,
    },
    /// show or change saved settings
    Config {
        #[clap(long)]
        set_api_base: Option<String>,
        #[clap(long)]
        set_tick_rate_ms: Option<u64>,
    },
}

/// Everything a command needs, built once per process
struct Context {
    config: Config,
    api: HttpApi,
    sessions: SessionManager<FileTokenStore>,
}

impl Context {
    fn new(config: Config) -> Result<Self, Box<dyn Error>> {
        let api = HttpApi::new(&config.api_base, config.request_timeout())?;
        let store = FileTokenStore::new(AppDirs::token_path(), AppDirs::token_fallback_path());
        Ok(Self {
            config,
            api,
            sessions: SessionManager::new(store),
        })
    }

    /// Launch-time session init
    fn restore(&mut self) -> Result<(), Box<dyn Error>> {
        if self.sessions.restore(&self.api)? == RestoreOutcome::Cleared {
            eprintln!("{SESSION_EXPIRED}");
        }
        Ok(())
    }

    fn token(&self) -> Result<String, Box<dyn Error>> {
        self.sessions
            .token()
            .map(str::to_string)
            .ok_or_else(|| NOT_SIGNED_IN.into())
    }

    /// Unwrap an API result, dropping the session if the server rejected it
    fn checked<T>(&mut self, result: Result<T, ApiError>) -> Result<T, Box<dyn Error>> {
        result.map_err(|e| {
            if self.sessions.invalidate_if_stale(&e) {
                SESSION_EXPIRED.into()
            } else {
                e.into()
            }
        })
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    let store = FileConfigStore::new();
    let mut config = store.load().with_env(|k| std::env::var(k).ok());
    if let Some(base) = &cli.api_base {
        config.api_base = base.clone();
    }
    let level = cli
        .log_level
        .clone()
        .unwrap_or_else(|| config.log_level.clone());

    if matches!(cli.command, Command::Practice { .. }) {
        if !stdin().is_tty() {
            let mut cmd = Cli::command();
            cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
        }
        logging::init_file(&level, &AppDirs::log_path())?;
    } else {
        logging::init_stderr(&level);
    }

    if let Err(e) = run(cli.command, config, &store) {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
    Ok(())
}

fn run(command: Command, config: Config, store: &FileConfigStore) -> Result<(), Box<dyn Error>> {
    match command {
        Command::Guide { slug, open } => return guide(&slug, open),
        Command::Coach { slug, question } => {
            coach(&slug, &question.join(" "));
            return Ok(());
        }
        Command::Config {
            set_api_base,
            set_tick_rate_ms,
        } => return configure(store, set_api_base, set_tick_rate_ms),
        _ => {}
    }

    let mut ctx = Context::new(config)?;
    match command {
        Command::Login { email, password } => {
            let password = password_or_prompt(password)?;
            let session = ctx.sessions.sign_in(&ctx.api, &email, &password)?;
            let name = session
                .profile
                .as_ref()
                .map_or(email.as_str(), |p| p.display_name());
            println!("Signed in as {name}");
        }
        Command::Register {
            email,
            password,
            name,
        } => {
            let password = password_or_prompt(password)?;
            ctx.sessions
                .register(&ctx.api, &email, &password, name.as_deref())?;
            println!("Account created. Signed in as {email}");
        }
        Command::Logout => {
            ctx.sessions.sign_out()?;
            println!("Signed out");
        }
        Command::Whoami => {
            ctx.restore()?;
            match ctx.sessions.profile() {
                Some(profile) => {
                    println!("{} <{}>", profile.display_name(), profile.email);
                    println!("member since {}", profile.created_at.format("%Y-%m-%d"));
                }
                None => println!("not signed in"),
            }
        }
        Command::Tasks => {
            ctx.restore()?;
            let result = ctx.api.tasks(ctx.sessions.token());
            let tasks = ctx.checked(result)?;
            for (category, group) in &tasks
                .iter()
                .sorted_by_key(|t| t.category.clone().unwrap_or_default())
                .chunk_by(|t| t.category.clone().unwrap_or_else(|| "Other".to_string()))
            {
                println!("{category}");
                for task in group {
                    println!("  {:<28} {}", task.slug, task.name);
                }
            }
        }
        Command::Task { slug } => {
            ctx.restore()?;
            let result = load_task_detail(&ctx.api, &slug, ctx.sessions.token());
            let detail = ctx.checked(result)?;
            println!("{}", detail.task.name);
            if let Some(description) = &detail.task.description {
                println!("{description}");
            }
            println!();
            println!("Standards");
            for standard in &detail.standards {
                println!(
                    "  {:<12} {} (x{} in a row)",
                    standard.level,
                    standard.summary(),
                    standard.consecutive_required
                );
            }
            println!();
            println!("Errors");
            for err in detail.error_types.iter().sorted_by_key(|e| e.severity) {
                println!("  {:<9} {}", err.severity.to_string().to_uppercase(), err.name);
            }
        }
        Command::Practice { slug } => practice(&mut ctx, &slug)?,
        Command::Dashboard => {
            ctx.restore()?;
            let token = ctx.token()?;
            let result = ctx.api.summary(&token);
            let summary = ctx.checked(result)?;
            let percent = progress_percent(summary.proficient_tasks, summary.total_tasks);
            println!(
                "Proficient tasks: {} / {}",
                summary.proficient_tasks, summary.total_tasks
            );
            println!("{} {:.0}%", progress_bar(percent, 30), percent);
            println!();
            println!("{:<32} {:>10} {:>10}", "Task", "Best time", "Best score");
            for task in &summary.task_details {
                println!(
                    "{:<32} {:>10} {:>10}",
                    truncate(&task.task_name, 32),
                    task.best_time_seconds
                        .map_or("-".to_string(), format_secs),
                    task.best_score.map_or("-".to_string(), |s| s.to_string()),
                );
            }
        }
        Command::Leaderboard { limit } => {
            ctx.restore()?;
            let result = ctx.api.leaderboard(ctx.sessions.token());
            let entries = ctx.checked(result)?;
            println!(
                "{:>3}  {:<28} {:<28} {:>5} {:>8}",
                "#", "User", "Task", "Score", "Time"
            );
            for (rank, entry) in entries.iter().take(limit).enumerate() {
                println!(
                    "{:>3}  {:<28} {:<28} {:>5} {:>8}",
                    rank + 1,
                    truncate(&entry.user_email, 28),
                    truncate(&entry.task_name, 28),
                    entry.score,
                    format_secs(entry.time_seconds)
                );
            }
        }
        Command::History { csv } => {
            ctx.restore()?;
            let token = ctx.token()?;
            let result = ctx.api.my_attempts(&token);
            let attempts = ctx.checked(result)?;
            match csv {
                Some(path) => {
                    export::write_attempts(File::create(&path)?, &attempts)?;
                    println!("Wrote {} attempt(s) to {}", attempts.len(), path.display());
                }
                None => {
                    for attempt in attempts.iter().sorted_by_key(|a| a.started_at) {
                        println!(
                            "{}  task {:<4} score {:>3}  {:>7}  {}",
                            attempt.started_at.format("%Y-%m-%d %H:%M"),
                            attempt.task_id,
                            attempt.score,
                            format_secs(attempt.time_seconds),
                            if attempt.proficiency { "proficient" } else { "" }
                        );
                    }
                }
            }
        }
        Command::Guide { .. } | Command::Coach { .. } | Command::Config { .. } => {}
    }
    Ok(())
}

fn password_or_prompt(password: Option<String>) -> Result<String, Box<dyn Error>> {
    if let Some(password) = password {
        return Ok(password);
    }
    eprint!("Password: ");
    io::stderr().flush()?;
    let mut line = String::new();
    stdin().lock().read_line(&mut line)?;
    let password = line.trim_end_matches(['\r', '\n']).to_string();
    if password.is_empty() {
        return Err("a password is required".into());
    }
    Ok(password)
}

fn guide(slug: &str, open: bool) -> Result<(), Box<dyn Error>> {
    let guide = guide_for(slug);
    println!("{}", guide.overview);
    println!();
    println!("Steps");
    for (i, step) in guide.steps.iter().enumerate() {
        println!("  {}. {step}", i + 1);
    }
    println!();
    println!("Pitfalls");
    for pitfall in guide.pitfalls {
        println!("  - {pitfall}");
    }
    if !guide.instruments.is_empty() {
        println!();
        println!("Instruments: {}", guide.instruments.join(", "));
    }
    println!();
    println!("Resources");
    for resource in guide.resources {
        println!("  {}: {}", resource.title, resource.url);
    }
    if open {
        match guide.resources.first() {
            Some(resource) if Browser::is_available() => webbrowser::open(resource.url)?,
            _ => println!("no browser available"),
        }
    }
    Ok(())
}

fn coach(slug: &str, question: &str) {
    match coach_reply(slug, question) {
        Some(reply) => println!("{reply}"),
        None => {
            println!("Ask about timing, errors, or setup, for example:");
            for prompt in SUGGESTED_PROMPTS {
                println!("  surgitrack coach {slug} \"{prompt}\"");
            }
        }
    }
}

fn configure(
    store: &FileConfigStore,
    api_base: Option<String>,
    tick_rate_ms: Option<u64>,
) -> Result<(), Box<dyn Error>> {
    let mut cfg = store.load();
    let changed = api_base.is_some() || tick_rate_ms.is_some();
    if let Some(base) = api_base {
        cfg.api_base = base;
    }
    if let Some(ms) = tick_rate_ms {
        cfg.tick_rate_ms = ms;
    }
    if changed {
        store.save(&cfg)?;
        println!("Saved {}", store.path().display());
    }
    println!("{}", serde_json::to_string_pretty(&cfg)?);
    Ok(())
}

fn practice(ctx: &mut Context, slug: &str) -> Result<(), Box<dyn Error>> {
    ctx.restore()?;
    let result = load_task_detail(&ctx.api, slug, ctx.sessions.token());
    let detail = ctx.checked(result)?;
    let task_id = detail.task.id;

    let history = match ctx.sessions.token() {
        Some(token) => match ctx.api.my_attempts(token) {
            Ok(attempts) => attempts
                .into_iter()
                .filter(|a| a.task_id == task_id)
                .sorted_by_key(|a| a.started_at)
                .collect(),
            Err(e) => {
                warn!(error = %e, "could not load attempt history");
                Vec::new()
            }
        },
        None => Vec::new(),
    };

    let flow = AttemptFlow::from_detail(detail, Arc::new(SystemClock));
    let mut app = App::new(flow, ctx.sessions.session().cloned(), history);

    with_raw_terminal(
        enable_raw_mode,
        || {
            let mut stdout = io::stdout();
            execute!(stdout, EnterAlternateScreen)?;
            let mut terminal = Terminal::new(CrosstermBackend::new(stdout))?;
            start_tui(&mut terminal, &mut app, &ctx.api, &ctx.config)
        },
        || {
            disable_raw_mode()?;
            execute!(io::stdout(), LeaveAlternateScreen, Show)
        },
    )?;

    if app.session_expired() {
        ctx.sessions.invalidate("attempt submission was unauthorized");
        eprintln!("{SESSION_EXPIRED}");
    }
    Ok(())
}

/// Run `body` between `enter` and `leave`. `leave` runs however `body`
/// ends, so a failed setup never strands the terminal in raw mode.
fn with_raw_terminal<R>(
    enter: impl FnOnce() -> io::Result<()>,
    body: impl FnOnce() -> io::Result<R>,
    leave: impl FnOnce() -> io::Result<()>,
) -> io::Result<R> {
    enter()?;
    let outcome = body();
    let restored = leave();
    let value = outcome?;
    restored?;
    Ok(value)
}

fn start_tui<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    api: &dyn SkillsApi,
    config: &Config,
) -> io::Result<()> {
    let size = terminal.size()?;
    app.set_viewport(size.width, size.height);
    terminal.draw(|f| ui::draw(app, f))?;

    let runner = Runner::new(
        CrosstermEventSource::new(),
        FixedTicker::new(config.tick_rate()),
    );
    runner.run(|event| {
        if matches!(event, AppEvent::Resize) {
            if let Ok(size) = terminal.size() {
                app.set_viewport(size.width, size.height);
            }
        }
        if app.on_event(event, api).is_break() {
            return ControlFlow::Break(Ok(()));
        }
        match terminal.draw(|f| ui::draw(app, f)) {
            Ok(_) => ControlFlow::Continue(()),
            Err(e) => ControlFlow::Break(Err(e)),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_login() {
        let cli = Cli::parse_from(["surgitrack", "login", "-e", "a@b.co", "-p", "pw"]);
        assert_eq!(
            cli.command,
            Command::Login {
                email: "a@b.co".into(),
                password: Some("pw".into()),
            }
        );
        assert_eq!(cli.api_base, None);
    }

    #[test]
    fn global_api_base_after_subcommand() {
        let cli = Cli::parse_from(["surgitrack", "tasks", "--api-base", "http://x.test"]);
        assert_eq!(cli.command, Command::Tasks);
        assert_eq!(cli.api_base.as_deref(), Some("http://x.test"));
    }

    #[test]
    fn leaderboard_defaults_to_fifty() {
        let cli = Cli::parse_from(["surgitrack", "leaderboard"]);
        assert_eq!(cli.command, Command::Leaderboard { limit: 50 });
    }

    #[test]
    fn coach_collects_question_words() {
        let cli = Cli::parse_from(["surgitrack", "coach", "palm-needle-driver", "how", "faster"]);
        assert_eq!(
            cli.command,
            Command::Coach {
                slug: "palm-needle-driver".into(),
                question: vec!["how".into(), "faster".into()],
            }
        );
    }

    #[test]
    fn terminal_is_restored_when_setup_fails() {
        let left = std::cell::Cell::new(false);
        let outcome: io::Result<()> = with_raw_terminal(
            || Ok(()),
            || Err(io::Error::other("no alternate screen")),
            || {
                left.set(true);
                Ok(())
            },
        );
        assert_eq!(outcome.unwrap_err().to_string(), "no alternate screen");
        assert!(left.get());
    }

    #[test]
    fn terminal_is_untouched_when_raw_mode_fails() {
        let ran = std::cell::Cell::new(false);
        let outcome = with_raw_terminal(
            || Err(io::Error::other("not a tty")),
            || {
                ran.set(true);
                Ok(1)
            },
            || {
                ran.set(true);
                Ok(())
            },
        );
        assert!(outcome.is_err());
        assert!(!ran.get());
    }

    #[test]
    fn practice_requires_slug() {
        let err = Cli::try_parse_from(["surgitrack", "practice"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
    }
}
