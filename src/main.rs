use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use joke_meter::db::{self, SummaryKind};
use joke_meter::{Config, Daemon, SessionStore, SqliteStore};

/// Joke Meter - scores a Twitch broadcast from `+2` / `-2` chat reactions
#[derive(Parser)]
#[command(name = "joke-meter", version, about)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Directory holding the database
    #[arg(long, env = "JOKE_METER_DATA_DIR")]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Recompute a session's summary from its reaction log
    Replay {
        /// Session (stream) ID
        session_id: String,
    },
    /// Show the stored summaries of a session
    Show {
        /// Session (stream) ID
        session_id: String,
    },
    /// List recorded sessions, newest first
    Sessions,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Missing .env is fine
    dotenv::dotenv().ok();

    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,joke_meter=info",
        1 => "info,joke_meter=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::load(cli.data_dir)?;

    if let Some(cmd) = cli.command {
        let store = open_store(&config)?;
        return match cmd {
            Command::Replay { session_id } => cmd_replay(&store, &session_id),
            Command::Show { session_id } => cmd_show(&store, &session_id),
            Command::Sessions => cmd_sessions(&store),
        };
    }

    tracing::info!(
        data_dir = %config.data_dir.display(),
        channel = ?config.twitch.channel,
        "starting joke meter"
    );

    let daemon = Daemon::new(config)?;
    daemon.run().await?;

    Ok(())
}

fn open_store(config: &Config) -> anyhow::Result<SqliteStore> {
    let pool = db::init(config.db_path())?;
    Ok(SqliteStore::new(pool))
}

fn cmd_replay(store: &SqliteStore, session_id: &str) -> anyhow::Result<()> {
    let report = joke_meter::replay(store, session_id)?;
    println!("{}", serde_json::to_string_pretty(&report.summary)?);
    Ok(())
}

fn cmd_show(store: &SqliteStore, session_id: &str) -> anyhow::Result<()> {
    let session = store
        .load_session(session_id)?
        .ok_or_else(|| anyhow::anyhow!("session {session_id} not found"))?;

    let live = store.load_summary(session_id, SummaryKind::Live)?;
    let replay = store.load_summary(session_id, SummaryKind::Replay)?;

    let output = serde_json::json!({
        "session": session,
        "live": live,
        "replay": replay,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn cmd_sessions(store: &SqliteStore) -> anyhow::Result<()> {
    let sessions = store.list_sessions()?;

    if sessions.is_empty() {
        println!("No sessions recorded");
        return Ok(());
    }

    for session in sessions {
        let status = serde_json::to_value(session.status)?;
        println!(
            "{}  {}  {:<6}  {}",
            session.id,
            session.started_at.format("%Y-%m-%d %H:%M"),
            status.as_str().unwrap_or("-"),
            session.title.as_deref().unwrap_or(""),
        );
    }
    Ok(())
}
