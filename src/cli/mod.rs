pub mod dashboard;
pub mod session;
pub mod settings;

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use dashboard::{process_run_command, RunCommand};
use session::{process_session_command, SessionCommand};
use settings::{process_settings_command, SettingsCommand};
use tracing::level_filters::LevelFilter;

use crate::{
    storage::{
        preferences::{FilePreferences, Preferences},
        session_log::FileSessionLog,
    },
    utils::{
        dir::{create_application_default_path, create_application_path},
        logging::{enable_logging, CLI_PREFIX, DASHBOARD_PREFIX},
    },
};

const SESSION_LOG_FILE: &str = "sessions.jsonl";
const PREFERENCES_DIR: &str = "preferences";

#[derive(Parser, Debug)]
#[command(name = "attention-please", version, long_about = None)]
#[command(about = "Focus sessions with distraction detection, pomodoro and eye-care timers")]
struct Args {
    #[command(subcommand)]
    commands: Commands,
    #[arg(
        long,
        global = true,
        help = "Application directory. By default tries to save into $XDG_STATE_HOME or $HOME/.local/state"
    )]
    dir: Option<PathBuf>,
    #[arg(long, global = true, help = "Log level, overrides RUST_LOG")]
    log_filter: Option<LevelFilter>,
    #[arg(long, global = true, help = "Also print logs to the console")]
    log_console: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(about = "Start, end and inspect focus sessions")]
    Session {
        #[command(subcommand)]
        command: SessionCommand,
    },
    #[command(about = "Show or change timer, eye care and sound settings")]
    Settings {
        #[command(subcommand)]
        command: SettingsCommand,
    },
    #[command(
        about = "Run the interactive dashboard. Every line typed counts as keyboard activity"
    )]
    Run {
        #[command(flatten)]
        command: RunCommand,
    },
}

pub async fn run_cli() -> Result<()> {
    let args = Args::parse();

    let dir = match args.dir {
        Some(dir) => create_application_path(dir)?,
        None => create_application_default_path()?,
    };
    let prefix = match args.commands {
        Commands::Run { .. } => DASHBOARD_PREFIX,
        _ => CLI_PREFIX,
    };
    enable_logging(prefix, &dir, args.log_filter, args.log_console)?;

    match args.commands {
        Commands::Session { command } => {
            process_session_command(command, session_log(&dir)?).await
        }
        Commands::Settings { command } => {
            process_settings_command(command, &preferences(&dir)?).await
        }
        Commands::Run { command } => {
            process_run_command(command, session_log(&dir)?, preferences(&dir)?).await
        }
    }
}

fn session_log(dir: &Path) -> Result<FileSessionLog> {
    Ok(FileSessionLog::new(dir.join(SESSION_LOG_FILE))?)
}

fn preferences(dir: &Path) -> Result<Preferences<FilePreferences>> {
    Ok(Preferences::new(FilePreferences::new(
        dir.join(PREFERENCES_DIR),
    )?))
}
