use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use journal::cipher::PasswordCipher;
use journal::config::JournalSettings;
use journal_tool::commands;
use journal_tool::reports::to_json;
use serde::Serialize;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "journal-tool")]
#[command(about = "Inspect, verify and dry-run replay repository management journals")]
#[command(version = journal_tool::VERSION)]
struct Cli {
    /// Journal settings file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Repository home directory (used when no config file is given)
    #[arg(long, global = true)]
    home: Option<PathBuf>,

    /// Password cipher key, overriding the settings
    #[arg(long, global = true, env = "JOURNAL_CIPHER_KEY", hide_env_values = true)]
    cipher_key: Option<String>,

    /// Log filter when RUST_LOG is unset
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Print reports as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the entries of one journal file
    Inspect {
        /// Journal file
        file: PathBuf,
    },
    /// Structurally validate the journal directory
    Verify,
    /// Replay the journal directory
    Replay {
        /// Dispatch to a recording delegate instead of a repository
        #[arg(long)]
        dry_run: bool,
    },
}

impl Cli {
    fn settings(&self) -> Result<JournalSettings> {
        let mut settings = match (&self.config, &self.home) {
            (Some(path), _) => JournalSettings::load(path)
                .with_context(|| format!("loading {}", path.display()))?,
            (None, Some(home)) => JournalSettings::new(home),
            (None, None) => anyhow::bail!("either --config or --home is required"),
        };
        if let Some(key) = &self.cipher_key {
            settings.cipher_key = Some(key.clone());
        }
        Ok(settings)
    }

    fn cipher(&self) -> Result<PasswordCipher> {
        if let Some(key) = &self.cipher_key {
            return Ok(PasswordCipher::new(key));
        }
        match (&self.config, &self.home) {
            (None, None) => Ok(PasswordCipher::plain()),
            _ => Ok(self.settings()?.cipher()),
        }
    }
}

fn print_report<T: Serialize>(report: &T, json: bool, text: impl FnOnce(&T) -> String) -> Result<()> {
    if json {
        println!("{}", to_json(report)?);
    } else {
        print!("{}", text(report));
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match &cli.command {
        Command::Inspect { file } => {
            let report = commands::inspect(file, cli.cipher()?)?;
            print_report(&report, cli.json, |r| r.render_text())
        }
        Command::Verify => {
            let report = commands::verify(cli.settings()?.reader_config())?;
            print_report(&report, cli.json, |r| r.render_text())
        }
        Command::Replay { dry_run } => {
            let report = if *dry_run {
                commands::dry_run(cli.settings()?.reader_config())?
            } else {
                commands::live_replay_unsupported()?
            };
            print_report(&report, cli.json, |r| r.render_text())
        }
    }
}
