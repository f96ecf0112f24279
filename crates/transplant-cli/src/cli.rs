//! Argument parsing and command dispatch.

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand, ValueEnum};
use transplant_config::{AppConfig, ConfigOverrides, DEFAULT_CONFIG_PATH, load_config};
use transplant_telemetry::{LogFormat, LoggingConfig, TelemetryError, init_logging};
use transplant_torrent_core::TransferStrategy;

use crate::client::{CliError, CliResult};
use crate::commands::migrate::handle_migrate;
use crate::commands::status::handle_status;

/// Parses CLI arguments, executes the requested command, and reports errors.
/// Returns the process exit code.
pub async fn run() -> i32 {
    let cli = Cli::parse();
    match execute(cli).await {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("error: {}", err.display_message());
            err.exit_code()
        }
    }
}

async fn execute(cli: Cli) -> CliResult<()> {
    let command = cli.command.unwrap_or_default();
    let overrides = command.overrides(cli.log_level, cli.log_format);
    let config = load_settings(&cli.config, overrides)?;

    init_logging(&LoggingConfig {
        level: &config.logging.level,
        format: config.logging.format,
    })
    .map_err(|err| match err {
        TelemetryError::SubscriberInstall { .. } => CliError::failure(err),
        other => CliError::validation(other.to_string()),
    })?;

    match command {
        Command::Migrate(_) => handle_migrate(&config, cli.output).await,
        Command::Status => handle_status(&config, cli.output).await,
    }
}

fn load_settings(path: &Path, overrides: ConfigOverrides) -> CliResult<AppConfig> {
    load_config(path)
        .and_then(|config| config.with_overrides(overrides))
        .map_err(|err| CliError::validation(err.to_string()))
}

#[derive(Parser, Debug)]
#[command(
    name = "transplant",
    version,
    about = "Migrate torrents from Deluge to qBittorrent without re-downloading"
)]
pub(crate) struct Cli {
    #[arg(
        long,
        short = 'c',
        global = true,
        env = "TRANSPLANT_CONFIG",
        default_value = DEFAULT_CONFIG_PATH
    )]
    config: PathBuf,
    #[arg(long, global = true, help = "Log level or filter directive; RUST_LOG wins when set")]
    log_level: Option<String>,
    #[arg(long, global = true, value_parser = parse_log_format)]
    log_format: Option<LogFormat>,
    #[arg(
        long = "output",
        global = true,
        value_enum,
        default_value_t = OutputFormat::Table,
        help = "Select output format for the run summary or status listing"
    )]
    output: OutputFormat,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub(crate) enum Command {
    /// Migrate torrents (default).
    Migrate(MigrateArgs),
    /// Show which source torrents are already present at the destination.
    Status,
}

impl Default for Command {
    fn default() -> Self {
        Self::Migrate(MigrateArgs::default())
    }
}

impl Command {
    fn overrides(&self, log_level: Option<String>, log_format: Option<LogFormat>) -> ConfigOverrides {
        let base = ConfigOverrides {
            log_level,
            log_format,
            ..ConfigOverrides::default()
        };
        match self {
            Self::Migrate(args) => ConfigOverrides {
                test_torrent: args.test_torrent.clone(),
                auto_delete: args.auto_delete,
                auto_resume: args.auto_resume,
                transfer: args.transfer,
                ..base
            },
            Self::Status => base,
        }
    }
}

#[derive(Args, Debug, Default, PartialEq, Eq)]
pub(crate) struct MigrateArgs {
    /// Migrate only the torrent with this exact name.
    #[arg(long)]
    test_torrent: Option<String>,
    /// Remove verified torrents from Deluge (payload is kept).
    #[arg(long)]
    auto_delete: bool,
    /// Start verified torrents in qBittorrent.
    #[arg(long)]
    auto_resume: bool,
    /// How torrents are handed over.
    #[arg(long, value_parser = parse_transfer)]
    transfer: Option<TransferStrategy>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Table,
    Json,
}

fn parse_log_format(input: &str) -> Result<LogFormat, String> {
    input
        .parse::<LogFormat>()
        .map_err(|err| err.to_string())
}

fn parse_transfer(input: &str) -> Result<TransferStrategy, String> {
    match input.trim().to_ascii_lowercase().as_str() {
        "metainfo" => Ok(TransferStrategy::Metainfo),
        "magnet" => Ok(TransferStrategy::Magnet),
        _ => Err(format!(
            "unknown transfer strategy '{input}' (expected metainfo or magnet)"
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn bare_invocation_migrates_with_defaults() {
        let cli = Cli::try_parse_from(["transplant", "--config", "custom.toml"]).expect("parse");
        assert_eq!(cli.config, PathBuf::from("custom.toml"));
        assert_eq!(cli.output, OutputFormat::Table);
        assert_eq!(cli.command.unwrap_or_default(), Command::default());
    }

    #[test]
    fn migrate_flags_become_overrides() {
        let cli = Cli::try_parse_from([
            "transplant",
            "migrate",
            "--test-torrent",
            "Ubuntu ISO",
            "--auto-delete",
            "--transfer",
            "magnet",
            "--log-format",
            "json",
        ])
        .expect("parse");
        let command = cli.command.unwrap_or_default();
        let overrides = command.overrides(cli.log_level, cli.log_format);
        assert_eq!(overrides.test_torrent.as_deref(), Some("Ubuntu ISO"));
        assert!(overrides.auto_delete);
        assert!(!overrides.auto_resume);
        assert_eq!(overrides.transfer, Some(TransferStrategy::Magnet));
        assert_eq!(overrides.log_format, Some(LogFormat::Json));
    }

    #[test]
    fn unknown_transfer_is_rejected_by_the_parser() {
        let result = Cli::try_parse_from(["transplant", "migrate", "--transfer", "ftp"]);
        assert!(result.is_err());
    }

    #[test]
    fn status_ignores_migration_overrides() {
        let cli = Cli::try_parse_from(["transplant", "status", "--log-level", "debug"])
            .expect("parse");
        let command = cli.command.unwrap_or_default();
        assert_eq!(command, Command::Status);
        let overrides = command.overrides(cli.log_level, cli.log_format);
        assert_eq!(overrides.log_level.as_deref(), Some("debug"));
        assert!(overrides.test_torrent.is_none());
    }

    #[tokio::test]
    async fn missing_config_is_a_validation_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        let cli = Cli::try_parse_from(["transplant", "--config", path.to_str().expect("utf8")])
            .expect("parse");
        let error = execute(cli).await.expect_err("config is absent");
        assert_eq!(error.exit_code(), 2);
        assert!(error.display_message().contains("config.example.toml"));
    }

    #[tokio::test]
    async fn invalid_config_is_a_validation_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        fs::write(&path, "[deluge]\nurl = \"http://127.0.0.1:8112\"\npassword = \"x\"\n")
            .expect("write");
        let cli = Cli::try_parse_from(["transplant", "status", "-c", path.to_str().expect("utf8")])
            .expect("parse");
        let error = execute(cli).await.expect_err("sections missing");
        assert_eq!(error.exit_code(), 2);
        assert_eq!(
            error.display_message(),
            "missing required section 'qbittorrent'"
        );
    }
}
