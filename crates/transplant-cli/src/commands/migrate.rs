//! `transplant migrate`: the migration run.

use tracing::info;
use transplant_config::AppConfig;
use transplant_migrate::{RunOptions, SelectionMode, run_migration};

use crate::cli::OutputFormat;
use crate::client::{
    CliError, CliResult, connect_destination, connect_source, migration_settings, selection_mode,
};
use crate::output::render_summary;

pub(crate) async fn handle_migrate(config: &AppConfig, format: OutputFormat) -> CliResult<()> {
    let request_timeout = config.migration.request_timeout;
    let source = connect_source(&config.deluge, request_timeout).await?;
    let (destination, mut guard) =
        connect_destination(&config.qbittorrent, request_timeout).await?;

    let options = RunOptions {
        selection: selection_mode(&config.migration),
        settings: migration_settings(&config.migration),
    };
    if let SelectionMode::TestOnly { name } = &options.selection {
        info!(test_torrent = %name, "test mode: only this torrent will be migrated");
    }
    info!(
        transfer = options.settings.transfer.as_str(),
        auto_delete = options.settings.auto_delete,
        auto_resume = options.settings.auto_resume,
        "starting migration"
    );

    let summary = run_migration(&source, &destination, &mut guard, &options)
        .await
        .map_err(CliError::failure)?;
    render_summary(&summary, format)
}
