use std::time::Duration;

use transplant_migrate::{
    FailureReason, MigrationOutcome, MigrationSettings, PollPolicy, RunOptions, RunStatus,
    SelectionMode, SessionFreshnessGuard, run_migration,
};
use transplant_test_support::fixtures::descriptor;
use transplant_test_support::mocks::{DestinationCall, FakeDestination, FakeSource, Payload};
use transplant_torrent_core::{Credentials, DestinationState, Progress, TorrentDescriptor};

fn settings(auto_delete: bool, auto_resume: bool) -> MigrationSettings {
    MigrationSettings {
        auto_delete,
        auto_resume,
        metadata_wait: PollPolicy::new(Duration::from_millis(1), Duration::from_millis(50)),
        recheck_wait: PollPolicy::new(Duration::from_millis(1), Duration::from_millis(200)),
        ..MigrationSettings::default()
    }
}

fn options(selection: SelectionMode, auto_delete: bool, auto_resume: bool) -> RunOptions {
    RunOptions {
        selection,
        settings: settings(auto_delete, auto_resume),
    }
}

async fn guard(destination: &FakeDestination) -> anyhow::Result<SessionFreshnessGuard> {
    Ok(SessionFreshnessGuard::establish(destination, Credentials::new("admin", "secret")).await?)
}

fn stage(destination: &FakeDestination, torrent: &TorrentDescriptor) {
    let paths: Vec<&str> = torrent.files.iter().map(|file| file.path.as_str()).collect();
    destination.stage_payload(&torrent.id, Payload::new(&torrent.name, &paths));
}

#[tokio::test]
async fn second_run_adds_nothing() -> anyhow::Result<()> {
    let torrents = [
        descriptor("a1", "Alpha", &["alpha.mkv"]),
        descriptor("b2", "Beta", &["Beta/1.mkv", "Beta/2.mkv"]),
    ];
    let source = FakeSource::with_torrents(torrents.clone());
    let destination = FakeDestination::default();
    for torrent in &torrents {
        stage(&destination, torrent);
    }
    let mut guard = guard(&destination).await?;
    let options = options(SelectionMode::All, false, false);

    let first = run_migration(&source, &destination, &mut guard, &options).await?;
    assert_eq!(first.finalized(), 2);
    let adds_after_first = destination.added().len();

    let second = run_migration(&source, &destination, &mut guard, &options).await?;
    assert_eq!(second.skipped(), 2);
    assert_eq!(destination.added().len(), adds_after_first);
    Ok(())
}

#[tokio::test]
async fn layout_mismatch_removes_destination_entry() -> anyhow::Result<()> {
    let torrent = descriptor("c3", "H2", &["H2/a", "H2/b", "H2/c"]);
    let source = FakeSource::with_torrents([torrent.clone()]);
    let destination = FakeDestination::default();
    destination.stage_payload(&torrent.id, Payload::new("H2", &["H2/a", "H2/b"]));
    let mut guard = guard(&destination).await?;

    let summary = run_migration(
        &source,
        &destination,
        &mut guard,
        &options(SelectionMode::All, true, true),
    )
    .await?;

    assert_eq!(
        summary.reports[0].outcome,
        MigrationOutcome::Failed(FailureReason::LayoutMismatch {
            source_files: 3,
            destination_files: 2,
        })
    );
    assert!(!destination.contains(&torrent.id));
    assert!(destination.calls().contains(&DestinationCall::Delete {
        id: torrent.id.clone(),
        delete_data: false,
    }));
    assert!(source.contains(&torrent.id));
    assert_eq!(source.is_paused(&torrent.id), Some(true));
    Ok(())
}

#[tokio::test]
async fn tolerance_boundary_is_exclusive() -> anyhow::Result<()> {
    let mut exact = descriptor("d4", "Exact", &["exact.bin"]);
    exact.progress = Progress::from_percent(50.0);
    let mut close = descriptor("e5", "Close", &["close.bin"]);
    close.progress = Progress::from_percent(50.0);

    let source = FakeSource::with_torrents([exact.clone(), close.clone()]);
    let destination = FakeDestination::default();
    destination.stage_payload(
        &exact.id,
        Payload::new("Exact", &["exact.bin"]).with_progress(Progress::from_percent(49.0)),
    );
    destination.stage_payload(
        &close.id,
        Payload::new("Close", &["close.bin"]).with_progress(Progress::from_percent(49.5)),
    );
    let mut guard = guard(&destination).await?;

    let summary = run_migration(
        &source,
        &destination,
        &mut guard,
        &options(SelectionMode::All, true, false),
    )
    .await?;

    let outcome_of = |name: &str| {
        summary
            .reports
            .iter()
            .find(|report| report.name == name)
            .map(|report| report.outcome.clone())
    };
    assert_eq!(outcome_of("Exact"), Some(MigrationOutcome::Mismatch { diff: 1.0 }));
    assert!(matches!(
        outcome_of("Close"),
        Some(MigrationOutcome::Finalized { .. })
    ));
    // Mismatched torrents stay at the source even with auto-delete.
    assert!(source.contains(&exact.id));
    assert!(!source.contains(&close.id));
    Ok(())
}

#[tokio::test]
async fn test_mode_migrates_only_the_named_torrent() -> anyhow::Result<()> {
    let torrents = [
        descriptor("a1", "A", &["a"]),
        descriptor("b2", "B", &["b"]),
        descriptor("c3", "C", &["c"]),
    ];
    let source = FakeSource::with_torrents(torrents.clone());
    let destination = FakeDestination::default();
    for torrent in &torrents {
        stage(&destination, torrent);
    }
    let mut guard = guard(&destination).await?;

    let selection = SelectionMode::TestOnly { name: "B".into() };
    let summary =
        run_migration(&source, &destination, &mut guard, &options(selection, false, false))
            .await?;

    assert_eq!(summary.status, RunStatus::Completed);
    assert_eq!(summary.reports.len(), 1);
    assert_eq!(summary.reports[0].name, "B");
    assert_eq!(destination.added().len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_mode_without_match_ends_quietly() -> anyhow::Result<()> {
    let source = FakeSource::with_torrents([
        descriptor("a1", "A", &["a"]),
        descriptor("b2", "B", &["b"]),
    ]);
    let destination = FakeDestination::default();
    let mut guard = guard(&destination).await?;

    let selection = SelectionMode::TestOnly { name: "Z".into() };
    let summary =
        run_migration(&source, &destination, &mut guard, &options(selection, false, false))
            .await?;

    assert_eq!(summary.status, RunStatus::NoTestMatch { name: "Z".into() });
    assert!(summary.reports.is_empty());
    assert!(destination.added().is_empty());
    assert_eq!(source.is_paused(&descriptor("a1", "A", &[]).id), Some(false));
    Ok(())
}

#[tokio::test]
async fn auto_delete_gates_source_removal() -> anyhow::Result<()> {
    for auto_delete in [false, true] {
        let torrent = descriptor("f6", "Gated", &["gated.iso"]);
        let source = FakeSource::with_torrents([torrent.clone()]);
        let destination = FakeDestination::default();
        stage(&destination, &torrent);
        let mut guard = guard(&destination).await?;

        let summary = run_migration(
            &source,
            &destination,
            &mut guard,
            &options(SelectionMode::All, auto_delete, false),
        )
        .await?;

        assert_eq!(summary.finalized(), 1);
        assert_eq!(source.contains(&torrent.id), !auto_delete);
    }
    Ok(())
}

#[tokio::test]
async fn complete_torrent_lands_resumed_with_layout_and_category() -> anyhow::Result<()> {
    let mut torrent = descriptor(
        "H1H1",
        "Holiday Photos",
        &["Holiday Photos/day1.jpg", "Holiday Photos/day2.jpg", "Holiday Photos/notes.txt"],
    );
    torrent.label = Some("photos".into());
    let source = FakeSource::with_torrents([torrent.clone()]);
    let destination = FakeDestination::default();
    destination.stage_payload(
        &torrent.id,
        Payload::new(
            "Holiday Photos",
            &["Holiday Photos/IMG_001.jpg", "Holiday Photos/IMG_002.jpg", "Holiday Photos/notes.txt"],
        )
        .with_checking_polls(3),
    );
    let mut guard = guard(&destination).await?;

    let summary = run_migration(
        &source,
        &destination,
        &mut guard,
        &options(SelectionMode::All, true, true),
    )
    .await?;

    assert_eq!(summary.finalized(), 1);
    let handle = destination
        .get(&torrent.id)
        .ok_or_else(|| anyhow::anyhow!("torrent missing at destination"))?;
    assert_eq!(handle.state, DestinationState::Seeding);
    assert_eq!(handle.category, "photos");
    assert_eq!(handle.save_path, torrent.save_path);
    let names: Vec<String> = destination
        .files_of(&torrent.id)
        .into_iter()
        .map(|file| file.name)
        .collect();
    let expected: Vec<String> = torrent.files.iter().map(|file| file.path.clone()).collect();
    assert_eq!(names, expected);
    assert!(!source.contains(&torrent.id));

    let request = &destination.added()[0];
    assert!(request.start_paused);
    assert!(!request.auto_managed);
    Ok(())
}

#[tokio::test]
async fn failures_do_not_stop_the_loop() -> anyhow::Result<()> {
    let rejected = descriptor("a0", "Rejected", &["r"]);
    let healthy = descriptor("b0", "Healthy", &["h"]);
    let source = FakeSource::with_torrents([rejected.clone(), healthy.clone()]);
    let destination = FakeDestination::default();
    stage(&destination, &healthy);
    source.drop_metainfo(&rejected.id);
    let mut guard = guard(&destination).await?;

    let summary = run_migration(
        &source,
        &destination,
        &mut guard,
        &options(SelectionMode::All, false, false),
    )
    .await?;

    assert_eq!(summary.failed(), 1);
    assert_eq!(summary.finalized(), 1);
    Ok(())
}

#[tokio::test]
async fn lost_source_connection_aborts_the_run() -> anyhow::Result<()> {
    let torrent = descriptor("a9", "Doomed", &["d"]);
    let source = FakeSource::with_torrents([torrent]);
    let destination = FakeDestination::default();
    let mut guard = guard(&destination).await?;
    source.go_offline();

    let result = run_migration(
        &source,
        &destination,
        &mut guard,
        &options(SelectionMode::All, false, false),
    )
    .await;
    assert!(result.is_err());
    Ok(())
}
