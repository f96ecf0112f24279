//! Output renderers for run summaries and surveys.

use anyhow::anyhow;
use serde::Serialize;
use transplant_migrate::{RunStatus, RunSummary, Survey};

use crate::cli::OutputFormat;
use crate::client::{CliError, CliResult};

#[derive(Serialize)]
struct SummaryView<'a> {
    run_id: String,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    test_torrent: Option<&'a str>,
    source_count: usize,
    destination_count: usize,
    finalized: usize,
    mismatched: usize,
    skipped: usize,
    failed: usize,
    torrents: Vec<ReportView<'a>>,
}

#[derive(Serialize)]
struct ReportView<'a> {
    id: &'a str,
    name: &'a str,
    outcome: &'static str,
    detail: String,
}

#[derive(Serialize)]
struct SurveyEntryView<'a> {
    id: &'a str,
    name: &'a str,
    progress: f64,
    files: usize,
    present: bool,
}

pub(crate) fn render_summary(summary: &RunSummary, format: OutputFormat) -> CliResult<()> {
    let text = match format {
        OutputFormat::Json => to_json(&summary_view(summary))?,
        OutputFormat::Table => summary_table(summary),
    };
    println!("{text}");
    Ok(())
}

pub(crate) fn render_survey(survey: &Survey, format: OutputFormat) -> CliResult<()> {
    let text = match format {
        OutputFormat::Json => {
            let entries: Vec<SurveyEntryView<'_>> = survey
                .entries()
                .into_iter()
                .map(|(descriptor, present)| SurveyEntryView {
                    id: descriptor.id.as_str(),
                    name: &descriptor.name,
                    progress: descriptor.progress.as_percent(),
                    files: descriptor.files.len(),
                    present,
                })
                .collect();
            to_json(&entries)?
        }
        OutputFormat::Table => survey_table(survey),
    };
    println!("{text}");
    Ok(())
}

fn to_json(value: &impl Serialize) -> CliResult<String> {
    serde_json::to_string_pretty(value)
        .map_err(|err| CliError::failure(anyhow!("failed to format JSON: {err}")))
}

fn summary_view(summary: &RunSummary) -> SummaryView<'_> {
    let (status, test_torrent) = match &summary.status {
        RunStatus::Completed => ("completed", None),
        RunStatus::NoTestMatch { name } => ("no_test_match", Some(name.as_str())),
    };
    SummaryView {
        run_id: summary.run_id.to_string(),
        status,
        test_torrent,
        source_count: summary.source_count,
        destination_count: summary.destination_count,
        finalized: summary.finalized(),
        mismatched: summary.mismatched(),
        skipped: summary.skipped(),
        failed: summary.failed(),
        torrents: summary
            .reports
            .iter()
            .map(|report| ReportView {
                id: report.id.as_str(),
                name: &report.name,
                outcome: report.outcome.label(),
                detail: report.outcome.to_string(),
            })
            .collect(),
    }
}

fn summary_table(summary: &RunSummary) -> String {
    let mut lines = Vec::new();
    if let RunStatus::NoTestMatch { name } = &summary.status {
        lines.push(format!("test torrent '{name}' not found at source; nothing migrated"));
    }
    if !summary.reports.is_empty() {
        lines.push(format!("{:<40} {:<10} NAME / DETAIL", "ID", "OUTCOME"));
        for report in &summary.reports {
            lines.push(format!(
                "{:<40} {:<10} {}",
                report.id,
                report.outcome.label(),
                report.name
            ));
            lines.push(format!("{:<40} {:<10} {}", "", "", report.outcome));
        }
    }
    lines.push(format!(
        "source: {}  destination: {}  finalized: {}  mismatched: {}  skipped: {}  failed: {}",
        summary.source_count,
        summary.destination_count,
        summary.finalized(),
        summary.mismatched(),
        summary.skipped(),
        summary.failed()
    ));
    lines.join("\n")
}

fn survey_table(survey: &Survey) -> String {
    let entries = survey.entries();
    if entries.is_empty() {
        return format!(
            "no torrents selected (source: {}, destination: {})",
            survey.source_count, survey.destination_count
        );
    }
    let mut lines = vec![format!("{:<40} {:>7} {:<8} NAME", "ID", "PROG", "PRESENT")];
    for (descriptor, present) in &entries {
        lines.push(format!(
            "{:<40} {:>7} {:<8} {}",
            descriptor.id,
            format!("{:.1}%", descriptor.progress.as_percent()),
            if *present { "yes" } else { "no" },
            descriptor.name
        ));
    }
    let pending = entries.iter().filter(|(_, present)| !present).count();
    lines.push(format!(
        "{} selected, {pending} still to migrate",
        entries.len()
    ));
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use transplant_migrate::{FailureReason, MigrationOutcome, Selection, TorrentReport};
    use transplant_torrent_core::{Progress, TorrentDescriptor, TorrentId};
    use uuid::Uuid;

    fn descriptor(id: &str, name: &str) -> TorrentDescriptor {
        TorrentDescriptor {
            id: TorrentId::new(id),
            name: name.into(),
            save_path: "/data".into(),
            label: None,
            paused: false,
            progress: Progress::COMPLETE,
            files: Vec::new(),
            trackers: Vec::new(),
        }
    }

    fn summary() -> RunSummary {
        RunSummary {
            run_id: Uuid::nil(),
            status: RunStatus::Completed,
            source_count: 3,
            destination_count: 1,
            reports: vec![
                TorrentReport {
                    id: TorrentId::new("aa"),
                    name: "Alpha".into(),
                    outcome: MigrationOutcome::Finalized {
                        destination_progress: Progress::COMPLETE,
                    },
                },
                TorrentReport {
                    id: TorrentId::new("bb"),
                    name: "Beta".into(),
                    outcome: MigrationOutcome::Failed(FailureReason::AddRejected {
                        detail: "Fails.".into(),
                    }),
                },
            ],
        }
    }

    #[test]
    fn summary_table_lists_outcomes_and_counts() {
        let table = summary_table(&summary());
        assert!(table.contains("Alpha"));
        assert!(table.contains("failed: destination rejected the torrent: Fails."));
        assert!(table.ends_with("finalized: 1  mismatched: 0  skipped: 0  failed: 1"));
    }

    #[test]
    fn summary_json_carries_counts() {
        let value = serde_json::to_value(summary_view(&summary())).expect("json");
        assert_eq!(value["status"], "completed");
        assert_eq!(value["failed"], 1);
        assert_eq!(value["torrents"][1]["outcome"], "failed");
        assert!(value.get("test_torrent").is_none());
    }

    #[test]
    fn missing_test_torrent_is_explained() {
        let summary = RunSummary {
            status: RunStatus::NoTestMatch {
                name: "Gamma".into(),
            },
            reports: Vec::new(),
            ..summary()
        };
        assert!(summary_table(&summary).starts_with("test torrent 'Gamma' not found"));
        let value = serde_json::to_value(summary_view(&summary)).expect("json");
        assert_eq!(value["test_torrent"], "Gamma");
    }

    #[test]
    fn survey_table_marks_presence() {
        let survey = Survey {
            selection: Selection::Torrents(vec![descriptor("aa", "Alpha"), descriptor("bb", "Beta")]),
            present: HashSet::from([TorrentId::new("aa")]),
            source_count: 2,
            destination_count: 1,
        };
        let table = survey_table(&survey);
        assert!(table.contains("yes      Alpha"));
        assert!(table.contains("no       Beta"));
        assert!(table.ends_with("2 selected, 1 still to migrate"));
    }
}
