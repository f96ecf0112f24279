//! Descriptor builders and raw source records.

use serde_json::{Value, json};
use transplant_torrent_core::{FilePriority, Progress, TorrentDescriptor, TorrentFile, TorrentId};

/// Save path used by every fixture descriptor.
pub const SAVE_PATH: &str = "/srv/torrents/complete";

/// Build a complete, running descriptor whose files use normal priority.
#[must_use]
pub fn descriptor(id: &str, name: &str, files: &[&str]) -> TorrentDescriptor {
    TorrentDescriptor {
        id: TorrentId::new(id),
        name: name.to_string(),
        save_path: SAVE_PATH.to_string(),
        label: None,
        paused: false,
        progress: Progress::COMPLETE,
        files: files
            .iter()
            .zip(0_u32..)
            .map(|(path, index)| TorrentFile {
                index,
                path: (*path).to_string(),
                priority: FilePriority::Normal,
            })
            .collect(),
        trackers: vec!["udp://tracker.example:1337/announce".to_string()],
    }
}

/// Render a descriptor the way the source daemon reports a status record.
///
/// Progress is emitted as a percentage and priorities as a list indexed by
/// file index.
#[must_use]
pub fn source_record(descriptor: &TorrentDescriptor) -> Value {
    let slots = descriptor
        .files
        .iter()
        .map(|file| file.index as usize + 1)
        .max()
        .unwrap_or(0);
    let mut priorities = vec![1_u8; slots];
    for file in &descriptor.files {
        priorities[file.index as usize] = if file.priority == FilePriority::Skip { 0 } else { 4 };
    }

    let files: Vec<Value> = descriptor
        .files
        .iter()
        .map(|file| json!({ "index": file.index, "path": file.path, "size": 0, "offset": 0 }))
        .collect();
    let trackers: Vec<Value> = descriptor
        .trackers
        .iter()
        .zip(0_u32..)
        .map(|(url, tier)| json!({ "url": url, "tier": tier }))
        .collect();

    json!({
        "name": descriptor.name,
        "save_path": descriptor.save_path,
        "label": descriptor.label.clone().unwrap_or_default(),
        "paused": descriptor.paused,
        "state": if descriptor.paused { "Paused" } else { "Seeding" },
        "progress": descriptor.progress.as_percent(),
        "files": files,
        "file_priorities": priorities,
        "trackers": trackers,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_carries_percent_progress_and_priorities() {
        let mut fixture = descriptor("AA", "demo", &["a.mkv", "b.nfo"]);
        fixture.files[1].priority = FilePriority::Skip;
        fixture.progress = Progress::from_percent(42.5);

        let record = source_record(&fixture);
        assert_eq!(record["progress"], json!(42.5));
        assert_eq!(record["file_priorities"], json!([4, 0]));
        assert_eq!(record["files"][1]["path"], json!("b.nfo"));
        assert_eq!(record["trackers"][0]["tier"], json!(0));
    }
}
