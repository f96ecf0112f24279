//! Inventory snapshots of both daemons.

use std::collections::{BTreeMap, HashSet};

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, warn};
use transplant_torrent_core::{
    DestinationClient, FilePriority, Progress, SourceClient, TorrentDescriptor, TorrentFile,
    TorrentId, TorrentResult,
};

/// Status fields requested from the source for every torrent.
pub const SOURCE_FIELDS: &[&str] = &[
    "name",
    "save_path",
    "label",
    "paused",
    "state",
    "progress",
    "files",
    "file_priorities",
    "trackers",
];

/// Why a raw source record could not be turned into a descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The record was not a JSON object.
    #[error("record is not an object")]
    NotAnObject,
    /// A required field was absent.
    #[error("missing field '{field}'")]
    MissingField {
        /// Field name.
        field: &'static str,
    },
    /// A field held a value of the wrong shape.
    #[error("field '{field}' has an unexpected shape")]
    InvalidField {
        /// Field name.
        field: &'static str,
    },
}

type DecodeResult<T> = Result<T, DecodeError>;

/// Snapshot the source, keyed and ordered by torrent hash.
///
/// Records that cannot be decoded are logged and skipped.
///
/// # Errors
///
/// Propagates the client error when the listing itself fails.
pub async fn fetch_source_inventory(
    source: &dyn SourceClient,
) -> TorrentResult<BTreeMap<TorrentId, TorrentDescriptor>> {
    let raw = source.list_torrents(SOURCE_FIELDS).await?;
    let mut inventory = BTreeMap::new();
    for (key, record) in &raw {
        match decode_descriptor(key, record) {
            Ok(descriptor) => {
                inventory.insert(descriptor.id.clone(), descriptor);
            }
            Err(error) => warn!(torrent_id = %key, error = %error, "skipping unreadable source record"),
        }
    }
    debug!(
        listed = raw.len(),
        decoded = inventory.len(),
        "source inventory decoded"
    );
    Ok(inventory)
}

/// Snapshot the hashes already present at the destination.
///
/// # Errors
///
/// Propagates the client error when the listing fails.
pub async fn fetch_destination_ids(
    destination: &dyn DestinationClient,
) -> TorrentResult<HashSet<TorrentId>> {
    Ok(destination
        .list_torrents()
        .await?
        .into_iter()
        .map(|torrent| torrent.id)
        .collect())
}

/// Decode one source status record.
///
/// Progress is read as a percentage. Priorities are looked up by file index;
/// files without a priority slot default to normal.
///
/// # Errors
///
/// Returns [`DecodeError`] when a required field is missing or malformed.
pub fn decode_descriptor(key: &str, record: &Value) -> DecodeResult<TorrentDescriptor> {
    let record = record.as_object().ok_or(DecodeError::NotAnObject)?;

    let name = required_str(record, "name")?.to_string();
    let save_path = required_str(record, "save_path")?.to_string();
    let progress = record
        .get("progress")
        .ok_or(DecodeError::MissingField { field: "progress" })?
        .as_f64()
        .ok_or(DecodeError::InvalidField { field: "progress" })?;
    let label = match record.get("label") {
        None | Some(Value::Null) => None,
        Some(Value::String(label)) if label.trim().is_empty() => None,
        Some(Value::String(label)) => Some(label.clone()),
        Some(_) => return Err(DecodeError::InvalidField { field: "label" }),
    };

    Ok(TorrentDescriptor {
        id: TorrentId::new(key),
        name,
        save_path,
        label,
        paused: decode_paused(record)?,
        progress: Progress::from_percent(progress),
        files: decode_files(record)?,
        trackers: decode_trackers(record)?,
    })
}

fn required_str<'a>(record: &'a Map<String, Value>, field: &'static str) -> DecodeResult<&'a str> {
    record
        .get(field)
        .ok_or(DecodeError::MissingField { field })?
        .as_str()
        .ok_or(DecodeError::InvalidField { field })
}

fn decode_paused(record: &Map<String, Value>) -> DecodeResult<bool> {
    match record.get("paused") {
        Some(Value::Bool(paused)) => Ok(*paused),
        Some(_) => Err(DecodeError::InvalidField { field: "paused" }),
        // Older daemons only expose the state label.
        None => Ok(record.get("state").and_then(Value::as_str) == Some("Paused")),
    }
}

fn decode_files(record: &Map<String, Value>) -> DecodeResult<Vec<TorrentFile>> {
    let entries = record
        .get("files")
        .ok_or(DecodeError::MissingField { field: "files" })?
        .as_array()
        .ok_or(DecodeError::InvalidField { field: "files" })?;
    let priorities = match record.get("file_priorities") {
        None | Some(Value::Null) => &[][..],
        Some(Value::Array(levels)) => levels.as_slice(),
        Some(_) => {
            return Err(DecodeError::InvalidField {
                field: "file_priorities",
            });
        }
    };

    entries
        .iter()
        .zip(0_u32..)
        .map(|(entry, position)| {
            let invalid = DecodeError::InvalidField { field: "files" };
            let index = match entry.get("index") {
                None => position,
                Some(index) => index
                    .as_u64()
                    .and_then(|index| u32::try_from(index).ok())
                    .ok_or_else(|| invalid.clone())?,
            };
            let path = entry
                .get("path")
                .and_then(Value::as_str)
                .ok_or(invalid)?
                .to_string();
            let priority = priorities
                .get(index as usize)
                .and_then(Value::as_i64)
                .map_or(FilePriority::Normal, FilePriority::from_level);
            Ok(TorrentFile {
                index,
                path,
                priority,
            })
        })
        .collect()
}

fn decode_trackers(record: &Map<String, Value>) -> DecodeResult<Vec<String>> {
    let Some(entries) = record.get("trackers") else {
        return Ok(Vec::new());
    };
    let entries = entries
        .as_array()
        .ok_or(DecodeError::InvalidField { field: "trackers" })?;
    let mut tiered: Vec<(u64, String)> = entries
        .iter()
        .filter_map(|entry| {
            let url = entry.get("url")?.as_str()?.trim();
            let tier = entry.get("tier").and_then(Value::as_u64).unwrap_or(0);
            (!url.is_empty()).then(|| (tier, url.to_string()))
        })
        .collect();
    tiered.sort_by_key(|(tier, _)| *tier);
    Ok(tiered.into_iter().map(|(_, url)| url).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use transplant_test_support::fixtures::{descriptor, source_record};
    use transplant_test_support::mocks::{FakeDestination, FakeSource, destination_handle};

    fn record() -> Value {
        json!({
            "name": "Show S01",
            "save_path": "/data",
            "label": "tv",
            "paused": false,
            "progress": 57.5,
            "files": [
                { "index": 0, "path": "Show S01/e01.mkv" },
                { "index": 1, "path": "Show S01/sample.mkv" }
            ],
            "file_priorities": [4, 0],
            "trackers": [
                { "url": "udp://b.example/announce", "tier": 1 },
                { "url": "udp://a.example/announce", "tier": 0 }
            ]
        })
    }

    #[test]
    fn decodes_complete_record() {
        let decoded = decode_descriptor("ABCDEF", &record()).expect("decode");
        assert_eq!(decoded.id, TorrentId::new("abcdef"));
        assert_eq!(decoded.label.as_deref(), Some("tv"));
        assert!((decoded.progress.as_percent() - 57.5).abs() < f64::EPSILON);
        assert_eq!(decoded.files.len(), 2);
        assert_eq!(decoded.files[1].priority, FilePriority::Skip);
        assert_eq!(decoded.files[0].priority, FilePriority::Normal);
        assert_eq!(
            decoded.trackers,
            vec![
                "udp://a.example/announce".to_string(),
                "udp://b.example/announce".to_string()
            ]
        );
    }

    #[test]
    fn falls_back_to_state_label_for_pause() {
        let mut legacy = record();
        let map = legacy.as_object_mut().expect("object");
        map.remove("paused");
        map.insert("state".into(), json!("Paused"));
        assert!(decode_descriptor("aa", &legacy).expect("decode").paused);
    }

    #[test]
    fn blank_label_is_none() {
        let mut unlabelled = record();
        unlabelled["label"] = json!("  ");
        assert!(decode_descriptor("aa", &unlabelled).expect("decode").label.is_none());
    }

    #[test]
    fn missing_files_is_rejected() {
        let mut broken = record();
        broken.as_object_mut().expect("object").remove("files");
        assert_eq!(
            decode_descriptor("aa", &broken),
            Err(DecodeError::MissingField { field: "files" })
        );
        assert_eq!(
            decode_descriptor("aa", &json!([1, 2])),
            Err(DecodeError::NotAnObject)
        );
    }

    #[test]
    fn fixture_records_round_trip_through_decoder() {
        let fixture = descriptor("cafe", "demo", &["a.mkv", "b.nfo"]);
        let decoded = decode_descriptor("cafe", &source_record(&fixture)).expect("decode");
        assert_eq!(decoded, fixture);
    }

    #[tokio::test]
    async fn source_inventory_skips_malformed_records() {
        let source = FakeSource::with_torrents([descriptor("bb", "beta", &["b"])]);
        source.insert_raw("cc", json!({ "name": "broken" }));

        let inventory = fetch_source_inventory(&source).await.expect("inventory");
        assert_eq!(inventory.len(), 1);
        assert!(inventory.contains_key(&TorrentId::new("bb")));
    }

    #[tokio::test]
    async fn destination_ids_are_collected() {
        let destination = FakeDestination::default();
        let id = TorrentId::new("DD");
        destination.insert(destination_handle(&id, "delta", Progress::COMPLETE));

        let ids = fetch_destination_ids(&destination).await.expect("ids");
        assert_eq!(ids, HashSet::from([TorrentId::new("dd")]));
    }
}
