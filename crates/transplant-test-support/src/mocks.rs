//! In-memory source and destination clients with call recording.
//!
//! Both fakes keep their state behind a mutex so tests can inspect and script
//! them through shared references while the code under test drives them.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::io;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use transplant_torrent_core::{
    AddStatus, AddTorrent, Credentials, DestinationClient, DestinationFile, DestinationState,
    DestinationTorrent, FilePriority, Progress, SourceClient, SourceInventory, TorrentDescriptor,
    TorrentError, TorrentId, TorrentResult, TorrentSource, TransferStrategy,
};

use crate::fixtures::source_record;

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Commands observed by [`FakeSource`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceCall {
    /// Inventory listing.
    List,
    /// Pause request.
    Pause(TorrentId),
    /// Transferable definition request.
    Definition(TorrentId, TransferStrategy),
    /// Removal request.
    Remove {
        /// Removed torrent.
        id: TorrentId,
        /// Whether payload deletion was requested.
        delete_data: bool,
    },
}

#[derive(Default)]
struct SourceInner {
    torrents: BTreeMap<TorrentId, TorrentDescriptor>,
    raw: Vec<(String, Value)>,
    missing_metainfo: HashSet<TorrentId>,
    offline: bool,
    calls: Vec<SourceCall>,
}

/// Fake source daemon serving descriptors as raw status records.
#[derive(Default)]
pub struct FakeSource {
    state: Mutex<SourceInner>,
}

impl FakeSource {
    /// Seed a fake with the given torrents.
    #[must_use]
    pub fn with_torrents(torrents: impl IntoIterator<Item = TorrentDescriptor>) -> Self {
        let source = Self::default();
        for descriptor in torrents {
            source.insert(descriptor);
        }
        source
    }

    /// Add or replace a torrent.
    pub fn insert(&self, descriptor: TorrentDescriptor) {
        locked(&self.state)
            .torrents
            .insert(descriptor.id.clone(), descriptor);
    }

    /// Serve an arbitrary record under `key`, bypassing descriptor rendering.
    pub fn insert_raw(&self, key: impl Into<String>, record: Value) {
        locked(&self.state).raw.push((key.into(), record));
    }

    /// Make the metainfo file of `id` unreadable.
    pub fn drop_metainfo(&self, id: &TorrentId) {
        locked(&self.state).missing_metainfo.insert(id.clone());
    }

    /// Fail every subsequent call with a connectivity error.
    pub fn go_offline(&self) {
        locked(&self.state).offline = true;
    }

    /// Whether the source still holds `id`.
    #[must_use]
    pub fn contains(&self, id: &TorrentId) -> bool {
        locked(&self.state).torrents.contains_key(id)
    }

    /// Paused flag of `id`, if present.
    #[must_use]
    pub fn is_paused(&self, id: &TorrentId) -> Option<bool> {
        locked(&self.state)
            .torrents
            .get(id)
            .map(|descriptor| descriptor.paused)
    }

    /// Every command received so far.
    #[must_use]
    pub fn calls(&self) -> Vec<SourceCall> {
        locked(&self.state).calls.clone()
    }

    fn enter(&self, call: SourceCall, operation: &'static str) -> TorrentResult<MutexGuard<'_, SourceInner>> {
        let mut state = locked(&self.state);
        if state.offline {
            return Err(TorrentError::connectivity(
                operation,
                io::Error::new(io::ErrorKind::ConnectionRefused, "source offline"),
            ));
        }
        state.calls.push(call);
        Ok(state)
    }
}

#[async_trait]
impl SourceClient for FakeSource {
    async fn list_torrents(&self, fields: &[&str]) -> TorrentResult<SourceInventory> {
        let state = self.enter(SourceCall::List, "list_torrents")?;
        let rendered = state
            .torrents
            .iter()
            .map(|(id, descriptor)| (id.to_string(), source_record(descriptor)));
        let raw = state.raw.iter().cloned();
        Ok(rendered
            .chain(raw)
            .map(|(key, mut record)| {
                if let Value::Object(map) = &mut record {
                    map.retain(|field, _| fields.contains(&field.as_str()));
                }
                (key, record)
            })
            .collect())
    }

    async fn pause_torrent(&self, id: &TorrentId) -> TorrentResult<()> {
        let mut state = self.enter(SourceCall::Pause(id.clone()), "pause_torrent")?;
        let descriptor = state
            .torrents
            .get_mut(id)
            .ok_or_else(|| TorrentError::NotFound {
                torrent_id: id.clone(),
            })?;
        descriptor.paused = true;
        Ok(())
    }

    async fn transferable_definition(
        &self,
        descriptor: &TorrentDescriptor,
        strategy: TransferStrategy,
    ) -> TorrentResult<TorrentSource> {
        let state = self.enter(
            SourceCall::Definition(descriptor.id.clone(), strategy),
            "transferable_definition",
        )?;
        match strategy {
            TransferStrategy::Magnet => Ok(TorrentSource::magnet_for(
                &descriptor.id,
                &descriptor.name,
                &descriptor.trackers,
            )),
            TransferStrategy::Metainfo if state.missing_metainfo.contains(&descriptor.id) => {
                Err(TorrentError::operation(
                    "read_metainfo",
                    Some(&descriptor.id),
                    io::Error::new(io::ErrorKind::NotFound, "metainfo file missing"),
                ))
            }
            TransferStrategy::Metainfo => Ok(TorrentSource::metainfo(
                format!("d4:infod4:name{}:{}ee", descriptor.name.len(), descriptor.name)
                    .into_bytes(),
            )),
        }
    }

    async fn remove_torrent(&self, id: &TorrentId, delete_data: bool) -> TorrentResult<()> {
        let mut state = self.enter(
            SourceCall::Remove {
                id: id.clone(),
                delete_data,
            },
            "remove_torrent",
        )?;
        state
            .torrents
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| TorrentError::NotFound {
                torrent_id: id.clone(),
            })
    }
}

/// What the destination discovers once a torrent is admitted.
#[derive(Debug, Clone, PartialEq)]
pub struct Payload {
    /// Torrent name recorded in the metainfo.
    pub name: String,
    /// File paths recorded in the metainfo, in index order.
    pub files: Vec<String>,
    /// Completion found on disk by a recheck.
    pub progress_on_disk: Progress,
    /// Number of file-list probes answered with an empty list.
    pub metadata_polls: usize,
    /// Number of state probes answered with a checking state after a recheck.
    pub checking_polls: usize,
}

impl Payload {
    /// Payload that resolves immediately and is complete on disk.
    #[must_use]
    pub fn new(name: &str, files: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            files: files.iter().map(|path| (*path).to_string()).collect(),
            progress_on_disk: Progress::COMPLETE,
            metadata_polls: 0,
            checking_polls: 1,
        }
    }

    /// Override the completion a recheck discovers.
    #[must_use]
    pub const fn with_progress(mut self, progress: Progress) -> Self {
        self.progress_on_disk = progress;
        self
    }

    /// Delay metadata resolution by `polls` probes.
    #[must_use]
    pub const fn with_metadata_delay(mut self, polls: usize) -> Self {
        self.metadata_polls = polls;
        self
    }

    /// Keep the torrent checking for `polls` probes after a recheck.
    #[must_use]
    pub const fn with_checking_polls(mut self, polls: usize) -> Self {
        self.checking_polls = polls;
        self
    }
}

/// Commands observed by [`FakeDestination`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DestinationCall {
    /// Session login.
    Login,
    /// Add request for the torrent.
    Add(TorrentId),
    /// File rename.
    RenameFile {
        /// Target torrent.
        id: TorrentId,
        /// File index.
        index: u32,
        /// New relative path.
        name: String,
    },
    /// File priority change.
    SetPriority {
        /// Target torrent.
        id: TorrentId,
        /// File index.
        index: u32,
        /// New priority.
        priority: FilePriority,
    },
    /// Torrent rename.
    RenameTorrent {
        /// Target torrent.
        id: TorrentId,
        /// New name.
        name: String,
    },
    /// Recheck request.
    Recheck(TorrentId),
    /// Resume request.
    Resume(TorrentId),
    /// Pause request.
    Pause(TorrentId),
    /// Removal request.
    Delete {
        /// Removed torrent.
        id: TorrentId,
        /// Whether payload deletion was requested.
        delete_data: bool,
    },
    /// Category creation.
    CreateCategory(String),
}

struct Entry {
    handle: DestinationTorrent,
    files: Vec<DestinationFile>,
    metadata_polls: usize,
    checking_polls: usize,
    checking_remaining: Option<usize>,
    progress_after_check: Progress,
}

impl Entry {
    fn from_handle(handle: DestinationTorrent) -> Self {
        let progress = handle.progress;
        Self {
            handle,
            files: Vec::new(),
            metadata_polls: 0,
            checking_polls: 1,
            checking_remaining: None,
            progress_after_check: progress,
        }
    }
}

struct DestinationInner {
    torrents: BTreeMap<TorrentId, Entry>,
    payloads: HashMap<TorrentId, Payload>,
    added: Vec<AddTorrent>,
    categories: HashSet<String>,
    categories_supported: bool,
    authenticated: bool,
    session_timeout: Duration,
    accepted_password: Option<String>,
    add_rejection: Option<String>,
    expire_on: Option<&'static str>,
    vanish_on_recheck: HashSet<TorrentId>,
    failing_renames: bool,
    calls: Vec<DestinationCall>,
}

impl Default for DestinationInner {
    fn default() -> Self {
        Self {
            torrents: BTreeMap::new(),
            payloads: HashMap::new(),
            added: Vec::new(),
            categories: HashSet::new(),
            categories_supported: true,
            authenticated: false,
            session_timeout: Duration::from_secs(3600),
            accepted_password: None,
            add_rejection: None,
            expire_on: None,
            vanish_on_recheck: HashSet::new(),
            failing_renames: false,
            calls: Vec::new(),
        }
    }
}

/// Fake destination daemon.
///
/// Torrents added through [`DestinationClient::add_torrent`] take their layout
/// from a staged [`Payload`]; without one the metadata never resolves.
#[derive(Default)]
pub struct FakeDestination {
    state: Mutex<DestinationInner>,
}

/// Build a paused destination handle at the fixture save path.
#[must_use]
pub fn destination_handle(id: &TorrentId, name: &str, progress: Progress) -> DestinationTorrent {
    DestinationTorrent {
        id: id.clone(),
        name: name.to_string(),
        save_path: crate::fixtures::SAVE_PATH.to_string(),
        category: String::new(),
        progress,
        state: DestinationState::Paused,
    }
}

impl FakeDestination {
    /// Place an existing torrent at the destination.
    pub fn insert(&self, handle: DestinationTorrent) {
        locked(&self.state)
            .torrents
            .insert(handle.id.clone(), Entry::from_handle(handle));
    }

    /// Stage what the destination learns when `id` is added.
    pub fn stage_payload(&self, id: &TorrentId, payload: Payload) {
        locked(&self.state).payloads.insert(id.clone(), payload);
    }

    /// Report `id` as checking for the next `polls` state probes.
    pub fn script_checking(&self, id: &TorrentId, polls: usize) {
        let mut state = locked(&self.state);
        if let Some(entry) = state.torrents.get_mut(id) {
            entry.handle.state = DestinationState::Checking;
            entry.checking_remaining = Some(polls);
        }
    }

    /// Refuse every add request with `detail`.
    pub fn reject_adds(&self, detail: &str) {
        locked(&self.state).add_rejection = Some(detail.to_string());
    }

    /// Fail the next call of `operation` with an expired session.
    pub fn expire_session_on(&self, operation: &'static str) {
        locked(&self.state).expire_on = Some(operation);
    }

    /// Drop the current session without failing any call.
    pub fn expire_session(&self) {
        locked(&self.state).authenticated = false;
    }

    /// Remove `id` as soon as a recheck is requested.
    pub fn vanish_on_recheck(&self, id: &TorrentId) {
        locked(&self.state).vanish_on_recheck.insert(id.clone());
    }

    /// Fail every file rename.
    pub fn fail_renames(&self) {
        locked(&self.state).failing_renames = true;
    }

    /// Reject logins whose password differs from `password`.
    pub fn require_password(&self, password: &str) {
        locked(&self.state).accepted_password = Some(password.to_string());
    }

    /// Override the reported session timeout.
    pub fn set_session_timeout(&self, timeout: Duration) {
        locked(&self.state).session_timeout = timeout;
    }

    /// Report categories as unsupported.
    pub fn without_categories(&self) {
        locked(&self.state).categories_supported = false;
    }

    /// Pre-create a category.
    pub fn add_category(&self, name: &str) {
        locked(&self.state).categories.insert(name.to_string());
    }

    /// Current handle of `id`.
    #[must_use]
    pub fn get(&self, id: &TorrentId) -> Option<DestinationTorrent> {
        locked(&self.state)
            .torrents
            .get(id)
            .map(|entry| entry.handle.clone())
    }

    /// Current file list of `id`, ignoring any metadata delay.
    #[must_use]
    pub fn files_of(&self, id: &TorrentId) -> Vec<DestinationFile> {
        locked(&self.state)
            .torrents
            .get(id)
            .map(|entry| entry.files.clone())
            .unwrap_or_default()
    }

    /// Whether the destination holds `id`.
    #[must_use]
    pub fn contains(&self, id: &TorrentId) -> bool {
        locked(&self.state).torrents.contains_key(id)
    }

    /// Categories known to the destination.
    #[must_use]
    pub fn known_categories(&self) -> HashSet<String> {
        locked(&self.state).categories.clone()
    }

    /// Add requests received so far.
    #[must_use]
    pub fn added(&self) -> Vec<AddTorrent> {
        locked(&self.state).added.clone()
    }

    /// Number of add requests received for `id`.
    #[must_use]
    pub fn add_count(&self, id: &TorrentId) -> usize {
        locked(&self.state)
            .added
            .iter()
            .filter(|request| &request.id == id)
            .count()
    }

    /// Number of successful logins.
    #[must_use]
    pub fn logins(&self) -> usize {
        locked(&self.state)
            .calls
            .iter()
            .filter(|call| matches!(call, DestinationCall::Login))
            .count()
    }

    /// Every command received so far.
    #[must_use]
    pub fn calls(&self) -> Vec<DestinationCall> {
        locked(&self.state).calls.clone()
    }

    fn enter(&self, operation: &'static str) -> TorrentResult<MutexGuard<'_, DestinationInner>> {
        let mut state = locked(&self.state);
        if state.expire_on == Some(operation) {
            state.expire_on = None;
            state.authenticated = false;
            return Err(TorrentError::SessionExpired { operation });
        }
        Ok(state)
    }
}

fn entry_mut<'a>(state: &'a mut DestinationInner, id: &TorrentId) -> TorrentResult<&'a mut Entry> {
    state
        .torrents
        .get_mut(id)
        .ok_or_else(|| TorrentError::NotFound {
            torrent_id: id.clone(),
        })
}

#[async_trait]
impl DestinationClient for FakeDestination {
    async fn list_torrents(&self) -> TorrentResult<Vec<DestinationTorrent>> {
        let state = self.enter("list_torrents")?;
        Ok(state
            .torrents
            .values()
            .map(|entry| entry.handle.clone())
            .collect())
    }

    async fn is_authenticated(&self) -> TorrentResult<bool> {
        Ok(locked(&self.state).authenticated)
    }

    async fn login(&self, credentials: &Credentials) -> TorrentResult<()> {
        let mut state = locked(&self.state);
        if let Some(expected) = &state.accepted_password
            && expected != &credentials.password
        {
            return Err(TorrentError::AuthRejected { operation: "login" });
        }
        state.authenticated = true;
        state.calls.push(DestinationCall::Login);
        Ok(())
    }

    async fn session_timeout(&self) -> TorrentResult<Duration> {
        Ok(locked(&self.state).session_timeout)
    }

    async fn add_torrent(&self, request: &AddTorrent) -> TorrentResult<AddStatus> {
        let mut state = self.enter("add_torrent")?;
        state.calls.push(DestinationCall::Add(request.id.clone()));
        state.added.push(request.clone());
        if let Some(detail) = &state.add_rejection {
            return Ok(AddStatus::Rejected {
                detail: detail.clone(),
            });
        }
        if state.torrents.contains_key(&request.id) {
            return Ok(AddStatus::Rejected {
                detail: "torrent already present".to_string(),
            });
        }

        let payload = state.payloads.get(&request.id).cloned();
        let name = payload
            .as_ref()
            .map_or_else(|| request.id.to_string(), |payload| payload.name.clone());
        let mut entry = Entry::from_handle(DestinationTorrent {
            id: request.id.clone(),
            name,
            save_path: request.save_path.clone(),
            category: request.category.clone().unwrap_or_default(),
            progress: Progress::default(),
            state: DestinationState::FetchingMetadata,
        });
        if let Some(payload) = payload {
            entry.files = payload
                .files
                .iter()
                .zip(0_u32..)
                .map(|(name, index)| DestinationFile {
                    index,
                    name: name.clone(),
                    priority: FilePriority::Normal,
                })
                .collect();
            entry.metadata_polls = payload.metadata_polls;
            entry.checking_polls = payload.checking_polls;
            entry.progress_after_check = payload.progress_on_disk;
        } else {
            entry.metadata_polls = usize::MAX;
        }
        state.torrents.insert(request.id.clone(), entry);
        Ok(AddStatus::Accepted)
    }

    async fn torrent(&self, id: &TorrentId) -> TorrentResult<Option<DestinationTorrent>> {
        let mut state = self.enter("torrent")?;
        let Some(entry) = state.torrents.get_mut(id) else {
            return Ok(None);
        };
        match entry.checking_remaining {
            Some(0) => {
                entry.checking_remaining = None;
                entry.handle.state = DestinationState::Paused;
                entry.handle.progress = entry.progress_after_check;
            }
            Some(remaining) => entry.checking_remaining = Some(remaining - 1),
            None => {}
        }
        Ok(Some(entry.handle.clone()))
    }

    async fn files(&self, id: &TorrentId) -> TorrentResult<Vec<DestinationFile>> {
        let mut state = self.enter("files")?;
        let entry = entry_mut(&mut state, id)?;
        if entry.metadata_polls > 0 {
            entry.metadata_polls = entry.metadata_polls.saturating_sub(1);
            return Ok(Vec::new());
        }
        if entry.handle.state.is_fetching_metadata() {
            entry.handle.state = DestinationState::Paused;
        }
        Ok(entry.files.clone())
    }

    async fn rename_file(&self, id: &TorrentId, index: u32, new_name: &str) -> TorrentResult<()> {
        let mut state = self.enter("rename_file")?;
        state.calls.push(DestinationCall::RenameFile {
            id: id.clone(),
            index,
            name: new_name.to_string(),
        });
        if state.failing_renames {
            return Err(TorrentError::operation(
                "rename_file",
                Some(id),
                io::Error::other("target path already exists"),
            ));
        }
        let entry = entry_mut(&mut state, id)?;
        let file = entry
            .files
            .iter_mut()
            .find(|file| file.index == index)
            .ok_or_else(|| TorrentError::invalid_response("rename_file", format!("no file {index}")))?;
        file.name = new_name.to_string();
        Ok(())
    }

    async fn set_file_priority(
        &self,
        id: &TorrentId,
        index: u32,
        priority: FilePriority,
    ) -> TorrentResult<()> {
        let mut state = self.enter("set_file_priority")?;
        state.calls.push(DestinationCall::SetPriority {
            id: id.clone(),
            index,
            priority,
        });
        let entry = entry_mut(&mut state, id)?;
        if let Some(file) = entry.files.iter_mut().find(|file| file.index == index) {
            file.priority = priority;
        }
        Ok(())
    }

    async fn rename_torrent(&self, id: &TorrentId, name: &str) -> TorrentResult<()> {
        let mut state = self.enter("rename_torrent")?;
        state.calls.push(DestinationCall::RenameTorrent {
            id: id.clone(),
            name: name.to_string(),
        });
        entry_mut(&mut state, id)?.handle.name = name.to_string();
        Ok(())
    }

    async fn recheck(&self, id: &TorrentId) -> TorrentResult<()> {
        let mut state = self.enter("recheck")?;
        state.calls.push(DestinationCall::Recheck(id.clone()));
        if state.vanish_on_recheck.contains(id) {
            state.torrents.remove(id);
            return Ok(());
        }
        let entry = entry_mut(&mut state, id)?;
        entry.handle.state = DestinationState::Checking;
        entry.checking_remaining = Some(entry.checking_polls);
        Ok(())
    }

    async fn resume(&self, id: &TorrentId) -> TorrentResult<()> {
        let mut state = self.enter("resume")?;
        state.calls.push(DestinationCall::Resume(id.clone()));
        let entry = entry_mut(&mut state, id)?;
        entry.handle.state = if entry.handle.progress == Progress::COMPLETE {
            DestinationState::Seeding
        } else {
            DestinationState::Downloading
        };
        Ok(())
    }

    async fn pause(&self, id: &TorrentId) -> TorrentResult<()> {
        let mut state = self.enter("pause")?;
        state.calls.push(DestinationCall::Pause(id.clone()));
        entry_mut(&mut state, id)?.handle.state = DestinationState::Paused;
        Ok(())
    }

    async fn delete(&self, id: &TorrentId, delete_data: bool) -> TorrentResult<()> {
        let mut state = self.enter("delete")?;
        state.calls.push(DestinationCall::Delete {
            id: id.clone(),
            delete_data,
        });
        state.torrents.remove(id);
        Ok(())
    }

    async fn categories(&self) -> TorrentResult<HashSet<String>> {
        let state = self.enter("categories")?;
        if state.categories_supported {
            Ok(state.categories.clone())
        } else {
            Err(TorrentError::Unsupported {
                operation: "categories",
            })
        }
    }

    async fn create_category(&self, name: &str) -> TorrentResult<()> {
        let mut state = self.enter("create_category")?;
        if !state.categories_supported {
            return Err(TorrentError::Unsupported {
                operation: "create_category",
            });
        }
        state.calls.push(DestinationCall::CreateCategory(name.to_string()));
        state.categories.insert(name.to_string());
        Ok(())
    }
}
