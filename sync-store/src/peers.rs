//! Per-peer sync state, stored in a small JSON sidecar.
//!
//! The log file answers "what happened"; the sidecar answers "who has
//! seen it". One entry per peer tracks two cursors: `received` is how
//! far we have read that peer's log, `acked` is how far the peer has
//! confirmed reading ours. Writes rewrite the whole file through a temp
//! file and a rename, so a crash leaves either the old state or the new
//! one, never a torn mix.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::PathBuf;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};
use sync_types::{Cursor, DeviceId};

use crate::error::Result;

/// Everything persisted about one peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerState {
    /// The peer's device id.
    pub device: DeviceId,
    /// Human-readable name, usually taken from the peer's handshake.
    pub name: String,
    /// Dial address (`host:port`). Absent for peers that have only
    /// ever dialed us.
    pub address: Option<String>,
    /// How far we have read the peer's log.
    pub received: Cursor,
    /// How far the peer has confirmed reading our log.
    pub acked: Cursor,
    /// Unix seconds of the last completed sync with this peer.
    pub last_synced_at: Option<u64>,
}

impl PeerState {
    /// State for a freshly added peer with a known dial address.
    pub fn new(device: DeviceId, name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            device,
            name: name.into(),
            address: Some(address.into()),
            received: Cursor::zero(),
            acked: Cursor::zero(),
            last_synced_at: None,
        }
    }

    fn first_contact(device: DeviceId) -> Self {
        Self {
            device,
            name: String::new(),
            address: None,
            received: Cursor::zero(),
            acked: Cursor::zero(),
            last_synced_at: None,
        }
    }
}

/// The JSON sidecar holding a [`PeerState`] for every known peer.
#[derive(Debug)]
pub struct PeerBook {
    path: PathBuf,
    inner: RwLock<HashMap<DeviceId, PeerState>>,
}

impl PeerBook {
    /// Open or create the sidecar at `path`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let peers = match fs::read(&path) {
            Ok(data) => {
                let list: Vec<PeerState> = serde_json::from_slice(&data)?;
                list.into_iter().map(|p| (p.device, p)).collect()
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            path,
            inner: RwLock::new(peers),
        })
    }

    /// Insert or replace a peer entry.
    pub fn upsert(&self, state: PeerState) -> Result<()> {
        let mut inner = self.write_inner();
        inner.insert(state.device, state);
        self.persist(&inner)
    }

    /// Remove a peer entry. Returns whether it existed.
    pub fn remove(&self, device: DeviceId) -> Result<bool> {
        let mut inner = self.write_inner();
        let existed = inner.remove(&device).is_some();
        if existed {
            self.persist(&inner)?;
        }
        Ok(existed)
    }

    /// Look up one peer.
    pub fn get(&self, device: DeviceId) -> Option<PeerState> {
        self.read_inner().get(&device).cloned()
    }

    /// All known peers, ordered by device id.
    pub fn all(&self) -> Vec<PeerState> {
        let mut peers: Vec<PeerState> = self.read_inner().values().cloned().collect();
        peers.sort_by_key(|p| p.device);
        peers
    }

    /// Number of known peers.
    pub fn len(&self) -> usize {
        self.read_inner().len()
    }

    /// Whether no peers are known.
    pub fn is_empty(&self) -> bool {
        self.read_inner().is_empty()
    }

    /// Record the name a peer announced in its handshake, creating the
    /// entry on first contact.
    pub fn note_contact(&self, device: DeviceId, name: &str) -> Result<()> {
        let mut inner = self.write_inner();
        let state = inner
            .entry(device)
            .or_insert_with(|| PeerState::first_contact(device));
        if state.name == name {
            return Ok(());
        }
        state.name = name.to_string();
        self.persist(&inner)
    }

    /// Advance how far we have read the peer's log. Monotonic: a stale
    /// cursor from an interrupted exchange never rewinds the stored
    /// one. Returns the effective cursor.
    pub fn record_received(&self, device: DeviceId, cursor: Cursor) -> Result<Cursor> {
        self.advance(device, cursor, |state| &mut state.received)
    }

    /// Advance how far the peer has confirmed reading our log.
    /// Monotonic like [`record_received`](Self::record_received).
    pub fn record_acked(&self, device: DeviceId, cursor: Cursor) -> Result<Cursor> {
        self.advance(device, cursor, |state| &mut state.acked)
    }

    /// Record a completed sync round at `at` (unix seconds).
    pub fn mark_synced(&self, device: DeviceId, at: u64) -> Result<()> {
        let mut inner = self.write_inner();
        let state = inner
            .entry(device)
            .or_insert_with(|| PeerState::first_contact(device));
        state.last_synced_at = Some(at);
        self.persist(&inner)
    }

    /// The lowest `acked` cursor across all peers, `None` when no
    /// peers are known. History at or below this point has been seen
    /// by everyone, so it is safe to compact away.
    pub fn min_acked(&self) -> Option<Cursor> {
        self.read_inner().values().map(|p| p.acked).min()
    }

    fn advance(
        &self,
        device: DeviceId,
        cursor: Cursor,
        field: impl Fn(&mut PeerState) -> &mut Cursor,
    ) -> Result<Cursor> {
        let mut inner = self.write_inner();
        let state = inner
            .entry(device)
            .or_insert_with(|| PeerState::first_contact(device));
        let slot = field(state);
        if cursor <= *slot {
            return Ok(*slot);
        }
        *slot = cursor;
        self.persist(&inner)?;
        Ok(cursor)
    }

    fn persist(&self, peers: &HashMap<DeviceId, PeerState>) -> Result<()> {
        let mut list: Vec<&PeerState> = peers.values().collect();
        list.sort_by_key(|p| p.device);
        let data = serde_json::to_vec_pretty(&list)?;

        let tmp_path = {
            let mut p = self.path.clone().into_os_string();
            p.push(".tmp");
            PathBuf::from(p)
        };
        let mut tmp = File::create(&tmp_path)?;
        tmp.write_all(&data)?;
        tmp.sync_all()?;
        drop(tmp);
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    fn read_inner(&self) -> RwLockReadGuard<'_, HashMap<DeviceId, PeerState>> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_inner(&self) -> RwLockWriteGuard<'_, HashMap<DeviceId, PeerState>> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}
