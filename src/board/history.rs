//! Snapshot-based undo/redo.
//!
//! Each snapshot is the serialized persistable state of the store. The
//! cursor points at the snapshot matching the current state, `-1` when the
//! history is empty. While a snapshot is being restored the manager sits in
//! `ReplayState::Replaying`, and the session must not treat the resulting
//! store changes as a fresh edit.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use super::geometry::Size;
use super::model::{Edge, Group, Node, NodeId};
use super::store::GraphStore;
use crate::error::{BoardError, BoardResult};

pub const DEFAULT_CAPACITY: usize = 200;
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

#[derive(Serialize)]
struct SnapshotRef<'a> {
    nodes: Vec<&'a Node>,
    edges: Vec<&'a Edge>,
    groups: Vec<&'a Group>,
}

#[derive(Deserialize)]
struct SnapshotBody {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    groups: Vec<Group>,
}

/// Immutable serialized copy of the store. Transient node fields never make
/// it in because they are skipped by serde.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Snapshot(String);

impl Snapshot {
    pub fn capture(store: &GraphStore) -> BoardResult<Self> {
        let body = SnapshotRef {
            nodes: store.nodes().collect(),
            edges: store.edges().collect(),
            groups: store.groups().collect(),
        };
        Ok(Snapshot(serde_json::to_string(&body)?))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    // Replace store contents, carrying renderer measurements and selection
    // over for nodes that survive the restore
    fn restore_into(&self, store: &mut GraphStore) -> BoardResult<()> {
        let body: SnapshotBody = serde_json::from_str(&self.0)?;
        let live: HashMap<NodeId, (Option<Size>, bool)> = store.nodes().map(|n| (n.id, (n.measured, n.selected))).collect();
        let nodes = body
            .nodes
            .into_iter()
            .map(|mut n| {
                if let Some((measured, selected)) = live.get(&n.id) {
                    n.measured = *measured;
                    n.selected = *selected;
                }
                n
            })
            .collect();
        store.replace_contents(nodes, body.edges, body.groups);
        Ok(())
    }
}

/// Re-entrancy guard for history replay.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ReplayState {
    #[default]
    Idle,
    Replaying,
}

impl ReplayState {
    fn enter(self) -> BoardResult<Self> {
        match self {
            ReplayState::Idle => Ok(ReplayState::Replaying),
            ReplayState::Replaying => Err(BoardError::ReplayInProgress),
        }
    }

    fn leave(self) -> Self {
        if self == ReplayState::Idle {
            warn!("history replay ended without having started");
        }
        ReplayState::Idle
    }
}

#[derive(Debug)]
pub struct HistoryManager {
    entries: VecDeque<Snapshot>,
    cursor: isize,
    capacity: usize,
    state: ReplayState,
}

impl Default for HistoryManager {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl HistoryManager {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            cursor: -1,
            capacity: capacity.max(1),
            state: ReplayState::Idle,
        }
    }

    pub fn len(&self) -> usize { self.entries.len() }
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }
    pub fn cursor(&self) -> isize { self.cursor }
    pub fn state(&self) -> ReplayState { self.state }
    pub fn is_replaying(&self) -> bool { self.state == ReplayState::Replaying }
    pub fn can_undo(&self) -> bool { self.cursor > 0 }
    pub fn can_redo(&self) -> bool { self.cursor + 1 < self.entries.len() as isize }

    pub fn current(&self) -> Option<&Snapshot> {
        usize::try_from(self.cursor).ok().and_then(|i| self.entries.get(i))
    }

    /// Drop every snapshot (document switch).
    pub fn reset(&mut self) {
        self.entries.clear();
        self.cursor = -1;
        self.state = ReplayState::Idle;
    }

    /// Capture the store. Skipped while replaying and when nothing changed
    /// since the snapshot under the cursor. A capture from below the tip
    /// discards the redo tail. Returns whether a snapshot was appended.
    pub fn save(&mut self, store: &GraphStore) -> BoardResult<bool> {
        if self.is_replaying() {
            return Ok(false);
        }
        let snapshot = Snapshot::capture(store)?;
        if self.current() == Some(&snapshot) {
            return Ok(false);
        }
        let keep = (self.cursor + 1) as usize;
        if keep < self.entries.len() {
            debug!("discarding {} redo snapshots", self.entries.len() - keep);
            self.entries.truncate(keep);
        }
        self.entries.push_back(snapshot);
        if self.entries.len() > self.capacity {
            self.entries.pop_front();
            debug!("history full, evicted oldest snapshot");
        }
        self.cursor = self.entries.len() as isize - 1;
        Ok(true)
    }

    pub fn undo_target(&self) -> Option<usize> {
        if self.can_undo() { Some((self.cursor - 1) as usize) } else { None }
    }

    pub fn redo_target(&self) -> Option<usize> {
        if self.can_redo() { Some((self.cursor + 1) as usize) } else { None }
    }

    pub fn begin_replay(&mut self) -> BoardResult<()> {
        self.state = self.state.enter()?;
        Ok(())
    }

    pub fn end_replay(&mut self) {
        self.state = self.state.leave();
    }

    /// Restore snapshot `index` and move the cursor there. Callers hold the
    /// replay guard around this and their change notifications.
    pub fn apply(&mut self, index: usize, store: &mut GraphStore) -> BoardResult<()> {
        let Some(snapshot) = self.entries.get(index) else {
            return Ok(());
        };
        snapshot.restore_into(store)?;
        self.cursor = index as isize;
        Ok(())
    }

    fn step(&mut self, target: Option<usize>, store: &mut GraphStore) -> BoardResult<bool> {
        let Some(index) = target else { return Ok(false) };
        self.begin_replay()?;
        let result = self.apply(index, store);
        self.end_replay();
        result.map(|_| true)
    }

    /// Step back one snapshot. No-op at the bottom of the history.
    pub fn undo(&mut self, store: &mut GraphStore) -> BoardResult<bool> {
        let target = self.undo_target();
        self.step(target, store)
    }

    /// Step forward one snapshot. No-op at the tip.
    pub fn redo(&mut self, store: &mut GraphStore) -> BoardResult<bool> {
        let target = self.redo_target();
        self.step(target, store)
    }
}

/// Coalesces bursts of edits: each `schedule` pushes the deadline out by
/// the quiet period.
#[derive(Clone, Debug)]
pub struct Debouncer {
    quiet: Duration,
    deadline: Option<Instant>,
}

impl Debouncer {
    pub fn new(quiet: Duration) -> Self {
        Self { quiet, deadline: None }
    }

    pub fn schedule(&mut self, now: Instant) {
        self.deadline = Some(now + self.quiet);
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// True once the quiet period has elapsed; the timer is consumed.
    pub fn fire(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}
