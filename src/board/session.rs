use log::{debug, info, warn};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use super::clock::{Clock, SystemClock};
use super::geometry::{CoordinateTransform, Position, Size};
use super::grouping::GroupPatch;
use super::history::{Debouncer, HistoryManager};
use super::layout::{AlignDirection, LayoutTarget, ReorganizeOptions};
use super::lifecycle::DropPayload;
use super::model::{BoardDocument, BoardMeta, EdgeId, GroupId, NodeId, NodeKind, PortRef};
use super::ports::{PortPolicy, TypedPorts};
use super::registry::SeedContext;
use super::store::{GraphStore, NodePatch};
use crate::error::{BoardError, BoardResult};
use crate::persistence::PersistenceAdapter;
use crate::persistence::migrate::migrate_legacy_handles;
use crate::persistence::settings::BoardSettings;

/// Where the board is in its load/edit/save cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BoardPhase {
    Unloaded,
    Loading,
    Clean,
    Dirty,
    Saving,
    /// Last save failed; the board still holds unsaved changes.
    SaveFailed,
}

enum Step {
    Undo,
    Redo,
}

/// One open board: the command surface the UI, shortcut dispatcher and
/// command palette talk to.
pub struct Board {
    settings: BoardSettings,
    store: GraphStore,
    history: HistoryManager,
    debounce: Debouncer,
    clock: Box<dyn Clock>,
    persistence: Box<dyn PersistenceAdapter>,
    ports: Box<dyn PortPolicy>,
    document_id: Option<String>,
    meta: BoardMeta,
    phase: BoardPhase,
    seen_revision: u64,
}

impl Board {
    pub fn new(settings: BoardSettings, persistence: impl PersistenceAdapter + 'static) -> Self {
        let history = HistoryManager::new(settings.history_capacity);
        let debounce = Debouncer::new(settings.debounce());
        Self {
            settings,
            store: GraphStore::new(),
            history,
            debounce,
            clock: Box::new(SystemClock),
            persistence: Box::new(persistence),
            ports: Box::new(TypedPorts),
            document_id: None,
            meta: BoardMeta::default(),
            phase: BoardPhase::Unloaded,
            seen_revision: 0,
        }
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn with_port_policy(mut self, policy: impl PortPolicy + 'static) -> Self {
        self.ports = Box::new(policy);
        self
    }

    pub fn store(&self) -> &GraphStore { &self.store }
    pub fn history(&self) -> &HistoryManager { &self.history }
    pub fn settings(&self) -> &BoardSettings { &self.settings }
    pub fn phase(&self) -> BoardPhase { self.phase }
    pub fn document_id(&self) -> Option<&str> { self.document_id.as_deref() }
    pub fn meta(&self) -> &BoardMeta { &self.meta }
    pub fn is_saving(&self) -> bool { self.phase == BoardPhase::Saving }

    pub fn is_dirty(&self) -> bool {
        matches!(self.phase, BoardPhase::Dirty | BoardPhase::SaveFailed)
    }

    fn is_loaded(&self) -> bool {
        !matches!(self.phase, BoardPhase::Unloaded | BoardPhase::Loading)
    }

    fn ensure_loaded(&self) -> BoardResult<()> {
        if self.is_loaded() { Ok(()) } else { Err(BoardError::NotLoaded) }
    }

    // ---- document lifecycle ----

    /// Load a board through the persistence adapter, replacing whatever is
    /// open. On failure the previous board stays untouched.
    pub fn open(&mut self, id: &str) -> BoardResult<()> {
        let previous = self.phase;
        self.phase = BoardPhase::Loading;
        let loaded = match self.persistence.load(id) {
            Ok(Some(doc)) => doc,
            Ok(None) => {
                self.phase = previous;
                return Err(BoardError::DocumentNotFound(id.to_string()));
            }
            Err(source) => {
                self.phase = previous;
                warn!("failed to load board '{}': {}", id, source);
                return Err(BoardError::Load { id: id.to_string(), source });
            }
        };
        self.install(loaded);
        info!("opened board '{}' ({} nodes, {} edges)", id, self.store.node_count(), self.store.edge_count());
        Ok(())
    }

    /// Start a fresh, empty board. It counts as unsaved until `save`.
    pub fn create(&mut self, id: &str, title: &str) {
        self.install(BoardDocument::new(id, title));
        self.phase = BoardPhase::Dirty;
    }

    fn install(&mut self, mut doc: BoardDocument) {
        migrate_legacy_handles(&mut doc);
        self.document_id = Some(doc.id.clone());
        self.meta = doc.meta.clone();
        self.store = GraphStore::from_document(doc);
        self.store.refresh_group_bounds();
        self.history.reset();
        self.debounce.cancel();
        self.seen_revision = self.store.revision();
        self.phase = BoardPhase::Clean;
    }

    /// Persist the board. A clean board is not written again. Returns
    /// whether anything was saved.
    pub fn save(&mut self) -> BoardResult<bool> {
        self.ensure_loaded()?;
        match self.phase {
            BoardPhase::Clean => return Ok(false),
            BoardPhase::Saving => return Err(BoardError::SaveInProgress),
            _ => {}
        }
        let id = self.document_id.clone().unwrap_or_default();
        let mut meta = self.meta.clone();
        meta.updated_at = OffsetDateTime::now_utc().format(&Rfc3339).ok();
        let doc = self.store.to_document(&id, meta);

        self.phase = BoardPhase::Saving;
        match self.persistence.save(&doc) {
            Ok(()) => {
                self.meta = doc.meta;
                self.phase = BoardPhase::Clean;
                info!("saved board '{}'", id);
                Ok(true)
            }
            Err(e) => {
                self.phase = BoardPhase::SaveFailed;
                warn!("saving board '{}' failed: {}", id, e);
                Err(BoardError::Persistence(e))
            }
        }
    }

    /// Current board as a persistable document, transient fields stripped.
    pub fn export_document(&self) -> BoardResult<BoardDocument> {
        self.ensure_loaded()?;
        let id = self.document_id.clone().unwrap_or_default();
        Ok(self.store.to_document(&id, self.meta.clone()))
    }

    pub fn export_json(&self) -> BoardResult<String> {
        Ok(serde_json::to_string_pretty(&self.export_document()?)?)
    }

    // ---- change tracking ----

    fn mark_dirty(&mut self) {
        if self.is_loaded() {
            self.phase = BoardPhase::Dirty;
        }
    }

    // First edit on an empty history: keep the pre-edit state undoable
    fn before_mutation(&mut self) -> BoardResult<()> {
        self.ensure_loaded()?;
        if self.history.is_empty() {
            self.history.save(&self.store)?;
        }
        Ok(())
    }

    // Turn store revision changes into dirty state and a debounced capture.
    // Changes made while replaying history are absorbed without either.
    fn flush_changes(&mut self) {
        let revision = self.store.revision();
        if revision == self.seen_revision {
            return;
        }
        self.seen_revision = revision;
        if self.history.is_replaying() {
            return;
        }
        self.mark_dirty();
        self.debounce.schedule(self.clock.now());
    }

    /// Run the debounced history capture if its quiet period has elapsed.
    pub fn tick(&mut self) -> BoardResult<bool> {
        if !self.is_loaded() || !self.debounce.fire(self.clock.now()) {
            return Ok(false);
        }
        self.history.save(&self.store)
    }

    /// Capture now instead of waiting for the debounce.
    pub fn commit(&mut self) -> BoardResult<bool> {
        self.ensure_loaded()?;
        self.debounce.cancel();
        self.history.save(&self.store)
    }

    fn replay(&mut self, step: Step) -> BoardResult<bool> {
        self.commit()?;
        let target = match step {
            Step::Undo => self.history.undo_target(),
            Step::Redo => self.history.redo_target(),
        };
        let Some(index) = target else { return Ok(false) };

        self.history.begin_replay()?;
        let restored = self.history.apply(index, &mut self.store);
        self.flush_changes();
        self.history.end_replay();
        restored?;

        self.debounce.cancel();
        self.mark_dirty();
        debug!("history cursor now {} of {}", self.history.cursor(), self.history.len());
        Ok(true)
    }

    pub fn undo(&mut self) -> BoardResult<bool> {
        self.replay(Step::Undo)
    }

    pub fn redo(&mut self) -> BoardResult<bool> {
        self.replay(Step::Redo)
    }

    // Wrap a store mutation with baseline capture and change tracking
    fn mutate<T>(&mut self, f: impl FnOnce(&mut GraphStore, &BoardSettings) -> T) -> BoardResult<T> {
        self.before_mutation()?;
        let out = f(&mut self.store, &self.settings);
        self.flush_changes();
        Ok(out)
    }

    // ---- node lifecycle ----

    pub fn add_node(&mut self, kind: NodeKind, position: Option<Position>, size: Option<Size>) -> BoardResult<NodeId> {
        self.mutate(|store, settings| {
            let ctx = SeedContext { palette: &settings.brand_palette };
            store.spawn_node(kind, position, size, &ctx)
        })
    }

    pub fn duplicate_node(&mut self, id: NodeId) -> BoardResult<Option<NodeId>> {
        self.mutate(|store, settings| store.duplicate_node(id, settings.duplicate_offset))
    }

    pub fn on_drop(
        &mut self,
        kind: NodeKind,
        payload: &DropPayload,
        screen: Position,
        transform: &dyn CoordinateTransform,
    ) -> BoardResult<NodeId> {
        self.mutate(|store, settings| {
            let ctx = SeedContext { palette: &settings.brand_palette };
            store.drop_node(kind, payload, screen, transform, &ctx)
        })
    }

    pub fn delete_nodes(&mut self, ids: &[NodeId]) -> BoardResult<usize> {
        self.mutate(|store, _| store.delete_nodes(ids))
    }

    pub fn delete_edges(&mut self, ids: &[EdgeId]) -> BoardResult<usize> {
        self.mutate(|store, _| store.delete_edges(ids))
    }

    pub fn update_node_data(&mut self, id: NodeId, patch: &NodePatch) -> BoardResult<bool> {
        self.mutate(|store, _| store.update_node_data(id, patch))
    }

    pub fn move_node(&mut self, id: NodeId, position: Position) -> BoardResult<bool> {
        self.mutate(|store, _| store.move_node(id, position))
    }

    pub fn resize_node(&mut self, id: NodeId, size: Size) -> BoardResult<bool> {
        self.mutate(|store, _| store.resize_node(id, size))
    }

    pub fn connect(&mut self, source: PortRef, target: PortRef) -> BoardResult<EdgeId> {
        self.before_mutation()?;
        let result = self.store.add_edge(source, target, self.ports.as_ref());
        self.flush_changes();
        result
    }

    // Selection is UI state and never dirties the board

    pub fn select_only(&mut self, id: NodeId) -> bool {
        self.store.select_only(id)
    }

    pub fn set_selection(&mut self, ids: &[NodeId]) {
        self.store.set_selection(ids);
    }

    pub fn deselect_all(&mut self) {
        self.store.deselect_all();
    }

    /// Renderer measurements. Only a group frame they reshape dirties the board.
    pub fn report_measured(&mut self, id: NodeId, size: Size) -> bool {
        if !self.is_loaded() {
            return false;
        }
        let known = self.store.set_measured(id, size);
        self.flush_changes();
        known
    }

    // ---- grouping ----

    pub fn create_group(&mut self, ids: &[NodeId], name: Option<&str>) -> BoardResult<GroupId> {
        self.mutate(|store, _| store.create_group(ids, name))?
    }

    pub fn ungroup_nodes(&mut self, group_id: GroupId) -> BoardResult<Option<Vec<NodeId>>> {
        self.mutate(|store, _| store.ungroup_nodes(group_id))
    }

    pub fn toggle_collapse(&mut self, group_id: GroupId) -> BoardResult<Option<bool>> {
        self.mutate(|store, _| store.toggle_collapse(group_id))
    }

    pub fn update_group(&mut self, group_id: GroupId, patch: &GroupPatch) -> BoardResult<bool> {
        self.mutate(|store, _| store.update_group(group_id, patch))
    }

    pub fn delete_group(&mut self, group_id: GroupId) -> BoardResult<bool> {
        self.mutate(|store, _| store.delete_group(group_id))
    }

    // ---- layout ----

    pub fn align_nodes(&mut self, direction: AlignDirection, target: &LayoutTarget) -> BoardResult<usize> {
        self.mutate(|store, _| {
            let ids = target.resolve(store);
            store.align_nodes(direction, &ids)
        })
    }

    pub fn reorganize_nodes(&mut self, options: ReorganizeOptions, target: &LayoutTarget) -> BoardResult<usize> {
        self.mutate(|store, settings| {
            let ids = target.resolve(store);
            store.reorganize_nodes(options, &ids, settings.layout)
        })?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::clock::ManualClock;
    use crate::persistence::MemoryPersistence;
    use std::time::Duration;

    fn open_board() -> (Board, ManualClock, MemoryPersistence) {
        let clock = ManualClock::new();
        let mem = MemoryPersistence::new();
        let mut board = Board::new(BoardSettings::default(), mem.clone()).with_clock(clock.clone());
        board.create("b1", "Board one");
        (board, clock, mem)
    }

    #[test]
    fn commands_require_a_loaded_board() {
        let mut board = Board::new(BoardSettings::default(), MemoryPersistence::new());
        assert_eq!(board.phase(), BoardPhase::Unloaded);
        assert!(matches!(board.add_node(NodeKind::Text, None, None), Err(BoardError::NotLoaded)));
        assert!(matches!(board.save(), Err(BoardError::NotLoaded)));
    }

    #[test]
    fn debounce_coalesces_a_burst_into_one_snapshot() {
        let (mut board, clock, _) = open_board();
        let a = board.add_node(NodeKind::Text, Some(Position::new(0.0, 0.0)), None).unwrap();
        assert_eq!(board.history().len(), 1, "baseline captured before the first edit");
        for i in 1..5 {
            clock.advance(Duration::from_millis(100));
            board.move_node(a, Position::new(i as f32 * 10.0, 0.0)).unwrap();
            assert!(!board.tick().unwrap());
        }
        clock.advance(Duration::from_millis(499));
        assert!(!board.tick().unwrap());
        clock.advance(Duration::from_millis(1));
        assert!(board.tick().unwrap());
        assert_eq!(board.history().len(), 2);
    }

    #[test]
    fn undo_does_not_schedule_a_capture() {
        let (mut board, clock, _) = open_board();
        board.add_node(NodeKind::Note, Some(Position::new(0.0, 0.0)), None).unwrap();
        board.commit().unwrap();
        assert!(board.undo().unwrap());
        clock.advance(Duration::from_secs(5));
        assert!(!board.tick().unwrap());
        assert_eq!(board.history().len(), 2);
        assert_eq!(board.history().cursor(), 0);
        assert!(board.is_dirty());
    }

    #[test]
    fn undo_flushes_pending_edit_first() {
        let (mut board, _, _) = open_board();
        let a = board.add_node(NodeKind::Note, Some(Position::new(0.0, 0.0)), None).unwrap();
        board.commit().unwrap();
        board.move_node(a, Position::new(99.0, 0.0)).unwrap();
        // no tick: the move is still pending when undo arrives
        assert!(board.undo().unwrap());
        assert_eq!(board.store().node(a).unwrap().position, Position::new(0.0, 0.0));
        assert!(board.redo().unwrap());
        assert_eq!(board.store().node(a).unwrap().position, Position::new(99.0, 0.0));
    }

    #[test]
    fn save_failure_keeps_board_dirty_and_retryable() {
        let (mut board, _, mem) = open_board();
        board.add_node(NodeKind::Image, None, None).unwrap();
        mem.set_failing(true);
        assert!(matches!(board.save(), Err(BoardError::Persistence(_))));
        assert_eq!(board.phase(), BoardPhase::SaveFailed);
        assert!(board.is_dirty());
        assert_eq!(board.store().node_count(), 1);

        mem.set_failing(false);
        assert!(board.save().unwrap());
        assert_eq!(board.phase(), BoardPhase::Clean);
        assert!(mem.get("b1").unwrap().meta.updated_at.is_some());
    }

    #[test]
    fn open_missing_board_keeps_current_one() {
        let (mut board, _, _) = open_board();
        board.add_node(NodeKind::Text, None, None).unwrap();
        assert!(matches!(board.open("nope"), Err(BoardError::DocumentNotFound(_))));
        assert_eq!(board.document_id(), Some("b1"));
        assert_eq!(board.phase(), BoardPhase::Dirty);
    }

    #[test]
    fn selection_and_measurement_stay_clean() {
        let (mut board, _, _) = open_board();
        let a = board.add_node(NodeKind::Text, None, None).unwrap();
        board.save().unwrap();
        board.select_only(a);
        board.report_measured(a, Size::new(10.0, 10.0));
        board.deselect_all();
        assert_eq!(board.phase(), BoardPhase::Clean);
    }

    #[test]
    fn measurement_that_reshapes_a_group_is_saved() {
        let (mut board, _, mem) = open_board();
        let a = board.add_node(NodeKind::Text, Some(Position::new(0.0, 0.0)), None).unwrap();
        let b = board.add_node(NodeKind::Text, Some(Position::new(400.0, 0.0)), None).unwrap();
        let gid = board.create_group(&[a, b], None).unwrap();
        board.save().unwrap();

        board.report_measured(b, Size::new(340.0, 700.0));
        assert_eq!(board.phase(), BoardPhase::Dirty);
        board.save().unwrap();
        let saved = mem.get("b1").unwrap();
        let group = saved.groups.iter().find(|g| g.id == gid).unwrap();
        assert!(group.size.height >= 700.0);
    }
}

