use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use crate::board::model::BoardDocument;

pub mod export;
pub mod migrate;
pub mod persist;
pub mod settings;

/// Where boards come from and go to. Implementations own the transport;
/// `load` returns `Ok(None)` when the board does not exist and `Err` when
/// it exists but cannot be parsed.
pub trait PersistenceAdapter {
    fn load(&mut self, id: &str) -> anyhow::Result<Option<BoardDocument>>;
    fn save(&mut self, doc: &BoardDocument) -> anyhow::Result<()>;
}

/// In-process adapter. Clones share storage, which lets a caller inspect
/// what a board saved.
#[derive(Clone, Debug, Default)]
pub struct MemoryPersistence {
    docs: Rc<RefCell<HashMap<String, BoardDocument>>>,
    failing: Rc<Cell<bool>>,
    saves: Rc<Cell<usize>>,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, doc: BoardDocument) {
        self.docs.borrow_mut().insert(doc.id.clone(), doc);
    }

    pub fn get(&self, id: &str) -> Option<BoardDocument> {
        self.docs.borrow().get(id).cloned()
    }

    /// Make subsequent saves fail until switched back.
    pub fn set_failing(&self, failing: bool) {
        self.failing.set(failing);
    }

    /// Number of successful saves so far.
    pub fn save_count(&self) -> usize {
        self.saves.get()
    }
}

impl PersistenceAdapter for MemoryPersistence {
    fn load(&mut self, id: &str) -> anyhow::Result<Option<BoardDocument>> {
        Ok(self.get(id))
    }

    fn save(&mut self, doc: &BoardDocument) -> anyhow::Result<()> {
        if self.failing.get() {
            anyhow::bail!("storage unavailable");
        }
        self.insert(doc.clone());
        self.saves.set(self.saves.get() + 1);
        Ok(())
    }
}
