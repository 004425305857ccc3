use crate::board::model::NodeId;

#[derive(Debug, thiserror::Error)]
pub enum BoardError {
    /// Rejected at the call site, nothing was changed.
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("incompatible connection {source_handle} -> {target_handle}: {reason}")]
    IncompatiblePorts {
        source_handle: String,
        target_handle: String,
        reason: String,
    },

    #[error("node {0} does not exist")]
    MissingNode(NodeId),

    #[error("no board is loaded")]
    NotLoaded,

    #[error("board '{0}' not found")]
    DocumentNotFound(String),

    #[error("failed to load board '{id}': {source}")]
    Load {
        id: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("save failed: {0}")]
    Persistence(#[source] anyhow::Error),

    #[error("a save is already in progress")]
    SaveInProgress,

    #[error("history replay already in progress")]
    ReplayInProgress,

    #[error("snapshot serialization failed: {0}")]
    Snapshot(#[from] serde_json::Error),
}

pub type BoardResult<T> = Result<T, BoardError>;
