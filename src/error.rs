use thiserror::Error;

use crate::models::NodeId;

#[derive(Debug, Error)]
pub enum DomError {
    #[error("node {0} does not exist in this document")]
    UnknownNode(NodeId),

    #[error("node {0} is not attached to the document")]
    Detached(NodeId),

    #[error("cannot append node {child} under its own descendant {parent}")]
    CycleRejected { parent: NodeId, child: NodeId },

    #[error("text nodes cannot have children (node {0})")]
    NotAnElement(NodeId),
}

#[derive(Debug, Error)]
pub enum ClipboardError {
    #[error("system clipboard is unavailable")]
    Unavailable,

    #[error("clipboard write was rejected: {0}")]
    Rejected(String),

    #[error("native clipboard error: {0}")]
    Native(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not determine config directory")]
    NoConfigDir,

    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config file: {0}")]
    Parse(#[from] serde_json::Error),
}
