pub mod document;
pub mod dom;
pub mod table;

pub use document::{append_table, Dom, Document, Listener};
pub use dom::{ActivationEvent, DomMut, DomTree, MutationRecord, NodeId, TagKind};
pub use table::{normalize_cell_text, TableSnapshot};
