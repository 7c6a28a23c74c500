pub mod binder;
pub mod watcher;

use tracing::debug;

use crate::models::{Dom, DomTree, NodeId, TagKind};

pub use binder::{BindOutcome, BindingRegistry, BindingStatus, ControlBinder, ControlBinding, CONTROL_CLASS};
pub use watcher::{ChangeWatcher, WatcherHandle};

/// Only tables with header markup get a control; header-less tables are
/// usually layout scaffolding.
pub fn qualifies<D: DomTree + ?Sized>(dom: &D, table: NodeId) -> bool {
    dom.descendants(table)
        .into_iter()
        .any(|n| matches!(dom.tag(n), Some(TagKind::Th) | Some(TagKind::Thead)))
}

/// Every table at or below `root`, in document order.
pub fn find_tables<D: DomTree + ?Sized>(dom: &D, root: NodeId) -> Vec<NodeId> {
    let mut tables = Vec::new();
    if dom.tag(root) == Some(TagKind::Table) {
        tables.push(root);
    }
    tables.extend(dom.descendants_with_tag(root, &TagKind::Table));
    tables
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub found: usize,
    pub qualifying: usize,
    pub bound: usize,
}

#[derive(Clone)]
pub struct TableScanner {
    dom: Dom,
    binder: ControlBinder,
}

impl TableScanner {
    pub fn new(dom: Dom, binder: ControlBinder) -> Self {
        Self { dom, binder }
    }

    pub fn binder(&self) -> &ControlBinder {
        &self.binder
    }

    /// Attaches a control to every qualifying, not yet bound table under
    /// `root`. Safe to call any number of times.
    pub fn scan(&self, root: NodeId) -> ScanReport {
        // Collect first; binding mutates the tree.
        let (found, candidates) = self.dom.read(|tree| {
            let tables = find_tables(tree, root);
            let found = tables.len();
            let candidates: Vec<NodeId> = tables
                .into_iter()
                .filter(|t| qualifies(tree, *t))
                .collect();
            (found, candidates)
        });

        let qualifying = candidates.len();
        let bound = candidates
            .into_iter()
            .filter(|table| matches!(self.binder.bind(*table), BindOutcome::Bound(_)))
            .count();

        debug!(
            "Scan of {}: {} tables, {} qualifying, {} newly bound",
            root, found, qualifying, bound
        );
        ScanReport {
            found,
            qualifying,
            bound,
        }
    }
}
