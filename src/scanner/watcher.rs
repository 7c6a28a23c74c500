use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{find_tables, TableScanner};
use crate::models::{Dom, DomTree, MutationRecord, NodeId};

/// True when any node added in `batch` is a table or contains one.
pub fn batch_is_relevant<D: DomTree + ?Sized>(dom: &D, batch: &[MutationRecord]) -> bool {
    batch
        .iter()
        .flat_map(|record| record.added.iter())
        .any(|node| !find_tables(dom, *node).is_empty())
}

#[derive(Debug, Default)]
pub struct WatcherStats {
    batches_seen: AtomicUsize,
    relevant_batches: AtomicUsize,
    rescans_completed: AtomicUsize,
}

impl WatcherStats {
    pub fn batches_seen(&self) -> usize {
        self.batches_seen.load(Ordering::SeqCst)
    }

    pub fn relevant_batches(&self) -> usize {
        self.relevant_batches.load(Ordering::SeqCst)
    }

    pub fn rescans_completed(&self) -> usize {
        self.rescans_completed.load(Ordering::SeqCst)
    }
}

/// Live subscription returned by [`ChangeWatcher::start`]. Kept for the
/// lifetime of the page; there is no stop operation.
pub struct WatcherHandle {
    root: NodeId,
    stats: Arc<WatcherStats>,
    task: JoinHandle<()>,
}

impl WatcherHandle {
    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn is_active(&self) -> bool {
        !self.task.is_finished()
    }

    pub fn stats(&self) -> &WatcherStats {
        &self.stats
    }
}

pub struct ChangeWatcher;

impl ChangeWatcher {
    /// Observes `root` for inserted tables. Each relevant batch schedules one
    /// delayed rescan of `root` so the inserted content can finish rendering;
    /// overlapping rescans are harmless because scanning is idempotent.
    /// Returns `None` when called outside a tokio runtime.
    pub fn start(
        dom: &Dom,
        root: NodeId,
        scanner: TableScanner,
        delay: Duration,
    ) -> Option<WatcherHandle> {
        let runtime = match Handle::try_current() {
            Ok(runtime) => runtime,
            Err(e) => {
                warn!("No runtime to watch {}: {}", root, e);
                return None;
            }
        };

        let mut batches = dom.observe(root);
        let stats = Arc::new(WatcherStats::default());
        let task_stats = stats.clone();
        let dom = dom.clone();

        let rescans = runtime.clone();
        let task = runtime.spawn(async move {
            while let Some(batch) = batches.recv().await {
                task_stats.batches_seen.fetch_add(1, Ordering::SeqCst);
                if !dom.read(|tree| batch_is_relevant(tree, &batch)) {
                    continue;
                }

                task_stats.relevant_batches.fetch_add(1, Ordering::SeqCst);
                debug!("Tables inserted under {}, rescanning in {:?}", root, delay);

                let scanner = scanner.clone();
                let rescan_stats = task_stats.clone();
                rescans.spawn(async move {
                    tokio::time::sleep(delay).await;
                    scanner.scan(root);
                    rescan_stats.rescans_completed.fetch_add(1, Ordering::SeqCst);
                });
            }
        });

        info!("Watching {} for new tables", root);
        Some(WatcherHandle { root, stats, task })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clipboard::{ClipboardWriter, MemoryClipboard};
    use crate::config::ExtensionConfig;
    use crate::models::{append_table, Document, DomMut, TagKind};
    use crate::scanner::{BindingRegistry, ControlBinder};
    use crate::ui::FeedbackPresenter;

    fn scanner(dom: &Dom) -> TableScanner {
        let clipboard = Arc::new(MemoryClipboard::new());
        let config = Arc::new(ExtensionConfig::default());
        let writer = ClipboardWriter::new(dom.clone(), None, false, clipboard);
        let binder = ControlBinder::new(
            dom.clone(),
            BindingRegistry::default(),
            Arc::new(writer),
            FeedbackPresenter::new(dom.clone(), config.clone()),
            config,
        );
        TableScanner::new(dom.clone(), binder)
    }

    #[test]
    fn test_start_outside_runtime_returns_none() {
        let dom = Dom::new(Document::new());
        let body = dom.read(|d| d.body());
        let watcher = ChangeWatcher::start(&dom, body, scanner(&dom), Duration::from_millis(100));
        assert!(watcher.is_none());
    }

    #[test]
    fn test_relevance_of_added_nodes() {
        let mut doc = Document::new();
        let body = doc.body();
        let wrapper = doc.create_element(TagKind::Div);
        let table = append_table(&mut doc, wrapper, Some(&["H"]), &[]).unwrap();
        let para = doc.create_element(TagKind::Paragraph);

        let nested = vec![MutationRecord {
            target: body,
            added: vec![wrapper],
            removed: Vec::new(),
        }];
        let direct = vec![MutationRecord {
            target: body,
            added: vec![table],
            removed: Vec::new(),
        }];
        let plain = vec![MutationRecord {
            target: body,
            added: vec![para],
            removed: vec![wrapper],
        }];

        assert!(batch_is_relevant(&doc, &nested));
        assert!(batch_is_relevant(&doc, &direct));
        assert!(!batch_is_relevant(&doc, &plain));
    }
}
