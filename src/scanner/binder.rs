use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, warn};

use crate::clipboard::ClipboardWriter;
use crate::config::ExtensionConfig;
use crate::error::DomError;
use crate::export::Exporter;
use crate::models::{ActivationEvent, Dom, DomMut, DomTree, NodeId, TableSnapshot, TagKind};
use crate::ui::{ControlState, FeedbackPresenter, NoticeKind};

pub const CONTROL_CLASS: &str = "table-copy-btn";

const CONTROL_STYLES: &[(&str, &str)] = &[
    ("position", "absolute"),
    ("top", "-40px"),
    ("right", "0"),
    ("background", "#2196F3"),
    ("color", "white"),
    ("border", "none"),
    ("padding", "8px 16px"),
    ("border-radius", "6px"),
    ("cursor", "pointer"),
    ("z-index", "1000"),
    ("white-space", "nowrap"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingStatus {
    Attached,
}

/// Control attached to one table. The table is referenced by id only; the
/// host document owns its lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlBinding {
    pub table: NodeId,
    pub control: NodeId,
    pub container: NodeId,
    pub status: BindingStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindOutcome {
    Bound(ControlBinding),
    AlreadyBound,
    Detached,
}

#[derive(Default)]
struct RegistryInner {
    by_table: HashMap<NodeId, ControlBinding>,
    by_control: HashMap<NodeId, NodeId>,
}

impl RegistryInner {
    fn record(&mut self, binding: ControlBinding) {
        self.by_control.insert(binding.control, binding.table);
        self.by_table.insert(binding.table, binding);
    }
}

/// Table → binding index. Presence of a table here is the "already has a
/// control" marker.
#[derive(Clone, Default)]
pub struct BindingRegistry {
    inner: Arc<Mutex<RegistryInner>>,
}

impl BindingRegistry {
    fn lock(&self) -> MutexGuard<'_, RegistryInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn is_bound(&self, table: NodeId) -> bool {
        self.lock().by_table.contains_key(&table)
    }

    pub fn get(&self, table: NodeId) -> Option<ControlBinding> {
        self.lock().by_table.get(&table).copied()
    }

    pub fn table_for_control(&self, control: NodeId) -> Option<NodeId> {
        self.lock().by_control.get(&control).copied()
    }

    pub fn len(&self) -> usize {
        self.lock().by_table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn bindings(&self) -> Vec<ControlBinding> {
        let mut all: Vec<_> = self.lock().by_table.values().copied().collect();
        all.sort_by_key(|b| b.table);
        all
    }

    /// Forgets bindings whose table has left the document.
    pub fn prune(&self, dom: &Dom) -> usize {
        let mut inner = self.lock();
        let stale: Vec<ControlBinding> = dom.read(|tree| {
            inner
                .by_table
                .values()
                .filter(|b| !tree.contains(b.table))
                .copied()
                .collect()
        });
        for binding in &stale {
            inner.by_table.remove(&binding.table);
            inner.by_control.remove(&binding.control);
        }
        stale.len()
    }
}

/// Attaches copy controls to tables and runs the copy pipeline when one is
/// activated.
#[derive(Clone)]
pub struct ControlBinder {
    dom: Dom,
    registry: BindingRegistry,
    clipboard: Arc<ClipboardWriter>,
    presenter: FeedbackPresenter,
    exporter: Arc<dyn Exporter + Send + Sync>,
    config: Arc<ExtensionConfig>,
}

impl ControlBinder {
    pub fn new(
        dom: Dom,
        registry: BindingRegistry,
        clipboard: Arc<ClipboardWriter>,
        presenter: FeedbackPresenter,
        config: Arc<ExtensionConfig>,
    ) -> Self {
        let exporter: Arc<dyn Exporter + Send + Sync> = Arc::from(config.exporter());
        Self {
            dom,
            registry,
            clipboard,
            presenter,
            exporter,
            config,
        }
    }

    pub fn registry(&self) -> &BindingRegistry {
        &self.registry
    }

    /// Attaches a control to `table` unless it already has one. The registry
    /// stays locked from the check until the binding is recorded, so
    /// concurrent scans cannot both attach.
    pub fn bind(&self, table: NodeId) -> BindOutcome {
        let mut registry = self.registry.lock();
        if registry.by_table.contains_key(&table) {
            return BindOutcome::AlreadyBound;
        }

        let inserted = self.dom.mutate(|tree| self.insert_control(tree, table));
        let (control, container) = match inserted {
            Ok(Some(placed)) => placed,
            Ok(None) => {
                debug!("Table {} has no container, skipping", table);
                return BindOutcome::Detached;
            }
            Err(e) => {
                warn!("Failed to attach control to table {}: {}", table, e);
                return BindOutcome::Detached;
            }
        };

        let binding = ControlBinding {
            table,
            control,
            container,
            status: BindingStatus::Attached,
        };
        registry.record(binding);
        drop(registry);

        let binder = self.clone();
        self.dom.add_listener(
            control,
            Arc::new(move |event: &mut ActivationEvent| {
                event.prevent_default();
                event.stop_propagation();
                binder.spawn_copy(table, control);
            }),
        );

        debug!("Attached control {} to table {}", control, table);
        BindOutcome::Bound(binding)
    }

    fn insert_control(
        &self,
        tree: &mut dyn DomMut,
        table: NodeId,
    ) -> Result<Option<(NodeId, NodeId)>, DomError> {
        let container = match tree
            .closest_ancestor(table, &TagKind::Div)
            .or_else(|| tree.parent(table))
        {
            Some(container) => container,
            None => return Ok(None),
        };

        let control = tree.create_element(TagKind::Button);
        tree.add_class(control, CONTROL_CLASS)?;
        for (property, value) in CONTROL_STYLES {
            tree.set_style(control, property, value)?;
        }
        tree.set_text(control, &self.config.initial_label)?;

        tree.set_style(container, "position", "relative")?;
        tree.append_child(container, control)?;
        Ok(Some((control, container)))
    }

    fn spawn_copy(&self, table: NodeId, control: NodeId) {
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let binder = self.clone();
                handle.spawn(async move {
                    binder.copy_table(table, control).await;
                });
            }
            Err(e) => warn!("No runtime to run copy for table {}: {}", table, e),
        }
    }

    /// Serializes `table`, writes it to the clipboard and reports the result.
    pub async fn copy_table(&self, table: NodeId, control: NodeId) -> bool {
        let rendered = self.dom.read(|tree| {
            let snapshot = TableSnapshot::capture(tree, table);
            self.exporter.render(&snapshot)
        });

        let success = match rendered {
            Ok(text) => self.clipboard.write(&text).await,
            Err(e) => {
                warn!("Failed to render table {}: {}", table, e);
                false
            }
        };

        if success {
            self.presenter.notify(&self.config.success_message, NoticeKind::Success);
            self.presenter.set_control_state(control, ControlState::Copied);
        } else {
            self.presenter.notify(&self.config.error_message, NoticeKind::Error);
        }
        success
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clipboard::MemoryClipboard;
    use crate::models::{append_table, Document};

    fn binder(dom: &Dom, clipboard: &Arc<MemoryClipboard>) -> ControlBinder {
        let config = Arc::new(ExtensionConfig::default());
        let writer = ClipboardWriter::new(dom.clone(), Some(clipboard.clone()), true, clipboard.clone());
        ControlBinder::new(
            dom.clone(),
            BindingRegistry::default(),
            Arc::new(writer),
            FeedbackPresenter::new(dom.clone(), config.clone()),
            config,
        )
    }

    #[test]
    fn test_bind_places_control_in_nearest_div() {
        let dom = Dom::new(Document::new());
        let clipboard = Arc::new(MemoryClipboard::new());
        let binder = binder(&dom, &clipboard);
        let (wrapper, table) = dom.mutate(|d| {
            let body = d.body();
            let wrapper = d.create_element(TagKind::Div);
            let section = d.create_element(TagKind::Other("section".to_string()));
            d.append_child(wrapper, section).unwrap();
            d.append_child(body, wrapper).unwrap();
            let table = append_table(d, section, Some(&["H"]), &[&["v"]]).unwrap();
            (wrapper, table)
        });

        let BindOutcome::Bound(binding) = binder.bind(table) else {
            panic!("expected binding");
        };
        assert_eq!(binding.container, wrapper);
        assert_eq!(binding.status, BindingStatus::Attached);
        dom.read(|d| {
            assert_eq!(d.parent(binding.control), Some(wrapper));
            assert!(d.has_class(binding.control, CONTROL_CLASS));
            assert_eq!(d.text_content(binding.control), "📋");
            assert_eq!(d.style(wrapper, "position").as_deref(), Some("relative"));
        });
    }

    #[test]
    fn test_bind_falls_back_to_parent_and_is_idempotent() {
        let dom = Dom::new(Document::new());
        let clipboard = Arc::new(MemoryClipboard::new());
        let binder = binder(&dom, &clipboard);
        let table = dom.mutate(|d| {
            let body = d.body();
            append_table(d, body, Some(&["H"]), &[]).unwrap()
        });

        let first = binder.bind(table);
        assert!(matches!(first, BindOutcome::Bound(b) if b.container == dom.read(|d| d.body())));
        assert_eq!(binder.bind(table), BindOutcome::AlreadyBound);
        assert_eq!(binder.registry().len(), 1);
    }

    #[test]
    fn test_detached_table_is_skipped() {
        let dom = Dom::new(Document::new());
        let clipboard = Arc::new(MemoryClipboard::new());
        let binder = binder(&dom, &clipboard);
        let table = dom.mutate(|d| d.create_element(TagKind::Table));

        assert_eq!(binder.bind(table), BindOutcome::Detached);
        assert!(binder.registry().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_click_copies_table_as_tsv() {
        let dom = Dom::new(Document::new());
        let clipboard = Arc::new(MemoryClipboard::new());
        let binder = binder(&dom, &clipboard);
        let table = dom.mutate(|d| {
            let body = d.body();
            append_table(d, body, Some(&["A", "B"]), &[&["C", "D E"]]).unwrap()
        });
        let BindOutcome::Bound(binding) = binder.bind(table) else {
            panic!("expected binding");
        };

        let event = dom.click(binding.control);
        assert!(event.default_prevented());
        assert!(event.propagation_stopped());

        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        assert_eq!(clipboard.contents().as_deref(), Some("A\tB\nC\tD E"));
        assert_eq!(dom.read(|d| d.text_content(binding.control)), "✅ Copied!");
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_copy_shows_error_and_keeps_label() {
        let dom = Dom::new(Document::new());
        let clipboard = Arc::new(MemoryClipboard::new());
        clipboard.set_reject_writes(true);
        clipboard.set_legacy_fails(true);
        let binder = binder(&dom, &clipboard);
        let table = dom.mutate(|d| {
            let body = d.body();
            append_table(d, body, Some(&["A"]), &[]).unwrap()
        });
        let BindOutcome::Bound(binding) = binder.bind(table) else {
            panic!("expected binding");
        };

        assert!(!binder.copy_table(table, binding.control).await);
        dom.read(|d| {
            assert_eq!(d.text_content(binding.control), "📋");
            let banner_text: Vec<String> = d
                .descendants(d.body())
                .into_iter()
                .filter(|n| d.has_class(*n, crate::ui::feedback::NOTIFICATION_CLASS))
                .map(|n| d.text_content(n))
                .collect();
            assert_eq!(banner_text, vec!["❌ Failed to copy table".to_string()]);
        });
    }

    #[test]
    fn test_prune_forgets_removed_tables() {
        let dom = Dom::new(Document::new());
        let clipboard = Arc::new(MemoryClipboard::new());
        let binder = binder(&dom, &clipboard);
        let table = dom.mutate(|d| {
            let body = d.body();
            let div = d.create_element(TagKind::Div);
            d.append_child(body, div).unwrap();
            append_table(d, div, Some(&["H"]), &[]).unwrap()
        });
        binder.bind(table);

        dom.mutate(|d| d.remove(table).unwrap());
        assert_eq!(binder.registry().prune(&dom), 1);
        assert!(!binder.registry().is_bound(table));
    }
}
