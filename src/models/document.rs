use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;

use super::dom::{ActivationEvent, DomMut, DomTree, MutationRecord, NodeId, TagKind};
use crate::error::DomError;

#[derive(Debug, Clone)]
enum NodeKind {
    Element(TagKind),
    Text(String),
}

#[derive(Debug, Clone)]
struct NodeData {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    classes: Vec<String>,
    styles: BTreeMap<String, String>,
    attributes: BTreeMap<String, String>,
    value: Option<String>,
}

impl NodeData {
    fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            parent: None,
            children: Vec::new(),
            classes: Vec::new(),
            styles: BTreeMap::new(),
            attributes: BTreeMap::new(),
            value: None,
        }
    }
}

/// In-memory document: an arena of nodes with `html > (head, body)` created
/// up front. Child-list changes are buffered until `take_records`.
#[derive(Debug)]
pub struct Document {
    nodes: Vec<NodeData>,
    root: NodeId,
    head: NodeId,
    body: NodeId,
    focused: Option<NodeId>,
    selection: Option<String>,
    pending: Vec<MutationRecord>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        let mut doc = Self {
            nodes: Vec::new(),
            root: NodeId(0),
            head: NodeId(0),
            body: NodeId(0),
            focused: None,
            selection: None,
            pending: Vec::new(),
        };
        let root = doc.alloc(NodeKind::Element(TagKind::Html));
        let head = doc.alloc(NodeKind::Element(TagKind::Head));
        let body = doc.alloc(NodeKind::Element(TagKind::Body));
        doc.link(root, head);
        doc.link(root, body);
        doc.root = root;
        doc.head = head;
        doc.body = body;
        doc
    }

    pub fn head(&self) -> NodeId {
        self.head
    }

    fn alloc(&mut self, kind: NodeKind) -> NodeId {
        self.nodes.push(NodeData::new(kind));
        NodeId(self.nodes.len() - 1)
    }

    fn link(&mut self, parent: NodeId, child: NodeId) {
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
    }

    fn node(&self, id: NodeId) -> Result<&NodeData, DomError> {
        self.nodes.get(id.0).ok_or(DomError::UnknownNode(id))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut NodeData, DomError> {
        self.nodes.get_mut(id.0).ok_or(DomError::UnknownNode(id))
    }

    fn element_mut(&mut self, id: NodeId) -> Result<&mut NodeData, DomError> {
        let node = self.node_mut(id)?;
        match node.kind {
            NodeKind::Element(_) => Ok(node),
            NodeKind::Text(_) => Err(DomError::NotAnElement(id)),
        }
    }

    fn unlink(&mut self, node: NodeId) -> Option<NodeId> {
        let parent = self.nodes[node.0].parent.take()?;
        self.nodes[parent.0].children.retain(|c| *c != node);
        Some(parent)
    }

    fn collect_text(&self, node: NodeId, out: &mut String) {
        let Some(data) = self.nodes.get(node.0) else {
            return;
        };
        match &data.kind {
            NodeKind::Text(text) => out.push_str(text),
            NodeKind::Element(_) => {
                for child in &data.children {
                    self.collect_text(*child, out);
                }
            }
        }
    }
}

impl DomTree for Document {
    fn root(&self) -> NodeId {
        self.root
    }

    fn body(&self) -> NodeId {
        self.body
    }

    fn tag(&self, node: NodeId) -> Option<TagKind> {
        match &self.nodes.get(node.0)?.kind {
            NodeKind::Element(tag) => Some(tag.clone()),
            NodeKind::Text(_) => None,
        }
    }

    fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.nodes
            .get(node.0)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.get(node.0)?.parent
    }

    fn text_content(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(node, &mut out);
        out
    }

    fn has_class(&self, node: NodeId, class: &str) -> bool {
        self.nodes
            .get(node.0)
            .map(|n| n.classes.iter().any(|c| c == class))
            .unwrap_or(false)
    }

    fn style(&self, node: NodeId, property: &str) -> Option<String> {
        self.nodes.get(node.0)?.styles.get(property).cloned()
    }
}

impl DomMut for Document {
    fn create_element(&mut self, tag: TagKind) -> NodeId {
        self.alloc(NodeKind::Element(tag))
    }

    fn create_text(&mut self, text: &str) -> NodeId {
        self.alloc(NodeKind::Text(text.to_string()))
    }

    fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        self.element_mut(parent)?;
        self.node(child)?;
        if self.is_inclusive_descendant(parent, child) {
            return Err(DomError::CycleRejected { parent, child });
        }

        if let Some(old_parent) = self.unlink(child) {
            self.pending.push(MutationRecord {
                target: old_parent,
                added: Vec::new(),
                removed: vec![child],
            });
        }
        self.link(parent, child);
        self.pending.push(MutationRecord {
            target: parent,
            added: vec![child],
            removed: Vec::new(),
        });
        Ok(())
    }

    fn remove(&mut self, node: NodeId) -> Result<(), DomError> {
        self.node(node)?;
        if let Some(parent) = self.unlink(node) {
            self.pending.push(MutationRecord {
                target: parent,
                added: Vec::new(),
                removed: vec![node],
            });
        }
        if self.focused.is_some_and(|f| self.is_inclusive_descendant(f, node)) {
            self.focused = None;
        }
        Ok(())
    }

    fn set_text(&mut self, node: NodeId, text: &str) -> Result<(), DomError> {
        if let NodeKind::Text(data) = &mut self.node_mut(node)?.kind {
            *data = text.to_string();
            return Ok(());
        }

        let old_children = std::mem::take(&mut self.nodes[node.0].children);
        for child in &old_children {
            self.nodes[child.0].parent = None;
        }
        let text_node = self.create_text(text);
        self.link(node, text_node);
        self.pending.push(MutationRecord {
            target: node,
            added: vec![text_node],
            removed: old_children,
        });
        Ok(())
    }

    fn set_style(&mut self, node: NodeId, property: &str, value: &str) -> Result<(), DomError> {
        self.element_mut(node)?
            .styles
            .insert(property.to_string(), value.to_string());
        Ok(())
    }

    fn add_class(&mut self, node: NodeId, class: &str) -> Result<(), DomError> {
        let data = self.element_mut(node)?;
        if !data.classes.iter().any(|c| c == class) {
            data.classes.push(class.to_string());
        }
        Ok(())
    }

    fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) -> Result<(), DomError> {
        self.element_mut(node)?
            .attributes
            .insert(name.to_string(), value.to_string());
        Ok(())
    }

    fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        self.nodes.get(node.0)?.attributes.get(name).cloned()
    }

    fn set_value(&mut self, node: NodeId, value: &str) -> Result<(), DomError> {
        self.element_mut(node)?.value = Some(value.to_string());
        Ok(())
    }

    fn value(&self, node: NodeId) -> Option<String> {
        self.nodes.get(node.0)?.value.clone()
    }

    fn focus(&mut self, node: NodeId) -> Result<(), DomError> {
        self.node(node)?;
        if !self.contains(node) {
            return Err(DomError::Detached(node));
        }
        self.focused = Some(node);
        Ok(())
    }

    fn focused(&self) -> Option<NodeId> {
        self.focused
    }

    fn select_contents(&mut self, node: NodeId) -> Result<(), DomError> {
        let data = self.node(node)?;
        let selected = match &data.value {
            Some(value) => value.clone(),
            None => self.text_content(node),
        };
        self.selection = Some(selected);
        Ok(())
    }

    fn selection(&self) -> Option<String> {
        self.selection.clone()
    }

    fn take_records(&mut self) -> Vec<MutationRecord> {
        std::mem::take(&mut self.pending)
    }
}

pub type Listener = Arc<dyn Fn(&mut ActivationEvent) + Send + Sync>;

struct Observer {
    target: NodeId,
    tx: mpsc::UnboundedSender<Vec<MutationRecord>>,
}

#[derive(Default)]
struct Registry {
    observers: Vec<Observer>,
    listeners: HashMap<NodeId, Vec<Listener>>,
}

type SharedTree = Arc<Mutex<Box<dyn DomMut + Send>>>;

/// Shared handle to a document. Cloning is cheap; all clones see the same
/// tree, observers and activation listeners.
#[derive(Clone)]
pub struct Dom {
    tree: SharedTree,
    registry: Arc<Mutex<Registry>>,
}

impl Dom {
    pub fn new<D>(tree: D) -> Self
    where
        D: DomMut + Send + 'static,
    {
        let tree: Box<dyn DomMut + Send> = Box::new(tree);
        Self {
            tree: Arc::new(Mutex::new(tree)),
            registry: Arc::new(Mutex::new(Registry::default())),
        }
    }

    fn lock_tree(&self) -> MutexGuard<'_, Box<dyn DomMut + Send>> {
        self.tree.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_registry(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn read<R>(&self, f: impl FnOnce(&dyn DomMut) -> R) -> R {
        let tree = self.lock_tree();
        f(&**tree)
    }

    /// Runs `f` against the tree, then delivers every child-list change it
    /// made to interested observers as a single batch.
    pub fn mutate<R>(&self, f: impl FnOnce(&mut dyn DomMut) -> R) -> R {
        let mut tree = self.lock_tree();
        let result = f(&mut **tree);
        let records = tree.take_records();
        if records.is_empty() {
            return result;
        }

        let mut registry = self.lock_registry();
        registry.observers.retain(|observer| {
            let batch: Vec<MutationRecord> = records
                .iter()
                .filter(|r| tree.is_inclusive_descendant(r.target, observer.target))
                .cloned()
                .collect();
            if batch.is_empty() {
                return !observer.tx.is_closed();
            }
            observer.tx.send(batch).is_ok()
        });
        result
    }

    /// Subscribes to child-list changes anywhere in the subtree of `target`.
    pub fn observe(&self, target: NodeId) -> mpsc::UnboundedReceiver<Vec<MutationRecord>> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock_registry().observers.push(Observer { target, tx });
        rx
    }

    pub fn add_listener(&self, node: NodeId, listener: Listener) {
        self.lock_registry()
            .listeners
            .entry(node)
            .or_default()
            .push(listener);
    }

    /// Dispatches an activation at `target`, bubbling towards the root.
    /// Listeners run without any lock held so they may touch the document.
    pub fn click(&self, target: NodeId) -> ActivationEvent {
        let mut path = vec![target];
        self.read(|tree| {
            let mut current = tree.parent(target);
            while let Some(node) = current {
                path.push(node);
                current = tree.parent(node);
            }
        });

        let mut event = ActivationEvent::new(target);
        for node in path {
            let listeners = self
                .lock_registry()
                .listeners
                .get(&node)
                .cloned()
                .unwrap_or_default();
            event.current_target = node;
            for listener in listeners {
                listener(&mut event);
            }
            if event.propagation_stopped() {
                break;
            }
        }
        event
    }
}

/// Appends a `table` holding an optional header row and body rows under
/// `parent`. Used by demos and tests to stand in for host-rendered markup.
pub fn append_table(
    tree: &mut dyn DomMut,
    parent: NodeId,
    header: Option<&[&str]>,
    rows: &[&[&str]],
) -> Result<NodeId, DomError> {
    let table = tree.create_element(TagKind::Table);

    if let Some(header) = header {
        let thead = tree.create_element(TagKind::Thead);
        let tr = append_row(tree, TagKind::Th, header)?;
        tree.append_child(thead, tr)?;
        tree.append_child(table, thead)?;
    }

    let tbody = tree.create_element(TagKind::Tbody);
    for row in rows {
        let tr = append_row(tree, TagKind::Td, row)?;
        tree.append_child(tbody, tr)?;
    }
    tree.append_child(table, tbody)?;
    tree.append_child(parent, table)?;
    Ok(table)
}

fn append_row(tree: &mut dyn DomMut, cell: TagKind, values: &[&str]) -> Result<NodeId, DomError> {
    let tr = tree.create_element(TagKind::Tr);
    for value in values {
        let td = tree.create_element(cell.clone());
        let text = tree.create_text(value);
        tree.append_child(td, text)?;
        tree.append_child(tr, td)?;
    }
    Ok(tr)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_content_concatenates_in_order() {
        let mut doc = Document::new();
        let body = doc.body();
        let p = doc.create_element(TagKind::Paragraph);
        let a = doc.create_text("Hello ");
        let span = doc.create_element(TagKind::Span);
        let b = doc.create_text("world");
        doc.append_child(span, b).unwrap();
        doc.append_child(p, a).unwrap();
        doc.append_child(p, span).unwrap();
        doc.append_child(body, p).unwrap();

        assert_eq!(doc.text_content(p), "Hello world");
        assert!(doc.contains(b));
    }

    #[test]
    fn test_remove_detaches_subtree() {
        let mut doc = Document::new();
        let body = doc.body();
        let table = append_table(&mut doc, body, Some(&["H"]), &[&["x"]]).unwrap();
        let cells = doc.descendants_with_tag(table, &TagKind::Td);
        doc.remove(table).unwrap();

        assert!(!doc.contains(table));
        assert!(!doc.contains(cells[0]));
        assert_eq!(doc.parent(table), None);
    }

    #[test]
    fn test_append_rejects_cycles() {
        let mut doc = Document::new();
        let outer = doc.create_element(TagKind::Div);
        let inner = doc.create_element(TagKind::Div);
        doc.append_child(outer, inner).unwrap();

        assert!(matches!(
            doc.append_child(inner, outer),
            Err(DomError::CycleRejected { .. })
        ));
    }

    #[tokio::test]
    async fn test_mutate_delivers_one_batch_per_call() {
        let dom = Dom::new(Document::new());
        let body = dom.read(|d| d.body());
        let mut rx = dom.observe(body);

        dom.mutate(|d| {
            for _ in 0..3 {
                let div = d.create_element(TagKind::Div);
                d.append_child(body, div).unwrap();
            }
        });

        let batch = rx.recv().await.unwrap();
        assert_eq!(batch.len(), 3);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_observer_ignores_changes_outside_subtree() {
        let dom = Dom::new(Document::new());
        let (body, root) = dom.read(|d| (d.body(), d.root()));
        let container = dom.mutate(|d| {
            let div = d.create_element(TagKind::Div);
            d.append_child(body, div).unwrap();
            div
        });
        let mut rx = dom.observe(container);

        dom.mutate(|d| {
            let div = d.create_element(TagKind::Div);
            d.append_child(root, div).unwrap();
        });
        assert!(rx.try_recv().is_err());

        dom.mutate(|d| {
            let div = d.create_element(TagKind::Div);
            d.append_child(container, div).unwrap();
        });
        assert_eq!(rx.recv().await.unwrap().len(), 1);
    }

    #[test]
    fn test_click_bubbles_until_stopped() {
        let dom = Dom::new(Document::new());
        let body = dom.read(|d| d.body());
        let (outer, button) = dom.mutate(|d| {
            let outer = d.create_element(TagKind::Div);
            let button = d.create_element(TagKind::Button);
            d.append_child(outer, button).unwrap();
            d.append_child(body, outer).unwrap();
            (outer, button)
        });

        let outer_hits = Arc::new(Mutex::new(0));
        let hits = outer_hits.clone();
        dom.add_listener(outer, Arc::new(move |_event: &mut ActivationEvent| *hits.lock().unwrap() += 1));

        dom.click(button);
        assert_eq!(*outer_hits.lock().unwrap(), 1);

        dom.add_listener(
            button,
            Arc::new(|event: &mut ActivationEvent| {
                event.prevent_default();
                event.stop_propagation();
            }),
        );
        let event = dom.click(button);
        assert!(event.default_prevented());
        assert_eq!(*outer_hits.lock().unwrap(), 1);
    }
}
