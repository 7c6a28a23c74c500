use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::DomError;

/// Stable identity of a node within one document. Never reused while the
/// document lives, so it is safe to key side tables by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TagKind {
    Html,
    Head,
    Body,
    Style,
    Div,
    Span,
    Paragraph,
    Button,
    Textarea,
    Table,
    Thead,
    Tbody,
    Tfoot,
    Tr,
    Th,
    Td,
    Other(String),
}

impl TagKind {
    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "html" => Self::Html,
            "head" => Self::Head,
            "body" => Self::Body,
            "style" => Self::Style,
            "div" => Self::Div,
            "span" => Self::Span,
            "p" => Self::Paragraph,
            "button" => Self::Button,
            "textarea" => Self::Textarea,
            "table" => Self::Table,
            "thead" => Self::Thead,
            "tbody" => Self::Tbody,
            "tfoot" => Self::Tfoot,
            "tr" => Self::Tr,
            "th" => Self::Th,
            "td" => Self::Td,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Html => "html",
            Self::Head => "head",
            Self::Body => "body",
            Self::Style => "style",
            Self::Div => "div",
            Self::Span => "span",
            Self::Paragraph => "p",
            Self::Button => "button",
            Self::Textarea => "textarea",
            Self::Table => "table",
            Self::Thead => "thead",
            Self::Tbody => "tbody",
            Self::Tfoot => "tfoot",
            Self::Tr => "tr",
            Self::Th => "th",
            Self::Td => "td",
            Self::Other(name) => name,
        }
    }

    pub fn is_cell(&self) -> bool {
        matches!(self, Self::Th | Self::Td)
    }
}

impl fmt::Display for TagKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One child-list change, as reported to observers.
#[derive(Debug, Clone, PartialEq)]
pub struct MutationRecord {
    pub target: NodeId,
    pub added: Vec<NodeId>,
    pub removed: Vec<NodeId>,
}

/// Read-only view of a document tree.
///
/// Everything that only inspects structure (serialization, qualification,
/// mutation relevance) is written against this trait so that any tree
/// representation can sit behind it.
pub trait DomTree {
    fn root(&self) -> NodeId;

    fn body(&self) -> NodeId;

    /// Tag of an element, `None` for text nodes and unknown ids.
    fn tag(&self, node: NodeId) -> Option<TagKind>;

    fn children(&self, node: NodeId) -> Vec<NodeId>;

    fn parent(&self, node: NodeId) -> Option<NodeId>;

    /// Concatenated text of every descendant text node, in document order.
    fn text_content(&self, node: NodeId) -> String;

    fn has_class(&self, node: NodeId, class: &str) -> bool;

    fn style(&self, node: NodeId, property: &str) -> Option<String>;

    /// True when `node` is reachable from the root.
    fn contains(&self, node: NodeId) -> bool {
        let mut current = node;
        loop {
            if current == self.root() {
                return true;
            }
            match self.parent(current) {
                Some(parent) => current = parent,
                None => return false,
            }
        }
    }

    /// True when `node` is `ancestor` or lies below it.
    fn is_inclusive_descendant(&self, node: NodeId, ancestor: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(n) = current {
            if n == ancestor {
                return true;
            }
            current = self.parent(n);
        }
        false
    }

    /// Pre-order list of every node strictly below `node`.
    fn descendants(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(node).into_iter().rev().collect();
        while let Some(n) = stack.pop() {
            out.push(n);
            stack.extend(self.children(n).into_iter().rev());
        }
        out
    }

    fn descendants_with_tag(&self, node: NodeId, tag: &TagKind) -> Vec<NodeId> {
        self.descendants(node)
            .into_iter()
            .filter(|n| self.tag(*n).as_ref() == Some(tag))
            .collect()
    }

    /// Nearest ancestor (excluding `node` itself) carrying `tag`.
    fn closest_ancestor(&self, node: NodeId, tag: &TagKind) -> Option<NodeId> {
        let mut current = self.parent(node);
        while let Some(n) = current {
            if self.tag(n).as_ref() == Some(tag) {
                return Some(n);
            }
            current = self.parent(n);
        }
        None
    }
}

/// Write side of the document capability.
pub trait DomMut: DomTree {
    fn create_element(&mut self, tag: TagKind) -> NodeId;

    fn create_text(&mut self, text: &str) -> NodeId;

    /// Moves `child` under `parent` (detaching it from any previous parent).
    fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), DomError>;

    /// Detaches `node` and its subtree from its parent.
    fn remove(&mut self, node: NodeId) -> Result<(), DomError>;

    /// Replaces the children of `node` with a single text node.
    fn set_text(&mut self, node: NodeId, text: &str) -> Result<(), DomError>;

    fn set_style(&mut self, node: NodeId, property: &str, value: &str) -> Result<(), DomError>;

    fn add_class(&mut self, node: NodeId, class: &str) -> Result<(), DomError>;

    fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) -> Result<(), DomError>;

    fn attribute(&self, node: NodeId, name: &str) -> Option<String>;

    /// Form value of an editable element.
    fn set_value(&mut self, node: NodeId, value: &str) -> Result<(), DomError>;

    fn value(&self, node: NodeId) -> Option<String>;

    fn focus(&mut self, node: NodeId) -> Result<(), DomError>;

    fn focused(&self) -> Option<NodeId>;

    /// Selects the whole content of an editable element.
    fn select_contents(&mut self, node: NodeId) -> Result<(), DomError>;

    fn selection(&self) -> Option<String>;

    /// Drains child-list changes recorded since the last call.
    fn take_records(&mut self) -> Vec<MutationRecord>;
}

/// Dispatched to activation listeners; bubbles from the target to the root.
#[derive(Debug, Clone)]
pub struct ActivationEvent {
    pub target: NodeId,
    pub current_target: NodeId,
    default_prevented: bool,
    propagation_stopped: bool,
}

impl ActivationEvent {
    pub fn new(target: NodeId) -> Self {
        Self {
            target,
            current_target: target,
            default_prevented: false,
            propagation_stopped: false,
        }
    }

    pub fn prevent_default(&mut self) {
        self.default_prevented = true;
    }

    pub fn stop_propagation(&mut self) {
        self.propagation_stopped = true;
    }

    pub fn default_prevented(&self) -> bool {
        self.default_prevented
    }

    pub fn propagation_stopped(&self) -> bool {
        self.propagation_stopped
    }
}
