//! Named node trees driven by their attached formats
//!
//! A [`Node`] is a cheap clonable handle to a tree node: an immutable name,
//! a weak back-reference to its parent, an ordered name-unique child list, a
//! tag map, and at most one owned [`Format`]. Child management follows the
//! format: attaching a container format aliases its child collection into the
//! node, so the container stays authoritative. Parents own children through
//! the child list; the back-reference is weak, so no ownership cycles form.

pub mod format;

pub use format::{ContainerFormat, CustomFormat, Format};

use crate::convert::{ConversionEngine, Converter, FormatType};
use crate::error::{Result, RomkitError};
use ahash::AHashMap;
use std::cell::{Ref, RefCell, RefMut};
use std::collections::VecDeque;
use std::rc::{Rc, Weak};
use tracing::debug;

/// Ordered collection of nodes, unique by name.
///
/// A shared handle: cloning yields another view of the same collection. Used
/// both as a node's child list and as the backing collection of a
/// [`ContainerFormat`]; when a container is attached to a node the two are
/// the same handle.
#[derive(Clone, Default)]
pub struct NodeSet(Rc<RefCell<Vec<Node>>>);

impl NodeSet {
    /// Create an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    /// True when the collection is empty.
    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    /// Node at `index`, in insertion order.
    pub fn get(&self, index: usize) -> Option<Node> {
        self.0.borrow().get(index).cloned()
    }

    /// Node with the given name.
    pub fn by_name(&self, name: &str) -> Option<Node> {
        self.0.borrow().iter().find(|node| node.name() == name).cloned()
    }

    /// Ordinal position of the node with the given name.
    pub fn position_of(&self, name: &str) -> Option<usize> {
        self.0.borrow().iter().position(|node| node.name() == name)
    }

    /// Snapshot of the collection in order.
    pub fn to_vec(&self) -> Vec<Node> {
        self.0.borrow().clone()
    }

    /// Insert a node; a same-name collision replaces in place, preserving the
    /// ordinal position. Returns the replaced node, or `None` when appending
    /// or when the occupant is the same node.
    pub(crate) fn insert_or_replace(&self, node: Node) -> Option<Node> {
        let name = node.name();
        let mut list = self.0.borrow_mut();
        match list.iter().position(|existing| existing.name() == name) {
            Some(index) => {
                if Node::ptr_eq(&list[index], &node) {
                    return None;
                }
                Some(std::mem::replace(&mut list[index], node))
            }
            None => {
                list.push(node);
                None
            }
        }
    }

    /// Remove the node with the given name, keeping sibling order.
    pub(crate) fn remove(&self, name: &str) -> Option<Node> {
        let mut list = self.0.borrow_mut();
        let index = list.iter().position(|node| node.name() == name)?;
        Some(list.remove(index))
    }

    /// Remove a specific node by identity.
    pub(crate) fn remove_node(&self, node: &Node) -> bool {
        let mut list = self.0.borrow_mut();
        match list.iter().position(|existing| Node::ptr_eq(existing, node)) {
            Some(index) => {
                list.remove(index);
                true
            }
            None => false,
        }
    }

    /// Remove every node.
    pub(crate) fn clear(&self) {
        self.0.borrow_mut().clear();
    }
}

struct NodeInner {
    name: String,
    parent: Weak<RefCell<NodeInner>>,
    children: NodeSet,
    tags: AHashMap<String, serde_json::Value>,
    format: Option<Format>,
    disposed: bool,
}

/// Named tree node carrying at most one [`Format`].
///
/// `Node` is a handle (`Clone` is cheap and refers to the same node). The
/// node exclusively owns its current format and disposes it on node disposal;
/// replacing a format hands the previous one back to the caller instead.
#[derive(Clone)]
pub struct Node {
    inner: Rc<RefCell<NodeInner>>,
}

impl Node {
    /// Create a node without a format.
    ///
    /// Names are immutable, non-empty, and must not contain `/`.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.is_empty() || name.contains('/') {
            return Err(RomkitError::InvalidName(name));
        }
        Ok(Node {
            inner: Rc::new(RefCell::new(NodeInner {
                name,
                parent: Weak::new(),
                children: NodeSet::new(),
                tags: AHashMap::new(),
                format: None,
                disposed: false,
            })),
        })
    }

    /// Create a node with an initial format.
    pub fn with_format(name: impl Into<String>, format: Format) -> Result<Self> {
        let node = Self::new(name)?;
        node.set_format(Some(format))?;
        Ok(node)
    }

    /// True when `a` and `b` are handles to the same node.
    pub fn ptr_eq(a: &Node, b: &Node) -> bool {
        Rc::ptr_eq(&a.inner, &b.inner)
    }

    /// Node name.
    pub fn name(&self) -> String {
        self.inner.borrow().name.clone()
    }

    /// Absolute path: `/`-joined ancestor names with an implicit leading `/`.
    pub fn path(&self) -> String {
        let mut segments = vec![self.name()];
        let mut current = self.parent();
        while let Some(ancestor) = current {
            segments.push(ancestor.name());
            current = ancestor.parent();
        }
        segments.reverse();
        format!("/{}", segments.join("/"))
    }

    /// Parent node, when attached.
    pub fn parent(&self) -> Option<Node> {
        self.inner
            .borrow()
            .parent
            .upgrade()
            .map(|inner| Node { inner })
    }

    /// Snapshot of the children in order.
    pub fn children(&self) -> Vec<Node> {
        self.inner.borrow().children.to_vec()
    }

    /// Child with the given name.
    pub fn child(&self, name: &str) -> Option<Node> {
        self.inner.borrow().children.by_name(name)
    }

    /// Number of children.
    pub fn child_count(&self) -> usize {
        self.inner.borrow().children.len()
    }

    /// True once [`dispose`](Self::dispose) has run.
    pub fn is_disposed(&self) -> bool {
        self.inner.borrow().disposed
    }

    /// Attach `child` to this node, moving it from any previous parent.
    ///
    /// Sets the child's parent back-reference. A same-name collision replaces
    /// the existing child in place (same ordinal position) and orphans it.
    /// Attaching this node or one of its ancestors fails with `InvalidState`.
    pub fn add_child(&self, child: Node) -> Result<()> {
        self.ensure_open()?;
        child.ensure_open()?;
        self.ensure_not_ancestor(&child)?;

        if let Some(previous) = child.parent() {
            if !Node::ptr_eq(&previous, self) {
                previous.detach_node(&child);
            }
        }
        child.inner.borrow_mut().parent = Rc::downgrade(&self.inner);

        let set = self.inner.borrow().children.clone();
        if let Some(replaced) = set.insert_or_replace(child) {
            replaced.inner.borrow_mut().parent = Weak::new();
        }
        Ok(())
    }

    /// Detach the named child without disposing it.
    ///
    /// Fails with `Disposed` on a disposed node, like the other structural
    /// operations.
    pub fn remove_child(&self, name: &str) -> Result<Option<Node>> {
        self.ensure_open()?;
        let set = self.inner.borrow().children.clone();
        let removed = match set.remove(name) {
            Some(node) => node,
            None => return Ok(None),
        };
        removed.inner.borrow_mut().parent = Weak::new();
        Ok(Some(removed))
    }

    /// Detach a specific child by identity without disposing it.
    ///
    /// Returns `false` when `child` is not a child of this node.
    pub fn remove_child_node(&self, child: &Node) -> Result<bool> {
        self.ensure_open()?;
        let set = self.inner.borrow().children.clone();
        if set.remove_node(child) {
            child.inner.borrow_mut().parent = Weak::new();
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Current format, if any.
    pub fn format(&self) -> Option<Ref<'_, Format>> {
        Ref::filter_map(self.inner.borrow(), |inner| inner.format.as_ref()).ok()
    }

    /// Current format, mutably.
    pub fn format_mut(&self) -> Option<RefMut<'_, Format>> {
        RefMut::filter_map(self.inner.borrow_mut(), |inner| inner.format.as_mut()).ok()
    }

    /// True when a format is attached.
    pub fn has_format(&self) -> bool {
        self.inner.borrow().format.is_some()
    }

    /// Format-type identity of the current format.
    pub fn format_type(&self) -> Option<&'static FormatType> {
        self.inner.borrow().format.as_ref().map(Format::format_type)
    }

    /// True when the current format is a container.
    pub fn is_container(&self) -> bool {
        self.inner
            .borrow()
            .format
            .as_ref()
            .is_some_and(Format::is_container)
    }

    /// Replace the node's format, returning the previous one.
    ///
    /// When the current format is a container, the children are cleared
    /// (orphaned, not disposed) first. When the new format is a container,
    /// its child collection becomes the node's own and every child it holds
    /// is re-parented here, moving from any previous parent. The previous
    /// format is never disposed implicitly.
    pub fn set_format(&self, new: Option<Format>) -> Result<Option<Format>> {
        self.ensure_open()?;
        let had_container = self
            .inner
            .borrow()
            .format
            .as_ref()
            .is_some_and(Format::is_container);
        self.install_format(had_container, new)
    }

    /// Swap `new` into the format slot.
    ///
    /// `old_was_container` tells whether the format being replaced aliased
    /// the child collection; `transform_impl` holds that format outside the
    /// slot, so the flag cannot be read from the slot itself.
    fn install_format(&self, old_was_container: bool, new: Option<Format>) -> Result<Option<Format>> {
        if let Some(Format::Container(container)) = &new {
            for child in container.children().to_vec() {
                self.ensure_not_ancestor(&child)?;
            }
        }

        if old_was_container {
            let set = self.inner.borrow().children.clone();
            for child in set.to_vec() {
                child.inner.borrow_mut().parent = Weak::new();
            }
            set.clear();
            self.inner.borrow_mut().children = NodeSet::new();
        }

        if let Some(Format::Container(container)) = &new {
            let set = container.children();
            for child in set.to_vec() {
                if let Some(previous) = child.parent() {
                    if !Node::ptr_eq(&previous, self) {
                        previous.detach_node(&child);
                    }
                }
                child.inner.borrow_mut().parent = Rc::downgrade(&self.inner);
            }
            self.inner.borrow_mut().children = set;
        }

        Ok(std::mem::replace(&mut self.inner.borrow_mut().format, new))
    }

    /// Convert the current format through the process-wide default engine,
    /// disposing the old format. Returns `&self` for chaining.
    pub fn transform(&self, destination: &'static FormatType) -> Result<&Self> {
        let engine = crate::convert::default_engine().read();
        self.transform_to(destination, &engine)
    }

    /// Convert the current format through `engine`, disposing the old format.
    ///
    /// Fails with `InvalidState` when no format is attached. On any failure
    /// the node keeps its current format untouched; the old format is
    /// disposed only after the new one was produced.
    pub fn transform_to(
        &self,
        destination: &'static FormatType,
        engine: &ConversionEngine,
    ) -> Result<&Self> {
        let mut previous = self.transform_impl(|input| engine.convert(input, destination))?;
        previous.dispose();
        Ok(self)
    }

    /// Convert like [`transform_to`](Self::transform_to), but hand the old
    /// format back untouched instead of disposing it.
    pub fn transform_to_keeping(
        &self,
        destination: &'static FormatType,
        engine: &ConversionEngine,
    ) -> Result<Format> {
        self.transform_impl(|input| engine.convert(input, destination))
    }

    /// Convert the current format with a caller-supplied converter, disposing
    /// the old format.
    ///
    /// Fails with `NotSupported` when the converter's declared source type
    /// does not cover the node's current format.
    pub fn transform_with(&self, converter: &mut dyn Converter) -> Result<&Self> {
        let destination = converter.destination_type();
        let mut previous =
            self.transform_impl(|input| crate::convert::convert_with(converter, input, destination))?;
        previous.dispose();
        Ok(self)
    }

    /// Convert with a caller-supplied converter, handing the old format back
    /// untouched.
    pub fn transform_with_keeping(&self, converter: &mut dyn Converter) -> Result<Format> {
        let destination = converter.destination_type();
        self.transform_impl(|input| crate::convert::convert_with(converter, input, destination))
    }

    fn transform_impl<F>(&self, convert: F) -> Result<Format>
    where
        F: FnOnce(&mut Format) -> Result<Format>,
    {
        self.ensure_open()?;
        let mut current = match self.inner.borrow_mut().format.take() {
            Some(format) => format,
            None => {
                return Err(RomkitError::InvalidState(
                    "cannot transform a node without a format".into(),
                ))
            }
        };

        let converted = match convert(&mut current) {
            Ok(format) => format,
            Err(err) => {
                self.inner.borrow_mut().format = Some(current);
                return Err(err);
            }
        };
        debug!(
            node = %self.path(),
            from = current.format_type().name(),
            to = converted.format_type().name(),
            "transformed node format"
        );

        if let Err(err) = self.install_format(current.is_container(), Some(converted)) {
            self.inner.borrow_mut().format = Some(current);
            return Err(err);
        }
        Ok(current)
    }

    /// Breadth-first search for the node whose absolute path equals `path`.
    ///
    /// Paths compare by exact string equality (no `.`/`..` normalization);
    /// the search descends only into branches prefix-consistent with the
    /// query, starting from this node.
    pub fn find(&self, path: &str) -> Option<Node> {
        let root_path = self.path();
        if !prefix_consistent(path, &root_path) {
            return None;
        }

        let mut queue = VecDeque::new();
        queue.push_back((self.clone(), root_path));
        while let Some((node, node_path)) = queue.pop_front() {
            if node_path == path {
                return Some(node);
            }
            for child in node.children() {
                let child_path = format!("{}/{}", node_path, child.name());
                if prefix_consistent(path, &child_path) {
                    queue.push_back((child, child_path));
                }
            }
        }
        None
    }

    /// Set a tag value.
    ///
    /// Tags are metadata, not resources: they survive disposal, and all tag
    /// accessors stay usable on a disposed node.
    pub fn set_tag(&self, key: impl Into<String>, value: impl Into<serde_json::Value>) {
        self.inner.borrow_mut().tags.insert(key.into(), value.into());
    }

    /// Tag value for `key`.
    pub fn tag(&self, key: &str) -> Option<serde_json::Value> {
        self.inner.borrow().tags.get(key).cloned()
    }

    /// Remove a tag, returning its value.
    pub fn remove_tag(&self, key: &str) -> Option<serde_json::Value> {
        self.inner.borrow_mut().tags.remove(key)
    }

    /// All tags as a JSON object, for diagnostics and tooling dumps.
    pub fn tags_json(&self) -> serde_json::Value {
        let inner = self.inner.borrow();
        let map: serde_json::Map<String, serde_json::Value> = inner
            .tags
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        serde_json::Value::Object(map)
    }

    /// Dispose this node and its format.
    ///
    /// Idempotent. The format chains disposal down: a binary format disposes
    /// its stream, a container disposes the children still reachable through
    /// it. Children detached beforehand moved their ownership elsewhere and
    /// are not touched.
    pub fn dispose(&self) {
        let format = {
            let mut inner = self.inner.borrow_mut();
            if inner.disposed {
                return;
            }
            inner.disposed = true;
            inner.format.take()
        };
        if let Some(mut format) = format {
            format.dispose();
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.inner.borrow().disposed {
            return Err(RomkitError::Disposed("Node"));
        }
        Ok(())
    }

    fn ensure_not_ancestor(&self, child: &Node) -> Result<()> {
        let mut current = Some(self.clone());
        while let Some(node) = current {
            if Node::ptr_eq(&node, child) {
                return Err(RomkitError::InvalidState(
                    "cannot attach a node to itself or one of its ancestors".into(),
                ));
            }
            current = node.parent();
        }
        Ok(())
    }

    fn detach_node(&self, node: &Node) {
        let set = self.inner.borrow().children.clone();
        set.remove_node(node);
    }
}

fn prefix_consistent(query: &str, candidate: &str) -> bool {
    query == candidate
        || (query.len() > candidate.len()
            && query.starts_with(candidate)
            && query.as_bytes()[candidate.len()] == b'/')
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Node")
            .field("name", &inner.name)
            .field("children", &inner.children.len())
            .field("format", &inner.format.as_ref().map(|fmt| fmt.format_type().name()))
            .field("disposed", &inner.disposed)
            .finish()
    }
}
