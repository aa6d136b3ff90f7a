//! Polymorphic node payloads
//!
//! A [`Format`] is what a [`Node`](super::Node) carries: raw bytes behind a
//! [`DataStream`], a container of further nodes, or an opaque decoded value
//! supplied by a format module through [`CustomFormat`]. The variant set is
//! closed; external formats plug in through the `Custom` variant and declare
//! their own [`FormatType`] identity for conversion dispatch.

use crate::convert::FormatType;
use crate::node::NodeSet;
use crate::stream::DataStream;
use std::any::Any;

/// Identity of the built-in binary format.
pub static BINARY: FormatType = FormatType::new("binary");

/// Identity of the built-in container format.
pub static CONTAINER: FormatType = FormatType::new("container");

/// Opaque decoded value owned by a node.
///
/// Implementors declare their [`FormatType`] and may override [`dispose`]
/// when they hold resources beyond plain memory.
///
/// [`dispose`]: CustomFormat::dispose
pub trait CustomFormat: Any {
    /// Runtime format-type identity of this value.
    fn format_type(&self) -> &'static FormatType;

    /// Release any held resources. Called once when the owning node replaces
    /// or disposes the format.
    fn dispose(&mut self) {}

    /// Upcast for downcasting through [`Format::downcast_ref`].
    fn as_any(&self) -> &dyn Any;

    /// Mutable upcast for downcasting through [`Format::downcast_mut`].
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Ordered, name-unique collection of child nodes owned by a container.
///
/// When a container format is attached to a node, the node's `children` is
/// this same collection (a shared handle), so the container stays
/// authoritative for child membership and order.
#[derive(Default)]
pub struct ContainerFormat {
    children: NodeSet,
}

impl ContainerFormat {
    /// Create an empty container.
    pub fn new() -> Self {
        ContainerFormat {
            children: NodeSet::new(),
        }
    }

    /// Add a node; a same-name collision replaces in place.
    ///
    /// Returns the replaced node, if any. When the container is already
    /// attached to a node, prefer [`Node::add_child`](super::Node::add_child),
    /// which also maintains the parent back-reference.
    pub fn add(&self, node: super::Node) -> Option<super::Node> {
        self.children.insert_or_replace(node)
    }

    /// Shared handle to the child collection.
    pub fn children(&self) -> NodeSet {
        self.children.clone()
    }

    /// Look up a child by name.
    pub fn child(&self, name: &str) -> Option<super::Node> {
        self.children.by_name(name)
    }

    /// Number of children.
    pub fn len(&self) -> usize {
        self.children.len()
    }

    /// True when the container has no children.
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }
}

/// Payload attached to a node: at most one per node.
pub enum Format {
    /// Raw bytes behind a stream window.
    Binary(DataStream),
    /// Container of further nodes.
    Container(ContainerFormat),
    /// Opaque decoded value from a format module.
    Custom(Box<dyn CustomFormat>),
}

impl Format {
    /// Runtime format-type identity of this value.
    pub fn format_type(&self) -> &'static FormatType {
        match self {
            Format::Binary(_) => &BINARY,
            Format::Container(_) => &CONTAINER,
            Format::Custom(custom) => custom.format_type(),
        }
    }

    /// True for the container variant.
    pub fn is_container(&self) -> bool {
        matches!(self, Format::Container(_))
    }

    /// Stream of the binary variant.
    pub fn as_binary(&self) -> Option<&DataStream> {
        match self {
            Format::Binary(stream) => Some(stream),
            _ => None,
        }
    }

    /// Mutable stream of the binary variant.
    pub fn as_binary_mut(&mut self) -> Option<&mut DataStream> {
        match self {
            Format::Binary(stream) => Some(stream),
            _ => None,
        }
    }

    /// Container of the container variant.
    pub fn as_container(&self) -> Option<&ContainerFormat> {
        match self {
            Format::Container(container) => Some(container),
            _ => None,
        }
    }

    /// Downcast the custom variant to a concrete format value.
    pub fn downcast_ref<T: CustomFormat>(&self) -> Option<&T> {
        match self {
            Format::Custom(custom) => custom.as_any().downcast_ref::<T>(),
            _ => None,
        }
    }

    /// Mutable downcast of the custom variant.
    pub fn downcast_mut<T: CustomFormat>(&mut self) -> Option<&mut T> {
        match self {
            Format::Custom(custom) => custom.as_any_mut().downcast_mut::<T>(),
            _ => None,
        }
    }

    /// Release the resources this format holds.
    ///
    /// Binary formats dispose their stream (releasing the shared resource at
    /// count zero); containers dispose every child still reachable through
    /// them; custom formats run their own `dispose`. Children detached before
    /// this call are not touched.
    pub fn dispose(&mut self) {
        match self {
            Format::Binary(stream) => stream.dispose(),
            Format::Container(container) => {
                for child in container.children.to_vec() {
                    child.dispose();
                }
            }
            Format::Custom(custom) => custom.dispose(),
        }
    }
}

impl std::fmt::Debug for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Format::Binary(stream) => f.debug_tuple("Binary").field(stream).finish(),
            Format::Container(container) => f
                .debug_struct("Container")
                .field("children", &container.len())
                .finish(),
            Format::Custom(custom) => f
                .debug_struct("Custom")
                .field("format_type", &custom.format_type().name())
                .finish(),
        }
    }
}
