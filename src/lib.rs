//! # Romkit - Foundation Library for ROM Hacking Tools
//!
//! `romkit` represents binary game assets as an addressable hierarchy of
//! nodes and converts between their formats through a registry of converters.
//! It implements no specific game format itself; codecs, text tables, and
//! serializers plug in from the outside.
//!
//! ## The three subsystems
//!
//! - [`stream`] - [`DataStream`]: a bounded, seekable window over a shared
//!   byte resource (buffer or file). Many streams may alias one resource,
//!   including overlapping ranges; the resource is released when the last
//!   stream over it goes away.
//! - [`node`] - [`Node`]: a named tree node owning at most one [`Format`]
//!   (raw bytes, a container of further nodes, or an opaque decoded value).
//!   Child management follows the attached format.
//! - [`convert`] - [`ConversionEngine`]: a registry of converter descriptors
//!   resolving exactly one converter per (source, destination) format-type
//!   pair, honoring subtype substitutability on both axes.
//!
//! ## Typical flow
//!
//! ```text
//! file/buffer ──> DataStream ──> Format::Binary ──> Node
//!                                      │ transform
//!                                      v
//!                             Format::Container ──> child Nodes ──> ...
//! ```
//!
//! A caller originates a stream, wraps it in a binary format, and attaches it
//! to a node. Converting the node to a container format replaces its children
//! with the container's; repeated conversions form a pipeline, and the node
//! retains only its current format.
//!
//! ## Example
//!
//! ```rust
//! use romkit::convert::{ConversionEngine, Converter, ConverterDescriptor, FormatType};
//! use romkit::node::{format, ContainerFormat, Format, Node};
//! use romkit::stream::DataStream;
//!
//! /// Splits a two-byte blob into one node per byte.
//! struct Unpack;
//!
//! impl Converter for Unpack {
//!     fn source_type(&self) -> &'static FormatType {
//!         &format::BINARY
//!     }
//!
//!     fn destination_type(&self) -> &'static FormatType {
//!         &format::CONTAINER
//!     }
//!
//!     fn convert(&mut self, input: &mut Format) -> romkit::Result<Format> {
//!         let stream = input.as_binary_mut().expect("binary input");
//!         let container = ContainerFormat::new();
//!         container.add(Node::with_format("a", Format::Binary(stream.slice(0, Some(1))?))?);
//!         container.add(Node::with_format("b", Format::Binary(stream.slice(1, Some(1))?))?);
//!         Ok(Format::Container(container))
//!     }
//! }
//!
//! fn main() -> romkit::Result<()> {
//!     let mut stream = DataStream::new();
//!     stream.write(&[0xCA, 0xFE])?;
//!
//!     let mut engine = ConversionEngine::new();
//!     engine.register(ConverterDescriptor::new(
//!         "Unpack",
//!         &format::BINARY,
//!         &format::CONTAINER,
//!         || Box::new(Unpack),
//!     ));
//!
//!     let node = Node::with_format("rom", Format::Binary(stream))?;
//!     node.transform_to(&format::CONTAINER, &engine)?;
//!
//!     assert_eq!(node.child_count(), 2);
//!     assert_eq!(node.child("a").unwrap().path(), "/rom/a");
//!     Ok(())
//! }
//! ```
//!
//! ## Resource discipline
//!
//! Streams and nodes are disposed explicitly by their last holder; disposing
//! a node disposes its format, which disposes any wrapped stream, which
//! releases the shared resource at reference count zero. Dropping a handle
//! without disposing it releases the same resources through RAII; `dispose`
//! exists so disposal can happen deterministically while other handles are
//! still alive, and so later use is reported as an error instead of acting on
//! a stale view.
//!
//! ## Threading
//!
//! Single-threaded by design: streams and nodes are `Rc`-based and must stay
//! on one thread. The only shared state is the process-wide default
//! conversion engine, whose registrations are static data.

pub mod convert;
pub mod error;
pub mod node;
pub mod stream;

// Re-export commonly used types
pub use convert::{
    convert_with, default_engine, ConversionEngine, Converter, ConverterDescriptor, FormatType,
};
pub use error::{Result, RomkitError};
pub use node::{ContainerFormat, CustomFormat, Format, Node, NodeSet};
pub use stream::{DataStream, FileOpenMode, Resource, SeekOrigin, SharedResource};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
