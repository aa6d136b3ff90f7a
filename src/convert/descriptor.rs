//! Format type identities and converter descriptors
//!
//! Converters are discovered through explicit descriptors rather than
//! reflection: every format module exposes the [`ConverterDescriptor`]s for
//! the converter types it defines, and callers feed them to a
//! [`ConversionEngine`](super::ConversionEngine) at startup. A descriptor
//! records the implementing type's name, the declared (source, destination)
//! format-type pair, and a factory for fresh converter instances.

use crate::error::Result;
use crate::node::format::Format;

/// Runtime identity of a format type.
///
/// Identities are `static` values compared by address; a format module
/// declares one per format it defines. The optional `base` link forms a
/// subtyping chain used by resolution: a converter declared for a base type
/// also accepts values of any type derived from it.
#[derive(Debug)]
pub struct FormatType {
    name: &'static str,
    base: Option<&'static FormatType>,
}

impl FormatType {
    /// Declare a root format type.
    pub const fn new(name: &'static str) -> Self {
        FormatType { name, base: None }
    }

    /// Declare a format type derived from `base`.
    pub const fn with_base(name: &'static str, base: &'static FormatType) -> Self {
        FormatType {
            name,
            base: Some(base),
        }
    }

    /// Display name of the format type.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Base type this one derives from, if any.
    pub fn base(&self) -> Option<&'static FormatType> {
        self.base
    }

    /// True when a value of type `other` is substitutable for `self`.
    ///
    /// Walks the base chain of `other` looking for `self`; every type is
    /// assignable from itself.
    pub fn is_assignable_from(&'static self, other: &'static FormatType) -> bool {
        let mut current = Some(other);
        while let Some(ty) = current {
            if std::ptr::eq(ty, self) {
                return true;
            }
            current = ty.base;
        }
        false
    }
}

impl PartialEq for FormatType {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self, other)
    }
}

impl Eq for FormatType {}

impl std::fmt::Display for FormatType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name)
    }
}

/// A mapping from one format type to another.
///
/// One converter value covers exactly one declared (source, destination)
/// pair; a type that converts in several directions registers one descriptor
/// per direction. `convert` receives the source mutably so binary formats can
/// seek and read their stream.
pub trait Converter {
    /// Declared source format type.
    fn source_type(&self) -> &'static FormatType;

    /// Declared destination format type.
    fn destination_type(&self) -> &'static FormatType;

    /// Produce a new format from `input`, leaving `input` intact.
    fn convert(&mut self, input: &mut Format) -> Result<Format>;
}

/// Registration record for one converter type and one declared pair.
#[derive(Clone, Copy)]
pub struct ConverterDescriptor {
    name: &'static str,
    source: &'static FormatType,
    destination: &'static FormatType,
    factory: fn() -> Box<dyn Converter>,
}

impl ConverterDescriptor {
    /// Describe a converter type for one (source, destination) pair.
    pub const fn new(
        name: &'static str,
        source: &'static FormatType,
        destination: &'static FormatType,
        factory: fn() -> Box<dyn Converter>,
    ) -> Self {
        ConverterDescriptor {
            name,
            source,
            destination,
            factory,
        }
    }

    /// Name of the implementing converter type.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Declared source format type.
    pub fn source(&self) -> &'static FormatType {
        self.source
    }

    /// Declared destination format type.
    pub fn destination(&self) -> &'static FormatType {
        self.destination
    }

    /// Instantiate a fresh converter for this registration.
    pub fn instantiate(&self) -> Box<dyn Converter> {
        (self.factory)()
    }

    /// Deduplication key: (type name, declared pair).
    pub(crate) fn key(&self) -> (&'static str, usize, usize) {
        (
            self.name,
            self.source as *const FormatType as usize,
            self.destination as *const FormatType as usize,
        )
    }
}

impl std::fmt::Debug for ConverterDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConverterDescriptor")
            .field("name", &self.name)
            .field("source", &self.source.name())
            .field("destination", &self.destination.name())
            .finish()
    }
}
