//! Converter registry and conversion dispatch
//!
//! The [`ConversionEngine`] indexes [`ConverterDescriptor`]s by their
//! declared (source, destination) format-type pair and resolves the unique
//! converter applicable to a requested conversion. Resolution honors subtype
//! substitutability on both axes independently: the declared source must
//! accept the value's type (covariance) and the declared destination must be
//! acceptable where the requested one is expected (contravariance). Zero
//! matches and multiple matches are both errors; dispatch is deterministic.

pub mod descriptor;

pub use descriptor::{Converter, ConverterDescriptor, FormatType};

use crate::error::{Result, RomkitError};
use crate::node::format::Format;
use ahash::AHashSet;
use parking_lot::RwLock;
use std::sync::OnceLock;
use tracing::{debug, trace};

/// Registry plus dispatcher for format conversions.
#[derive(Default)]
pub struct ConversionEngine {
    registrations: Vec<ConverterDescriptor>,
    index: AHashSet<(&'static str, usize, usize)>,
}

impl ConversionEngine {
    /// Create an empty engine.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one converter descriptor.
    ///
    /// Returns `false` when the same (type, source, destination) registration
    /// already exists; registrations never duplicate.
    pub fn register(&mut self, descriptor: ConverterDescriptor) -> bool {
        if !self.index.insert(descriptor.key()) {
            return false;
        }
        trace!(
            converter = descriptor.name(),
            source = descriptor.source().name(),
            destination = descriptor.destination().name(),
            "registered converter"
        );
        self.registrations.push(descriptor);
        true
    }

    /// Register a batch of descriptors, typically one format module's
    /// exported list. Idempotent across repeated scans; returns the number of
    /// new registrations.
    pub fn scan(&mut self, descriptors: impl IntoIterator<Item = ConverterDescriptor>) -> usize {
        let added = descriptors
            .into_iter()
            .filter(|descriptor| self.register(*descriptor))
            .count();
        debug!(added, total = self.registrations.len(), "converter scan complete");
        added
    }

    /// Number of registrations.
    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    /// True when nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    /// All registrations, in registration order.
    pub fn registrations(&self) -> &[ConverterDescriptor] {
        &self.registrations
    }

    /// Resolve the unique converter for a (source, destination) pair.
    ///
    /// A registration matches when its declared source is assignable from
    /// `source` AND its declared destination is assignable to `destination`;
    /// the two axes are checked independently. Fails with `ConverterNotFound`
    /// for zero matches and `AmbiguousConversion` for more than one.
    pub fn resolve(
        &self,
        source: &'static FormatType,
        destination: &'static FormatType,
    ) -> Result<&ConverterDescriptor> {
        let matches: Vec<&ConverterDescriptor> = self
            .registrations
            .iter()
            .filter(|descriptor| {
                descriptor.source().is_assignable_from(source)
                    && destination.is_assignable_from(descriptor.destination())
            })
            .collect();

        match matches.as_slice() {
            [] => Err(RomkitError::ConverterNotFound {
                from: source.name(),
                to: destination.name(),
            }),
            [descriptor] => Ok(*descriptor),
            _ => Err(RomkitError::AmbiguousConversion {
                from: source.name(),
                to: destination.name(),
                count: matches.len(),
            }),
        }
    }

    /// Convert `input` to the requested destination type.
    ///
    /// Resolves on the value's runtime format type, instantiates the resolved
    /// converter, and invokes it. `input` is left intact.
    pub fn convert(&self, input: &mut Format, destination: &'static FormatType) -> Result<Format> {
        let source = input.format_type();
        let descriptor = self.resolve(source, destination)?;
        debug!(
            converter = descriptor.name(),
            source = source.name(),
            destination = destination.name(),
            "dispatching conversion"
        );
        descriptor.instantiate().convert(input)
    }
}

/// Convert `input` with a caller-supplied converter instance.
///
/// Fails with `NotSupported` when the converter's declared capability does
/// not cover the requested pair: its source must accept the value's runtime
/// type and its destination must satisfy the requested one.
pub fn convert_with(
    converter: &mut dyn Converter,
    input: &mut Format,
    destination: &'static FormatType,
) -> Result<Format> {
    let source = input.format_type();
    if !converter.source_type().is_assignable_from(source)
        || !destination.is_assignable_from(converter.destination_type())
    {
        return Err(RomkitError::NotSupported {
            from: source.name(),
            to: destination.name(),
        });
    }
    converter.convert(input)
}

static DEFAULT_ENGINE: OnceLock<RwLock<ConversionEngine>> = OnceLock::new();

/// Process-wide default engine, lazily initialized.
///
/// Format modules register their descriptors here at startup; nodes converted
/// through [`Node::transform`](crate::node::Node::transform) resolve against
/// it. The registry contents are static references and function pointers, so
/// the shared index itself is safe to share even though conversions remain
/// single-threaded.
pub fn default_engine() -> &'static RwLock<ConversionEngine> {
    DEFAULT_ENGINE.get_or_init(|| RwLock::new(ConversionEngine::new()))
}
