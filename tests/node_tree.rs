//! Tree behavior under format replacement and transforms

use romkit::convert::{ConversionEngine, Converter, ConverterDescriptor, FormatType};
use romkit::node::{format, ContainerFormat, Format, Node};
use romkit::stream::{DataStream, SeekOrigin};
use romkit::RomkitError;

/// Splits a binary blob into fixed 2-byte entries named `entry<i>`.
struct SplitEntries;

impl Converter for SplitEntries {
    fn source_type(&self) -> &'static FormatType {
        &format::BINARY
    }

    fn destination_type(&self) -> &'static FormatType {
        &format::CONTAINER
    }

    fn convert(&mut self, input: &mut Format) -> romkit::Result<Format> {
        let stream = input
            .as_binary_mut()
            .ok_or_else(|| RomkitError::InvalidState("expected binary input".into()))?;
        let container = ContainerFormat::new();
        let mut offset = 0;
        let mut index = 0;
        while offset + 2 <= stream.len() {
            let entry = stream.slice(offset, Some(2))?;
            container.add(Node::with_format(
                format!("entry{index}"),
                Format::Binary(entry),
            )?);
            offset += 2;
            index += 1;
        }
        Ok(Format::Container(container))
    }
}

fn split_engine() -> ConversionEngine {
    let mut engine = ConversionEngine::new();
    engine.register(ConverterDescriptor::new(
        "SplitEntries",
        &format::BINARY,
        &format::CONTAINER,
        || Box::new(SplitEntries),
    ));
    engine
}

#[test]
fn test_transform_repopulates_children_from_container() {
    let mut stream = DataStream::new();
    stream.write(&[1, 2, 3, 4, 5, 6]).unwrap();

    let node = Node::with_format("pack", Format::Binary(stream)).unwrap();
    let engine = split_engine();
    node.transform_to(&format::CONTAINER, &engine).unwrap();

    assert!(node.is_container());
    assert_eq!(node.child_count(), 3);
    assert_eq!(node.child("entry1").unwrap().path(), "/pack/entry1");

    let mut buf = [0u8; 2];
    let entry = node.child("entry2").unwrap();
    let mut format = entry.format_mut().unwrap();
    format.as_binary_mut().unwrap().read(&mut buf).unwrap();
    assert_eq!(buf, [5, 6]);
}

#[test]
fn test_transform_disposes_old_format_by_default() {
    let mut stream = DataStream::new();
    stream.write(&[1, 2]).unwrap();
    let watcher = stream.slice(0, None).unwrap();
    assert_eq!(watcher.view_count().unwrap(), 2);

    let node = Node::with_format("pack", Format::Binary(stream)).unwrap();
    node.transform_to(&format::CONTAINER, &split_engine()).unwrap();

    // Only the watcher and the entry slice remain over the resource.
    assert_eq!(watcher.view_count().unwrap(), 2);
}

#[test]
fn test_transform_keeping_leaves_old_format_usable() {
    let mut stream = DataStream::new();
    stream.write(&[0xAA, 0xBB]).unwrap();

    let node = Node::with_format("pack", Format::Binary(stream)).unwrap();
    let mut previous = node
        .transform_to_keeping(&format::CONTAINER, &split_engine())
        .unwrap();

    let old_stream = previous.as_binary_mut().unwrap();
    old_stream.seek(0, SeekOrigin::Start).unwrap();
    assert_eq!(old_stream.read_byte().unwrap(), 0xAA);
    assert_eq!(node.child_count(), 1);
}

#[test]
fn test_failed_transform_leaves_format_untouched() {
    let mut stream = DataStream::new();
    stream.write(&[9, 9]).unwrap();

    let node = Node::with_format("pack", Format::Binary(stream)).unwrap();
    let empty_engine = ConversionEngine::new();
    let err = node
        .transform_to(&format::CONTAINER, &empty_engine)
        .unwrap_err();
    assert!(matches!(err, RomkitError::ConverterNotFound { .. }));

    // Old format still attached and readable.
    let mut format = node.format_mut().unwrap();
    let stream = format.as_binary_mut().unwrap();
    stream.seek(0, SeekOrigin::Start).unwrap();
    assert_eq!(stream.read_byte().unwrap(), 9);
}

/// Emits a container claiming the node captured at construction.
struct CaptureInto(Node);

impl Converter for CaptureInto {
    fn source_type(&self) -> &'static FormatType {
        &format::BINARY
    }

    fn destination_type(&self) -> &'static FormatType {
        &format::CONTAINER
    }

    fn convert(&mut self, _input: &mut Format) -> romkit::Result<Format> {
        let container = ContainerFormat::new();
        container.add(self.0.clone());
        Ok(Format::Container(container))
    }
}

#[test]
fn test_transform_into_cyclic_container_keeps_format() {
    let root = Node::new("root").unwrap();
    let child =
        Node::with_format("child", Format::Binary(DataStream::from_memory(vec![7]))).unwrap();
    root.add_child(child.clone()).unwrap();

    // The converted container claims an ancestor; installing it must fail
    // and leave the old format attached.
    let mut converter = CaptureInto(root.clone());
    let err = child.transform_with(&mut converter).unwrap_err();
    assert!(matches!(err, RomkitError::InvalidState(_)));

    let mut format = child.format_mut().unwrap();
    assert_eq!(format.as_binary_mut().unwrap().read_byte().unwrap(), 7);
    drop(format);
    assert!(root.parent().is_none());
}

#[test]
fn test_transform_without_format_fails() {
    let node = Node::new("empty").unwrap();
    assert!(matches!(
        node.transform_to(&format::CONTAINER, &split_engine()),
        Err(RomkitError::InvalidState(_))
    ));
}

#[test]
fn test_transform_chaining() {
    let mut stream = DataStream::new();
    stream.write(&[1, 2]).unwrap();
    let node = Node::with_format("pack", Format::Binary(stream)).unwrap();
    let engine = split_engine();

    let count = node
        .transform_to(&format::CONTAINER, &engine)
        .map(Node::child_count)
        .unwrap();
    assert_eq!(count, 1);
}

#[test]
fn test_transform_with_caller_supplied_converter() {
    let mut stream = DataStream::new();
    stream.write(&[1, 2]).unwrap();
    let node = Node::with_format("pack", Format::Binary(stream)).unwrap();

    let mut converter = SplitEntries;
    node.transform_with(&mut converter).unwrap();
    assert_eq!(node.child_count(), 1);

    // Now a container; the same converter no longer covers the pair.
    assert!(matches!(
        node.transform_with(&mut converter),
        Err(RomkitError::NotSupported { .. })
    ));
}

#[test]
fn test_detach_and_reattach_across_trees() {
    let mut stream = DataStream::new();
    stream.write(&[1, 2, 3, 4]).unwrap();
    let source = Node::with_format("source", Format::Binary(stream)).unwrap();
    source.transform_to(&format::CONTAINER, &split_engine()).unwrap();

    let target = Node::new("target").unwrap();
    let moved = source.remove_child("entry0").unwrap().unwrap();
    target.add_child(moved.clone()).unwrap();
    assert_eq!(moved.path(), "/target/entry0");

    // Disposing the original tree must not touch the moved node.
    source.dispose();
    assert!(!moved.is_disposed());

    let mut buf = [0u8; 2];
    let mut format = moved.format_mut().unwrap();
    format.as_binary_mut().unwrap().read(&mut buf).unwrap();
    assert_eq!(buf, [1, 2]);
}

#[test]
fn test_search_after_transform() {
    let mut stream = DataStream::new();
    stream.write(&[1, 2, 3, 4]).unwrap();
    let root = Node::new("root").unwrap();
    let pack = Node::with_format("pack", Format::Binary(stream)).unwrap();
    root.add_child(pack.clone()).unwrap();
    pack.transform_to(&format::CONTAINER, &split_engine()).unwrap();

    let found = root.find("/root/pack/entry1").unwrap();
    assert_eq!(found.name(), "entry1");
    assert!(root.find("/root/pack/entry9").is_none());
}

#[test]
fn test_container_replacement_preserves_sibling_order() {
    let pack = Node::new("pack").unwrap();
    for name in ["a", "b", "c"] {
        pack.add_child(Node::new(name).unwrap()).unwrap();
    }

    let replacement = Node::with_format("b", Format::Binary(DataStream::new())).unwrap();
    pack.add_child(replacement).unwrap();

    let names: Vec<String> = pack.children().iter().map(Node::name).collect();
    assert_eq!(names, ["a", "b", "c"]);
    assert!(pack.child("b").unwrap().has_format());
}
