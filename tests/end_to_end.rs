//! Full pipeline: originate bytes, wrap, attach, transform, address children

use romkit::convert::{default_engine, Converter, ConverterDescriptor, FormatType};
use romkit::node::{format, ContainerFormat, Format, Node};
use romkit::stream::{DataStream, SeekOrigin};

/// Splits a two-byte blob into child nodes `a` and `b`, one byte each.
struct PairUnpacker;

impl Converter for PairUnpacker {
    fn source_type(&self) -> &'static FormatType {
        &format::BINARY
    }

    fn destination_type(&self) -> &'static FormatType {
        &format::CONTAINER
    }

    fn convert(&mut self, input: &mut Format) -> romkit::Result<Format> {
        let stream = input.as_binary_mut().expect("binary input");
        let container = ContainerFormat::new();
        container.add(Node::with_format(
            "a",
            Format::Binary(stream.slice(0, Some(1))?),
        )?);
        container.add(Node::with_format(
            "b",
            Format::Binary(stream.slice(1, Some(1))?),
        )?);
        Ok(Format::Container(container))
    }
}

fn register_pair_unpacker() {
    default_engine().write().scan([ConverterDescriptor::new(
        "PairUnpacker",
        &format::BINARY,
        &format::CONTAINER,
        || Box::new(PairUnpacker),
    )]);
}

#[test]
fn test_unpack_pipeline_through_default_engine() {
    register_pair_unpacker();

    // Originate from an empty memory resource and write the payload.
    let mut stream = DataStream::new();
    stream.write(&[0xCA, 0xFE]).unwrap();

    let node = Node::with_format("n", Format::Binary(stream)).unwrap();
    node.transform(&format::CONTAINER).unwrap();

    assert_eq!(node.child_count(), 2);
    let a = node.child("a").unwrap();
    assert_eq!(a.path(), format!("{}/a", node.path()));

    // Children address their slice of the original payload.
    let mut byte = [0u8; 1];
    a.format_mut().unwrap().as_binary_mut().unwrap().read(&mut byte).unwrap();
    assert_eq!(byte[0], 0xCA);

    let b = node.child("b").unwrap();
    b.format_mut().unwrap().as_binary_mut().unwrap().read(&mut byte).unwrap();
    assert_eq!(byte[0], 0xFE);
}

#[test]
fn test_registration_survives_and_deduplicates_across_tests() {
    register_pair_unpacker();
    register_pair_unpacker();

    let engine = default_engine().read();
    let matching = engine
        .registrations()
        .iter()
        .filter(|descriptor| descriptor.name() == "PairUnpacker")
        .count();
    assert_eq!(matching, 1);
}

#[test]
fn test_disposal_chain_releases_the_shared_resource() {
    register_pair_unpacker();

    let mut stream = DataStream::new();
    stream.write(&[0x01, 0x02]).unwrap();
    let watcher = stream.slice(0, None).unwrap();
    assert_eq!(watcher.view_count().unwrap(), 2);

    let node = Node::with_format("n", Format::Binary(stream)).unwrap();
    node.transform(&format::CONTAINER).unwrap();

    // Old binary disposed; two child slices took its place.
    assert_eq!(watcher.view_count().unwrap(), 3);

    // Disposing the root chains through the container to every child stream.
    node.dispose();
    assert_eq!(watcher.view_count().unwrap(), 1);
}

#[test]
fn test_round_trip_write_back() {
    register_pair_unpacker();

    let mut stream = DataStream::new();
    stream.write(&[0xCA, 0xFE]).unwrap();
    let node = Node::with_format("n", Format::Binary(stream)).unwrap();
    node.transform(&format::CONTAINER).unwrap();

    // Reassemble the children into a fresh stream and check the payload.
    let mut assembled = DataStream::new();
    for child in node.children() {
        let mut format = child.format_mut().unwrap();
        format.as_binary_mut().unwrap().write_to(&mut assembled).unwrap();
    }

    assembled.seek(0, SeekOrigin::Start).unwrap();
    let mut buf = [0u8; 2];
    assembled.read(&mut buf).unwrap();
    assert_eq!(buf, [0xCA, 0xFE]);
}
