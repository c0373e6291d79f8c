//! Encapsulation section tests: LZMA and GZip GUID-defined sections and
//! plain compression sections.

mod fixtures;

use ffs_parser_lib::FfsParser;
use fixtures::*;
use std::io::Cursor;
use tree_model_lib::ItemType;
use uuid::{uuid, Uuid};

fn build_guided_section(guid: Uuid, attributes: u16, payload: &[u8]) -> Vec<u8> {
    let mut extra = Vec::new();
    extra.extend_from_slice(&guid.to_bytes_le());
    extra.extend_from_slice(&24u16.to_le_bytes()); // data offset
    extra.extend_from_slice(&attributes.to_le_bytes());
    build_section(0x02, &extra, payload)
}

fn lzma_compress(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    lzma_rs::lzma_compress(&mut Cursor::new(data), &mut out).unwrap();
    out
}

#[test]
fn lzma_guided_section_decompresses_into_children() {
    let inner = join_sections(&[build_section(0x19, &[], &[0xA5u8; 0x40])]);
    let payload = lzma_compress(&inner);
    let guided = build_guided_section(LZMA_SECTION_GUID, 0x01, &payload);
    let file = build_file(
        uuid!("DEADBEEF-0000-4000-8000-000000000010"),
        0x02,
        0,
        &join_sections(&[guided]),
    );
    let image = build_uefi_image_with_files(0x1000, &[file, build_vtf_file()]);

    let mut parser = FfsParser::new();
    parser.parse(&image).unwrap();
    let model = parser.model();

    // The GUID-defined section carries the decompressed children
    let guided = model
        .descendants(model.root())
        .into_iter()
        .find(|&item| {
            model.item_type(item) == ItemType::Section && model.subtype(item) == 0x02
        })
        .expect("guided section missing");
    assert!(model.info(guided).contains("Compression algorithm: LZMA"));
    assert!(model.info(guided).contains("LZMA dictionary size"));
    assert!(model.compressed(guided));
    assert!(model.uncompressed_data(guided).is_some());

    let children = model.children(guided);
    assert_eq!(children.len(), 1);
    let raw = children[0];
    assert_eq!(model.subtype(raw), 0x19);
    assert!(model.compressed(raw));
    assert_eq!(model.body(raw).len(), 0x40);
}

#[test]
fn gzip_guided_section_decompresses_into_children() {
    use std::io::Write;
    let inner = join_sections(&[build_section(0x19, &[], b"gzip payload data bytes!")]);
    let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(&inner).unwrap();
    let payload = encoder.finish().unwrap();

    let guided = build_guided_section(GZIP_SECTION_GUID, 0x01, &payload);
    let file = build_file(
        uuid!("DEADBEEF-0000-4000-8000-000000000011"),
        0x02,
        0,
        &join_sections(&[guided]),
    );
    let image = build_uefi_image_with_files(0x1000, &[file, build_vtf_file()]);

    let mut parser = FfsParser::new();
    parser.parse(&image).unwrap();
    let model = parser.model();

    let guided = model
        .descendants(model.root())
        .into_iter()
        .find(|&item| {
            model.item_type(item) == ItemType::Section && model.subtype(item) == 0x02
        })
        .expect("guided section missing");
    assert!(model.info(guided).contains("Compression algorithm: GZip"));
    assert_eq!(model.children(guided).len(), 1);
    assert!(model.compressed(model.children(guided)[0]));
}

#[test]
fn uncompressed_compression_section_children_are_not_marked_compressed() {
    let inner = join_sections(&[build_section(0x19, &[], &[0x5Au8; 0x20])]);
    let mut extra = Vec::new();
    extra.extend_from_slice(&(inner.len() as u32).to_le_bytes()); // uncompressed length
    extra.push(0x00); // EFI_NOT_COMPRESSED
    let compression = build_section(0x01, &extra, &inner);
    let file = build_file(
        uuid!("DEADBEEF-0000-4000-8000-000000000012"),
        0x02,
        0,
        &join_sections(&[compression]),
    );
    let image = build_uefi_image_with_files(0x1000, &[file, build_vtf_file()]);

    let mut parser = FfsParser::new();
    parser.parse(&image).unwrap();
    let model = parser.model();

    let compression = model
        .descendants(model.root())
        .into_iter()
        .find(|&item| {
            model.item_type(item) == ItemType::Section && model.subtype(item) == 0x01
        })
        .expect("compression section missing");
    assert!(model.info(compression).contains("Compression algorithm: None"));
    assert!(!model.compressed(compression));

    let raw = model.children(compression)[0];
    assert_eq!(model.subtype(raw), 0x19);
    assert!(!model.compressed(raw));
    // The size stored in the header matches, so no mismatch diagnostic
    assert!(!parser
        .messages()
        .iter()
        .any(|(m, _)| m.contains("differs from actual")));
}

#[test]
fn lzma_guided_section_with_wrong_payload_keeps_section_unparsed() {
    let guided = build_guided_section(LZMA_SECTION_GUID, 0x01, &[0x11u8; 0x40]);
    let file = build_file(
        uuid!("DEADBEEF-0000-4000-8000-000000000013"),
        0x02,
        0,
        &join_sections(&[guided]),
    );
    let image = build_uefi_image_with_files(0x1000, &[file, build_vtf_file()]);

    let mut parser = FfsParser::new();
    parser.parse(&image).unwrap();
    let model = parser.model();

    let guided = model
        .descendants(model.root())
        .into_iter()
        .find(|&item| {
            model.item_type(item) == ItemType::Section && model.subtype(item) == 0x02
        })
        .expect("guided section missing");
    assert!(model.children(guided).is_empty());
    assert!(parser
        .messages()
        .iter()
        .any(|(m, _)| m.contains("decompression failed")));
}
