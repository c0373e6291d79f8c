//! Top-level image dispatch tests: descriptor-only Intel images, generic
//! images, raw-area scanning and parse idempotence.

mod fixtures;

use ffs_parser_lib::{FfsParser, ParseError};
use fixtures::*;
use tree_model_lib::{image_subtype, region_subtype, ItemId, ItemType, TreeModel};

fn tree_summary(model: &TreeModel) -> Vec<String> {
    let mut out = Vec::new();
    fn walk(model: &TreeModel, item: ItemId, depth: usize, out: &mut Vec<String>) {
        out.push(format!(
            "{}{:?}/{} at {:X}h name='{}' text='{}' info_len={}",
            "  ".repeat(depth),
            model.item_type(item),
            model.subtype(item),
            model.offset(item),
            model.name(item),
            model.text(item),
            model.info(item).len()
        ));
        for &child in model.children(item) {
            walk(model, child, depth + 1, out);
        }
    }
    walk(model, model.root(), 0, &mut out);
    out
}

#[test]
fn descriptor_only_image_has_single_descriptor_region() {
    let image = build_descriptor_only_image();
    let mut parser = FfsParser::new();
    parser.parse(&image).unwrap();

    let model = parser.model();
    let top = model.children(model.root())[0];
    assert_eq!(model.item_type(top), ItemType::Image);
    assert_eq!(model.subtype(top), image_subtype::INTEL);

    let children = model.children(top);
    assert_eq!(children.len(), 1, "descriptor-only image must have no other children");
    let descriptor = children[0];
    assert_eq!(model.item_type(descriptor), ItemType::Region);
    assert_eq!(model.subtype(descriptor), region_subtype::DESCRIPTOR);
    assert_eq!(model.offset(descriptor), 0);
    assert_eq!(model.full_size(descriptor), 0x1000);

    // No diagnostics attached to any item
    assert!(
        parser.messages().iter().all(|(_, item)| item.is_none()),
        "unexpected diagnostics: {:?}",
        parser.messages()
    );
}

#[test]
fn buffer_shorter_than_capsule_header_parses_as_generic_image() {
    let mut parser = FfsParser::new();
    let buffer = [0x5Au8; 27]; // one byte short of a capsule header
    parser.parse(&buffer).unwrap();
    let model = parser.model();
    let top = model.children(model.root())[0];
    assert_eq!(model.item_type(top), ItemType::Image);
    assert_eq!(model.subtype(top), image_subtype::UEFI);
}

#[test]
fn truncated_region_is_reported_as_truncated_image() {
    // Descriptor declares a BIOS region at 0x1000..0x4000, buffer holds half
    let mut image = build_descriptor_only_image();
    image[0x44..0x46].copy_from_slice(&1u16.to_le_bytes()); // BIOS base
    image[0x46..0x48].copy_from_slice(&3u16.to_le_bytes()); // BIOS limit
    image.resize(0x2000, 0xFF);

    let mut parser = FfsParser::new();
    assert_eq!(parser.parse(&image), Err(ParseError::TruncatedImage));
    assert!(parser
        .messages()
        .iter()
        .any(|(m, _)| m.contains("dual-chip storage")));
}

#[test]
fn microcode_is_found_in_generic_image() {
    // A valid microcode header with a correct checksum
    let total_size = 0x430usize;
    let mut microcode = vec![0u8; total_size];
    microcode[0..4].copy_from_slice(&1u32.to_le_bytes()); // header version
    microcode[4..8].copy_from_slice(&0xB4u32.to_le_bytes()); // revision
    microcode[8..10].copy_from_slice(&0x2021u16.to_le_bytes()); // year
    microcode[10] = 0x15; // day
    microcode[11] = 0x07; // month
    microcode[12..16].copy_from_slice(&0x000906EAu32.to_le_bytes()); // CPU signature
    microcode[20..24].copy_from_slice(&1u32.to_le_bytes()); // loader revision
    microcode[28..32].copy_from_slice(&0x400u32.to_le_bytes()); // data size
    microcode[32..36].copy_from_slice(&(total_size as u32).to_le_bytes()); // total size
    // Fix the checksum: sum32 over TotalSize must be zero
    let sum = microcode
        .chunks_exact(4)
        .fold(0u32, |sum, w| sum.wrapping_add(u32::from_le_bytes(w.try_into().unwrap())));
    microcode[16..20].copy_from_slice(&(0u32.wrapping_sub(sum)).to_le_bytes());

    let mut parser = FfsParser::new();
    parser.parse(&microcode).unwrap();
    let model = parser.model();
    let top = model.children(model.root())[0];
    let microcode_item = model
        .children(top)
        .iter()
        .copied()
        .find(|&c| model.item_type(c) == ItemType::Microcode)
        .expect("microcode item missing");
    assert!(model.info(microcode_item).contains("CPU signature: 000906EAh"));
    assert!(model.info(microcode_item).contains("valid"));
    assert!(!parser.messages().iter().any(|(m, _)| m.contains("invalid microcode checksum")));
}

#[test]
fn parsing_twice_yields_identical_trees_and_messages() {
    let pe = build_pe32plus(0x8664, 0x1_0000_0000);
    let section = build_section(0x10, &[], &pe);
    let driver = build_file(DXE_CORE_GUID, 0x07, 0, &join_sections(&[section]));
    let image = build_uefi_image_with_files(0x1000, &[driver, build_vtf_file()]);

    let mut first = FfsParser::new();
    first.parse(&image).unwrap();
    let mut second = FfsParser::new();
    second.parse(&image).unwrap();

    assert_eq!(tree_summary(first.model()), tree_summary(second.model()));
    let first_messages: Vec<&String> = first.messages().iter().map(|(m, _)| m).collect();
    let second_messages: Vec<&String> = second.messages().iter().map(|(m, _)| m).collect();
    assert_eq!(first_messages, second_messages);

    // Reusing one parser instance must behave the same as a fresh one
    let mut reused = first;
    reused.parse(&image).unwrap();
    assert_eq!(tree_summary(reused.model()), tree_summary(second.model()));
}
