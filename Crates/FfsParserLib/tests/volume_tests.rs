//! Firmware volume and FFS file tests, including the byte-exact round-trip
//! property over a parsed volume.

mod fixtures;

use ffs_parser_lib::FfsParser;
use fixtures::*;
use tree_model_lib::{volume_subtype, ItemId, ItemType, TreeModel};
use uuid::uuid;

fn find_first(model: &TreeModel, item_type: ItemType) -> Option<ItemId> {
    model
        .descendants(model.root())
        .into_iter()
        .find(|&item| model.item_type(item) == item_type)
}

fn item_bytes(model: &TreeModel, item: ItemId) -> Vec<u8> {
    let mut out = model.header(item).to_vec();
    out.extend_from_slice(model.body(item));
    out.extend_from_slice(model.tail(item));
    out
}

#[test]
fn minimal_ffs2_volume_has_free_space_body() {
    let image = build_volume(FFS2_GUID, 0x1000, &[]);
    let mut parser = FfsParser::new();
    parser.parse(&image).unwrap();

    let model = parser.model();
    let top = model.children(model.root())[0];
    assert_eq!(model.item_type(top), ItemType::Image);

    let volume = model.children(top)[0];
    assert_eq!(model.item_type(volume), ItemType::Volume);
    assert_eq!(model.subtype(volume), volume_subtype::FFS2);
    assert_eq!(model.header(volume).len(), 0x48);

    let children = model.children(volume);
    assert_eq!(children.len(), 1);
    let free_space = children[0];
    assert_eq!(model.item_type(free_space), ItemType::FreeSpace);
    assert_eq!(model.body(free_space).len(), 0x1000 - 0x48);

    // No diagnostics attached to the volume
    assert!(parser
        .messages()
        .iter()
        .all(|(_, item)| *item != Some(volume)));
}

#[test]
fn pe32_driver_file_is_parsed_down_to_image_info() {
    let pe = build_pe32plus(0x8664, 0x1_0000_0000);
    let section = build_section(0x10, &[], &pe);
    let driver = build_file(
        uuid!("DEADBEEF-0000-4000-8000-000000000001"),
        0x07, // DXE driver
        0,
        &join_sections(&[section]),
    );
    let image = build_uefi_image_with_files(0x1000, &[driver]);

    let mut parser = FfsParser::new();
    parser.parse(&image).unwrap();
    let model = parser.model();

    let file = find_first(model, ItemType::File).expect("file missing");
    assert_eq!(model.subtype(file), 0x07);
    assert!(model.info(file).contains("Header checksum"));
    assert!(model.info(file).contains("valid"));

    let section = find_first(model, ItemType::Section).expect("section missing");
    assert_eq!(model.subtype(section), 0x10);
    assert!(model.info(section).contains("Machine type: X64"));
    assert!(model.info(section).contains("Image base: 100000000h"));
}

#[test]
fn volume_children_reconstruct_volume_body() {
    let pe = build_pe32plus(0x8664, 0x1_0000_0000);
    let section = build_section(0x10, &[], &pe);
    let driver = build_file(
        uuid!("DEADBEEF-0000-4000-8000-000000000001"),
        0x07,
        0,
        &join_sections(&[section]),
    );
    let image = build_uefi_image_with_files(0x1000, &[driver, build_vtf_file()]);

    let mut parser = FfsParser::new();
    parser.parse(&image).unwrap();
    let model = parser.model();

    let volume = find_first(model, ItemType::Volume).expect("volume missing");

    // In-order concatenation of the children reconstructs the body exactly;
    // alignment gaps between files count as part of the preceding span only
    // when the parser emitted items for them, so walk by offsets instead
    let mut reconstructed = vec![0xFFu8; model.body(volume).len()];
    for &child in model.children(volume) {
        let offset = model.offset(child) as usize - model.header(volume).len();
        let bytes = item_bytes(model, child);
        reconstructed[offset..offset + bytes.len()].copy_from_slice(&bytes);
    }
    assert_eq!(&reconstructed, model.body(volume).as_bytes());

    // The same property holds one level down, for the file's sections
    let file = find_first(model, ItemType::File).expect("file missing");
    let mut reconstructed = vec![0u8; model.body(file).len()];
    for &child in model.children(file) {
        let offset = model.offset(child) as usize - model.header(file).len();
        let bytes = item_bytes(model, child);
        reconstructed[offset..offset + bytes.len()].copy_from_slice(&bytes);
    }
    assert_eq!(&reconstructed, model.body(file).as_bytes());
}

#[test]
fn duplicate_file_guids_are_reported_on_the_second_file() {
    let guid = uuid!("DEADBEEF-0000-4000-8000-000000000002");
    let body = join_sections(&[build_section(0x19, &[], &[0xAA; 16])]);
    let first = build_file(guid, 0x02, 0, &body);
    let second = build_file(guid, 0x02, 0, &body);
    let image = build_uefi_image_with_files(0x1000, &[first, second]);

    let mut parser = FfsParser::new();
    parser.parse(&image).unwrap();

    let duplicates: Vec<_> = parser
        .messages()
        .iter()
        .filter(|(m, _)| m.contains("duplicate GUID"))
        .collect();
    assert_eq!(duplicates.len(), 1);
    // The diagnostic must be attached to the second occurrence
    let model = parser.model();
    let item = duplicates[0].1.expect("diagnostic must carry an item");
    let volume = find_first(model, ItemType::Volume).unwrap();
    assert_eq!(model.children(volume)[1], item);
}

#[test]
fn corrupted_header_checksum_is_reported() {
    let body = join_sections(&[build_section(0x19, &[], &[0xAA; 16])]);
    let mut file = build_file(uuid!("DEADBEEF-0000-4000-8000-000000000003"), 0x02, 0, &body);
    file[16] = file[16].wrapping_add(1); // break the header checksum
    let image = build_uefi_image_with_files(0x1000, &[file]);

    let mut parser = FfsParser::new();
    parser.parse(&image).unwrap();

    assert!(parser
        .messages()
        .iter()
        .any(|(m, _)| m.contains("invalid header checksum")));
    let model = parser.model();
    let file = find_first(model, ItemType::File).unwrap();
    assert!(model.info(file).contains("invalid, should be"));
}

fn build_ffs3_section_with_extended_size(body_len: usize, declared: usize) -> Vec<u8> {
    let mut section = Vec::new();
    section.extend_from_slice(&[0xFF, 0xFF, 0xFF]); // extended size marker
    section.push(0x19); // RAW
    section.extend_from_slice(&(declared as u32).to_le_bytes());
    section.extend_from_slice(&vec![0xA5u8; body_len]);
    section
}

#[test]
fn ffsv3_extended_section_at_exact_boundary_parses() {
    let section = build_ffs3_section_with_extended_size(0x20, 8 + 0x20);
    let file = build_file(uuid!("DEADBEEF-0000-4000-8000-000000000004"), 0x02, 0, &section);
    let image = build_volume(FFS3_GUID, 0x1000, &file);

    let mut parser = FfsParser::new();
    parser.parse(&image).unwrap();
    let model = parser.model();
    let section = find_first(model, ItemType::Section).expect("section missing");
    assert_eq!(model.subtype(section), 0x19);
    assert_eq!(model.header(section).len(), 8);
    assert_eq!(model.body(section).len(), 0x20);
    assert!(!parser
        .messages()
        .iter()
        .any(|(m, _)| m.contains("non-UEFI data found in sections area")));
}

#[test]
fn ffsv3_extended_section_one_byte_short_is_diagnosed() {
    // Declared size exceeds the actual body by one byte
    let section = build_ffs3_section_with_extended_size(0x20, 8 + 0x20 + 1);
    let file = build_file(uuid!("DEADBEEF-0000-4000-8000-000000000005"), 0x02, 0, &section);
    let image = build_volume(FFS3_GUID, 0x1000, &file);

    let mut parser = FfsParser::new();
    parser.parse(&image).unwrap();
    assert!(parser
        .messages()
        .iter()
        .any(|(m, _)| m.contains("non-UEFI data found in sections area")));
}

#[test]
fn vtf_anchors_the_address_difference() {
    let image = build_uefi_image_with_files(0x1000, &[build_vtf_file()]);
    let mut parser = FfsParser::new();
    parser.parse(&image).unwrap();

    let model = parser.model();
    let vtf = find_first(model, ItemType::File).expect("VTF missing");
    assert_eq!(model.text(vtf), "Volume Top File");
    assert_eq!(
        parser.address_diff() + model.base(vtf) as u64 + model.full_size(vtf) as u64,
        0x1_0000_0000
    );
    assert!(!parser
        .messages()
        .iter()
        .any(|(m, _)| m.contains("not a single Volume Top File")));

    // Reset vector data decoded into the VTF info
    assert!(model.info(vtf).contains("PEI core entry point: FFE00000h"));
    assert!(model.info(vtf).contains("BootFV base address: FFF80000h"));
}
