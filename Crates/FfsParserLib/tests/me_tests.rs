//! ME-format tests: FPT partition tables inside an Intel image's ME region
//! and BPDT stores found in raw areas.

mod fixtures;

use ffs_parser_lib::FfsParser;
use fixtures::*;
use tree_model_lib::{fpt_partition_subtype, region_subtype, ItemId, ItemType, TreeModel};

fn find_all(model: &TreeModel, item_type: ItemType) -> Vec<ItemId> {
    model
        .descendants(model.root())
        .into_iter()
        .filter(|&item| model.item_type(item) == item_type)
        .collect()
}

#[test]
fn fpt_inside_intel_image_me_region() {
    let me_region = build_fpt_me_region();
    let bios_region = build_uefi_image_with_files(0x2000, &[build_vtf_file()]);
    let image = build_intel_image(&me_region, &bios_region);

    let mut parser = FfsParser::new();
    parser.parse(&image).unwrap();
    let model = parser.model();

    // All three regions present
    let regions = find_all(model, ItemType::Region);
    let subtypes: Vec<u8> = regions.iter().map(|&r| model.subtype(r)).collect();
    assert!(subtypes.contains(&region_subtype::DESCRIPTOR));
    assert!(subtypes.contains(&region_subtype::ME));
    assert!(subtypes.contains(&region_subtype::BIOS));

    // The descriptor info names the real regions
    let descriptor = regions
        .iter()
        .copied()
        .find(|&r| model.subtype(r) == region_subtype::DESCRIPTOR)
        .unwrap();
    assert!(model.info(descriptor).contains("BIOS region offset"));
    assert!(model.info(descriptor).contains("ME region offset"));

    // ME version extracted from the $MN2 record
    let me = regions
        .iter()
        .copied()
        .find(|&r| model.subtype(r) == region_subtype::ME)
        .unwrap();
    assert!(model.info(me).contains("Version: 11.8.50.3425"));

    // FPT store with its entry and partition
    let fpt_store = find_all(model, ItemType::FptStore);
    assert_eq!(fpt_store.len(), 1);
    assert!(!parser
        .messages()
        .iter()
        .any(|(m, _)| m.contains("FPT header checksum is invalid")));

    let entries = find_all(model, ItemType::FptEntry);
    assert_eq!(entries.len(), 1);
    assert_eq!(model.name(entries[0]), "MFS");

    let partitions = find_all(model, ItemType::FptPartition);
    assert_eq!(partitions.len(), 1);
    assert_eq!(model.name(partitions[0]), "MFS");
    assert_eq!(model.subtype(partitions[0]), fpt_partition_subtype::DATA);

    // Gaps around the partition became padding under the store
    assert!(model
        .children(fpt_store[0])
        .iter()
        .any(|&c| model.item_type(c) == ItemType::Padding));
}

fn build_bpdt_store_with_cpd() -> Vec<u8> {
    // CPD directory with a manifest entry and a code entry
    let mut cpd = Vec::new();
    cpd.extend_from_slice(b"$CPD");
    cpd.extend_from_slice(&2u32.to_le_bytes()); // entries
    cpd.push(1); // header version
    cpd.push(0); // entry version
    cpd.push(16); // header length
    cpd.push(0); // checksum
    cpd.extend_from_slice(b"FTPR");
    assert_eq!(cpd.len(), 16);

    // Entries: the code partition and its area
    let code_offset = 16 + 2 * 24; // right after the entry table
    let code_size = 0x20u32;
    let mut entry = |name: &[u8], offset: u32, size: u32| {
        let mut bytes = [0u8; 24];
        bytes[..name.len()].copy_from_slice(name);
        bytes[12..16].copy_from_slice(&offset.to_le_bytes());
        bytes[16..20].copy_from_slice(&size.to_le_bytes());
        bytes
    };
    cpd.extend_from_slice(&entry(b"FTPR.mod", code_offset as u32, code_size));
    cpd.extend_from_slice(&entry(
        b"FTPR.pad",
        code_offset as u32 + code_size,
        0x10,
    ));
    cpd.extend_from_slice(&[0xC3u8; 0x20]); // FTPR.mod
    cpd.extend_from_slice(&[0xD4u8; 0x10]); // FTPR.pad

    // BPDT with one FTPR partition holding the CPD
    let partition_offset = 0x40usize;
    let mut bpdt = Vec::new();
    bpdt.extend_from_slice(&0x0000_55AAu32.to_le_bytes());
    bpdt.extend_from_slice(&1u16.to_le_bytes()); // entries
    bpdt.extend_from_slice(&1u16.to_le_bytes()); // version
    bpdt.extend_from_slice(&0u32.to_le_bytes()); // checksum
    bpdt.extend_from_slice(&0x100u32.to_le_bytes()); // IFWI version
    bpdt.extend_from_slice(&12u16.to_le_bytes());
    bpdt.extend_from_slice(&0u16.to_le_bytes());
    bpdt.extend_from_slice(&10u16.to_le_bytes());
    bpdt.extend_from_slice(&100u16.to_le_bytes());
    assert_eq!(bpdt.len(), 24);
    // Entry: type FTPR (2)
    bpdt.extend_from_slice(&2u32.to_le_bytes());
    bpdt.extend_from_slice(&(partition_offset as u32).to_le_bytes());
    bpdt.extend_from_slice(&(cpd.len() as u32).to_le_bytes());
    bpdt.resize(partition_offset, 0);
    bpdt.extend_from_slice(&cpd);
    bpdt
}

#[test]
fn bpdt_store_with_cpd_directory_in_generic_image() {
    let image = build_bpdt_store_with_cpd();

    let mut parser = FfsParser::new();
    parser.parse(&image).unwrap();
    let model = parser.model();

    let bpdt_stores = find_all(model, ItemType::BpdtStore);
    // The raw-area item plus the partition table item
    assert_eq!(bpdt_stores.len(), 2);

    let bpdt_entries = find_all(model, ItemType::BpdtEntry);
    assert_eq!(bpdt_entries.len(), 1);
    assert_eq!(model.name(bpdt_entries[0]), "FTPR");

    let partitions = find_all(model, ItemType::BpdtPartition);
    assert_eq!(partitions.len(), 1);
    assert_eq!(model.name(partitions[0]), "FTPR");
    assert!(!parser
        .messages()
        .iter()
        .any(|(m, _)| m.contains("BPDT entry of unknown type")));

    // The CPD inside the partition
    let cpd_stores = find_all(model, ItemType::CpdStore);
    assert_eq!(cpd_stores.len(), 1);
    let cpd_entries = find_all(model, ItemType::CpdEntry);
    assert_eq!(cpd_entries.len(), 2);
    let cpd_partitions = find_all(model, ItemType::CpdPartition);
    assert_eq!(cpd_partitions.len(), 2);
    // Code partitions carry a SHA-256 hash line
    assert!(cpd_partitions
        .iter()
        .any(|&p| model.info(p).contains("Hash: ")));
}
