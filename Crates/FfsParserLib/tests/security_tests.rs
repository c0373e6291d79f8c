//! Second-pass security tests: TE base classification, vendor hash files,
//! and FIT decoding with Boot Guard manifests.

mod fixtures;

use ffs_parser_lib::FfsParser;
use fixtures::*;
use sha2::{Digest, Sha256};
use tree_model_lib::{ItemId, ItemType, Marking, ParsingData, TreeModel, TE_BASE_ORIGINAL};
use uuid::uuid;

fn find_first(model: &TreeModel, item_type: ItemType) -> Option<ItemId> {
    model
        .descendants(model.root())
        .into_iter()
        .find(|&item| model.item_type(item) == item_type)
}

fn find_section(model: &TreeModel, section_type: u8) -> Option<ItemId> {
    model.descendants(model.root()).into_iter().find(|&item| {
        model.item_type(item) == ItemType::Section && model.subtype(item) == section_type
    })
}

fn sha256(data: &[u8]) -> Vec<u8> {
    Sha256::digest(data).to_vec()
}

fn hex_upper(data: &[u8]) -> String {
    data.iter().map(|b| format!("{:02X}", b)).collect()
}

#[test]
fn te_image_base_is_classified_as_original() {
    // First pass with a placeholder base to learn the layout
    let build = |image_base: u64| {
        let te = build_te_section_body(0x8664, 0x38, image_base);
        let section = build_section(0x12, &[], &te);
        let te_file = build_file(
            uuid!("DEADBEEF-0000-4000-8000-000000000020"),
            0x07,
            0,
            &join_sections(&[section]),
        );
        build_uefi_image_with_files(0x1000, &[build_vtf_file(), te_file])
    };

    let mut parser = FfsParser::new();
    parser.parse(&build(0x1000)).unwrap();
    let model = parser.model();
    let te_section = find_section(model, 0x12).expect("TE section missing");
    let te_base = model.base(te_section);
    let header_size = model.header(te_section).len();
    let expected_base =
        (parser.address_diff() + te_base as u64 + header_size as u64) as u32;

    // Rebuild with the image base the classifier expects as Original
    let mut image = build(expected_base as u64);
    let image_base_offset = te_base as usize + header_size + 16;
    image[image_base_offset..image_base_offset + 8]
        .copy_from_slice(&(expected_base as u64).to_le_bytes());

    let mut parser = FfsParser::new();
    parser.parse(&image).unwrap();
    let model = parser.model();
    let te_section = find_section(model, 0x12).expect("TE section missing");
    match model.parsing_data(te_section) {
        ParsingData::TeSection(pdata) => {
            assert_eq!(pdata.image_base_type, TE_BASE_ORIGINAL);
            assert_eq!(pdata.original_image_base, expected_base);
        }
        other => panic!("unexpected parsing data {:?}", other),
    }
    assert!(!parser
        .messages()
        .iter()
        .any(|(m, _)| m.contains("neither zero, nor original")));
}

#[test]
fn ami_v2_vendor_hash_file_records_protected_ranges() {
    let build = |record: &[u8; 80]| {
        let raw_section = build_section(0x19, &[], record);
        let hash_file = build_file(AMI_HASH_FILE_GUID, 0x02, 0, &join_sections(&[raw_section]));
        build_uefi_image_with_files(0x1000, &[build_vtf_file(), hash_file])
    };

    // Learn the layout with a placeholder record
    let mut parser = FfsParser::new();
    parser.parse(&build(&[0u8; 80])).unwrap();
    let model = parser.model();
    let vtf = find_first(model, ItemType::File).expect("VTF missing");
    let vtf_offset = model.base(vtf);
    let vtf_size = model.full_size(vtf) as u32;
    let address_diff = parser.address_diff();
    let volume = find_first(model, ItemType::Volume).unwrap();
    let volume_header_size = model.header(volume).len() as u32;

    // Two ranges: the volume header and the whole VTF file
    let image = build(&[0u8; 80]);
    let range0 = (0u32, volume_header_size);
    let range1 = (vtf_offset, vtf_size);
    let mut record = [0u8; 80];
    for (slot, (offset, size)) in [range0, range1].iter().enumerate() {
        let base = (address_diff + *offset as u64) as u32;
        let hash = sha256(&image[*offset as usize..(*offset + *size) as usize]);
        let record_offset = slot * 40;
        record[record_offset..record_offset + 4].copy_from_slice(&base.to_le_bytes());
        record[record_offset + 4..record_offset + 8].copy_from_slice(&size.to_le_bytes());
        record[record_offset + 8..record_offset + 40].copy_from_slice(&hash);
    }

    let mut parser = FfsParser::new();
    parser.parse(&build(&record)).unwrap();
    let model = parser.model();

    // The hash file is renamed
    assert!(model
        .descendants(model.root())
        .into_iter()
        .any(|item| model.text(item) == "AMI hash file"));

    // Both ranges surface in the security info, with no mismatch diagnostics
    assert!(parser.security_info().contains("AMI hash file v2 found"));
    assert_eq!(parser.security_info().matches("Address: ").count(), 2);
    assert!(!parser
        .messages()
        .iter()
        .any(|(m, _)| m.contains("hash mismatch")));
    assert!(parser
        .messages()
        .iter()
        .any(|(m, _)| m.contains("new AMI hash file found")));

    // The fully covered VTF is marked, the partially covered volume is
    // marked partial
    let vtf = find_first(model, ItemType::File).unwrap();
    assert_eq!(model.marking(vtf), Marking::Cyan);
    let volume = find_first(model, ItemType::Volume).unwrap();
    assert_eq!(model.marking(volume), Marking::Yellow);
}

#[test]
fn phoenix_hash_file_records_relative_ranges() {
    let placeholder = [0xEEu8; 32];
    let mut body = Vec::new();
    body.extend_from_slice(b"$HASHTBL");
    body.extend_from_slice(&1u32.to_le_bytes());
    body.extend_from_slice(&0u32.to_le_bytes()); // base, relative to first BIOS item
    body.extend_from_slice(&0x48u32.to_le_bytes()); // size
    body.extend_from_slice(&placeholder);

    let hash_file = build_file(PHOENIX_HASH_FILE_GUID, 0x01, 0, &body);
    let mut image = build_uefi_image_with_files(0x1000, &[build_vtf_file(), hash_file]);

    // Patch the placeholder with the real digest of the covered range; the
    // covered bytes lie outside the record itself
    let digest = sha256(&image[0..0x48]);
    let position = image
        .windows(32)
        .position(|window| window == placeholder)
        .expect("placeholder not found");
    image[position..position + 32].copy_from_slice(&digest);

    let mut parser = FfsParser::new();
    parser.parse(&image).unwrap();
    let model = parser.model();

    assert!(model
        .descendants(model.root())
        .into_iter()
        .any(|item| model.text(item) == "Phoenix hash file"));
    assert!(parser.security_info().contains("Phoenix hash file found"));
    assert!(!parser
        .messages()
        .iter()
        .any(|(m, _)| m.contains("hash mismatch")));

    let volume = find_first(model, ItemType::Volume).unwrap();
    assert_eq!(model.marking(volume), Marking::Yellow);
}

fn build_boot_guard_blobs(
    km_hash: &[u8; 32],
    ibb_digest: &[u8; 32],
    ibb_base: u32,
    ibb_size: u32,
) -> Vec<u8> {
    let mut blob = Vec::new();

    // Key manifest at offset 0
    blob.extend_from_slice(b"__KEYM__");
    blob.push(0x10); // version 1.0
    blob.push(0x01); // KM version
    blob.push(0x02); // KM SVN
    blob.push(0x01); // KM ID
    blob.extend_from_slice(&0x000Bu16.to_le_bytes()); // SHA256
    blob.extend_from_slice(&32u16.to_le_bytes());
    blob.extend_from_slice(km_hash);
    blob.resize(64, 0);

    // Boot policy manifest at offset 64
    blob.extend_from_slice(b"__ACBP__");
    blob.push(0x10); // version
    blob.push(0x01); // header version
    blob.push(0x01); // PMBPM version
    blob.push(0x02); // BP SVN
    blob.push(0x02); // ACM SVN
    blob.push(0); // reserved
    blob.extend_from_slice(&0u16.to_le_bytes()); // NEM data stack
    assert_eq!(blob.len(), 64 + 16);

    // IBB element
    blob.extend_from_slice(b"__IBBS__");
    blob.push(0x10); // version
    blob.push(0); // reserved
    blob.extend_from_slice(&0u16.to_le_bytes()); // element size
    blob.extend_from_slice(&0u32.to_le_bytes()); // flags
    blob.extend_from_slice(&0xFED1_0000u64.to_le_bytes()); // MCH BAR
    blob.extend_from_slice(&0xFED9_0000u64.to_le_bytes()); // VT-d BAR
    blob.extend_from_slice(&0u32.to_le_bytes()); // DMA protection base 0
    blob.extend_from_slice(&0u32.to_le_bytes()); // DMA protection limit 0
    blob.extend_from_slice(&0u64.to_le_bytes()); // DMA protection base 1
    blob.extend_from_slice(&0u64.to_le_bytes()); // DMA protection limit 1
    // Post-IBB hash
    blob.extend_from_slice(&0x000Bu16.to_le_bytes());
    blob.extend_from_slice(&32u16.to_le_bytes());
    blob.extend_from_slice(&[0u8; 32]);
    // IBB entry point
    blob.extend_from_slice(&0xFFFF_FFF0u32.to_le_bytes());
    // IBB digest
    blob.extend_from_slice(&0x000Bu16.to_le_bytes());
    blob.extend_from_slice(&32u16.to_le_bytes());
    blob.extend_from_slice(ibb_digest);
    // One IBB segment
    blob.push(1);
    blob.extend_from_slice(&0u16.to_le_bytes()); // reserved
    blob.extend_from_slice(&0u16.to_le_bytes()); // flags: IBB
    blob.extend_from_slice(&ibb_base.to_le_bytes());
    blob.extend_from_slice(&ibb_size.to_le_bytes());

    blob
}

#[test]
fn fit_with_boot_guard_manifests_yields_protected_ranges() {
    let build = |blobs: &[u8], fit: &[u8], pointer: u32| {
        let bg_file = build_file(
            uuid!("DEADBEEF-0000-4000-8000-000000000030"),
            0x01,
            0,
            blobs,
        );
        // The VTF body holds the FIT table and the FIT pointer at the very
        // spot that maps to physical 0xFFFFFFC0
        let mut vtf_body = vec![0u8; 0x100];
        vtf_body[..fit.len()].copy_from_slice(fit);
        vtf_body[0xC0..0xC4].copy_from_slice(&pointer.to_le_bytes());
        let vtf = build_file(VTF_GUID, 0x01, 0, &vtf_body);
        build_uefi_image_with_files(0x2000, &[bg_file, vtf])
    };

    // Learn the layout first
    let blobs = build_boot_guard_blobs(&[0u8; 32], &[0u8; 32], 0, 0x48);
    let empty_fit = vec![0u8; 48];
    let mut parser = FfsParser::new();
    parser.parse(&build(&blobs, &empty_fit, 0)).unwrap();
    let model = parser.model();
    let address_diff = parser.address_diff();
    let bg_file = find_first(model, ItemType::File).expect("boot guard file missing");
    let blob_base = model.base(bg_file) as u64 + model.header(bg_file).len() as u64;
    let vtf = model
        .descendants(model.root())
        .into_iter()
        .find(|&item| model.text(item) == "Volume Top File")
        .expect("VTF missing");
    let fit_base = model.base(vtf) as u64 + model.header(vtf).len() as u64;

    // Build the real FIT: header + KM entry + BPM entry
    let km_address = address_diff + blob_base;
    let bpm_address = address_diff + blob_base + 64;
    let mut fit = Vec::new();
    fit.extend_from_slice(b"_FIT_   ");
    fit.extend_from_slice(&3u32.to_le_bytes()); // three entries
    fit.extend_from_slice(&0x0100u16.to_le_bytes());
    fit.push(0x00); // type header, checksum not valid
    fit.push(0x00);
    let mut entry = |address: u64, entry_type: u8| {
        let mut bytes = [0u8; 16];
        bytes[..8].copy_from_slice(&address.to_le_bytes());
        bytes[12..14].copy_from_slice(&0x0100u16.to_le_bytes());
        bytes[14] = entry_type;
        bytes
    };
    fit.extend_from_slice(&entry(km_address, 0x0B));
    fit.extend_from_slice(&entry(bpm_address, 0x0C));

    let image = build(&blobs, &fit, (address_diff + fit_base) as u32);
    let ibb_digest: [u8; 32] = sha256(&image[0..0x48]).try_into().unwrap();
    let ibb_base = (address_diff/* + 0 */) as u32;
    let blobs = build_boot_guard_blobs(&[0x5Au8; 32], &ibb_digest, ibb_base, 0x48);
    let image = build(&blobs, &fit, (address_diff + fit_base) as u32);

    let mut parser = FfsParser::new();
    parser.parse(&image).unwrap();
    let model = parser.model();

    // The FIT table has three rows: header, KM, BPM
    let rows = parser.fit_table();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0].type_name, "FIT Header");
    assert_eq!(rows[1].type_name, "BootGuard Key Manifest");
    assert_eq!(rows[2].type_name, "BootGuard Boot Policy");

    // Security info carries the KM hash and the computed IBB digest over the
    // covered range
    assert!(parser.security_info().contains("KM hash (SHA256)"));
    assert!(parser.security_info().contains(&hex_upper(&[0x5Au8; 32])));
    assert!(parser
        .security_info()
        .contains(&format!("Computed IBB Hash (SHA256): {}", hex_upper(&ibb_digest))));

    // The volume is partially covered by the IBB range
    let volume = find_first(model, ItemType::Volume).unwrap();
    assert_eq!(model.marking(volume), Marking::Yellow);
    assert!(!parser
        .messages()
        .iter()
        .any(|(m, _)| m.contains("suspicious protected range offset")));
}
