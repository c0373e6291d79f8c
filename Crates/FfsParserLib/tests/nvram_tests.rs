//! NVRAM store tests: VSS stores inside NVRAM volumes and NVAR store files.

mod fixtures;

use ffs_parser_lib::FfsParser;
use fixtures::*;
use tree_model_lib::{nvar_entry_subtype, vss_entry_subtype, ItemId, ItemType, TreeModel};
use uuid::uuid;

fn find_first(model: &TreeModel, item_type: ItemType) -> Option<ItemId> {
    model
        .descendants(model.root())
        .into_iter()
        .find(|&item| model.item_type(item) == item_type)
}

fn build_vss_store(store_size: usize, variables: &[Vec<u8>]) -> Vec<u8> {
    let mut store = Vec::new();
    store.extend_from_slice(b"$VSS");
    store.extend_from_slice(&(store_size as u32).to_le_bytes());
    store.push(0x5A); // formatted
    store.push(0xFE); // healthy
    store.extend_from_slice(&0u16.to_le_bytes());
    store.extend_from_slice(&0u32.to_le_bytes());
    for variable in variables {
        store.extend_from_slice(variable);
    }
    store.resize(store_size, 0xFF);
    store
}

fn build_vss_variable(name: &str, state: u8, attributes: u32, data: &[u8]) -> Vec<u8> {
    let name_bytes: Vec<u8> = name
        .encode_utf16()
        .chain(core::iter::once(0))
        .flat_map(|unit| unit.to_le_bytes())
        .collect();

    let mut variable = Vec::new();
    variable.extend_from_slice(&0x55AAu16.to_le_bytes());
    variable.push(state);
    variable.push(0);
    variable.extend_from_slice(&attributes.to_le_bytes());
    variable.extend_from_slice(&(name_bytes.len() as u32).to_le_bytes());
    variable.extend_from_slice(&(data.len() as u32).to_le_bytes());
    variable.extend_from_slice(&uuid!("8BE4DF61-93CA-11D2-AA0D-00E098032B8C").to_bytes_le());
    variable.extend_from_slice(&name_bytes);
    variable.extend_from_slice(data);
    variable
}

#[test]
fn vss_store_inside_nvram_volume() {
    let boot = build_vss_variable("Boot", 0x3F, 0x07, &[0x01, 0x00, 0x02, 0x00]);
    let deleted = build_vss_variable("Lang", 0xFD, 0x07, b"en");
    let store = build_vss_store(0x200, &[boot, deleted]);
    let image = build_volume(NVRAM_VOLUME_GUID, 0x1000, &store);

    let mut parser = FfsParser::new();
    parser.parse(&image).unwrap();
    let model = parser.model();

    let vss = find_first(model, ItemType::VssStore).expect("VSS store missing");
    assert_eq!(model.header(vss).len(), 16);
    assert_eq!(model.full_size(vss), 0x200);

    let entries: Vec<ItemId> = model
        .children(vss)
        .iter()
        .copied()
        .filter(|&c| model.item_type(c) == ItemType::VssEntry)
        .collect();
    assert_eq!(entries.len(), 2);

    assert_eq!(model.name(entries[0]), "Boot");
    assert_eq!(model.subtype(entries[0]), vss_entry_subtype::STANDARD);
    assert!(model.info(entries[0]).contains("NV, BS, RT"));
    assert_eq!(model.body(entries[0]).len(), 4);

    // The deleted variable still shows up, as an invalid entry
    assert_eq!(model.name(entries[1]), "Lang");
    assert_eq!(model.subtype(entries[1]), vss_entry_subtype::INVALID);

    // The store tail and the volume tail are free space
    assert!(model
        .children(vss)
        .iter()
        .any(|&c| model.item_type(c) == ItemType::FreeSpace));
}

#[test]
fn nvar_store_file_parses_entry_chain() {
    let variable_guid = uuid!("DEADBEEF-0000-4000-8000-0000000000AA");
    let name = b"Setup\0";
    let data = [0x11u8; 8];

    let mut entry = Vec::new();
    let entry_size = 10 + 16 + name.len() + data.len();
    entry.extend_from_slice(b"NVAR");
    entry.extend_from_slice(&(entry_size as u16).to_le_bytes());
    // Next empty, attributes: valid, inline GUID, ASCII name
    let next_and_attributes: u32 = 0x00FF_FFFF | ((0x80u32 | 0x04 | 0x02) << 24);
    entry.extend_from_slice(&next_and_attributes.to_le_bytes());
    entry.extend_from_slice(&variable_guid.to_bytes_le());
    entry.extend_from_slice(name);
    entry.extend_from_slice(&data);

    let mut body = entry;
    body.resize(body.len() + 24, 0xFF); // free space tail

    let nvar_file = build_file(NVAR_STORE_FILE_GUID, 0x01, 0, &body);
    let image = build_uefi_image_with_files(0x1000, &[nvar_file, build_vtf_file()]);

    let mut parser = FfsParser::new();
    parser.parse(&image).unwrap();
    let model = parser.model();

    let file = model
        .descendants(model.root())
        .into_iter()
        .find(|&item| {
            model.item_type(item) == ItemType::File && model.text(item) == "NVAR store"
        })
        .expect("NVAR store file missing");

    let entries: Vec<ItemId> = model
        .children(file)
        .iter()
        .copied()
        .filter(|&c| model.item_type(c) == ItemType::NvarEntry)
        .collect();
    assert_eq!(entries.len(), 1);
    assert_eq!(model.name(entries[0]), "Setup");
    assert_eq!(model.subtype(entries[0]), nvar_entry_subtype::FULL);
    assert!(model
        .info(entries[0])
        .contains("Variable GUID: DEADBEEF-0000-4000-8000-0000000000AA"));
    assert_eq!(model.body(entries[0]).len(), 8);

    // Free space after the last entry
    assert!(model
        .children(file)
        .iter()
        .any(|&c| model.item_type(c) == ItemType::FreeSpace));
}
