//! NVRAM store parsing: store detection inside NVRAM volumes, and the
//! per-format store and variable parsers.

use tree_model_lib::{
    evsa_entry_subtype, flash_map_entry_subtype, fsys_entry_subtype, nvar_entry_subtype,
    vss_entry_subtype, ByteSpan, ItemId, ItemType, NvarEntryParsingData, ParsingData,
};
use uuid::Uuid;

use crate::basetypes::{align4, calculate_checksum8, read_le, read_le_at, uuid_to_string};
use crate::error::ParseError;
use crate::ffsparser::{size_string, FfsParser};
use crate::intel_microcode::{IntelMicrocodeHeader, INTEL_MICROCODE_HEADER_VERSION_1};
use crate::nvram::*;
use crate::utility::{ascii_string, padding_type, ucs2_string};

// What the NVRAM store scanner can find.
#[derive(Debug, Clone, Copy, PartialEq)]
enum StoreKind {
    Vss,
    Vss2,
    Ftw,
    Fdc,
    Fsys,
    Evsa,
    FlashMap,
    Cmdb,
    SlicPubkey,
    SlicMarker,
    Microcode,
}

pub(crate) const SLIC_SUBTYPE_PUBKEY: u8 = 0;
pub(crate) const SLIC_SUBTYPE_MARKER: u8 = 1;

impl FfsParser {
    pub(crate) fn parse_nvram_volume_body(&mut self, index: ItemId) -> Result<(), ParseError> {
        self.parse_store_area(index)
    }

    /// Scan an area for NVRAM stores and parse every one found. Gaps become
    /// padding, an empty tail becomes free space.
    pub(crate) fn parse_store_area(&mut self, index: ItemId) -> Result<(), ParseError> {
        let data = self.model.body(index).clone();
        let header_size = self.model.header(index).len() as u32;

        let mut prev_end = 0usize;
        let mut offset = 0usize;
        let mut store_found = false;
        while let Some((kind, store_offset, match_offset)) = self.find_next_store(&data, offset) {
            let Some(store_size) = self.get_store_size(&data, kind, store_offset) else {
                offset = match_offset + 4;
                continue;
            };
            if store_size < 4 || store_offset + store_size > data.len() {
                offset = match_offset + 4;
                continue;
            }

            // Padding between the stores
            if store_offset > prev_end {
                let padding = data.slice(prev_end, store_offset);
                self.add_store_padding(&padding, header_size + prev_end as u32, index);
            }

            let store = data.slice(store_offset, store_offset + store_size);
            let result =
                self.parse_store_header(kind, &store, header_size + store_offset as u32, index);
            match result {
                Ok(_) => {
                    store_found = true;
                    prev_end = store_offset + store_size;
                    offset = prev_end;
                }
                Err(_) => {
                    offset = match_offset + 4;
                }
            }
        }

        if !store_found {
            return Err(ParseError::StoresNotFound);
        }

        // Padding or free space after the last store
        if prev_end < data.len() {
            let tail = data.slice_from(prev_end);
            self.add_store_padding(&tail, header_size + prev_end as u32, index);
        }

        Ok(())
    }

    fn add_store_padding(&mut self, data: &ByteSpan, local_offset: u32, parent: ItemId) {
        let info = format!("Full size: {}", size_string(data.len()));
        if data.is_filled_with(0xFF) {
            self.add_item(
                local_offset,
                ItemType::FreeSpace,
                0,
                "Free space",
                "",
                info,
                ByteSpan::empty(),
                data.clone(),
                ByteSpan::empty(),
                false,
                parent,
            );
        } else {
            self.add_item(
                local_offset,
                ItemType::Padding,
                padding_type(data),
                "Padding",
                "",
                info,
                ByteSpan::empty(),
                data.clone(),
                ByteSpan::empty(),
                true,
                parent,
            );
        }
    }

    /// Returns the kind, the store's start offset, and the offset where the
    /// signature matched (the two differ for signatures that sit inside the
    /// store header).
    fn find_next_store(
        &self,
        data: &ByteSpan,
        start: usize,
    ) -> Option<(StoreKind, usize, usize)> {
        if data.len() < 4 {
            return None;
        }
        let mut offset = align4(start);
        while offset + 4 <= data.len() {
            let current = u32::from_le_bytes(data[offset..offset + 4].try_into().unwrap());

            match current {
                NVRAM_VSS_STORE_SIGNATURE
                | NVRAM_APPLE_SVS_STORE_SIGNATURE
                | NVRAM_APPLE_NSS_STORE_SIGNATURE => {
                    return Some((StoreKind::Vss, offset, offset))
                }
                NVRAM_FDC_STORE_SIGNATURE => return Some((StoreKind::Fdc, offset, offset)),
                NVRAM_APPLE_FSYS_STORE_SIGNATURE | NVRAM_APPLE_GAID_STORE_SIGNATURE => {
                    return Some((StoreKind::Fsys, offset, offset))
                }
                NVRAM_EVSA_STORE_SIGNATURE => {
                    // The EVSA signature sits after the store entry header
                    if offset >= 4 {
                        return Some((StoreKind::Evsa, offset - 4, offset));
                    }
                }
                NVRAM_PHOENIX_CMDB_HEADER_SIGNATURE => {
                    return Some((StoreKind::Cmdb, offset, offset))
                }
                OEM_ACTIVATION_PUBKEY_MAGIC => {
                    if offset >= OEM_ACTIVATION_PUBKEY_MAGIC_OFFSET {
                        return Some((
                            StoreKind::SlicPubkey,
                            offset - OEM_ACTIVATION_PUBKEY_MAGIC_OFFSET,
                            offset,
                        ));
                    }
                }
                INTEL_MICROCODE_HEADER_VERSION_1 => {
                    if let Some(header) = read_le_at::<IntelMicrocodeHeader>(data, offset) {
                        if header.is_valid() && header.total_size != 0 {
                            return Some((StoreKind::Microcode, offset, offset));
                        }
                    }
                }
                _ => {}
            }

            // GUID-headed stores
            if offset + 16 <= data.len() {
                let guid = Uuid::from_bytes_le(data[offset..offset + 16].try_into().unwrap());
                if guid == NVRAM_VSS2_AUTH_VAR_KEY_DATABASE_GUID || guid == NVRAM_VSS2_STORE_GUID
                {
                    return Some((StoreKind::Vss2, offset, offset));
                }
                if guid == NVRAM_FTW_BLOCK_SIGNATURE_GUID_EDKII
                    || guid == NVRAM_FTW_BLOCK_SIGNATURE_GUID_VSS2
                {
                    return Some((StoreKind::Ftw, offset, offset));
                }
            }

            // FlashMap carries a 10-byte text signature
            if offset + NVRAM_PHOENIX_FLASH_MAP_SIGNATURE.len() <= data.len()
                && data[offset..offset + NVRAM_PHOENIX_FLASH_MAP_SIGNATURE.len()]
                    == NVRAM_PHOENIX_FLASH_MAP_SIGNATURE[..]
            {
                return Some((StoreKind::FlashMap, offset, offset));
            }

            // The SLIC marker is recognized by its Windows flag
            if offset >= OEM_ACTIVATION_MARKER_WINDOWS_FLAG_OFFSET && offset + 8 <= data.len() {
                let flag = u64::from_le_bytes(data[offset..offset + 8].try_into().unwrap());
                if flag == OEM_ACTIVATION_MARKER_WINDOWS_FLAG {
                    return Some((
                        StoreKind::SlicMarker,
                        offset - OEM_ACTIVATION_MARKER_WINDOWS_FLAG_OFFSET,
                        offset,
                    ));
                }
            }

            offset += 4;
        }
        None
    }

    fn get_store_size(&self, data: &ByteSpan, kind: StoreKind, offset: usize) -> Option<usize> {
        match kind {
            StoreKind::Vss => {
                let header = read_le_at::<VssVariableStoreHeader>(data, offset)?;
                Some(header.size as usize)
            }
            StoreKind::Vss2 => {
                let header = read_le_at::<Vss2VariableStoreHeader>(data, offset)?;
                Some(header.size as usize)
            }
            StoreKind::Ftw => {
                let header = read_le_at::<FtwBlockHeader32>(data, offset)?;
                // 32-bit headers have a write queue size not divisible by 16
                if header.write_queue_size % 0x10 == 0x04 {
                    Some(FTW_BLOCK_HEADER32_SIZE + header.write_queue_size as usize)
                } else {
                    let header = read_le_at::<FtwBlockHeader64>(data, offset)?;
                    Some(FTW_BLOCK_HEADER64_SIZE + header.write_queue_size as usize)
                }
            }
            StoreKind::Fdc => {
                let header = read_le_at::<FdcStoreHeader>(data, offset)?;
                Some(header.size as usize)
            }
            StoreKind::Fsys => {
                let header = read_le_at::<FsysStoreHeader>(data, offset)?;
                Some(header.size as usize)
            }
            StoreKind::Evsa => {
                let entry = read_le_at::<EvsaStoreEntry>(data, offset)?;
                Some(entry.store_size as usize)
            }
            StoreKind::FlashMap => {
                let header = read_le_at::<PhoenixFlashMapHeader>(data, offset)?;
                Some(
                    PHOENIX_FLASH_MAP_HEADER_SIZE
                        + header.num_entries as usize * PHOENIX_FLASH_MAP_ENTRY_SIZE,
                )
            }
            StoreKind::Cmdb => Some(NVRAM_PHOENIX_CMDB_SIZE),
            StoreKind::SlicPubkey => Some(OEM_ACTIVATION_PUBKEY_SIZE),
            StoreKind::SlicMarker => Some(OEM_ACTIVATION_MARKER_SIZE),
            StoreKind::Microcode => {
                let header = read_le_at::<IntelMicrocodeHeader>(data, offset)?;
                Some(header.total_size as usize)
            }
        }
    }

    fn parse_store_header(
        &mut self,
        kind: StoreKind,
        store: &ByteSpan,
        local_offset: u32,
        parent: ItemId,
    ) -> Result<ItemId, ParseError> {
        match kind {
            StoreKind::Vss => self.parse_vss_store_header(store, local_offset, parent),
            StoreKind::Vss2 => self.parse_vss2_store_header(store, local_offset, parent),
            StoreKind::Ftw => self.parse_ftw_store_header(store, local_offset, parent),
            StoreKind::Fdc => self.parse_fdc_store_header(store, local_offset, parent),
            StoreKind::Fsys => self.parse_fsys_store_header(store, local_offset, parent),
            StoreKind::Evsa => self.parse_evsa_store_header(store, local_offset, parent),
            StoreKind::FlashMap => self.parse_flash_map_store_header(store, local_offset, parent),
            StoreKind::Cmdb => self.parse_cmdb_store_header(store, local_offset, parent),
            StoreKind::SlicPubkey => self.parse_slic_pubkey_header(store, local_offset, parent),
            StoreKind::SlicMarker => self.parse_slic_marker_header(store, local_offset, parent),
            StoreKind::Microcode => {
                self.parse_intel_microcode_header(store, local_offset, parent)
            }
        }
    }

    //
    // VSS
    //

    fn parse_vss_store_header(
        &mut self,
        store: &ByteSpan,
        local_offset: u32,
        parent: ItemId,
    ) -> Result<ItemId, ParseError> {
        if store.len() < VSS_VARIABLE_STORE_HEADER_SIZE {
            return Err(ParseError::InvalidStore);
        }
        let header: VssVariableStoreHeader = read_le(store).ok_or(ParseError::InvalidStore)?;
        if (header.size as usize) < VSS_VARIABLE_STORE_HEADER_SIZE {
            return Err(ParseError::InvalidStore);
        }

        let is_svs = header.signature == NVRAM_APPLE_SVS_STORE_SIGNATURE;
        let info = format!(
            "Signature: {}\nFull size: {}\nHeader size: {}\nBody size: {}\nFormat: {:02X}h\nState: {:02X}h\nUnknown: {:04X}h",
            String::from_utf8_lossy(&header.signature.to_le_bytes()),
            size_string(store.len()),
            size_string(VSS_VARIABLE_STORE_HEADER_SIZE),
            size_string(store.len() - VSS_VARIABLE_STORE_HEADER_SIZE),
            header.format,
            header.state,
            header.unknown
        );

        let index = self.add_item(
            local_offset,
            ItemType::VssStore,
            0,
            "VSS store",
            "",
            info,
            store.slice(0, VSS_VARIABLE_STORE_HEADER_SIZE),
            store.slice_from(VSS_VARIABLE_STORE_HEADER_SIZE),
            ByteSpan::empty(),
            true,
            parent,
        );

        if header.format != NVRAM_VSS_VARIABLE_STORE_FORMATTED {
            self.msg("parse_vss_store_header: VSS store is not formatted", Some(index));
        }
        if header.state != NVRAM_VSS_VARIABLE_STORE_HEALTHY {
            self.msg("parse_vss_store_header: VSS store is not healthy", Some(index));
        }

        self.parse_vss_store_body(index, 0, is_svs)?;
        Ok(index)
    }

    fn parse_vss2_store_header(
        &mut self,
        store: &ByteSpan,
        local_offset: u32,
        parent: ItemId,
    ) -> Result<ItemId, ParseError> {
        if store.len() < VSS2_VARIABLE_STORE_HEADER_SIZE {
            return Err(ParseError::InvalidStore);
        }
        let header: Vss2VariableStoreHeader = read_le(store).ok_or(ParseError::InvalidStore)?;
        if (header.size as usize) < VSS2_VARIABLE_STORE_HEADER_SIZE {
            return Err(ParseError::InvalidStore);
        }

        let info = format!(
            "Signature: {}\nFull size: {}\nHeader size: {}\nBody size: {}\nFormat: {:02X}h\nState: {:02X}h\nUnknown: {:04X}h",
            uuid_to_string(header.signature.to_uuid()),
            size_string(store.len()),
            size_string(VSS2_VARIABLE_STORE_HEADER_SIZE),
            size_string(store.len() - VSS2_VARIABLE_STORE_HEADER_SIZE),
            header.format,
            header.state,
            header.unknown
        );

        let index = self.add_item(
            local_offset,
            ItemType::Vss2Store,
            0,
            "VSS2 store",
            "",
            info,
            store.slice(0, VSS2_VARIABLE_STORE_HEADER_SIZE),
            store.slice_from(VSS2_VARIABLE_STORE_HEADER_SIZE),
            ByteSpan::empty(),
            true,
            parent,
        );

        // VSS2 variables are always authenticated and 4-byte aligned
        self.parse_vss_store_body(index, 4, true)?;
        Ok(index)
    }

    /// Parse the variables of a VSS/VSS2 store body. `alignment` pads
    /// variable starts, `auth` selects the authenticated header layout.
    fn parse_vss_store_body(
        &mut self,
        index: ItemId,
        alignment: usize,
        auth: bool,
    ) -> Result<(), ParseError> {
        let body = self.model.body(index).clone();
        let header_size = self.model.header(index).len() as u32;

        let mut offset = 0usize;
        while offset + VSS_VARIABLE_HEADER_SIZE <= body.len() {
            let Some(header) = read_le_at::<VssVariableHeader>(&body, offset) else {
                break;
            };
            if header.start_id != NVRAM_VSS_VARIABLE_START_ID {
                break;
            }

            // Select the header layout
            let is_apple = header.attributes & NVRAM_VSS_VARIABLE_APPLE_DATA_CHECKSUM != 0;
            let (variable_header_size, name_size, data_size, vendor_guid) = if auth {
                let Some(auth_header) = read_le_at::<VssAuthVariableHeader>(&body, offset) else {
                    break;
                };
                (
                    VSS_AUTH_VARIABLE_HEADER_SIZE,
                    auth_header.name_size as usize,
                    auth_header.data_size as usize,
                    auth_header.vendor_guid,
                )
            } else if is_apple {
                let Some(apple_header) = read_le_at::<VssAppleVariableHeader>(&body, offset)
                else {
                    break;
                };
                (
                    VSS_APPLE_VARIABLE_HEADER_SIZE,
                    apple_header.name_size as usize,
                    apple_header.data_size as usize,
                    apple_header.vendor_guid,
                )
            } else {
                (
                    VSS_VARIABLE_HEADER_SIZE,
                    header.name_size as usize,
                    header.data_size as usize,
                    header.vendor_guid,
                )
            };

            let variable_size = variable_header_size + name_size + data_size;
            if name_size == 0
                || variable_size > body.len() - offset
                || name_size > body.len()
                || data_size > body.len()
            {
                // A variable that does not fit ends the store; the rest is
                // an invalid entry
                let rest = body.slice_from(offset);
                let info = format!("Full size: {}", size_string(rest.len()));
                let invalid_index = self.add_item(
                    header_size + offset as u32,
                    ItemType::VssEntry,
                    vss_entry_subtype::INVALID,
                    "Invalid",
                    "",
                    info,
                    ByteSpan::empty(),
                    rest,
                    ByteSpan::empty(),
                    false,
                    index,
                );
                self.msg(
                    "parse_vss_store_body: invalid variable header, the rest of the store is unparsed",
                    Some(invalid_index),
                );
                return Ok(());
            }

            let name_offset = offset + variable_header_size;
            let data_offset = name_offset + name_size;
            let name = ucs2_string(&body[name_offset..name_offset + name_size]);
            let guid = vendor_guid.to_uuid();

            let valid = header.state == NVRAM_VSS_VARIABLE_ADDED;
            let subtype = if !valid {
                vss_entry_subtype::INVALID
            } else if auth {
                vss_entry_subtype::AUTH
            } else if is_apple {
                vss_entry_subtype::APPLE
            } else {
                vss_entry_subtype::STANDARD
            };

            let mut info = format!(
                "Variable GUID: {}\nFull size: {}\nHeader size: {}\nName size: {}\nData size: {}\nState: {:02X}h\nAttributes: {:08X}h ({})",
                uuid_to_string(guid),
                size_string(variable_size),
                size_string(variable_header_size),
                size_string(name_size),
                size_string(data_size),
                header.state,
                header.attributes,
                vss_attributes_to_string(header.attributes)
            );

            // Apple variables carry a CRC32 of the data
            if is_apple && !auth {
                if let Some(apple_header) = read_le_at::<VssAppleVariableHeader>(&body, offset) {
                    let calculated =
                        crc32fast::hash(&body[data_offset..data_offset + data_size]);
                    info += &format!(
                        "\nData checksum: {:08X}h, {}",
                        apple_header.data_crc32,
                        if calculated == apple_header.data_crc32 {
                            "valid".to_string()
                        } else {
                            format!("invalid, should be {:08X}h", calculated)
                        }
                    );
                }
            }

            let item_index = self.add_item(
                header_size + offset as u32,
                ItemType::VssEntry,
                subtype,
                if name.is_empty() { "Invalid".to_string() } else { name },
                uuid_to_string(guid),
                info,
                body.slice(offset, data_offset),
                body.slice(data_offset, data_offset + data_size),
                ByteSpan::empty(),
                false,
                index,
            );

            if is_apple && !auth {
                if let Some(apple_header) = read_le_at::<VssAppleVariableHeader>(&body, offset) {
                    let calculated =
                        crc32fast::hash(&body[data_offset..data_offset + data_size]);
                    if calculated != apple_header.data_crc32 {
                        self.msg(
                            "parse_vss_store_body: Apple VSS variable with invalid data checksum",
                            Some(item_index),
                        );
                    }
                }
            }

            offset += variable_size;
            if alignment > 1 {
                offset = (offset + alignment - 1) & !(alignment - 1);
            }
        }

        // Free space or padding at the end of the store body
        if offset < body.len() {
            let tail = body.slice_from(offset);
            self.add_store_padding(&tail, header_size + offset as u32, index);
        }

        Ok(())
    }

    //
    // FTW
    //

    fn parse_ftw_store_header(
        &mut self,
        store: &ByteSpan,
        local_offset: u32,
        parent: ItemId,
    ) -> Result<ItemId, ParseError> {
        if store.len() < FTW_BLOCK_HEADER32_SIZE {
            return Err(ParseError::InvalidStore);
        }
        let header32: FtwBlockHeader32 = read_le(store).ok_or(ParseError::InvalidStore)?;
        let (header_size, state, crc) = if header32.write_queue_size % 0x10 == 0x04 {
            (FTW_BLOCK_HEADER32_SIZE, header32.state, header32.crc)
        } else {
            if store.len() < FTW_BLOCK_HEADER64_SIZE {
                return Err(ParseError::InvalidStore);
            }
            let header64: FtwBlockHeader64 = read_le(store).ok_or(ParseError::InvalidStore)?;
            (FTW_BLOCK_HEADER64_SIZE, header64.state, header64.crc)
        };

        // The CRC is computed over the erased form of the header
        let mut temp_header = store[..header_size].to_vec();
        temp_header[16..20].fill(0xFF); // Crc field
        temp_header[20] = 0xFF; // State field
        let calculated = crc32fast::hash(&temp_header);
        let crc_valid = calculated == crc;

        let signature = Uuid::from_bytes_le(store[..16].try_into().unwrap());
        let info = format!(
            "Signature: {}\nFull size: {}\nHeader size: {}\nBody size: {}\nState: {:02X}h\nHeader CRC32: {:08X}h, {}",
            uuid_to_string(signature),
            size_string(store.len()),
            size_string(header_size),
            size_string(store.len() - header_size),
            state,
            crc,
            if crc_valid {
                "valid".to_string()
            } else {
                format!("invalid, should be {:08X}h", calculated)
            }
        );

        let index = self.add_item(
            local_offset,
            ItemType::FtwStore,
            0,
            "FTW store",
            "",
            info,
            store.slice(0, header_size),
            store.slice_from(header_size),
            ByteSpan::empty(),
            true,
            parent,
        );
        if !crc_valid {
            self.msg("parse_ftw_store_header: FTW store header checksum is invalid", Some(index));
        }
        Ok(index)
    }

    //
    // FDC
    //

    fn parse_fdc_store_header(
        &mut self,
        store: &ByteSpan,
        local_offset: u32,
        parent: ItemId,
    ) -> Result<ItemId, ParseError> {
        if store.len() < FDC_STORE_HEADER_SIZE {
            return Err(ParseError::InvalidStore);
        }
        let header: FdcStoreHeader = read_le(store).ok_or(ParseError::InvalidStore)?;
        if (header.size as usize) < FDC_STORE_HEADER_SIZE {
            return Err(ParseError::InvalidStore);
        }

        let info = format!(
            "Signature: _FDC\nFull size: {}\nHeader size: {}\nBody size: {}",
            size_string(store.len()),
            size_string(FDC_STORE_HEADER_SIZE),
            size_string(store.len() - FDC_STORE_HEADER_SIZE)
        );

        let index = self.add_item(
            local_offset,
            ItemType::FdcStore,
            0,
            "FDC store",
            "",
            info,
            store.slice(0, FDC_STORE_HEADER_SIZE),
            store.slice_from(FDC_STORE_HEADER_SIZE),
            ByteSpan::empty(),
            true,
            parent,
        );

        // The FDC body embeds another store area, normally one VSS store
        let _ = self.parse_store_area(index);
        Ok(index)
    }

    //
    // Fsys
    //

    fn parse_fsys_store_header(
        &mut self,
        store: &ByteSpan,
        local_offset: u32,
        parent: ItemId,
    ) -> Result<ItemId, ParseError> {
        if store.len() < FSYS_STORE_HEADER_SIZE + 4 {
            return Err(ParseError::InvalidStore);
        }
        let header: FsysStoreHeader = read_le(store).ok_or(ParseError::InvalidStore)?;
        if (header.size as usize) < FSYS_STORE_HEADER_SIZE + 4 {
            return Err(ParseError::InvalidStore);
        }

        // The last 4 bytes of the store hold a CRC32 over everything before
        let stored_crc = u32::from_le_bytes(store[store.len() - 4..].try_into().unwrap());
        let calculated = crc32fast::hash(&store[..store.len() - 4]);
        let crc_valid = stored_crc == calculated;

        let info = format!(
            "Signature: {}\nFull size: {}\nHeader size: {}\nBody size: {}\nCRC32: {:08X}h, {}",
            String::from_utf8_lossy(&header.signature.to_le_bytes()),
            size_string(store.len()),
            size_string(FSYS_STORE_HEADER_SIZE),
            size_string(store.len() - FSYS_STORE_HEADER_SIZE - 4),
            stored_crc,
            if crc_valid {
                "valid".to_string()
            } else {
                format!("invalid, should be {:08X}h", calculated)
            }
        );

        let index = self.add_item(
            local_offset,
            ItemType::FsysStore,
            0,
            "Fsys store",
            "",
            info,
            store.slice(0, FSYS_STORE_HEADER_SIZE),
            store.slice(FSYS_STORE_HEADER_SIZE, store.len() - 4),
            store.slice(store.len() - 4, store.len()),
            true,
            parent,
        );
        if !crc_valid {
            self.msg("parse_fsys_store_header: Fsys store checksum is invalid", Some(index));
        }

        self.parse_fsys_store_body(index)?;
        Ok(index)
    }

    fn parse_fsys_store_body(&mut self, index: ItemId) -> Result<(), ParseError> {
        let body = self.model.body(index).clone();
        let header_size = self.model.header(index).len() as u32;

        // Entries are name records: ASCII name, u16 size, data
        let mut offset = 0usize;
        while offset < body.len() {
            let name = ascii_string(&body[offset..]);
            let name_size = name.len() + 1;
            if name.is_empty() || offset + name_size + 2 > body.len() {
                break;
            }

            let data_size = u16::from_le_bytes(
                body[offset + name_size..offset + name_size + 2].try_into().unwrap(),
            ) as usize;
            let entry_size = name_size + 2 + data_size;

            let is_eof = name == "EOF";
            if !is_eof && offset + entry_size > body.len() {
                let rest = body.slice_from(offset);
                let info = format!("Full size: {}", size_string(rest.len()));
                let invalid_index = self.add_item(
                    header_size + offset as u32,
                    ItemType::FsysEntry,
                    fsys_entry_subtype::INVALID,
                    "Invalid",
                    "",
                    info,
                    ByteSpan::empty(),
                    rest,
                    ByteSpan::empty(),
                    false,
                    index,
                );
                self.msg(
                    "parse_fsys_store_body: invalid Fsys entry, the rest of the store is unparsed",
                    Some(invalid_index),
                );
                return Ok(());
            }

            let info = format!(
                "Full size: {}\nHeader size: {}\nBody size: {}",
                size_string(if is_eof { name_size + 2 } else { entry_size }),
                size_string(name_size + 2),
                size_string(if is_eof { 0 } else { data_size })
            );
            self.add_item(
                header_size + offset as u32,
                ItemType::FsysEntry,
                fsys_entry_subtype::NORMAL,
                name,
                "",
                info,
                body.slice(offset, offset + name_size + 2),
                if is_eof {
                    ByteSpan::empty()
                } else {
                    body.slice(offset + name_size + 2, offset + entry_size)
                },
                ByteSpan::empty(),
                false,
                index,
            );

            if is_eof {
                offset += name_size + 2;
                break;
            }
            offset += entry_size;
        }

        // The rest is padding
        if offset < body.len() {
            let tail = body.slice_from(offset);
            self.add_store_padding(&tail, header_size + offset as u32, index);
        }
        Ok(())
    }

    //
    // EVSA
    //

    fn parse_evsa_store_header(
        &mut self,
        store: &ByteSpan,
        local_offset: u32,
        parent: ItemId,
    ) -> Result<ItemId, ParseError> {
        if store.len() < EVSA_STORE_ENTRY_SIZE {
            return Err(ParseError::InvalidStore);
        }
        let entry: EvsaStoreEntry = read_le(store).ok_or(ParseError::InvalidStore)?;
        if entry.signature != NVRAM_EVSA_STORE_SIGNATURE
            || (entry.store_size as usize) < EVSA_STORE_ENTRY_SIZE
        {
            return Err(ParseError::InvalidStore);
        }

        let info = format!(
            "Signature: EVSA\nFull size: {}\nHeader size: {}\nBody size: {}\nAttributes: {:08X}h",
            size_string(store.len()),
            size_string(EVSA_STORE_ENTRY_SIZE),
            size_string(store.len() - EVSA_STORE_ENTRY_SIZE),
            entry.attributes
        );

        let index = self.add_item(
            local_offset,
            ItemType::EvsaStore,
            0,
            "EVSA store",
            "",
            info,
            store.slice(0, EVSA_STORE_ENTRY_SIZE),
            store.slice_from(EVSA_STORE_ENTRY_SIZE),
            ByteSpan::empty(),
            true,
            parent,
        );

        self.parse_evsa_store_body(index)?;
        Ok(index)
    }

    fn parse_evsa_store_body(&mut self, index: ItemId) -> Result<(), ParseError> {
        let body = self.model.body(index).clone();
        let header_size = self.model.header(index).len() as u32;

        let mut guid_map: std::collections::HashMap<u16, Uuid> = std::collections::HashMap::new();
        let mut name_map: std::collections::HashMap<u16, String> =
            std::collections::HashMap::new();

        let mut offset = 0usize;
        while offset + EVSA_ENTRY_HEADER_SIZE <= body.len() {
            let Some(entry) = read_le_at::<EvsaEntryHeader>(&body, offset) else {
                break;
            };

            // An empty area ends the entry stream
            if body.slice_from(offset).is_filled_with(0xFF) {
                break;
            }

            let entry_size = entry.size as usize;
            if entry_size < EVSA_ENTRY_HEADER_SIZE || offset + entry_size > body.len() {
                let rest = body.slice_from(offset);
                let info = format!("Full size: {}", size_string(rest.len()));
                let invalid_index = self.add_item(
                    header_size + offset as u32,
                    ItemType::EvsaEntry,
                    evsa_entry_subtype::INVALID,
                    "Invalid",
                    "",
                    info,
                    ByteSpan::empty(),
                    rest,
                    ByteSpan::empty(),
                    false,
                    index,
                );
                self.msg(
                    "parse_evsa_store_body: invalid EVSA entry, the rest of the store is unparsed",
                    Some(invalid_index),
                );
                return Ok(());
            }

            // Entry checksum covers everything after the type and checksum
            let calculated = calculate_checksum8(&body[offset + 2..offset + entry_size]);
            let checksum_valid = calculated == entry.checksum;
            let checksum_info = format!(
                "\nChecksum: {:02X}h, {}",
                entry.checksum,
                if checksum_valid {
                    "valid".to_string()
                } else {
                    format!("invalid, should be {:02X}h", calculated)
                }
            );

            match entry.entry_type {
                NVRAM_EVSA_ENTRY_TYPE_GUID1 | NVRAM_EVSA_ENTRY_TYPE_GUID2 => {
                    let Some(guid_entry) = read_le_at::<EvsaGuidEntry>(&body, offset) else {
                        break;
                    };
                    if entry_size < EVSA_GUID_ENTRY_SIZE + 16 {
                        break;
                    }
                    let guid = Uuid::from_bytes_le(
                        body[offset + EVSA_GUID_ENTRY_SIZE..offset + EVSA_GUID_ENTRY_SIZE + 16]
                            .try_into()
                            .unwrap(),
                    );
                    guid_map.insert(guid_entry.guid_id, guid);

                    let info = format!(
                        "Full size: {}\nType: {:02X}h\nGuidId: {:04X}h\nGUID: {}{}",
                        size_string(entry_size),
                        entry.entry_type,
                        guid_entry.guid_id,
                        uuid_to_string(guid),
                        checksum_info
                    );
                    self.add_item(
                        header_size + offset as u32,
                        ItemType::EvsaEntry,
                        evsa_entry_subtype::GUID,
                        "GUID entry",
                        "",
                        info,
                        body.slice(offset, offset + EVSA_GUID_ENTRY_SIZE),
                        body.slice(offset + EVSA_GUID_ENTRY_SIZE, offset + entry_size),
                        ByteSpan::empty(),
                        false,
                        index,
                    );
                }
                NVRAM_EVSA_ENTRY_TYPE_NAME1 | NVRAM_EVSA_ENTRY_TYPE_NAME2 => {
                    if entry_size < EVSA_NAME_ENTRY_SIZE {
                        break;
                    }
                    let Some(name_entry) = read_le_at::<EvsaNameEntry>(&body, offset) else {
                        break;
                    };
                    let name =
                        ucs2_string(&body[offset + EVSA_NAME_ENTRY_SIZE..offset + entry_size]);
                    name_map.insert(name_entry.var_id, name.clone());

                    let info = format!(
                        "Full size: {}\nType: {:02X}h\nVarId: {:04X}h{}",
                        size_string(entry_size),
                        entry.entry_type,
                        name_entry.var_id,
                        checksum_info
                    );
                    self.add_item(
                        header_size + offset as u32,
                        ItemType::EvsaEntry,
                        evsa_entry_subtype::NAME,
                        name,
                        "",
                        info,
                        body.slice(offset, offset + EVSA_NAME_ENTRY_SIZE),
                        body.slice(offset + EVSA_NAME_ENTRY_SIZE, offset + entry_size),
                        ByteSpan::empty(),
                        false,
                        index,
                    );
                }
                NVRAM_EVSA_ENTRY_TYPE_DATA1
                | NVRAM_EVSA_ENTRY_TYPE_DATA2
                | NVRAM_EVSA_ENTRY_TYPE_DATA_INVALID => {
                    if entry_size < EVSA_DATA_ENTRY_SIZE {
                        break;
                    }
                    let Some(data_entry) = read_le_at::<EvsaDataEntry>(&body, offset) else {
                        break;
                    };
                    let invalid = entry.entry_type == NVRAM_EVSA_ENTRY_TYPE_DATA_INVALID;

                    let name = name_map.get(&data_entry.var_id).cloned();
                    let guid = guid_map.get(&data_entry.guid_id).copied();

                    let info = format!(
                        "Full size: {}\nType: {:02X}h\nGuidId: {:04X}h\nVarId: {:04X}h\nAttributes: {:08X}h ({}){}",
                        size_string(entry_size),
                        entry.entry_type,
                        data_entry.guid_id,
                        data_entry.var_id,
                        data_entry.attributes,
                        vss_attributes_to_string(data_entry.attributes),
                        checksum_info
                    );
                    let item_index = self.add_item(
                        header_size + offset as u32,
                        ItemType::EvsaEntry,
                        if invalid { evsa_entry_subtype::INVALID } else { evsa_entry_subtype::DATA },
                        name.clone().unwrap_or_else(|| "Data entry".to_string()),
                        guid.map(uuid_to_string).unwrap_or_default(),
                        info,
                        body.slice(offset, offset + EVSA_DATA_ENTRY_SIZE),
                        body.slice(offset + EVSA_DATA_ENTRY_SIZE, offset + entry_size),
                        ByteSpan::empty(),
                        false,
                        index,
                    );

                    if !invalid && (name.is_none() || guid.is_none()) {
                        self.msg(
                            "parse_evsa_store_body: data entry with unknown VarId or GuidId",
                            Some(item_index),
                        );
                    }
                }
                NVRAM_EVSA_ENTRY_TYPE_STORE => {
                    // Nested store entry inside the body is malformed
                    self.msg(
                        "parse_evsa_store_body: misplaced EVSA store entry",
                        Some(index),
                    );
                    break;
                }
                unknown => {
                    let rest = body.slice_from(offset);
                    let info = format!("Full size: {}", size_string(rest.len()));
                    let unknown_index = self.add_item(
                        header_size + offset as u32,
                        ItemType::EvsaEntry,
                        evsa_entry_subtype::UNKNOWN,
                        "Unknown entry",
                        "",
                        info,
                        ByteSpan::empty(),
                        rest,
                        ByteSpan::empty(),
                        false,
                        index,
                    );
                    self.msg(
                        format!(
                            "parse_evsa_store_body: EVSA entry of unknown type {:02X}h, the rest of the store is unparsed",
                            unknown
                        ),
                        Some(unknown_index),
                    );
                    return Ok(());
                }
            }

            if !checksum_valid {
                self.msg("parse_evsa_store_body: EVSA entry checksum is invalid", Some(index));
            }

            offset += entry_size;
        }

        if offset < body.len() {
            let tail = body.slice_from(offset);
            self.add_store_padding(&tail, header_size + offset as u32, index);
        }
        Ok(())
    }

    //
    // FlashMap
    //

    fn parse_flash_map_store_header(
        &mut self,
        store: &ByteSpan,
        local_offset: u32,
        parent: ItemId,
    ) -> Result<ItemId, ParseError> {
        if store.len() < PHOENIX_FLASH_MAP_HEADER_SIZE {
            return Err(ParseError::InvalidStore);
        }
        let header: PhoenixFlashMapHeader = read_le(store).ok_or(ParseError::InvalidStore)?;

        let info = format!(
            "Signature: _FLASH_MAP\nFull size: {}\nHeader size: {}\nBody size: {}\nNumber of entries: {}",
            size_string(store.len()),
            size_string(PHOENIX_FLASH_MAP_HEADER_SIZE),
            size_string(store.len() - PHOENIX_FLASH_MAP_HEADER_SIZE),
            header.num_entries
        );

        let index = self.add_item(
            local_offset,
            ItemType::FlashMapStore,
            0,
            "FlashMap store",
            "",
            info,
            store.slice(0, PHOENIX_FLASH_MAP_HEADER_SIZE),
            store.slice_from(PHOENIX_FLASH_MAP_HEADER_SIZE),
            ByteSpan::empty(),
            true,
            parent,
        );

        // Entries
        for i in 0..header.num_entries as usize {
            let entry_offset = PHOENIX_FLASH_MAP_HEADER_SIZE + i * PHOENIX_FLASH_MAP_ENTRY_SIZE;
            let Some(entry) = read_le_at::<PhoenixFlashMapEntry>(store, entry_offset) else {
                break;
            };
            let guid = entry.guid.to_uuid();
            let subtype = if entry.data_type == NVRAM_PHOENIX_FLASH_MAP_ENTRY_DATA_TYPE_VOLUME {
                flash_map_entry_subtype::VOLUME
            } else {
                flash_map_entry_subtype::DATA
            };
            let info = format!(
                "Full size: {}\nData type: {:04X}h\nEntry type: {:04X}h\nPhysical address: {:X}h\nSize: {:X}h\nOffset: {:X}h",
                size_string(PHOENIX_FLASH_MAP_ENTRY_SIZE),
                entry.data_type,
                entry.entry_type,
                entry.physical_address,
                entry.size,
                entry.offset
            );
            self.add_item(
                entry_offset as u32,
                ItemType::FlashMapEntry,
                subtype,
                crate::ffs::guid_friendly_name(guid),
                "",
                info,
                ByteSpan::empty(),
                store.slice(entry_offset, entry_offset + PHOENIX_FLASH_MAP_ENTRY_SIZE),
                ByteSpan::empty(),
                false,
                index,
            );
        }

        Ok(index)
    }

    //
    // CMDB
    //

    fn parse_cmdb_store_header(
        &mut self,
        store: &ByteSpan,
        local_offset: u32,
        parent: ItemId,
    ) -> Result<ItemId, ParseError> {
        if store.len() < NVRAM_PHOENIX_CMDB_SIZE {
            return Err(ParseError::InvalidStore);
        }
        let header: PhoenixCmdbHeader = read_le(store).ok_or(ParseError::InvalidStore)?;

        let info = format!(
            "Signature: CMDB\nFull size: {}\nHeader size: {}\nBody size: {}\nTotal size: {:X}h",
            size_string(store.len()),
            size_string(PHOENIX_CMDB_HEADER_SIZE),
            size_string(store.len() - PHOENIX_CMDB_HEADER_SIZE),
            header.total_size
        );

        // The body is not parsed further
        Ok(self.add_item(
            local_offset,
            ItemType::CmdbStore,
            0,
            "CMDB store",
            "",
            info,
            store.slice(0, PHOENIX_CMDB_HEADER_SIZE),
            store.slice_from(PHOENIX_CMDB_HEADER_SIZE),
            ByteSpan::empty(),
            true,
            parent,
        ))
    }

    //
    // SLIC
    //

    fn parse_slic_pubkey_header(
        &mut self,
        store: &ByteSpan,
        local_offset: u32,
        parent: ItemId,
    ) -> Result<ItemId, ParseError> {
        if store.len() < OEM_ACTIVATION_PUBKEY_SIZE {
            return Err(ParseError::InvalidStore);
        }
        let pubkey: OemActivationPubkey = read_le(store).ok_or(ParseError::InvalidStore)?;
        if pubkey.magic != OEM_ACTIVATION_PUBKEY_MAGIC {
            return Err(ParseError::InvalidStore);
        }

        let info = format!(
            "Type: {:X}h\nFull size: {}\nKey type: {:02X}h\nVersion: {:02X}h\nAlgorithm: {:08X}h\nMagic: RSA1\nBit length: {:X}h\nExponent: {:X}h",
            pubkey.record_type,
            size_string(store.len()),
            pubkey.key_type,
            pubkey.version,
            pubkey.algorithm,
            pubkey.bit_length,
            pubkey.exponent
        );

        Ok(self.add_item(
            local_offset,
            ItemType::SlicData,
            SLIC_SUBTYPE_PUBKEY,
            "SLIC pubkey",
            "",
            info,
            ByteSpan::empty(),
            store.clone(),
            ByteSpan::empty(),
            true,
            parent,
        ))
    }

    fn parse_slic_marker_header(
        &mut self,
        store: &ByteSpan,
        local_offset: u32,
        parent: ItemId,
    ) -> Result<ItemId, ParseError> {
        if store.len() < OEM_ACTIVATION_MARKER_SIZE {
            return Err(ParseError::InvalidStore);
        }
        let marker: OemActivationMarker = read_le(store).ok_or(ParseError::InvalidStore)?;
        if marker.windows_flag != OEM_ACTIVATION_MARKER_WINDOWS_FLAG {
            return Err(ParseError::InvalidStore);
        }

        let info = format!(
            "Type: {:X}h\nFull size: {}\nVersion: {:X}h\nOEM ID: {}\nOEM table ID: {}\nWindows flag: WINDOWS \nSLIC version: {:X}h",
            marker.record_type,
            size_string(store.len()),
            marker.version,
            ascii_string(&marker.oem_id),
            ascii_string(&marker.oem_table_id),
            marker.slic_version
        );

        Ok(self.add_item(
            local_offset,
            ItemType::SlicData,
            SLIC_SUBTYPE_MARKER,
            "SLIC marker",
            "",
            info,
            ByteSpan::empty(),
            store.clone(),
            ByteSpan::empty(),
            true,
            parent,
        ))
    }

    //
    // NVAR
    //

    pub(crate) fn parse_nvar_store(&mut self, index: ItemId) -> Result<(), ParseError> {
        let body = self.model.body(index).clone();
        let header_size = self.model.header(index).len() as u32;

        // GUIDs referenced by index are stored from the end of the store
        let guid_from_store = |guid_index: u8| -> Option<Uuid> {
            let end = body.len().checked_sub((guid_index as usize + 1) * 16)?;
            Some(Uuid::from_bytes_le(body[end..end + 16].try_into().ok()?))
        };

        let mut guids_in_store = 0usize;
        let mut offset = 0usize;
        loop {
            if offset + NVAR_ENTRY_HEADER_SIZE > body.len() {
                break;
            }
            let Some(header) = read_le_at::<NvarEntryHeader>(&body, offset) else {
                break;
            };
            if header.signature != NVRAM_NVAR_ENTRY_SIGNATURE {
                break;
            }
            let entry_size = header.size as usize;
            if entry_size < NVAR_ENTRY_HEADER_SIZE || offset + entry_size > body.len() {
                let rest = body.slice_from(offset);
                let info = format!("Full size: {}", size_string(rest.len()));
                let invalid_index = self.add_item(
                    header_size + offset as u32,
                    ItemType::NvarEntry,
                    nvar_entry_subtype::INVALID,
                    "Invalid",
                    "",
                    info,
                    ByteSpan::empty(),
                    rest,
                    ByteSpan::empty(),
                    false,
                    index,
                );
                self.msg(
                    "parse_nvar_store: invalid NVAR entry size, the rest of the store is unparsed",
                    Some(invalid_index),
                );
                return Ok(());
            }

            let attributes = header.attributes();
            let is_valid = attributes & NVRAM_NVAR_ENTRY_VALID != 0;
            let is_data_only = attributes & NVRAM_NVAR_ENTRY_DATA_ONLY != 0;
            let has_guid = attributes & NVRAM_NVAR_ENTRY_GUID != 0;
            let has_ext_header = attributes & NVRAM_NVAR_ENTRY_EXT_HEADER != 0;
            let has_next = header.next() != 0x00FF_FFFF;

            let mut name = String::new();
            let mut guid = None;
            let mut entry_header_size = NVAR_ENTRY_HEADER_SIZE;
            let mut parse_failed = false;

            if is_valid && !is_data_only {
                // GUID: either stored in place or referenced from the GUID
                // store at the end
                if has_guid {
                    if offset + entry_header_size + 16 > body.len() {
                        parse_failed = true;
                    } else {
                        guid = Some(Uuid::from_bytes_le(
                            body[offset + entry_header_size..offset + entry_header_size + 16]
                                .try_into()
                                .unwrap(),
                        ));
                        entry_header_size += 16;
                    }
                } else if offset + entry_header_size < body.len() {
                    let guid_index = body[offset + entry_header_size];
                    guid = guid_from_store(guid_index);
                    if guid.is_some() {
                        guids_in_store = core::cmp::max(guids_in_store, guid_index as usize + 1);
                    }
                    entry_header_size += 1;
                } else {
                    parse_failed = true;
                }

                // Name: ASCII or UCS-2
                if !parse_failed && offset + entry_header_size < offset + entry_size {
                    let name_area = &body[offset + entry_header_size..offset + entry_size];
                    if attributes & NVRAM_NVAR_ENTRY_ASCII_NAME != 0 {
                        name = ascii_string(name_area);
                        entry_header_size += name.len() + 1;
                    } else {
                        name = ucs2_string(name_area);
                        entry_header_size += (name.chars().count() + 1) * 2;
                    }
                    if entry_header_size > entry_size {
                        parse_failed = true;
                    }
                }
            }

            // Extended header size lives in the last two bytes of the entry
            let mut extended_header_size = 0usize;
            let mut extended_info = String::new();
            if is_valid && has_ext_header && entry_size >= NVAR_ENTRY_HEADER_SIZE + 2 {
                extended_header_size = u16::from_le_bytes(
                    body[offset + entry_size - 2..offset + entry_size].try_into().unwrap(),
                ) as usize;
                if extended_header_size >= 1 && extended_header_size <= entry_size {
                    let extended_attributes = body[offset + entry_size - extended_header_size];
                    extended_info = format!(
                        "\nExtended header size: {}\nExtended attributes: {:02X}h",
                        size_string(extended_header_size),
                        extended_attributes
                    );

                    // Extended checksum covers the entry body and extended
                    // header with the store header skipped
                    if extended_attributes & NVRAM_NVAR_ENTRY_EXT_CHECKSUM != 0
                        && entry_size >= NVAR_ENTRY_HEADER_SIZE
                    {
                        let checksum_area = &body[offset + NVAR_ENTRY_HEADER_SIZE..offset + entry_size];
                        let checksum = calculate_checksum8(checksum_area);
                        extended_info += &format!(
                            "\nChecksum: {}",
                            if checksum == 0 { "valid" } else { "invalid" }
                        );
                    }
                } else {
                    extended_header_size = 0;
                    self.msg(
                        "parse_nvar_store: NVAR entry with invalid extended header size",
                        Some(index),
                    );
                }
            }

            let data_start = offset + entry_header_size;
            let data_end = offset + entry_size - extended_header_size;
            if parse_failed || data_start > data_end {
                let entry = body.slice(offset, offset + entry_size);
                let info = format!("Full size: {}", size_string(entry.len()));
                self.add_item(
                    header_size + offset as u32,
                    ItemType::NvarEntry,
                    if has_next {
                        nvar_entry_subtype::INVALID_LINK
                    } else {
                        nvar_entry_subtype::INVALID
                    },
                    "Invalid",
                    "",
                    info,
                    ByteSpan::empty(),
                    entry,
                    ByteSpan::empty(),
                    false,
                    index,
                );
                offset += entry_size;
                continue;
            }

            let subtype = if !is_valid {
                if has_next {
                    nvar_entry_subtype::INVALID_LINK
                } else {
                    nvar_entry_subtype::INVALID
                }
            } else if has_next {
                nvar_entry_subtype::LINK
            } else if is_data_only {
                nvar_entry_subtype::DATA
            } else {
                nvar_entry_subtype::FULL
            };

            let display_name = if !is_valid {
                "Invalid".to_string()
            } else if is_data_only {
                "Data entry".to_string()
            } else if name.is_empty() {
                "Unnamed".to_string()
            } else {
                name.clone()
            };

            let mut info = format!(
                "Full size: {}\nHeader size: {}\nBody size: {}\nAttributes: {:02X}h ({})",
                size_string(entry_size),
                size_string(entry_header_size),
                size_string(data_end - data_start),
                attributes,
                nvar_attributes_to_string(attributes)
            );
            if has_next {
                info += &format!("\nNext entry offset: {:X}h", header.next());
            }
            if let Some(guid) = guid {
                info += &format!("\nVariable GUID: {}", uuid_to_string(guid));
            }
            info += &extended_info;

            let item_index = self.add_item(
                header_size + offset as u32,
                ItemType::NvarEntry,
                subtype,
                display_name,
                guid.map(uuid_to_string).unwrap_or_default(),
                info,
                body.slice(offset, data_start),
                body.slice(data_start, data_end),
                body.slice(data_end, offset + entry_size),
                false,
                index,
            );
            self.model.set_parsing_data(
                item_index,
                ParsingData::NvarEntry(NvarEntryParsingData {
                    empty_byte: 0xFF,
                    is_valid,
                    extended_header_size: extended_header_size as u32,
                    next: header.next(),
                }),
            );

            offset += entry_size;
        }

        // Free space and the GUID store tail
        if offset < body.len() {
            let guid_store_size = guids_in_store * 16;
            let tail_end = body.len().saturating_sub(guid_store_size);
            let tail_end = core::cmp::max(tail_end, offset);

            if tail_end > offset {
                let tail = body.slice(offset, tail_end);
                self.add_store_padding(&tail, header_size + offset as u32, index);
            }
            if guid_store_size > 0 && tail_end + guid_store_size <= body.len() {
                let guid_store = body.slice_from(tail_end);
                let info = format!(
                    "Full size: {}\nGUIDs in store: {}",
                    size_string(guid_store.len()),
                    guids_in_store
                );
                self.add_item(
                    header_size + tail_end as u32,
                    ItemType::Padding,
                    padding_type(&guid_store),
                    "GUID store area",
                    "",
                    info,
                    ByteSpan::empty(),
                    guid_store,
                    ByteSpan::empty(),
                    true,
                    index,
                );
            }
        }

        Ok(())
    }
}
