//! Firmware volume and FFS file parsing.

use tree_model_lib::{
    volume_subtype, ByteSpan, FileParsingData, ItemId, ItemType, ParsingData, VolumeParsingData,
};
use uuid::Uuid;

use crate::basetypes::{
    align8, calculate_checksum16, calculate_checksum8, calculate_sum8, read_le, read_le_at,
    uuid_to_string,
};
use crate::error::ParseError;
use crate::ffs::*;
use crate::utility::padding_type;

use super::{size_string, FfsParser};

impl FfsParser {
    pub(crate) fn parse_volume_header(
        &mut self,
        volume: &ByteSpan,
        local_offset: u32,
        parent: ItemId,
    ) -> Result<ItemId, ParseError> {
        if volume.is_empty() {
            return Err(ParseError::InvalidParameter);
        }

        // Check that there is space for the volume header
        if volume.len() < VOLUME_HEADER_MIN_SIZE {
            self.msg(
                format!(
                    "parse_volume_header: input volume size {} is smaller than volume header size 40h (64)",
                    size_string(volume.len())
                ),
                None,
            );
            return Err(ParseError::InvalidVolume);
        }

        let header: VolumeHeader = read_le(volume).ok_or(ParseError::InvalidVolume)?;

        // Check sanity of HeaderLength value
        if align8(header.header_length as usize) > volume.len() {
            self.msg("parse_volume_header: volume header overlaps the end of data", None);
            return Err(ParseError::InvalidVolume);
        }
        // Check sanity of ExtHeaderOffset value
        if header.revision > 1
            && header.ext_header_offset != 0
            && align8(header.ext_header_offset as usize + VOLUME_EXT_HEADER_SIZE) > volume.len()
        {
            self.msg(
                "parse_volume_header: extended volume header overlaps the end of data",
                None,
            );
            return Err(ParseError::InvalidVolume);
        }

        // Calculate the volume header size
        let mut extended_header_guid = Uuid::nil();
        let mut has_extended_header = false;
        let mut header_size;
        if header.revision > 1 && header.ext_header_offset != 0 {
            has_extended_header = true;
            let extended: VolumeExtHeader =
                read_le_at(volume, header.ext_header_offset as usize)
                    .ok_or(ParseError::InvalidVolume)?;
            header_size = header.ext_header_offset as usize + extended.ext_header_size as usize;
            extended_header_guid = extended.fv_name.to_uuid();
        } else {
            header_size = header.header_length as usize;
        }

        // Extended header end can be unaligned
        header_size = align8(header_size);
        if header_size > volume.len() {
            return Err(ParseError::InvalidVolume);
        }

        // Check for the volume structure to be known
        let file_system_guid = header.file_system_guid.to_uuid();
        let mut is_unknown = true;
        let mut is_nvram_volume = false;
        let mut is_microcode_volume = false;
        let mut ffs_version = 0u8;
        if FFS_V2_VOLUMES.contains(&file_system_guid) {
            is_unknown = false;
            ffs_version = 2;
        } else if FFS_V3_VOLUMES.contains(&file_system_guid) {
            is_unknown = false;
            ffs_version = 3;
        } else if file_system_guid == NVRAM_MAIN_STORE_VOLUME_GUID
            || file_system_guid == NVRAM_ADDITIONAL_STORE_VOLUME_GUID
        {
            is_unknown = false;
            is_nvram_volume = true;
        } else if file_system_guid == EFI_APPLE_MICROCODE_VOLUME_GUID {
            if volume.len() < EFI_APPLE_MICROCODE_VOLUME_HEADER_SIZE {
                return Err(ParseError::InvalidVolume);
            }
            is_unknown = false;
            is_microcode_volume = true;
            header_size = EFI_APPLE_MICROCODE_VOLUME_HEADER_SIZE;
        }

        // Check volume revision and alignment
        let mut msg_alignment_bits_set = false;
        let mut msg_unaligned = false;
        let mut msg_unknown_revision = false;
        let mut alignment = 0x10000u32; // default volume alignment is 64K
        if header.revision == 1 {
            // Acquire the alignment capability bit
            let alignment_cap = header.attributes & EFI_FVB_ALIGNMENT_CAP != 0;
            if !alignment_cap && header.attributes & 0xFFFF0000 != 0 {
                msg_alignment_bits_set = true;
            }
            // Do not check alignment on revision 1 volumes, it is set
            // incorrectly too often to be useful
        } else if header.revision == 2 {
            alignment = 1u32 << ((header.attributes & EFI_FVB2_ALIGNMENT) >> 16);
            // Alignment checks don't make sense for compressed volumes: they
            // have to be extracted into memory first anyway
            let volume_base = self.model.base(parent).wrapping_add(local_offset);
            if !is_unknown
                && !self.model.compressed(parent)
                && (volume_base.wrapping_sub(self.image_base)) % alignment != 0
            {
                msg_unaligned = true;
            }
        } else {
            msg_unknown_revision = true;
        }

        // Determine the value of the empty byte
        let empty_byte: u8 =
            if header.attributes & EFI_FVB_ERASE_POLARITY != 0 { 0xFF } else { 0x00 };

        // Check for AppleCRC32 and UsedSpace in ZeroVector
        let mut has_apple_crc32 = false;
        let apple_crc32 = u32::from_le_bytes(volume[8..12].try_into().unwrap());
        let used_space = u32::from_le_bytes(volume[12..16].try_into().unwrap());
        if apple_crc32 != 0 {
            // Calculate CRC32 of the volume body
            let crc = crc32fast::hash(&volume[header.header_length as usize..]);
            if crc == apple_crc32 {
                has_apple_crc32 = true;
            }
        }

        // Check the header checksum by recalculating it
        let calculated = if header.header_length as usize >= VOLUME_HEADER_SIZE {
            let mut temp_header = volume[..header.header_length as usize].to_vec();
            temp_header[50] = 0;
            temp_header[51] = 0; // Checksum field
            calculate_checksum16(&temp_header)
        } else {
            0
        };
        let msg_invalid_checksum = header.checksum != calculated;

        let mut name = guid_friendly_name(file_system_guid);
        let mut info = format!(
            "ZeroVector:\n{:02X} {:02X} {:02X} {:02X} {:02X} {:02X} {:02X} {:02X}\n\
             {:02X} {:02X} {:02X} {:02X} {:02X} {:02X} {:02X} {:02X}\nSignature: _FVH\nFileSystem GUID: {}\n\
             Full size: {}\nHeader size: {}\nBody size: {}\nRevision: {}\nAttributes: {:08X}h\nErase polarity: {}\nChecksum: {:04X}h, {}",
            header.zero_vector[0],
            header.zero_vector[1],
            header.zero_vector[2],
            header.zero_vector[3],
            header.zero_vector[4],
            header.zero_vector[5],
            header.zero_vector[6],
            header.zero_vector[7],
            header.zero_vector[8],
            header.zero_vector[9],
            header.zero_vector[10],
            header.zero_vector[11],
            header.zero_vector[12],
            header.zero_vector[13],
            header.zero_vector[14],
            header.zero_vector[15],
            uuid_to_string(file_system_guid),
            size_string(volume.len()),
            size_string(header_size),
            size_string(volume.len() - header_size),
            header.revision,
            header.attributes,
            if empty_byte != 0 { 1 } else { 0 },
            header.checksum,
            if msg_invalid_checksum {
                format!("invalid, should be {:04X}h", calculated)
            } else {
                "valid".to_string()
            }
        );

        // Extended header present
        if header.revision > 1 && header.ext_header_offset != 0 {
            let extended: VolumeExtHeader =
                read_le_at(volume, header.ext_header_offset as usize)
                    .ok_or(ParseError::InvalidVolume)?;
            info += &format!(
                "\nExtended header size: {}\nVolume GUID: {}",
                size_string(extended.ext_header_size as usize),
                uuid_to_string(extended_header_guid)
            );
            // Replace the FFS GUID name with the volume GUID name
            name = guid_friendly_name(extended_header_guid);
        }

        let text = if has_apple_crc32 { "AppleCRC32 " } else { "" };

        let subtype = if is_unknown {
            volume_subtype::UNKNOWN
        } else if ffs_version == 2 {
            volume_subtype::FFS2
        } else if ffs_version == 3 {
            volume_subtype::FFS3
        } else if is_nvram_volume {
            volume_subtype::NVRAM
        } else {
            volume_subtype::MICROCODE
        };

        let index = self.add_item(
            local_offset,
            ItemType::Volume,
            subtype,
            name,
            text,
            info,
            volume.slice(0, header_size),
            volume.slice_from(header_size),
            ByteSpan::empty(),
            false,
            parent,
        );

        self.model.set_parsing_data(
            index,
            ParsingData::Volume(VolumeParsingData {
                empty_byte,
                ffs_version,
                has_extended_header,
                extended_header_guid,
                alignment,
                revision: header.revision,
                has_apple_crc32,
                has_valid_used_space: false, // will be updated later, if needed
                used_space,
                is_weak_aligned: header.revision > 1
                    && header.attributes & EFI_FVB2_WEAK_ALIGNMENT != 0,
            }),
        );

        if is_unknown {
            self.msg(
                format!(
                    "parse_volume_header: unknown file system {}",
                    uuid_to_string(file_system_guid)
                ),
                Some(index),
            );
        }
        if msg_invalid_checksum {
            self.msg("parse_volume_header: volume header checksum is invalid", Some(index));
        }
        if msg_alignment_bits_set {
            self.msg(
                "parse_volume_header: alignment bits set on volume without alignment capability",
                Some(index),
            );
        }
        if msg_unaligned {
            self.msg("parse_volume_header: unaligned volume", Some(index));
        }
        if msg_unknown_revision {
            self.msg(
                format!("parse_volume_header: unknown volume revision {}", header.revision),
                Some(index),
            );
        }

        Ok(index)
    }

    fn parse_volume_non_uefi_data(&mut self, data: &ByteSpan, local_offset: u32, index: ItemId) {
        let info = format!("Full size: {}", size_string(data.len()));
        let padding_index = self.add_item(
            local_offset,
            ItemType::Padding,
            tree_model_lib::padding_subtype::DATA,
            "Non-UEFI data",
            "",
            info,
            ByteSpan::empty(),
            data.clone(),
            ByteSpan::empty(),
            true,
            index,
        );
        self.msg(
            "parse_volume_non_uefi_data: non-UEFI data found in volume's free space",
            Some(padding_index),
        );
        // Parse contents as a raw area
        let _ = self.parse_raw_area(padding_index);
    }

    pub(crate) fn parse_volume_body(&mut self, index: ItemId) -> Result<(), ParseError> {
        let volume_body = self.model.body(index).clone();
        let volume_header_size = self.model.header(index).len() as u32;

        // NVRAM and Microcode volumes have dedicated body parsers
        if self.model.subtype(index) == volume_subtype::NVRAM {
            return self.parse_nvram_volume_body(index);
        }
        if self.model.subtype(index) == volume_subtype::MICROCODE {
            return self.parse_microcode_volume_body(index);
        }

        let (empty_byte, ffs_version, used_space) = match self.model.parsing_data(index) {
            ParsingData::Volume(pdata) => (pdata.empty_byte, pdata.ffs_version, pdata.used_space),
            _ => (0xFF, 2, 0),
        };

        if ffs_version != 2 && ffs_version != 3 {
            self.msg(
                format!("parse_volume_body: unknown FFS version {}", ffs_version),
                Some(index),
            );
            return Ok(());
        }

        // Search for and parse all files
        let volume_body_size = volume_body.len() as u32;
        let mut file_offset = 0u32;
        while file_offset < volume_body_size {
            let file_size = self.get_file_size(&volume_body, file_offset, ffs_version);
            if file_size == 0 {
                self.msg(
                    "parse_volume_body: file header parsing failed with invalid size",
                    Some(index),
                );
                break;
            }

            // Check that we are at the empty space
            let header_end =
                core::cmp::min(file_offset as usize + FFS_FILE_HEADER_SIZE, volume_body.len());
            let header_candidate = volume_body.slice(file_offset as usize, header_end);
            if header_candidate.count_byte(empty_byte) == header_candidate.len() {
                // Check the volume usedSpace entry to be valid
                if used_space > 0 && used_space == file_offset + volume_header_size {
                    if let ParsingData::Volume(pdata) = self.model.parsing_data(index) {
                        let mut pdata = pdata.clone();
                        pdata.has_valid_used_space = true;
                        self.model.set_parsing_data(index, ParsingData::Volume(pdata));
                        let text = format!("{}UsedSpace ", self.model.text(index));
                        self.model.set_text(index, text);
                    }
                }

                // Check the free space to be actually free
                let free_space = volume_body.slice_from(file_offset as usize);
                if free_space.count_byte(empty_byte) != free_space.len() {
                    // Search for the first non-empty byte
                    let mut first_non_empty = free_space
                        .iter()
                        .position(|&b| b != empty_byte)
                        .unwrap_or(free_space.len());

                    // Align the non-empty offset down to the file alignment;
                    // possible because at least 16 empty bytes precede it
                    if first_non_empty != align8(first_non_empty) {
                        first_non_empty = align8(first_non_empty) - 8;
                    }

                    // Add all bytes before as free space
                    if first_non_empty > 0 {
                        let free = free_space.slice(0, first_non_empty);
                        let info = format!("Full size: {}", size_string(free.len()));
                        self.add_item(
                            volume_header_size + file_offset,
                            ItemType::FreeSpace,
                            0,
                            "Volume free space",
                            "",
                            info,
                            ByteSpan::empty(),
                            free,
                            ByteSpan::empty(),
                            false,
                            index,
                        );
                    }

                    // Parse non-UEFI data
                    let rest = free_space.slice_from(first_non_empty);
                    self.parse_volume_non_uefi_data(
                        &rest,
                        volume_header_size + file_offset + first_non_empty as u32,
                        index,
                    );
                } else {
                    let info = format!("Full size: {}", size_string(free_space.len()));
                    self.add_item(
                        volume_header_size + file_offset,
                        ItemType::FreeSpace,
                        0,
                        "Volume free space",
                        "",
                        info,
                        ByteSpan::empty(),
                        free_space,
                        ByteSpan::empty(),
                        false,
                        index,
                    );
                }
                break;
            }

            // Check that the remaining space can still contain a file
            if volume_body_size - file_offset < FFS_FILE_HEADER_SIZE as u32
                || volume_body_size - file_offset < file_size
            {
                let rest = volume_body.slice_from(file_offset as usize);
                self.parse_volume_non_uefi_data(&rest, volume_header_size + file_offset, index);
                break;
            }

            // Parse the current file's header
            let file =
                volume_body.slice(file_offset as usize, (file_offset + file_size) as usize);
            if let Err(error) =
                self.parse_file_header(&file, volume_header_size + file_offset, index)
            {
                self.msg(
                    format!(
                        "parse_volume_body: file header parsing failed with error \"{}\"",
                        error
                    ),
                    Some(index),
                );
            }

            // Move to the next file
            file_offset += file_size;
            file_offset = align8(file_offset as usize) as u32;
        }

        // Check for duplicate GUIDs
        let children = self.model.children(index).to_vec();
        for (i, &current) in children.iter().enumerate() {
            // Skip non-file items and padding files
            if self.model.item_type(current) != ItemType::File
                || self.model.subtype(current) == EFI_FV_FILETYPE_PAD
            {
                continue;
            }
            let current_guid = match self.model.parsing_data(current) {
                ParsingData::File(pdata) => pdata.guid,
                _ => continue,
            };
            for &another in children.iter().skip(i + 1) {
                if self.model.item_type(another) != ItemType::File {
                    continue;
                }
                let another_guid = match self.model.parsing_data(another) {
                    ParsingData::File(pdata) => pdata.guid,
                    _ => continue,
                };
                if current_guid == another_guid {
                    self.msg(
                        format!(
                            "parse_volume_body: file with duplicate GUID {}",
                            uuid_to_string(another_guid)
                        ),
                        Some(another),
                    );
                }
            }
        }

        // Parse bodies
        for current in children {
            match self.model.item_type(current) {
                ItemType::File => {
                    let _ = self.parse_file_body(current);
                }
                ItemType::Padding | ItemType::FreeSpace => {
                    // No parsing required
                }
                _ => return Err(ParseError::UnknownItemType),
            }
        }

        Ok(())
    }

    pub(crate) fn get_file_size(
        &self,
        volume_body: &ByteSpan,
        file_offset: u32,
        ffs_version: u8,
    ) -> u32 {
        let Some(header) = read_le_at::<FfsFileHeader>(volume_body, file_offset as usize) else {
            return 0;
        };

        if ffs_version == 2 {
            header.size.value()
        } else if ffs_version == 3 {
            if header.attributes & FFS_ATTRIB_LARGE_FILE != 0 {
                let Some(header2) =
                    read_le_at::<FfsFileHeader2>(volume_body, file_offset as usize)
                else {
                    return 0;
                };
                header2.extended_size as u32
            } else {
                header.size.value()
            }
        } else {
            0
        }
    }

    pub(crate) fn parse_file_header(
        &mut self,
        file: &ByteSpan,
        local_offset: u32,
        parent: ItemId,
    ) -> Result<ItemId, ParseError> {
        if file.is_empty() {
            return Err(ParseError::InvalidParameter);
        }
        if file.len() < FFS_FILE_HEADER_SIZE {
            return Err(ParseError::InvalidFile);
        }

        // Obtain required information from the parent volume
        let mut ffs_version = 2;
        let mut is_weak_aligned = false;
        let mut volume_alignment = 0xFFFF_FFFFu32;
        let mut volume_revision = 2;
        let parent_volume = if self.model.item_type(parent) == ItemType::Volume {
            Some(parent)
        } else {
            self.model.find_parent_of_type(parent, ItemType::Volume)
        };
        if let Some(volume) = parent_volume {
            if let ParsingData::Volume(pdata) = self.model.parsing_data(volume) {
                ffs_version = pdata.ffs_version;
                volume_alignment = pdata.alignment;
                volume_revision = pdata.revision;
                is_weak_aligned = pdata.is_weak_aligned;
            }
        }

        let header: FfsFileHeader = read_le(file).ok_or(ParseError::InvalidFile)?;
        let mut header_size = FFS_FILE_HEADER_SIZE;
        if ffs_version == 3 && header.attributes & FFS_ATTRIB_LARGE_FILE != 0 {
            if file.len() < FFS_FILE_HEADER2_SIZE {
                return Err(ParseError::InvalidFile);
            }
            header_size = FFS_FILE_HEADER2_SIZE;
        }
        let header_span = file.slice(0, header_size);

        // Check file alignment
        let mut alignment_power =
            FFS_ALIGNMENT_TABLE[((header.attributes & FFS_ATTRIB_DATA_ALIGNMENT) >> 3) as usize];
        if volume_revision > 1 && header.attributes & FFS_ATTRIB_DATA_ALIGNMENT2 != 0 {
            alignment_power = FFS_ALIGNMENT2_TABLE
                [((header.attributes & FFS_ATTRIB_DATA_ALIGNMENT) >> 3) as usize];
        }
        let alignment = 1u32 << alignment_power;
        let msg_unaligned_file = (local_offset + header_size as u32) % alignment != 0;

        // Check file alignment against the volume alignment
        let msg_file_alignment_too_big = !is_weak_aligned && volume_alignment < alignment;

        // Get the file body
        let mut body = file.slice_from(header_size);

        // Check for the file tail presence
        let mut tail = ByteSpan::empty();
        let mut msg_invalid_tail_value = false;
        if volume_revision == 1 && header.attributes & FFS_ATTRIB_TAIL_PRESENT != 0 {
            if body.len() < 2 {
                return Err(ParseError::InvalidFile);
            }
            let tail_value =
                u16::from_le_bytes([body[body.len() - 2], body[body.len() - 1]]);
            let tail_reference =
                u16::from_le_bytes([header.integrity_check_header, header.integrity_check_file]);
            if tail_reference != !tail_value {
                msg_invalid_tail_value = true;
            }

            // Remove the tail from the file body
            tail = body.slice(body.len() - 2, body.len());
            body = body.slice(0, body.len() - 2);
        }

        // Check the header checksum
        let calculated_header = 0u8.wrapping_sub(
            calculate_sum8(&header_span)
                .wrapping_sub(header.integrity_check_header)
                .wrapping_sub(header.integrity_check_file)
                .wrapping_sub(header.state),
        );
        let msg_invalid_header_checksum = header.integrity_check_header != calculated_header;

        // Check the data checksum, either calculated or fixed
        let calculated_data = if header.attributes & FFS_ATTRIB_CHECKSUM != 0 {
            calculate_checksum8(&body)
        } else if volume_revision == 1 {
            FFS_FIXED_CHECKSUM
        } else {
            FFS_FIXED_CHECKSUM2
        };
        let msg_invalid_data_checksum = header.integrity_check_file != calculated_data;

        // Check the file type
        let msg_unknown_type = header.file_type > EFI_FV_FILETYPE_MM_CORE_STANDALONE
            && header.file_type != EFI_FV_FILETYPE_PAD;

        let file_guid = header.name.to_uuid();
        let name = if header.file_type != EFI_FV_FILETYPE_PAD {
            guid_friendly_name(file_guid)
        } else {
            "Padding file".to_string()
        };

        let info = format!(
            "File GUID: {}\nType: {:02X}h\nAttributes: {:02X}h\nFull size: {}\nHeader size: {}\nBody size: {}\nTail size: {}\nState: {:02X}h\n\
             Header checksum: {:02X}h, {}\nData checksum: {:02X}h, {}",
            uuid_to_string(file_guid),
            header.file_type,
            header.attributes,
            size_string(header_span.len() + body.len() + tail.len()),
            size_string(header_span.len()),
            size_string(body.len()),
            size_string(tail.len()),
            header.state,
            header.integrity_check_header,
            if msg_invalid_header_checksum {
                format!("invalid, should be {:02X}h", calculated_header)
            } else {
                "valid".to_string()
            },
            header.integrity_check_file,
            if msg_invalid_data_checksum {
                format!("invalid, should be {:02X}h", calculated_data)
            } else {
                "valid".to_string()
            }
        );

        let mut text = String::new();
        let mut is_vtf = false;
        let mut is_dxe_core = false;
        // Check if the file is a Volume Top File
        if file_guid == EFI_FFS_VOLUME_TOP_FILE_GUID {
            // The last byte of the last VTF is mapped to physical address
            // 0xFFFFFFFF, which later fixes memory addresses of all
            // uncompressed image elements
            is_vtf = true;
            text = "Volume Top File".to_string();
        }
        // Check if the file is the first DXE core
        else if file_guid == EFI_DXE_CORE_GUID || file_guid == AMI_CORE_DXE_GUID {
            // This information may be used to determine the DXE volume offset
            // for old AMI or post-IBB protected ranges
            is_dxe_core = true;
        }

        let fixed = header.attributes & FFS_ATTRIB_FIXED != 0;

        let index = self.add_item(
            local_offset,
            ItemType::File,
            header.file_type,
            name,
            text,
            info,
            header_span,
            body,
            tail,
            fixed,
            parent,
        );

        self.model.set_parsing_data(
            index,
            ParsingData::File(FileParsingData {
                empty_byte: if header.state & EFI_FILE_ERASE_POLARITY != 0 { 0xFF } else { 0x00 },
                guid: file_guid,
            }),
        );

        // Override the last VTF index, if needed
        if is_vtf {
            self.last_vtf = Some(index);
        }
        // Remember the first DXE core only
        if is_dxe_core && self.dxe_core.is_none() {
            self.dxe_core = Some(index);
        }

        if msg_unaligned_file {
            self.msg("parse_file_header: unaligned file", Some(index));
        }
        if msg_file_alignment_too_big {
            self.msg(
                format!(
                    "parse_file_header: file alignment {:X}h is greater than parent volume alignment {:X}h",
                    alignment, volume_alignment
                ),
                Some(index),
            );
        }
        if msg_invalid_header_checksum {
            self.msg(
                format!(
                    "parse_file_header: invalid header checksum {:02X}h, should be {:02X}h",
                    header.integrity_check_header, calculated_header
                ),
                Some(index),
            );
        }
        if msg_invalid_data_checksum {
            self.msg(
                format!(
                    "parse_file_header: invalid data checksum {:02X}h, should be {:02X}h",
                    header.integrity_check_file, calculated_data
                ),
                Some(index),
            );
        }
        if msg_invalid_tail_value {
            self.msg("parse_file_header: invalid tail value", Some(index));
        }
        if msg_unknown_type {
            self.msg(
                format!("parse_file_header: unknown file type {:02X}h", header.file_type),
                Some(index),
            );
        }

        Ok(index)
    }

    pub(crate) fn parse_file_body(&mut self, index: ItemId) -> Result<(), ParseError> {
        // Do not parse non-file bodies
        if self.model.item_type(index) != ItemType::File {
            return Ok(());
        }

        // Parse padding file body
        if self.model.subtype(index) == EFI_FV_FILETYPE_PAD {
            return self.parse_pad_file_body(index);
        }

        // Parse raw files as raw areas
        if self.model.subtype(index) == EFI_FV_FILETYPE_RAW
            || self.model.subtype(index) == EFI_FV_FILETYPE_ALL
        {
            let file_guid = match self.model.parsing_data(index) {
                ParsingData::File(pdata) => pdata.guid,
                _ => Uuid::nil(),
            };

            // Parse NVAR store
            if file_guid == crate::nvram::NVRAM_NVAR_STORE_FILE_GUID {
                self.model.set_text(index, "NVAR store");
                return self.parse_nvar_store(index);
            } else if file_guid == crate::nvram::NVRAM_NVAR_PEI_EXTERNAL_DEFAULTS_FILE_GUID {
                self.model.set_text(index, "NVRAM external defaults");
                return self.parse_nvar_store(index);
            } else if file_guid == crate::nvram::NVRAM_NVAR_BB_DEFAULTS_FILE_GUID {
                self.model.set_text(index, "NVAR BB defaults");
                return self.parse_nvar_store(index);
            }
            // Parse vendor hash file
            else if file_guid == PROTECTED_RANGE_VENDOR_HASH_FILE_GUID_PHOENIX {
                return self.parse_vendor_hash_file(file_guid, index);
            }
            // Parse AMI ROM hole
            else if AMI_ROM_HOLE_FILE_GUIDS.contains(&file_guid) {
                self.model.set_text(index, "AMI ROM hole");
                // Mark ROM hole files as fixed in the image
                self.model.set_fixed(index, true);
                // No need to parse further
                return Ok(());
            }

            return self.parse_raw_area(index);
        }

        // Parse sections
        let body = self.model.body(index).clone();
        self.parse_sections(&body, index, true)
    }

    fn parse_pad_file_body(&mut self, index: ItemId) -> Result<(), ParseError> {
        let body = self.model.body(index).clone();

        // Obtain the empty byte value from the file itself
        let empty_byte = match self.model.parsing_data(index) {
            ParsingData::File(pdata) => pdata.empty_byte,
            _ => 0xFF,
        };

        // Check if the whole padding file is empty
        if body.count_byte(empty_byte) == body.len() {
            return Ok(());
        }

        // Search for the first non-empty byte
        let mut non_empty_offset =
            body.iter().position(|&b| b != empty_byte).unwrap_or(body.len());

        let header_size = self.model.header(index).len() as u32;
        if non_empty_offset >= 8 {
            // Align the free space to an 8-byte boundary
            if non_empty_offset != align8(non_empty_offset) {
                non_empty_offset = align8(non_empty_offset) - 8;
            }

            let free = body.slice(0, non_empty_offset);
            let info = format!("Full size: {}", size_string(free.len()));
            self.add_item(
                header_size,
                ItemType::FreeSpace,
                0,
                "Free space",
                "",
                info,
                ByteSpan::empty(),
                free,
                ByteSpan::empty(),
                false,
                index,
            );
        } else {
            non_empty_offset = 0;
        }

        // The rest is either startup AP data or non-UEFI data
        let padding = body.slice_from(non_empty_offset);

        if padding.len() >= RECOVERY_STARTUP_AP_DATA_X86_SIZE
            && padding[..RECOVERY_STARTUP_AP_DATA_X86_SIZE] == RECOVERY_STARTUP_AP_DATA_X86_128K
        {
            let info = format!("Full size: {}", size_string(padding.len()));
            self.add_item(
                header_size + non_empty_offset as u32,
                ItemType::StartupApDataEntry,
                tree_model_lib::startup_ap_data_subtype::X86_128K,
                "Startup AP data",
                "",
                info,
                ByteSpan::empty(),
                padding,
                ByteSpan::empty(),
                true,
                index,
            );

            // Rename the file
            self.model.set_name(index, "Startup AP data padding file");
        } else {
            let info = format!("Full size: {}", size_string(padding.len()));
            let data_index = self.add_item(
                header_size + non_empty_offset as u32,
                ItemType::Padding,
                tree_model_lib::padding_subtype::DATA,
                "Non-UEFI data",
                "",
                info,
                ByteSpan::empty(),
                padding,
                ByteSpan::empty(),
                true,
                index,
            );
            self.msg(
                "parse_pad_file_body: non-UEFI data found in padding file",
                Some(data_index),
            );

            // Rename the file
            self.model.set_name(index, "Non-empty padding file");
        }

        Ok(())
    }
}
