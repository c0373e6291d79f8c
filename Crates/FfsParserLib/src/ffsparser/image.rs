//! First-pass parsing of the outermost layers: capsules, the Intel flash
//! descriptor with its regions, raw areas and Intel microcode.

use tree_model_lib::{
    image_subtype, padding_subtype, region_subtype, ByteSpan, ItemId, ItemType,
};
use uuid::Uuid;

use crate::basetypes::{read_le, read_le_at, uuid_to_string};
use crate::descriptor::*;
use crate::error::ParseError;
use crate::ffs;
use crate::ffs::{CapsuleHeader, ToshibaCapsuleHeader};
use crate::gbe::{GbeMacAddress, GbeVersion, GBE_VERSION_OFFSET, GBE_VERSION_SIZE};
use crate::intel_microcode::*;
use crate::me::{
    BpdtEntry, BpdtHeader, MeVersion, BPDT_ENTRY_SIZE, BPDT_GREEN_SIGNATURE, BPDT_HEADER_SIZE,
    BPDT_HEADER_VERSION_1, BPDT_YELLOW_SIGNATURE, ME_VERSION_SIGNATURE_MAN,
    ME_VERSION_SIGNATURE_MN2, ME_VERSION_SIZE,
};
use crate::utility::padding_type;

use super::{size_string, FfsParser};

// What the raw-area scanner can find next.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum RawAreaItem {
    Volume,
    Microcode,
    BpdtStore,
}

struct RegionInfo {
    offset: u32,
    length: u32,
    subtype: u8, // region subtype, or a padding subtype for gaps
}

impl FfsParser {
    pub(crate) fn parse_generic_image(
        &mut self,
        buffer: &ByteSpan,
        local_offset: u32,
        parent: ItemId,
    ) -> Result<ItemId, ParseError> {
        let info = format!("Full size: {}", size_string(buffer.len()));
        let index = self.add_item(
            local_offset,
            ItemType::Image,
            image_subtype::UEFI,
            "UEFI image",
            "",
            info,
            ByteSpan::empty(),
            buffer.clone(),
            ByteSpan::empty(),
            true,
            parent,
        );

        self.image_base = self.model.base(parent).wrapping_add(local_offset);
        self.protected_regions_base = self.image_base as u64;
        self.parse_raw_area(index)?;
        Ok(index)
    }

    pub(crate) fn parse_capsule(
        &mut self,
        capsule: &ByteSpan,
        local_offset: u32,
        parent: ItemId,
    ) -> Result<ItemId, ParseError> {
        if capsule.len() < ffs::CAPSULE_HEADER_SIZE {
            return Err(ParseError::ItemNotFound);
        }

        let leading_guid = Uuid::from_bytes_le(capsule[..16].try_into().unwrap());
        let mut capsule_header_size = 0usize;
        let index;

        if leading_guid == ffs::EFI_CAPSULE_GUID
            || leading_guid == ffs::EFI_FMP_CAPSULE_GUID
            || leading_guid == ffs::INTEL_CAPSULE_GUID
            || leading_guid == ffs::LENOVO_CAPSULE_GUID
            || leading_guid == ffs::LENOVO2_CAPSULE_GUID
        {
            let header: CapsuleHeader =
                read_le(capsule).ok_or(ParseError::InvalidCapsule)?;

            // Check sanity of HeaderSize and CapsuleImageSize values
            if header.header_size == 0
                || header.header_size as usize > capsule.len()
                || header.header_size > header.capsule_image_size
            {
                self.msg(
                    format!(
                        "parse_capsule: UEFI capsule header size of {} bytes is invalid",
                        size_string(header.header_size as usize)
                    ),
                    None,
                );
                return Err(ParseError::InvalidCapsule);
            }
            if header.capsule_image_size as usize > capsule.len() {
                self.msg(
                    format!(
                        "parse_capsule: UEFI capsule image size of {} bytes is invalid",
                        size_string(header.capsule_image_size as usize)
                    ),
                    None,
                );
                return Err(ParseError::InvalidCapsule);
            }

            capsule_header_size = header.header_size as usize;
            let info = format!(
                "Capsule GUID: {}\nFull size: {}\nHeader size: {}\nImage size: {}\nFlags: {:08X}h",
                uuid_to_string(leading_guid),
                size_string(capsule.len()),
                size_string(capsule_header_size),
                size_string((header.capsule_image_size - header.header_size) as usize),
                header.flags
            );

            index = self.add_item(
                local_offset,
                ItemType::Capsule,
                tree_model_lib::capsule_subtype::UEFI20,
                "UEFI capsule",
                "",
                info,
                capsule.slice(0, capsule_header_size),
                capsule.slice_from(capsule_header_size),
                ByteSpan::empty(),
                true,
                parent,
            );
        } else if leading_guid == ffs::TOSHIBA_CAPSULE_GUID {
            let header: ToshibaCapsuleHeader =
                read_le(capsule).ok_or(ParseError::InvalidCapsule)?;

            if header.header_size == 0
                || header.header_size as usize > capsule.len()
                || header.header_size > header.full_size
            {
                self.msg(
                    format!(
                        "parse_capsule: Toshiba capsule header size of {} bytes is invalid",
                        size_string(header.header_size as usize)
                    ),
                    None,
                );
                return Err(ParseError::InvalidCapsule);
            }
            if header.full_size as usize > capsule.len() {
                self.msg(
                    format!(
                        "parse_capsule: Toshiba capsule full size of {} bytes is invalid",
                        size_string(header.full_size as usize)
                    ),
                    None,
                );
                return Err(ParseError::InvalidCapsule);
            }

            capsule_header_size = header.header_size as usize;
            let info = format!(
                "Capsule GUID: {}\nFull size: {}\nHeader size: {}\nImage size: {}\nFlags: {:08X}h",
                uuid_to_string(leading_guid),
                size_string(capsule.len()),
                size_string(capsule_header_size),
                size_string((header.full_size - header.header_size) as usize),
                header.flags
            );

            index = self.add_item(
                local_offset,
                ItemType::Capsule,
                tree_model_lib::capsule_subtype::TOSHIBA,
                "Toshiba capsule",
                "",
                info,
                capsule.slice(0, capsule_header_size),
                capsule.slice_from(capsule_header_size),
                ByteSpan::empty(),
                true,
                parent,
            );
        } else if leading_guid == ffs::APTIO_SIGNED_CAPSULE_GUID
            || leading_guid == ffs::APTIO_UNSIGNED_CAPSULE_GUID
        {
            let signed_capsule = leading_guid == ffs::APTIO_SIGNED_CAPSULE_GUID;

            if capsule.len() <= ffs::APTIO_CAPSULE_HEADER_SIZE {
                self.msg(
                    "parse_capsule: AMI capsule image file is smaller than minimum size of 20h (32) bytes",
                    None,
                );
                return Err(ParseError::InvalidCapsule);
            }

            let header: ffs::AptioCapsuleHeader =
                read_le(capsule).ok_or(ParseError::InvalidCapsule)?;

            if header.rom_image_offset == 0
                || header.rom_image_offset as usize > capsule.len()
                || header.rom_image_offset as u32 > header.capsule_header.capsule_image_size
            {
                self.msg(
                    format!(
                        "parse_capsule: AMI capsule image offset of {} bytes is invalid",
                        size_string(header.rom_image_offset as usize)
                    ),
                    None,
                );
                return Err(ParseError::InvalidCapsule);
            }
            if header.capsule_header.capsule_image_size as usize > capsule.len() {
                self.msg(
                    format!(
                        "parse_capsule: AMI capsule image size of {} bytes is invalid",
                        size_string(header.capsule_header.capsule_image_size as usize)
                    ),
                    None,
                );
                return Err(ParseError::InvalidCapsule);
            }

            capsule_header_size = header.rom_image_offset as usize;
            let info = format!(
                "Capsule GUID: {}\nFull size: {}\nHeader size: {}\nImage size: {}\nFlags: {:08X}h",
                uuid_to_string(leading_guid),
                size_string(capsule.len()),
                size_string(capsule_header_size),
                size_string(
                    header.capsule_header.capsule_image_size as usize - capsule_header_size
                ),
                header.capsule_header.flags
            );

            index = self.add_item(
                local_offset,
                ItemType::Capsule,
                if signed_capsule {
                    tree_model_lib::capsule_subtype::APTIO_SIGNED
                } else {
                    tree_model_lib::capsule_subtype::APTIO_UNSIGNED
                },
                "AMI Aptio capsule",
                "",
                info,
                capsule.slice(0, capsule_header_size),
                capsule.slice_from(capsule_header_size),
                ByteSpan::empty(),
                true,
                parent,
            );

            if signed_capsule {
                self.msg(
                    "parse_capsule: Aptio capsule signature may become invalid after image modifications",
                    Some(index),
                );
            }
        } else {
            return Err(ParseError::ItemNotFound);
        }

        // Capsule present, parse the image inside it
        let image = capsule.slice_from(capsule_header_size);
        match self.parse_intel_image(&image, capsule_header_size as u32, index) {
            Err(ParseError::ItemNotFound) => {}
            Err(other) => return Err(other),
            Ok(_) => return Ok(index),
        }
        self.parse_generic_image(&image, capsule_header_size as u32, index)?;
        Ok(index)
    }

    fn region_base_limit(intel_image: &ByteSpan, region_section: usize, index: u8) -> (u16, u16) {
        let offset = region_section + 4 * index as usize;
        let base = read_le_at::<u16>(intel_image, offset).unwrap_or(0);
        let limit = read_le_at::<u16>(intel_image, offset + 2).unwrap_or(0);
        (base, limit)
    }

    pub(crate) fn parse_intel_image(
        &mut self,
        intel_image: &ByteSpan,
        local_offset: u32,
        parent: ItemId,
    ) -> Result<ItemId, ParseError> {
        // Check for buffer size to be greater or equal to descriptor region size
        if intel_image.len() < FLASH_DESCRIPTOR_SIZE {
            self.msg(
                format!(
                    "parse_intel_image: input file is smaller than minimum descriptor size of {} bytes",
                    size_string(FLASH_DESCRIPTOR_SIZE)
                ),
                None,
            );
            return Err(ParseError::ItemNotFound);
        }

        let descriptor: FlashDescriptorHeader =
            read_le(intel_image).ok_or(ParseError::ItemNotFound)?;
        if descriptor.signature != FLASH_DESCRIPTOR_SIGNATURE {
            return Err(ParseError::ItemNotFound);
        }

        let map: FlashDescriptorMap =
            read_le_at(intel_image, 20).ok_or(ParseError::InvalidFlashDescriptor)?;

        // Check sanity of base values
        if map.master_base() > FLASH_DESCRIPTOR_MAX_BASE
            || map.master_base() == map.region_base()
            || map.master_base() == map.component_base()
        {
            self.msg(
                format!(
                    "parse_intel_image: invalid descriptor master base {:02X}h",
                    map.master_base()
                ),
                None,
            );
            return Err(ParseError::InvalidFlashDescriptor);
        }
        if map.region_base() > FLASH_DESCRIPTOR_MAX_BASE
            || map.region_base() == map.component_base()
        {
            self.msg(
                format!(
                    "parse_intel_image: invalid descriptor region base {:02X}h",
                    map.region_base()
                ),
                None,
            );
            return Err(ParseError::InvalidFlashDescriptor);
        }
        if map.component_base() > FLASH_DESCRIPTOR_MAX_BASE {
            self.msg(
                format!(
                    "parse_intel_image: invalid descriptor component base {:02X}h",
                    map.component_base()
                ),
                None,
            );
            return Err(ParseError::InvalidFlashDescriptor);
        }

        let region_section = (map.region_base() as usize) << 4;
        let component_section_offset = (map.component_base() as usize) << 4;
        let component: FlashDescriptorComponentSection =
            read_le_at(intel_image, component_section_offset)
                .ok_or(ParseError::InvalidFlashDescriptor)?;

        // Descriptor version 1 is identified by the hardcoded read clock
        let descriptor_version =
            if component.read_clock_frequency() == FLASH_FREQUENCY_20MHZ { 1 } else { 2 };

        let mut regions: Vec<RegionInfo> = Vec::new();
        let region_exists = |base: u16, limit: u16| limit != 0 && !(base == 0xFFFF && limit == 0xFFFF);

        // ME region, needed early for the Gigabyte special case
        let (me_base, me_limit) =
            Self::region_base_limit(intel_image, region_section, region_subtype::ME);
        let mut me_offset = 0u32;
        let mut me_length = 0u32;
        if region_exists(me_base, me_limit) {
            me_offset = calculate_region_offset(me_base);
            me_length = calculate_region_size(me_base, me_limit);
            regions.push(RegionInfo {
                offset: me_offset,
                length: me_length,
                subtype: region_subtype::ME,
            });
        }

        // BIOS region
        let (bios_base, bios_limit) =
            Self::region_base_limit(intel_image, region_section, region_subtype::BIOS);
        let mut bios_found = false;
        if region_exists(bios_base, bios_limit) {
            bios_found = true;
            let mut bios_offset = calculate_region_offset(bios_base);
            let mut bios_length = calculate_region_size(bios_base, bios_limit);

            // Check for Gigabyte-specific descriptor map
            if bios_length as usize == intel_image.len() {
                if me_offset == 0 {
                    self.msg(
                        "parse_intel_image: can't determine BIOS region start from Gigabyte-specific descriptor",
                        None,
                    );
                    return Err(ParseError::InvalidFlashDescriptor);
                }
                // Use the ME region end as the BIOS region offset
                bios_offset = me_offset + me_length;
                bios_length = intel_image.len() as u32 - bios_offset;
            }
            regions.push(RegionInfo {
                offset: bios_offset,
                length: bios_length,
                subtype: region_subtype::BIOS,
            });
        }

        // All other regions
        for subtype in region_subtype::GBE..=region_subtype::PTT {
            if descriptor_version == 1 && subtype == region_subtype::MICROCODE {
                // Do not parse Microcode and following regions on legacy descriptors
                break;
            }
            let (base, limit) = Self::region_base_limit(intel_image, region_section, subtype);
            if region_exists(base, limit) {
                let length = calculate_region_size(base, limit);
                if length != 0 {
                    regions.push(RegionInfo {
                        offset: calculate_region_offset(base),
                        length,
                        subtype,
                    });
                }
            }
        }

        // A descriptor with no regions at all stands alone; regions without
        // a BIOS region among them mean the descriptor can not be trusted
        if !bios_found && !regions.is_empty() {
            self.msg(
                "parse_intel_image: descriptor parsing failed, BIOS region not found in descriptor",
                None,
            );
            return Err(ParseError::InvalidFlashDescriptor);
        }

        // Sort regions in ascending order
        regions.sort_by_key(|r| r.offset);

        // Check that every region is fully present in the image
        for region in &regions {
            if region.offset as u64 + region.length as u64 > intel_image.len() as u64 {
                let name = region_subtype::display_name(region.subtype);
                self.msg(
                    format!(
                        "parse_intel_image: {} region is located outside of the opened image. \
                         If your system uses dual-chip storage, please append another part to the opened image",
                        name
                    ),
                    None,
                );
                return Err(ParseError::TruncatedImage);
            }
        }

        // Check for intersections and paddings between regions
        if regions.is_empty() {
            // No consistency checks needed for a lone descriptor
        } else if (regions[0].offset as usize) < FLASH_DESCRIPTOR_SIZE {
            let name = region_subtype::display_name(regions[0].subtype);
            self.msg(
                format!(
                    "parse_intel_image: {} region has intersection with flash descriptor",
                    name
                ),
                None,
            );
            return Err(ParseError::InvalidFlashDescriptor);
        } else if regions[0].offset as usize > FLASH_DESCRIPTOR_SIZE {
            // Padding between descriptor and the first region
            let offset = FLASH_DESCRIPTOR_SIZE as u32;
            let length = regions[0].offset - offset;
            let data = intel_image.slice(offset as usize, (offset + length) as usize);
            regions.insert(
                0,
                RegionInfo { offset, length, subtype: padding_type(&data) },
            );
        }
        let mut i = 1;
        while i < regions.len() {
            let previous_end = regions[i - 1].offset + regions[i - 1].length;

            if regions[i].offset < previous_end {
                let name = region_subtype::display_name(regions[i].subtype);
                let previous_name = region_subtype::display_name(regions[i - 1].subtype);
                self.msg(
                    format!(
                        "parse_intel_image: {} region has intersection with {} region",
                        name, previous_name
                    ),
                    None,
                );
                return Err(ParseError::InvalidFlashDescriptor);
            } else if regions[i].offset > previous_end {
                let length = regions[i].offset - previous_end;
                let data =
                    intel_image.slice(previous_end as usize, (previous_end + length) as usize);
                regions.insert(
                    i,
                    RegionInfo { offset: previous_end, length, subtype: padding_type(&data) },
                );
            }
            i += 1;
        }
        // Check for a padding after the last region
        let last_end = regions
            .last()
            .map(|r| r.offset as u64 + r.length as u64)
            .unwrap_or(FLASH_DESCRIPTOR_SIZE as u64);
        if last_end < intel_image.len() as u64 {
            let offset = last_end as u32;
            let length = intel_image.len() as u32 - offset;
            let data = intel_image.slice(offset as usize, intel_image.len());
            regions.push(RegionInfo { offset, length, subtype: padding_type(&data) });
        }

        // Region map is consistent
        let info = format!(
            "Full size: {}\nFlash chips: {}\nRegions: {}\nMasters: {}\nPCH straps: {}\nPROC straps: {}",
            size_string(intel_image.len()),
            map.number_of_flash_chips() + 1, // zero-based in storage
            map.number_of_regions() + 1,
            map.number_of_masters() + 1,
            map.number_of_pch_straps(),
            map.number_of_proc_straps()
        );

        self.image_base = self.model.base(parent).wrapping_add(local_offset);

        let index = self.add_item(
            local_offset,
            ItemType::Image,
            image_subtype::INTEL,
            "Intel image",
            "",
            info,
            ByteSpan::empty(),
            intel_image.clone(),
            ByteSpan::empty(),
            true,
            parent,
        );

        // Descriptor region info
        let body = intel_image.slice(0, FLASH_DESCRIPTOR_SIZE);
        let mut info = format!(
            "ReservedVector:\n{:02X} {:02X} {:02X} {:02X} {:02X} {:02X} {:02X} {:02X}\n\
             {:02X} {:02X} {:02X} {:02X} {:02X} {:02X} {:02X} {:02X}\nFull size: {}",
            descriptor.reserved_vector[0],
            descriptor.reserved_vector[1],
            descriptor.reserved_vector[2],
            descriptor.reserved_vector[3],
            descriptor.reserved_vector[4],
            descriptor.reserved_vector[5],
            descriptor.reserved_vector[6],
            descriptor.reserved_vector[7],
            descriptor.reserved_vector[8],
            descriptor.reserved_vector[9],
            descriptor.reserved_vector[10],
            descriptor.reserved_vector[11],
            descriptor.reserved_vector[12],
            descriptor.reserved_vector[13],
            descriptor.reserved_vector[14],
            descriptor.reserved_vector[15],
            size_string(FLASH_DESCRIPTOR_SIZE)
        );

        // Add offsets of actual regions
        for region in &regions {
            if region.subtype != padding_subtype::ZERO
                && region.subtype != padding_subtype::ONE
                && region.subtype != padding_subtype::DATA
            {
                info += &format!(
                    "\n{} region offset: {:X}h",
                    region_subtype::display_name(region.subtype),
                    region.offset + local_offset
                );
            }
        }

        // Region access settings
        let master_section = (map.master_base() as usize) << 4;
        if descriptor_version == 1 {
            if let Some(master) =
                read_le_at::<FlashDescriptorMasterSection>(intel_image, master_section)
            {
                info += "\nRegion access settings:";
                info += &format!(
                    "\nBIOS: {:02X}h {:02X}h ME: {:02X}h {:02X}h\nGbE:  {:02X}h {:02X}h",
                    master.bios_read,
                    master.bios_write,
                    master.me_read,
                    master.me_write,
                    master.gbe_read,
                    master.gbe_write
                );
                info += &access_table(
                    master.bios_read as u16,
                    master.bios_write as u16,
                    false,
                );
            }
        } else {
            if let Some(master) =
                read_le_at::<FlashDescriptorMasterSectionV2>(intel_image, master_section)
            {
                info += "\nRegion access settings:";
                info += &format!(
                    "\nBIOS: {:03X}h {:03X}h ME: {:03X}h {:03X}h\nGbE:  {:03X}h {:03X}h EC: {:03X}h {:03X}h",
                    master.bios_read(),
                    master.bios_write(),
                    master.me_read(),
                    master.me_write(),
                    master.gbe_read(),
                    master.gbe_write(),
                    master.ec_read(),
                    master.ec_write()
                );
                info += &access_table(master.bios_read(), master.bios_write(), true);
            }

            // Prepend descriptor version if present
            if map.descriptor_version != FLASH_DESCRIPTOR_VERSION_INVALID {
                let mut version_str = format!(
                    "Flash descriptor version: {}.{}",
                    map.version_major(),
                    map.version_minor()
                );
                if map.version_major() != FLASH_DESCRIPTOR_VERSION_MAJOR
                    || map.version_minor() != FLASH_DESCRIPTOR_VERSION_MINOR
                {
                    version_str += ", unknown";
                    self.msg(
                        format!(
                            "parse_intel_image: unknown flash descriptor version {}.{}",
                            map.version_major(),
                            map.version_minor()
                        ),
                        None,
                    );
                }
                info = format!("{}\n{}", version_str, info);
            }
        }

        // VSCC table
        let mut vscc_messages = Vec::new();
        if let Some(upper_map) =
            read_le_at::<FlashDescriptorUpperMap>(intel_image, FLASH_DESCRIPTOR_UPPER_MAP_BASE)
        {
            let vscc_base = (upper_map.vscc_table_base as usize) << 4;
            let vscc_entries = (upper_map.vscc_table_size as usize) * 4 / VSCC_TABLE_ENTRY_SIZE;
            info += "\nFlash chips in VSCC table:";
            for i in 0..vscc_entries {
                let entry_offset = vscc_base + i * VSCC_TABLE_ENTRY_SIZE;
                let Some(entry) = read_le_at::<VsccTableEntry>(intel_image, entry_offset) else {
                    break;
                };
                let jedec_id = jedec_id_name(entry.vendor_id, entry.device_id0, entry.device_id1);
                info += &format!(
                    "\n{:02X}{:02X}{:02X} ({})",
                    entry.vendor_id, entry.device_id0, entry.device_id1, jedec_id
                );
                if jedec_id.starts_with("Unknown") {
                    vscc_messages.push(format!(
                        "parse_intel_image: SPI flash with unknown JEDEC ID {:02X}{:02X}{:02X} found in VSCC table",
                        entry.vendor_id, entry.device_id0, entry.device_id1
                    ));
                }
            }
        }
        for message in vscc_messages {
            self.msg(message, Some(index));
        }

        // Add descriptor tree item
        self.add_item(
            0,
            ItemType::Region,
            region_subtype::DESCRIPTOR,
            "Descriptor region",
            "",
            info,
            ByteSpan::empty(),
            body,
            ByteSpan::empty(),
            true,
            index,
        );

        // Parse regions
        let mut parse_result = Ok(index);
        for region in &regions {
            let data = intel_image
                .slice(region.offset as usize, (region.offset + region.length) as usize);
            let result = match region.subtype {
                region_subtype::BIOS => {
                    self.parse_bios_region(&data, region.offset, index).map(|_| ())
                }
                region_subtype::ME => self.parse_me_region(&data, region.offset, index).map(|_| ()),
                region_subtype::GBE => {
                    self.parse_gbe_region(&data, region.offset, index).map(|_| ())
                }
                region_subtype::PDR => {
                    self.parse_pdr_region(&data, region.offset, index).map(|_| ())
                }
                region_subtype::DEV_EXP1 => {
                    self.parse_dev_exp1_region(&data, region.offset, index).map(|_| ())
                }
                region_subtype::BIOS2
                | region_subtype::MICROCODE
                | region_subtype::EC
                | region_subtype::DEV_EXP2
                | region_subtype::IE
                | region_subtype::TGBE1
                | region_subtype::TGBE2
                | region_subtype::RESERVED1
                | region_subtype::RESERVED2
                | region_subtype::PTT => {
                    self.parse_generic_region(region.subtype, &data, region.offset, index)
                        .map(|_| ())
                }
                padding_subtype::ZERO | padding_subtype::ONE | padding_subtype::DATA => {
                    // Padding between regions
                    let info = format!("Full size: {}", size_string(data.len()));
                    self.add_item(
                        region.offset,
                        ItemType::Padding,
                        region.subtype,
                        "Padding",
                        "",
                        info,
                        ByteSpan::empty(),
                        data,
                        ByteSpan::empty(),
                        true,
                        index,
                    );
                    Ok(())
                }
                _ => {
                    self.msg("parse_intel_image: region of unknown type found", Some(index));
                    Err(ParseError::InvalidFlashDescriptor)
                }
            };
            // Store the first failed result as the final result
            if parse_result.is_ok() {
                if let Err(error) = result {
                    parse_result = Err(error);
                }
            }
        }

        parse_result
    }

    fn parse_gbe_region(
        &mut self,
        gbe: &ByteSpan,
        local_offset: u32,
        parent: ItemId,
    ) -> Result<ItemId, ParseError> {
        if gbe.is_empty() {
            return Err(ParseError::EmptyRegion);
        }
        if gbe.len() < GBE_VERSION_OFFSET + GBE_VERSION_SIZE {
            return Err(ParseError::InvalidRegion);
        }

        let mac: GbeMacAddress = read_le(gbe).ok_or(ParseError::InvalidRegion)?;
        let version: GbeVersion =
            read_le_at(gbe, GBE_VERSION_OFFSET).ok_or(ParseError::InvalidRegion)?;
        let info = format!(
            "Full size: {}\nMAC: {:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}\nVersion: {}.{}",
            size_string(gbe.len()),
            mac.vendor[0],
            mac.vendor[1],
            mac.vendor[2],
            mac.device[0],
            mac.device[1],
            mac.device[2],
            version.major,
            version.minor()
        );

        Ok(self.add_item(
            local_offset,
            ItemType::Region,
            region_subtype::GBE,
            "GbE region",
            "",
            info,
            ByteSpan::empty(),
            gbe.clone(),
            ByteSpan::empty(),
            true,
            parent,
        ))
    }

    fn parse_me_region(
        &mut self,
        me: &ByteSpan,
        local_offset: u32,
        parent: ItemId,
    ) -> Result<ItemId, ParseError> {
        if me.is_empty() {
            return Err(ParseError::EmptyRegion);
        }

        let mut info = format!("Full size: {}", size_string(me.len()));

        let mut version_found = true;
        let mut empty_region = false;
        if me.is_filled_with(0xFF) || me.is_filled_with(0x00) {
            // Further parsing not needed
            empty_region = true;
            info += "\nState: empty";
        } else {
            // Search for the newer signature first
            let mut version_offset = find_u32(me, ME_VERSION_SIGNATURE_MN2);
            if version_offset.is_none() {
                version_offset = find_u32(me, ME_VERSION_SIGNATURE_MAN);
            }
            match version_offset {
                None => {
                    info += "\nVersion: unknown";
                    version_found = false;
                }
                Some(offset) => {
                    if me.len() < offset + ME_VERSION_SIZE {
                        return Err(ParseError::InvalidRegion);
                    }
                    let version: MeVersion =
                        read_le_at(me, offset).ok_or(ParseError::InvalidRegion)?;
                    info += &format!(
                        "\nVersion: {}.{}.{}.{}",
                        version.major, version.minor, version.bugfix, version.build
                    );
                }
            }
        }

        let index = self.add_item(
            local_offset,
            ItemType::Region,
            region_subtype::ME,
            "ME region",
            "",
            info,
            ByteSpan::empty(),
            me.clone(),
            ByteSpan::empty(),
            true,
            parent,
        );

        if empty_region {
            self.msg("parse_me_region: ME region is empty", Some(index));
        } else if !version_found {
            self.msg(
                "parse_me_region: ME version is unknown, it can be damaged",
                Some(index),
            );
        } else {
            self.parse_me_region_body(index)?;
        }

        Ok(index)
    }

    fn parse_bios_region(
        &mut self,
        bios: &ByteSpan,
        local_offset: u32,
        parent: ItemId,
    ) -> Result<ItemId, ParseError> {
        if bios.is_empty() {
            return Err(ParseError::EmptyRegion);
        }

        let info = format!("Full size: {}", size_string(bios.len()));
        let index = self.add_item(
            local_offset,
            ItemType::Region,
            region_subtype::BIOS,
            "BIOS region",
            "",
            info,
            ByteSpan::empty(),
            bios.clone(),
            ByteSpan::empty(),
            true,
            parent,
        );

        self.parse_raw_area(index)?;
        Ok(index)
    }

    fn parse_pdr_region(
        &mut self,
        pdr: &ByteSpan,
        local_offset: u32,
        parent: ItemId,
    ) -> Result<ItemId, ParseError> {
        if pdr.is_empty() {
            return Err(ParseError::EmptyRegion);
        }

        let info = format!("Full size: {}", size_string(pdr.len()));
        let index = self.add_item(
            local_offset,
            ItemType::Region,
            region_subtype::PDR,
            "PDR region",
            "",
            info,
            ByteSpan::empty(),
            pdr.clone(),
            ByteSpan::empty(),
            true,
            parent,
        );

        // Parse PDR region as BIOS space
        match self.parse_raw_area(index) {
            Ok(())
            | Err(ParseError::VolumesNotFound)
            | Err(ParseError::InvalidVolume)
            | Err(ParseError::StoresNotFound) => Ok(index),
            Err(other) => Err(other),
        }
    }

    fn parse_dev_exp1_region(
        &mut self,
        dev_exp1: &ByteSpan,
        local_offset: u32,
        parent: ItemId,
    ) -> Result<ItemId, ParseError> {
        if dev_exp1.is_empty() {
            return Err(ParseError::EmptyRegion);
        }

        let mut info = format!("Full size: {}", size_string(dev_exp1.len()));

        let empty_region = dev_exp1.is_filled_with(0xFF) || dev_exp1.is_filled_with(0x00);
        if empty_region {
            info += "\nState: empty";
        }

        let index = self.add_item(
            local_offset,
            ItemType::Region,
            region_subtype::DEV_EXP1,
            "DevExp1 region",
            "",
            info,
            ByteSpan::empty(),
            dev_exp1.clone(),
            ByteSpan::empty(),
            true,
            parent,
        );

        if !empty_region {
            self.parse_me_region_body(index)?;
        }
        Ok(index)
    }

    fn parse_generic_region(
        &mut self,
        subtype: u8,
        region: &ByteSpan,
        local_offset: u32,
        parent: ItemId,
    ) -> Result<ItemId, ParseError> {
        if region.is_empty() {
            return Err(ParseError::EmptyRegion);
        }

        let name = format!("{} region", region_subtype::display_name(subtype));
        let info = format!("Full size: {}", size_string(region.len()));
        Ok(self.add_item(
            local_offset,
            ItemType::Region,
            subtype,
            name,
            "",
            info,
            ByteSpan::empty(),
            region.clone(),
            ByteSpan::empty(),
            true,
            parent,
        ))
    }

    pub(crate) fn parse_raw_area(&mut self, index: ItemId) -> Result<(), ParseError> {
        let data = self.model.body(index).clone();
        let header_size = self.model.header(index).len() as u32;

        // Search for the first item
        let first = match self.find_next_raw_area_item(&data, 0) {
            None => return Ok(()), // nothing to parse further
            Some(found) => found,
        };

        // Set base of protected regions to be the first item of a BIOS region
        if self.model.item_type(index) == ItemType::Region
            && self.model.subtype(index) == region_subtype::BIOS
        {
            self.protected_regions_base = self.model.base(index) as u64 + first.1 as u64;
        }

        // First item may not be at the beginning of this raw area
        if first.1 > 0 {
            let padding = data.slice(0, first.1 as usize);
            let info = format!("Full size: {}", size_string(padding.len()));
            self.add_item(
                header_size,
                ItemType::Padding,
                padding_type(&padding),
                "Padding",
                "",
                info,
                ByteSpan::empty(),
                padding,
                ByteSpan::empty(),
                true,
                index,
            );
        }

        // Search for and parse all items
        let mut current = Some(first);
        let mut prev_offset = first.1;
        let mut prev_size = 0u32;
        while let Some((item_type, item_offset, item_size, item_alt_size)) = current {
            // Padding between items
            if item_offset > prev_offset + prev_size {
                let padding_offset = prev_offset + prev_size;
                let padding = data.slice(padding_offset as usize, item_offset as usize);
                let info = format!("Full size: {}", size_string(padding.len()));
                self.add_item(
                    header_size + padding_offset,
                    ItemType::Padding,
                    padding_type(&padding),
                    "Padding",
                    "",
                    info,
                    ByteSpan::empty(),
                    padding,
                    ByteSpan::empty(),
                    true,
                    index,
                );
            }

            // Check that the item is fully present in the input
            if item_size as usize > data.len() || (item_offset + item_size) as usize > data.len() {
                // Mark the rest as padding and finish parsing
                let padding = data.slice_from(item_offset as usize);
                let info = format!("Full size: {}", size_string(padding.len()));
                let padding_index = self.add_item(
                    header_size + item_offset,
                    ItemType::Padding,
                    padding_type(&padding),
                    "Padding",
                    "",
                    info,
                    ByteSpan::empty(),
                    padding.clone(),
                    ByteSpan::empty(),
                    true,
                    index,
                );
                self.msg(
                    "parse_raw_area: one of the items inside overlaps the end of data",
                    Some(padding_index),
                );
                prev_offset = item_offset;
                prev_size = padding.len() as u32;
                break;
            }

            let item = data.slice(item_offset as usize, (item_offset + item_size) as usize);
            match item_type {
                RawAreaItem::Volume => {
                    match self.parse_volume_header(&item, header_size + item_offset, index) {
                        Err(error) => {
                            self.msg(
                                format!(
                                    "parse_raw_area: volume header parsing failed with error \"{}\"",
                                    error
                                ),
                                Some(index),
                            );
                        }
                        Ok(volume_index) => {
                            if item_size != item_alt_size {
                                self.msg(
                                    format!(
                                        "parse_raw_area: volume size stored in header {:X}h differs from calculated using block map {:X}h",
                                        item_size, item_alt_size
                                    ),
                                    Some(volume_index),
                                );
                            }
                        }
                    }
                }
                RawAreaItem::Microcode => {
                    if let Err(error) =
                        self.parse_intel_microcode_header(&item, header_size + item_offset, index)
                    {
                        self.msg(
                            format!(
                                "parse_raw_area: microcode header parsing failed with error \"{}\"",
                                error
                            ),
                            Some(index),
                        );
                    }
                }
                RawAreaItem::BpdtStore => {
                    let info = format!("Full size: {}", size_string(item.len()));
                    let bpdt_index = self.add_item(
                        header_size + item_offset,
                        ItemType::BpdtStore,
                        0,
                        "BPDT region",
                        "",
                        info,
                        ByteSpan::empty(),
                        item.clone(),
                        ByteSpan::empty(),
                        true,
                        index,
                    );
                    if let Err(error) = self.parse_bpdt_region(&item, 0, 0, bpdt_index) {
                        self.msg(
                            format!(
                                "parse_raw_area: BPDT store parsing failed with error \"{}\"",
                                error
                            ),
                            Some(index),
                        );
                    }
                }
            }

            prev_offset = item_offset;
            prev_size = item_size;
            current = self.find_next_raw_area_item(&data, item_offset + prev_size);
        }

        // Padding at the end of the raw area
        let end_offset = prev_offset + prev_size;
        if data.len() as u32 > end_offset {
            let padding = data.slice_from(end_offset as usize);
            let info = format!("Full size: {}", size_string(padding.len()));
            self.add_item(
                header_size + end_offset,
                ItemType::Padding,
                padding_type(&padding),
                "Padding",
                "",
                info,
                ByteSpan::empty(),
                padding,
                ByteSpan::empty(),
                true,
                index,
            );
        }

        // Parse bodies; a container that fails to parse any children still
        // stays in the tree as a leaf
        for current in self.model.children(index).to_vec() {
            match self.model.item_type(current) {
                ItemType::Volume => {
                    let _ = self.parse_volume_body(current);
                }
                ItemType::Microcode
                | ItemType::BpdtStore
                | ItemType::BpdtPartition
                | ItemType::Padding => {
                    // Parsing already done or not required
                }
                _ => return Err(ParseError::UnknownItemType),
            }
        }

        Ok(())
    }

    /// Scan a raw area for the next recognizable container. Returns its
    /// kind, offset, size, and the alternative (cross-checked) size.
    pub(crate) fn find_next_raw_area_item(
        &mut self,
        data: &ByteSpan,
        start: u32,
    ) -> Option<(RawAreaItem, u32, u32, u32)> {
        let data_size = data.len();
        if data_size < 4 {
            return None;
        }

        let mut offset = start as usize;
        while offset < data_size - 4 {
            let rest_size = data_size - offset;
            let current = u32::from_le_bytes([
                data[offset],
                data[offset + 1],
                data[offset + 2],
                data[offset + 3],
            ]);

            if current == INTEL_MICROCODE_HEADER_VERSION_1 {
                if rest_size < INTEL_MICROCODE_HEADER_SIZE {
                    offset += 1;
                    continue;
                }
                let Some(header) = read_le_at::<IntelMicrocodeHeader>(data, offset) else {
                    offset += 1;
                    continue;
                };
                if !header.is_valid() || header.total_size == 0 {
                    offset += 1;
                    continue;
                }
                return Some((
                    RawAreaItem::Microcode,
                    offset as u32,
                    header.total_size,
                    header.total_size,
                ));
            } else if current == ffs::EFI_FV_SIGNATURE {
                if offset < ffs::EFI_FV_SIGNATURE_OFFSET {
                    offset += 1;
                    continue;
                }
                let volume_offset = offset - ffs::EFI_FV_SIGNATURE_OFFSET;
                let Some(header) = read_le_at::<ffs::VolumeHeader>(data, volume_offset) else {
                    offset += 1;
                    continue;
                };
                if header.fv_length
                    < (ffs::VOLUME_HEADER_MIN_SIZE + 2 * ffs::BLOCK_MAP_ENTRY_SIZE) as u64
                    || header.fv_length >= 0xFFFF_FFFF
                {
                    offset += 1;
                    continue;
                }
                if header.revision != 1 && header.revision != 2 {
                    offset += 1;
                    continue;
                }

                // Calculate the alternative volume size from its block map
                let mut alternative_size = 0u64;
                let mut entry_offset = volume_offset + ffs::VOLUME_HEADER_SIZE;
                while let Some(entry) = read_le_at::<ffs::BlockMapEntry>(data, entry_offset) {
                    if entry.num_blocks == 0 || entry.length == 0 {
                        break;
                    }
                    alternative_size += entry.num_blocks as u64 * entry.length as u64;
                    entry_offset += ffs::BLOCK_MAP_ENTRY_SIZE;
                }

                return Some((
                    RawAreaItem::Volume,
                    volume_offset as u32,
                    header.fv_length as u32,
                    alternative_size as u32,
                ));
            } else if current == BPDT_GREEN_SIGNATURE || current == BPDT_YELLOW_SIGNATURE {
                if rest_size < BPDT_HEADER_SIZE {
                    offset += 1;
                    continue;
                }
                let Some(header) = read_le_at::<BpdtHeader>(data, offset) else {
                    offset += 1;
                    continue;
                };
                // IFWI 2.0 only for now
                if header.header_version != BPDT_HEADER_VERSION_1 {
                    offset += 1;
                    continue;
                }
                let pt_size = BPDT_HEADER_SIZE + header.num_entries as usize * BPDT_ENTRY_SIZE;
                if rest_size < pt_size {
                    offset += 1;
                    continue;
                }

                let mut size_candidate = 0u32;
                for i in 0..header.num_entries as usize {
                    let Some(entry) = read_le_at::<BpdtEntry>(
                        data,
                        offset + BPDT_HEADER_SIZE + i * BPDT_ENTRY_SIZE,
                    ) else {
                        break;
                    };
                    if entry.offset != 0
                        && entry.offset != 0xFFFF_FFFF
                        && entry.size != 0
                        && size_candidate < entry.offset + entry.size
                    {
                        size_candidate = entry.offset + entry.size;
                    }
                }
                if size_candidate == 0 {
                    offset += 1;
                    continue;
                }

                return Some((
                    RawAreaItem::BpdtStore,
                    offset as u32,
                    size_candidate,
                    size_candidate,
                ));
            }

            offset += 1;
        }

        None
    }

    pub(crate) fn parse_microcode_volume_body(&mut self, index: ItemId) -> Result<(), ParseError> {
        let header_size = self.model.header(index).len() as u32;
        let body = self.model.body(index).clone();
        let body_size = body.len() as u32;
        let mut offset = 0u32;

        loop {
            let ucode = body.slice_from(offset as usize);

            let result = if ucode.is_filled_with(0xFF) || ucode.is_filled_with(0x00) {
                Err(ParseError::InvalidMicrocode)
            } else {
                self.parse_intel_microcode_header(&ucode, header_size + offset, index)
            };

            match result {
                Err(_) => {
                    // Add the rest as padding
                    if offset < body_size {
                        let info = format!("Full size: {}", size_string(ucode.len()));
                        self.add_item(
                            header_size + offset,
                            ItemType::Padding,
                            padding_type(&ucode),
                            "Padding",
                            "",
                            info,
                            ByteSpan::empty(),
                            ucode,
                            ByteSpan::empty(),
                            true,
                            index,
                        );
                    }
                    return Ok(());
                }
                Ok(microcode_index) => {
                    offset += self.model.full_size(microcode_index) as u32;
                    if offset >= body_size {
                        return Ok(());
                    }
                }
            }
        }
    }

    pub(crate) fn parse_intel_microcode_header(
        &mut self,
        microcode: &ByteSpan,
        local_offset: u32,
        parent: ItemId,
    ) -> Result<ItemId, ParseError> {
        if microcode.len() < INTEL_MICROCODE_HEADER_SIZE {
            return Err(ParseError::InvalidMicrocode);
        }

        let header: IntelMicrocodeHeader =
            read_le(microcode).ok_or(ParseError::InvalidMicrocode)?;
        if !header.is_valid() {
            return Err(ParseError::InvalidMicrocode);
        }

        // The whole TotalSize must fit
        if microcode.len() < header.total_size as usize {
            return Err(ParseError::InvalidMicrocode);
        }

        let mut data_size = header.data_size;
        if data_size == 0 {
            data_size = INTEL_MICROCODE_REAL_DATA_SIZE_ON_ZERO;
        }

        // Cross check DataSize and TotalSize
        if (header.total_size as usize) < INTEL_MICROCODE_HEADER_SIZE + data_size as usize {
            return Err(ParseError::InvalidMicrocode);
        }

        // Recalculate the whole microcode checksum
        let mut temp_microcode = microcode.slice(0, header.total_size as usize).to_vec();
        temp_microcode[16..20].fill(0); // Checksum field
        let calculated = crate::basetypes::calculate_checksum32(&temp_microcode);
        let msg_invalid_checksum = header.checksum != calculated;

        let tail_offset = INTEL_MICROCODE_HEADER_SIZE + data_size as usize;
        let tail_size = header.total_size as usize - tail_offset;
        let tail = microcode.slice(tail_offset, tail_offset + tail_size);

        // Check for an extended header in the tail
        let mut extended_header_info = String::new();
        let mut msg_unknown_or_damaged_tail = false;
        if tail.len() >= INTEL_MICROCODE_EXTENDED_HEADER_SIZE {
            let extended: IntelMicrocodeExtendedHeader =
                read_le(&tail).ok_or(ParseError::InvalidMicrocode)?;

            let reserved_valid = extended.reserved.iter().all(|&b| b == 0);
            let expected_size = INTEL_MICROCODE_EXTENDED_HEADER_SIZE
                + extended.entry_count as usize * INTEL_MICROCODE_EXTENDED_HEADER_ENTRY_SIZE;

            if reserved_valid && extended.entry_count > 0 && tail.len() == expected_size {
                // Recalculate the extended header checksum
                let mut temp_extended = tail.to_vec();
                temp_extended[4..8].fill(0); // Checksum field
                let extended_calculated =
                    crate::basetypes::calculate_checksum32(&temp_extended);

                extended_header_info = format!(
                    "\nExtended header entries: {}\nExtended header checksum: {:08X}h, {}",
                    extended.entry_count,
                    extended.checksum,
                    if extended.checksum == extended_calculated {
                        "valid".to_string()
                    } else {
                        format!("invalid, should be {:08X}h", extended_calculated)
                    }
                );

                for i in 0..extended.entry_count as usize {
                    let entry_offset = INTEL_MICROCODE_EXTENDED_HEADER_SIZE
                        + i * INTEL_MICROCODE_EXTENDED_HEADER_ENTRY_SIZE;
                    let Some(entry) =
                        read_le_at::<IntelMicrocodeExtendedHeaderEntry>(&tail, entry_offset)
                    else {
                        break;
                    };

                    // Recalculate the checksum after patching signature and flags
                    let mut patched =
                        microcode.slice(0, INTEL_MICROCODE_HEADER_SIZE + data_size as usize).to_vec();
                    patched[16..20].fill(0); // Checksum field
                    patched[24] = entry.processor_flags as u8;
                    patched[12..16].copy_from_slice(&entry.processor_signature.to_le_bytes());
                    let entry_calculated = crate::basetypes::calculate_checksum32(&patched);

                    extended_header_info += &format!(
                        "\nCPU signature #{}: {:08X}h\nCPU flags #{}: {:02X}h\nChecksum #{}: {:08X}h, {}",
                        i + 1,
                        entry.processor_signature,
                        i + 1,
                        entry.processor_flags,
                        i + 1,
                        entry.checksum,
                        if entry.checksum == entry_calculated {
                            "valid".to_string()
                        } else {
                            format!("invalid, should be {:08X}h", entry_calculated)
                        }
                    );
                }
            } else {
                msg_unknown_or_damaged_tail = true;
            }
        } else if !tail.is_empty() {
            msg_unknown_or_damaged_tail = true;
        }

        let microcode_binary = microcode.slice(0, header.total_size as usize);
        let info = format!(
            "Full size: {}\nHeader size: {}\nBody size: {}\nTail size: {}\n\
             Date: {:02X}.{:02X}.{:04X}\nCPU signature: {:08X}h\nRevision: {:08X}h\nCPU flags: {:02X}h\nChecksum: {:08X}h, {}{}",
            size_string(microcode_binary.len()),
            size_string(0),
            size_string(microcode_binary.len()),
            size_string(0),
            header.date_day,
            header.date_month,
            header.date_year,
            header.processor_signature,
            header.update_revision,
            header.processor_flags,
            header.checksum,
            if msg_invalid_checksum {
                format!("invalid, should be {:08X}h", calculated)
            } else {
                "valid".to_string()
            },
            extended_header_info
        );

        let index = self.add_item(
            local_offset,
            ItemType::Microcode,
            tree_model_lib::microcode_subtype::INTEL,
            "Intel microcode",
            "",
            info,
            ByteSpan::empty(),
            microcode_binary,
            ByteSpan::empty(),
            true,
            parent,
        );
        if msg_invalid_checksum {
            self.msg(
                format!(
                    "parse_intel_microcode_header: invalid microcode checksum {:08X}h, should be {:08X}h",
                    header.checksum, calculated
                ),
                Some(index),
            );
        }
        if msg_unknown_or_damaged_tail {
            self.msg(
                format!(
                    "parse_intel_microcode_header: extended header of size {} found, but it's damaged or has unknown format",
                    size_string(tail.len())
                ),
                Some(index),
            );
        }

        Ok(index)
    }
}

/// Offset of the first occurrence of a little-endian dword value.
pub(crate) fn find_u32(data: &ByteSpan, value: u32) -> Option<usize> {
    let needle = value.to_le_bytes();
    data.as_bytes().windows(4).position(|window| window == needle)
}

fn access_table(bios_read: u16, bios_write: u16, has_ec: bool) -> String {
    let yes_no = |flag: bool| if flag { "Yes " } else { "No  " };
    let mut out = String::from("\nBIOS access table:\n      Read  Write");
    out += &format!(
        "\nDesc  {}  {}",
        yes_no(bios_read & FLASH_DESCRIPTOR_REGION_ACCESS_DESC != 0),
        yes_no(bios_write & FLASH_DESCRIPTOR_REGION_ACCESS_DESC != 0)
    );
    out += "\nBIOS  Yes   Yes";
    out += &format!(
        "\nME    {}  {}",
        yes_no(bios_read & FLASH_DESCRIPTOR_REGION_ACCESS_ME != 0),
        yes_no(bios_write & FLASH_DESCRIPTOR_REGION_ACCESS_ME != 0)
    );
    out += &format!(
        "\nGbE   {}  {}",
        yes_no(bios_read & FLASH_DESCRIPTOR_REGION_ACCESS_GBE != 0),
        yes_no(bios_write & FLASH_DESCRIPTOR_REGION_ACCESS_GBE != 0)
    );
    out += &format!(
        "\nPDR   {}  {}",
        yes_no(bios_read & FLASH_DESCRIPTOR_REGION_ACCESS_PDR != 0),
        yes_no(bios_write & FLASH_DESCRIPTOR_REGION_ACCESS_PDR != 0)
    );
    if has_ec {
        out += &format!(
            "\nEC    {}  {}",
            yes_no(bios_read & FLASH_DESCRIPTOR_REGION_ACCESS_EC != 0),
            yes_no(bios_write & FLASH_DESCRIPTOR_REGION_ACCESS_EC != 0)
        );
    }
    out
}
