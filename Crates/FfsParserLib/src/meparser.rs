//! Intel ME / IFWI parsing: FPT partition tables, IFWI layout headers, BPDT
//! stores and CPD directories with their extension records.

use tree_model_lib::{
    cpd_partition_subtype, fpt_entry_subtype, fpt_partition_subtype, ifwi_partition_subtype,
    ByteSpan, ItemId, ItemType,
};

use crate::basetypes::{calculate_sum8, read_le, read_le_at};
use crate::error::ParseError;
use crate::ffsparser::{size_string, FfsParser};
use crate::me::*;
use crate::utility::{padding_type, sha256_digest, to_hex_upper};

// Partition bookkeeping for the consistency passes
#[derive(Clone)]
struct PartitionInfo {
    offset: u32,
    size: u32,
    is_padding: bool,
    entry_type: u16,           // BPDT entry type
    split_first: bool,
    split_second: bool,
    code_sub_partition: bool,
    uma_cachable: bool,
    item: Option<ItemId>,
}

#[derive(Clone)]
struct CpdPartitionInfo {
    name: String,
    offset: u32,
    length: u32,
    huffman_compressed: bool,
    has_metadata: bool,
    is_padding: bool,
    item: Option<ItemId>,
}

impl FfsParser {
    /// Dispatch an ME-like region body by its magic.
    pub(crate) fn parse_me_region_body(&mut self, index: ItemId) -> Result<(), ParseError> {
        let body = self.model.body(index).clone();
        if body.len() < 4 {
            return Err(ParseError::InvalidRegion);
        }

        let signature = u32::from_le_bytes(body[..4].try_into().unwrap());
        // $FPT may sit at offset 0 or right after the ROM bypass vector
        if signature == ME_FPT_HEADER_SIGNATURE {
            return self.parse_fpt_region(&body, 0, index);
        }
        if body.len() >= ME_ROM_BYPASS_VECTOR_SIZE + 4 {
            let shifted = u32::from_le_bytes(
                body[ME_ROM_BYPASS_VECTOR_SIZE..ME_ROM_BYPASS_VECTOR_SIZE + 4]
                    .try_into()
                    .unwrap(),
            );
            if shifted == ME_FPT_HEADER_SIGNATURE {
                return self.parse_fpt_region(&body, ME_ROM_BYPASS_VECTOR_SIZE, index);
            }
        }
        if signature == BPDT_GREEN_SIGNATURE || signature == BPDT_YELLOW_SIGNATURE {
            return self.parse_bpdt_region(&body, 0, 0, index);
        }
        if self.parse_ifwi_region(&body, index)? {
            return Ok(());
        }

        self.msg("parse_me_region_body: ME region has unknown format", Some(index));
        Ok(())
    }

    fn parse_fpt_region(
        &mut self,
        region: &ByteSpan,
        pt_offset: usize,
        parent: ItemId,
    ) -> Result<(), ParseError> {
        if region.len() < pt_offset + FPT_HEADER_SIZE {
            self.msg(
                "parse_fpt_region: ME region too small to fit the FPT header",
                Some(parent),
            );
            return Err(ParseError::InvalidMePartitionTable);
        }

        let header: FptHeader =
            read_le_at(region, pt_offset).ok_or(ParseError::InvalidMePartitionTable)?;
        let pt_body_size = header.num_entries as usize * FPT_ENTRY_SIZE;
        let pt_size = pt_offset + FPT_HEADER_SIZE + pt_body_size;
        if region.len() < pt_size {
            self.msg(
                "parse_fpt_region: ME region too small to fit the whole FPT partition table",
                Some(parent),
            );
            return Err(ParseError::InvalidMePartitionTable);
        }

        // Header checksum is a sum8 over HeaderLength bytes that must be zero
        let checksum_size = core::cmp::min(header.header_length as usize, region.len() - pt_offset);
        let checksum_valid =
            calculate_sum8(&region[pt_offset..pt_offset + checksum_size]) == 0;

        let info = format!(
            "Full size: {}\nHeader size: {}\nBody size: {}\nNumber of entries: {}\n\
             Header version: {:02X}h\nEntry version: {:02X}h\nFlash layout: {:X}h\nFITC version: {}.{}.{}.{}\nChecksum: {:02X}h, {}",
            size_string(region.len()),
            size_string(pt_size),
            size_string(region.len() - pt_size),
            header.num_entries,
            header.header_version,
            header.entry_version,
            header.flash_layout,
            header.fitc_major,
            header.fitc_minor,
            header.fitc_hotfix,
            header.fitc_build,
            header.checksum,
            if checksum_valid { "valid" } else { "invalid" }
        );

        let store_index = self.add_item(
            0,
            ItemType::FptStore,
            0,
            "FPT partition table",
            "",
            info,
            region.slice(0, pt_size),
            region.slice_from(pt_size),
            ByteSpan::empty(),
            true,
            parent,
        );
        if !checksum_valid {
            self.msg("parse_fpt_region: FPT header checksum is invalid", Some(store_index));
        }

        // Add the partition table entries
        let mut partitions: Vec<PartitionInfo> = Vec::new();
        for i in 0..header.num_entries as usize {
            let entry_offset = pt_offset + FPT_HEADER_SIZE + i * FPT_ENTRY_SIZE;
            let Some(entry) = read_le_at::<FptEntry>(region, entry_offset) else {
                break;
            };

            let name = partition_name(&entry.name);
            let valid = entry.entry_valid() != FPT_ENTRY_VALID_EMPTY;
            let info = format!(
                "Full size: {}\nPartition offset: {:X}h\nPartition length: {:X}h\nPartition type: {:02X}h",
                size_string(FPT_ENTRY_SIZE),
                entry.offset,
                entry.size,
                entry.partition_type()
            );
            let entry_index = self.add_item(
                entry_offset as u32,
                ItemType::FptEntry,
                if valid { fpt_entry_subtype::VALID } else { fpt_entry_subtype::INVALID },
                name,
                "",
                info,
                ByteSpan::empty(),
                region.slice(entry_offset, entry_offset + FPT_ENTRY_SIZE),
                ByteSpan::empty(),
                true,
                store_index,
            );

            if valid && entry.offset != 0 && entry.offset != 0xFFFF_FFFF && entry.size != 0 {
                partitions.push(PartitionInfo {
                    offset: entry.offset,
                    size: entry.size,
                    is_padding: false,
                    entry_type: entry.partition_type() as u16,
                    split_first: false,
                    split_second: false,
                    code_sub_partition: false,
                    uma_cachable: false,
                    item: Some(entry_index),
                });
            }
        }

        if partitions.is_empty() {
            return Ok(());
        }

        self.make_partitions_consistent(&mut partitions, pt_size as u32, region.len() as u32, "FPT");

        // The partition map is consistent now
        for partition in &partitions {
            let data =
                region.slice(partition.offset as usize, (partition.offset + partition.size) as usize);
            if partition.is_padding {
                let info = format!("Full size: {}", size_string(data.len()));
                self.add_item(
                    partition.offset,
                    ItemType::Padding,
                    padding_type(&data),
                    "Padding",
                    "",
                    info,
                    ByteSpan::empty(),
                    data,
                    ByteSpan::empty(),
                    true,
                    store_index,
                );
                continue;
            }

            let name = partition
                .item
                .map(|item| self.model.name(item).to_string())
                .unwrap_or_else(|| "Unknown".to_string());
            let subtype = match partition.entry_type as u8 {
                FPT_PARTITION_TYPE_CODE => fpt_partition_subtype::CODE,
                FPT_PARTITION_TYPE_GLUT => fpt_partition_subtype::GLUT,
                _ => fpt_partition_subtype::DATA,
            };
            let info = format!(
                "Full size: {}\nPartition type: {:02X}h",
                size_string(data.len()),
                partition.entry_type
            );
            let partition_index = self.add_item(
                partition.offset,
                ItemType::FptPartition,
                subtype,
                name,
                "",
                info,
                ByteSpan::empty(),
                data.clone(),
                ByteSpan::empty(),
                true,
                store_index,
            );

            // Code partitions may hold a CPD directory
            if data.len() >= 4
                && u32::from_le_bytes(data[..4].try_into().unwrap()) == CPD_SIGNATURE
            {
                self.parse_cpd_region(&data, partition.offset, partition_index)?;
            }
        }

        Ok(())
    }

    /// Probe for an IFWI 1.6/1.7 layout and parse it when one is found.
    fn parse_ifwi_region(&mut self, region: &ByteSpan, parent: ItemId) -> Result<bool, ParseError> {
        let region_size = region.len() as u64;

        let sane = |entry: &IfwiHeaderEntry| -> bool {
            entry.offset != 0
                && entry.offset != 0xFFFF_FFFF
                && entry.size != 0
                && entry.size != 0xFFFF_FFFF
                && (entry.offset as u64 + entry.size as u64) <= region_size
        };

        // IFWI 1.7 carries its own header size field
        if region.len() >= IFWI_17_LAYOUT_HEADER_SIZE {
            if let Some(header) = read_le::<Ifwi17LayoutHeader>(region) {
                if header.header_size as usize == IFWI_17_LAYOUT_HEADER_SIZE
                    && sane(&header.data_partition)
                    && sane(&header.boot_partition1)
                {
                    let boot_partitions = [
                        header.boot_partition1,
                        header.boot_partition2,
                        header.boot_partition3,
                        header.boot_partition4,
                        header.boot_partition5,
                    ];
                    self.parse_ifwi_layout(
                        region,
                        parent,
                        "IFWI 1.7 header",
                        IFWI_17_LAYOUT_HEADER_SIZE,
                        &header.data_partition,
                        &boot_partitions,
                    )?;
                    return Ok(true);
                }
            }
        }

        // IFWI 1.6
        if region.len() >= IFWI_16_LAYOUT_HEADER_SIZE {
            if let Some(header) = read_le::<Ifwi16LayoutHeader>(region) {
                if sane(&header.data_partition) && sane(&header.boot_partition1) {
                    let boot_partitions = [
                        header.boot_partition1,
                        header.boot_partition2,
                        header.boot_partition3,
                        header.boot_partition4,
                        header.boot_partition5,
                    ];
                    self.parse_ifwi_layout(
                        region,
                        parent,
                        "IFWI 1.6 header",
                        IFWI_16_LAYOUT_HEADER_SIZE,
                        &header.data_partition,
                        &boot_partitions,
                    )?;
                    return Ok(true);
                }
            }
        }

        Ok(false)
    }

    fn parse_ifwi_layout(
        &mut self,
        region: &ByteSpan,
        parent: ItemId,
        name: &str,
        header_size: usize,
        data_partition: &IfwiHeaderEntry,
        boot_partitions: &[IfwiHeaderEntry; 5],
    ) -> Result<(), ParseError> {
        let info = format!(
            "Full size: {}\nData partition offset: {:X}h\nData partition size: {:X}h",
            size_string(header_size),
            data_partition.offset,
            data_partition.size
        );
        self.add_item(
            0,
            ItemType::IfwiHeader,
            0,
            name,
            "",
            info,
            ByteSpan::empty(),
            region.slice(0, header_size),
            ByteSpan::empty(),
            true,
            parent,
        );

        // Data partition
        let data = region
            .slice(data_partition.offset as usize, (data_partition.offset + data_partition.size) as usize);
        let info = format!("Full size: {}", size_string(data.len()));
        let data_index = self.add_item(
            data_partition.offset,
            ItemType::IfwiPartition,
            ifwi_partition_subtype::DATA,
            "Data partition",
            "",
            info,
            ByteSpan::empty(),
            data.clone(),
            ByteSpan::empty(),
            true,
            parent,
        );
        if data.len() >= 4
            && u32::from_le_bytes(data[..4].try_into().unwrap()) == ME_FPT_HEADER_SIGNATURE
        {
            self.parse_fpt_region(&data, 0, data_index)?;
        }

        // Boot partitions
        for (i, partition) in boot_partitions.iter().enumerate() {
            if partition.offset == 0
                || partition.offset == 0xFFFF_FFFF
                || partition.size == 0
                || partition.size == 0xFFFF_FFFF
                || partition.offset as u64 + partition.size as u64 > region.len() as u64
            {
                continue;
            }
            let data = region
                .slice(partition.offset as usize, (partition.offset + partition.size) as usize);
            let info = format!("Full size: {}", size_string(data.len()));
            let boot_index = self.add_item(
                partition.offset,
                ItemType::IfwiPartition,
                ifwi_partition_subtype::BOOT,
                format!("Boot partition {}", i + 1),
                "",
                info,
                ByteSpan::empty(),
                data.clone(),
                ByteSpan::empty(),
                true,
                parent,
            );

            if data.len() >= 4 {
                let signature = u32::from_le_bytes(data[..4].try_into().unwrap());
                if signature == BPDT_GREEN_SIGNATURE || signature == BPDT_YELLOW_SIGNATURE {
                    self.parse_bpdt_region(&data, 0, 0, boot_index)?;
                }
            }
        }

        Ok(())
    }

    // Shared consistency pass: sort by offset, drop overlapping partitions
    // with a diagnostic, insert paddings into the gaps.
    fn make_partitions_consistent(
        &mut self,
        partitions: &mut Vec<PartitionInfo>,
        pt_size: u32,
        region_size: u32,
        kind: &str,
    ) {
        loop {
            partitions.sort_by_key(|p| p.offset);

            // Check the intersection with the partition table itself
            if partitions[0].offset < pt_size {
                if !partitions[0].is_padding {
                    self.msg(
                        format!(
                            "make_partitions_consistent: {} partition has intersection with {} partition table, skipped",
                            kind, kind
                        ),
                        partitions[0].item,
                    );
                    partitions.remove(0);
                    if partitions.is_empty() {
                        return;
                    }
                    continue;
                }
            } else if partitions[0].offset > pt_size {
                // Padding between the partition table and the first partition
                let padding = PartitionInfo {
                    offset: pt_size,
                    size: partitions[0].offset - pt_size,
                    is_padding: true,
                    entry_type: 0,
                    split_first: false,
                    split_second: false,
                    code_sub_partition: false,
                    uma_cachable: false,
                    item: None,
                };
                partitions.insert(0, padding);
            }

            let mut restart = false;
            let mut i = 1;
            while i < partitions.len() {
                let previous_end = partitions[i - 1].offset + partitions[i - 1].size;

                // Check that the partition is fully present in the region
                if partitions[i].offset as u64 + partitions[i].size as u64 > region_size as u64 {
                    if partitions[i].offset as u64 >= region_size as u64 {
                        self.msg(
                            format!(
                                "make_partitions_consistent: {} partition is located outside of the opened image, skipped",
                                kind
                            ),
                            partitions[i].item,
                        );
                        partitions.remove(i);
                        restart = true;
                        break;
                    } else {
                        self.msg(
                            format!(
                                "make_partitions_consistent: {} partition can't fit into its region, truncated",
                                kind
                            ),
                            partitions[i].item,
                        );
                        partitions[i].size = region_size - partitions[i].offset;
                    }
                }

                // Check the intersection with the previous partition
                if partitions[i].offset < previous_end {
                    if partitions[i].offset + partitions[i].size <= previous_end {
                        self.msg(
                            format!(
                                "make_partitions_consistent: {} partition is located inside another {} partition, skipped",
                                kind, kind
                            ),
                            partitions[i].item,
                        );
                    } else {
                        self.msg(
                            format!(
                                "make_partitions_consistent: {} partition intersects with previous one, skipped",
                                kind
                            ),
                            partitions[i].item,
                        );
                    }
                    partitions.remove(i);
                    restart = true;
                    break;
                } else if partitions[i].offset > previous_end {
                    // Padding between the partitions
                    let padding = PartitionInfo {
                        offset: previous_end,
                        size: partitions[i].offset - previous_end,
                        is_padding: true,
                        entry_type: 0,
                        split_first: false,
                        split_second: false,
                        code_sub_partition: false,
                        uma_cachable: false,
                        item: None,
                    };
                    partitions.insert(i, padding);
                }
                i += 1;
            }
            if restart {
                if partitions.is_empty() {
                    return;
                }
                continue;
            }
            break;
        }

        // Padding after the last partition
        if let Some(last) = partitions.last() {
            let last_end = last.offset as u64 + last.size as u64;
            if last_end < region_size as u64 {
                partitions.push(PartitionInfo {
                    offset: last_end as u32,
                    size: region_size - last_end as u32,
                    is_padding: true,
                    entry_type: 0,
                    split_first: false,
                    split_second: false,
                    code_sub_partition: false,
                    uma_cachable: false,
                    item: None,
                });
            }
        }
    }

    pub(crate) fn parse_bpdt_region(
        &mut self,
        region: &ByteSpan,
        local_offset: u32,
        sbpdt_offset_fixup: u32,
        parent: ItemId,
    ) -> Result<(), ParseError> {
        let region_size = region.len() as u32;

        if (region_size as usize) < BPDT_HEADER_SIZE {
            self.msg(
                "parse_bpdt_region: BPDT region too small to fit BPDT partition table header",
                Some(parent),
            );
            return Err(ParseError::InvalidMePartitionTable);
        }

        let header: BpdtHeader = read_le(region).ok_or(ParseError::InvalidMePartitionTable)?;
        let pt_body_size = header.num_entries as usize * BPDT_ENTRY_SIZE;
        let pt_size = (BPDT_HEADER_SIZE + pt_body_size) as u32;
        if region_size < pt_size {
            self.msg(
                "parse_bpdt_region: BPDT region too small to fit BPDT partition table",
                Some(parent),
            );
            return Err(ParseError::InvalidMePartitionTable);
        }

        let info = format!(
            "Full size: {}\nHeader size: {}\nBody size: {}\nNumber of entries: {}\nVersion: {:2X}h\n\
             IFWI version: {:X}h\nFITC version: {}.{}.{}.{}",
            size_string(pt_size as usize),
            size_string(BPDT_HEADER_SIZE),
            size_string(pt_body_size),
            header.num_entries,
            header.header_version,
            header.ifwi_version,
            header.fitc_major,
            header.fitc_minor,
            header.fitc_hotfix,
            header.fitc_build
        );

        let index = self.add_item(
            local_offset,
            ItemType::BpdtStore,
            0,
            "BPDT partition table",
            "",
            info,
            region.slice(0, BPDT_HEADER_SIZE),
            region.slice(BPDT_HEADER_SIZE, pt_size as usize),
            ByteSpan::empty(),
            true,
            parent,
        );

        // Add the partition table entries
        let mut partitions: Vec<PartitionInfo> = Vec::new();
        let mut offset = BPDT_HEADER_SIZE as u32;
        for i in 0..header.num_entries as usize {
            let entry_offset = BPDT_HEADER_SIZE + i * BPDT_ENTRY_SIZE;
            let Some(entry) = read_le_at::<BpdtEntry>(region, entry_offset) else {
                break;
            };

            let name = bpdt_entry_type_name(entry.entry_type());
            let info = format!(
                "Full size: {}\nType: {:X}h\nPartition offset: {:X}h\nPartition length: {:X}h\n\
                 Split sub-partition first part: {}\nSplit sub-partition second part: {}\nCode sub-partition: {}\nUMA cachable: {}",
                size_string(BPDT_ENTRY_SIZE),
                entry.entry_type(),
                entry.offset,
                entry.size,
                if entry.split_sub_partition_first_part() { "Yes" } else { "No" },
                if entry.split_sub_partition_second_part() { "Yes" } else { "No" },
                if entry.code_sub_partition() { "Yes" } else { "No" },
                if entry.uma_cachable() { "Yes" } else { "No" }
            );
            let entry_index = self.add_item(
                local_offset + offset,
                ItemType::BpdtEntry,
                0,
                name,
                "",
                info,
                ByteSpan::empty(),
                region.slice(entry_offset, entry_offset + BPDT_ENTRY_SIZE),
                ByteSpan::empty(),
                true,
                index,
            );
            offset += BPDT_ENTRY_SIZE as u32;

            if entry.offset != 0 && entry.offset != 0xFFFF_FFFF && entry.size != 0 {
                partitions.push(PartitionInfo {
                    offset: entry.offset - sbpdt_offset_fixup,
                    size: entry.size,
                    is_padding: false,
                    entry_type: entry.entry_type(),
                    split_first: entry.split_sub_partition_first_part(),
                    split_second: entry.split_sub_partition_second_part(),
                    code_sub_partition: entry.code_sub_partition(),
                    uma_cachable: entry.uma_cachable(),
                    item: Some(entry_index),
                });
            }
        }

        // An empty partition set becomes a single padding
        if partitions.is_empty() {
            partitions.push(PartitionInfo {
                offset,
                size: region_size - offset,
                is_padding: true,
                entry_type: 0,
                split_first: false,
                split_second: false,
                code_sub_partition: false,
                uma_cachable: false,
                item: None,
            });
        }

        self.make_partitions_consistent(&mut partitions, pt_size, region_size, "BPDT");

        // The partition map is consistent now
        for partition in &partitions {
            let data = region
                .slice(partition.offset as usize, (partition.offset + partition.size) as usize);
            if partition.is_padding {
                let info = format!("Full size: {}", size_string(data.len()));
                self.add_item(
                    local_offset + partition.offset,
                    ItemType::Padding,
                    padding_type(&data),
                    "Padding",
                    "",
                    info,
                    ByteSpan::empty(),
                    data,
                    ByteSpan::empty(),
                    true,
                    parent,
                );
                continue;
            }

            let name = bpdt_entry_type_name(partition.entry_type);
            let info = format!(
                "Full size: {}\nType: {:X}h\nSplit sub-partition first part: {}\nSplit sub-partition second part: {}\nCode sub-partition: {}\nUMA cachable: {}",
                size_string(data.len()),
                partition.entry_type,
                if partition.split_first { "Yes" } else { "No" },
                if partition.split_second { "Yes" } else { "No" },
                if partition.code_sub_partition { "Yes" } else { "No" },
                if partition.uma_cachable { "Yes" } else { "No" }
            );
            let partition_index = self.add_item(
                local_offset + partition.offset,
                ItemType::BpdtPartition,
                0,
                name.clone(),
                name,
                info,
                ByteSpan::empty(),
                data.clone(),
                ByteSpan::empty(),
                true,
                parent,
            );

            // Special case of S-BPDT, with offsets still relative to the
            // parent region
            if partition.entry_type == BPDT_ENTRY_TYPE_SBPDT {
                self.parse_bpdt_region(&data, 0, partition.offset, partition_index)?;
            }

            // Parse code partitions
            if data.len() >= 4
                && u32::from_le_bytes(data[..4].try_into().unwrap()) == CPD_SIGNATURE
            {
                self.parse_cpd_region(&data, 0, partition_index)?;
            }

            if partition.entry_type > BPDT_ENTRY_TYPE_TBT
                && partition.entry_type != BPDT_ENTRY_TYPE_USB_PHY
                && partition.entry_type != BPDT_ENTRY_TYPE_PCHC
                && partition.entry_type != BPDT_ENTRY_TYPE_SAMF
                && partition.entry_type != BPDT_ENTRY_TYPE_PPHY
            {
                self.msg(
                    "parse_bpdt_region: BPDT entry of unknown type found",
                    Some(partition_index),
                );
            }
        }

        Ok(())
    }

    pub(crate) fn parse_cpd_region(
        &mut self,
        region: &ByteSpan,
        local_offset: u32,
        parent: ItemId,
    ) -> Result<(), ParseError> {
        if region.len() < CPD_REV1_HEADER_SIZE {
            self.msg(
                "parse_cpd_region: CPD too small to fit rev1 partition table header",
                Some(parent),
            );
            return Err(ParseError::InvalidMePartitionTable);
        }

        let rev1_header: CpdRev1Header =
            read_le(region).ok_or(ParseError::InvalidMePartitionTable)?;

        let pt_header_size = if rev1_header.header_version == 2 {
            if region.len() < CPD_REV2_HEADER_SIZE {
                self.msg(
                    "parse_cpd_region: CPD too small to fit rev2 partition table header",
                    Some(parent),
                );
                return Err(ParseError::InvalidMePartitionTable);
            }
            CPD_REV2_HEADER_SIZE
        } else {
            CPD_REV1_HEADER_SIZE
        };

        let pt_body_size = rev1_header.num_entries as usize * CPD_ENTRY_SIZE;
        let pt_size = (pt_header_size + pt_body_size) as u32;
        if region.len() < pt_size as usize {
            self.msg(
                "parse_cpd_region: CPD too small to fit the whole partition table",
                Some(parent),
            );
            return Err(ParseError::InvalidMePartitionTable);
        }

        let info = format!(
            "Full size: {}\nHeader size: {}\nBody size: {}\nNumber of entries: {}\nHeader version: {}\nEntry version: {}",
            size_string(pt_size as usize),
            size_string(pt_header_size),
            size_string(pt_body_size),
            rev1_header.num_entries,
            rev1_header.header_version,
            rev1_header.entry_version
        );

        let index = self.add_item(
            local_offset,
            ItemType::CpdStore,
            0,
            "CPD partition table",
            "",
            info,
            region.slice(0, pt_header_size),
            region.slice(pt_header_size, pt_size as usize),
            ByteSpan::empty(),
            true,
            parent,
        );

        // Add the partition table entries
        let mut partitions: Vec<CpdPartitionInfo> = Vec::new();
        let mut offset = pt_header_size as u32;
        for i in 0..rev1_header.num_entries as usize {
            let entry_offset = pt_header_size + i * CPD_ENTRY_SIZE;
            let Some(entry) = read_le_at::<CpdEntry>(region, entry_offset) else {
                break;
            };

            let name = entry.name();
            let info = format!(
                "Full size: {}\nEntry offset: {:X}h\nEntry length: {:X}h\nHuffman compressed: {}",
                size_string(CPD_ENTRY_SIZE),
                entry.offset(),
                entry.length,
                if entry.huffman_compressed() { "Yes" } else { "No" }
            );
            let entry_index = self.add_item(
                offset,
                ItemType::CpdEntry,
                0,
                name.clone(),
                "",
                info,
                ByteSpan::empty(),
                region.slice(entry_offset, entry_offset + CPD_ENTRY_SIZE),
                ByteSpan::empty(),
                true,
                index,
            );
            offset += CPD_ENTRY_SIZE as u32;

            if entry.offset() != 0 && entry.length != 0 {
                partitions.push(CpdPartitionInfo {
                    name,
                    offset: entry.offset(),
                    length: entry.length,
                    huffman_compressed: entry.huffman_compressed(),
                    has_metadata: false,
                    is_padding: false,
                    item: Some(entry_index),
                });
            }
        }

        // Add padding if there are no partitions to add
        if partitions.is_empty() {
            let partition = region.slice_from(pt_size as usize);
            let info = format!("Full size: {}", size_string(partition.len()));
            self.add_item(
                local_offset + pt_size,
                ItemType::Padding,
                padding_type(&partition),
                "Padding",
                "",
                info,
                ByteSpan::empty(),
                partition,
                ByteSpan::empty(),
                true,
                parent,
            );
            return Ok(());
        }

        partitions.sort_by_key(|p| p.offset);

        // Lengths of Huffman-compressed partitions come from the module
        // attributes extension of the matching .met metadata partition; the
        // manifest is index 0, metadata partitions follow it.
        let mut i = 1;
        while i < partitions.len() {
            let met_name = partitions[i].name.clone();
            if !met_name.ends_with(".met") {
                // All metadata partitions are processed
                break;
            }

            // Find the Module Attributes extension and take the compressed
            // size from there
            let mut length = 0xFFFF_FFFFu32; // special guardian value
            let met_start = partitions[i].offset as usize;
            let met_end = core::cmp::min(
                met_start + partitions[i].length as usize,
                region.len(),
            );
            let mut ext_offset = met_start;
            while ext_offset + CPD_EXTENSION_HEADER_SIZE <= met_end {
                let Some(ext) = read_le_at::<CpdExtensionHeader>(region, ext_offset) else {
                    break;
                };
                if ext.length == 0 || ext_offset + ext.length as usize > met_end {
                    break;
                }
                if ext.ext_type == CPD_EXT_TYPE_MODULE_ATTRIBUTES {
                    if let Some(attributes) =
                        read_le_at::<CpdExtModuleAttributes>(region, ext_offset)
                    {
                        length = attributes.compressed_size;
                    }
                }
                ext_offset += ext.length as usize;
            }

            // Search for the corresponding code partition by name
            let code_name = met_name.trim_end_matches(".met").to_string();
            let mut found = false;
            for j in 1..partitions.len() {
                if partitions[j].name == code_name {
                    found = true;
                    if partitions[j].huffman_compressed {
                        partitions[j].length = length;
                    } else if length != 0xFFFF_FFFF && partitions[j].length != length {
                        self.msg(
                            format!(
                                "parse_cpd_region: partition size mismatch between partition table ({:X}h) and partition metadata ({:X}h)",
                                partitions[j].length, length
                            ),
                            partitions[j].item,
                        );
                        partitions[j].length = length; // believe the metadata
                    }
                    partitions[j].has_metadata = true;
                    break;
                }
            }
            if !found {
                self.msg("parse_cpd_region: no code partition", partitions[i].item);
            }

            i += 1;
        }

        // Consistency pass
        let region_size = region.len() as u32;
        loop {
            partitions.sort_by_key(|p| p.offset);

            if partitions[0].offset < pt_size {
                if !partitions[0].is_padding {
                    self.msg(
                        "parse_cpd_region: CPD partition has intersection with CPD partition table, skipped",
                        partitions[0].item,
                    );
                    partitions.remove(0);
                    if partitions.is_empty() {
                        return Ok(());
                    }
                    continue;
                }
            } else if partitions[0].offset > pt_size {
                let padding = CpdPartitionInfo {
                    name: String::new(),
                    offset: pt_size,
                    length: partitions[0].offset - pt_size,
                    huffman_compressed: false,
                    has_metadata: false,
                    is_padding: true,
                    item: None,
                };
                partitions.insert(0, padding);
            }

            let mut restart = false;
            let mut i = 1;
            while i < partitions.len() {
                let previous_end = partitions[i - 1].offset + partitions[i - 1].length;

                if partitions[i].offset as u64 + partitions[i].length as u64 > region_size as u64 {
                    if partitions[i].offset as u64 >= region_size as u64 {
                        self.msg(
                            "parse_cpd_region: CPD partition is located outside of the opened image, skipped",
                            partitions[i].item,
                        );
                        partitions.remove(i);
                        restart = true;
                        break;
                    } else {
                        if !partitions[i].has_metadata && partitions[i].huffman_compressed {
                            self.msg(
                                "parse_cpd_region: CPD partition is compressed but doesn't have metadata and can't fit into its region, length adjusted",
                                partitions[i].item,
                            );
                        } else {
                            self.msg(
                                "parse_cpd_region: CPD partition can't fit into its region, truncated",
                                partitions[i].item,
                            );
                        }
                        partitions[i].length = region_size - partitions[i].offset;
                    }
                }

                if partitions[i].offset < previous_end {
                    // A compressed partition without metadata borrows its end
                    // from the next partition's start
                    if !partitions[i - 1].has_metadata && partitions[i - 1].huffman_compressed {
                        self.msg(
                            "parse_cpd_region: CPD partition is compressed but doesn't have metadata, length adjusted",
                            partitions[i - 1].item,
                        );
                        partitions[i - 1].length = partitions[i].offset - partitions[i - 1].offset;
                        restart = true;
                        break;
                    }

                    if partitions[i].offset + partitions[i].length <= previous_end {
                        self.msg(
                            "parse_cpd_region: CPD partition is located inside another CPD partition, skipped",
                            partitions[i].item,
                        );
                    } else {
                        self.msg(
                            "parse_cpd_region: CPD partition intersects with previous one, skipped",
                            partitions[i].item,
                        );
                    }
                    partitions.remove(i);
                    restart = true;
                    break;
                } else if partitions[i].offset > previous_end {
                    let padding = CpdPartitionInfo {
                        name: String::new(),
                        offset: previous_end,
                        length: partitions[i].offset - previous_end,
                        huffman_compressed: false,
                        has_metadata: false,
                        is_padding: true,
                        item: None,
                    };
                    partitions.insert(i, padding);
                }
                i += 1;
            }
            if restart {
                if partitions.is_empty() {
                    return Ok(());
                }
                continue;
            }
            break;
        }
        // Padding after the last partition
        if let Some(last) = partitions.last() {
            let last_end = last.offset as u64 + last.length as u64;
            if last_end < region_size as u64 {
                partitions.push(CpdPartitionInfo {
                    name: String::new(),
                    offset: last_end as u32,
                    length: region_size - last_end as u32,
                    huffman_compressed: false,
                    has_metadata: false,
                    is_padding: true,
                    item: None,
                });
            }
        }

        // The partition map is consistent now
        for partition in &partitions {
            let data = region
                .slice(partition.offset as usize, (partition.offset + partition.length) as usize);
            if partition.is_padding {
                let info = format!("Full size: {}", size_string(data.len()));
                self.add_item(
                    local_offset + partition.offset,
                    ItemType::Padding,
                    padding_type(&data),
                    "Padding",
                    "",
                    info,
                    ByteSpan::empty(),
                    data,
                    ByteSpan::empty(),
                    true,
                    parent,
                );
                continue;
            }

            // Manifest partition
            if partition.name.ends_with(".man") {
                if !partition.huffman_compressed
                    && partition.length as usize >= CPD_MANIFEST_HEADER_SIZE
                {
                    let Some(manifest) = read_le::<CpdManifestHeader>(&data) else {
                        continue;
                    };
                    if manifest.header_id == CPD_MANIFEST_HEADER_ID {
                        let header_size =
                            core::cmp::min(manifest.header_length as usize * 4, data.len());
                        let info = format!(
                            "Full size: {}\nHeader size: {}\nBody size: {}\nHeader type: {}\nHeader length: {}\nHeader version: {:X}h\nFlags: {:08X}h\nVendor: {:X}h\n\
                             Date: {:X}h\nSize: {}\nVersion: {}.{}.{}.{}\nSecurity version number: {}\nModulus size: {}\nExponent size: {}",
                            size_string(data.len()),
                            size_string(header_size),
                            size_string(data.len() - header_size),
                            manifest.header_type,
                            size_string(manifest.header_length as usize * 4),
                            manifest.header_version,
                            manifest.flags,
                            manifest.vendor,
                            manifest.date,
                            size_string(manifest.size as usize * 4),
                            manifest.version_major,
                            manifest.version_minor,
                            manifest.version_bugfix,
                            manifest.version_build,
                            manifest.security_version,
                            size_string(manifest.modulus_size as usize * 4),
                            size_string(manifest.exponent_size as usize * 4)
                        );
                        let partition_index = self.add_item(
                            local_offset + partition.offset,
                            ItemType::CpdPartition,
                            cpd_partition_subtype::MANIFEST,
                            partition.name.clone(),
                            "",
                            info,
                            data.slice(0, header_size),
                            data.slice_from(header_size),
                            ByteSpan::empty(),
                            true,
                            parent,
                        );
                        self.parse_cpd_extensions_area(partition_index)?;
                    }
                }
            }
            // Metadata partition
            else if partition.name.ends_with(".met") {
                let hash = sha256_digest(&data);
                let info = format!(
                    "Full size: {}\nHuffman compressed: {}\nMetadata hash: {}",
                    size_string(data.len()),
                    if partition.huffman_compressed { "Yes" } else { "No" },
                    to_hex_upper(&hash)
                );
                let partition_index = self.add_item(
                    local_offset + partition.offset,
                    ItemType::CpdPartition,
                    cpd_partition_subtype::METADATA,
                    partition.name.clone(),
                    "",
                    info,
                    ByteSpan::empty(),
                    data.clone(),
                    ByteSpan::empty(),
                    true,
                    parent,
                );
                self.parse_cpd_extensions_area(partition_index)?;
            }
            // Code partition
            else {
                let hash = sha256_digest(&data);
                let info = format!(
                    "Full size: {}\nHuffman compressed: {}\nHash: {}",
                    size_string(data.len()),
                    if partition.huffman_compressed { "Yes" } else { "No" },
                    to_hex_upper(&hash)
                );
                let code_index = self.add_item(
                    local_offset + partition.offset,
                    ItemType::CpdPartition,
                    cpd_partition_subtype::CODE,
                    partition.name.clone(),
                    "",
                    info,
                    ByteSpan::empty(),
                    data.clone(),
                    ByteSpan::empty(),
                    true,
                    parent,
                );
                let _ = self.parse_raw_area(code_index);
            }
        }

        Ok(())
    }

    fn parse_cpd_extensions_area(&mut self, index: ItemId) -> Result<(), ParseError> {
        let body = self.model.body(index).clone();
        let mut offset = 0usize;
        while offset + CPD_EXTENSION_HEADER_SIZE <= body.len() {
            let Some(ext) = read_le_at::<CpdExtensionHeader>(&body, offset) else {
                break;
            };
            if ext.length == 0 || ext.length as usize > body.len() - offset {
                break;
            }
            let partition = body.slice(offset, offset + ext.length as usize);

            let name = cpd_extension_type_name(ext.ext_type);
            let ext_index;

            // Signed package info parses a bit further
            if ext.ext_type == CPD_EXT_TYPE_SIGNED_PACKAGE_INFO
                && partition.len() >= CPD_EXT_SIGNED_PACKAGE_INFO_SIZE
            {
                let Some(info_header) = read_le::<CpdExtSignedPackageInfo>(&partition) else {
                    break;
                };
                let info = format!(
                    "Full size: {}\nHeader size: {}\nBody size: {}\nType: {:X}h\n\
                     Package name: {}\nVersion control number: {:X}h\nSecurity version number: {:X}h\nUsage bitmap: {}",
                    size_string(partition.len()),
                    size_string(CPD_EXT_SIGNED_PACKAGE_INFO_SIZE),
                    size_string(partition.len() - CPD_EXT_SIGNED_PACKAGE_INFO_SIZE),
                    info_header.ext_type,
                    partition_name(&info_header.package_name),
                    info_header.vcn,
                    info_header.svn,
                    to_hex_upper(&info_header.usage_bitmap)
                );
                ext_index = self.add_item(
                    offset as u32,
                    ItemType::CpdExtension,
                    0,
                    name,
                    "",
                    info,
                    partition.slice(0, CPD_EXT_SIGNED_PACKAGE_INFO_SIZE),
                    partition.slice_from(CPD_EXT_SIGNED_PACKAGE_INFO_SIZE),
                    ByteSpan::empty(),
                    true,
                    index,
                );
                self.parse_signed_package_info_data(ext_index)?;
            }
            // IFWI partition manifest parses a bit further
            else if ext.ext_type == CPD_EXT_TYPE_IFWI_PARTITION_MANIFEST
                && partition.len() >= CPD_EXT_IFWI_PARTITION_MANIFEST_SIZE
            {
                let Some(manifest) = read_le::<CpdExtIfwiPartitionManifest>(&partition) else {
                    break;
                };

                // Check HashSize to be sane
                let mut hash_size = manifest.hash_size() as usize;
                let mut msg_hash_size_mismatch = false;
                if hash_size > manifest.complete_partition_hash.len() {
                    hash_size = manifest.complete_partition_hash.len();
                    msg_hash_size_mismatch = true;
                }

                // The hash is stored reversed
                let mut hash = manifest.complete_partition_hash[..hash_size].to_vec();
                hash.reverse();

                let info = format!(
                    "Full size: {}\nType: {:X}h\nPartition name: {}\nPartition length: {:X}h\nPartition version major: {:X}h\nPartition version minor: {:X}h\n\
                     Data format version: {:X}h\nInstance ID: {:X}h\nHash algorithm: {:X}h\nHash size: {:X}h\nAction on update: {:X}h\n\
                     Support multiple instances: {}\nSupport API version based update: {}\nObey full update rules: {}\nIFR enable only: {}\n\
                     Allow cross point update: {}\nAllow cross hotfix update: {}\nPartial update only: {}\nPartition hash: {}",
                    size_string(partition.len()),
                    manifest.ext_type,
                    partition_name(&manifest.partition_name),
                    manifest.complete_partition_length,
                    manifest.partition_version_major,
                    manifest.partition_version_minor,
                    manifest.data_format_version,
                    manifest.instance_id,
                    manifest.hash_algorithm(),
                    manifest.hash_size(),
                    manifest.action_on_update(),
                    if manifest.support_multiple_instances() { "Yes" } else { "No" },
                    if manifest.support_api_version_based_update() { "Yes" } else { "No" },
                    if manifest.obey_full_update_rules() { "Yes" } else { "No" },
                    if manifest.ifr_enable_only() { "Yes" } else { "No" },
                    if manifest.allow_cross_point_update() { "Yes" } else { "No" },
                    if manifest.allow_cross_hotfix_update() { "Yes" } else { "No" },
                    if manifest.partial_update_only() { "Yes" } else { "No" },
                    to_hex_upper(&hash)
                );
                ext_index = self.add_item(
                    offset as u32,
                    ItemType::CpdExtension,
                    0,
                    name,
                    "",
                    info,
                    ByteSpan::empty(),
                    partition.clone(),
                    ByteSpan::empty(),
                    true,
                    index,
                );
                if msg_hash_size_mismatch {
                    self.msg(
                        format!(
                            "parse_cpd_extensions_area: IFWI Partition Manifest hash size is {}, maximum allowed is {}, truncated",
                            manifest.hash_size(),
                            manifest.complete_partition_hash.len()
                        ),
                        Some(ext_index),
                    );
                }
            }
            // Module attributes parses a bit further
            else if ext.ext_type == CPD_EXT_TYPE_MODULE_ATTRIBUTES
                && partition.len() >= CPD_EXT_MODULE_ATTRIBUTES_HASH_OFFSET
            {
                let Some(attributes) = read_le::<CpdExtModuleAttributes>(&partition) else {
                    break;
                };

                // The hash fills the rest of the record, stored reversed
                let mut hash = partition[CPD_EXT_MODULE_ATTRIBUTES_HASH_OFFSET..].to_vec();
                hash.reverse();

                let info = format!(
                    "Full size: {}\nType: {:X}h\nCompression type: {:X}h\nUncompressed size: {}\nCompressed size: {}\nGlobal module ID: {:X}h\nImage hash: {}",
                    size_string(partition.len()),
                    attributes.ext_type,
                    attributes.compression_type,
                    size_string(attributes.uncompressed_size as usize),
                    size_string(attributes.compressed_size as usize),
                    attributes.global_module_id,
                    to_hex_upper(&hash)
                );
                ext_index = self.add_item(
                    offset as u32,
                    ItemType::CpdExtension,
                    0,
                    name,
                    "",
                    info,
                    ByteSpan::empty(),
                    partition.clone(),
                    ByteSpan::empty(),
                    true,
                    index,
                );
            }
            // Everything else is an opaque extension record
            else {
                let info = format!(
                    "Full size: {}\nType: {:X}h",
                    size_string(partition.len()),
                    ext.ext_type
                );
                ext_index = self.add_item(
                    offset as u32,
                    ItemType::CpdExtension,
                    0,
                    name,
                    "",
                    info,
                    ByteSpan::empty(),
                    partition.clone(),
                    ByteSpan::empty(),
                    true,
                    index,
                );
            }

            if ext.ext_type > CPD_EXT_TYPE_TBT_METADATA
                && ext.ext_type != CPD_EXT_TYPE_GMF_CERTIFICATE
                && ext.ext_type != CPD_EXT_TYPE_GMF_BODY
                && ext.ext_type != CPD_EXT_TYPE_KEY_MANIFEST_EXT
                && ext.ext_type != CPD_EXT_TYPE_SIGNED_PACKAGE_INFO_EXT
                && ext.ext_type != CPD_EXT_TYPE_SPS_PLATFORM_ID
            {
                self.msg(
                    "parse_cpd_extensions_area: CPD extension of unknown type found",
                    Some(ext_index),
                );
            }

            offset += ext.length as usize;
        }

        Ok(())
    }

    fn parse_signed_package_info_data(&mut self, index: ItemId) -> Result<(), ParseError> {
        let body = self.model.body(index).clone();
        let mut offset = 0usize;
        while offset + CPD_EXT_SIGNED_PACKAGE_INFO_MODULE_HASH_OFFSET <= body.len() {
            let Some(module) = read_le_at::<CpdExtSignedPackageInfoModule>(&body, offset) else {
                break;
            };
            let module_size =
                CPD_EXT_SIGNED_PACKAGE_INFO_MODULE_HASH_OFFSET + module.hash_size as usize;
            if offset + module_size > body.len() {
                break;
            }

            // The metadata hash is stored reversed
            let mut hash = body[offset + CPD_EXT_SIGNED_PACKAGE_INFO_MODULE_HASH_OFFSET
                ..offset + module_size]
                .to_vec();
            hash.reverse();

            let name = partition_name(&module.name);
            let info = format!(
                "Full size: {}\nType: {:X}h\nHash algorithm: {:X}h\nHash size: {}\nMetadata size: {}\nMetadata hash: {}",
                size_string(module_size),
                module.module_type,
                module.hash_algorithm,
                size_string(module.hash_size as usize),
                size_string(module.metadata_size as usize),
                to_hex_upper(&hash)
            );
            self.add_item(
                offset as u32,
                ItemType::CpdSpiEntry,
                0,
                name,
                "",
                info,
                ByteSpan::empty(),
                body.slice(offset, offset + module_size),
                ByteSpan::empty(),
                true,
                index,
            );
            offset += module_size;
        }

        Ok(())
    }
}
