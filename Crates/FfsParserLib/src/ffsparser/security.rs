//! Second-pass processing: physical addresses, reset vector data, protected
//! range verification and marking, and TE image base classification.

use scroll::Pread;
use tree_model_lib::{ItemId, ItemType, Marking, ParsingData, TeSectionParsingData};
use tree_model_lib::{TE_BASE_ADJUSTED, TE_BASE_ORIGINAL, TE_BASE_OTHER};
use uuid::Uuid;

use crate::basetypes::read_le;
use crate::error::ParseError;
use crate::ffs::{
    BG_VENDOR_HASH_FILE_SIGNATURE_PHOENIX, EFI_SECTION_TE,
    PROTECTED_RANGE_VENDOR_HASH_FILE_GUID_AMI, PROTECTED_RANGE_VENDOR_HASH_FILE_GUID_PHOENIX,
};
use crate::intel_fit::{
    X86ResetVectorData, TCG_HASH_ALGORITHM_ID_SHA256, X86_RESET_VECTOR_DATA_SIZE,
};
use crate::utility::{sha256_digest, tcg_digest, to_hex_upper};

use super::{
    FfsParser, ProtectedRange, PROTECTED_RANGE_INTEL_BOOT_GUARD_IBB,
    PROTECTED_RANGE_INTEL_BOOT_GUARD_POST_IBB, PROTECTED_RANGE_VENDOR_HASH_AMI_V1,
    PROTECTED_RANGE_VENDOR_HASH_AMI_V2, PROTECTED_RANGE_VENDOR_HASH_MICROSOFT_PMDA,
    PROTECTED_RANGE_VENDOR_HASH_PHOENIX,
};

// PROTECTED_RANGE_VENDOR_HASH_FILE_HEADER_PHOENIX
#[repr(C)]
#[derive(Debug, Copy, Clone, Pread)]
struct PhoenixHashFileHeader {
    signature: u64,
    num_entries: u32,
}

const PHOENIX_HASH_FILE_HEADER_SIZE: usize = 12;

// PROTECTED_RANGE_VENDOR_HASH_FILE_ENTRY
#[repr(C)]
#[derive(Debug, Copy, Clone, Pread)]
struct PhoenixHashFileEntry {
    base: u32,
    size: u32,
    hash: [u8; 32],
}

const PHOENIX_HASH_FILE_ENTRY_SIZE: usize = 40;

// PROTECTED_RANGE_VENDOR_HASH_FILE_HEADER_AMI_V1
#[repr(C)]
#[derive(Debug, Copy, Clone, Pread)]
struct AmiHashFileV1 {
    size: u32,
    hash: [u8; 32],
}

const AMI_HASH_FILE_V1_SIZE: usize = 36;

// One range record of an AMI v2 hash file
#[repr(C)]
#[derive(Debug, Copy, Clone, Pread)]
struct AmiHashFileRange {
    base: u32,
    size: u32,
    hash: [u8; 32],
}

// PROTECTED_RANGE_VENDOR_HASH_FILE_HEADER_AMI_V2
#[repr(C)]
#[derive(Debug, Copy, Clone, Pread)]
struct AmiHashFileV2 {
    hash0: AmiHashFileRange,
    hash1: AmiHashFileRange,
}

const AMI_HASH_FILE_V2_SIZE: usize = 80;

impl FfsParser {
    pub(crate) fn parse_vendor_hash_file(
        &mut self,
        file_guid: Uuid,
        index: ItemId,
    ) -> Result<(), ParseError> {
        if file_guid == PROTECTED_RANGE_VENDOR_HASH_FILE_GUID_PHOENIX {
            let body = self.model.body(index).clone();

            // File too small to even have the signature
            if body.len() < 8 {
                self.msg(
                    "parse_vendor_hash_file: unknown or corrupted Phoenix hash file found",
                    Some(index),
                );
                self.model.set_text(index, "Phoenix hash file");
                return Err(ParseError::InvalidFile);
            }

            let signature = u64::from_le_bytes(body[..8].try_into().unwrap());
            if signature == BG_VENDOR_HASH_FILE_SIGNATURE_PHOENIX {
                let Some(header) = read_le::<PhoenixHashFileHeader>(&body) else {
                    return Err(ParseError::InvalidFile);
                };
                let entries_size = PHOENIX_HASH_FILE_HEADER_SIZE
                    + header.num_entries as usize * PHOENIX_HASH_FILE_ENTRY_SIZE;
                if body.len() < PHOENIX_HASH_FILE_HEADER_SIZE || body.len() < entries_size {
                    self.msg(
                        "parse_vendor_hash_file: unknown or corrupted Phoenix hash file found",
                        Some(index),
                    );
                    self.model.set_text(index, "Phoenix hash file");
                    return Err(ParseError::InvalidFile);
                }

                if header.num_entries > 0 {
                    let mut security_info = format!(
                        "Phoenix hash file found at base {:08X}h\nProtected ranges:",
                        self.model.base(index)
                    );
                    for i in 0..header.num_entries as usize {
                        let offset =
                            PHOENIX_HASH_FILE_HEADER_SIZE + i * PHOENIX_HASH_FILE_ENTRY_SIZE;
                        let Some(entry) = crate::basetypes::read_le_at::<PhoenixHashFileEntry>(
                            &body, offset,
                        ) else {
                            break;
                        };
                        self.protected_ranges.push(ProtectedRange {
                            offset: entry.base,
                            size: entry.size,
                            algorithm_id: TCG_HASH_ALGORITHM_ID_SHA256,
                            range_type: PROTECTED_RANGE_VENDOR_HASH_PHOENIX,
                            hash: entry.hash.to_vec(),
                        });
                        security_info += &format!(
                            "RelativeOffset: {:08X}h Size: {:X}h\nHash: {}\n",
                            entry.base,
                            entry.size,
                            to_hex_upper(&entry.hash)
                        );
                    }
                    security_info += "\n";
                    self.security_info += &security_info;

                    self.msg("parse_vendor_hash_file: Phoenix hash file found", Some(index));
                } else {
                    self.msg(
                        "parse_vendor_hash_file: empty Phoenix hash file found",
                        Some(index),
                    );
                }

                self.model.set_text(index, "Phoenix hash file");
            }
            Ok(())
        } else if file_guid == PROTECTED_RANGE_VENDOR_HASH_FILE_GUID_AMI {
            // Here `index` is the raw section, its parent is the hash file
            let file_index = self.model.parent(index).unwrap_or(index);
            let body = self.model.body(index).clone();

            if body.count_byte(0xFF) != body.len() {
                if body.len() == AMI_HASH_FILE_V2_SIZE {
                    let Some(header) = read_le::<AmiHashFileV2>(&body) else {
                        return Err(ParseError::InvalidFile);
                    };

                    self.security_info += &format!(
                        "AMI hash file v2 found at base {:08X}h\nProtected ranges:",
                        self.model.base(file_index)
                    );
                    for range in [&header.hash0, &header.hash1] {
                        self.security_info += &format!(
                            "\nAddress: {:08X}h, Size: {:X}h\nHash (SHA256): {}",
                            range.base,
                            range.size,
                            to_hex_upper(&range.hash)
                        );
                    }
                    self.security_info += "\n";

                    for range in [&header.hash0, &header.hash1] {
                        if range.base != 0
                            && range.size != 0
                            && range.base != 0xFFFF_FFFF
                            && range.size != 0xFFFF_FFFF
                        {
                            self.protected_ranges.push(ProtectedRange {
                                offset: range.base,
                                size: range.size,
                                algorithm_id: TCG_HASH_ALGORITHM_ID_SHA256,
                                range_type: PROTECTED_RANGE_VENDOR_HASH_AMI_V2,
                                hash: range.hash.to_vec(),
                            });
                        }
                    }

                    self.msg("parse_vendor_hash_file: new AMI hash file found", Some(file_index));
                } else if body.len() == AMI_HASH_FILE_V1_SIZE {
                    let Some(header) = read_le::<AmiHashFileV1>(&body) else {
                        return Err(ParseError::InvalidFile);
                    };

                    self.security_info += &format!(
                        "AMI hash file v1 found at base {:08X}h\nProtected range:\nSize: {:X}h\nHash (SHA256): {}\n\n",
                        self.model.base(file_index),
                        header.size,
                        to_hex_upper(&header.hash)
                    );

                    if header.size != 0 && header.size != 0xFFFF_FFFF {
                        self.protected_ranges.push(ProtectedRange {
                            offset: 0,
                            size: header.size,
                            algorithm_id: TCG_HASH_ALGORITHM_ID_SHA256,
                            range_type: PROTECTED_RANGE_VENDOR_HASH_AMI_V1,
                            hash: header.hash.to_vec(),
                        });
                    }

                    self.msg("parse_vendor_hash_file: old AMI hash file found", Some(file_index));
                } else {
                    self.msg(
                        "parse_vendor_hash_file: unknown or corrupted AMI hash file found",
                        Some(index),
                    );
                }
            } else {
                self.msg("parse_vendor_hash_file: empty AMI hash file found", Some(file_index));
            }

            self.model.set_text(file_index, "AMI hash file");
            Ok(())
        } else {
            Ok(())
        }
    }

    pub(crate) fn perform_second_pass(&mut self, root: ItemId) {
        let Some(last_vtf) = self.last_vtf else {
            return;
        };

        // A compressed VTF cannot be used to anchor physical addresses
        if self.model.compressed(last_vtf) {
            self.msg(
                "perform_second_pass: the last VTF appears inside compressed item, the image may be damaged",
                Some(last_vtf),
            );
            return;
        }

        // Calculate the address difference: the last byte of the last VTF is
        // mapped to physical address 0xFFFFFFFF
        let vtf_size = self.model.full_size(last_vtf) as u64;
        self.address_diff =
            0x1_0000_0000u64.wrapping_sub(self.model.base(last_vtf) as u64 + vtf_size);
        log::debug!("address difference {:X}h", self.address_diff);

        // Parse reset vector data
        self.parse_reset_vector_data();

        // Find and parse FIT
        self.parse_fit(root);

        // Check protected ranges
        self.check_protected_ranges(root);

        // Check TE sections for having original or adjusted base
        self.check_te_image_base(root);
    }

    fn parse_reset_vector_data(&mut self) {
        let Some(last_vtf) = self.last_vtf else {
            return;
        };

        let vtf = self.item_bytes(last_vtf);
        if vtf.len() < X86_RESET_VECTOR_DATA_SIZE {
            return;
        }

        let offset = vtf.len() - X86_RESET_VECTOR_DATA_SIZE;
        let Some(data) = crate::basetypes::read_le_at::<X86ResetVectorData>(&vtf, offset) else {
            return;
        };

        let info = format!(
            "\nAP entry vector: {:02X} {:02X} {:02X} {:02X} {:02X} {:02X} {:02X} {:02X}\n\
             Reset vector: {:02X} {:02X} {:02X} {:02X} {:02X} {:02X} {:02X} {:02X}\n\
             PEI core entry point: {:08X}h\nAP startup segment: {:08X}h\nBootFV base address: {:08X}h\n",
            data.ap_entry_vector[0],
            data.ap_entry_vector[1],
            data.ap_entry_vector[2],
            data.ap_entry_vector[3],
            data.ap_entry_vector[4],
            data.ap_entry_vector[5],
            data.ap_entry_vector[6],
            data.ap_entry_vector[7],
            data.reset_vector[0],
            data.reset_vector[1],
            data.reset_vector[2],
            data.reset_vector[3],
            data.reset_vector[4],
            data.reset_vector[5],
            data.reset_vector[6],
            data.reset_vector[7],
            data.pei_core_entry_point,
            data.ap_startup_segment,
            data.boot_fv_base_address
        );
        self.model.add_info(last_vtf, &info, true);
    }

    fn check_te_image_base(&mut self, index: ItemId) {
        // Determine the relocation type of uncompressed TE image sections
        if !self.model.compressed(index)
            && self.model.item_type(index) == ItemType::Section
            && self.model.subtype(index) == EFI_SECTION_TE
        {
            let (original_image_base, adjusted_image_base) = match self.model.parsing_data(index)
            {
                ParsingData::TeSection(pdata) => {
                    (pdata.original_image_base, pdata.adjusted_image_base)
                }
                _ => (0, 0),
            };

            if original_image_base != 0 || adjusted_image_base != 0 {
                // The data memory address must equal either the original or
                // the adjusted image base
                let address = self.address_diff + self.model.base(index) as u64;
                let base = (address + self.model.header(index).len() as u64) as u32;

                let mut image_base_type = TE_BASE_OTHER;
                if original_image_base == base {
                    image_base_type = TE_BASE_ORIGINAL;
                } else if adjusted_image_base == base {
                    image_base_type = TE_BASE_ADJUSTED;
                } else {
                    // Tolerate a single-bit difference, seen in top-swap
                    // capable images
                    let xored = base ^ original_image_base;
                    if xored & (xored.wrapping_sub(1)) == 0 {
                        image_base_type = TE_BASE_ORIGINAL;
                    } else {
                        let xored = base ^ adjusted_image_base;
                        if xored & (xored.wrapping_sub(1)) == 0 {
                            image_base_type = TE_BASE_ADJUSTED;
                        }
                    }
                }

                if image_base_type == TE_BASE_OTHER {
                    self.msg(
                        "check_te_image_base: TE image base is neither zero, nor original, nor adjusted, nor top-swapped",
                        Some(index),
                    );
                }

                self.model.set_parsing_data(
                    index,
                    ParsingData::TeSection(TeSectionParsingData {
                        image_base_type,
                        original_image_base,
                        adjusted_image_base,
                    }),
                );
            }
        }

        for child in self.model.children(index).to_vec() {
            self.check_te_image_base(child);
        }
    }

    pub(crate) fn add_info_recursive(&mut self, index: ItemId) {
        // Add the offset
        self.model
            .add_info(index, &format!("Offset: {:X}h\n", self.model.offset(index)), false);

        // Add the current base when the item is not compressed, or is the
        // outermost item of a compressed chain
        let parent = self.model.parent(index);
        let parent_uncompressed =
            parent.map(|p| !self.model.compressed(p)).unwrap_or(false);
        if !self.model.compressed(index) || parent_uncompressed {
            // Add the physical address of the whole item, or of its header
            // and data portions separately
            let address = self.address_diff + self.model.base(index) as u64;
            if address <= 0xFFFF_FFFF {
                let header_size = self.model.header(index).len();
                if header_size != 0 {
                    self.model.add_info(
                        index,
                        &format!("Data address: {:08X}h\n", address as u32 + header_size as u32),
                        false,
                    );
                    self.model.add_info(
                        index,
                        &format!("Header address: {:08X}h\n", address as u32),
                        false,
                    );
                } else {
                    self.model.add_info(
                        index,
                        &format!("Address: {:08X}h\n", address as u32),
                        false,
                    );
                }
            }
            // Add the base
            self.model
                .add_info(index, &format!("Base: {:X}h\n", self.model.base(index)), false);
        }
        self.model.add_info(
            index,
            &format!("Fixed: {}\n", if self.model.fixed(index) { "Yes" } else { "No" }),
            false,
        );

        for child in self.model.children(index).to_vec() {
            self.add_info_recursive(child);
        }
    }

    fn image_bytes(&self, offset: u32, size: u32) -> Vec<u8> {
        let start = core::cmp::min(offset as usize, self.opened_image.len());
        let end = core::cmp::min(offset as usize + size as usize, self.opened_image.len());
        self.opened_image[start..end].to_vec()
    }

    fn check_protected_ranges(&mut self, index: ItemId) {
        let mut ranges = self.protected_ranges.clone();

        // Calculate the digest over all Boot Guard IBB ranges together
        let mut protected_parts = Vec::new();
        let mut bg_protected_range_found = false;
        for range in ranges.iter_mut() {
            if range.range_type == PROTECTED_RANGE_INTEL_BOOT_GUARD_IBB && range.size > 0 {
                bg_protected_range_found = true;
                if range.offset as u64 >= self.address_diff {
                    range.offset -= self.address_diff as u32;
                } else {
                    self.msg(
                        "check_protected_ranges: suspicious protected range offset",
                        Some(index),
                    );
                }
                protected_parts.extend_from_slice(&self.image_bytes(range.offset, range.size));
                self.mark_protected_range_recursive(index, range);
            }
        }

        if bg_protected_range_found {
            let mut ibb_digests = String::new();
            for (name, algorithm_id) in [
                ("SHA1", crate::intel_fit::TCG_HASH_ALGORITHM_ID_SHA1),
                ("SHA256", crate::intel_fit::TCG_HASH_ALGORITHM_ID_SHA256),
                ("SHA384", crate::intel_fit::TCG_HASH_ALGORITHM_ID_SHA384),
                ("SHA512", crate::intel_fit::TCG_HASH_ALGORITHM_ID_SHA512),
                ("SM3", crate::intel_fit::TCG_HASH_ALGORITHM_ID_SM3),
            ] {
                if let Some(digest) = tcg_digest(algorithm_id, &protected_parts) {
                    ibb_digests += &format!(
                        "Computed IBB Hash ({}): {}\n",
                        name,
                        to_hex_upper(&digest)
                    );
                }
            }
            self.security_info += &ibb_digests;
            self.security_info += "\n";
        }

        // Check the digests of vendor-protected ranges
        for range in ranges.iter_mut() {
            if range.range_type == PROTECTED_RANGE_VENDOR_HASH_AMI_V1 {
                let Some(dxe_root_volume) = self
                    .dxe_core
                    .and_then(|core| self.model.find_last_parent_of_type(core, ItemType::Volume))
                else {
                    self.msg(
                        "check_protected_ranges: can't determine DXE volume offset, old AMI protected range hash can't be checked",
                        Some(index),
                    );
                    continue;
                };

                // The range starts at the root volume holding the first DXE core
                range.offset = self.model.base(dxe_root_volume);
                let protected_parts = self.image_bytes(range.offset, range.size);
                let digest = sha256_digest(&protected_parts);
                if digest != range.hash {
                    let found = self.model.find_by_base(range.offset);
                    self.msg(
                        format!(
                            "check_protected_ranges: old AMI protected range [{:X}h:{:X}h] hash mismatch, opened image may refuse to boot",
                            range.offset,
                            range.offset + range.size
                        ),
                        found,
                    );
                }
                self.mark_protected_range_recursive(index, range);
            } else if range.range_type == PROTECTED_RANGE_INTEL_BOOT_GUARD_POST_IBB {
                let Some(dxe_root_volume) = self
                    .dxe_core
                    .and_then(|core| self.model.find_last_parent_of_type(core, ItemType::Volume))
                else {
                    self.msg(
                        "check_protected_ranges: can't determine DXE volume offset, post-IBB protected range hash can't be checked",
                        Some(index),
                    );
                    continue;
                };

                // The range covers the whole root volume holding the first
                // DXE core
                range.offset = self.model.base(dxe_root_volume);
                range.size = self.model.full_size(dxe_root_volume) as u32;
                let protected_parts = self.image_bytes(range.offset, range.size);

                match tcg_digest(range.algorithm_id, &protected_parts) {
                    None => {
                        let found = self.model.find_by_base(range.offset);
                        self.msg(
                            format!(
                                "check_protected_ranges: post-IBB protected range [{:X}h:{:X}h] uses unknown hash algorithm {:04X}h",
                                range.offset,
                                range.offset + range.size,
                                range.algorithm_id
                            ),
                            found,
                        );
                    }
                    Some(digest) => {
                        if digest != range.hash {
                            let found = self.model.find_by_base(range.offset);
                            self.msg(
                                format!(
                                    "check_protected_ranges: post-IBB protected range [{:X}h:{:X}h] hash mismatch, opened image may refuse to boot",
                                    range.offset,
                                    range.offset + range.size
                                ),
                                found,
                            );
                        }
                    }
                }
                self.mark_protected_range_recursive(index, range);
            } else if range.range_type == PROTECTED_RANGE_VENDOR_HASH_AMI_V2 {
                if range.offset as u64 >= self.address_diff {
                    range.offset -= self.address_diff as u32;
                    let protected_parts = self.image_bytes(range.offset, range.size);
                    let digest = sha256_digest(&protected_parts);
                    if digest != range.hash {
                        let found = self.model.find_by_base(range.offset);
                        self.msg(
                            format!(
                                "check_protected_ranges: AMI protected range [{:X}h:{:X}h] hash mismatch, opened image may refuse to boot",
                                range.offset,
                                range.offset + range.size
                            ),
                            found,
                        );
                    }
                    self.mark_protected_range_recursive(index, range);
                } else {
                    self.msg(
                        "check_protected_ranges: suspicious AMI new BG protection offset",
                        Some(index),
                    );
                }
            } else if range.range_type == PROTECTED_RANGE_VENDOR_HASH_PHOENIX
                && range.size != 0
                && range.size != 0xFFFF_FFFF
                && range.offset != 0xFFFF_FFFF
            {
                range.offset = range.offset.wrapping_add(self.protected_regions_base as u32);
                let protected_parts = self.image_bytes(range.offset, range.size);
                let digest = sha256_digest(&protected_parts);
                if digest != range.hash {
                    let found = self.model.find_by_base(range.offset);
                    self.msg(
                        format!(
                            "check_protected_ranges: Phoenix protected range [{:X}h:{:X}h] hash mismatch, opened image may refuse to boot",
                            range.offset,
                            range.offset + range.size
                        ),
                        found,
                    );
                }
                self.mark_protected_range_recursive(index, range);
            } else if range.range_type == PROTECTED_RANGE_VENDOR_HASH_MICROSOFT_PMDA
                && range.size != 0
                && range.size != 0xFFFF_FFFF
                && range.offset != 0
                && range.offset != 0xFFFF_FFFF
            {
                range.offset = range.offset.wrapping_sub(self.address_diff as u32);
                let protected_parts = self.image_bytes(range.offset, range.size);

                match tcg_digest(range.algorithm_id, &protected_parts) {
                    None => {
                        let found = self.model.find_by_base(range.offset);
                        self.msg(
                            format!(
                                "check_protected_ranges: Microsoft PMDA protected range [{:X}h:{:X}h] uses unknown hash algorithm {:04X}h",
                                range.offset,
                                range.offset + range.size,
                                range.algorithm_id
                            ),
                            found,
                        );
                    }
                    Some(digest) => {
                        if digest != range.hash {
                            let found = self.model.find_by_base(range.offset);
                            self.msg(
                                format!(
                                    "check_protected_ranges: Microsoft PMDA protected range [{:X}h:{:X}h] hash mismatch, opened image may refuse to boot",
                                    range.offset,
                                    range.offset + range.size
                                ),
                                found,
                            );
                        }
                    }
                }
                self.mark_protected_range_recursive(index, range);
            }
        }
    }

    fn mark_protected_range_recursive(&mut self, index: ItemId, range: &ProtectedRange) {
        // Marks cross into compressed children by inheriting the parent's
        let parent = self.model.parent(index);
        if let Some(parent) = parent {
            if self.model.compressed(index) && self.model.compressed(parent) {
                let inherited = self.model.marking(parent);
                self.model.set_marking(index, inherited);
            } else {
                self.mark_by_overlap(index, range);
            }
        } else {
            self.mark_by_overlap(index, range);
        }

        for child in self.model.children(index).to_vec() {
            self.mark_protected_range_recursive(child, range);
        }
    }

    fn mark_by_overlap(&mut self, index: ItemId, range: &ProtectedRange) {
        let current_offset = self.model.base(index) as u64;
        let current_size = self.model.full_size(index) as u64;
        let range_offset = range.offset as u64;
        let range_size = range.size as u64;

        let overlap_end = core::cmp::min(current_offset + current_size, range_offset + range_size);
        let overlap_start = core::cmp::max(current_offset, range_offset);
        if overlap_end > overlap_start {
            if range_offset <= current_offset
                && current_offset + current_size <= range_offset + range_size
            {
                // Fully inside the range
                if range.range_type == PROTECTED_RANGE_INTEL_BOOT_GUARD_IBB {
                    self.model.set_marking(index, Marking::Red);
                } else {
                    self.model.set_marking(index, Marking::Cyan);
                }
            } else {
                // Partially inside the range
                self.model.set_marking(index, Marking::Yellow);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_file_struct_sizes() {
        assert_eq!(PHOENIX_HASH_FILE_HEADER_SIZE, 12);
        assert_eq!(PHOENIX_HASH_FILE_ENTRY_SIZE, 40);
        assert_eq!(AMI_HASH_FILE_V1_SIZE, 36);
        assert_eq!(AMI_HASH_FILE_V2_SIZE, 80);
    }
}
