//! Firmware Interface Table parsing and Boot Guard manifest decoding.
//!
//! Runs during the second pass, after the address difference is known: the
//! FIT pointer lives at physical address 0xFFFFFFC0 and every FIT entry
//! addresses components by physical address.

use tree_model_lib::ItemId;

use crate::basetypes::{calculate_sum8, read_le_at};
use crate::ffsparser::{
    FfsParser, FitTableRow, ProtectedRange, PROTECTED_RANGE_INTEL_BOOT_GUARD_IBB,
    PROTECTED_RANGE_VENDOR_HASH_MICROSOFT_PMDA,
};
use crate::intel_fit::*;
use crate::intel_microcode::{IntelMicrocodeHeader, INTEL_MICROCODE_HEADER_SIZE};
use crate::utility::to_hex_upper;

impl FfsParser {
    /// Translate a physical address to an offset in the opened image.
    fn physical_to_offset(&self, address: u64) -> Option<usize> {
        if address < self.address_diff {
            return None;
        }
        let offset = (address - self.address_diff) as usize;
        if offset >= self.opened_image.len() {
            return None;
        }
        Some(offset)
    }

    pub(crate) fn parse_fit(&mut self, _root: ItemId) {
        // Read the FIT pointer
        let Some(pointer_offset) = self.physical_to_offset(0x1_0000_0000 - INTEL_FIT_POINTER_OFFSET as u64)
        else {
            return;
        };
        if pointer_offset + 4 > self.opened_image.len() {
            return;
        }
        let fit_address = u32::from_le_bytes(
            self.opened_image[pointer_offset..pointer_offset + 4].try_into().unwrap(),
        ) as u64;

        // Translate it to an offset and check the signature
        let Some(fit_offset) = self.physical_to_offset(fit_address) else {
            return;
        };
        if fit_offset + INTEL_FIT_ENTRY_SIZE > self.opened_image.len() {
            return;
        }
        let signature = u64::from_le_bytes(
            self.opened_image[fit_offset..fit_offset + 8].try_into().unwrap(),
        );
        if signature != INTEL_FIT_SIGNATURE {
            return;
        }

        let image = self.opened_image.clone();
        let fit_item = self.model.find_by_base(fit_offset as u32);

        // FIT header entry
        let Some(header) = read_le_at::<IntelFitEntry>(&image, fit_offset) else {
            return;
        };
        let num_entries = header.size() as usize;
        if num_entries == 0
            || fit_offset + num_entries * INTEL_FIT_ENTRY_SIZE > self.opened_image.len()
        {
            self.msg("parse_fit: invalid FIT table size", fit_item);
            return;
        }
        if header.version != INTEL_FIT_HEADER_VERSION {
            self.msg(
                format!("parse_fit: unknown FIT header version {:04X}h", header.version),
                fit_item,
            );
        }

        // When the header checksum is declared valid, the whole table must
        // sum to zero
        if header.checksum_valid() {
            let table = &image[fit_offset..fit_offset + num_entries * INTEL_FIT_ENTRY_SIZE];
            if calculate_sum8(table) != 0 {
                self.msg("parse_fit: invalid FIT table checksum", fit_item);
            }
        }

        // Add the header row
        self.fit_table.push(FitTableRow {
            address: format!("{:08X}h", fit_address),
            size: format!("{:08X}h", num_entries * INTEL_FIT_ENTRY_SIZE),
            version: format!("{:04X}h", header.version),
            checksum: format!("{:02X}h", header.checksum),
            type_name: fit_entry_type_name(INTEL_FIT_TYPE_HEADER),
            info: String::new(),
            item: fit_item,
        });

        // Decode the rest of the entries
        let mut previous_type = INTEL_FIT_TYPE_HEADER;
        for i in 1..num_entries {
            let entry_offset = fit_offset + i * INTEL_FIT_ENTRY_SIZE;
            let Some(entry) = read_le_at::<IntelFitEntry>(&image, entry_offset) else {
                break;
            };
            let entry_type = entry.entry_type();

            // FIT entries must be ordered by type
            if entry_type < previous_type {
                self.msg("parse_fit: FIT entries are not sorted by type", fit_item);
            }
            previous_type = entry_type;

            let component_offset = self.physical_to_offset(entry.address);
            let entry_item =
                component_offset.and_then(|offset| self.model.find_by_base(offset as u32));

            let info = match entry_type {
                INTEL_FIT_TYPE_MICROCODE => {
                    self.parse_fit_entry_microcode(&entry, component_offset)
                }
                INTEL_FIT_TYPE_STARTUP_AC_MODULE => {
                    self.parse_fit_entry_acm(&entry, component_offset, entry_item.or(fit_item))
                }
                INTEL_FIT_TYPE_BOOT_GUARD_KEY_MANIFEST => self.parse_fit_entry_key_manifest(
                    &entry,
                    component_offset,
                    entry_item.or(fit_item),
                ),
                INTEL_FIT_TYPE_BOOT_GUARD_BOOT_POLICY => self.parse_fit_entry_boot_policy(
                    &entry,
                    component_offset,
                    entry_item.or(fit_item),
                ),
                INTEL_FIT_TYPE_DIAG_AC_MODULE
                | INTEL_FIT_TYPE_BIOS_STARTUP_MODULE
                | INTEL_FIT_TYPE_TPM_POLICY
                | INTEL_FIT_TYPE_BIOS_POLICY
                | INTEL_FIT_TYPE_TXT_POLICY
                | INTEL_FIT_TYPE_CSE_SECURE_BOOT
                | INTEL_FIT_TYPE_ACM_FEATURE_POLICY
                | INTEL_FIT_TYPE_JMP_DEBUG_POLICY
                | INTEL_FIT_TYPE_EMPTY => String::new(),
                _ => {
                    self.msg(
                        format!("parse_fit: FIT entry of unknown type {:02X}h found", entry_type),
                        entry_item.or(fit_item),
                    );
                    String::new()
                }
            };

            self.fit_table.push(FitTableRow {
                address: format!("{:08X}h", entry.address),
                size: format!("{:08X}h", entry.size() * 16),
                version: format!("{:04X}h", entry.version),
                checksum: if entry.checksum_valid() {
                    format!("{:02X}h", entry.checksum)
                } else {
                    String::new()
                },
                type_name: fit_entry_type_name(entry_type),
                info,
                item: entry_item.or(fit_item),
            });
        }

        let summary = self.boot_guard_capability_summary();
        if !summary.is_empty() {
            self.security_info += &summary;
            self.security_info += "\n";
        }
    }

    fn parse_fit_entry_microcode(
        &mut self,
        _entry: &IntelFitEntry,
        component_offset: Option<usize>,
    ) -> String {
        let Some(offset) = component_offset else {
            return "Invalid address".to_string();
        };
        let image = self.opened_image.clone();

        if offset + 4 <= image.len() {
            let first_dword =
                u32::from_le_bytes(image[offset..offset + 4].try_into().unwrap());
            if first_dword == INTEL_FIT_MICROCODE_EMPTY_SLOT {
                return "Empty slot".to_string();
            }
        }
        if offset + INTEL_MICROCODE_HEADER_SIZE > image.len() {
            return "Invalid address".to_string();
        }
        let Some(header) = read_le_at::<IntelMicrocodeHeader>(&image, offset) else {
            return "Invalid address".to_string();
        };
        if !header.is_valid() {
            return "Invalid microcode header".to_string();
        }

        format!(
            "CPU signature: {:08X}h, Revision: {:08X}h, Date: {:02X}.{:02X}.{:04X}",
            header.processor_signature, header.update_revision, header.date_day,
            header.date_month, header.date_year
        )
    }

    fn parse_fit_entry_acm(
        &mut self,
        _entry: &IntelFitEntry,
        component_offset: Option<usize>,
        item: Option<ItemId>,
    ) -> String {
        let Some(offset) = component_offset else {
            return "Invalid address".to_string();
        };
        let image = self.opened_image.clone();
        if offset + INTEL_ACM_HEADER_SIZE > image.len() {
            return "Invalid address".to_string();
        }
        let Some(header) = read_le_at::<IntelAcmHeader>(&image, offset) else {
            return "Invalid address".to_string();
        };

        if header.module_type != INTEL_ACM_MODULE_TYPE
            || header.module_vendor != INTEL_ACM_MODULE_VENDOR
        {
            self.msg("parse_fit_entry_acm: FIT entry points to invalid ACM", item);
            return "Invalid ACM".to_string();
        }

        self.bg_acm_found = true;

        let info = format!(
            "ModuleSubType: {:04X}h, ChipsetId: {:04X}h, Date: {:08X}h, ACM SVN: {:04X}h",
            header.module_sub_type, header.chipset_id, header.date, header.acm_svn
        );

        self.security_info += &format!(
            "Startup ACM found at base {:X}h\nModuleType: {:04X}h\nModuleSubType: {:04X}h\nHeaderLength: {}\nHeaderVersion: {:08X}h\n\
             ChipsetId: {:04X}h\nFlags: {:04X}h\nModuleVendor: {:X}h\nDate: {:08X}h\nModuleSize: {}\n\
             AcmSvn: {:04X}h\nSeSvn: {:04X}h\nEntryPoint: {:08X}h\nKeySize: {}\nScratchSpaceSize: {:X}h\n\n",
            offset,
            header.module_type,
            header.module_sub_type,
            header.header_length,
            header.header_version,
            header.chipset_id,
            header.flags,
            header.module_vendor,
            header.date,
            header.module_size,
            header.acm_svn,
            header.se_svn,
            header.entry_point,
            header.key_size,
            header.scratch_space_size
        );
        info
    }

    /// Read a flexible Boot Guard hash at `offset`: algorithm id, size, hash
    /// bytes. Returns (algorithm, hash, next_offset).
    fn read_bg_hash(&self, offset: usize) -> Option<(u16, Vec<u8>, usize)> {
        let image = &self.opened_image;
        let header = read_le_at::<BgHashHeader>(image, offset)?;
        let hash_start = offset + BG_HASH_HEADER_SIZE;
        let hash_end = hash_start + header.size as usize;
        if header.size > 64 || hash_end > image.len() {
            return None;
        }
        Some((header.hash_algorithm_id, image[hash_start..hash_end].to_vec(), hash_end))
    }

    fn parse_fit_entry_key_manifest(
        &mut self,
        _entry: &IntelFitEntry,
        component_offset: Option<usize>,
        item: Option<ItemId>,
    ) -> String {
        let Some(offset) = component_offset else {
            return "Invalid address".to_string();
        };
        let image = self.opened_image.clone();
        let Some(header) = read_le_at::<BgKeyManifestHeader>(&image, offset) else {
            return "Invalid address".to_string();
        };
        if header.tag != BG_KEY_MANIFEST_TAG {
            self.msg(
                "parse_fit_entry_key_manifest: FIT entry points to invalid Key Manifest",
                item,
            );
            return "Invalid Key Manifest".to_string();
        }

        self.bg_key_manifest_found = true;

        // Version 1 hashes start right after the fixed header, version 2
        // ones skip four reserved bytes first
        let hash_offset = if header.version >= BOOT_GUARD_VERSION_2 {
            offset + BG_KEY_MANIFEST_HEADER_SIZE + 4
        } else {
            offset + BG_KEY_MANIFEST_HEADER_SIZE
        };

        let mut info = format!(
            "Version: {:02X}h, KM version: {:02X}h, KM SVN: {:02X}h, KM ID: {:02X}h",
            header.version, header.km_version, header.km_svn, header.km_id
        );

        self.security_info += &format!(
            "Boot Guard Key Manifest found at base {:X}h\nVersion: {:02X}h\nKM version: {:02X}h\nKM SVN: {:02X}h\nKM ID: {:02X}h\n",
            offset, header.version, header.km_version, header.km_svn, header.km_id
        );

        match self.read_bg_hash(hash_offset) {
            Some((algorithm_id, hash, _)) => {
                info += &format!(", KM hash ({})", hash_type_name(algorithm_id));
                self.security_info += &format!(
                    "KM hash ({}): {}\n\n",
                    hash_type_name(algorithm_id),
                    to_hex_upper(&hash)
                );
            }
            None => {
                self.security_info += "\n";
                self.msg(
                    "parse_fit_entry_key_manifest: Key Manifest hash can not be parsed",
                    item,
                );
            }
        }

        info
    }

    fn parse_fit_entry_boot_policy(
        &mut self,
        entry: &IntelFitEntry,
        component_offset: Option<usize>,
        item: Option<ItemId>,
    ) -> String {
        let Some(offset) = component_offset else {
            return "Invalid address".to_string();
        };
        let image = self.opened_image.clone();
        let Some(header) = read_le_at::<BgBootPolicyHeader>(&image, offset) else {
            return "Invalid address".to_string();
        };
        if header.tag != BG_BOOT_POLICY_TAG {
            self.msg(
                "parse_fit_entry_boot_policy: FIT entry points to invalid Boot Policy Manifest",
                item,
            );
            return "Invalid Boot Policy".to_string();
        }

        self.bg_boot_policy_found = true;

        let info = format!(
            "Version: {:02X}h, BP SVN: {:02X}h, ACM SVN: {:02X}h",
            header.version, header.bp_svn, header.acm_svn
        );
        self.security_info += &format!(
            "Boot Guard Boot Policy Manifest found at base {:X}h\nVersion: {:02X}h\nBP SVN: {:02X}h\nACM SVN: {:02X}h\n",
            offset, header.version, header.bp_svn, header.acm_svn
        );

        // Scan for the elements; entry size is in 16-byte units, a zero size
        // limits the scan to the rest of the image
        let manifest_end = if entry.size() != 0 {
            core::cmp::min(offset + entry.size() as usize * 16, image.len())
        } else {
            image.len()
        };

        let mut element_offset = offset + BG_BOOT_POLICY_HEADER_SIZE;
        while element_offset + 8 <= manifest_end {
            let tag = u64::from_le_bytes(
                image[element_offset..element_offset + 8].try_into().unwrap(),
            );
            if tag == BG_IBB_ELEMENT_TAG {
                element_offset = self.parse_bg_ibb_element(element_offset, manifest_end, item);
            } else if tag == BG_PMDA_ELEMENT_TAG {
                element_offset = self.parse_bg_pmda_element(element_offset, manifest_end, item);
            } else if tag == BG_PMSG_ELEMENT_TAG {
                self.security_info += "Boot Policy signature element found\n";
                element_offset += 4;
            } else {
                element_offset += 4;
            }
        }
        self.security_info += "\n";

        info
    }

    /// Parse one `__IBBS__` element; returns the offset to continue scanning
    /// from.
    fn parse_bg_ibb_element(
        &mut self,
        offset: usize,
        limit: usize,
        item: Option<ItemId>,
    ) -> usize {
        let image = self.opened_image.clone();
        let Some(prelude) = read_le_at::<BgIbbElementPrelude>(&image, offset) else {
            return offset + 4;
        };

        // Post-IBB hash, entry point, digest, segment count
        let Some((_, _, after_post_ibb)) = self.read_bg_hash(offset + BG_IBB_ELEMENT_PRELUDE_SIZE)
        else {
            self.msg("parse_bg_ibb_element: IBB element hash can not be parsed", item);
            return offset + 4;
        };
        if after_post_ibb + 4 > image.len() {
            return offset + 4;
        }
        let ibb_entry_point =
            u32::from_le_bytes(image[after_post_ibb..after_post_ibb + 4].try_into().unwrap());
        let Some((digest_algorithm, digest, after_digest)) =
            self.read_bg_hash(after_post_ibb + 4)
        else {
            self.msg("parse_bg_ibb_element: IBB digest can not be parsed", item);
            return offset + 4;
        };
        if after_digest >= image.len() {
            return offset + 4;
        }
        let segment_count = image[after_digest] as usize;
        let segments_offset = after_digest + 1;

        self.security_info += &format!(
            "IBB element found at base {:X}h\nFlags: {:08X}h\nIbbEntryPoint: {:08X}h\nIBB digest ({}): {}\nIBB segments:\n",
            offset,
            prelude.flags,
            ibb_entry_point,
            hash_type_name(digest_algorithm),
            to_hex_upper(&digest)
        );

        for i in 0..segment_count {
            let segment_offset = segments_offset + i * BG_IBB_SEGMENT_SIZE;
            if segment_offset + BG_IBB_SEGMENT_SIZE > core::cmp::min(limit, image.len()) {
                break;
            }
            let Some(segment) = read_le_at::<BgIbbSegment>(&image, segment_offset) else {
                break;
            };

            self.security_info += &format!(
                "Flags: {:04X}h Address: {:08X}h Size: {:08X}h\n",
                segment.flags, segment.base, segment.size
            );

            // Segments without the non-IBB flag become IBB protected ranges
            if segment.flags & BG_IBB_SEGMENT_FLAG_NON_IBB == 0 && segment.size != 0 {
                self.protected_ranges.push(ProtectedRange {
                    offset: segment.base,
                    size: segment.size,
                    algorithm_id: digest_algorithm,
                    range_type: PROTECTED_RANGE_INTEL_BOOT_GUARD_IBB,
                    hash: digest.clone(),
                });
            }
        }

        segments_offset + segment_count * BG_IBB_SEGMENT_SIZE
    }

    /// Parse one `__PMDA__` element; returns the offset to continue scanning
    /// from.
    fn parse_bg_pmda_element(
        &mut self,
        offset: usize,
        limit: usize,
        item: Option<ItemId>,
    ) -> usize {
        let image = self.opened_image.clone();
        let Some(element) = read_le_at::<BgPmdaElementHeader>(&image, offset) else {
            return offset + 4;
        };
        let data_offset = offset + BG_PMDA_ELEMENT_HEADER_SIZE;
        let data_end = core::cmp::min(
            data_offset + element.data_size as usize,
            core::cmp::min(limit, image.len()),
        );

        let Some(pmda) = read_le_at::<BgMicrosoftPmdaHeader>(&image, data_offset) else {
            return data_end;
        };

        self.security_info += &format!(
            "PMDA element found at base {:X}h\nPMDA version: {}\nPMDA entries: {}\n",
            offset, pmda.version, pmda.num_entries
        );

        let mut entry_offset = data_offset + BG_MICROSOFT_PMDA_HEADER_SIZE;
        for _ in 0..pmda.num_entries {
            if pmda.version == BG_MICROSOFT_PMDA_VERSION_1 {
                if entry_offset + BG_MICROSOFT_PMDA_ENTRY_V1_SIZE > data_end {
                    break;
                }
                let Some(entry) = read_le_at::<BgMicrosoftPmdaEntryV1>(&image, entry_offset)
                else {
                    break;
                };
                self.security_info += &format!(
                    "Address: {:08X}h Size: {:08X}h\nHash (SHA256): {}\n",
                    entry.address,
                    entry.size,
                    to_hex_upper(&entry.hash)
                );
                self.protected_ranges.push(ProtectedRange {
                    offset: entry.address,
                    size: entry.size,
                    algorithm_id: TCG_HASH_ALGORITHM_ID_SHA256,
                    range_type: PROTECTED_RANGE_VENDOR_HASH_MICROSOFT_PMDA,
                    hash: entry.hash.to_vec(),
                });
                entry_offset += BG_MICROSOFT_PMDA_ENTRY_V1_SIZE;
            } else if pmda.version == BG_MICROSOFT_PMDA_VERSION_2 {
                if entry_offset + BG_MICROSOFT_PMDA_ENTRY_V2_PRELUDE_SIZE > data_end {
                    break;
                }
                let Some(prelude) =
                    read_le_at::<BgMicrosoftPmdaEntryV2Prelude>(&image, entry_offset)
                else {
                    break;
                };
                let Some((algorithm_id, hash, next)) =
                    self.read_bg_hash(entry_offset + BG_MICROSOFT_PMDA_ENTRY_V2_PRELUDE_SIZE)
                else {
                    break;
                };
                self.security_info += &format!(
                    "Address: {:08X}h Size: {:08X}h\nHash ({}): {}\n",
                    prelude.address,
                    prelude.size,
                    hash_type_name(algorithm_id),
                    to_hex_upper(&hash)
                );
                self.protected_ranges.push(ProtectedRange {
                    offset: prelude.address,
                    size: prelude.size,
                    algorithm_id,
                    range_type: PROTECTED_RANGE_VENDOR_HASH_MICROSOFT_PMDA,
                    hash,
                });
                entry_offset = next;
            } else {
                self.msg(
                    format!(
                        "parse_bg_pmda_element: unknown PMDA version {} found",
                        pmda.version
                    ),
                    item,
                );
                break;
            }
        }

        data_end
    }

    /// Summary of which Boot Guard components were seen during FIT decoding.
    fn boot_guard_capability_summary(&self) -> String {
        let mut out = String::new();
        if self.bg_acm_found || self.bg_key_manifest_found || self.bg_boot_policy_found {
            out += "Intel Boot Guard components:\n";
            out += &format!(
                "Startup ACM: {}\nKey Manifest: {}\nBoot Policy Manifest: {}\n",
                if self.bg_acm_found { "present" } else { "absent" },
                if self.bg_key_manifest_found { "present" } else { "absent" },
                if self.bg_boot_policy_found { "present" } else { "absent" }
            );
        }
        out
    }
}
